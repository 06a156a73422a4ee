pub mod app;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs_util;
pub mod hdock;
pub mod http;
pub mod job_id;
pub mod metrics;
pub mod output;
pub mod rcsb;
pub mod reconcile;
pub mod resubmit;
pub mod scores;
pub mod status;
pub mod store;
pub mod table;
pub mod uniprot;
pub mod validation;
