use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;

use crate::error::HarvestError;
use crate::http::{build_client, require_success, send_with_retries};
use crate::store::ResultStore;

pub trait ArchiveClient: Send + Sync {
    /// Streams the bundle at `url` into `destination`, returning the bytes written.
    fn download_archive(&self, url: &str, destination: &Utf8Path) -> Result<u64, HarvestError>;
}

#[derive(Clone)]
pub struct HdockHttpClient {
    client: Client,
}

impl HdockHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HarvestError> {
        let client = build_client(timeout).map_err(|err| HarvestError::HdockHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ArchiveClient for HdockHttpClient {
    fn download_archive(&self, url: &str, destination: &Utf8Path) -> Result<u64, HarvestError> {
        let response = send_with_retries(|| self.client.get(url))
            .map_err(|err| HarvestError::HdockHttp(err.to_string()))?;
        let mut response = require_success(response, |status, message| {
            HarvestError::HdockStatus { status, message }
        })?;
        ResultStore::write_stream_atomic(destination, &mut response)
    }
}
