use std::time::Duration;

use rayon::prelude::*;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::HarvestError;
use crate::http::{build_client, require_success, send_with_retries};

/// Written for any annotation field the record does not provide.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProteinAnnotation {
    pub accession: String,
    pub protein_name: String,
    pub short_name: String,
    pub gene_symbol: String,
    /// Ensembl gene id.
    pub gene_id: String,
    /// Pfam family ids joined by `", "`.
    pub pfam_ids: String,
    pub sequence_length: Option<u64>,
}

impl ProteinAnnotation {
    pub fn placeholder(accession: &str) -> Self {
        Self {
            accession: accession.to_string(),
            protein_name: PLACEHOLDER.to_string(),
            short_name: PLACEHOLDER.to_string(),
            gene_symbol: PLACEHOLDER.to_string(),
            gene_id: PLACEHOLDER.to_string(),
            pfam_ids: PLACEHOLDER.to_string(),
            sequence_length: None,
        }
    }

    pub fn headers() -> Vec<String> {
        [
            "accession",
            "protein_name",
            "short_name",
            "gene_symbol",
            "gene_ID",
            "pfam_ids",
            "sequence_length",
        ]
        .iter()
        .map(|header| header.to_string())
        .collect()
    }

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.accession.clone(),
            self.protein_name.clone(),
            self.short_name.clone(),
            self.gene_symbol.clone(),
            self.gene_id.clone(),
            self.pfam_ids.clone(),
            self.sequence_length
                .map(|length| length.to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
        ]
    }
}

pub trait AnnotationClient: Send + Sync {
    fn annotate(&self, accession: &str) -> Result<ProteinAnnotation, HarvestError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
}

impl UniprotHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HarvestError> {
        let client =
            build_client(timeout).map_err(|err| HarvestError::UniprotHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn entry_url(accession: &str) -> String {
        format!("https://rest.uniprot.org/uniprotkb/{accession}.json")
    }
}

impl AnnotationClient for UniprotHttpClient {
    fn annotate(&self, accession: &str) -> Result<ProteinAnnotation, HarvestError> {
        let url = Self::entry_url(accession);
        let response = send_with_retries(|| self.client.get(&url))
            .map_err(|err| HarvestError::UniprotHttp(err.to_string()))?;
        let response = require_success(response, |status, message| {
            HarvestError::UniprotStatus { status, message }
        })?;
        let raw: Value = response
            .json()
            .map_err(|err| HarvestError::UniprotHttp(err.to_string()))?;
        let mut annotation = extract_annotation(&raw);
        if annotation.accession == PLACEHOLDER {
            annotation.accession = accession.to_string();
        }
        Ok(annotation)
    }
}

pub fn extract_annotation(raw: &Value) -> ProteinAnnotation {
    let text = |value: Option<&Value>| {
        value
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    };

    let recommended = raw
        .get("proteinDescription")
        .and_then(|v| v.get("recommendedName"));
    let protein_name = text(
        recommended
            .and_then(|v| v.get("fullName"))
            .and_then(|v| v.get("value")),
    );
    let short_name = text(
        recommended
            .and_then(|v| v.get("shortNames"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("value")),
    );
    let gene_symbol = text(
        raw.get("genes")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("geneName"))
            .and_then(|v| v.get("value")),
    );

    let mut gene_id: Option<String> = None;
    let mut pfam = Vec::new();
    if let Some(xrefs) = raw
        .get("uniProtKBCrossReferences")
        .and_then(|v| v.as_array())
    {
        for xref in xrefs {
            match xref.get("database").and_then(|v| v.as_str()) {
                Some("Ensembl") => {
                    let gene = xref
                        .get("properties")
                        .and_then(|v| v.as_array())
                        .and_then(|props| {
                            props.iter().find(|prop| {
                                prop.get("key").and_then(|v| v.as_str()) == Some("gene")
                            })
                        })
                        .and_then(|prop| prop.get("value"))
                        .and_then(|v| v.as_str());
                    match gene {
                        Some(value) => gene_id = Some(value.to_string()),
                        None if gene_id.is_none() => {
                            gene_id = xref.get("id").and_then(|v| v.as_str()).map(|v| v.to_string())
                        }
                        None => {}
                    }
                }
                Some("Pfam") => {
                    if let Some(id) = xref.get("id").and_then(|v| v.as_str()) {
                        pfam.push(id.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    ProteinAnnotation {
        accession: text(raw.get("primaryAccession")),
        protein_name,
        short_name,
        gene_symbol,
        gene_id: gene_id.unwrap_or_else(|| PLACEHOLDER.to_string()),
        pfam_ids: if pfam.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            pfam.join(", ")
        },
        sequence_length: raw
            .get("sequence")
            .and_then(|v| v.get("length"))
            .and_then(|v| v.as_u64()),
    }
}

/// Annotates every accession with at most `concurrency_limit` lookups in flight.
/// A failed lookup yields a placeholder annotation at the same position.
pub fn annotate_all<C>(
    client: &C,
    accessions: &[String],
    concurrency_limit: usize,
) -> Result<Vec<ProteinAnnotation>, HarvestError>
where
    C: AnnotationClient,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency_limit.max(1))
        .build()
        .map_err(|err| HarvestError::ThreadPool(err.to_string()))?;
    let annotations = pool.install(|| {
        accessions
            .par_iter()
            .map(|accession| match client.annotate(accession) {
                Ok(annotation) => annotation,
                Err(err) => {
                    warn!(accession = %accession, error = %err, "annotation lookup failed");
                    ProteinAnnotation::placeholder(accession)
                }
            })
            .collect::<Vec<_>>()
    });
    info!(accessions = annotations.len(), "annotation finished");
    Ok(annotations)
}
