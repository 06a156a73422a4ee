use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::ThreadPool;
use rayon::prelude::*;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::HarvestError;
use crate::http::{build_client, require_success, send_with_retries};
use crate::store::ResultStore;
use crate::uniprot::PLACEHOLDER;

/// Identifiers with this prefix are predicted models served by AlphaFold DB.
pub const ALPHAFOLD_PREFIX: &str = "AF-";
/// Method recorded for AlphaFold models.
pub const PREDICTED_METHOD: &str = "Predicted";

const SEARCH_URL: &str = "https://search.rcsb.org/rcsbsearch/v2/query";
const DATA_URL: &str = "https://data.rcsb.org/rest/v1/core";

pub trait StructureClient: Send + Sync {
    /// Writes the structure for `identifier` to `destination`, returning the bytes written.
    fn download_structure(&self, identifier: &str, destination: &Utf8Path) -> Result<u64, HarvestError>;
    /// PDB ids of experimental entries whose polymers reference the UniProt `accession`.
    fn search_entries(&self, accession: &str) -> Result<Vec<String>, HarvestError>;
    fn entry_metadata(&self, pdb_id: &str) -> Result<StructureEntry, HarvestError>;
}

/// One structure row of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureEntry {
    pub identifier: String,
    pub method: String,
    /// Best resolution with its unit, e.g. `1.8 Å`.
    pub resolution: String,
    /// Author chain ids across all polymer entities, joined by `/`.
    pub chain: String,
}

impl StructureEntry {
    pub fn placeholder(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            method: PLACEHOLDER.to_string(),
            resolution: PLACEHOLDER.to_string(),
            chain: PLACEHOLDER.to_string(),
        }
    }

    /// The AlphaFold DB model `AF-<accession>-F1`.
    pub fn alphafold(accession: &str) -> Self {
        Self {
            method: PREDICTED_METHOD.to_string(),
            ..Self::placeholder(&format!("{ALPHAFOLD_PREFIX}{accession}-F1"))
        }
    }

    pub fn headers() -> Vec<String> {
        ["identifier", "method", "resolution", "chain"]
            .iter()
            .map(|header| header.to_string())
            .collect()
    }

    pub fn cells(&self) -> Vec<String> {
        vec![
            self.identifier.clone(),
            self.method.clone(),
            self.resolution.clone(),
            self.chain.clone(),
        ]
    }
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
}

impl RcsbHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HarvestError> {
        let client = build_client(timeout).map_err(|err| HarvestError::RcsbHttp(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn structure_url(identifier: &str) -> String {
        if identifier.starts_with(ALPHAFOLD_PREFIX) {
            format!("https://alphafold.ebi.ac.uk/files/{identifier}-model_v4.pdb")
        } else {
            format!("https://files.rcsb.org/download/{identifier}.pdb")
        }
    }

    fn entry_url(pdb_id: &str) -> String {
        format!("{DATA_URL}/entry/{pdb_id}")
    }

    fn polymer_entity_url(pdb_id: &str, entity_id: &str) -> String {
        format!("{DATA_URL}/polymer_entity/{pdb_id}/{entity_id}")
    }

    fn get_json(&self, url: &str) -> Result<Value, HarvestError> {
        let response = send_with_retries(|| self.client.get(url))
            .map_err(|err| HarvestError::RcsbHttp(err.to_string()))?;
        let response = require_success(response, |status, message| {
            HarvestError::RcsbStatus { status, message }
        })?;
        response
            .json()
            .map_err(|err| HarvestError::RcsbHttp(err.to_string()))
    }
}

impl StructureClient for RcsbHttpClient {
    fn download_structure(&self, identifier: &str, destination: &Utf8Path) -> Result<u64, HarvestError> {
        let url = Self::structure_url(identifier);
        let response = send_with_retries(|| self.client.get(&url))
            .map_err(|err| HarvestError::RcsbHttp(err.to_string()))?;
        let mut response = require_success(response, |status, message| {
            HarvestError::RcsbStatus { status, message }
        })?;
        ResultStore::write_stream_atomic(destination, &mut response)
    }

    fn search_entries(&self, accession: &str) -> Result<Vec<String>, HarvestError> {
        let query = search_query(accession);
        let response = send_with_retries(|| self.client.post(SEARCH_URL).json(&query))
            .map_err(|err| HarvestError::RcsbHttp(err.to_string()))?;
        // The search service answers 204 with an empty body when nothing matches.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let response = require_success(response, |status, message| {
            HarvestError::RcsbStatus { status, message }
        })?;
        let raw: Value = response
            .json()
            .map_err(|err| HarvestError::RcsbHttp(err.to_string()))?;
        Ok(parse_search_ids(&raw))
    }

    fn entry_metadata(&self, pdb_id: &str) -> Result<StructureEntry, HarvestError> {
        let entry = self.get_json(&Self::entry_url(pdb_id))?;
        let mut chains = Vec::new();
        for entity_id in polymer_entity_ids(&entry) {
            match self.get_json(&Self::polymer_entity_url(pdb_id, &entity_id)) {
                Ok(entity) => chains.extend(entity_chains(&entity)),
                Err(err) => {
                    warn!(pdb_id, entity_id = %entity_id, error = %err, "polymer entity lookup failed")
                }
            }
        }
        Ok(extract_structure_entry(pdb_id, &entry, &chains))
    }
}

/// Search request for entries whose polymers map to `accession` in UniProt.
pub fn search_query(accession: &str) -> Value {
    let attribute = "rcsb_polymer_entity_container_identifiers.reference_sequence_identifiers";
    json!({
        "query": {
            "type": "group",
            "logical_operator": "and",
            "nodes": [
                {
                    "type": "terminal",
                    "service": "text",
                    "parameters": {
                        "attribute": format!("{attribute}.database_accession"),
                        "operator": "exact_match",
                        "value": accession
                    }
                },
                {
                    "type": "terminal",
                    "service": "text",
                    "parameters": {
                        "attribute": format!("{attribute}.database_name"),
                        "operator": "exact_match",
                        "value": "UniProt"
                    }
                }
            ]
        },
        "return_type": "entry",
        "request_options": { "return_all_hits": true }
    })
}

/// Upper-cased four-character PDB ids from a search response, in rank order.
pub fn parse_search_ids(raw: &Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let Some(results) = raw.get("result_set").and_then(|v| v.as_array()) else {
        return ids;
    };
    for result in results {
        let Some(id) = result.get("identifier").and_then(|v| v.as_str()) else {
            continue;
        };
        let id = id.trim();
        if id.len() == 4 && id.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            let id = id.to_ascii_uppercase();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

pub fn polymer_entity_ids(entry: &Value) -> Vec<String> {
    entry
        .get("rcsb_entry_container_identifiers")
        .and_then(|v| v.get("polymer_entity_ids"))
        .and_then(|v| v.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|id| match id {
                    Value::String(id) => Some(id.clone()),
                    Value::Number(id) => Some(id.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn entity_chains(entity: &Value) -> Vec<String> {
    entity
        .get("rcsb_polymer_entity_container_identifiers")
        .and_then(|v| v.get("auth_asym_ids"))
        .and_then(|v| v.as_array())
        .map(|chains| {
            chains
                .iter()
                .filter_map(|chain| chain.as_str())
                .map(|chain| chain.to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn extract_structure_entry(pdb_id: &str, entry: &Value, chains: &[String]) -> StructureEntry {
    let info = entry.get("rcsb_entry_info");
    let method = info
        .and_then(|v| v.get("experimental_method"))
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let resolution = info
        .and_then(|v| v.get("resolution_combined"))
        .and_then(|v| v.as_array())
        .and_then(|values| values.first())
        .and_then(|value| value.as_f64().map(|_| format!("{value} Å")))
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    StructureEntry {
        identifier: pdb_id.to_string(),
        method,
        resolution,
        chain: if chains.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            chains.join("/")
        },
    }
}

/// Experimental entries for one accession followed by its AlphaFold model.
/// A failed search or entry lookup leaves those rows out.
pub fn describe_structures<C>(client: &C, accession: &str) -> Vec<StructureEntry>
where
    C: StructureClient,
{
    let ids = client.search_entries(accession).unwrap_or_else(|err| {
        warn!(accession, error = %err, "structure search failed");
        Vec::new()
    });
    let mut entries = Vec::with_capacity(ids.len() + 1);
    for pdb_id in ids {
        match client.entry_metadata(&pdb_id) {
            Ok(entry) => entries.push(entry),
            Err(err) => warn!(accession, pdb_id = %pdb_id, error = %err, "entry lookup failed"),
        }
    }
    entries.push(StructureEntry::alphafold(accession));
    entries
}

/// [`describe_structures`] for every accession with at most `concurrency_limit`
/// accessions in flight; results keep input order.
pub fn describe_all<C>(
    client: &C,
    accessions: &[String],
    concurrency_limit: usize,
) -> Result<Vec<Vec<StructureEntry>>, HarvestError>
where
    C: StructureClient,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency_limit.max(1))
        .build()
        .map_err(|err| HarvestError::ThreadPool(err.to_string()))?;
    let described = pool.install(|| {
        accessions
            .par_iter()
            .map(|accession| describe_structures(client, accession))
            .collect::<Vec<_>>()
    });
    let entries: usize = described.iter().map(Vec::len).sum();
    info!(accessions = described.len(), entries, "structure metadata finished");
    Ok(described)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureOutcome {
    Downloaded,
    AlreadyPresent,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureResult {
    pub identifier: String,
    pub path: Utf8PathBuf,
    pub outcome: StructureOutcome,
}

/// Downloads `<dest>/<identifier><extension>` for each identifier, skipping files already on disk.
pub fn download_structures<C>(
    client: &C,
    identifiers: &[String],
    dest: &Utf8Path,
    extension: &str,
    pool: &ThreadPool,
) -> Vec<StructureResult>
where
    C: StructureClient,
{
    let results = pool.install(|| {
        identifiers
            .par_iter()
            .map(|identifier| {
                let path = dest.join(format!("{identifier}{extension}"));
                let outcome = if path.is_file() {
                    debug!(identifier = %identifier, "structure already present");
                    StructureOutcome::AlreadyPresent
                } else {
                    match client.download_structure(identifier, &path) {
                        Ok(_) => StructureOutcome::Downloaded,
                        Err(err) => {
                            warn!(identifier = %identifier, error = %err, "structure download failed");
                            StructureOutcome::Failed(err.to_string())
                        }
                    }
                };
                StructureResult {
                    identifier: identifier.clone(),
                    path,
                    outcome,
                }
            })
            .collect::<Vec<_>>()
    });
    let failed = results
        .iter()
        .filter(|result| matches!(result.outcome, StructureOutcome::Failed(_)))
        .count();
    info!(structures = results.len(), failed, "structure download finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_route_by_prefix() {
        assert_eq!(
            RcsbHttpClient::structure_url("1ABC"),
            "https://files.rcsb.org/download/1ABC.pdb"
        );
        assert_eq!(
            RcsbHttpClient::structure_url("AF-P12345-F1"),
            "https://alphafold.ebi.ac.uk/files/AF-P12345-F1-model_v4.pdb"
        );
        assert_eq!(
            RcsbHttpClient::polymer_entity_url("4HHB", "1"),
            "https://data.rcsb.org/rest/v1/core/polymer_entity/4HHB/1"
        );
    }

    #[test]
    fn search_query_pins_accession_and_database() {
        let query = search_query("P69905");
        let nodes = query["query"]["nodes"].as_array().unwrap();
        assert_eq!(nodes[0]["parameters"]["value"], "P69905");
        assert_eq!(nodes[1]["parameters"]["value"], "UniProt");
        assert_eq!(query["return_type"], "entry");
    }

    #[test]
    fn search_ids_are_normalized_and_filtered() {
        let raw = json!({
            "result_set": [
                { "identifier": "4hhb", "score": 1.0 },
                { "identifier": " 2DN2 ", "score": 0.9 },
                { "identifier": "4HHB", "score": 0.8 },
                { "identifier": "4HHB_1", "score": 0.7 },
                { "score": 0.6 }
            ]
        });
        assert_eq!(parse_search_ids(&raw), vec!["4HHB", "2DN2"]);
        assert!(parse_search_ids(&json!({})).is_empty());
    }

    #[test]
    fn alphafold_row_is_predicted() {
        let entry = StructureEntry::alphafold("P69905");
        assert_eq!(entry.identifier, "AF-P69905-F1");
        assert_eq!(entry.method, PREDICTED_METHOD);
        assert_eq!(entry.resolution, PLACEHOLDER);
        assert_eq!(entry.chain, PLACEHOLDER);
    }
}
