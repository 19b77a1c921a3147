use serde::{Deserialize, Serialize};

/// Per-source slice of a run report. `items_found` counts every entry the
/// feed carried; `items_processed` counts only newly stored articles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub name: String,
    pub url: String,
    pub items_found: usize,
    pub items_processed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub message: String,
    pub total_fetched: usize,
    pub source_results: Vec<SourceReport>,
    /// RFC 3339 run completion time.
    pub timestamp: String,
}
