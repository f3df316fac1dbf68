use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata keys stamped onto every flattened record during normalization.
pub const SOURCE_FILE: &str = "source_file";
pub const SOURCE_FILENAME: &str = "source_filename";
pub const RECORD_INDEX: &str = "record_index";

/// Metadata properties appended to every storable object.
pub const CHUNK_INDEX: &str = "chunk_index";
pub const TOTAL_CHUNKS: &str = "total_chunks";
pub const ORIGINAL_ID: &str = "original_id";
pub const CHUNK_MARKER: &str = "chunk_marker";
pub const IS_CHUNKED: &str = "is_chunked";

/// One source record after flattening: no value is a nested mapping,
/// and the record carries its (file, index) identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecord {
    pub source_file: String,
    pub source_filename: String,
    pub record_index: usize,
    pub fields: Map<String, Value>,
}

/// One object ready for upsert into the destination collection.
/// `chunk_field` names the property holding this object's chunk content
/// when the record was chunked; the graph mirror reads it, the vector
/// store does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorableObject {
    pub id: Uuid,
    pub properties: Map<String, Value>,
    pub chunk_field: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub max_chunk_chars: usize,
    pub min_chunk_chars: usize,
    pub batch_size: usize,
    pub flatten_separator: &'static str,
    pub sync_graph: bool,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 2_000,
            min_chunk_chars: 50,
            batch_size: 100,
            flatten_separator: "_",
            sync_graph: false,
        }
    }
}

/// One ranked object returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub properties: Map<String, Value>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchHit>,
    pub count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeResponse {
    pub success: bool,
    pub generated_text: Option<String>,
    pub source_results: Vec<SearchHit>,
    pub count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CypherResponse {
    pub success: bool,
    pub results: Vec<Map<String, Value>>,
    pub count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub ready: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackHealth {
    pub vector: ServiceHealth,
    pub graph: ServiceHealth,
}

impl StackHealth {
    pub fn all_ready(&self) -> bool {
        self.vector.ready && self.graph.ready
    }
}

/// Per-object write failure collected from a batch, not aborting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFailure {
    pub id: String,
    pub details: String,
}

/// Outcome of one batched upsert call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub written: usize,
    pub failures: Vec<WriteFailure>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.written += other.written;
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_reports_accumulate_across_merges() {
        let mut total = BatchReport::default();
        total.merge(BatchReport {
            written: 3,
            failures: Vec::new(),
        });
        total.merge(BatchReport {
            written: 1,
            failures: vec![WriteFailure {
                id: "b".to_string(),
                details: "rejected".to_string(),
            }],
        });

        assert_eq!(total.written, 4);
        assert_eq!(total.failures.len(), 1);
        assert_eq!(total.failures[0].id, "b");
    }
}
