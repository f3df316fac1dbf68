pub mod chunking;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, detect_markers, should_chunk_field, ChunkingConfig, SplitMarker};
pub use error::{IngestError, StoreError};
pub use ingest::{
    digest_file, discover_json_files, emit_objects, normalize_element, IngestReport,
    IngestionDriver, RecordOutcome, SkippedFile, SkippedRecord,
};
pub use models::{
    BatchReport, CypherResponse, FlatRecord, GenerativeResponse, HealthStatus, IngestionOptions,
    SearchHit, SearchResponse, ServiceHealth, StackHealth, StorableObject, WriteFailure,
};
pub use normalize::{base_object_id, chunk_object_id, flatten_record, normalize_record};
pub use query::{QueryService, DEFAULT_QUERY_LIMIT};
pub use schema::{canonical_iso_date, infer_field_type, FieldType, UnifiedSchema};
pub use stores::{Neo4jConfig, Neo4jStore, WeaviateConfig, WeaviateStore};
pub use traits::{GenerativeResult, GraphStore, VectorStore};
