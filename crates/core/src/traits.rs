use crate::error::StoreError;
use crate::models::{BatchReport, SearchHit, StorableObject};
use crate::schema::FieldType;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Text answer synthesized by the vector store's generative module,
/// together with the objects it was grounded on.
#[derive(Debug, Clone)]
pub struct GenerativeResult {
    pub generated: Option<String>,
    pub hits: Vec<SearchHit>,
}

#[async_trait]
pub trait VectorStore {
    async fn ready(&self) -> Result<bool, StoreError>;

    /// Create (or recreate) the named collection from a property schema.
    async fn provision_collection(
        &self,
        collection: &str,
        properties: &[(String, FieldType)],
    ) -> Result<(), StoreError>;

    /// Upsert one batch of objects, collecting per-object failures instead
    /// of failing the batch.
    async fn write_batch(
        &self,
        collection: &str,
        objects: &[StorableObject],
    ) -> Result<BatchReport, StoreError>;

    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;

    async fn generate(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        task: &str,
    ) -> Result<GenerativeResult, StoreError>;
}

#[async_trait]
pub trait GraphStore {
    async fn ready(&self) -> Result<bool, StoreError>;

    /// Execute one Cypher statement with named parameters, returning one
    /// key-to-value mapping per result row. Node and relationship values
    /// surface as their property mappings.
    async fn run_cypher(
        &self,
        query: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Vec<Map<String, Value>>, StoreError>;

    /// Mirror emitted objects into the graph as document/chunk nodes.
    async fn sync_chunks(&self, objects: &[StorableObject]) -> Result<(), StoreError>;
}
