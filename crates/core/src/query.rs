use crate::models::{
    CypherResponse, GenerativeResponse, HealthStatus, SearchResponse, ServiceHealth, StackHealth,
};
use crate::traits::{GraphStore, VectorStore};
use serde_json::{Map, Value};
use tracing::warn;

/// Default result limit for search and generative queries.
pub const DEFAULT_QUERY_LIMIT: usize = 3;

/// Pass-through query surface over the two external stores.
///
/// Every operation translates the store's result into a uniform response
/// envelope; store failures surface as unsuccessful envelopes with a
/// message rather than bubbling up as errors.
pub struct QueryService<V, G>
where
    V: VectorStore,
    G: GraphStore,
{
    vector: V,
    graph: G,
    collection: String,
}

impl<V, G> QueryService<V, G>
where
    V: VectorStore + Send + Sync,
    G: GraphStore + Send + Sync,
{
    pub fn new(vector: V, graph: G, collection: impl Into<String>) -> Self {
        Self {
            vector,
            graph,
            collection: collection.into(),
        }
    }

    pub async fn semantic_search(&self, query: &str, limit: Option<usize>) -> SearchResponse {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        match self.vector.near_text(&self.collection, query, limit).await {
            Ok(results) => {
                let count = results.len();
                SearchResponse {
                    success: true,
                    results,
                    count,
                    message: Some(format!("Found {count} results for query: '{query}'")),
                }
            }
            Err(error) => {
                warn!(%error, "semantic search failed");
                SearchResponse {
                    success: false,
                    results: Vec::new(),
                    count: 0,
                    message: Some(format!("Error performing search: {error}")),
                }
            }
        }
    }

    pub async fn generative_search(
        &self,
        query: &str,
        limit: Option<usize>,
        task: &str,
    ) -> GenerativeResponse {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);

        match self
            .vector
            .generate(&self.collection, query, limit, task)
            .await
        {
            Ok(result) => {
                let count = result.hits.len();
                GenerativeResponse {
                    success: true,
                    generated_text: result.generated,
                    source_results: result.hits,
                    count,
                    message: Some(format!("Generated response based on {count} results")),
                }
            }
            Err(error) => {
                warn!(%error, "generative search failed");
                GenerativeResponse {
                    success: false,
                    generated_text: None,
                    source_results: Vec::new(),
                    count: 0,
                    message: Some(format!("Error performing generative search: {error}")),
                }
            }
        }
    }

    pub async fn run_cypher(
        &self,
        query: &str,
        parameters: &Map<String, Value>,
    ) -> CypherResponse {
        match self.graph.run_cypher(query, parameters).await {
            Ok(results) => {
                let count = results.len();
                CypherResponse {
                    success: true,
                    results,
                    count,
                    message: Some(format!("Successfully executed query with {count} results")),
                }
            }
            Err(error) => {
                warn!(%error, "cypher query failed");
                CypherResponse {
                    success: false,
                    results: Vec::new(),
                    count: 0,
                    message: Some(format!("Error executing query: {error}")),
                }
            }
        }
    }

    /// Probe both stores. Unreachable services degrade the status; this
    /// never returns an error.
    pub async fn health(&self) -> StackHealth {
        let vector = match self.vector.ready().await {
            Ok(true) => ServiceHealth {
                status: HealthStatus::Healthy,
                ready: true,
                message: "vector store is ready".to_string(),
            },
            Ok(false) => ServiceHealth {
                status: HealthStatus::Unhealthy,
                ready: false,
                message: "vector store is not ready".to_string(),
            },
            Err(error) => ServiceHealth {
                status: HealthStatus::Error,
                ready: false,
                message: format!("error connecting to vector store: {error}"),
            },
        };

        let graph = match self.graph.ready().await {
            Ok(true) => ServiceHealth {
                status: HealthStatus::Healthy,
                ready: true,
                message: "graph store is ready".to_string(),
            },
            Ok(false) => ServiceHealth {
                status: HealthStatus::Unhealthy,
                ready: false,
                message: "graph store is not ready".to_string(),
            },
            Err(error) => ServiceHealth {
                status: HealthStatus::Error,
                ready: false,
                message: format!("error connecting to graph store: {error}"),
            },
        };

        StackHealth { vector, graph }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{BatchReport, SearchHit, StorableObject};
    use crate::schema::FieldType;
    use crate::traits::GenerativeResult;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct FakeVectorStore {
        hits: Vec<SearchHit>,
        generated: Option<String>,
        fail: bool,
    }

    #[derive(Default)]
    struct FakeGraphStore {
        rows: Vec<Map<String, Value>>,
        ready: bool,
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn ready(&self) -> Result<bool, StoreError> {
            Ok(!self.fail)
        }

        async fn provision_collection(
            &self,
            _collection: &str,
            _properties: &[(String, FieldType)],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn write_batch(
            &self,
            _collection: &str,
            _objects: &[StorableObject],
        ) -> Result<BatchReport, StoreError> {
            Ok(BatchReport::default())
        }

        async fn near_text(
            &self,
            _collection: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, StoreError> {
            if self.fail {
                return Err(StoreError::Request("store unavailable".to_string()));
            }
            Ok(self.hits.clone())
        }

        async fn generate(
            &self,
            _collection: &str,
            _query: &str,
            _limit: usize,
            _task: &str,
        ) -> Result<GenerativeResult, StoreError> {
            if self.fail {
                return Err(StoreError::Request("store unavailable".to_string()));
            }
            Ok(GenerativeResult {
                generated: self.generated.clone(),
                hits: self.hits.clone(),
            })
        }
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn ready(&self) -> Result<bool, StoreError> {
            Ok(self.ready)
        }

        async fn run_cypher(
            &self,
            _query: &str,
            _parameters: &Map<String, Value>,
        ) -> Result<Vec<Map<String, Value>>, StoreError> {
            Ok(self.rows.clone())
        }

        async fn sync_chunks(&self, _objects: &[StorableObject]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            properties: match json!({"content": "text"}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
            score: Some(0.2),
        }
    }

    #[tokio::test]
    async fn semantic_search_wraps_hits_in_an_envelope() {
        let service = QueryService::new(
            FakeVectorStore {
                hits: vec![hit("a"), hit("b")],
                ..Default::default()
            },
            FakeGraphStore::default(),
            "Docs",
        );

        let response = service.semantic_search("pressure limits", None).await;

        assert!(response.success);
        assert_eq!(response.count, 2);
        assert!(response.message.unwrap().contains("pressure limits"));
    }

    #[tokio::test]
    async fn store_failure_becomes_unsuccessful_envelope() {
        let service = QueryService::new(
            FakeVectorStore {
                fail: true,
                ..Default::default()
            },
            FakeGraphStore::default(),
            "Docs",
        );

        let response = service.semantic_search("anything", Some(5)).await;

        assert!(!response.success);
        assert_eq!(response.count, 0);
        assert!(response.message.unwrap().contains("store unavailable"));
    }

    #[tokio::test]
    async fn generative_search_carries_the_synthesized_answer() {
        let service = QueryService::new(
            FakeVectorStore {
                hits: vec![hit("a")],
                generated: Some("an answer".to_string()),
                ..Default::default()
            },
            FakeGraphStore::default(),
            "Docs",
        );

        let response = service
            .generative_search("question", None, "answer from context")
            .await;

        assert!(response.success);
        assert_eq!(response.generated_text.as_deref(), Some("an answer"));
        assert_eq!(response.count, 1);
    }

    #[tokio::test]
    async fn cypher_rows_pass_through() {
        let mut row = Map::new();
        row.insert("n".to_string(), json!({"id": "doc-1"}));

        let service = QueryService::new(
            FakeVectorStore::default(),
            FakeGraphStore {
                rows: vec![row],
                ready: true,
            },
            "Docs",
        );

        let response = service
            .run_cypher("MATCH (n) RETURN n", &Map::new())
            .await;

        assert!(response.success);
        assert_eq!(response.results[0]["n"], json!({"id": "doc-1"}));
    }

    #[tokio::test]
    async fn unreachable_store_degrades_health_instead_of_crashing() {
        let service = QueryService::new(
            FakeVectorStore {
                fail: true,
                ..Default::default()
            },
            FakeGraphStore {
                ready: false,
                ..Default::default()
            },
            "Docs",
        );

        let health = service.health().await;

        assert!(!health.all_ready());
        assert_eq!(health.graph.status, HealthStatus::Unhealthy);
    }
}
