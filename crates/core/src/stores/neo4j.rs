use crate::error::StoreError;
use crate::models::{StorableObject, CHUNK_INDEX, CHUNK_MARKER, ORIGINAL_ID, SOURCE_FILE, TOTAL_CHUNKS};
use crate::traits::GraphStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use url::Url;

/// Connection settings for one Neo4j deployment, passed explicitly to
/// [`Neo4jStore::new`].
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub endpoint: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

pub struct Neo4jStore {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jStore {
    pub fn new(config: Neo4jConfig) -> Result<Self, StoreError> {
        Url::parse(&config.endpoint)?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database: config.database,
            username: config.username,
            password: config.password,
            client: Client::new(),
        })
    }

    fn tx_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }

    async fn commit(&self, statements: Vec<Value>) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.tx_url())
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "neo4j".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;

        // The transactional endpoint reports statement errors with HTTP 200.
        if let Some(errors) = body.pointer("/errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(StoreError::BackendResponse {
                    backend: "neo4j".to_string(),
                    details: errors
                        .iter()
                        .filter_map(|error| error.pointer("/message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; "),
                });
            }
        }

        Ok(body)
    }

    async fn ensure_constraints(&self) -> Result<(), StoreError> {
        let constraints = [
            "CREATE CONSTRAINT document_id IF NOT EXISTS FOR (d:Document) REQUIRE d.id IS UNIQUE",
            "CREATE CONSTRAINT chunk_id IF NOT EXISTS FOR (c:Chunk) REQUIRE c.id IS UNIQUE",
        ];

        for constraint in constraints {
            self.commit(vec![json!({ "statement": constraint })]).await?;
        }

        Ok(())
    }
}

/// Parameter rows for the chunk-sync statement. The chunk's text content
/// is looked up through `chunk_field`; objects emitted without chunking
/// mirror with null content and field name.
fn sync_rows(objects: &[StorableObject]) -> Vec<Value> {
    objects
        .iter()
        .map(|object| {
            let content = object
                .chunk_field
                .as_deref()
                .and_then(|field| object.properties.get(field))
                .cloned()
                .unwrap_or(Value::Null);
            json!({
                "chunk_id": object.id,
                "doc_id": object.properties.get(ORIGINAL_ID),
                "source_file": object.properties.get(SOURCE_FILE),
                "field_name": object.chunk_field,
                "content": content,
                "chunk_index": object.properties.get(CHUNK_INDEX),
                "total_chunks": object.properties.get(TOTAL_CHUNKS),
                "chunk_marker": object.properties.get(CHUNK_MARKER),
            })
        })
        .collect()
}

/// Zip `columns` with each `data[].row` into one map per result row.
fn rows_from_commit_payload(body: &Value) -> Vec<Map<String, Value>> {
    let Some(result) = body.pointer("/results/0") else {
        return Vec::new();
    };

    let columns: Vec<&str> = result
        .pointer("/columns")
        .and_then(Value::as_array)
        .map(|columns| columns.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let entries = result
        .pointer("/data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    entries
        .into_iter()
        .filter_map(|entry| {
            let row = entry.pointer("/row")?.as_array()?.clone();
            let mut mapped = Map::new();
            for (column, value) in columns.iter().zip(row) {
                mapped.insert((*column).to_string(), value);
            }
            Some(mapped)
        })
        .collect()
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ready(&self) -> Result<bool, StoreError> {
        match self.commit(vec![json!({ "statement": "RETURN 1" })]).await {
            Ok(_) => Ok(true),
            Err(StoreError::Http(error)) => {
                tracing::debug!(%error, "neo4j readiness probe failed");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    async fn run_cypher(
        &self,
        query: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Vec<Map<String, Value>>, StoreError> {
        let body = self
            .commit(vec![json!({
                "statement": query,
                "parameters": parameters,
            })])
            .await?;

        Ok(rows_from_commit_payload(&body))
    }

    async fn sync_chunks(&self, objects: &[StorableObject]) -> Result<(), StoreError> {
        if objects.is_empty() {
            return Ok(());
        }

        self.ensure_constraints().await?;

        let rows = sync_rows(objects);

        let cypher = r#"
            UNWIND $rows AS row
            MERGE (d:Document {id: row.doc_id})
            SET d.source_file = row.source_file
            MERGE (c:Chunk {id: row.chunk_id})
            SET c.content = row.content,
                c.field_name = row.field_name,
                c.chunk_index = row.chunk_index,
                c.total_chunks = row.total_chunks,
                c.chunk_marker = row.chunk_marker
            MERGE (d)-[:HAS_CHUNK]->(c)
            RETURN count(c) AS chunk_count;
        "#;

        let body = self
            .commit(vec![json!({
                "statement": cypher,
                "parameters": { "rows": rows },
            })])
            .await?;

        let synced = body
            .pointer("/results/0/data/0/row/0")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        tracing::info!(chunks = synced, "graph sync complete");

        Ok(())
    }
}
