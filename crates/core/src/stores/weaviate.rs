use crate::error::StoreError;
use crate::models::{BatchReport, SearchHit, StorableObject, WriteFailure};
use crate::schema::FieldType;
use crate::traits::{GenerativeResult, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;

/// Connection settings for one Weaviate deployment. Passed explicitly to
/// [`WeaviateStore::new`]; there is no process-wide client state.
#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

pub struct WeaviateStore {
    endpoint: String,
    api_key: Option<String>,
    openai_api_key: Option<String>,
    client: Client,
}

impl WeaviateStore {
    pub fn new(config: WeaviateConfig) -> Result<Self, StoreError> {
        Url::parse(&config.endpoint)?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            openai_api_key: config.openai_api_key,
            client: Client::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.endpoint, path));

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(key) = &self.openai_api_key {
            builder = builder.header("X-OpenAI-Api-Key", key);
        }

        builder
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("/v1/schema/{collection}"))
            .send()
            .await?;

        Ok(response.status() == StatusCode::OK)
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("/v1/schema/{collection}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: format!("delete collection failed: {}", response.status()),
            });
        }
        Ok(())
    }

    /// Property names of the live class, used to build GraphQL selections.
    async fn collection_property_names(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let response = self
            .request(Method::GET, &format!("/v1/schema/{collection}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: format!("schema lookup failed: {}", response.status()),
            });
        }

        let body: Value = response.json().await?;
        let names = body
            .pointer("/properties")
            .and_then(Value::as_array)
            .map(|properties| {
                properties
                    .iter()
                    .filter_map(|property| property.pointer("/name").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(names)
    }

    async fn graphql(&self, query: String) -> Result<Value, StoreError> {
        let response = self
            .request(Method::POST, "/v1/graphql")
            .json(&json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body.pointer("/errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(StoreError::BackendResponse {
                    backend: "weaviate".to_string(),
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
}

/// Quote a string as a GraphQL literal; JSON string escaping is valid
/// GraphQL string escaping.
fn graphql_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Pull ranked hits out of a GraphQL `Get` payload. The `_additional`
/// block carries id and distance and is stripped from the properties.
fn hits_from_get_payload(payload: &Value, collection: &str) -> Vec<SearchHit> {
    let objects = payload
        .pointer(&format!("/data/Get/{collection}"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    objects
        .into_iter()
        .filter_map(|object| match object {
            Value::Object(mut properties) => {
                let additional = properties.remove("_additional").unwrap_or(Value::Null);
                let id = additional
                    .pointer("/id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let score = additional.pointer("/distance").and_then(Value::as_f64);
                Some(SearchHit {
                    id,
                    properties,
                    score,
                })
            }
            _ => None,
        })
        .collect()
}

/// The grouped generative answer, surfaced on whichever object carries it.
fn generated_from_get_payload(payload: &Value, collection: &str) -> Option<String> {
    payload
        .pointer(&format!("/data/Get/{collection}"))
        .and_then(Value::as_array)?
        .iter()
        .find_map(|object| {
            object
                .pointer("/_additional/generate/groupedResult")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
}

/// Per-object batch results: a failed object is collected, not fatal.
fn batch_report_from_response(body: &Value) -> BatchReport {
    let mut report = BatchReport::default();

    for entry in body.as_array().map(Vec::as_slice).unwrap_or_default() {
        let failed = entry
            .pointer("/result/status")
            .and_then(Value::as_str)
            .is_some_and(|status| status.eq_ignore_ascii_case("failed"));

        if failed {
            let id = entry
                .pointer("/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let details = entry
                .pointer("/result/errors")
                .map(Value::to_string)
                .unwrap_or_else(|| "unknown write error".to_string());
            report.failures.push(WriteFailure { id, details });
        } else {
            report.written += 1;
        }
    }

    report
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn ready(&self) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, "/v1/.well-known/ready")
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn provision_collection(
        &self,
        collection: &str,
        properties: &[(String, FieldType)],
    ) -> Result<(), StoreError> {
        if self.collection_exists(collection).await? {
            tracing::warn!(collection, "collection already exists, recreating");
            self.delete_collection(collection).await?;
        }

        let property_defs: Vec<Value> = properties
            .iter()
            .map(|(name, field_type)| {
                json!({
                    "name": name,
                    "dataType": [field_type.as_store_type()],
                })
            })
            .collect();

        let response = self
            .request(Method::POST, "/v1/schema")
            .json(&json!({
                "class": collection,
                "vectorizer": "text2vec-openai",
                "moduleConfig": {
                    "text2vec-openai": {},
                    "generative-openai": {},
                },
                "properties": property_defs,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: format!("create collection failed: {}", response.status()),
            });
        }

        Ok(())
    }

    async fn write_batch(
        &self,
        collection: &str,
        objects: &[StorableObject],
    ) -> Result<BatchReport, StoreError> {
        if objects.is_empty() {
            return Ok(BatchReport::default());
        }

        let payload: Vec<Value> = objects
            .iter()
            .map(|object| {
                json!({
                    "class": collection,
                    "id": object.id,
                    "properties": object.properties,
                })
            })
            .collect();

        let response = self
            .request(Method::POST, "/v1/batch/objects")
            .json(&json!({ "objects": payload }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "weaviate".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(batch_report_from_response(&body))
    }

    async fn near_text(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let selection = self.collection_property_names(collection).await?.join(" ");
        let graphql = format!(
            "{{ Get {{ {collection}(limit: {limit}, nearText: {{concepts: [{}]}}) \
             {{ {selection} _additional {{ id distance }} }} }} }}",
            graphql_string(query)
        );

        let body = self.graphql(graphql).await?;
        Ok(hits_from_get_payload(&body, collection))
    }

    async fn generate(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        task: &str,
    ) -> Result<GenerativeResult, StoreError> {
        let selection = self.collection_property_names(collection).await?.join(" ");
        let graphql = format!(
            "{{ Get {{ {collection}(limit: {limit}, nearText: {{concepts: [{}]}}) \
             {{ {selection} _additional {{ id distance \
             generate(groupedResult: {{task: {}}}) {{ groupedResult error }} }} }} }} }}",
            graphql_string(query),
            graphql_string(task)
        );

        let body = self.graphql(graphql).await?;
        let generated = generated_from_get_payload(&body, collection);
        let hits = hits_from_get_payload(&body, collection);

        Ok(GenerativeResult { generated, hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hits_are_extracted_with_additional_block_stripped() {
        let payload = json!({
            "data": { "Get": { "Docs": [
                {
                    "content": "chunk text",
                    "title": "A",
                    "_additional": { "id": "abc-123", "distance": 0.18 }
                }
            ]}}
        });

        let hits = hits_from_get_payload(&payload, "Docs");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "abc-123");
        assert_eq!(hits[0].score, Some(0.18));
        assert_eq!(hits[0].properties["content"], json!("chunk text"));
        assert!(!hits[0].properties.contains_key("_additional"));
    }

    #[test]
    fn grouped_generative_answer_is_found_on_any_object() {
        let payload = json!({
            "data": { "Get": { "Docs": [
                { "_additional": { "generate": { "groupedResult": null } } },
                { "_additional": { "generate": { "groupedResult": "the answer" } } }
            ]}}
        });

        assert_eq!(
            generated_from_get_payload(&payload, "Docs"),
            Some("the answer".to_string())
        );

        // Generative metadata rides inside _additional, so the hits carry
        // no trace of it in their properties.
        let hits = hits_from_get_payload(&payload, "Docs");
        assert!(hits
            .iter()
            .all(|hit| !hit.properties.contains_key("generate")
                && !hit.properties.contains_key("_additional")));
    }

    #[test]
    fn batch_report_collects_failures_without_failing_successes() {
        let body = json!([
            { "id": "a", "result": { "status": "SUCCESS" } },
            { "id": "b", "result": { "status": "FAILED", "errors": { "error": [{"message": "boom"}] } } },
            { "id": "c", "result": {} }
        ]);

        let report = batch_report_from_response(&body);

        assert_eq!(report.written, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "b");
        assert!(report.failures[0].details.contains("boom"));
    }

    #[test]
    fn graphql_strings_escape_quotes_and_newlines() {
        assert_eq!(graphql_string(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(graphql_string("a\nb"), r#""a\nb""#);
    }
}
