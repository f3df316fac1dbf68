pub mod neo4j;
pub mod weaviate;

pub use neo4j::{Neo4jConfig, Neo4jStore};
pub use weaviate::{WeaviateConfig, WeaviateStore};
