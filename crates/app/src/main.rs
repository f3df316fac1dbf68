use chrono::Utc;
use clap::{Parser, Subcommand};
use json_rag_core::{
    IngestionDriver, IngestionOptions, Neo4jConfig, Neo4jStore, QueryService, WeaviateConfig,
    WeaviateStore,
};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "json-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Weaviate base URL
    #[arg(long, default_value = "http://localhost:8080")]
    weaviate_url: String,

    /// Weaviate API key, if the deployment requires one
    #[arg(long, env = "WEAVIATE_API_KEY")]
    weaviate_api_key: Option<String>,

    /// OpenAI API key forwarded to Weaviate's vectorizer modules
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Destination collection name
    #[arg(long, default_value = "RagProject")]
    collection: String,

    /// Neo4j HTTP endpoint
    #[arg(long, default_value = "http://localhost:7474")]
    neo4j_url: String,

    /// Neo4j database name
    #[arg(long, default_value = "neo4j")]
    neo4j_db: String,

    /// Neo4j username
    #[arg(long, default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", default_value = "password")]
    neo4j_password: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every JSON file under a folder into the collection.
    Ingest {
        /// Folder searched recursively for .json files.
        #[arg(long)]
        folder: String,
        /// Mirror emitted objects as Document/Chunk nodes in Neo4j.
        #[arg(long, default_value_t = false)]
        sync_graph: bool,
        /// Objects per batched upsert call.
        #[arg(long, default_value = "100")]
        batch_size: usize,
    },
    /// Semantic similarity search over the collection.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Retrieval-augmented generation over the top results.
    Generate {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of source results to ground the answer on.
        #[arg(long)]
        limit: Option<usize>,
        /// Instruction applied to the grouped results.
        #[arg(long, default_value = "Summarize the key points of these results.")]
        task: String,
    },
    /// Run a read-only Cypher statement against Neo4j.
    Cypher {
        /// Cypher statement
        #[arg(long)]
        query: String,
        /// Statement parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Probe both stores and report readiness.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let vector = WeaviateStore::new(WeaviateConfig {
        endpoint: cli.weaviate_url.clone(),
        api_key: cli.weaviate_api_key.clone(),
        openai_api_key: cli.openai_api_key.clone(),
    })
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let graph = Neo4jStore::new(Neo4jConfig {
        endpoint: cli.neo4j_url.clone(),
        database: cli.neo4j_db.clone(),
        username: cli.neo4j_user.clone(),
        password: cli.neo4j_password.clone(),
    })
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "json-rag boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            sync_graph,
            batch_size,
        } => {
            let options = IngestionOptions {
                sync_graph,
                batch_size,
                ..IngestionOptions::default()
            };
            let driver = IngestionDriver::new(vector, graph, cli.collection, options);

            let report = driver
                .run(Path::new(&folder))
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
            for skipped in &report.skipped_records {
                warn!(
                    file = %skipped.source_file,
                    record_index = skipped.record_index,
                    reason = %skipped.reason,
                    "skipped record"
                );
            }
            for failure in &report.write_failures {
                warn!(id = %failure.id, details = %failure.details, "write failure");
            }
            if let Some(error) = &report.graph_sync_error {
                warn!(%error, "graph sync failed");
            }

            println!(
                "{} objects from {} records ({} files) ingested at {}",
                report.objects_written,
                report.records_processed,
                report.files_processed,
                Utc::now().to_rfc3339()
            );
            if !report.write_failures.is_empty() {
                println!("{} objects failed to write", report.write_failures.len());
            }
        }
        Command::Search { query, limit } => {
            let service = QueryService::new(vector, graph, cli.collection);
            let response = service.semantic_search(&query, limit).await;

            if let Some(message) = &response.message {
                println!("{message}");
            }
            for hit in response.results {
                match hit.score {
                    Some(score) => println!("[{}] distance={score:.4}", hit.id),
                    None => println!("[{}]", hit.id),
                }
                println!("{}", serde_json::to_string_pretty(&hit.properties)?);
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Generate { query, limit, task } => {
            let service = QueryService::new(vector, graph, cli.collection);
            let response = service.generative_search(&query, limit, &task).await;

            if let Some(generated) = &response.generated_text {
                println!("{generated}\n");
            }
            if let Some(message) = &response.message {
                println!("{message}");
            }
            for hit in response.source_results {
                println!("[{}]", hit.id);
                println!("{}", serde_json::to_string_pretty(&hit.properties)?);
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Cypher { query, params } => {
            let parameters: Map<String, Value> = serde_json::from_str(&params)
                .map_err(|error| anyhow::anyhow!("--params must be a JSON object: {error}"))?;

            let service = QueryService::new(vector, graph, cli.collection);
            let response = service.run_cypher(&query, &parameters).await;

            if let Some(message) = &response.message {
                println!("{message}");
            }
            for row in response.results {
                println!("{}", serde_json::to_string_pretty(&row)?);
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Health => {
            let service = QueryService::new(vector, graph, cli.collection);
            let health = service.health().await;

            println!("{}", serde_json::to_string_pretty(&health)?);
            if !health.all_ready() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
