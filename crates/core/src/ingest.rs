use crate::chunking::{chunk_text, should_chunk_field, ChunkingConfig, SplitMarker};
use crate::error::IngestError;
use crate::models::{
    BatchReport, FlatRecord, IngestionOptions, StorableObject, WriteFailure, CHUNK_INDEX,
    CHUNK_MARKER, IS_CHUNKED, ORIGINAL_ID, TOTAL_CHUNKS,
};
use crate::normalize::{chunk_object_id, normalize_record};
use crate::schema::{canonical_iso_date, UnifiedSchema};
use crate::traits::{GraphStore, VectorStore};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_json_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_json = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Top-level elements of one JSON document: a single object counts as a
/// one-element batch, an array contributes each element at its position.
pub fn parse_top_level(path: &Path, text: &str) -> Result<Vec<Value>, IngestError> {
    let parsed: Value = serde_json::from_str(text).map_err(|error| IngestError::JsonParse {
        path: path.to_path_buf(),
        details: error.to_string(),
    })?;

    match parsed {
        Value::Object(_) => Ok(vec![parsed]),
        Value::Array(items) => Ok(items),
        other => Err(IngestError::UnexpectedShape {
            path: path.to_path_buf(),
            found: json_type_name(&other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-record result of the normalize step, visible to callers instead of
/// being swallowed into logging.
#[derive(Debug)]
pub enum RecordOutcome {
    Normalized(Box<FlatRecord>),
    Skipped { record_index: usize, reason: String },
}

pub fn normalize_element(
    element: &Value,
    path: &Path,
    record_index: usize,
    separator: &str,
) -> RecordOutcome {
    match element {
        Value::Object(record) => match normalize_record(record, path, record_index, separator) {
            Ok(flat) => RecordOutcome::Normalized(Box::new(flat)),
            Err(error) => RecordOutcome::Skipped {
                record_index,
                reason: error.to_string(),
            },
        },
        other => RecordOutcome::Skipped {
            record_index,
            reason: format!("expected object, got {}", json_type_name(other)),
        },
    }
}

/// Turn one flattened record into its storable objects.
///
/// Each eligible string field is chunked; the field producing the most
/// fragments becomes the primary (ties broken by field order, which is
/// deterministic), and one object is emitted per primary chunk position
/// with the other chunked fields aligned by index and padded with empty
/// strings when they run out. Secondary chunk boundaries are not
/// semantically aligned with the primary's; the ordering is positional
/// only. Records without chunked fields emit exactly one object.
pub fn emit_objects(record: &FlatRecord, options: &IngestionOptions) -> Vec<StorableObject> {
    let config = ChunkingConfig::from(options);
    let base_id = record.base_id();

    let mut chunked: Vec<(&str, Vec<String>, SplitMarker)> = Vec::new();
    for (key, value) in &record.fields {
        if let Some(text) = value.as_str() {
            if should_chunk_field(text, config) {
                let (chunks, marker) = chunk_text(text, config);
                if chunks.len() > 1 {
                    chunked.push((key, chunks, marker));
                }
            }
        }
    }

    if chunked.is_empty() {
        let mut properties = copy_fields(record, &[]);
        properties.insert(CHUNK_INDEX.into(), Value::from(0u64));
        properties.insert(TOTAL_CHUNKS.into(), Value::from(1u64));
        properties.insert(ORIGINAL_ID.into(), Value::String(base_id.to_string()));
        properties.insert(
            CHUNK_MARKER.into(),
            Value::String(SplitMarker::None.label().to_string()),
        );
        properties.insert(IS_CHUNKED.into(), Value::Bool(false));

        return vec![StorableObject {
            id: base_id,
            properties,
            chunk_field: None,
        }];
    }

    let mut primary = 0;
    for (index, entry) in chunked.iter().enumerate() {
        if entry.1.len() > chunked[primary].1.len() {
            primary = index;
        }
    }
    let (primary_field, primary_chunks, primary_marker) = &chunked[primary];
    let chunked_names: Vec<&str> = chunked.iter().map(|(name, _, _)| *name).collect();
    let total = primary_chunks.len();

    (0..total)
        .map(|position| {
            let mut properties = copy_fields(record, &chunked_names);

            properties.insert(
                (*primary_field).to_string(),
                Value::String(primary_chunks[position].clone()),
            );
            for (field, chunks, _) in &chunked {
                if field == primary_field {
                    continue;
                }
                let aligned = chunks.get(position).cloned().unwrap_or_default();
                properties.insert((*field).to_string(), Value::String(aligned));
            }

            properties.insert(CHUNK_INDEX.into(), Value::from(position as u64));
            properties.insert(TOTAL_CHUNKS.into(), Value::from(total as u64));
            properties.insert(ORIGINAL_ID.into(), Value::String(base_id.to_string()));
            properties.insert(
                CHUNK_MARKER.into(),
                Value::String(primary_marker.label().to_string()),
            );
            properties.insert(IS_CHUNKED.into(), Value::Bool(true));

            StorableObject {
                id: chunk_object_id(&base_id, position),
                properties,
                chunk_field: Some((*primary_field).to_string()),
            }
        })
        .collect()
}

/// Copy every field not in `exclude`, re-serializing ISO-parseable date
/// strings into their canonical form.
fn copy_fields(record: &FlatRecord, exclude: &[&str]) -> Map<String, Value> {
    let mut properties = Map::new();

    for (key, value) in &record.fields {
        if exclude.contains(&key.as_str()) {
            continue;
        }

        let stored = match value.as_str().and_then(canonical_iso_date) {
            Some(canonical) => Value::String(canonical),
            None => value.clone(),
        };
        properties.insert(key.clone(), stored);
    }

    properties
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct SkippedRecord {
    pub source_file: String,
    pub record_index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_processed: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub file_checksums: Vec<(PathBuf, String)>,
    pub records_processed: usize,
    pub skipped_records: Vec<SkippedRecord>,
    pub objects_written: usize,
    pub write_failures: Vec<WriteFailure>,
    pub graph_sync_error: Option<String>,
}

/// Orchestrates one end-to-end ingestion run: discover files, normalize
/// records, build the unified schema, provision the destination
/// collection, then chunk and batch-write every record. The store handles
/// are held for the scope of the run only.
pub struct IngestionDriver<V, G> {
    vector: V,
    graph: G,
    collection: String,
    options: IngestionOptions,
}

impl<V, G> IngestionDriver<V, G>
where
    V: VectorStore + Send + Sync,
    G: GraphStore + Send + Sync,
{
    pub fn new(vector: V, graph: G, collection: impl Into<String>, options: IngestionOptions) -> Self {
        Self {
            vector,
            graph,
            collection: collection.into(),
            options,
        }
    }

    pub async fn run(&self, folder: &Path) -> Result<IngestReport, IngestError> {
        let files = discover_json_files(folder);
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no json files found in {}",
                folder.display()
            )));
        }

        let mut report = IngestReport::default();
        let mut records: Vec<FlatRecord> = Vec::new();

        for path in files {
            let file_result = (|| {
                let checksum = digest_file(&path)?;
                let text = fs::read_to_string(&path)?;
                let elements = parse_top_level(&path, &text)?;
                Ok::<_, IngestError>((checksum, elements))
            })();

            let (checksum, elements) = match file_result {
                Ok(parsed) => parsed,
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "skipped file");
                    report.skipped_files.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let mut file_records = 0usize;
            for (index, element) in elements.iter().enumerate() {
                match normalize_element(element, &path, index, self.options.flatten_separator) {
                    RecordOutcome::Normalized(flat) => {
                        file_records += 1;
                        records.push(*flat);
                    }
                    RecordOutcome::Skipped {
                        record_index,
                        reason,
                    } => {
                        warn!(path = %path.display(), record_index, reason, "skipped record");
                        report.skipped_records.push(SkippedRecord {
                            source_file: path
                                .file_name()
                                .and_then(|name| name.to_str())
                                .unwrap_or_default()
                                .to_string(),
                            record_index,
                            reason,
                        });
                    }
                }
            }

            info!(path = %path.display(), records = file_records, "processed file");
            report.files_processed += 1;
            report.file_checksums.push((path, checksum));
        }

        if records.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no records found in any json file under {}",
                folder.display()
            )));
        }
        report.records_processed = records.len();

        let schema = UnifiedSchema::from_records(records.iter());
        let properties = schema.properties();
        info!(
            collection = %self.collection,
            property_count = properties.len(),
            "provisioning collection with unified schema"
        );

        // Without a destination nothing can be written; this one is fatal.
        self.vector
            .provision_collection(&self.collection, &properties)
            .await
            .map_err(IngestError::Provisioning)?;

        let objects: Vec<StorableObject> = records
            .iter()
            .flat_map(|record| emit_objects(record, &self.options))
            .collect();

        let mut writes = BatchReport::default();
        for batch in objects.chunks(self.options.batch_size.max(1)) {
            match self.vector.write_batch(&self.collection, batch).await {
                Ok(batch_report) => writes.merge(batch_report),
                Err(error) => {
                    // The batch call itself failed; every object in it is
                    // recorded and the run moves on to the next batch.
                    warn!(%error, batch_size = batch.len(), "batch write failed");
                    writes.failures.extend(batch.iter().map(|object| WriteFailure {
                        id: object.id.to_string(),
                        details: error.to_string(),
                    }));
                }
            }
        }
        report.objects_written = writes.written;
        report.write_failures = writes.failures;

        if self.options.sync_graph {
            if let Err(error) = self.graph.sync_chunks(&objects).await {
                warn!(%error, "graph sync failed");
                report.graph_sync_error = Some(error.to_string());
            }
        }

        info!(
            files = report.files_processed,
            files_skipped = report.skipped_files.len(),
            records = report.records_processed,
            records_skipped = report.skipped_records.len(),
            objects_written = report.objects_written,
            write_failures = report.write_failures.len(),
            "ingestion run complete"
        );

        Ok(report)
    }
}
