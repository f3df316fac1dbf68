use crate::error::IngestError;
use crate::models::{FlatRecord, RECORD_INDEX, SOURCE_FILE, SOURCE_FILENAME};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

/// Flatten one raw record into a single-level mapping.
///
/// Nested mappings are collapsed by joining parent and child keys with
/// `separator`. The walk uses an explicit work stack, so document depth is
/// bounded by memory rather than the call stack. Lists of scalars survive
/// as arrays (the schema unifier types them); lists holding nested
/// structure are JSON-stringified, and nulls become empty strings.
pub fn flatten_record(record: &Map<String, Value>, separator: &str) -> Map<String, Value> {
    let mut flat = Map::new();
    let mut stack: Vec<(String, &Value)> = record
        .iter()
        .rev()
        .map(|(key, value)| (key.clone(), value))
        .collect();

    while let Some((path, value)) = stack.pop() {
        match value {
            Value::Object(nested) => {
                for (key, child) in nested.iter().rev() {
                    stack.push((format!("{path}{separator}{key}"), child));
                }
            }
            other => {
                flat.insert(path, normalize_leaf(other));
            }
        }
    }

    flat
}

fn normalize_leaf(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Array(items) => {
            let all_scalar = items
                .iter()
                .all(|item| !matches!(item, Value::Object(_) | Value::Array(_)));
            if all_scalar {
                value.clone()
            } else {
                Value::String(value.to_string())
            }
        }
        other => other.clone(),
    }
}

/// Flatten a raw record and tag it with its (file, index) identity.
/// The tags are also injected as fields so they land in the unified schema.
pub fn normalize_record(
    record: &Map<String, Value>,
    source_path: &Path,
    record_index: usize,
    separator: &str,
) -> Result<FlatRecord, IngestError> {
    let source_file = source_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", source_path.display()))
        })?
        .to_string();

    let source_filename = source_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(&source_file)
        .to_string();

    let mut fields = flatten_record(record, separator);
    fields.insert(SOURCE_FILE.into(), Value::String(source_file.clone()));
    fields.insert(SOURCE_FILENAME.into(), Value::String(source_filename.clone()));
    fields.insert(RECORD_INDEX.into(), Value::from(record_index as u64));

    Ok(FlatRecord {
        source_file,
        source_filename,
        record_index,
        fields,
    })
}

/// Deterministic base identifier for a record: UUIDv5 over the composite
/// `"{source_file}_{record_index}"` key. Re-running ingestion on unchanged
/// input derives the same identifier, making writes idempotent upserts.
pub fn base_object_id(source_file: &str, record_index: usize) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{source_file}_{record_index}").as_bytes(),
    )
}

/// Identifier for the emitted object at one chunk position.
pub fn chunk_object_id(base: &Uuid, chunk_index: usize) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{base}_{chunk_index}").as_bytes())
}

impl FlatRecord {
    pub fn base_id(&self) -> Uuid {
        base_object_id(&self.source_file, self.record_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn nested_mappings_flatten_with_joined_keys() {
        let record = as_map(json!({
            "title": "A",
            "meta": {"author": {"name": "B"}, "year": 2021}
        }));

        let flat = flatten_record(&record, "_");

        assert_eq!(flat["title"], json!("A"));
        assert_eq!(flat["meta_author_name"], json!("B"));
        assert_eq!(flat["meta_year"], json!(2021));
        assert!(flat.values().all(|value| !value.is_object()));
    }

    #[test]
    fn deep_nesting_does_not_exhaust_the_call_stack() {
        let mut value = json!({"leaf": "end"});
        for _ in 0..500 {
            value = json!({"level": value});
        }

        let flat = flatten_record(&as_map(value), "_");

        let key = format!("{}_leaf", vec!["level"; 500].join("_"));
        assert_eq!(flat[&key], json!("end"));
    }

    #[test]
    fn nulls_become_empty_strings() {
        let flat = flatten_record(&as_map(json!({"a": null})), "_");
        assert_eq!(flat["a"], json!(""));
    }

    #[test]
    fn scalar_lists_survive_but_structured_lists_are_stringified() {
        let record = as_map(json!({
            "tags": ["x", "y"],
            "rows": [{"cell": 1}]
        }));

        let flat = flatten_record(&record, "_");

        assert_eq!(flat["tags"], json!(["x", "y"]));
        assert_eq!(flat["rows"], json!(r#"[{"cell":1}]"#));
    }

    #[test]
    fn metadata_tags_are_injected_as_fields() {
        let record = as_map(json!({"a": 1}));
        let flat = normalize_record(&record, Path::new("/data/notes.json"), 3, "_").unwrap();

        assert_eq!(flat.source_file, "notes.json");
        assert_eq!(flat.source_filename, "notes");
        assert_eq!(flat.record_index, 3);
        assert_eq!(flat.fields["source_file"], json!("notes.json"));
        assert_eq!(flat.fields["record_index"], json!(3));
    }

    #[test]
    fn identifiers_are_stable_and_position_sensitive() {
        let first = base_object_id("notes.json", 0);
        let again = base_object_id("notes.json", 0);
        let other = base_object_id("notes.json", 1);

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(chunk_object_id(&first, 2), chunk_object_id(&first, 2));
        assert_ne!(chunk_object_id(&first, 0), chunk_object_id(&first, 1));
    }
}
