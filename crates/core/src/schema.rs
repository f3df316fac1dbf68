use crate::models::{
    FlatRecord, CHUNK_INDEX, CHUNK_MARKER, IS_CHUNKED, ORIGINAL_ID, TOTAL_CHUNKS,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primitive property types understood by the destination collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Date,
    Int,
    Number,
    Boolean,
    TextArray,
    IntArray,
    NumberArray,
}

impl FieldType {
    /// Wire name used in collection provisioning calls.
    pub fn as_store_type(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Int => "int",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::TextArray => "text[]",
            FieldType::IntArray => "int[]",
            FieldType::NumberArray => "number[]",
        }
    }
}

/// Parse `value` as an ISO-8601 date or datetime, returning its canonical
/// serialized form. Accepts RFC 3339, naive datetimes, and bare dates.
pub fn canonical_iso_date(value: &str) -> Option<String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.to_rfc3339());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

/// Infer the storable type of one flattened value.
///
/// Strings that parse as ISO-8601 dates become `Date`; homogeneous scalar
/// lists become the matching array variant, mixed lists fall back to
/// `TextArray`; everything unrecognized is `Text`.
pub fn infer_field_type(value: &Value) -> FieldType {
    match value {
        Value::String(text) => {
            if canonical_iso_date(text).is_some() {
                FieldType::Date
            } else {
                FieldType::Text
            }
        }
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                FieldType::Int
            } else {
                FieldType::Number
            }
        }
        Value::Array(items) => {
            if !items.is_empty() && items.iter().all(Value::is_i64) {
                FieldType::IntArray
            } else if !items.is_empty() && items.iter().all(Value::is_f64) {
                FieldType::NumberArray
            } else {
                FieldType::TextArray
            }
        }
        _ => FieldType::Text,
    }
}

/// Chunk-bookkeeping properties appended to every unified schema.
pub const METADATA_PROPERTIES: [(&str, FieldType); 5] = [
    (CHUNK_INDEX, FieldType::Int),
    (TOTAL_CHUNKS, FieldType::Int),
    (ORIGINAL_ID, FieldType::Text),
    (CHUNK_MARKER, FieldType::Text),
    (IS_CHUNKED, FieldType::Boolean),
];

/// One consistent type per field across an entire batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedSchema {
    pub fields: BTreeMap<String, FieldType>,
}

impl UnifiedSchema {
    /// Scan every record and field, inferring a type per field. A type
    /// conflict between records degrades the field to `Text`, and that
    /// degradation is monotonic regardless of observation order. Null and
    /// empty values carry no type signal and are skipped.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FlatRecord>) -> Self {
        let mut fields: BTreeMap<String, FieldType> = BTreeMap::new();

        for record in records {
            for (key, value) in &record.fields {
                if value.is_null() || value.as_str().is_some_and(str::is_empty) {
                    continue;
                }

                let inferred = infer_field_type(value);
                fields
                    .entry(key.clone())
                    .and_modify(|existing| {
                        if *existing != inferred {
                            *existing = FieldType::Text;
                        }
                    })
                    .or_insert(inferred);
            }
        }

        Self { fields }
    }

    /// Full property list for collection provisioning: every inferred
    /// field followed by the fixed metadata properties.
    pub fn properties(&self) -> Vec<(String, FieldType)> {
        let mut properties: Vec<(String, FieldType)> = self
            .fields
            .iter()
            .map(|(name, field_type)| (name.clone(), *field_type))
            .collect();

        properties.extend(
            METADATA_PROPERTIES
                .iter()
                .map(|(name, field_type)| ((*name).to_string(), *field_type)),
        );

        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Value) -> FlatRecord {
        FlatRecord {
            source_file: "test.json".into(),
            source_filename: "test".into(),
            record_index: 0,
            fields: match fields {
                Value::Object(map) => map,
                other => panic!("expected object, got {other}"),
            },
        }
    }

    #[test]
    fn scalar_types_are_inferred() {
        assert_eq!(infer_field_type(&json!("plain")), FieldType::Text);
        assert_eq!(infer_field_type(&json!("2023-04-01")), FieldType::Date);
        assert_eq!(
            infer_field_type(&json!("2023-04-01T10:30:00+02:00")),
            FieldType::Date
        );
        assert_eq!(infer_field_type(&json!(true)), FieldType::Boolean);
        assert_eq!(infer_field_type(&json!(7)), FieldType::Int);
        assert_eq!(infer_field_type(&json!(7.5)), FieldType::Number);
    }

    #[test]
    fn homogeneous_lists_get_array_variants() {
        assert_eq!(infer_field_type(&json!([1, 2])), FieldType::IntArray);
        assert_eq!(infer_field_type(&json!([1.5, 2.5])), FieldType::NumberArray);
        assert_eq!(infer_field_type(&json!(["a", "b"])), FieldType::TextArray);
        // Mixed element types fall back to the text-array variant.
        assert_eq!(infer_field_type(&json!([1.5, 2])), FieldType::TextArray);
        assert_eq!(infer_field_type(&json!(["a", 1])), FieldType::TextArray);
    }

    #[test]
    fn conflicting_types_degrade_to_text_in_any_order() {
        let int_record = record(json!({"a": 1}));
        let text_record = record(json!({"a": "x"}));

        let forward = UnifiedSchema::from_records([&int_record, &text_record]);
        let backward = UnifiedSchema::from_records([&text_record, &int_record]);

        assert_eq!(forward.fields["a"], FieldType::Text);
        assert_eq!(backward.fields["a"], FieldType::Text);
    }

    #[test]
    fn text_never_reverts_after_degradation() {
        let records = [
            record(json!({"x": 1})),
            record(json!({"x": "s"})),
            record(json!({"x": 2})),
            record(json!({"x": 3})),
        ];

        let schema = UnifiedSchema::from_records(records.iter());
        assert_eq!(schema.fields["x"], FieldType::Text);
    }

    #[test]
    fn nulls_and_empty_strings_carry_no_signal() {
        let records = [record(json!({"a": "", "b": null})), record(json!({"a": 5}))];
        let schema = UnifiedSchema::from_records(records.iter());

        assert_eq!(schema.fields["a"], FieldType::Int);
        assert!(!schema.fields.contains_key("b"));
    }

    #[test]
    fn metadata_properties_are_always_appended() {
        let schema = UnifiedSchema::from_records([&record(json!({"a": 1}))]);
        let properties = schema.properties();

        assert_eq!(properties.len(), 1 + METADATA_PROPERTIES.len());
        assert!(properties
            .iter()
            .any(|(name, field_type)| name == "is_chunked" && *field_type == FieldType::Boolean));
        assert!(properties
            .iter()
            .any(|(name, field_type)| name == "original_id" && *field_type == FieldType::Text));
    }
}
