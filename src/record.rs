//! Event record: one segmented SSE event with its normalized `data` payload.
//!
//! Serialized as one JSON object: custom fields spread at the top level, then data, rawData,
//! isParsed, isDeepParsed, parsedFieldPaths.

use crate::normalize::Normalized;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Field name/value pairs of one event in first-seen order. Setting an existing name overwrites
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// One parsed SSE event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    pub fields: Fields,
    pub raw_data: Option<String>,
    pub data: Option<Value>,
    pub is_parsed: bool,
    pub is_deep_parsed: bool,
    pub parsed_field_paths: Vec<String>,
}

impl EventRecord {
    /// Build a record from accumulated fields and an optional normalized payload.
    pub fn new(fields: Fields, payload: Option<(String, Normalized)>) -> Self {
        match payload {
            Some((raw, n)) => Self {
                fields,
                raw_data: Some(raw),
                data: Some(n.data),
                is_parsed: n.is_parsed,
                is_deep_parsed: n.is_deep_parsed,
                parsed_field_paths: n.parsed_field_paths,
            },
            None => Self {
                fields,
                ..Default::default()
            },
        }
    }

    /// The `event` field, if set.
    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("event")
    }

    /// Flatten into a JSON object. Reserved keys win over custom fields of the same name.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (name, value) in self.fields.iter() {
            obj.insert(name.to_string(), Value::String(value.to_string()));
        }
        if let (Some(data), Some(raw)) = (&self.data, &self.raw_data) {
            obj.insert("data".to_string(), data.clone());
            obj.insert("rawData".to_string(), Value::String(raw.clone()));
        }
        obj.insert("isParsed".to_string(), Value::Bool(self.is_parsed));
        obj.insert("isDeepParsed".to_string(), Value::Bool(self.is_deep_parsed));
        obj.insert(
            "parsedFieldPaths".to_string(),
            Value::Array(
                self.parsed_field_paths
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        );
        Value::Object(obj)
    }

    /// Serialize to one NDJSON line (no trailing newline; caller adds).
    pub fn to_json_line(&self) -> anyhow::Result<String> {
        serde_json::to_string(&self.to_value()).map_err(anyhow::Error::from)
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
