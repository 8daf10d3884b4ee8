//! Recursive JSON normalizer.
//!
//! Decodes one event's `data` payload, then walks the decoded tree and reinterprets every string
//! leaf that is itself JSON-encoded structure, recording the path of each reinterpretation.

use crate::path::FieldPath;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Default ceiling on the structural depth at which string leaves are still reinterpreted.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Fallback attempted when the raw payload is not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Replace every `\"` with `"` and decode again.
    #[default]
    EscapedQuotes,
    None,
}

impl Recovery {
    /// Rewrite `raw` into a second decode candidate, or None when this strategy has nothing to try.
    fn candidate(self, raw: &str) -> Option<String> {
        match self {
            Recovery::EscapedQuotes if raw.contains("\\\"") => Some(raw.replace("\\\"", "\"")),
            Recovery::EscapedQuotes | Recovery::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub recovery: Recovery,
    pub max_depth: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            recovery: Recovery::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub is_parsed: bool,
    pub data: Value,
    pub parsed_field_paths: Vec<String>,
    pub is_deep_parsed: bool,
}

impl Normalized {
    fn unparsed(raw: &str) -> Self {
        Self {
            is_parsed: false,
            data: Value::String(raw.to_string()),
            parsed_field_paths: Vec::new(),
            is_deep_parsed: false,
        }
    }
}

/// Normalize a raw `data` payload. Never fails: undecodable input comes back as the raw string
/// with `is_parsed == false`.
pub fn normalize(raw: &str, opts: &NormalizeOptions) -> Normalized {
    let decoded = match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(_) => match opts
            .recovery
            .candidate(raw)
            .and_then(|c| serde_json::from_str::<Value>(&c).ok())
        {
            Some(v) => v,
            None => return Normalized::unparsed(raw),
        },
    };
    let (data, paths) = deep_parse(decoded, opts.max_depth);
    let parsed_field_paths: Vec<String> = paths.iter().map(ToString::to_string).collect();
    Normalized {
        is_parsed: true,
        is_deep_parsed: !parsed_field_paths.is_empty(),
        data,
        parsed_field_paths,
    }
}

/// Deep-parse an already decoded value. Returns the new tree and the reinterpreted paths in
/// pre-order.
pub fn deep_parse(value: Value, max_depth: usize) -> (Value, Vec<FieldPath>) {
    let mut walker = DeepParser {
        max_depth,
        paths: Vec::new(),
    };
    let out = walker.visit(value, &FieldPath::root(), 0);
    (out, walker.paths)
}

struct DeepParser {
    max_depth: usize,
    paths: Vec<FieldPath>,
}

impl DeepParser {
    fn visit(&mut self, value: Value, path: &FieldPath, depth: usize) -> Value {
        match value {
            Value::String(s) => self.visit_string(s, path, depth),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.visit(item, &path.index(i), depth + 1))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    let child = self.visit(v, &path.key(&k), depth + 1);
                    out.insert(k, child);
                }
                Value::Object(out)
            }
            scalar => scalar,
        }
    }

    fn visit_string(&mut self, s: String, path: &FieldPath, depth: usize) -> Value {
        if depth >= self.max_depth {
            return Value::String(s);
        }
        match decode_structure(&s) {
            Some(decoded) => {
                self.paths.push(path.clone());
                // The decoded container sits where the string was, so its children are at depth + 1.
                self.visit(decoded, path, depth)
            }
            None => Value::String(s),
        }
    }
}

/// Decode `s` as JSON and return it only if it is an object or array. Scalars, strings
/// included, do not count.
fn decode_structure(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s).ok()? {
        v @ (Value::Object(_) | Value::Array(_)) => Some(v),
        _ => None,
    }
}
