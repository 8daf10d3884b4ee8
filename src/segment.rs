//! Event segmenter: splits buffered SSE text into event records.
//!
//! SSE framing:
//! - `name: value` - field line, split at the first colon
//! - `data: <payload>` - payload line, normalized when the event is finalized
//! - Empty line - ends the current event
//! - Lines without a colon are skipped
//!
//! The segmenter never fails. Anything it cannot classify is ignored.

use crate::normalize::{NormalizeOptions, normalize};
use crate::record::{EventRecord, Fields};
use serde::Deserialize;
use tracing::debug;

/// How repeated `data` lines within one event combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLineMode {
    /// The latest `data` line replaces earlier ones.
    #[default]
    Overwrite,
    /// Lines are joined with `\n`, as the SSE standard describes.
    Concatenate,
}

/// One classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    Empty,
    Data(&'a str),
    Field(&'a str, &'a str),
    /// No colon; skipped.
    Ignored,
}

/// Classify one raw line. Surrounding whitespace (including a trailing `\r`) is trimmed.
pub fn classify_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Empty;
    }
    let Some((name, value)) = line.split_once(':') else {
        return SseLine::Ignored;
    };
    let (name, value) = (name.trim(), value.trim());
    if name == "data" {
        SseLine::Data(value)
    } else {
        SseLine::Field(name, value)
    }
}

/// Accumulates lines and emits finalized records.
#[derive(Debug, Default)]
pub struct Segmenter {
    data_lines: DataLineMode,
    normalize: NormalizeOptions,
    fields: Fields,
    pending_data: Option<String>,
    events: Vec<EventRecord>,
}

impl Segmenter {
    pub fn new(data_lines: DataLineMode, normalize: NormalizeOptions) -> Self {
        Self {
            data_lines,
            normalize,
            ..Default::default()
        }
    }

    /// Feed one line.
    pub fn feed_line(&mut self, line: &str) {
        match classify_line(line) {
            SseLine::Empty => self.flush(),
            SseLine::Data(value) => self.push_data(value),
            SseLine::Field(name, value) => self.fields.set(name, value),
            SseLine::Ignored => {}
        }
    }

    fn push_data(&mut self, value: &str) {
        match (&mut self.pending_data, self.data_lines) {
            (Some(existing), DataLineMode::Concatenate) => {
                existing.push('\n');
                existing.push_str(value);
            }
            (slot, _) => *slot = Some(value.to_string()),
        }
    }

    /// Finalize the current event if it holds any field or data.
    fn flush(&mut self) {
        // An empty `data:` value carries no payload.
        let data = self.pending_data.take().filter(|d| !d.is_empty());
        if self.fields.is_empty() && data.is_none() {
            return;
        }
        let fields = std::mem::take(&mut self.fields);
        let payload = data.map(|raw| {
            let n = normalize(&raw, &self.normalize);
            (raw, n)
        });
        let record = EventRecord::new(fields, payload);
        debug!(
            index = self.events.len(),
            event = record.event_type().unwrap_or(""),
            is_parsed = record.is_parsed,
            deep_paths = record.parsed_field_paths.len(),
            "event finalized"
        );
        self.events.push(record);
    }

    /// Flush any unterminated event and return all records in input order.
    pub fn finish(mut self) -> Vec<EventRecord> {
        self.flush();
        self.events
    }
}

/// Segment a whole text blob.
pub fn segment(text: &str, data_lines: DataLineMode, opts: &NormalizeOptions) -> Vec<EventRecord> {
    let mut segmenter = Segmenter::new(data_lines, *opts);
    for line in text.split('\n') {
        segmenter.feed_line(line);
    }
    segmenter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(text: &str) -> Vec<EventRecord> {
        segment(text, DataLineMode::Overwrite, &NormalizeOptions::default())
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify_line("   "), SseLine::Empty);
        assert_eq!(classify_line("\r"), SseLine::Empty);
        assert_eq!(classify_line("data: {\"a\":1}\r"), SseLine::Data("{\"a\":1}"));
        assert_eq!(classify_line("event : update"), SseLine::Field("event", "update"));
        assert_eq!(classify_line("url: http://x/y"), SseLine::Field("url", "http://x/y"));
        assert_eq!(classify_line(": keepalive"), SseLine::Field("", "keepalive"));
        assert_eq!(classify_line("no colon here"), SseLine::Ignored);
    }

    #[test]
    fn plain_text_event() {
        let events = seg("data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_parsed);
        assert_eq!(events[0].data, Some(json!("hello")));
        assert_eq!(events[0].raw_data.as_deref(), Some("hello"));
    }

    #[test]
    fn event_field_and_data() {
        let events = seg("event: update\ndata: {\"status\":\"ok\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fields.get("event"), Some("update"));
        assert!(events[0].fields.get("data").is_none());
        assert_eq!(events[0].data, Some(json!({"status": "ok"})));
    }

    #[test]
    fn last_data_line_wins_by_default() {
        let events = seg("data: first\ndata: {\"n\":2}\n\n");
        assert_eq!(events[0].raw_data.as_deref(), Some("{\"n\":2}"));
        assert!(events[0].is_parsed);
    }

    #[test]
    fn concatenate_mode_joins_data_lines() {
        let text = "data: {\"a\":\ndata: 1}\n\n";
        let events = segment(text, DataLineMode::Concatenate, &NormalizeOptions::default());
        assert_eq!(events[0].raw_data.as_deref(), Some("{\"a\":\n1}"));
        assert_eq!(events[0].data, Some(json!({"a": 1})));
    }

    #[test]
    fn multiple_events_and_trailing_event() {
        let events = seg("data: 1\n\n\n\nevent: x\ndata: 2\n\nid: 3\ndata: [3]");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].data, Some(json!(1)));
        assert_eq!(events[1].event_type(), Some("x"));
        assert_eq!(events[2].fields.get("id"), Some("3"));
        assert_eq!(events[2].data, Some(json!([3])));
    }

    #[test]
    fn crlf_line_endings() {
        let events = seg("event: a\r\ndata: {\"k\":\"v\"}\r\n\r\ndata: x\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), Some("a"));
        assert_eq!(events[0].data, Some(json!({"k": "v"})));
        assert_eq!(events[1].raw_data.as_deref(), Some("x"));
    }

    #[test]
    fn fields_only_event_has_no_data() {
        let events = seg("event: ping\nretry: 3000\n\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].data.is_none());
        assert!(events[0].raw_data.is_none());
        assert!(!events[0].is_parsed);
        assert_eq!(events[0].fields.get("retry"), Some("3000"));
    }

    #[test]
    fn colonless_lines_do_not_break_event() {
        let events = seg("event: a\ngarbage\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), Some("a"));
        assert_eq!(events[0].data, Some(json!({})));
    }

    #[test]
    fn empty_input_and_blank_lines() {
        assert!(seg("").is_empty());
        assert!(seg("\n\n\r\n   \n").is_empty());
        assert!(seg("data:\n\n").is_empty());
    }
}
