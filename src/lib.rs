//! ssefmt — SSE stream formatter.
//!
//! Splits buffered Server-Sent-Events text into events and recursively decodes JSON payloads,
//! including JSON that was string-encoded inside other JSON, recording where each nested
//! decode happened.

pub mod config;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod path;
pub mod record;
pub mod segment;
pub mod simulate;

pub use normalize::{NormalizeOptions, Normalized, Recovery};
pub use path::{FieldPath, PathSegment};
pub use record::{EventRecord, Fields};
pub use segment::{DataLineMode, Segmenter};

/// Options for one parse call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub data_lines: DataLineMode,
    pub normalize: NormalizeOptions,
}

/// Parse a complete SSE text blob with default options. Never fails.
pub fn parse(text: &str) -> Vec<EventRecord> {
    parse_with(text, &ParseOptions::default())
}

/// Parse a complete SSE text blob.
pub fn parse_with(text: &str, opts: &ParseOptions) -> Vec<EventRecord> {
    segment::segment(text, opts.data_lines, &opts.normalize)
}
