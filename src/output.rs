//! Record output: stdout or file, as a JSON array or NDJSON.
//!
//! Line atomicity: each line is written with one write + flush so a crash does not split
//! a line in the middle (best-effort; consumer should skip invalid lines).

use crate::config::OutputFormat;
use crate::record::EventRecord;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Sink for formatted output lines (stdout or file).
pub trait EventSink: Send + Sync {
    /// Write one line (no trailing newline is added by the caller).
    fn write_line(&self, line: &str) -> anyhow::Result<()>;
    /// Flush buffered output (no-op for stdout).
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emit to stdout. Handles BrokenPipe (e.g. consumer exited) by returning error so caller can exit non-zero.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn write_line(&self, line: &str) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(line.as_bytes())
            .and_then(|()| out.write_all(b"\n"))
            .and_then(|()| out.flush())
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    anyhow::anyhow!("broken pipe (SIGPIPE): consumer exited")
                } else {
                    e.into()
                }
            })
    }
}

/// Emit to a file. The file is truncated on open.
pub struct FileSink {
    inner: Mutex<std::io::BufWriter<std::fs::File>>,
}

impl FileSink {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("create output file {}", path.display()))?;
        Ok(Self {
            inner: Mutex::new(std::io::BufWriter::new(file)),
        })
    }
}

impl EventSink for FileSink {
    fn write_line(&self, line: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().map_err(|e| anyhow::anyhow!("lock: {}", e))?;
        inner.write_all(line.as_bytes())?;
        inner.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().map_err(|e| anyhow::anyhow!("lock: {}", e))?;
        inner.flush()?;
        Ok(())
    }
}

/// In-memory sink; collects lines for inspection.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn write_line(&self, line: &str) -> anyhow::Result<()> {
        self.lines
            .lock()
            .map_err(|e| anyhow::anyhow!("lock: {}", e))?
            .push(line.to_string());
        Ok(())
    }
}

/// Write records to `sink` in the given format, then flush.
pub fn write_records(
    sink: &dyn EventSink,
    records: &[EventRecord],
    format: OutputFormat,
    compact: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let doc = if compact {
                serde_json::to_string(records)
            } else {
                serde_json::to_string_pretty(records)
            }
            .context("serialize records")?;
            sink.write_line(&doc)?;
        }
        OutputFormat::Ndjson => {
            for record in records {
                sink.write_line(&record.to_json_line()?)?;
            }
        }
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn records() -> Vec<EventRecord> {
        crate::parse("event: a\ndata: {\"x\":\"[1]\"}\n\ndata: plain\n\n")
    }

    #[test]
    fn ndjson_one_line_per_record() {
        let sink = MemorySink::new();
        write_records(&sink, &records(), OutputFormat::Ndjson, false).unwrap();
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["event"], "a");
        assert_eq!(first["data"]["x"], serde_json::json!([1]));
        assert_eq!(first["parsedFieldPaths"], serde_json::json!(["x"]));
    }

    #[test]
    fn json_array_pretty_and_compact() {
        let sink = MemorySink::new();
        write_records(&sink, &records(), OutputFormat::Json, false).unwrap();
        let doc = sink.lines().join("\n");
        assert!(doc.contains("\n  {"));
        let arr: Vec<serde_json::Value> = serde_json::from_str(&doc).unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[1]["isParsed"], false);

        let sink = MemorySink::new();
        write_records(&sink, &records(), OutputFormat::Json, true).unwrap();
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[{\"event\":\"a\""));
    }

    #[test]
    fn empty_input_writes_empty_array() {
        let sink = MemorySink::new();
        write_records(&sink, &[], OutputFormat::Json, true).unwrap();
        assert_eq!(sink.lines(), vec!["[]"]);
    }

    #[test]
    fn file_sink_truncates_and_writes() {
        let dir = std::env::temp_dir().join("ssefmt_output_test");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("sse-events.json");
        fs::write(&path, "stale content that must go away\n").unwrap();

        let sink = FileSink::new(&path).unwrap();
        write_records(&sink, &records(), OutputFormat::Ndjson, false).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));

        let _ = fs::remove_file(&path);
    }
}
