//! Simulated playback: feed SSE chunks into a growing buffer on a fixed interval and emit newly
//! completed records after each tick.
//!
//! The buffer is reparsed in full on every tick. A record is emitted once its index is past the
//! count already emitted.

use crate::ParseOptions;
use crate::output::EventSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Built-in demo stream: plain, typed, nested, string-encoded, mixed, escaped-quote, non-JSON and
/// a completion event.
pub const SAMPLE_STREAM: [&str; 10] = [
    "data: {\"message\": \"Simple JSON event\", \"count\": 1}\n\n",
    "event: update\ndata: {\"status\": \"processing\", \"progress\": 33}\n\n",
    "data: {\"nested\": {\"foo\": \"bar\", \"items\": [1, 2, 3]}}\n\n",
    "event: complex\ndata: {\"data\": \"{\\\"nested\\\": {\\\"deeply\\\": {\\\"value\\\": true}}}\"}\n\n",
    "data: {\"config\": {\"settings\": \"{\\\"theme\\\": \\\"dark\\\", \\\"notifications\\\": true}\"}}\n\n",
    "data: {\"results\": [{\"data\": \"{\\\"id\\\": 1, \\\"name\\\": \\\"Item 1\\\"}\"}, {\"data\": \"{\\\"id\\\": 2, \\\"name\\\": \\\"Item 2\\\"}\"}]}\n\n",
    "data: {\"mixed\": {\"normal\": \"plain text\", \"json\": \"{\\\"parsed\\\": true, \\\"count\\\": 42}\"}}\n\n",
    "data: {\"escaped\": \"This has \\\"quotes\\\" inside\"}\n\n",
    "data: Not valid JSON but still displayed\n\n",
    "event: complete\ndata: {\"status\": \"done\", \"progress\": 100}\n\n",
];

/// The built-in stream as owned chunks.
pub fn sample_chunks() -> Vec<String> {
    SAMPLE_STREAM.iter().map(|s| s.to_string()).collect()
}

/// Split SSE text into chunks that each end after a blank-line terminator. Trailing text without
/// a terminator becomes the last chunk.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut has_content = false;
    for line in text.split_inclusive('\n') {
        current.push_str(line);
        if line.trim().is_empty() {
            if has_content {
                chunks.push(std::mem::take(&mut current));
                has_content = false;
            }
        } else {
            has_content = true;
        }
    }
    if has_content {
        chunks.push(current);
    } else if !current.is_empty()
        && let Some(last) = chunks.last_mut()
    {
        last.push_str(&current);
    }
    chunks
}

/// Playback of a fixed list of chunks.
pub struct Playback {
    chunks: Vec<String>,
    interval: Duration,
    opts: ParseOptions,
    token: CancellationToken,
}

/// Running playback task.
pub struct PlaybackHandle {
    token: CancellationToken,
    join: JoinHandle<anyhow::Result<PlaybackSummary>>,
}

/// What a playback run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub chunks_played: usize,
    pub records_emitted: usize,
    pub cancelled: bool,
}

impl Playback {
    pub fn new(chunks: Vec<String>, interval: Duration, opts: ParseOptions) -> Self {
        Self {
            chunks,
            interval,
            opts,
            token: CancellationToken::new(),
        }
    }

    /// Token that stops this playback when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn the playback on the current tokio runtime.
    pub fn spawn(self, sink: Arc<dyn EventSink>) -> PlaybackHandle {
        let token = self.token.clone();
        let join = tokio::spawn(self.run(sink));
        PlaybackHandle { token, join }
    }

    /// Run to completion or cancellation. The first chunk is played after one interval.
    pub async fn run(self, sink: Arc<dyn EventSink>) -> anyhow::Result<PlaybackSummary> {
        let mut summary = PlaybackSummary::default();
        let mut buffer = String::new();
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() fires immediately once; consume that so playback starts after one period.
        ticker.tick().await;

        for chunk in &self.chunks {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!(played = summary.chunks_played, "playback cancelled");
                    summary.cancelled = true;
                    break;
                }
                _ = ticker.tick() => {}
            }
            buffer.push_str(chunk);
            summary.chunks_played += 1;
            let records = crate::parse_with(&buffer, &self.opts);
            for record in records.iter().skip(summary.records_emitted) {
                sink.write_line(&record.to_json_line()?)?;
            }
            summary.records_emitted = summary.records_emitted.max(records.len());
            debug!(
                chunk = summary.chunks_played,
                total_records = records.len(),
                "playback tick"
            );
        }
        sink.flush()?;
        Ok(summary)
    }
}

impl PlaybackHandle {
    /// Request the playback to stop at its next tick boundary.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the playback task.
    pub async fn join(self) -> anyhow::Result<PlaybackSummary> {
        self.join
            .await
            .map_err(|e| anyhow::anyhow!("playback task failed: {}", e))?
    }
}
