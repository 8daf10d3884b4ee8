//! ssefmt — SSE stream formatter.
//!
//! Reads buffered SSE text (file, stdin, percent-encoded argument or URL), splits it into events,
//! recursively decodes nested JSON payloads and emits the records as JSON to stdout or a file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ssefmt::config::{Config, OutputFormat};
use ssefmt::output::{EventSink, FileSink, StdoutSink, write_records};
use ssefmt::simulate::{Playback, sample_chunks, split_chunks};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ssefmt")]
#[command(author, version, about = "Format SSE streams and unwind nested JSON payloads")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ssefmt.yaml when present)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse SSE text and print the records (default; reads stdin when no input is given)
    Format {
        /// SSE text file, or "-" for stdin
        #[arg(value_name = "INPUT", conflicts_with_all = ["content", "url"])]
        input: Option<PathBuf>,

        /// Percent-encoded SSE text
        #[arg(long, value_name = "TEXT", conflicts_with = "url")]
        content: Option<String>,

        /// Fetch the SSE body from this URL
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        #[command(flatten)]
        out: OutputArgs,

        /// Log event counts when done
        #[arg(long)]
        summary: bool,
    },

    /// Replay SSE chunks on an interval, printing each new record as an NDJSON line
    Simulate {
        /// SSE text file to replay (default: built-in sample stream)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Delay between chunks in milliseconds
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Write NDJSON to file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write output to file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output format (overrides config)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Single-line JSON array
    #[arg(long)]
    compact: bool,
}

/// Ignore SIGPIPE so writes to a broken pipe return EPIPE instead of killing the process.
#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        let _ = nix::sys::signal::signal(
            nix::sys::signal::Signal::SIGPIPE,
            nix::sys::signal::SigHandler::SigIgn,
        );
    }
}
#[cfg(not(unix))]
fn ignore_sigpipe() {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    ignore_sigpipe();

    // No subcommand formats stdin with config defaults.
    let command = cli.command.take().unwrap_or(Commands::Format {
        input: None,
        content: None,
        url: None,
        out: OutputArgs {
            output: None,
            format: None,
            compact: false,
        },
        summary: false,
    });

    let result = match command {
        Commands::Validate => {
            init_logging(None, &cli);
            return run_validate(cli.config.as_deref());
        }
        Commands::Format {
            input,
            content,
            url,
            out,
            summary,
        } => {
            let config = load_config(&cli)?;
            run_format(&config, input.as_deref(), content, url, &out, summary).await
        }
        Commands::Simulate {
            input,
            interval_ms,
            output,
        } => {
            let config = load_config(&cli)?;
            run_simulate(&config, input.as_deref(), interval_ms, output.as_deref()).await
        }
    };
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}

/// Load the config named on the command line (or the default file) and start logging from it.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_logging(Some(&config), cli);
    Ok(config)
}

/// Init tracing from config (log_format, log_level) or env. Env SSEFMT_LOG_FORMAT, SSEFMT_LOG_LEVEL override config;
/// RUST_LOG applies when the config level is left at the default "info".
fn init_logging(config: Option<&Config>, cli: &Cli) {
    let use_json = match std::env::var("SSEFMT_LOG_FORMAT").ok().as_deref() {
        Some("json") => true,
        Some(_) => false,
        None => config.and_then(|c| c.global.log_format.as_deref()) == Some("json"),
    };
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("ssefmt=debug")
    } else {
        let env_level = std::env::var("SSEFMT_LOG_LEVEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        match (env_level, config) {
            (Some(level), _) => EnvFilter::new(format!("ssefmt={}", level)),
            (None, Some(c)) if c.global.log_level != "info" => {
                EnvFilter::new(format!("ssefmt={}", c.global.log_level))
            }
            _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ssefmt=info")),
        }
    };
    if use_json {
        let json_fmt = tracing_subscriber::fmt::format()
            .json()
            .with_current_span(false)
            .with_span_list(false);
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .event_format(json_fmt),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    }
}

fn run_validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or(Path::new(ssefmt::config::DEFAULT_CONFIG_FILE));
    match Config::load(path) {
        Ok(_) => {
            tracing::info!(path = %path.display(), "config valid");
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("config invalid: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn open_sink(output: Option<&Path>) -> anyhow::Result<Arc<dyn EventSink>> {
    let sink: Arc<dyn EventSink> = match output {
        Some(path) => Arc::new(FileSink::new(path)?),
        None => Arc::new(StdoutSink),
    };
    Ok(sink)
}

fn read_stdin() -> anyhow::Result<String> {
    let mut s = String::new();
    std::io::stdin()
        .read_to_string(&mut s)
        .context("read stdin")?;
    Ok(s)
}

/// Resolve the input text: file (or "-"), percent-encoded content, URL, else stdin.
async fn read_input(
    config: &Config,
    input: Option<&Path>,
    content: Option<String>,
    url: Option<String>,
) -> anyhow::Result<String> {
    if let Some(path) = input {
        if path == Path::new("-") {
            return read_stdin();
        }
        return std::fs::read_to_string(path)
            .with_context(|| format!("read input {}", path.display()));
    }
    if let Some(encoded) = content {
        return urlencoding::decode(&encoded)
            .map(|s| s.into_owned())
            .map_err(|e| anyhow::anyhow!("decode --content: {}", e));
    }
    if let Some(url) = url {
        tracing::info!(%url, "fetching SSE body");
        return ssefmt::fetch::fetch_text(&config.fetch, &url).await;
    }
    read_stdin()
}

async fn run_format(
    config: &Config,
    input: Option<&Path>,
    content: Option<String>,
    url: Option<String>,
    out: &OutputArgs,
    summary: bool,
) -> anyhow::Result<()> {
    let text = read_input(config, input, content, url).await?;
    let records = ssefmt::parse_with(&text, &config.parser.parse_options());
    let format = out.format.unwrap_or(config.output.format);
    let compact = out.compact || config.output.compact;
    let sink = open_sink(out.output.as_deref())?;
    write_records(sink.as_ref(), &records, format, compact)?;
    if summary {
        let parsed = records.iter().filter(|r| r.is_parsed).count();
        let deep = records.iter().filter(|r| r.is_deep_parsed).count();
        tracing::info!(events = records.len(), parsed, deep_parsed = deep, "formatted");
    } else {
        tracing::debug!(events = records.len(), "formatted");
    }
    Ok(())
}

async fn run_simulate(
    config: &Config,
    input: Option<&Path>,
    interval_ms: Option<u64>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let chunks = match input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read input {}", path.display()))?;
            split_chunks(&text)
        }
        None => sample_chunks(),
    };
    let interval_ms = interval_ms.unwrap_or(config.simulate.interval_ms);
    if interval_ms == 0 {
        anyhow::bail!("--interval-ms must be > 0");
    }
    let sink = open_sink(output)?;
    tracing::info!(chunks = chunks.len(), interval_ms, "playback started");
    let playback = Playback::new(
        chunks,
        Duration::from_millis(interval_ms),
        config.parser.parse_options(),
    );
    let token = playback.cancellation_token();
    let join = playback.spawn(sink).join();
    tokio::pin!(join);
    tokio::select! {
        res = &mut join => return finish_playback(res),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping playback");
            token.cancel();
        }
    }
    finish_playback(join.await)
}

fn finish_playback(res: anyhow::Result<ssefmt::simulate::PlaybackSummary>) -> anyhow::Result<()> {
    let summary = res?;
    tracing::info!(
        chunks = summary.chunks_played,
        records = summary.records_emitted,
        cancelled = summary.cancelled,
        "playback finished"
    );
    Ok(())
}

/// Future that completes when SIGINT (Ctrl+C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
