//! Configuration schema for ssefmt.
//!
//! Optional YAML config: logging, parser behavior, output format, fetch and playback settings.
//! Env vars in the file are expanded before parsing; SSEFMT_* env vars override logging.

use crate::normalize::{DEFAULT_MAX_DEPTH, NormalizeOptions, Recovery};
use crate::segment::DataLineMode;
use crate::ParseOptions;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ssefmt.yaml";

/// Root config (ssefmt.yaml).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Log level (e.g. "info", "debug"). Env SSEFMT_LOG_LEVEL overrides when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty". Env SSEFMT_LOG_FORMAT overrides.
    #[serde(default)]
    pub log_format: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserConfig {
    #[serde(default)]
    pub data_lines: DataLineMode,

    #[serde(default)]
    pub recovery: Recovery,

    /// Structural depth below which string leaves are still reinterpreted.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            data_lines: DataLineMode::default(),
            recovery: Recovery::default(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl ParserConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            data_lines: self.data_lines,
            normalize: NormalizeOptions {
                recovery: self.recovery,
                max_depth: self.max_depth,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON array of all records.
    #[default]
    Json,
    /// One record per line.
    Ndjson,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Single-line array instead of pretty printing (json format only).
    #[serde(default)]
    pub compact: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional safety limit: fail when the response body exceeds this many bytes.
    #[serde(default)]
    pub max_bytes: Option<u64>,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: None,
            headers: HashMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulateConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Load and parse config from path. Expands env vars (`$VAR`, `${VAR}`, `${VAR:-default}`) via shellexpand.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::from_yaml(&s)
    }

    /// Parse config from YAML text (after env expansion).
    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(s)?;
        // An empty file is a valid "all defaults" config.
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml_ng::from_str(&expanded)
            .map_err(|e| anyhow::anyhow!("parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, else from `ssefmt.yaml` when it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let p = Path::new(DEFAULT_CONFIG_FILE);
                if p.exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Some(fmt) = self.global.log_format.as_deref()
            && fmt != "json"
            && fmt != "pretty"
        {
            anyhow::bail!("global.log_format must be 'json' or 'pretty', got {:?}", fmt);
        }
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be > 0");
        }
        if self.fetch.max_bytes == Some(0) {
            anyhow::bail!("fetch.max_bytes must be > 0");
        }
        if self.simulate.interval_ms == 0 {
            anyhow::bail!("simulate.interval_ms must be > 0");
        }
        Ok(())
    }
}

/// Expand env vars in config: `$VAR`, `${VAR}`, `${VAR:-default}`. Unset vars expand to empty.
fn expand_env_vars(s: &str) -> anyhow::Result<String> {
    fn context(var: &str) -> Result<Option<std::borrow::Cow<'static, str>>, std::env::VarError> {
        match std::env::var(var) {
            Ok(v) => Ok(Some(v.into())),
            Err(std::env::VarError::NotPresent) => Ok(Some("".into())),
            Err(e) => Err(e),
        }
    }
    shellexpand::env_with_context(s, context)
        .map(|cow| cow.into_owned())
        .map_err(|e| anyhow::anyhow!("config env expansion: {} ({})", e.var_name, e.cause))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_defaults() {
        let c = Config::from_yaml("").unwrap();
        assert_eq!(c.global.log_level, "info");
        assert_eq!(c.parser.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(c.output.format, OutputFormat::Json);
        assert_eq!(c.simulate.interval_ms, 1000);
        assert_eq!(c.parser.parse_options(), ParseOptions::default());
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
global:
  log_level: debug
  log_format: json
parser:
  data_lines: concatenate
  recovery: none
  max_depth: 8
output:
  format: ndjson
  compact: true
fetch:
  timeout_secs: 5
  max_bytes: 1024
  headers:
    Authorization: "Bearer abc"
simulate:
  interval_ms: 10
"#;
        let c = Config::from_yaml(yaml).unwrap();
        assert_eq!(c.global.log_format.as_deref(), Some("json"));
        let opts = c.parser.parse_options();
        assert_eq!(opts.data_lines, DataLineMode::Concatenate);
        assert_eq!(opts.normalize.recovery, Recovery::None);
        assert_eq!(opts.normalize.max_depth, 8);
        assert_eq!(c.output.format, OutputFormat::Ndjson);
        assert!(c.output.compact);
        assert_eq!(c.fetch.max_bytes, Some(1024));
        assert_eq!(
            c.fetch.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
        assert_eq!(c.simulate.interval_ms, 10);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(Config::from_yaml("parser:\n  depth: 3\n").is_err());
        assert!(Config::from_yaml("sources: {}\n").is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(Config::from_yaml("parser:\n  data_lines: append\n").is_err());
        assert!(Config::from_yaml("global:\n  log_format: xml\n").is_err());
        assert!(Config::from_yaml("simulate:\n  interval_ms: 0\n").is_err());
        assert!(Config::from_yaml("fetch:\n  timeout_secs: 0\n").is_err());
    }

    #[test]
    fn unset_env_var_expands_to_empty() {
        let c = Config::from_yaml(
            "global:\n  log_level: \"debug$SSEFMT_TEST_UNSET_SUFFIX_VAR\"\n",
        )
        .unwrap();
        assert_eq!(c.global.log_level, "debug");
    }
}
