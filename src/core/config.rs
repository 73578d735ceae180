//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! The simulator core takes no configuration; this only shapes how the
//! runner discovers and reports scenarios.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AdselError, Result};
use crate::report::transcript::TranscriptFormat;
use crate::scenario::loader::validate_glob_pattern;

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub runner: RunnerConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
    /// Where this config was loaded from.
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Scenario discovery and execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Scenario root; `None` runs the built-in corpus.
    pub root: Option<PathBuf>,
    /// Glob over paths relative to the root.
    pub pattern: String,
    pub max_depth: usize,
    pub parallelism: usize,
}

/// Transcript output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ReportConfig {
    pub format: TranscriptFormat,
    /// Write the transcript here in addition to the console summary.
    pub transcript: Option<PathBuf>,
}

/// JSONL activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Disabled when `None`.
    pub activity_log: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            root: None,
            pattern: "**/*.toml".to_string(),
            max_depth: 16,
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        home_dir.join(".config").join("adsel").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_var)
    }

    fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| AdselError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(AdselError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over canonical JSON, stable across processes and releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ADSEL_RUNNER_ROOT") {
            self.runner.root = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("ADSEL_RUNNER_PATTERN") {
            self.runner.pattern = raw;
        }
        if let Some(raw) = lookup("ADSEL_RUNNER_MAX_DEPTH") {
            self.runner.max_depth = parse_env_usize("ADSEL_RUNNER_MAX_DEPTH", &raw)?;
        }
        if let Some(raw) = lookup("ADSEL_RUNNER_PARALLELISM") {
            self.runner.parallelism = parse_env_usize("ADSEL_RUNNER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("ADSEL_REPORT_FORMAT") {
            self.report.format = raw.parse().map_err(|details: String| AdselError::ConfigParse {
                context: "env",
                details: format!("ADSEL_REPORT_FORMAT={raw:?}: {details}"),
            })?;
        }
        if let Some(raw) = lookup("ADSEL_REPORT_TRANSCRIPT") {
            self.report.transcript = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("ADSEL_LOG_PATH") {
            self.logging.activity_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.runner.parallelism == 0 {
            return Err(AdselError::InvalidConfig {
                details: "runner.parallelism must be >= 1".to_string(),
            });
        }
        if self.runner.max_depth == 0 {
            return Err(AdselError::InvalidConfig {
                details: "runner.max_depth must be >= 1".to_string(),
            });
        }
        if self.runner.pattern.trim().is_empty() {
            return Err(AdselError::InvalidConfig {
                details: "runner.pattern must not be empty".to_string(),
            });
        }
        validate_glob_pattern(&self.runner.pattern)?;
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| AdselError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
