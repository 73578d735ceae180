//! JSONL activity log: one self-contained JSON object per run lifecycle event.
//!
//! Each entry is serialized to a complete line before it reaches the
//! buffered file writer; the buffer is flushed when the writer drops.
//!
//! Degradation chain:
//! 1. Configured file path
//! 2. stderr with `[ADSEL-JSONL]` prefix
//! 3. Silent discard (a run never fails because logging failed)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AdselError, Result};
use crate::report::summary::RunSummary;
use crate::scenario::runner::{ScenarioOutcome, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Run lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    ScenarioComplete,
    ScenarioError,
    InfrastructureError,
    RunComplete,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    /// Expectations checked, and how many failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expectations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    /// Scenario count for run-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            scenario: None,
            verdict: None,
            expectations: None,
            failed: None,
            scenarios: None,
            exit_code: None,
            config_hash: None,
            transcript_digest: None,
            duration_ms: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Entry for a finished scenario; the event type follows the verdict.
    pub fn for_outcome(outcome: &ScenarioOutcome) -> Self {
        let (event, severity) = match outcome.verdict {
            Verdict::Pass => (EventType::ScenarioComplete, Severity::Info),
            Verdict::Fail => (EventType::ScenarioComplete, Severity::Warning),
            Verdict::ScenarioError => (EventType::ScenarioError, Severity::Warning),
            Verdict::InfraError => (EventType::InfrastructureError, Severity::Critical),
        };
        let mut entry = Self::new(event, severity);
        entry.scenario = Some(outcome.id.clone());
        entry.verdict = Some(outcome.verdict.label().to_string());
        entry.expectations = Some(outcome.assertions().count());
        entry.failed = Some(outcome.failed_assertions());
        if let Some(err) = &outcome.error {
            entry.error_code = Some(err.code.clone());
            entry.error_message = Some(err.message.clone());
        }
        entry
    }

    /// Closing entry for a run.
    pub fn for_summary(summary: &RunSummary, digest: &str, duration_ms: u64) -> Self {
        let severity = match summary.exit_code() {
            0 => Severity::Info,
            3 => Severity::Critical,
            _ => Severity::Warning,
        };
        let mut entry = Self::new(EventType::RunComplete, severity);
        entry.scenarios = Some(summary.scenarios);
        entry.expectations = Some(summary.expectations);
        entry.failed = Some(summary.failed_expectations);
        entry.exit_code = Some(summary.exit_code());
        entry.transcript_digest = Some(digest.to_string());
        entry.duration_ms = Some(duration_ms);
        entry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open the log file, or a writer that discards everything when `path` is `None`.
    pub fn open(path: Option<&Path>) -> Self {
        let mut w = Self {
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        };
        if let Some(path) = path {
            match open_append(path) {
                Ok(file) => {
                    w.writer = Some(BufWriter::new(file));
                    w.state = WriterState::Normal;
                }
                Err(err) => {
                    let _ = writeln!(io::stderr(), "[ADSEL-JSONL] {err}, using stderr");
                    w.state = WriterState::Stderr;
                }
            }
        }
        w
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ADSEL-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            if w.flush().is_err() {
                self.degrade();
            }
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let ok = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if ok {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[ADSEL-JSONL] {line}").is_ok() {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => {
                let _ = writeln!(io::stderr(), "[ADSEL-JSONL] log write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AdselError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AdselError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::format::{Scenario, SourceFormat, parse};
    use crate::scenario::runner::run_scenario;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.jsonl");
        let mut writer = JsonlWriter::open(Some(&path));
        assert_eq!(writer.state(), "normal");

        writer.write_entry(&LogEntry::new(EventType::RunStart, Severity::Info));
        writer.write_entry(&LogEntry::new(EventType::RunComplete, Severity::Info));
        writer.flush();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_start");
        assert_eq!(lines[1]["severity"], "info");
        assert_eq!(writer.lines_written(), 2);
    }

    #[test]
    fn optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        {
            let mut writer = JsonlWriter::open(Some(&path));
            writer.write_entry(&LogEntry::new(EventType::RunStart, Severity::Info));
        }
        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"scenario\""));
        assert!(!line.contains("\"exit_code\""));
    }

    #[test]
    fn outcome_entry_carries_error_code() {
        let spec = parse(
            "bad",
            "devices = [\"Internal\"]\nsteps = [\"select A\"]\n",
            SourceFormat::Toml,
        )
        .unwrap()
        .unwrap();
        let outcome = run_scenario(&Scenario {
            id: "bad".into(),
            source: None,
            spec,
        });
        let entry = LogEntry::for_outcome(&outcome);
        assert_eq!(entry.event, EventType::ScenarioError);
        assert_eq!(entry.error_code.as_deref(), Some("ADSEL-2001"));
        assert_eq!(entry.scenario.as_deref(), Some("bad"));
    }

    #[test]
    fn no_path_discards() {
        let mut writer = JsonlWriter::open(None);
        assert_eq!(writer.state(), "discard");
        writer.write_entry(&LogEntry::new(EventType::RunStart, Severity::Info));
        assert_eq!(writer.lines_written(), 0);
    }

    #[test]
    fn unwritable_path_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let writer = JsonlWriter::open(Some(&blocker.join("run.jsonl")));
        assert_eq!(writer.state(), "stderr");
    }
}
