//! Deterministic per-scenario transcripts.
//!
//! Nothing time- or order-dependent goes into a transcript, so a run can be
//! diffed byte-for-byte against a checked-in reference.

use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::errors::Result;
use crate::report::summary::RunSummary;
use crate::scenario::format::Step;
use crate::scenario::runner::{ScenarioOutcome, StepRecord};
use crate::sim::device::{Device, DeviceId};

/// Transcript rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    /// One line per step, for people.
    #[default]
    Text,
    /// A single JSON document with every outcome.
    Json,
}

impl std::str::FromStr for TranscriptFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown transcript format {other:?}")),
        }
    }
}

fn label(devices: &[Device], id: DeviceId) -> String {
    devices
        .iter()
        .find(|d| d.id == id)
        .map_or_else(|| id.to_string(), Device::label)
}

/// `plug B(HDMI)`, or the bare verb for `active`.
#[must_use]
pub fn step_text(devices: &[Device], step: Step) -> String {
    match step.device() {
        Some(id) => format!("{} {}", step.verb(), label(devices, id)),
        None => step.verb().to_string(),
    }
}

fn active_text(active: Option<Device>) -> String {
    active.map_or_else(|| "-".to_string(), |d| d.id.to_string())
}

fn record_line(devices: &[Device], record: &StepRecord) -> String {
    let text = step_text(devices, record.step);
    let detail = match (&record.assertion, record.event_step) {
        (Some(assertion), _) => format!(
            "@{:<3} elected={} {}",
            assertion.step,
            active_text(assertion.elected),
            if assertion.passed() { "ok" } else { "MISMATCH" }
        ),
        (None, Some(step)) => format!("#{step:<3} active={}", active_text(record.active)),
        (None, None) => format!("     active={}", active_text(record.active)),
    };
    format!("  {:>3}. {text:<24} {detail}", record.index)
}

/// Render one scenario block.
#[must_use]
pub fn render_scenario(outcome: &ScenarioOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "scenario {}", outcome.id);
    if !outcome.devices.is_empty() {
        let labels: Vec<String> = outcome.devices.iter().map(Device::label).collect();
        let _ = writeln!(out, "  devices: {}", labels.join(" "));
    }
    for record in &outcome.records {
        let _ = writeln!(out, "{}", record_line(&outcome.devices, record));
    }
    if let Some(err) = &outcome.error {
        match err.step_index {
            Some(index) => {
                let _ = writeln!(out, "  error at step {index}: {}", err.message);
            }
            None => {
                let _ = writeln!(out, "  error: {}", err.message);
            }
        }
    }

    let total = outcome.assertions().count();
    let passed = total - outcome.failed_assertions();
    let _ = writeln!(
        out,
        "  verdict: {} ({passed}/{total} expectations passed)",
        outcome.verdict.label()
    );
    out
}

/// Render every scenario, separated by blank lines.
#[must_use]
pub fn render_text(outcomes: &[ScenarioOutcome]) -> String {
    outcomes
        .iter()
        .map(render_scenario)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    scenarios: &'a [ScenarioOutcome],
    summary: &'a RunSummary,
}

/// Render outcomes and summary as pretty JSON.
pub fn render_json(outcomes: &[ScenarioOutcome], summary: &RunSummary) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&JsonTranscript {
        scenarios: outcomes,
        summary,
    })?;
    text.push('\n');
    Ok(text)
}

/// Render in the requested format.
pub fn render(
    outcomes: &[ScenarioOutcome],
    summary: &RunSummary,
    format: TranscriptFormat,
) -> Result<String> {
    match format {
        TranscriptFormat::Text => Ok(render_text(outcomes)),
        TranscriptFormat::Json => render_json(outcomes, summary),
    }
}

/// SHA-256 of the text transcript, hex encoded.
#[must_use]
pub fn digest(outcomes: &[ScenarioOutcome]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(render_text(outcomes).as_bytes());
    format!("{:x}", hasher.finalize())
}
