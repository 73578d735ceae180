//! Scenario file format.
//!
//! A scenario is data: the kinds of the devices it declares, an optional id
//! charset, and an ordered list of steps. TOML is the checked-in format;
//! JSON with the same shape is accepted too.
//!
//! ```toml
//! description = "selection survives replug of another device"
//! devices = ["Internal", "HDMI"]
//! steps = ["plug A", "plug B", "select A", "unplug B", "plug B", "expect A"]
//! ```

#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AdselError, Result, ScenarioErrorKind};
use crate::sim::device::{DeviceId, DeviceKind};

/// One scenario operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Step {
    Plug(DeviceId),
    Unplug(DeviceId),
    Select(DeviceId),
    Expect(DeviceId),
    /// Observe the active device without asserting anything.
    Active,
}

impl Step {
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Plug(_) => "plug",
            Self::Unplug(_) => "unplug",
            Self::Select(_) => "select",
            Self::Expect(_) => "expect",
            Self::Active => "active",
        }
    }

    #[must_use]
    pub const fn device(self) -> Option<DeviceId> {
        match self {
            Self::Plug(id) | Self::Unplug(id) | Self::Select(id) | Self::Expect(id) => Some(id),
            Self::Active => None,
        }
    }

    /// Whether the step appends to the event log.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Plug(_) | Self::Unplug(_) | Self::Select(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device() {
            Some(id) => write!(f, "{} {id}", self.verb()),
            None => f.write_str(self.verb()),
        }
    }
}

impl FromStr for Step {
    type Err = ScenarioErrorKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let unknown = || ScenarioErrorKind::UnknownStep {
            step: s.to_string(),
        };
        let mut words = s.split_whitespace();
        let verb = words.next().ok_or_else(unknown)?.to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return Err(unknown());
        }

        let id = match arg {
            None => None,
            Some(raw) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(DeviceId(c)),
                    _ => return Err(unknown()),
                }
            }
        };

        match (verb.as_str(), id) {
            ("plug", Some(id)) => Ok(Self::Plug(id)),
            ("unplug", Some(id)) => Ok(Self::Unplug(id)),
            ("select", Some(id)) => Ok(Self::Select(id)),
            ("expect", Some(id)) => Ok(Self::Expect(id)),
            ("active", None) => Ok(Self::Active),
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for Step {
    type Error = ScenarioErrorKind;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        step.to_string()
    }
}

/// On-disk shape of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub devices: Vec<DeviceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    pub steps: Vec<Step>,
}

impl ScenarioSpec {
    /// Number of `expect` steps.
    #[must_use]
    pub fn expectation_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Expect(_)))
            .count()
    }

    /// Render as TOML in the checked-in layout.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AdselError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }
}

/// A loaded scenario and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Path relative to the scenario root, `/`-separated, extension removed.
    pub id: String,
    pub source: Option<PathBuf>,
    pub spec: ScenarioSpec,
}

/// Serialization of a scenario file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Toml,
    Json,
}

impl SourceFormat {
    /// Guess from a file extension; anything but `json` is read as TOML.
    #[must_use]
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some(e) if e.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Parse scenario text.
///
/// Returns `Ok(None)` when the document parses but has no top-level
/// `steps`: such files are not scenarios and are skipped.
pub fn parse(id: &str, text: &str, format: SourceFormat) -> Result<Option<ScenarioSpec>> {
    let malformed = |details: String| AdselError::ScenarioParse {
        scenario: id.to_string(),
        details,
    };

    match format {
        SourceFormat::Toml => {
            let table: toml::Table = toml::from_str(text).map_err(|e| malformed(e.to_string()))?;
            if !table.contains_key("steps") {
                return Ok(None);
            }
            toml::Value::Table(table)
                .try_into::<ScenarioSpec>()
                .map(Some)
                .map_err(|e| malformed(e.to_string()))
        }
        SourceFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
            if value.get("steps").is_none() {
                return Ok(None);
            }
            serde_json::from_value::<ScenarioSpec>(value)
                .map(Some)
                .map_err(|e| malformed(e.to_string()))
        }
    }
}
