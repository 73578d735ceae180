//! ADSEL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AdselError>;

/// Precondition a scenario violated while driving the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioErrorKind {
    /// `abc` called with no device kinds.
    EmptyDeclaration,
    /// The charset repeats a character.
    DuplicateCharset { charset: String },
    /// More kinds declared than the charset has ids.
    TooManyDevices { declared: usize, available: usize },
    /// `abc` called a second time.
    AlreadyDeclared,
    /// A device operation ran before `abc`.
    NotDeclared,
    /// The id names no declared device.
    UndeclaredDevice { id: char },
    /// `plug` on a device that is already plugged.
    AlreadyPlugged { id: char },
    /// `unplug`, `select` or `expect` on a device that is not plugged.
    NotPlugged { id: char },
    /// `active` with nothing plugged.
    NoActiveDevice,
    /// The step text could not be understood.
    UnknownStep { step: String },
}

impl fmt::Display for ScenarioErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDeclaration => write!(f, "no devices declared"),
            Self::DuplicateCharset { charset } => {
                write!(f, "charset {charset:?} repeats a character")
            }
            Self::TooManyDevices {
                declared,
                available,
            } => write!(
                f,
                "{declared} devices declared but the charset only has {available} ids"
            ),
            Self::AlreadyDeclared => write!(f, "devices were already declared"),
            Self::NotDeclared => write!(f, "devices must be declared before use"),
            Self::UndeclaredDevice { id } => write!(f, "device {id} was never declared"),
            Self::AlreadyPlugged { id } => write!(f, "device {id} is already plugged"),
            Self::NotPlugged { id } => write!(f, "device {id} is not plugged"),
            Self::NoActiveDevice => write!(f, "no device is plugged, nothing can be active"),
            Self::UnknownStep { step } => write!(f, "unrecognized step {step:?}"),
        }
    }
}

/// Reporting bucket an error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The scenario itself is malformed.
    Scenario,
    /// The harness could not do its job.
    Infrastructure,
    /// Arguments or config make no sense; nothing ran.
    Configuration,
}

/// Top-level error type for the device-selection simulator.
#[derive(Debug, Error)]
pub enum AdselError {
    #[error("[ADSEL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ADSEL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ADSEL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ADSEL-2001] scenario violated a simulator precondition: {kind}")]
    Scenario { kind: ScenarioErrorKind },

    #[error("[ADSEL-2002] malformed scenario {scenario}: {details}")]
    ScenarioParse { scenario: String, details: String },

    #[error("[ADSEL-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ADSEL-3002] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ADSEL-3003] election tie at step {step}")]
    ElectionTie { step: u64 },

    #[error("[ADSEL-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AdselError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ADSEL-1001",
            Self::MissingConfig { .. } => "ADSEL-1002",
            Self::ConfigParse { .. } => "ADSEL-1003",
            Self::Scenario { .. } => "ADSEL-2001",
            Self::ScenarioParse { .. } => "ADSEL-2002",
            Self::Io { .. } => "ADSEL-3001",
            Self::Serialization { .. } => "ADSEL-3002",
            Self::ElectionTie { .. } => "ADSEL-3003",
            Self::Runtime { .. } => "ADSEL-3900",
        }
    }

    /// Which reporting bucket this error belongs to.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. } => {
                ErrorClass::Configuration
            }
            Self::Scenario { .. } | Self::ScenarioParse { .. } => ErrorClass::Scenario,
            Self::Io { .. }
            | Self::Serialization { .. }
            | Self::ElectionTie { .. }
            | Self::Runtime { .. } => ErrorClass::Infrastructure,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for simulator precondition failures.
    #[must_use]
    pub const fn scenario(kind: ScenarioErrorKind) -> Self {
        Self::Scenario { kind }
    }
}

impl From<serde_json::Error> for AdselError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AdselError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
