//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use audio_device_selection::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{AdselError, ErrorClass, Result, ScenarioErrorKind};

// Simulator
pub use crate::sim::device::{Device, DeviceId, DeviceKind, PlugSet};
pub use crate::sim::election::{Activation, Candidate, candidates, elect};
pub use crate::sim::events::{Event, EventKind, EventLog};
pub use crate::sim::simulator::{Assertion, Simulator};

// Scenarios
pub use crate::scenario::format::{Scenario, ScenarioSpec, Step};
pub use crate::scenario::generate::{GeneratorConfig, generate};
pub use crate::scenario::loader::{Discovery, DiscoveryConfig, discover};
pub use crate::scenario::runner::{ScenarioOutcome, Verdict, run_all, run_scenario};

// Reporting
pub use crate::report::summary::{RunStatus, RunSummary};
pub use crate::report::transcript::TranscriptFormat;
