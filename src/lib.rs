#![forbid(unsafe_code)]

//! Audio device-selection simulator: a deterministic model of which audio
//! output is active as devices are plugged, unplugged and selected, plus a
//! scenario runner that checks the election rule against scripted
//! expectations.
//!
//! Layers:
//! 1. **Simulator** ([`sim`]): device ids, plug set, event log and the
//!    pure election rule
//! 2. **Scenarios** ([`scenario`]): file format, discovery, the built-in
//!    corpus, the parallel runner and a seeded generator
//! 3. **Reporting** ([`report`]): deterministic transcripts and the run
//!    summary with its exit-code contract
//!
//! # Library usage
//!
//! ```rust,no_run
//! use audio_device_selection::prelude::*;
//!
//! let mut sim = Simulator::new();
//! let devices = sim.abc(&[DeviceKind::Internal, DeviceKind::Hdmi], None)?;
//! sim.plug(devices[0].id)?;
//! sim.plug(devices[1].id)?;
//! assert_eq!(sim.active()?.id, devices[1].id);
//! # Ok::<(), AdselError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod report;
pub mod scenario;
pub mod sim;
