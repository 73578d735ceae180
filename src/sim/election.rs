//! Active-device election rule.
//!
//! The rule is a pure function of a snapshot: the devices plugged right now
//! and the full event log. It never sees the simulator.
//!
//! Each plugged device carries an **activation step**: the latest step at
//! which the user selected it, or the step at which it was plugged for the
//! first time in the scenario, whichever is newer. Re-plugging a device that
//! was seen before is not an activation. The plugged device with the newest
//! activation is active.
//!
//! Consequences that scenarios rely on:
//! - with no selection ever made, the newest first-time plug wins;
//! - a selection survives unplug/replug of any device, itself included;
//! - a device plugged for the first time takes over from an older selection,
//!   and unplugging it falls back to that selection;
//! - only events of currently plugged devices matter, so unplugging a device
//!   that is not active never changes the active device.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::core::errors::{AdselError, Result};
use crate::sim::device::{Device, DeviceId, PlugSet};
use crate::sim::events::{EventKind, EventLog};

/// Why a device holds its activation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// The device's first plug in the scenario.
    FirstPlug,
    /// An explicit user selection.
    Select,
}

/// A plugged device and the step that ranks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// The plugged device.
    pub device: Device,
    /// Its activation step; the highest one is elected.
    pub step: u64,
    /// Which event set `step`.
    pub reason: Activation,
}

/// Rank every plugged device, newest activation first.
///
/// Plugged devices without a recorded plug event are left out; the
/// simulator never produces that state.
#[must_use]
pub fn candidates(plugged: &PlugSet, log: &EventLog) -> Vec<Candidate> {
    let mut ranked: HashMap<DeviceId, Candidate> = HashMap::with_capacity(plugged.len());
    let mut seen_plug: HashSet<DeviceId> = HashSet::with_capacity(plugged.len());

    for event in log.events() {
        let Some(device) = plugged.get(event.device.id) else {
            continue;
        };
        let reason = match event.kind {
            EventKind::Plug if seen_plug.insert(device.id) => Activation::FirstPlug,
            EventKind::Select => Activation::Select,
            EventKind::Plug | EventKind::Unplug => continue,
        };
        ranked.insert(
            device.id,
            Candidate {
                device: *device,
                step: event.step,
                reason,
            },
        );
    }

    let mut out: Vec<Candidate> = ranked.into_values().collect();
    out.sort_by(|a, b| b.step.cmp(&a.step).then(a.device.id.cmp(&b.device.id)));
    out
}

/// Elect the active device, or `None` when nothing is plugged.
pub fn elect(plugged: &PlugSet, log: &EventLog) -> Result<Option<Device>> {
    if plugged.is_empty() {
        return Ok(None);
    }

    let ranked = candidates(plugged, log);
    match ranked.as_slice() {
        [] => Err(AdselError::Runtime {
            details: format!(
                "{} plugged device(s) but no plug event in the log",
                plugged.len()
            ),
        }),
        [first, second, ..] if first.step == second.step => {
            Err(AdselError::ElectionTie { step: first.step })
        }
        [first, ..] => Ok(Some(first.device)),
    }
}
