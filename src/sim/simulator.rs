//! Stateful façade that scenarios drive.
//!
//! The simulator owns the declared devices, the plugged set and the event
//! log, and is the only thing that mutates them. Every operation checks its
//! preconditions before touching state, so a failed call leaves the
//! simulator exactly as it was.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::errors::{AdselError, Result, ScenarioErrorKind};
use crate::sim::device::{DEFAULT_CHARSET, Device, DeviceId, DeviceKind, PlugSet, issue_ids};
use crate::sim::election;
use crate::sim::events::{EventKind, EventLog};

/// Outcome of one `expect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assertion {
    /// Step of the newest event when the observation was made.
    pub step: u64,
    pub claimed: Device,
    pub elected: Option<Device>,
}

impl Assertion {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.elected == Some(self.claimed)
    }
}

/// One scenario's world: declared devices, what is plugged, and history.
#[derive(Debug, Default)]
pub struct Simulator {
    devices: Option<Vec<Device>>,
    plugged: PlugSet,
    log: EventLog,
    assertions: Vec<Assertion>,
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the scenario's devices, ids drawn from `charset` in order
    /// (`DEFAULT_CHARSET` when `None`). Allowed once per scenario.
    pub fn abc(&mut self, kinds: &[DeviceKind], charset: Option<&str>) -> Result<Vec<Device>> {
        if self.devices.is_some() {
            return Err(AdselError::scenario(ScenarioErrorKind::AlreadyDeclared));
        }
        let devices = issue_ids(kinds, charset.unwrap_or(DEFAULT_CHARSET))?;
        self.devices = Some(devices.clone());
        Ok(devices)
    }

    pub fn plug(&mut self, id: DeviceId) -> Result<u64> {
        let device = self.declared(id)?;
        if self.plugged.contains(id) {
            return Err(AdselError::scenario(ScenarioErrorKind::AlreadyPlugged {
                id: id.0,
            }));
        }
        self.plugged.insert(device);
        Ok(self.log.append(EventKind::Plug, device))
    }

    pub fn unplug(&mut self, id: DeviceId) -> Result<u64> {
        let device = self.plugged_device(id)?;
        self.plugged.remove(id);
        Ok(self.log.append(EventKind::Unplug, device))
    }

    /// Record a user selection. Whether it makes `id` active is decided by
    /// the election rule on the next observation.
    pub fn select(&mut self, id: DeviceId) -> Result<u64> {
        let device = self.plugged_device(id)?;
        Ok(self.log.append(EventKind::Select, device))
    }

    /// Record an assertion that `id` is active. A mismatch is recorded, not
    /// returned as an error.
    pub fn expect(&mut self, id: DeviceId) -> Result<Assertion> {
        let claimed = self.plugged_device(id)?;
        let assertion = Assertion {
            step: self.log.last_step(),
            claimed,
            elected: self.elected()?,
        };
        self.assertions.push(assertion);
        Ok(assertion)
    }

    /// The currently elected device.
    pub fn active(&self) -> Result<Device> {
        self.elected()?
            .ok_or_else(|| AdselError::scenario(ScenarioErrorKind::NoActiveDevice))
    }

    /// Election result without the non-empty precondition.
    pub fn elected(&self) -> Result<Option<Device>> {
        election::elect(&self.plugged, &self.log)
    }

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        self.devices.as_deref().unwrap_or_default()
    }

    /// Look up a declared device by id.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices().iter().copied().find(|d| d.id == id)
    }

    #[must_use]
    pub const fn plugged(&self) -> &PlugSet {
        &self.plugged
    }

    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    fn declared(&self, id: DeviceId) -> Result<Device> {
        if self.devices.is_none() {
            return Err(AdselError::scenario(ScenarioErrorKind::NotDeclared));
        }
        self.device(id)
            .ok_or_else(|| AdselError::scenario(ScenarioErrorKind::UndeclaredDevice { id: id.0 }))
    }

    fn plugged_device(&self, id: DeviceId) -> Result<Device> {
        let device = self.declared(id)?;
        if !self.plugged.contains(id) {
            return Err(AdselError::scenario(ScenarioErrorKind::NotPlugged { id: id.0 }));
        }
        Ok(device)
    }
}
