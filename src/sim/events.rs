//! Append-only event log of plug, unplug and select operations.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sim::device::{Device, DeviceId};

/// Operation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Plug,
    Unplug,
    Select,
}

impl EventKind {
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Plug => "plug",
            Self::Unplug => "unplug",
            Self::Select => "select",
        }
    }
}

/// One logged operation. `step` is assigned at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub step: u64,
    pub kind: EventKind,
    pub device: Device,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.step, self.kind.verb(), self.device.label())
    }
}

/// Ordered history of every mutation since the scenario started.
///
/// Steps start at 1 and grow by exactly one per appended event, so no two
/// events ever share a step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return the step it was given.
    pub fn append(&mut self, kind: EventKind, device: Device) -> u64 {
        let step = self.last_step() + 1;
        self.events.push(Event { step, kind, device });
        step
    }

    /// Step of the newest event, or 0 when the log is empty.
    #[must_use]
    pub fn last_step(&self) -> u64 {
        self.events.last().map_or(0, |e| e.step)
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events that mention `id`, oldest first.
    pub fn for_device(&self, id: DeviceId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.device.id == id)
    }

    /// The newest event of `kind` for `id`.
    #[must_use]
    pub fn latest(&self, id: DeviceId, kind: EventKind) -> Option<&Event> {
        self.events
            .iter()
            .rev()
            .find(|e| e.device.id == id && e.kind == kind)
    }

    /// The oldest event of `kind` for `id`.
    #[must_use]
    pub fn first(&self, id: DeviceId, kind: EventKind) -> Option<&Event> {
        self.for_device(id).find(|e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::device::DeviceKind;

    #[test]
    fn steps_start_at_one_and_increase() {
        let a = Device::new(DeviceKind::Internal, 'A');
        let b = Device::new(DeviceKind::Hdmi, 'B');
        let mut log = EventLog::new();
        assert_eq!(log.last_step(), 0);
        assert_eq!(log.append(EventKind::Plug, a), 1);
        assert_eq!(log.append(EventKind::Plug, b), 2);
        assert_eq!(log.append(EventKind::Select, a), 3);
        let steps: Vec<u64> = log.events().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn per_device_queries() {
        let a = Device::new(DeviceKind::Internal, 'A');
        let b = Device::new(DeviceKind::Usb, 'B');
        let mut log = EventLog::new();
        log.append(EventKind::Plug, a);
        log.append(EventKind::Plug, b);
        log.append(EventKind::Unplug, b);
        log.append(EventKind::Plug, b);

        assert_eq!(log.for_device(b.id).count(), 3);
        assert_eq!(log.first(b.id, EventKind::Plug).map(|e| e.step), Some(2));
        assert_eq!(log.latest(b.id, EventKind::Plug).map(|e| e.step), Some(4));
        assert!(log.latest(a.id, EventKind::Select).is_none());
    }

    #[test]
    fn display_uses_device_label() {
        let mut log = EventLog::new();
        log.append(EventKind::Unplug, Device::new(DeviceKind::Headphone, 'C'));
        assert_eq!(log.events()[0].to_string(), "#1 unplug C(Headphone)");
    }
}
