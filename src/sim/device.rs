//! Device kinds, device handles, and id issuance for a scenario's universe.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AdselError, Result, ScenarioErrorKind};

/// Ids handed out when a scenario does not name its own charset.
pub const DEFAULT_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Output device categories. The spelling of each variant is the external
/// vocabulary used by scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Internal,
    #[serde(rename = "USB")]
    Usb,
    #[serde(rename = "HDMI")]
    Hdmi,
    Headphone,
}

impl DeviceKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Internal, Self::Usb, Self::Hdmi, Self::Headphone];

    /// External token for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "Internal",
            Self::Usb => "USB",
            Self::Hdmi => "HDMI",
            Self::Headphone => "Headphone",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown device kind {s:?}"))
    }
}

/// Opaque per-scenario device token, conventionally one letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub char);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A declared device. Equality and hashing look at the id only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Device {
    pub kind: DeviceKind,
    pub id: DeviceId,
}

impl Device {
    #[must_use]
    pub const fn new(kind: DeviceKind, id: char) -> Self {
        Self {
            kind,
            id: DeviceId(id),
        }
    }

    /// Transcript label, e.g. `B(HDMI)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}({})", self.id, self.kind)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Assign ids from `charset` to `kinds`, in order.
///
/// The charset is cosmetic: it decides which letters appear in transcripts
/// and nothing else.
pub fn issue_ids(kinds: &[DeviceKind], charset: &str) -> Result<Vec<Device>> {
    if kinds.is_empty() {
        return Err(AdselError::scenario(ScenarioErrorKind::EmptyDeclaration));
    }

    let ids: Vec<char> = charset.chars().collect();
    let mut seen = HashSet::with_capacity(ids.len());
    if !ids.iter().all(|c| seen.insert(*c)) {
        return Err(AdselError::scenario(ScenarioErrorKind::DuplicateCharset {
            charset: charset.to_string(),
        }));
    }
    if kinds.len() > ids.len() {
        return Err(AdselError::scenario(ScenarioErrorKind::TooManyDevices {
            declared: kinds.len(),
            available: ids.len(),
        }));
    }

    Ok(kinds
        .iter()
        .zip(ids)
        .map(|(kind, id)| Device::new(*kind, id))
        .collect())
}

/// Devices currently plugged in, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlugSet {
    devices: BTreeMap<DeviceId, Device>,
}

impl PlugSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `device`; returns false when it was already present.
    pub fn insert(&mut self, device: Device) -> bool {
        self.devices.insert(device.id, device).is_none()
    }

    /// Remove `id`; returns false when it was not present.
    pub fn remove(&mut self, id: DeviceId) -> bool {
        self.devices.remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_external_tokens() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<DeviceKind>(), Ok(kind));
        }
        assert!("hdmi".parse::<DeviceKind>().is_err());
        assert!("Bluetooth".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn kinds_serialize_with_external_spelling() {
        let json = serde_json::to_string(&DeviceKind::Usb).unwrap();
        assert_eq!(json, "\"USB\"");
        let kind: DeviceKind = serde_json::from_str("\"Headphone\"").unwrap();
        assert_eq!(kind, DeviceKind::Headphone);
    }

    #[test]
    fn devices_compare_by_id_only() {
        let a = Device::new(DeviceKind::Internal, 'A');
        let also_a = Device::new(DeviceKind::Hdmi, 'A');
        let b = Device::new(DeviceKind::Internal, 'B');
        assert_eq!(a, also_a);
        assert_ne!(a, b);
    }

    #[test]
    fn ids_follow_charset_order() {
        let devices = issue_ids(&[DeviceKind::Internal, DeviceKind::Usb], "IAB").unwrap();
        assert_eq!(devices[0].id, DeviceId('I'));
        assert_eq!(devices[1].id, DeviceId('A'));
        assert_eq!(devices[1].label(), "A(USB)");
    }

    #[test]
    fn too_many_kinds_rejected() {
        let err = issue_ids(&[DeviceKind::Hdmi; 3], "AB").unwrap_err();
        assert!(matches!(
            err,
            AdselError::Scenario {
                kind: ScenarioErrorKind::TooManyDevices {
                    declared: 3,
                    available: 2
                }
            }
        ));
    }

    #[test]
    fn empty_and_duplicate_declarations_rejected() {
        assert!(issue_ids(&[], DEFAULT_CHARSET).is_err());
        let err = issue_ids(&[DeviceKind::Usb], "AA").unwrap_err();
        assert!(err.to_string().contains("repeats"));
    }

    #[test]
    fn plug_set_tracks_membership() {
        let mut set = PlugSet::new();
        let b = Device::new(DeviceKind::Hdmi, 'B');
        let a = Device::new(DeviceKind::Internal, 'A');
        assert!(set.insert(b));
        assert!(set.insert(a));
        assert!(!set.insert(b));
        let order: Vec<char> = set.iter().map(|d| d.id.0).collect();
        assert_eq!(order, vec!['A', 'B']);
        assert!(set.remove(DeviceId('B')));
        assert!(!set.remove(DeviceId('B')));
        assert_eq!(set.len(), 1);
    }
}
