//! Seeded random scenario generator.
//!
//! Produces valid scenarios (only legal operations are drawn at each point)
//! and fills in an `expect` for the elected device after every mutation, so
//! the output doubles as a regression oracle for the election rule. The same
//! seed always yields the same scenarios.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::errors::{AdselError, Result};
use crate::scenario::format::{Scenario, ScenarioSpec, Step};
use crate::sim::device::{DEFAULT_CHARSET, Device, DeviceKind};
use crate::sim::simulator::Simulator;

/// Knobs for `generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub count: usize,
    /// Devices per scenario, the internal speaker included.
    pub devices: usize,
    /// Mutations per scenario; expectations come on top.
    pub steps: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            count: 10,
            devices: 4,
            steps: 12,
        }
    }
}

/// Upper bound on `count`.
pub const MAX_COUNT: usize = 10_000;
/// Upper bound on `steps`.
pub const MAX_STEPS: usize = 10_000;

const EXTERNAL_KINDS: [DeviceKind; 3] = [DeviceKind::Usb, DeviceKind::Hdmi, DeviceKind::Headphone];

/// Generate `config.count` scenarios with ids `gen/<seed>-<n>`.
pub fn generate(config: &GeneratorConfig) -> Result<Vec<Scenario>> {
    let max_devices = DEFAULT_CHARSET.chars().count();
    if config.devices == 0 || config.devices > max_devices {
        return Err(AdselError::InvalidConfig {
            details: format!(
                "generator devices must be in [1, {max_devices}], got {}",
                config.devices
            ),
        });
    }
    if config.count > MAX_COUNT {
        return Err(AdselError::InvalidConfig {
            details: format!(
                "generator count must be in [0, {MAX_COUNT}], got {}",
                config.count
            ),
        });
    }
    if config.steps > MAX_STEPS {
        return Err(AdselError::InvalidConfig {
            details: format!(
                "generator steps must be in [0, {MAX_STEPS}], got {}",
                config.steps
            ),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.count)
        .map(|n| {
            let spec = generate_one(&mut rng, config)?;
            Ok(Scenario {
                id: format!("gen/{}-{n:03}", config.seed),
                source: None,
                spec,
            })
        })
        .collect()
}

fn generate_one(rng: &mut StdRng, config: &GeneratorConfig) -> Result<ScenarioSpec> {
    let mut kinds = vec![DeviceKind::Internal];
    kinds.extend(
        (1..config.devices).map(|_| EXTERNAL_KINDS[rng.random_range(0..EXTERNAL_KINDS.len())]),
    );

    let mut sim = Simulator::new();
    let devices = sim.abc(&kinds, None)?;
    let mut steps = Vec::with_capacity(config.steps.saturating_mul(2));

    for _ in 0..config.steps {
        let (plugged, unplugged): (Vec<&Device>, Vec<&Device>) = devices
            .iter()
            .partition(|d| sim.plugged().contains(d.id));

        if plugged.is_empty() || (!unplugged.is_empty() && rng.random_bool(0.4)) {
            let target = unplugged[rng.random_range(0..unplugged.len())].id;
            sim.plug(target)?;
            steps.push(Step::Plug(target));
        } else {
            let target = plugged[rng.random_range(0..plugged.len())].id;
            if rng.random_bool(0.5) {
                sim.select(target)?;
                steps.push(Step::Select(target));
            } else {
                sim.unplug(target)?;
                steps.push(Step::Unplug(target));
            }
        }

        if let Some(active) = sim.elected()? {
            steps.push(Step::Expect(active.id));
        }
    }

    Ok(ScenarioSpec {
        description: Some(format!("generated from seed {}", config.seed)),
        devices: kinds,
        charset: None,
        steps,
    })
}

/// Write scenarios under `dir` as `<id>.toml`, creating directories as
/// needed. Returns the written paths.
pub fn write_scenarios(dir: &Path, scenarios: &[Scenario]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let path = dir.join(format!("{}.toml", scenario.id));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AdselError::io(parent, source))?;
        }
        fs::write(&path, scenario.spec.to_toml()?).map_err(|source| AdselError::io(&path, source))?;
        written.push(path);
    }
    Ok(written)
}
