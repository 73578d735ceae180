//! Property tests for the election rule and the simulator over random
//! operation sequences, legal and illegal alike.

use std::collections::HashMap;

use audio_device_selection::prelude::*;
use audio_device_selection::report::transcript;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Plug(usize),
    Unplug(usize),
    Select(usize),
    Expect(usize),
}

fn arb_kind() -> impl Strategy<Value = DeviceKind> {
    prop::sample::select(DeviceKind::ALL.to_vec())
}

fn arb_op(devices: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..devices).prop_map(Op::Plug),
        2 => (0..devices).prop_map(Op::Unplug),
        2 => (0..devices).prop_map(Op::Select),
        1 => (0..devices).prop_map(Op::Expect),
    ]
}

fn arb_case() -> impl Strategy<Value = (Vec<DeviceKind>, Vec<Op>)> {
    prop::collection::vec(arb_kind(), 1..6).prop_flat_map(|kinds| {
        let n = kinds.len();
        (Just(kinds), prop::collection::vec(arb_op(n), 1..60))
    })
}

/// Tracks what the last selection still guarantees.
#[derive(Default)]
struct Stickiness {
    selected: Option<(DeviceId, u64)>,
    first_plug: HashMap<DeviceId, u64>,
}

impl Stickiness {
    /// The device that must be active, if the last selection still holds.
    fn expected(&self, sim: &Simulator) -> Option<DeviceId> {
        let (id, at) = self.selected?;
        let overtaken = sim
            .plugged()
            .iter()
            .any(|d| self.first_plug.get(&d.id).is_some_and(|step| *step > at));
        (!overtaken).then_some(id)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn simulator_invariants_hold((kinds, ops) in arb_case()) {
        let mut sim = Simulator::new();
        let devices = sim.abc(&kinds, None).unwrap();
        let mut sticky = Stickiness::default();
        let mut last_step = 0_u64;

        for op in ops {
            let before_active = sim.elected().unwrap();
            let before_len = sim.log().len();
            let before_plugged: Vec<DeviceId> = sim.plugged().iter().map(|d| d.id).collect();

            let result = match op {
                Op::Plug(i) => sim.plug(devices[i].id).map(|step| {
                    prop_assert!(sim.plugged().contains(devices[i].id));
                    sticky.first_plug.entry(devices[i].id).or_insert(step);
                    Ok(Some(step))
                }),
                Op::Unplug(i) => sim.unplug(devices[i].id).map(|step| {
                    prop_assert!(!sim.plugged().contains(devices[i].id));
                    if before_active.map(|d| d.id) != Some(devices[i].id) {
                        prop_assert_eq!(sim.elected().unwrap(), before_active);
                    }
                    if sticky.selected.is_some_and(|(id, _)| id == devices[i].id) {
                        sticky.selected = None;
                    }
                    Ok(Some(step))
                }),
                Op::Select(i) => sim.select(devices[i].id).map(|step| {
                    sticky.selected = Some((devices[i].id, step));
                    Ok(Some(step))
                }),
                Op::Expect(i) => sim.expect(devices[i].id).map(|first| {
                    let second = sim.expect(devices[i].id).unwrap();
                    prop_assert_eq!(first, second);
                    Ok(None)
                }),
            };

            match result {
                Ok(inner) => {
                    if let Some(step) = inner? {
                        prop_assert!(step > last_step, "steps must strictly increase");
                        last_step = step;
                    }
                }
                Err(err) => {
                    prop_assert_eq!(err.class(), ErrorClass::Scenario);
                    prop_assert_eq!(sim.log().len(), before_len);
                    let after: Vec<DeviceId> = sim.plugged().iter().map(|d| d.id).collect();
                    prop_assert_eq!(after, before_plugged);
                }
            }

            let elected = sim.elected().unwrap();
            prop_assert_eq!(elected.is_some(), !sim.plugged().is_empty());
            if let Some(active) = elected {
                prop_assert!(sim.plugged().contains(active.id));
                prop_assert_eq!(sim.active().unwrap(), active);
            } else {
                prop_assert!(sim.active().is_err());
            }
            if let Some(id) = sticky.expected(&sim) {
                prop_assert_eq!(elected.map(|d| d.id), Some(id));
            }
        }
    }

    #[test]
    fn generated_scenarios_pass_and_transcripts_repeat(seed in any::<u64>(), devices in 1_usize..6) {
        let config = GeneratorConfig { seed, count: 3, devices, steps: 15 };
        let scenarios = generate(&config).unwrap();
        let first = run_all(&scenarios, 2);
        let second = run_all(&scenarios, 1);
        for outcome in &first {
            prop_assert_eq!(outcome.verdict, Verdict::Pass);
        }
        prop_assert_eq!(transcript::render_text(&first), transcript::render_text(&second));
        prop_assert_eq!(transcript::digest(&first), transcript::digest(&second));
    }

    #[test]
    fn scenario_files_survive_toml(seed in any::<u64>()) {
        let config = GeneratorConfig { seed, count: 1, devices: 4, steps: 10 };
        let scenario = generate(&config).unwrap().remove(0);
        let text = scenario.spec.to_toml().unwrap();
        let parsed = audio_device_selection::scenario::format::parse(
            &scenario.id,
            &text,
            audio_device_selection::scenario::format::SourceFormat::Toml,
        )
        .unwrap();
        prop_assert_eq!(parsed, Some(scenario.spec));
    }
}
