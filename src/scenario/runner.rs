//! Scenario runner: one fresh simulator per scenario, guarded execution,
//! outcome classification, and a worker pool for running many at once.
//!
//! Three things can go wrong and they are kept apart:
//! - an `expect` disagrees with the election rule (policy failure, collected,
//!   the scenario keeps going);
//! - the scenario breaks a simulator precondition or cannot be parsed
//!   (scenario error, the scenario stops);
//! - anything else, including a panic (infrastructure error).

#![allow(missing_docs)]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel as channel;
use parking_lot::Mutex;
use serde::Serialize;

use crate::core::errors::{AdselError, ErrorClass, Result};
use crate::scenario::format::{Scenario, Step};
use crate::scenario::loader::LoadFailure;
use crate::sim::device::Device;
use crate::sim::simulator::{Assertion, Simulator};

/// One-word outcome of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    ScenarioError,
    InfraError,
}

impl Verdict {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::ScenarioError => "SCENARIO-ERROR",
            Self::InfraError => "INFRA-ERROR",
        }
    }
}

/// Error captured while running a scenario, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub code: String,
    pub class: ErrorClass,
    pub message: String,
    /// 1-based index of the step that failed, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
}

impl OutcomeError {
    fn from_error(err: &AdselError, step_index: Option<usize>) -> Self {
        Self {
            code: err.code().to_string(),
            class: err.class(),
            message: err.to_string(),
            step_index,
        }
    }
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// 1-based position in the scenario's step list.
    pub index: usize,
    pub step: Step,
    /// Event-log step, for mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_step: Option<u64>,
    /// Elected device after the step.
    pub active: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Assertion>,
}

/// Structured result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutcome {
    pub id: String,
    pub devices: Vec<Device>,
    pub records: Vec<StepRecord>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl ScenarioOutcome {
    pub fn assertions(&self) -> impl Iterator<Item = &Assertion> {
        self.records.iter().filter_map(|r| r.assertion.as_ref())
    }

    #[must_use]
    pub fn failed_assertions(&self) -> usize {
        self.assertions().filter(|a| !a.passed()).count()
    }

    /// Outcome for a file that matched discovery but never loaded.
    #[must_use]
    pub fn from_load_failure(failure: &LoadFailure) -> Self {
        let error = OutcomeError::from_error(&failure.error, None);
        Self {
            id: failure.id.clone(),
            devices: Vec::new(),
            records: Vec::new(),
            verdict: verdict_for_class(error.class),
            error: Some(error),
        }
    }
}

const fn verdict_for_class(class: ErrorClass) -> Verdict {
    match class {
        ErrorClass::Scenario => Verdict::ScenarioError,
        ErrorClass::Infrastructure | ErrorClass::Configuration => Verdict::InfraError,
    }
}

/// Run one scenario against a fresh simulator.
#[must_use]
pub fn run_scenario(scenario: &Scenario) -> ScenarioOutcome {
    run_scenario_observed(scenario, |_, _| {})
}

/// Like [`run_scenario`], calling `observe` after every applied step with
/// the simulator as that step left it.
pub fn run_scenario_observed<F>(scenario: &Scenario, mut observe: F) -> ScenarioOutcome
where
    F: FnMut(&StepRecord, &Simulator),
{
    let mut devices = Vec::new();
    let mut records = Vec::new();

    let guarded = panic::catch_unwind(AssertUnwindSafe(|| {
        interpret(scenario, &mut devices, &mut records, &mut observe)
    }));

    let error = match guarded {
        Ok(Ok(())) => None,
        Ok(Err((err, step_index))) => Some(OutcomeError::from_error(&err, step_index)),
        Err(payload) => Some(OutcomeError {
            code: "ADSEL-3900".to_string(),
            class: ErrorClass::Infrastructure,
            message: format!("scenario panicked: {}", panic_message(payload.as_ref())),
            step_index: records.last().map(|r: &StepRecord| r.index + 1),
        }),
    };

    let verdict = match &error {
        Some(e) => verdict_for_class(e.class),
        None if records
            .iter()
            .filter_map(|r| r.assertion.as_ref())
            .any(|a| !a.passed()) =>
        {
            Verdict::Fail
        }
        None => Verdict::Pass,
    };

    ScenarioOutcome {
        id: scenario.id.clone(),
        devices,
        records,
        verdict,
        error,
    }
}

type StepError = (AdselError, Option<usize>);

fn interpret<F>(
    scenario: &Scenario,
    devices: &mut Vec<Device>,
    records: &mut Vec<StepRecord>,
    observe: &mut F,
) -> std::result::Result<(), StepError>
where
    F: FnMut(&StepRecord, &Simulator),
{
    let mut sim = Simulator::new();
    *devices = sim
        .abc(&scenario.spec.devices, scenario.spec.charset.as_deref())
        .map_err(|e| (e, None))?;

    for (offset, step) in scenario.spec.steps.iter().copied().enumerate() {
        let index = offset + 1;
        let record = apply(&mut sim, index, step).map_err(|e| (e, Some(index)))?;
        observe(&record, &sim);
        records.push(record);
    }
    Ok(())
}

fn apply(sim: &mut Simulator, index: usize, step: Step) -> Result<StepRecord> {
    let mut event_step = None;
    let mut assertion = None;
    match step {
        Step::Plug(id) => event_step = Some(sim.plug(id)?),
        Step::Unplug(id) => event_step = Some(sim.unplug(id)?),
        Step::Select(id) => event_step = Some(sim.select(id)?),
        Step::Expect(id) => assertion = Some(sim.expect(id)?),
        Step::Active => {
            sim.active()?;
        }
    }
    Ok(StepRecord {
        index,
        step,
        event_step,
        active: sim.elected()?,
        assertion,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Run every scenario on `parallelism` worker threads.
///
/// Scenarios share nothing, so execution order is irrelevant; results come
/// back sorted by id.
#[must_use]
pub fn run_all(scenarios: &[Scenario], parallelism: usize) -> Vec<ScenarioOutcome> {
    let workers = parallelism.clamp(1, scenarios.len().max(1));
    let (work_tx, work_rx) = channel::bounded::<&Scenario>(scenarios.len().max(1));
    for scenario in scenarios {
        // Capacity covers every scenario, so this cannot block.
        let _ = work_tx.send(scenario);
    }
    drop(work_tx);

    let results = Mutex::new(Vec::with_capacity(scenarios.len()));
    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let results = &results;
            scope.spawn(move || {
                while let Ok(scenario) = work_rx.recv() {
                    let outcome = run_scenario(scenario);
                    results.lock().push(outcome);
                }
            });
        }
    });

    let mut outcomes = results.into_inner();
    outcomes.sort_by(|a, b| a.id.cmp(&b.id));
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::format::{ScenarioSpec, SourceFormat, parse};
    use crate::sim::device::DeviceId;

    fn scenario(id: &str, text: &str) -> Scenario {
        Scenario {
            id: id.to_string(),
            source: None,
            spec: parse(id, text, SourceFormat::Toml).unwrap().unwrap(),
        }
    }

    #[test]
    fn passing_scenario_records_every_step() {
        let s = scenario(
            "h4",
            r#"devices = ["Internal", "HDMI"]
               steps = ["plug A", "plug B", "select A", "unplug B", "plug B", "expect A"]"#,
        );
        let outcome = run_scenario(&s);
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.records.len(), 6);
        assert_eq!(outcome.records[4].event_step, Some(5));
        assert_eq!(outcome.records[1].active.map(|d| d.id), Some(DeviceId('B')));
        assert_eq!(outcome.assertions().count(), 1);
    }

    #[test]
    fn panic_during_scenario_is_infrastructure_error() {
        let s = scenario(
            "boom",
            r#"devices = ["Internal", "HDMI"]
               steps = ["plug A", "plug B", "expect B"]"#,
        );
        let outcome = run_scenario_observed(&s, |record, _| {
            assert!(record.index < 2, "observer gave up at step {}", record.index);
        });
        assert_eq!(outcome.verdict, Verdict::InfraError);
        assert_eq!(outcome.records.len(), 1);
        let error = outcome.error.expect("panic is reported");
        assert_eq!(error.code, "ADSEL-3900");
        assert_eq!(error.class, ErrorClass::Infrastructure);
        assert_eq!(error.step_index, Some(2));
        assert!(error.message.contains("observer gave up at step 2"), "{}", error.message);
    }

    #[test]
    fn all_mismatches_are_collected() {
        let s = scenario(
            "wrong",
            r#"devices = ["Internal", "HDMI"]
               steps = ["plug A", "expect A", "plug B", "expect A", "select A", "expect B"]"#,
        );
        let outcome = run_scenario(&s);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert_eq!(outcome.failed_assertions(), 2);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.records.len(), 6, "failures must not stop the run");
    }

    #[test]
    fn precondition_violation_is_scenario_error() {
        let s = scenario(
            "broken",
            r#"devices = ["Internal", "HDMI"]
               steps = ["plug A", "unplug B", "expect A"]"#,
        );
        let outcome = run_scenario(&s);
        assert_eq!(outcome.verdict, Verdict::ScenarioError);
        let err = outcome.error.expect("error recorded");
        assert_eq!(err.step_index, Some(2));
        assert_eq!(err.class, ErrorClass::Scenario);
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn bad_declaration_is_scenario_error() {
        let s = Scenario {
            id: "too-many".into(),
            source: None,
            spec: ScenarioSpec {
                description: None,
                devices: vec![crate::sim::device::DeviceKind::Hdmi; 3],
                charset: Some("AB".into()),
                steps: vec![],
            },
        };
        let outcome = run_scenario(&s);
        assert_eq!(outcome.verdict, Verdict::ScenarioError);
        assert_eq!(outcome.error.unwrap().step_index, None);
    }

    #[test]
    fn active_on_empty_set_is_scenario_error() {
        let s = scenario("empty", "devices = [\"USB\"]\nsteps = [\"active\"]\n");
        assert_eq!(run_scenario(&s).verdict, Verdict::ScenarioError);
    }

    #[test]
    fn panic_payloads_are_described() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn run_all_sorts_results_regardless_of_parallelism() {
        let text = "devices = [\"Internal\"]\nsteps = [\"plug A\", \"expect A\"]\n";
        let scenarios: Vec<Scenario> = ["c", "a", "b", "e", "d"]
            .into_iter()
            .map(|id| scenario(id, text))
            .collect();
        for jobs in [1, 3, 16] {
            let ids: Vec<String> = run_all(&scenarios, jobs)
                .into_iter()
                .map(|o| o.id)
                .collect();
            assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        }
    }

    #[test]
    fn observer_sees_each_applied_step() {
        let s = scenario(
            "obs",
            r#"devices = ["Internal", "USB"]
               steps = ["plug A", "plug B", "select A", "unplug A"]"#,
        );
        let mut seen = Vec::new();
        let outcome = run_scenario_observed(&s, |record, sim| {
            seen.push((record.index, sim.plugged().len()));
        });
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 2), (4, 1)]);
    }

    #[test]
    fn run_all_handles_empty_input() {
        assert!(run_all(&[], 4).is_empty());
    }
}
