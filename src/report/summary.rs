//! Run summary and the exit-code contract.
//!
//! Policy failures, scenario errors and infrastructure errors are counted
//! and listed separately: "the policy is wrong", "the scenario is wrong" and
//! "the harness is broken" call for different fixes.

#![allow(missing_docs)]

use std::fmt::Write as _;

use serde::Serialize;

use crate::scenario::runner::{ScenarioOutcome, Verdict};

/// Exit status of a run. The numeric value is the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed = 0,
    AssertionFailures = 1,
    ScenarioErrors = 2,
    InfrastructureErrors = 3,
}

impl RunStatus {
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        self as i32
    }
}

/// One line in a failure bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureLine {
    pub scenario: String,
    pub detail: String,
}

/// Counts and failure listings for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scenarios: usize,
    pub passed: usize,
    pub expectations: usize,
    pub failed_expectations: usize,
    pub policy_failures: Vec<FailureLine>,
    pub scenario_errors: Vec<FailureLine>,
    pub infrastructure_errors: Vec<FailureLine>,
    pub status: RunStatus,
}

impl RunSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[ScenarioOutcome]) -> Self {
        let mut summary = Self {
            scenarios: outcomes.len(),
            passed: 0,
            expectations: 0,
            failed_expectations: 0,
            policy_failures: Vec::new(),
            scenario_errors: Vec::new(),
            infrastructure_errors: Vec::new(),
            status: RunStatus::Passed,
        };

        for outcome in outcomes {
            summary.expectations += outcome.assertions().count();
            summary.failed_expectations += outcome.failed_assertions();

            // Mismatches before a scenario error still count as policy failures.
            for assertion in outcome.assertions().filter(|a| !a.passed()) {
                summary.policy_failures.push(FailureLine {
                    scenario: outcome.id.clone(),
                    detail: format!(
                        "expected {} at step {}, elected {}",
                        assertion.claimed.label(),
                        assertion.step,
                        assertion
                            .elected
                            .map_or_else(|| "nothing".to_string(), |d| d.label())
                    ),
                });
            }

            let error_line = || FailureLine {
                scenario: outcome.id.clone(),
                detail: outcome
                    .error
                    .as_ref()
                    .map_or_else(String::new, |e| e.message.clone()),
            };
            match outcome.verdict {
                Verdict::Pass => summary.passed += 1,
                Verdict::Fail => {}
                Verdict::ScenarioError => summary.scenario_errors.push(error_line()),
                Verdict::InfraError => summary.infrastructure_errors.push(error_line()),
            }
        }

        summary.status = if !summary.infrastructure_errors.is_empty() {
            RunStatus::InfrastructureErrors
        } else if !summary.scenario_errors.is_empty() {
            RunStatus::ScenarioErrors
        } else if !summary.policy_failures.is_empty() {
            RunStatus::AssertionFailures
        } else {
            RunStatus::Passed
        };
        summary
    }

    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Plain-text summary block.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} scenarios, {} passed; {}/{} expectations passed",
            self.scenarios,
            self.passed,
            self.expectations - self.failed_expectations,
            self.expectations
        );
        for (title, lines) in [
            ("policy failures", &self.policy_failures),
            ("scenario errors", &self.scenario_errors),
            ("infrastructure errors", &self.infrastructure_errors),
        ] {
            if lines.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{title} ({}):", lines.len());
            for line in lines {
                let _ = writeln!(out, "  {}: {}", line.scenario, line.detail);
            }
        }
        out
    }
}
