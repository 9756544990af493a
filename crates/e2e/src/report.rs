//! Pass/fail summaries of step outcomes

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Recorded result of one executed step. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_name: String,
    pub actor: String,
    pub passed: bool,
    pub http_status: Option<u16>,
    pub message: String,
    pub duration_ms: u64,

    /// A failure of this step counts against overall success
    pub critical: bool,

    /// This failure stopped the run
    pub aborted_run: bool,

    /// Response body of a failed request, truncated
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStep {
    pub step_name: String,
    pub message: String,
    pub critical: bool,
    pub aborted_run: bool,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub critical_failures: usize,
    pub failures: Vec<FailedStep>,
    pub overall_success: bool,
    pub text: String,
}

/// Renders outcomes; holds no state.
pub struct ResultReporter;

impl ResultReporter {
    pub fn summarize(outcomes: &[StepOutcome]) -> Summary {
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let failures: Vec<FailedStep> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| FailedStep {
                step_name: o.step_name.clone(),
                message: o.message.clone(),
                critical: o.critical,
                aborted_run: o.aborted_run,
                response: o.response.clone(),
            })
            .collect();
        let critical_failures = failures.iter().filter(|f| f.critical).count();
        let overall_success = critical_failures == 0;

        Summary {
            total: outcomes.len(),
            passed,
            failed: failures.len(),
            critical_failures,
            text: Self::render(outcomes, passed, &failures, overall_success),
            failures,
            overall_success,
        }
    }

    fn render(
        outcomes: &[StepOutcome],
        passed: usize,
        failures: &[FailedStep],
        overall_success: bool,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Steps: {} total, {} passed, {} failed",
            outcomes.len(),
            passed,
            failures.len()
        );

        for outcome in outcomes {
            let mark = if outcome.passed { "✓" } else { "✗" };
            let status = outcome
                .http_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = write!(
                out,
                "  {} {} [{}] {} ({} ms)",
                mark, outcome.step_name, outcome.actor, status, outcome.duration_ms
            );
            if !outcome.passed {
                let _ = write!(out, ": {}", outcome.message);
            }
            if outcome.aborted_run {
                let _ = write!(out, "  <-- ABORTED RUN");
            }
            out.push('\n');
        }

        if !failures.is_empty() {
            out.push_str("Failures:\n");
            for failure in failures {
                let severity = if failure.critical { "critical" } else { "optional" };
                let _ = writeln!(
                    out,
                    "  - {} ({}): {}",
                    failure.step_name, severity, failure.message
                );
                if let Some(response) = &failure.response {
                    let _ = writeln!(out, "    response: {}", response);
                }
            }
        }

        let _ = writeln!(
            out,
            "Result: {}",
            if overall_success { "PASSED" } else { "FAILED" }
        );
        out
    }
}
