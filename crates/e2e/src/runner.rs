//! Suite runner that executes workflow files one after another

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::{ApiClient, HttpApiClient};
use crate::config::RunnerConfig;
use crate::error::{E2eError, E2eResult};
use crate::health::wait_for_healthy;
use crate::orchestrator::{WorkflowOrchestrator, WorkflowRun};
use crate::report::{ResultReporter, Summary};
use crate::workflow::WorkflowSpec;

/// Result of one workflow together with its rendered summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run: WorkflowRun,
    pub summary: Summary,
}

impl WorkflowReport {
    pub fn success(&self) -> bool {
        self.summary.overall_success
    }
}

/// Result of running all workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub reports: Vec<WorkflowReport>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Per-workflow summaries followed by a suite total
    pub fn render(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            let _ = writeln!(out, "== {} ({:?})", report.run.workflow, report.run.state);
            if let Some(cause) = &report.run.abort_cause {
                let _ = writeln!(out, "Aborted at step: {}", cause);
            }
            out.push_str(&report.summary.text);
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "Workflows: {} total, {} passed, {} failed ({} ms)",
            self.total, self.passed, self.failed, self.duration_ms
        );
        out
    }
}

/// Runs workflows against one platform; each run gets a fresh orchestrator
pub struct TestRunner {
    config: RunnerConfig,
    client: Arc<dyn ApiClient>,
}

impl TestRunner {
    /// Create a runner talking to the configured base URL over HTTP
    pub fn new(config: RunnerConfig) -> E2eResult<Self> {
        config.validate()?;
        let client = HttpApiClient::new(
            config.base_url.clone(),
            config.login.path.clone(),
            config.request_timeout(),
        )?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create a runner over any API client
    pub fn with_client(config: RunnerConfig, client: Arc<dyn ApiClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Wait for the configured health endpoint, if any
    pub async fn check_health(&self) -> E2eResult<()> {
        match &self.config.health_path {
            Some(path) => {
                wait_for_healthy(
                    self.client.as_ref(),
                    path,
                    Duration::from_secs(self.config.health_timeout_secs),
                )
                .await
            }
            None => Ok(()),
        }
    }

    /// Run a single workflow
    pub async fn run_workflow(&self, spec: &WorkflowSpec) -> WorkflowReport {
        let mut orchestrator = WorkflowOrchestrator::new(self.config.clone(), self.client.clone());
        let run = orchestrator.run(spec).await;
        let summary = ResultReporter::summarize(&run.outcomes);
        WorkflowReport { run, summary }
    }

    /// Run a list of workflows in order
    pub async fn run_specs(&self, specs: &[WorkflowSpec]) -> TestSuiteResult {
        let start = Instant::now();
        let mut reports = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} workflow(s)...", specs.len());

        for spec in specs {
            let report = self.run_workflow(spec).await;
            if report.success() {
                passed += 1;
                info!("✓ {} ({} ms)", spec.name, report.run.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - aborted at {}",
                    spec.name,
                    report.run.abort_cause.as_deref().unwrap_or("<no abort>")
                );
            }
            reports.push(report);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Workflow results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        TestSuiteResult {
            total: specs.len(),
            passed,
            failed,
            duration_ms,
            reports,
        }
    }

    /// Fail before running anything if a workflow names an actor the
    /// configuration does not define
    pub fn check_actors(&self, specs: &[WorkflowSpec]) -> E2eResult<()> {
        for spec in specs {
            for step in &spec.steps {
                for actor in step.actors() {
                    if !self.config.actors.contains_key(actor) {
                        return Err(E2eError::Config(format!(
                            "workflow '{}' step '{}' uses undefined actor '{}'",
                            spec.name, step.name, actor
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Run every workflow found at `path` (file or directory)
    pub async fn run_path(&self, path: &Path) -> E2eResult<TestSuiteResult> {
        let specs = WorkflowSpec::load(path)?;
        self.check_actors(&specs)?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run workflows at `path` carrying `tag`
    pub async fn run_tagged(&self, path: &Path, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = WorkflowSpec::load(path)?;
        let filtered: Vec<WorkflowSpec> = WorkflowSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.check_actors(&filtered)?;
        Ok(self.run_specs(&filtered).await)
    }

    /// Run the workflow named `name` found at `path`
    pub async fn run_named(&self, path: &Path, name: &str) -> E2eResult<TestSuiteResult> {
        let specs = WorkflowSpec::load(path)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::WorkflowParse(format!("Workflow not found: {}", name)))?;
        self.check_actors(std::slice::from_ref(&spec))?;
        Ok(self.run_specs(std::slice::from_ref(&spec)).await)
    }
}

/// Process exit code for a run: 0 all workflows passed, 1 a workflow
/// failed, 2 the run could not be set up
pub fn exit_code(outcome: &E2eResult<bool>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(true)), 0);
        assert_eq!(exit_code(&Ok(false)), 1);
        assert_eq!(exit_code(&Err(E2eError::Config("no actors".into()))), 2);
    }

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let config = RunnerConfig {
            base_url: "ftp://nope".to_string(),
            ..RunnerConfig::default()
        };
        assert!(matches!(TestRunner::new(config), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_undefined_actor_is_setup_error() {
        let runner = TestRunner::new(RunnerConfig::default()).unwrap();
        let spec = WorkflowSpec::from_yaml(
            "name: iso\nsteps:\n  - { name: s, actor: hr, action: log, message: hi }\n",
        )
        .unwrap();
        let err = runner.check_actors(&[spec]).unwrap_err();
        assert!(err.to_string().contains("undefined actor 'hr'"));
    }
}
