//! Step sequencing across actors
//!
//! The orchestrator runs one step at a time:
//!
//! ```text
//! NotStarted ──run()──▶ Running ──all steps done──▶ Completed
//!                          │
//!                          └──critical failure──▶ Aborted
//! ```
//!
//! Each step first resolves its context inputs, then switches session if the
//! actor changed, then performs its operation. Failures of optional steps are
//! recorded and the run moves on; failures of critical steps, and any session,
//! context or isolation error, abort the run.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::{ApiClient, HttpMethod};
use crate::config::RunnerConfig;
use crate::context::WorkflowContext;
use crate::error::{E2eError, E2eResult};
use crate::poller::AsyncJobPoller;
use crate::report::StepOutcome;
use crate::session::SessionManager;
use crate::shape;
use crate::workflow::{Capture, Operation, Step, WorkflowSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

/// Result of running one workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub workflow: String,
    pub state: OrchestratorState,
    pub outcomes: Vec<StepOutcome>,
    /// Name of the step that aborted the run
    pub abort_cause: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl WorkflowRun {
    pub fn completed(&self) -> bool {
        self.state == OrchestratorState::Completed
    }
}

/// What a successful step reports back
struct StepSuccess {
    http_status: Option<u16>,
    message: String,
}

impl StepSuccess {
    fn new(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            http_status,
            message: message.into(),
        }
    }
}

/// Ids seen by both actors of an isolation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationReport {
    pub endpoint: String,
    pub seen_by_a: usize,
    pub seen_by_b: usize,
}

pub struct WorkflowOrchestrator {
    config: RunnerConfig,
    sessions: SessionManager,
    context: WorkflowContext,
    outcomes: Vec<StepOutcome>,
    state: OrchestratorState,
}

impl WorkflowOrchestrator {
    pub fn new(config: RunnerConfig, client: Arc<dyn ApiClient>) -> Self {
        let sessions = SessionManager::new(client, config.base_url.clone(), config.login.clone());
        Self {
            config,
            sessions,
            context: WorkflowContext::new(),
            outcomes: Vec::new(),
            state: OrchestratorState::NotStarted,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    /// Run every step of `workflow` in order
    pub async fn run(&mut self, workflow: &WorkflowSpec) -> WorkflowRun {
        let started_at = Utc::now();
        let start = Instant::now();

        self.context = WorkflowContext::new();
        self.outcomes = Vec::new();
        self.sessions.sign_out();
        self.state = OrchestratorState::Running;
        info!("Running workflow '{}' ({} steps)", workflow.name, workflow.steps.len());

        let mut abort_cause = None;

        for step in &workflow.steps {
            let step_start = Instant::now();
            debug!("Step '{}' ({}) as '{}'", step.name, step.action_name(), step.actor);

            let result = self.execute_step(step).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match result {
                Ok(success) => {
                    info!("✓ {} ({} ms)", step.name, duration_ms);
                    self.outcomes.push(StepOutcome {
                        step_name: step.name.clone(),
                        actor: step.actor.clone(),
                        passed: true,
                        http_status: success.http_status,
                        message: success.message,
                        duration_ms,
                        critical: step.is_critical(),
                        aborted_run: false,
                        response: None,
                    });
                }
                Err(e) => {
                    let aborts = e.aborts_run() || step.is_critical();
                    if aborts {
                        error!("✗ {} - {} (aborting)", step.name, e);
                    } else {
                        warn!("✗ {} - {} (optional, continuing)", step.name, e);
                    }
                    if let Some(body) = e.response_body() {
                        debug!("Response of '{}': {}", step.name, body);
                    }

                    self.outcomes.push(StepOutcome {
                        step_name: step.name.clone(),
                        actor: step.actor.clone(),
                        passed: false,
                        http_status: e.http_status(),
                        message: e.to_string(),
                        duration_ms,
                        critical: aborts,
                        aborted_run: aborts,
                        response: e.response_body().map(str::to_string),
                    });

                    if aborts {
                        abort_cause = Some(step.name.clone());
                        break;
                    }
                }
            }
        }

        self.state = if abort_cause.is_some() {
            OrchestratorState::Aborted
        } else {
            OrchestratorState::Completed
        };

        debug!(
            "Context at end of '{}': {:?}",
            workflow.name,
            self.context.keys().collect::<Vec<_>>()
        );
        info!("Workflow '{}' finished: {:?}", workflow.name, self.state);

        WorkflowRun {
            workflow: workflow.name.clone(),
            state: self.state,
            outcomes: self.outcomes.clone(),
            abort_cause,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute_step(&mut self, step: &Step) -> E2eResult<StepSuccess> {
        // Inputs are checked before any HTTP call, login included.
        self.context.require_all(&step.required_keys())?;

        let credentials = self.config.credentials(&step.actor)?;
        if matches!(step.operation, Operation::Request { .. } | Operation::Poll { .. }) {
            self.sessions.ensure_actor(&credentials).await?;
        }

        match &step.operation {
            Operation::Login => {
                let session = self.sessions.authenticate(&credentials).await?;
                Ok(StepSuccess::new(
                    None,
                    format!("logged in as {} ({})", session.actor_id, session.role),
                ))
            }
            Operation::Request {
                method,
                path,
                body,
                expect_status,
                capture,
            } => {
                self.execute_request(
                    step,
                    *method,
                    path,
                    body.as_ref(),
                    expect_status.as_deref(),
                    capture.as_ref(),
                )
                .await
            }
            Operation::Poll {
                path,
                status_pointer,
                terminal,
                hard_failure,
                interval_ms,
                timeout_ms,
                capture_status,
            } => {
                let path = self.context.render(path)?;
                let poller =
                    AsyncJobPoller::new(self.config.poll.to_poll_config(*interval_ms, *timeout_ms));
                let sessions = &self.sessions;
                let (path_ref, pointer) = (path.as_str(), status_pointer.as_str());
                let result = poller
                    .poll_until_terminal(
                        move || fetch_status(sessions, path_ref, pointer),
                        terminal.as_slice(),
                        hard_failure.as_slice(),
                    )
                    .await;

                let status = result.status.clone().unwrap_or_else(|| "<none>".to_string());
                if !result.terminal {
                    let reason = match &result.last_error {
                        Some(err) => format!(
                            "no terminal status after {} ms (last status {}, last error: {})",
                            result.elapsed_ms, status, err
                        ),
                        None => format!(
                            "no terminal status after {} ms (last status {})",
                            result.elapsed_ms, status
                        ),
                    };
                    return Err(E2eError::step_failed(&step.name, None, reason, None));
                }
                if result.hard_failure {
                    return Err(E2eError::step_failed(
                        &step.name,
                        None,
                        format!("job ended in {}", status),
                        None,
                    ));
                }

                if let Some(key) = capture_status {
                    self.context.set(key.clone(), status.clone())?;
                }
                Ok(StepSuccess::new(
                    None,
                    format!(
                        "{} after {} ms ({} polls)",
                        status, result.elapsed_ms, result.attempts
                    ),
                ))
            }
            Operation::AssertIsolated {
                other_actor,
                path,
                items_pointer,
                id_field,
            } => {
                let path = self.context.render(path)?;
                let report = self
                    .assert_isolated(&step.actor, other_actor, &path, items_pointer, id_field)
                    .await?;
                Ok(StepSuccess::new(
                    None,
                    format!(
                        "{} isolated ({} vs {} ids, no overlap)",
                        report.endpoint, report.seen_by_a, report.seen_by_b
                    ),
                ))
            }
            Operation::Log { message } => {
                info!("[WORKFLOW LOG] {}", message);
                Ok(StepSuccess::new(None, message.clone()))
            }
        }
    }

    async fn execute_request(
        &mut self,
        step: &Step,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        expect_status: Option<&[u16]>,
        capture: Option<&Capture>,
    ) -> E2eResult<StepSuccess> {
        let path = self.context.render(path)?;
        let body = body.map(|b| self.context.render_json(b)).transpose()?;

        let response = self.sessions.request(method, &path, body.as_ref()).await?;

        let accepted = match expect_status {
            Some(statuses) => statuses.contains(&response.status_code),
            None => response.is_success(),
        };
        if !accepted {
            let expected = match expect_status {
                Some(statuses) => format!("{:?}", statuses),
                None => "2xx".to_string(),
            };
            return Err(E2eError::step_failed(
                &step.name,
                Some(response.status_code),
                format!(
                    "{} {} returned {}, expected {}",
                    method, path, response.status_code, expected
                ),
                Some(&response.body),
            ));
        }

        if let Some(capture) = capture {
            let json = shape::json_body(&response, &path)?;
            let value = shape::extract_scalar(json, &capture.pointer, &path)?;
            debug!("Captured {} = {}", capture.key, value);
            self.context.set(capture.key.clone(), value)?;
        }

        Ok(StepSuccess::new(
            Some(response.status_code),
            format!("{} {} -> {}", method, path, response.status_code),
        ))
    }

    /// List `path` as two actors and fail if their id sets intersect.
    ///
    /// Leaves the session of `actor_b` active.
    pub async fn assert_isolated(
        &mut self,
        actor_a: &str,
        actor_b: &str,
        path: &str,
        items_pointer: &str,
        id_field: &str,
    ) -> E2eResult<IsolationReport> {
        let ids_a = self.list_ids_as(actor_a, path, items_pointer, id_field).await?;
        let ids_b = self.list_ids_as(actor_b, path, items_pointer, id_field).await?;

        let overlap: Vec<String> = ids_a.intersection(&ids_b).cloned().collect();
        if !overlap.is_empty() {
            error!(
                "Isolation violation on {}: {} shared ids between '{}' and '{}'",
                path,
                overlap.len(),
                actor_a,
                actor_b
            );
            return Err(E2eError::IsolationViolation {
                actor_a: actor_a.to_string(),
                actor_b: actor_b.to_string(),
                endpoint: path.to_string(),
                overlap,
            });
        }

        Ok(IsolationReport {
            endpoint: path.to_string(),
            seen_by_a: ids_a.len(),
            seen_by_b: ids_b.len(),
        })
    }

    async fn list_ids_as(
        &mut self,
        actor: &str,
        path: &str,
        items_pointer: &str,
        id_field: &str,
    ) -> E2eResult<BTreeSet<String>> {
        let credentials = self.config.credentials(actor)?;
        self.sessions.ensure_actor(&credentials).await?;

        let response = self.sessions.request(HttpMethod::Get, path, None).await?;
        if !response.is_success() {
            return Err(E2eError::step_failed(
                format!("list {} as {}", path, actor),
                Some(response.status_code),
                format!("listing returned {}", response.status_code),
                Some(&response.body),
            ));
        }

        let json = shape::json_body(&response, path)?;
        shape::extract_ids(json, items_pointer, id_field, path)
    }
}

/// One poll tick: GET the job and read its status
async fn fetch_status(sessions: &SessionManager, path: &str, pointer: &str) -> E2eResult<String> {
    let response = sessions.request(HttpMethod::Get, path, None).await?;
    if !response.is_success() {
        return Err(E2eError::step_failed(
            format!("poll {}", path),
            Some(response.status_code),
            format!("status fetch returned {}", response.status_code),
            Some(&response.body),
        ));
    }
    let json = shape::json_body(&response, path)?;
    shape::extract_scalar(json, pointer, path)
}
