//! Hiring platform E2E workflow runner
//!
//! This crate drives end-to-end checks of the hiring platform's HTTP API:
//! - Logs in as several roles in sequence (one session at a time)
//! - Creates dependent resources and threads their ids between steps
//! - Polls asynchronous analysis jobs until they settle
//! - Asserts tenant and department isolation between actors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TestRunner (one workflow at a time)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WorkflowOrchestrator                                       │
//! │    ├── SessionManager ── ApiClient ── platform HTTP API     │
//! │    ├── WorkflowContext  (write-once jobId, candidateId...)  │
//! │    ├── AsyncJobPoller   (poll steps, health preflight)      │
//! │    └── Vec<StepOutcome> ──▶ ResultReporter ──▶ Summary      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WorkflowSpec (YAML)                                        │
//! │    ├── name, description, tags                              │
//! │    └── steps: [Step { name, actor, inputs, criticality }]   │
//! │          ├── login                                          │
//! │          ├── request { method, path, body, capture }        │
//! │          ├── poll { path, status_pointer, terminal }        │
//! │          ├── assert_isolated { other_actor, path }          │
//! │          └── log { message }                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod runner;
pub mod session;
pub mod shape;
pub mod workflow;

pub use client::{ApiClient, ApiResponse, HttpApiClient, HttpMethod};
pub use config::RunnerConfig;
pub use context::WorkflowContext;
pub use error::{E2eError, E2eResult};
pub use orchestrator::{OrchestratorState, WorkflowOrchestrator, WorkflowRun};
pub use poller::{AsyncJobPoller, PollConfig, PollResult};
pub use report::{ResultReporter, StepOutcome, Summary};
pub use runner::{TestRunner, TestSuiteResult};
pub use session::{Credentials, Role, Session, SessionManager};
pub use workflow::{Criticality, Step, WorkflowSpec};
