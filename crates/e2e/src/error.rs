//! Error types for workflow runs

use thiserror::Error;

/// Upper bound on the response body kept inside a step failure.
const MAX_DIAGNOSTIC_BODY: usize = 2048;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Authentication failed for actor '{actor}': {reason}")]
    Authentication { actor: String, reason: String },

    #[error("No active session: authenticate before issuing requests")]
    NoActiveSession,

    #[error("Missing artifact '{0}': no earlier step produced it")]
    MissingArtifact(String),

    #[error("Duplicate artifact '{0}': an earlier step already produced it")]
    DuplicateArtifact(String),

    #[error("Isolation violation on {endpoint}: '{actor_a}' and '{actor_b}' both see {overlap:?}")]
    IsolationViolation {
        actor_a: String,
        actor_b: String,
        endpoint: String,
        overlap: Vec<String>,
    },

    #[error("Step failed: {step} - {reason}")]
    StepFailed {
        step: String,
        status: Option<u16>,
        reason: String,
        response: Option<String>,
    },

    #[error("Unexpected response shape from {endpoint}: {reason}")]
    ResponseShape { endpoint: String, reason: String },

    #[error("Unknown actor '{0}': not defined in configuration")]
    UnknownActor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow parse error: {0}")]
    WorkflowParse(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Build a step failure, keeping a bounded copy of the raw response.
    pub fn step_failed(
        step: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
        response: Option<&str>,
    ) -> Self {
        E2eError::StepFailed {
            step: step.into(),
            status,
            reason: reason.into(),
            response: response.map(truncate_body),
        }
    }

    /// Errors that stop the run whatever the step's declared criticality.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            E2eError::Authentication { .. }
                | E2eError::NoActiveSession
                | E2eError::MissingArtifact(_)
                | E2eError::DuplicateArtifact(_)
                | E2eError::IsolationViolation { .. }
                | E2eError::UnknownActor(_)
        )
    }

    /// HTTP status observed when the error happened, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            E2eError::StepFailed { status, .. } => *status,
            E2eError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Raw response attached for diagnostics.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            E2eError::StepFailed { response, .. } => response.as_deref(),
            _ => None,
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_DIAGNOSTIC_BODY {
        return body.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &body[..end], body.len())
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_and_context_errors_abort() {
        assert!(E2eError::NoActiveSession.aborts_run());
        assert!(E2eError::MissingArtifact("offerId".into()).aborts_run());
        assert!(E2eError::DuplicateArtifact("jobId".into()).aborts_run());
        assert!(E2eError::Authentication {
            actor: "hr".into(),
            reason: "401".into()
        }
        .aborts_run());
    }

    #[test]
    fn test_step_failure_follows_criticality() {
        let err = E2eError::step_failed("create-analysis", Some(500), "expected 2xx", Some("{}"));
        assert!(!err.aborts_run());
        assert_eq!(err.http_status(), Some(500));
        assert_eq!(err.response_body(), Some("{}"));
    }

    #[test]
    fn test_long_response_is_truncated() {
        let body = "x".repeat(MAX_DIAGNOSTIC_BODY + 10);
        let err = E2eError::step_failed("s", Some(500), "boom", Some(&body));
        let kept = err.response_body().unwrap();
        assert!(kept.starts_with(&"x".repeat(MAX_DIAGNOSTIC_BODY)));
        assert!(kept.ends_with(&format!("({} bytes total)", body.len())));
    }
}
