//! Runner configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::poller::PollConfig;
use crate::session::{Credentials, Role};

/// Configuration for a workflow run, usually loaded from `hiring-e2e.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base URL of the platform API
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Login contract of the platform
    pub login: LoginConfig,

    /// Health endpoint checked before running (None = skip)
    pub health_path: Option<String>,

    /// Budget for the health preflight
    pub health_timeout_secs: u64,

    /// Defaults for poll steps that do not set their own values
    pub poll: PollDefaults,

    /// Actors keyed by the id workflow steps refer to
    pub actors: BTreeMap<String, ActorConfig>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
            login: LoginConfig::default(),
            health_path: Some("/health".to_string()),
            health_timeout_secs: 30,
            poll: PollDefaults::default(),
            actors: BTreeMap::new(),
        }
    }
}

/// Where the login endpoint lives and where its response keeps the token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub path: String,

    /// JSON pointer to the bearer token in the login response
    pub token_pointer: String,

    /// JSON pointer to the user id in the login response
    pub user_id_pointer: Option<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            path: "/api/auth/login".to_string(),
            token_pointer: "/token".to_string(),
            user_id_pointer: Some("/user/id".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollDefaults {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub fetch_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PollDefaults {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 90_000,
            fetch_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl PollDefaults {
    /// Poll configuration with optional per-step overrides
    pub fn to_poll_config(&self, interval_ms: Option<u64>, timeout_ms: Option<u64>) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(interval_ms.unwrap_or(self.interval_ms)),
            timeout: Duration::from_millis(timeout_ms.unwrap_or(self.timeout_ms)),
            fetch_retries: self.fetch_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// A role-bound identity used to log in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub email: String,

    /// Inline password (handy for local fixtures)
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,

    pub role: Role,
}

impl ActorConfig {
    /// Resolve login credentials for this actor.
    ///
    /// A password that cannot be resolved means the actor cannot log in, so it
    /// fails as an authentication error.
    pub fn credentials(&self, actor_id: &str) -> E2eResult<Credentials> {
        let unresolved = |reason: String| E2eError::Authentication {
            actor: actor_id.to_string(),
            reason,
        };
        let password = match (&self.password_env, &self.password) {
            (Some(var), _) => std::env::var(var)
                .map_err(|_| unresolved(format!("environment variable {} is not set", var)))?,
            (None, Some(password)) => password.clone(),
            (None, None) => {
                return Err(unresolved(
                    "neither password nor password_env is configured".to_string(),
                ))
            }
        };

        Ok(Credentials {
            actor_id: actor_id.to_string(),
            email: self.email.clone(),
            password,
            role: self.role,
        })
    }
}

impl RunnerConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file that must exist
    pub fn load_required(path: &Path) -> E2eResult<Self> {
        if !path.exists() {
            return Err(E2eError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> E2eResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Credentials for an actor id used by a workflow step
    pub fn credentials(&self, actor_id: &str) -> E2eResult<Credentials> {
        self.actors
            .get(actor_id)
            .ok_or_else(|| E2eError::UnknownActor(actor_id.to_string()))?
            .credentials(actor_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
