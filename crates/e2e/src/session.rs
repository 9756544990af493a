//! Authenticated session handling
//!
//! One session at a time: switching actor discards the previous session
//! before logging in again.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiResponse, HttpMethod};
use crate::config::LoginConfig;
use crate::error::{E2eError, E2eResult};
use crate::shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    HrSpecialist,
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::HrSpecialist => "HR_SPECIALIST",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub actor_id: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("actor_id", &self.actor_id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// An authenticated identity. Immutable once created.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub actor_id: String,
    pub role: Role,
    pub bearer_token: String,
    pub base_url: String,
    pub user_id: Option<String>,
    pub authenticated_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("actor_id", &self.actor_id)
            .field("role", &self.role)
            .field("bearer_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}

pub struct SessionManager {
    client: Arc<dyn ApiClient>,
    base_url: String,
    login: LoginConfig,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn ApiClient>, base_url: impl Into<String>, login: LoginConfig) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            login,
            current: None,
        }
    }

    /// Log in as `credentials`, replacing whatever session was active
    pub async fn authenticate(&mut self, credentials: &Credentials) -> E2eResult<Session> {
        if let Some(previous) = self.current.take() {
            debug!("Discarding session of '{}'", previous.actor_id);
        }

        let auth_error = |reason: String| E2eError::Authentication {
            actor: credentials.actor_id.clone(),
            reason,
        };

        let response = self
            .client
            .login(&credentials.email, &credentials.password)
            .await
            .map_err(|e| auth_error(e.to_string()))?;

        if !response.is_success() {
            warn!(
                "Login for '{}' returned HTTP {}",
                credentials.actor_id, response.status_code
            );
            return Err(auth_error(format!(
                "login returned HTTP {}",
                response.status_code
            )));
        }

        let session = self
            .session_from_response(credentials, &response)
            .map_err(|e| auth_error(e.to_string()))?;

        info!(
            "Authenticated as '{}' ({})",
            session.actor_id, session.role
        );
        self.current = Some(session.clone());
        Ok(session)
    }

    fn session_from_response(
        &self,
        credentials: &Credentials,
        response: &ApiResponse,
    ) -> E2eResult<Session> {
        let body = shape::json_body(response, &self.login.path)?;
        let bearer_token = shape::extract_scalar(body, &self.login.token_pointer, &self.login.path)?;
        let user_id = match &self.login.user_id_pointer {
            Some(pointer) => shape::extract_scalar(body, pointer, &self.login.path).ok(),
            None => None,
        };

        Ok(Session {
            actor_id: credentials.actor_id.clone(),
            role: credentials.role,
            bearer_token,
            base_url: self.base_url.clone(),
            user_id,
            authenticated_at: Utc::now(),
        })
    }

    /// Authenticate only if the active session belongs to someone else
    pub async fn ensure_actor(&mut self, credentials: &Credentials) -> E2eResult<Session> {
        match &self.current {
            Some(session) if session.actor_id == credentials.actor_id => Ok(session.clone()),
            _ => self.authenticate(credentials).await,
        }
    }

    pub fn current_session(&self) -> E2eResult<&Session> {
        self.current.as_ref().ok_or(E2eError::NoActiveSession)
    }

    pub fn sign_out(&mut self) {
        self.current = None;
    }

    /// Issue a request as the current session
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> E2eResult<ApiResponse> {
        let session = self.current_session()?;
        self.client
            .request(method, path, body, Some(&session.bearer_token))
            .await
    }
}
