//! HTTP boundary to the platform under test

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::E2eResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and body of one API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,

    /// Parsed body, when the body was JSON
    pub json: Option<Value>,

    /// Raw body text, kept for failure diagnostics
    pub body: String,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let json = serde_json::from_str(&body).ok();
        Self {
            status_code,
            json,
            body,
        }
    }

    pub fn from_json(status_code: u16, json: Value) -> Self {
        Self {
            status_code,
            body: json.to_string(),
            json: Some(json),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Calls the orchestrator needs from the platform
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Exchange credentials for a token; the caller interprets the response
    async fn login(&self, email: &str, password: &str) -> E2eResult<ApiResponse>;

    /// Issue an API request, optionally with a bearer token
    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        bearer_token: Option<&str>,
    ) -> E2eResult<ApiResponse>;
}

/// `reqwest`-backed client against a live platform
pub struct HttpApiClient {
    base_url: String,
    login_path: String,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(
        base_url: impl Into<String>,
        login_path: impl Into<String>,
        timeout: Duration,
    ) -> E2eResult<Self> {
        let base = base_url.into();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            login_path: login_path.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn into_api_response(response: reqwest::Response) -> E2eResult<ApiResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse::new(status, body))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn login(&self, email: &str, password: &str) -> E2eResult<ApiResponse> {
        let payload = serde_json::json!({ "email": email, "password": password });
        debug!("POST {} as {}", self.login_path, email);

        let response = self
            .client
            .post(self.endpoint(&self.login_path))
            .json(&payload)
            .send()
            .await?;

        Self::into_api_response(response).await
    }

    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        bearer_token: Option<&str>,
    ) -> E2eResult<ApiResponse> {
        debug!("{} {}", method, path);

        let mut builder = self.client.request(method.to_reqwest(), self.endpoint(path));
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        Self::into_api_response(response).await
    }
}
