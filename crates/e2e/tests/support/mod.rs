//! In-memory stand-in for the hiring platform shared by integration tests.
//!
//! The same `FakePlatform::handle` backs both the direct `ApiClient` impl and
//! the axum server used for HTTP-level tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use hiring_e2e::config::{ActorConfig, PollDefaults};
use hiring_e2e::{ApiClient, ApiResponse, E2eResult, HttpMethod, Role, RunnerConfig};

pub const LOGIN_PATH: &str = "/api/auth/login";

struct User {
    email: String,
    password: String,
    role: Role,
    org: String,
}

struct Analysis {
    org: String,
    polls_left: u32,
    final_status: String,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    tokens: HashMap<String, usize>,
    jobs: Vec<(String, String)>,
    /// (id, organizations allowed to see it)
    candidates: Vec<(String, Vec<String>)>,
    analyses: HashMap<String, Analysis>,
    failures: Vec<(String, String, u16)>,
    requests: Vec<String>,
    polls_before_done: u32,
    final_status: String,
    next_id: u64,
}

pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    /// Two organizations, an HR specialist in org1 and a manager in each
    pub fn new() -> Self {
        let platform = Self {
            state: Mutex::new(State {
                polls_before_done: 2,
                final_status: "COMPLETED".to_string(),
                ..State::default()
            }),
        };
        platform.add_user("hr@org1.test", Role::HrSpecialist, "org1");
        platform.add_user("manager@org1.test", Role::Manager, "org1");
        platform.add_user("manager@org2.test", Role::Manager, "org2");
        platform
    }

    pub fn add_user(&self, email: &str, role: Role, org: &str) {
        self.state.lock().unwrap().users.push(User {
            email: email.to_string(),
            password: "pw".to_string(),
            role,
            org: org.to_string(),
        });
    }

    /// Answer `status` to every request whose path starts with `prefix`
    pub fn fail(&self, method: &str, prefix: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method.to_string(), prefix.to_string(), status));
    }

    /// Analyses report `final_status` after `polls` pending reads
    pub fn analysis_behaviour(&self, polls: u32, final_status: &str) {
        let mut state = self.state.lock().unwrap();
        state.polls_before_done = polls;
        state.final_status = final_status.to_string();
    }

    pub fn seed_candidate(&self, id: &str, orgs: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .candidates
            .push((id.to_string(), orgs.iter().map(|o| o.to_string()).collect()));
    }

    /// Every request seen so far, as "METHOD path"
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn handle(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> (u16, Value) {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("{} {}", method, path));

        if let Some((_, _, status)) = state
            .failures
            .iter()
            .find(|(m, prefix, _)| m == method && path.starts_with(prefix.as_str()))
        {
            return (*status, json!({"error": "injected failure"}));
        }

        if method == "GET" && path == "/health" {
            return (200, json!({"status": "ok"}));
        }

        if method == "POST" && path == LOGIN_PATH {
            return state.login(body);
        }

        let org = match token.and_then(|t| state.tokens.get(t)) {
            Some(&user) => state.users[user].org.clone(),
            None => return (401, json!({"error": "unauthorized"})),
        };

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            ("POST", ["api", "jobs"]) => {
                let id = state.next_id("job");
                state.jobs.push((id.clone(), org));
                (201, json!({"jobPosting": {"id": id}}))
            }
            ("POST", ["api", "candidates"]) => {
                let id = state.next_id("cand");
                state.candidates.push((id.clone(), vec![org]));
                (201, json!({"candidate": {"id": id}}))
            }
            ("GET", ["api", "candidates"]) => {
                let visible: Vec<Value> = state
                    .candidates
                    .iter()
                    .filter(|(_, orgs)| orgs.contains(&org))
                    .map(|(id, _)| json!({"id": id}))
                    .collect();
                (200, json!({"data": visible}))
            }
            ("POST", ["api", "analyses"]) => {
                let field = |name: &str| {
                    body.and_then(|b| b.get(name))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let (job, candidate) = (field("jobId"), field("candidateId"));
                let job_ok = state.jobs.iter().any(|(id, o)| *id == job && *o == org);
                let cand_ok = state
                    .candidates
                    .iter()
                    .any(|(id, orgs)| *id == candidate && orgs.contains(&org));
                if !job_ok || !cand_ok {
                    return (400, json!({"error": "unknown job or candidate"}));
                }
                let id = state.next_id("analysis");
                let analysis = Analysis {
                    org,
                    polls_left: state.polls_before_done,
                    final_status: state.final_status.clone(),
                };
                state.analyses.insert(id.clone(), analysis);
                (201, json!({"analysis": {"id": id, "status": "PENDING"}}))
            }
            ("GET", ["api", "analyses", id]) => match state.analyses.get_mut(*id) {
                Some(analysis) if analysis.org == org => {
                    let status = if analysis.polls_left == 0 {
                        analysis.final_status.clone()
                    } else {
                        analysis.polls_left -= 1;
                        "PROCESSING".to_string()
                    };
                    (200, json!({"analysis": {"id": id, "status": status}}))
                }
                _ => (404, json!({"error": "not found"})),
            },
            ("POST", ["api", "offers"]) => {
                let id = state.next_id("offer");
                (201, json!({"offer": {"id": id}}))
            }
            ("POST", ["api", "interviews"]) => {
                let id = state.next_id("interview");
                (201, json!({"interview": {"id": id}}))
            }
            _ => (404, json!({"error": "no such endpoint"})),
        }
    }
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn login(&mut self, body: Option<&Value>) -> (u16, Value) {
        let email = body.and_then(|b| b["email"].as_str()).unwrap_or_default();
        let password = body.and_then(|b| b["password"].as_str()).unwrap_or_default();
        let Some(index) = self
            .users
            .iter()
            .position(|u| u.email == email && u.password == password)
        else {
            return (401, json!({"error": "invalid credentials"}));
        };

        let token = self.next_id(&format!("token-{}", email));
        self.tokens.insert(token.clone(), index);
        let user = &self.users[index];
        (
            200,
            json!({
                "token": token,
                "user": {"id": format!("user-{}", index), "role": user.role, "organizationId": user.org}
            }),
        )
    }
}

#[async_trait]
impl ApiClient for FakePlatform {
    async fn login(&self, email: &str, password: &str) -> E2eResult<ApiResponse> {
        let body = json!({"email": email, "password": password});
        let (status, json) = self.handle("POST", LOGIN_PATH, None, Some(&body));
        Ok(ApiResponse::from_json(status, json))
    }

    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        bearer_token: Option<&str>,
    ) -> E2eResult<ApiResponse> {
        let (status, json) = self.handle(method.as_str(), path, bearer_token, body);
        Ok(ApiResponse::from_json(status, json))
    }
}

fn actor(email: &str, role: Role) -> ActorConfig {
    ActorConfig {
        email: email.to_string(),
        password: Some("pw".to_string()),
        password_env: None,
        role,
    }
}

/// Runner configuration matching the fake platform's users
pub fn fake_config(base_url: &str) -> RunnerConfig {
    let mut config = RunnerConfig {
        base_url: base_url.to_string(),
        health_path: None,
        poll: PollDefaults {
            interval_ms: 5_000,
            timeout_ms: 90_000,
            fetch_retries: 2,
            retry_delay_ms: 10,
        },
        ..RunnerConfig::default()
    };
    config.actors.insert("hr".into(), actor("hr@org1.test", Role::HrSpecialist));
    config.actors.insert("manager_org1".into(), actor("manager@org1.test", Role::Manager));
    config.actors.insert("manager_org2".into(), actor("manager@org2.test", Role::Manager));
    config.actors.insert("intruder".into(), ActorConfig {
        password: Some("wrong".to_string()),
        ..actor("hr@org1.test", Role::HrSpecialist)
    });
    config
}

/// Scenario A of the hiring flow, with an optional extra tail of steps
pub fn hiring_flow_yaml(extra_steps: &str) -> String {
    format!(
        r#"
name: hiring-flow
tags: [hiring]
steps:
  - name: login-hr
    actor: hr
    action: login
  - name: create-job
    actor: hr
    action: request
    method: POST
    path: /api/jobs
    body: {{ title: Backend Engineer }}
    expect_status: [201]
    capture: {{ key: jobId, pointer: /jobPosting/id }}
  - name: create-candidate
    actor: hr
    action: request
    method: POST
    path: /api/candidates
    body: {{ name: Ada }}
    capture: {{ key: candidateId, pointer: /candidate/id }}
  - name: create-analysis
    actor: hr
    criticality: critical
    action: request
    method: POST
    path: /api/analyses
    body:
      jobId: "{{{{jobId}}}}"
      candidateId: "{{{{candidateId}}}}"
    capture: {{ key: analysisId, pointer: /analysis/id }}
  - name: wait-for-analysis
    actor: hr
    action: poll
    path: /api/analyses/{{{{analysisId}}}}
    status_pointer: /analysis/status
    terminal: [COMPLETED, FAILED]
    hard_failure: [FAILED, CANCELLED]
    interval_ms: 5000
    timeout_ms: 90000
    capture_status: analysisStatus
{}"#,
        extra_steps
    )
}
