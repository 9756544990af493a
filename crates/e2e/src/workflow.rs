//! Declarative YAML workflow definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::client::HttpMethod;
use crate::context::{referenced_keys, referenced_keys_in_json};
use crate::error::{E2eError, E2eResult};

/// A complete workflow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Unique name for this workflow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering workflows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

/// One unit of work performed as a single actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,

    /// Actor id from the runner configuration
    pub actor: String,

    /// Context keys this step consumes, on top of `{{key}}` placeholders
    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default, alias = "expected_outcome")]
    pub criticality: Criticality,

    #[serde(flatten)]
    pub operation: Operation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts the run
    #[default]
    Critical,
    /// Failure is recorded and the run continues
    Optional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Operation {
    /// Log in again as the step's actor
    Login,

    /// Call an endpoint and check its status
    Request {
        #[serde(default)]
        method: HttpMethod,
        path: String,
        #[serde(default)]
        body: Option<Value>,
        /// Accepted statuses; any 2xx when absent
        #[serde(default)]
        expect_status: Option<Vec<u16>>,
        #[serde(default)]
        capture: Option<Capture>,
    },

    /// Poll an asynchronous job until it settles
    Poll {
        path: String,
        status_pointer: String,
        terminal: Vec<String>,
        #[serde(default)]
        hard_failure: Vec<String>,
        #[serde(default)]
        interval_ms: Option<u64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
        /// Store the final status under this key
        #[serde(default)]
        capture_status: Option<String>,
    },

    /// List a resource as two actors and require disjoint id sets
    AssertIsolated {
        other_actor: String,
        path: String,
        #[serde(default = "default_items_pointer")]
        items_pointer: String,
        #[serde(default = "default_id_field")]
        id_field: String,
    },

    /// Log a message
    Log { message: String },
}

/// Store a value read from the response under a context key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub key: String,
    /// JSON pointer into the response body
    pub pointer: String,
}

fn default_items_pointer() -> String {
    "/data".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

impl Step {
    /// Every context key the step reads: declared inputs first, then placeholders
    pub fn required_keys(&self) -> Vec<String> {
        let mut keys = self.inputs.clone();
        let mut referenced = match &self.operation {
            Operation::Request { path, body, .. } => {
                let mut keys = referenced_keys(path);
                if let Some(body) = body {
                    keys.extend(referenced_keys_in_json(body));
                }
                keys
            }
            Operation::Poll { path, .. } | Operation::AssertIsolated { path, .. } => {
                referenced_keys(path)
            }
            Operation::Login | Operation::Log { .. } => Vec::new(),
        };
        referenced.retain(|k| !keys.contains(k));
        for key in referenced {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Isolation checks are always critical
    pub fn is_critical(&self) -> bool {
        self.criticality == Criticality::Critical
            || matches!(self.operation, Operation::AssertIsolated { .. })
    }

    /// Actor ids this step logs in as
    pub fn actors(&self) -> Vec<&str> {
        match &self.operation {
            Operation::AssertIsolated { other_actor, .. } => {
                vec![self.actor.as_str(), other_actor.as_str()]
            }
            _ => vec![self.actor.as_str()],
        }
    }

    pub fn action_name(&self) -> &'static str {
        match self.operation {
            Operation::Login => "login",
            Operation::Request { .. } => "request",
            Operation::Poll { .. } => "poll",
            Operation::AssertIsolated { .. } => "assert_isolated",
            Operation::Log { .. } => "log",
        }
    }
}

impl WorkflowSpec {
    /// Parse a workflow from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml).map_err(E2eError::from)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a workflow from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::WorkflowParse(format!("{}: {}", path.display(), e)))
    }

    /// Load a single file, or every workflow below a directory
    pub fn load(path: &Path) -> E2eResult<Vec<Self>> {
        if path.is_dir() {
            Self::load_all(path)
        } else {
            Ok(vec![Self::from_file(path)?])
        }
    }

    /// Load all workflows from a directory, sorted by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter workflows by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Static checks that do not need the platform
    fn validate(&self) -> E2eResult<()> {
        if self.steps.is_empty() {
            return Err(E2eError::WorkflowParse(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut names: Vec<&str> = Vec::new();
        for step in &self.steps {
            if names.contains(&step.name.as_str()) {
                return Err(E2eError::WorkflowParse(format!(
                    "workflow '{}': duplicate step name '{}'",
                    self.name, step.name
                )));
            }
            names.push(&step.name);

            if let Operation::Poll { terminal, hard_failure, .. } = &step.operation {
                if terminal.is_empty() && hard_failure.is_empty() {
                    return Err(E2eError::WorkflowParse(format!(
                        "step '{}': poll needs at least one terminal status",
                        step.name
                    )));
                }
            }
        }
        Ok(())
    }
}
