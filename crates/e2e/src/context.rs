//! Write-once artifact store threading step outputs into later steps

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::{E2eError, E2eResult};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Keys referenced as `{{key}}` in a template, in order of appearance
pub fn referenced_keys(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for captures in placeholder_regex().captures_iter(template) {
        let key = captures[1].to_string();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Keys referenced anywhere inside the string values of a JSON document
pub fn referenced_keys_in_json(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_json_keys(value, &mut keys);
    keys
}

fn collect_json_keys(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for key in referenced_keys(s) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_json_keys(v, keys)),
        Value::Object(map) => map.values().for_each(|v| collect_json_keys(v, keys)),
        _ => {}
    }
}

/// Insertion-ordered map of artifacts such as `jobId` or `candidateId`.
///
/// Keys are write-once, and reading a key nobody produced is an error rather
/// than an empty value.
#[derive(Debug, Default, Clone)]
pub struct WorkflowContext {
    artifacts: IndexMap<String, String>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> E2eResult<()> {
        let key = key.into();
        if self.artifacts.contains_key(&key) {
            return Err(E2eError::DuplicateArtifact(key));
        }
        self.artifacts.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> E2eResult<&str> {
        self.artifacts
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| E2eError::MissingArtifact(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    /// Fails on the first absent key, in the given order
    pub fn require_all<S: AsRef<str>>(&self, keys: &[S]) -> E2eResult<()> {
        for key in keys {
            self.get(key.as_ref())?;
        }
        Ok(())
    }

    /// Replace every `{{key}}` in `template`
    pub fn render(&self, template: &str) -> E2eResult<String> {
        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;
        for captures in placeholder_regex().captures_iter(template) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            rendered.push_str(&template[last..whole.start()]);
            rendered.push_str(self.get(key.as_str())?);
            last = whole.end();
        }
        rendered.push_str(&template[last..]);
        Ok(rendered)
    }

    /// Render placeholders inside every string of a JSON document
    pub fn render_json(&self, value: &Value) -> E2eResult<Value> {
        Ok(match value {
            Value::String(s) => Value::String(self.render(s)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.render_json(v))
                    .collect::<E2eResult<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.render_json(v)?)))
                    .collect::<E2eResult<_>>()?,
            ),
            other => other.clone(),
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
