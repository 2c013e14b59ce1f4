//! Shared test helpers for provider tests.

use crate::transport::{HttpReply, Transport};
use async_trait::async_trait;
use colloquy_core::error::ProviderError;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// A transport that answers from per-path scripts.
///
/// Each path has a queue of replies; the last reply in a queue is sticky and
/// keeps being returned. Panics on a path with no script.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpReply, ProviderError>>>>,
    log: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose key check passes and whose model list is `models`
    /// (`[(name, [endpoints])]`).
    pub fn with_models(models: &[(&str, &[&str])]) -> Self {
        let listed: Vec<Value> = models
            .iter()
            .map(|(name, endpoints)| json!({"name": name, "endpoints": endpoints}))
            .collect();
        Self::new()
            .on("check-api-key", Ok(HttpReply::ok_json(&json!({"valid": true}))))
            .on("models", Ok(HttpReply::ok_json(&json!({"models": listed}))))
    }

    pub fn on(self, path: &str, reply: Result<HttpReply, ProviderError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|r| r.path == path).count()
    }

    fn answer(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<HttpReply, ProviderError> {
        self.log.lock().unwrap().push(Recorded {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        // Query strings are not part of the script key.
        let key = path.split('?').next().unwrap_or(path);
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(key)
            .unwrap_or_else(|| panic!("ScriptedTransport: no script for {method} {key}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<HttpReply, ProviderError> {
        self.answer("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<HttpReply, ProviderError> {
        self.answer("POST", path, Some(body))
    }
}
