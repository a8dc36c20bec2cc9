//! Test doubles shared by the unit tests and the HTTP integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StalkgenError};
use crate::volcengine::{Action, TaskApi};

/// A [`TaskApi`] that replays canned responses in order, then `fallback`
/// forever if one is set. Every call is recorded with its body.
#[derive(Default)]
pub struct ScriptedApi {
    responses: Mutex<VecDeque<Result<Value>>>,
    fallback: Option<Value>,
    calls: Mutex<Vec<(Action, Value)>>,
}

impl ScriptedApi {
    pub fn new(responses: Vec<Result<Value>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn repeating(response: Value) -> Self {
        Self::new(Vec::new()).with_fallback(response)
    }

    pub fn with_fallback(mut self, response: Value) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<Action> {
        lock(&self.calls).iter().map(|(action, _)| *action).collect()
    }

    pub fn bodies(&self) -> Vec<Value> {
        lock(&self.calls).iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn call(&self, action: Action, body: &Value) -> Result<Value> {
        lock(&self.calls).push((action, body.clone()));
        let next = lock(&self.responses).pop_front();
        match (next, &self.fallback) {
            (Some(response), _) => response,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(StalkgenError::Network("script exhausted".into())),
        }
    }
}

// A panicking test thread must not hide the recorded calls from the others.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
