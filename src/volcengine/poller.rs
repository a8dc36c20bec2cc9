use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use crate::{
    config::VolcengineConfig,
    error::{Result, StalkgenError},
    models::{
        provider::{classify_status, Envelope, StatusSignal},
        TaskStatus,
    },
    volcengine::{
        transport::{Action, TaskApi},
        REQ_KEY,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between two consecutive calls.
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &VolcengineConfig) -> Self {
        Self::new(config.poll_interval, config.max_poll_attempts)
    }
}

pub fn get_result_body(task_id: &str) -> Value {
    json!({
        "req_key": REQ_KEY,
        "task_id": task_id,
        "req_json": json!({"return_url": true}).to_string(),
    })
}

/// Outcome of a single get-result call, before the loop decides what to do.
enum Tick {
    Done(Value),
    Waiting(TaskStatus),
}

pub struct TaskPoller<'a, A: TaskApi + ?Sized> {
    api: &'a A,
    policy: PollPolicy,
}

impl<'a, A: TaskApi + ?Sized> TaskPoller<'a, A> {
    pub fn new(api: &'a A, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Polls `task_id` until it succeeds, fails, or the attempt budget runs
    /// out. Returns the full provider payload of the successful response.
    ///
    /// Network errors and malformed envelopes are retried after the fixed
    /// interval. Task failure, a structured provider rejection, an unknown
    /// task id and local setup errors end the loop at once.
    pub async fn poll(&self, task_id: &str) -> Result<Value> {
        if task_id.trim().is_empty() {
            return Err(StalkgenError::InvalidTaskId(
                "task id must be a non-empty string".into(),
            ));
        }

        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = TaskStatus::Pending;

        for attempt in 1..=max_attempts {
            log::debug!(
                "Polling task {}, attempt {}/{}",
                task_id,
                attempt,
                max_attempts
            );

            match self.tick(task_id).await {
                Ok(Tick::Done(payload)) => {
                    log::info!(
                        "Task {} succeeded after {} attempt(s) in {:?}",
                        task_id,
                        attempt,
                        started.elapsed()
                    );
                    return Ok(payload);
                }
                Ok(Tick::Waiting(next)) => {
                    if next != state {
                        log::debug!("Task {} moved {:?} -> {:?}", task_id, state, next);
                        state = next;
                    }
                }
                Err(e) if e.is_retryable_while_polling() => {
                    log::warn!(
                        "Poll attempt {}/{} for task {} failed, will retry: {}",
                        attempt,
                        max_attempts,
                        task_id,
                        e
                    );
                }
                Err(e) => {
                    log::error!("Polling task {} stopped: {}", task_id, e);
                    return Err(e);
                }
            }

            if attempt < max_attempts {
                sleep(self.policy.interval).await;
            }
        }

        Err(StalkgenError::Timeout {
            task_id: task_id.to_string(),
            attempts: max_attempts,
            elapsed: started.elapsed(),
        })
    }

    async fn tick(&self, task_id: &str) -> Result<Tick> {
        let response = self
            .api
            .call(Action::GetResult, &get_result_body(task_id))
            .await?;
        let envelope = Envelope(&response);

        if !envelope.is_success() {
            return Err(StalkgenError::MalformedResponse(format!(
                "Unexpected get-result envelope: {}",
                envelope.describe()
            )));
        }
        let status = envelope.status().ok_or_else(|| {
            StalkgenError::MalformedResponse(format!(
                "Get-result response has no data.status ({})",
                envelope.describe()
            ))
        })?;

        match classify_status(status) {
            StatusSignal::UnknownTask => Err(StalkgenError::InvalidTaskId(format!(
                "provider does not know task {}",
                task_id
            ))),
            StatusSignal::Status(TaskStatus::Failed) => Err(StalkgenError::TaskFailed {
                task_id: task_id.to_string(),
                message: envelope.failure_message(),
            }),
            StatusSignal::Status(TaskStatus::Succeeded) => Ok(Tick::Done(response.clone())),
            StatusSignal::Status(waiting) => Ok(Tick::Waiting(waiting)),
        }
    }
}
