use serde_json::Value;

use crate::models::TaskStatus;

/// `code` value the provider uses for a call that went through.
pub const SUCCESS_CODE: i64 = 10000;

/// What a get-result `data.status` field tells the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSignal {
    Status(TaskStatus),
    /// The provider does not know this task id.
    UnknownTask,
}

/// Maps a `data.status` value onto the poll state machine.
///
/// Targets the CV Sync2Async get-result contract: `in_queue`, `generating`
/// (or `running`), `done`, `not_found`, `expired`, plus the legacy
/// `success`/`failed` strings and numeric `0`/`1`/`2`. Any other value means
/// the task is still running.
pub fn classify_status(value: &Value) -> StatusSignal {
    let status = match value {
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "in_queue" => TaskStatus::Pending,
            "generating" | "running" => TaskStatus::Running,
            "done" | "success" => TaskStatus::Succeeded,
            "failed" | "expired" => TaskStatus::Failed,
            "not_found" => return StatusSignal::UnknownTask,
            _ => TaskStatus::Running,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => TaskStatus::Pending,
            Some(1) => TaskStatus::Succeeded,
            Some(2) => TaskStatus::Failed,
            _ => TaskStatus::Running,
        },
        _ => TaskStatus::Running,
    };
    StatusSignal::Status(status)
}

/// Accessors over the provider's `{code, message, request_id, data}` envelope.
pub struct Envelope<'a>(pub &'a Value);

impl<'a> Envelope<'a> {
    pub fn code(&self) -> Option<i64> {
        self.0.get("code").and_then(Value::as_i64)
    }

    pub fn is_success(&self) -> bool {
        self.code() == Some(SUCCESS_CODE)
    }

    pub fn message(&self) -> Option<&'a str> {
        self.0
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    pub fn request_id(&self) -> Option<&'a str> {
        self.0.get("request_id").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&'a Value> {
        self.0.get("data").filter(|d| !d.is_null())
    }

    pub fn task_id(&self) -> Option<&'a str> {
        self.data()?
            .get("task_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn status(&self) -> Option<&'a Value> {
        self.data()?.get("status").filter(|s| !s.is_null())
    }

    /// Failure text for a failed task, most specific source first.
    pub fn failure_message(&self) -> String {
        let data = self.data();
        ["msg", "message"]
            .iter()
            .filter_map(|key| data?.get(*key)?.as_str())
            .find(|m| !m.is_empty())
            .or_else(|| self.message())
            .unwrap_or("Unknown error")
            .to_string()
    }

    /// One-line summary used when the envelope is rejected.
    pub fn describe(&self) -> String {
        format!(
            "code={} message={} request_id={}",
            self.code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "missing".to_string()),
            self.message().unwrap_or("-"),
            self.request_id().unwrap_or("-"),
        )
    }
}
