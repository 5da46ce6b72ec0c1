// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::errors::FailureKind;
use crate::domain::session::SessionId;
use crate::domain::subagent::{SubAgentResult, SubAgentStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random id for planners that do not number their own tasks.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discrete unit of work produced by the planning step.
///
/// Tasks are never mutated after creation; a worker consumes each one once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub description: String,
    pub assigned_role: String,
    #[serde(default)]
    pub input_payload: serde_json::Value,
}

impl Task {
    pub fn new(
        task_id: TaskId,
        description: impl Into<String>,
        assigned_role: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            description: description.into(),
            assigned_role: assigned_role.into(),
            input_payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.input_payload = payload;
        self
    }

    /// Mission text handed to the worker: the description, followed by the
    /// input payload when there is one.
    pub fn mission(&self) -> String {
        if self.input_payload.is_null() {
            return self.description.clone();
        }
        let payload = serde_json::to_string_pretty(&self.input_payload)
            .unwrap_or_else(|_| self.input_payload.to_string());
        format!("{}\n\nInput:\n{}", self.description, payload)
    }
}

/// Outcome of one task, appended to the round's result collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub worker_session_id: SessionId,
    pub output: String,
    pub success: bool,
    pub status: SubAgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl TaskResult {
    pub fn from_subagent(task_id: TaskId, result: SubAgentResult) -> Self {
        Self {
            task_id,
            success: result.status == SubAgentStatus::Success,
            worker_session_id: result.session_id,
            output: result.output,
            status: result.status,
            error: result.error,
            duration: result.duration,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.status.failure_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_without_payload_is_description() {
        let task = Task::new(TaskId::new("t1"), "summarise the README", "writer");
        assert_eq!(task.mission(), "summarise the README");
    }

    #[test]
    fn test_mission_includes_payload() {
        let task = Task::new(TaskId::new("t1"), "fix the bug", "coder")
            .with_payload(serde_json::json!({"file": "src/main.rs"}));
        let mission = task.mission();
        assert!(mission.starts_with("fix the bug\n\nInput:\n"));
        assert!(mission.contains("src/main.rs"));
    }

    #[test]
    fn test_task_result_success_follows_status() {
        let result = SubAgentResult {
            status: SubAgentStatus::Timeout,
            output: String::new(),
            session_id: SessionId::root("r1--sub_coder_aaaa0000"),
            error: Some("timed out".to_string()),
            duration: Duration::from_millis(500),
        };
        let task_result = TaskResult::from_subagent(TaskId::new("t9"), result);
        assert!(!task_result.success);
        assert_eq!(task_result.status, SubAgentStatus::Timeout);

        let json = serde_json::to_value(&task_result).unwrap();
        assert_eq!(json["duration"], "500ms");
        assert_eq!(json["status"], "timeout");
    }
}
