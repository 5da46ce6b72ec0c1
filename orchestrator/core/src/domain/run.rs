// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Run Aggregate
//!
//! [`RunState`] is the single record describing one orchestrated run across
//! all of its rounds. It is created when the run starts (capturing
//! `started_at` immediately), mutated only by the round orchestrator, and
//! persisted once per round through the
//! [`RunStateRepository`](crate::domain::repository::RunStateRepository).
//!
//! ## Status Lifecycle
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `Running` | Planning, dispatching or executing the current round |
//! | `AwaitingConsolidation` | All workers drained, judge is reviewing results |
//! | `Continuing` | Judge asked for another round and the limit allows it |
//! | `Completed` | Terminal: judge stopped the run or the round limit was hit |
//! | `Failed` | Terminal: planning, consolidation or persistence failed |

use crate::domain::errors::{FailureKind, RunFailure};
use crate::domain::session::SessionId;
use crate::domain::task::{Task, TaskResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("Run id must not be empty")]
    Empty,
    #[error("Run id '{0}' contains a path separator or parent reference")]
    PathLike(String),
    #[error("Run id '{0}' contains whitespace")]
    Whitespace(String),
    #[error("Run id '{0}' must not start with '.'")]
    Hidden(String),
}

/// Identifier fixed for the whole run. Used as the root session and as the
/// namespace for the run's queue topic and persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Result<Self, RunIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(RunIdError::Empty);
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(RunIdError::PathLike(id));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(RunIdError::Whitespace(id));
        }
        // "." would resolve to the store root; hidden names are skipped on listing.
        if id.starts_with('.') {
            return Err(RunIdError::Hidden(id));
        }
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Queue topic that carries this run's tasks.
    pub fn topic(&self) -> String {
        format!("{}.tasks", self.0)
    }

    /// Root of every session derived inside this run.
    pub fn root_session(&self) -> SessionId {
        SessionId::root(self.0.clone())
    }
}

impl TryFrom<String> for RunId {
    type Error = RunIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(value: RunId) -> Self {
        value.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    AwaitingConsolidation,
    Continuing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::AwaitingConsolidation => "awaiting_consolidation",
            RunStatus::Continuing => "continuing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the round state machine the run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Planning,
    Dispatching,
    Executing,
    Consolidating,
    Done,
}

/// Cross-round memory entry: what the judge concluded about one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub summary: String,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub mission: String,
    /// 0 until the first planning phase begins.
    pub round_number: u32,
    pub tasks: Vec<Task>,
    pub results: Vec<TaskResult>,
    pub status: RunStatus,
    pub phase: RoundPhase,
    #[serde(default)]
    pub memory: Vec<RoundSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(run_id: RunId, mission: impl Into<String>) -> Self {
        Self {
            run_id,
            mission: mission.into(),
            round_number: 0,
            tasks: Vec::new(),
            results: Vec::new(),
            status: RunStatus::Running,
            phase: RoundPhase::Planning,
            memory: Vec::new(),
            last_summary: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to the next round, clearing the previous round's tasks and results.
    pub fn begin_round(&mut self) {
        self.round_number += 1;
        self.tasks.clear();
        self.results.clear();
        self.status = RunStatus::Running;
        self.phase = RoundPhase::Planning;
    }

    pub fn record_summary(&mut self, summary: String) {
        let succeeded = self.results.iter().filter(|r| r.success).count();
        let failed = self.results.len() - succeeded;
        self.memory.push(RoundSummary {
            round: self.round_number,
            summary: summary.clone(),
            succeeded,
            failed,
        });
        self.last_summary = Some(summary);
    }

    pub fn complete(&mut self) {
        self.finish(RunStatus::Completed);
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.error = Some(RunFailure::new(kind, message));
        self.finish(RunStatus::Failed);
    }

    /// Record a failure on the run. Only fatal kinds end it; the others are
    /// kept on `error` while the run carries on.
    pub fn record_failure(&mut self, kind: FailureKind, message: impl Into<String>) {
        if kind.is_fatal() {
            self.fail(kind, message);
        } else {
            self.error = Some(RunFailure::new(kind, message));
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn finish(&mut self, status: RunStatus) {
        let mut now = Utc::now();
        // Coarse clocks can report the same instant as `started_at`.
        if now <= self.started_at {
            now = self.started_at + ChronoDuration::microseconds(1);
        }
        self.status = status;
        self.phase = RoundPhase::Done;
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_validation() {
        assert!(RunId::new("r1").is_ok());
        assert_eq!(RunId::new(""), Err(RunIdError::Empty));
        assert!(matches!(RunId::new("../etc"), Err(RunIdError::PathLike(_))));
        assert!(matches!(RunId::new("a/b"), Err(RunIdError::PathLike(_))));
        assert!(matches!(RunId::new("a b"), Err(RunIdError::Whitespace(_))));
        assert_eq!(RunId::new("."), Err(RunIdError::Hidden(".".to_string())));
        assert!(matches!(RunId::new(".hidden"), Err(RunIdError::Hidden(_))));
        assert!(RunId::new("r.1").is_ok());
    }

    #[test]
    fn test_run_id_topic_and_root_session() {
        let run_id = RunId::new("r1").unwrap();
        assert_eq!(run_id.topic(), "r1.tasks");
        assert_eq!(run_id.root_session().as_str(), "r1");
    }

    #[test]
    fn test_run_id_deserialization_is_validated() {
        let ok: RunId = serde_json::from_str("\"r2\"").unwrap();
        assert_eq!(ok.as_str(), "r2");
        assert!(serde_json::from_str::<RunId>("\"../x\"").is_err());
    }

    #[test]
    fn test_started_at_captured_at_creation_and_strictly_before_completion() {
        let before = Utc::now();
        let mut state = RunState::new(RunId::new("r1").unwrap(), "do X");
        assert!(state.started_at >= before);
        assert_eq!(state.round_number, 0);

        // Force the coarse-clock case.
        state.started_at = Utc::now() + ChronoDuration::seconds(5);
        state.complete();

        let completed_at = state.completed_at.unwrap();
        assert!(state.started_at < completed_at);
        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!(state.phase, RoundPhase::Done);
    }

    #[test]
    fn test_fail_records_error() {
        let mut state = RunState::new(RunId::new("r1").unwrap(), "do X");
        state.begin_round();
        state.fail(FailureKind::PlanningFailure, "planner unavailable");

        assert_eq!(state.status, RunStatus::Failed);
        let error = state.error.as_ref().unwrap();
        assert_eq!(error.kind, FailureKind::PlanningFailure);
        assert_eq!(error.message, "planner unavailable");
        assert!(state.started_at < state.completed_at.unwrap());
    }

    #[test]
    fn test_record_failure_only_ends_run_for_fatal_kinds() {
        let mut state = RunState::new(RunId::new("r1").unwrap(), "do X");
        state.begin_round();

        state.record_failure(FailureKind::QueueExhaustion, "2 of 3 sentinels consumed");
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.completed_at.is_none());
        assert_eq!(
            state.error.as_ref().unwrap().kind,
            FailureKind::QueueExhaustion
        );

        state.record_failure(FailureKind::PersistenceFailure, "disk full");
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(
            state.error.as_ref().unwrap().kind,
            FailureKind::PersistenceFailure
        );
    }

    #[test]
    fn test_begin_round_resets_round_collections() {
        let mut state = RunState::new(RunId::new("r1").unwrap(), "do X");
        state.begin_round();
        let task_id = crate::domain::task::TaskId::new("t1");
        state.tasks.push(Task::new(task_id, "a", "worker"));
        state.record_summary("first".to_string());
        state.begin_round();

        assert_eq!(state.round_number, 2);
        assert!(state.tasks.is_empty());
        assert_eq!(state.memory.len(), 1);
        assert_eq!(state.memory[0].round, 1);
    }
}
