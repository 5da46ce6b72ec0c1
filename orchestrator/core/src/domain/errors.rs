// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Failure Taxonomy
//!
//! Per-task failures (`WorkerTimeout`, `WorkerExecutionError`) are recovered
//! locally and become failed `TaskResult`s. `ResourceTeardownError` is only
//! ever logged. The remaining kinds end the run and are recorded on
//! `RunState::error`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    WorkerTimeout,
    WorkerExecutionError,
    ResourceTeardownError,
    PlanningFailure,
    ConsolidationFailure,
    PersistenceFailure,
    QueueExhaustion,
}

impl FailureKind {
    /// Whether this kind of failure ends the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FailureKind::PlanningFailure
                | FailureKind::ConsolidationFailure
                | FailureKind::PersistenceFailure
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::WorkerTimeout => "worker_timeout",
            FailureKind::WorkerExecutionError => "worker_execution_error",
            FailureKind::ResourceTeardownError => "resource_teardown_error",
            FailureKind::PlanningFailure => "planning_failure",
            FailureKind::ConsolidationFailure => "consolidation_failure",
            FailureKind::PersistenceFailure => "persistence_failure",
            FailureKind::QueueExhaustion => "queue_exhaustion",
        };
        f.write_str(s)
    }
}

/// Error surfaced on a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RunFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
