// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::errors::RunFailure;
use crate::domain::run::{RunId, RunStatus};
use crate::domain::session::SessionId;
use crate::domain::subagent::SubAgentStatus;
use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle events emitted while runs and delegations progress.
///
/// Observability only: nothing in the core reads these back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    RunStarted {
        run_id: RunId,
        mission: String,
        worker_count: usize,
        max_rounds: u32,
        started_at: DateTime<Utc>,
    },
    RoundStarted {
        run_id: RunId,
        round: u32,
        started_at: DateTime<Utc>,
    },
    TasksDispatched {
        run_id: RunId,
        round: u32,
        topic: String,
        task_count: usize,
        sentinel_count: usize,
        dispatched_at: DateTime<Utc>,
    },
    TaskCompleted {
        run_id: RunId,
        round: u32,
        task_id: TaskId,
        worker_session_id: SessionId,
        status: SubAgentStatus,
        completed_at: DateTime<Utc>,
    },
    RoundConsolidated {
        run_id: RunId,
        round: u32,
        summary: String,
        continue_run: bool,
        consolidated_at: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        rounds: u32,
        status: RunStatus,
        completed_at: DateTime<Utc>,
    },
    RunFailed {
        run_id: RunId,
        round: u32,
        failure: RunFailure,
        failed_at: DateTime<Utc>,
    },
    SubAgentSpawned {
        session_id: SessionId,
        parent_session_id: SessionId,
        specialist_role: String,
        spawned_at: DateTime<Utc>,
    },
    SubAgentFinished {
        session_id: SessionId,
        status: SubAgentStatus,
        duration_ms: u64,
        finished_at: DateTime<Utc>,
    },
}

impl OrchestrationEvent {
    /// Run this event belongs to. Sub-agent events are matched through the
    /// root of their session hierarchy.
    pub fn belongs_to(&self, run_id: &RunId) -> bool {
        match self {
            OrchestrationEvent::RunStarted { run_id: id, .. }
            | OrchestrationEvent::RoundStarted { run_id: id, .. }
            | OrchestrationEvent::TasksDispatched { run_id: id, .. }
            | OrchestrationEvent::TaskCompleted { run_id: id, .. }
            | OrchestrationEvent::RoundConsolidated { run_id: id, .. }
            | OrchestrationEvent::RunCompleted { run_id: id, .. }
            | OrchestrationEvent::RunFailed { run_id: id, .. } => id == run_id,
            OrchestrationEvent::SubAgentSpawned { session_id, .. }
            | OrchestrationEvent::SubAgentFinished { session_id, .. } => {
                session_id.descends_from(&run_id.root_session())
            }
        }
    }
}
