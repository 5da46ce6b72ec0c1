// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Contract across the sub-agent lifecycle boundary.

use crate::domain::errors::FailureKind;
use crate::domain::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether a spawned worker runs its own planning pass before executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningOverride {
    Enabled,
    Disabled,
}

/// Request to run one mission in a fresh, isolated worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentSpec {
    pub mission: String,
    pub specialist_role: String,
    pub parent_session_id: SessionId,
    /// Wall-clock budget. `None` falls back to the manager's configured ceiling.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub planning_override: Option<PlanningOverride>,
}

impl SubAgentSpec {
    pub fn new(
        mission: impl Into<String>,
        specialist_role: impl Into<String>,
        parent_session_id: SessionId,
    ) -> Self {
        Self {
            mission: mission.into(),
            specialist_role: specialist_role.into(),
            parent_session_id,
            timeout: None,
            planning_override: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_planning_override(mut self, planning: Option<PlanningOverride>) -> Self {
        self.planning_override = planning;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentStatus {
    Success,
    Failure,
    Timeout,
}

impl SubAgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentStatus::Success => "success",
            SubAgentStatus::Failure => "failure",
            SubAgentStatus::Timeout => "timeout",
        }
    }

    /// Taxonomy entry for a non-successful outcome.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SubAgentStatus::Success => None,
            SubAgentStatus::Failure => Some(FailureKind::WorkerExecutionError),
            SubAgentStatus::Timeout => Some(FailureKind::WorkerTimeout),
        }
    }
}

impl fmt::Display for SubAgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised outcome of a spawned worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentResult {
    pub status: SubAgentStatus,
    pub output: String,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl SubAgentResult {
    pub fn is_success(&self) -> bool {
        self.status == SubAgentStatus::Success
    }
}
