// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # External Capabilities
//!
//! Narrow interfaces the orchestration core calls but does not implement:
//! the reasoning/execution unit, the worker factory, the planner and the judge.
//! Implementations live in adapters outside this crate (and in test mocks).
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`WorkerFactory`] / [`WorkerHandle`] | `SubAgentLifecycleManager` only |
//! | [`PlanningCapability`] | round orchestrator, PLANNING phase |
//! | [`ConsolidationCapability`] | round orchestrator, CONSOLIDATING phase |
//!
//! `WorkerHandle::close` is invoked by the lifecycle manager and never by
//! callers directly.

use crate::domain::run::{RoundSummary, RunId};
use crate::domain::session::SessionId;
use crate::domain::subagent::PlanningOverride;
use crate::domain::task::{Task, TaskResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs to know about the invocation it is serving.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub session_id: SessionId,
    pub timeout: Duration,
    /// Cancelled when the wall-clock budget expires, before the execution
    /// future is dropped. Workers that hold external resources should watch it.
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: None,
        }
    }

    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Execution failed: {0}")]
    Failed(String),
    #[error("Execution cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
#[error("Failed to release worker resources: {0}")]
pub struct TeardownError(pub String);

#[derive(Debug, Error)]
pub enum WorkerFactoryError {
    #[error("Unknown specialist role: {0}")]
    UnknownRole(String),
    #[error("Failed to create worker: {0}")]
    CreationFailed(String),
}

/// Error raised by the planner or the judge.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasoning/execution unit: runs one mission to completion.
#[async_trait]
pub trait ExecutionCapability: Send + Sync {
    async fn execute(
        &self,
        mission: &str,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}

/// A live worker instance. Holds resources (connections, file handles,
/// subordinate processes) until `close` is called.
#[async_trait]
pub trait WorkerHandle: ExecutionCapability {
    fn role(&self) -> &str;
    async fn close(&self) -> Result<(), TeardownError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub specialist_role: String,
    pub planning_override: Option<PlanningOverride>,
}

#[async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn create(
        &self,
        request: &WorkerRequest,
    ) -> Result<Box<dyn WorkerHandle>, WorkerFactoryError>;
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub run_id: RunId,
    pub round: u32,
    pub mission: String,
    /// Cross-round memory; empty in round 1.
    pub memory: Vec<RoundSummary>,
    pub session_id: SessionId,
}

#[async_trait]
pub trait PlanningCapability: Send + Sync {
    /// Decompose the mission into an ordered list of tasks.
    async fn plan(&self, request: &PlanRequest) -> Result<Vec<Task>, CapabilityError>;
}

#[derive(Debug, Clone)]
pub struct ConsolidationRequest {
    pub run_id: RunId,
    pub round: u32,
    /// Ordered by append time, not by task submission order.
    pub results: Vec<TaskResult>,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub summary: String,
    #[serde(rename = "continue")]
    pub continue_run: bool,
}

impl Verdict {
    pub fn stop(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            continue_run: false,
        }
    }

    pub fn proceed(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            continue_run: true,
        }
    }
}

#[async_trait]
pub trait ConsolidationCapability: Send + Sync {
    async fn consolidate(&self, request: &ConsolidationRequest) -> Result<Verdict, CapabilityError>;
}
