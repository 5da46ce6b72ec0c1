// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Round State Store Interface
//!
//! Persistence contract for the [`RunState`] aggregate. The interface lives in
//! the domain layer; implementations live in
//! `crate::infrastructure::repositories`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryRunStateRepository` | process memory (tests, embedded use) |
//! | `FileRunStateRepository` | one JSON file per round on local disk |
//!
//! The store is append-only across rounds: each `(run_id, round_number)` is
//! written exactly once, so the full history of a run can be reconstructed.

use crate::domain::run::{RunId, RunState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend selected from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    File { path: PathBuf },
}

/// One persisted round of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub run_id: RunId,
    pub round_number: u32,
    pub recorded_at: DateTime<Utc>,
    pub state: RunState,
}

#[async_trait]
pub trait RunStateRepository: Send + Sync {
    /// Append the state of `round_number`. Fails if that round was already recorded.
    async fn persist(
        &self,
        run_id: &RunId,
        round_number: u32,
        state: &RunState,
    ) -> Result<(), RepositoryError>;

    /// Latest recorded state of the run.
    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>, RepositoryError>;

    /// Every recorded round, oldest first.
    async fn history(&self, run_id: &RunId) -> Result<Vec<RoundRecord>, RepositoryError>;

    async fn list_runs(&self) -> Result<Vec<RunId>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Round {round_number} of run {run_id} is already recorded")]
    AlreadyExists {
        run_id: RunId,
        round_number: u32,
    },

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Io(err.to_string())
    }
}
