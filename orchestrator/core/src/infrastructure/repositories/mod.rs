// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the Round State Store defined in
//! [`crate::domain::repository`].
//!
//! # Available Implementations
//!
//! - **InMemoryRunStateRepository** - HashMap-backed, for tests and embedded use
//! - **FileRunStateRepository** - one JSON document per round under a base directory
//!
//! Both enforce the same append-only rule: a `(run_id, round_number)` pair
//! can be written once. A second write returns [`RepositoryError::AlreadyExists`].

pub mod file;

pub use file::FileRunStateRepository;

use crate::domain::repository::{RepositoryError, RoundRecord, RunStateRepository, StorageBackend};
use crate::domain::run::{RunId, RunState};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryRunStateRepository {
    runs: Arc<RwLock<HashMap<RunId, BTreeMap<u32, RoundRecord>>>>,
}

impl InMemoryRunStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStateRepository for InMemoryRunStateRepository {
    async fn persist(
        &self,
        run_id: &RunId,
        round_number: u32,
        state: &RunState,
    ) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write();
        let rounds = runs.entry(run_id.clone()).or_default();
        if rounds.contains_key(&round_number) {
            return Err(RepositoryError::AlreadyExists {
                run_id: run_id.clone(),
                round_number,
            });
        }
        rounds.insert(
            round_number,
            RoundRecord {
                run_id: run_id.clone(),
                round_number,
                recorded_at: Utc::now(),
                state: state.clone(),
            },
        );
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>, RepositoryError> {
        let runs = self.runs.read();
        Ok(runs
            .get(run_id)
            .and_then(|rounds| rounds.values().next_back())
            .map(|record| record.state.clone()))
    }

    async fn history(&self, run_id: &RunId) -> Result<Vec<RoundRecord>, RepositoryError> {
        let runs = self.runs.read();
        Ok(runs
            .get(run_id)
            .map(|rounds| rounds.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_runs(&self) -> Result<Vec<RunId>, RepositoryError> {
        let mut ids: Vec<RunId> = self.runs.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Build the repository selected by configuration.
pub async fn build_repository(
    backend: &StorageBackend,
) -> Result<Arc<dyn RunStateRepository>, RepositoryError> {
    match backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryRunStateRepository::new())),
        StorageBackend::File { path } => {
            let repository = FileRunStateRepository::open(path.clone()).await?;
            Ok(Arc::new(repository))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(run_id: &RunId, round: u32) -> RunState {
        let mut state = RunState::new(run_id.clone(), "mission");
        for _ in 0..round {
            state.begin_round();
        }
        state
    }

    #[tokio::test]
    async fn test_persist_then_load_returns_latest_round() {
        let repo = InMemoryRunStateRepository::new();
        let run_id = RunId::new("r1").unwrap();

        for round in 0..=2 {
            let state = state_at(&run_id, round);
            repo.persist(&run_id, round, &state).await.unwrap();
        }

        let latest = repo.load(&run_id).await.unwrap().unwrap();
        assert_eq!(latest.round_number, 2);

        let history = repo.history(&run_id).await.unwrap();
        let rounds: Vec<u32> = history.iter().map(|r| r.round_number).collect();
        assert_eq!(rounds, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_duplicate_round_is_rejected() {
        let repo = InMemoryRunStateRepository::new();
        let run_id = RunId::new("r1").unwrap();
        let state = state_at(&run_id, 1);

        repo.persist(&run_id, 1, &state).await.unwrap();
        let err = repo.persist(&run_id, 1, &state).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::AlreadyExists { round_number: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_run_is_empty() {
        let repo = InMemoryRunStateRepository::new();
        let run_id = RunId::new("missing").unwrap();

        assert!(repo.load(&run_id).await.unwrap().is_none());
        assert!(repo.history(&run_id).await.unwrap().is_empty());
        assert!(repo.list_runs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_repository_in_memory() {
        let repo = build_repository(&StorageBackend::InMemory).await.unwrap();
        let run_id = RunId::new("r9").unwrap();
        let state = state_at(&run_id, 0);
        repo.persist(&run_id, 0, &state).await.unwrap();
        assert_eq!(repo.list_runs().await.unwrap(), vec![run_id]);
    }
}
