// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Round State Store
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/<run_id>/round-0000.json
//! <base>/<run_id>/round-0001.json
//! ```
//!
//! Each file holds one serialized [`RoundRecord`]. Files are opened with
//! `create_new`, so the filesystem itself rejects a second write of a round.
//! Single-node only: there is no locking across processes beyond that.

use crate::domain::repository::{RepositoryError, RoundRecord, RunStateRepository};
use crate::domain::run::{RunId, RunState};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const ROUND_PREFIX: &str = "round-";
const ROUND_EXTENSION: &str = ".json";

pub struct FileRunStateRepository {
    base_path: PathBuf,
}

impl FileRunStateRepository {
    /// Open (creating if needed) a store rooted at `base_path`.
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            RepositoryError::Io(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.base_path.join(run_id.as_str())
    }

    fn round_path(&self, run_id: &RunId, round_number: u32) -> PathBuf {
        let file_name = format!("{}{:04}{}", ROUND_PREFIX, round_number, ROUND_EXTENSION);
        self.run_dir(run_id).join(file_name)
    }

    async fn read_records(&self, run_id: &RunId) -> Result<Vec<RoundRecord>, RepositoryError> {
        let dir = self.run_dir(run_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rounds = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(round) = name.to_str().and_then(parse_round_file_name) else {
                debug!("Skipping unrelated file {:?} in {}", name, dir.display());
                continue;
            };
            rounds.push((round, entry.path()));
        }
        rounds.sort_by_key(|(round, _)| *round);

        let mut records = Vec::with_capacity(rounds.len());
        for (_, path) in rounds {
            let bytes = fs::read(&path).await?;
            records.push(serde_json::from_slice::<RoundRecord>(&bytes)?);
        }
        Ok(records)
    }
}

fn parse_round_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(ROUND_PREFIX)?
        .strip_suffix(ROUND_EXTENSION)?
        .parse()
        .ok()
}

#[async_trait]
impl RunStateRepository for FileRunStateRepository {
    async fn persist(
        &self,
        run_id: &RunId,
        round_number: u32,
        state: &RunState,
    ) -> Result<(), RepositoryError> {
        let record = RoundRecord {
            run_id: run_id.clone(),
            round_number,
            recorded_at: Utc::now(),
            state: state.clone(),
        };
        let body = serde_json::to_vec_pretty(&record)?;

        fs::create_dir_all(self.run_dir(run_id)).await?;
        let path = self.round_path(run_id, round_number);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RepositoryError::AlreadyExists {
                    run_id: run_id.clone(),
                    round_number,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = file.write_all(&body).await {
            // Leave no truncated round behind; it would block a retry.
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!(
                    "Failed to remove partial round file {}: {}",
                    path.display(),
                    cleanup
                );
            }
            return Err(e.into());
        }
        file.sync_all().await?;
        debug!(
            "Persisted round {} of run {} to {}",
            round_number,
            run_id,
            path.display()
        );
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<RunState>, RepositoryError> {
        let mut records = self.read_records(run_id).await?;
        Ok(records.pop().map(|record| record.state))
    }

    async fn history(&self, run_id: &RunId) -> Result<Vec<RoundRecord>, RepositoryError> {
        self.read_records(run_id).await
    }

    async fn list_runs(&self) -> Result<Vec<RunId>, RepositoryError> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().map(RunId::new) {
                Some(Ok(id)) => ids.push(id),
                _ => debug!("Skipping directory {:?}: not a run id", name),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
