// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Round Orchestrator
//!
//! One [`RoundOrchestrator::run_epic`] call drives a run through:
//!
//! ```text
//! PLANNING -> DISPATCHING -> EXECUTING -> CONSOLIDATING -> { PLANNING | COMPLETED | FAILED }
//! ```
//!
//! Round 0 of every run is persisted before planning starts and carries the
//! mission. Each later round is persisted after consolidation, so the store
//! holds the whole history and PLANNING can reload cross-round memory from it.
//!
//! Per-task failures never abort a round. Only the planner, the judge and the
//! store can fail a run, and they do so by returning a FAILED `RunState`.

use crate::application::pool::{PoolReport, WorkerPool};
use crate::domain::round::{decide, RoundDecision};
use chrono::Utc;
use conclave_core::application::DelegationService;
use conclave_core::domain::capability::{
    ConsolidationCapability, ConsolidationRequest, PlanRequest, PlanningCapability,
};
use conclave_core::domain::config::RoundSettings;
use conclave_core::domain::errors::FailureKind;
use conclave_core::domain::events::OrchestrationEvent;
use conclave_core::domain::repository::RunStateRepository;
use conclave_core::domain::run::{RoundPhase, RoundSummary, RunId, RunState, RunStatus};
use conclave_core::domain::session::SessionId;
use conclave_core::domain::task::Task;
use conclave_core::infrastructure::event_bus::EventBus;
use conclave_core::infrastructure::task_queue::TaskQueue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};

/// Rejected arguments. Everything that goes wrong once a run exists is
/// reported through the returned `RunState` instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("worker_count must be at least 1")]
    InvalidWorkerCount,
    #[error("max_rounds must be at least 1")]
    InvalidMaxRounds,
}

pub struct RoundOrchestrator {
    planner: Arc<dyn PlanningCapability>,
    judge: Arc<dyn ConsolidationCapability>,
    delegation: DelegationService,
    repository: Arc<dyn RunStateRepository>,
    queue: Arc<TaskQueue<Task>>,
    event_bus: EventBus,
    settings: RoundSettings,
}

impl RoundOrchestrator {
    pub fn new(
        planner: Arc<dyn PlanningCapability>,
        judge: Arc<dyn ConsolidationCapability>,
        delegation: DelegationService,
        repository: Arc<dyn RunStateRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            planner,
            judge,
            delegation,
            repository,
            queue: Arc::new(TaskQueue::new()),
            event_bus,
            settings: RoundSettings::default(),
        }
    }

    /// Share a queue with other orchestrators. Topics stay disjoint per run.
    pub fn with_queue(mut self, queue: Arc<TaskQueue<Task>>) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_settings(mut self, settings: RoundSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn queue(&self) -> &Arc<TaskQueue<Task>> {
        &self.queue
    }

    /// Run with the configured `worker_count` and `max_rounds`.
    pub async fn run_epic_with_defaults(
        &self,
        mission: &str,
    ) -> Result<RunState, OrchestratorError> {
        self.run_epic(
            mission,
            None,
            self.settings.worker_count,
            self.settings.max_rounds,
        )
        .await
    }

    pub async fn run_epic(
        &self,
        mission: &str,
        run_id: Option<RunId>,
        worker_count: usize,
        max_rounds: u32,
    ) -> Result<RunState, OrchestratorError> {
        if worker_count == 0 {
            return Err(OrchestratorError::InvalidWorkerCount);
        }
        if max_rounds == 0 {
            return Err(OrchestratorError::InvalidMaxRounds);
        }

        let run_id = run_id.unwrap_or_else(RunId::generate);
        let state = RunState::new(run_id.clone(), mission);
        let span = tracing::info_span!("run", run_id = %run_id);
        let state = self
            .drive(state, worker_count, max_rounds)
            .instrument(span)
            .await;

        self.queue.remove_topic(&run_id.topic());
        metrics::counter!("conclave_runs_total", "status" => state.status.as_str())
            .increment(1);
        Ok(state)
    }

    async fn drive(&self, mut state: RunState, worker_count: usize, max_rounds: u32) -> RunState {
        let run_id = state.run_id.clone();
        info!(worker_count, max_rounds, "Run started");
        self.event_bus.publish(OrchestrationEvent::RunStarted {
            run_id: run_id.clone(),
            mission: state.mission.clone(),
            worker_count,
            max_rounds,
            started_at: state.started_at,
        });

        if let Err(e) = self.repository.persist(&run_id, 0, &state).await {
            return self
                .abort(
                    state,
                    FailureKind::PersistenceFailure,
                    format!("Failed to record mission: {}", e),
                )
                .await;
        }

        loop {
            state.begin_round();
            let round = state.round_number;
            metrics::counter!("conclave_rounds_total").increment(1);
            info!(round, "Round started");
            self.event_bus.publish(OrchestrationEvent::RoundStarted {
                run_id: run_id.clone(),
                round,
                started_at: Utc::now(),
            });

            // PLANNING
            let memory = match self.recall_memory(&state).await {
                Ok(memory) => memory,
                Err(message) => {
                    return self
                        .abort(state, FailureKind::PersistenceFailure, message)
                        .await
                }
            };
            let request = PlanRequest {
                run_id: run_id.clone(),
                round,
                mission: state.mission.clone(),
                memory,
                session_id: SessionId::derive(&run_id.root_session(), "planner", None),
            };
            let tasks = match self.planner.plan(&request).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    return self
                        .abort(
                            state,
                            FailureKind::PlanningFailure,
                            format!("Planner failed in round {}: {}", round, e),
                        )
                        .await;
                }
            };
            info!(round, task_count = tasks.len(), "Plan received");

            // DISPATCHING
            state.phase = RoundPhase::Dispatching;
            self.dispatch(&run_id, round, &tasks, worker_count);
            state.tasks = tasks;

            // EXECUTING
            state.phase = RoundPhase::Executing;
            let pool = WorkerPool {
                queue: Arc::clone(&self.queue),
                delegation: self.delegation.clone(),
                event_bus: self.event_bus.clone(),
            };
            let report = pool.drain(&run_id, round, worker_count).await;
            self.check_drained(&mut state, &report, worker_count);
            state.results = report.results;

            // CONSOLIDATING
            state.phase = RoundPhase::Consolidating;
            state.status = RunStatus::AwaitingConsolidation;
            let request = ConsolidationRequest {
                run_id: run_id.clone(),
                round,
                results: state.results.clone(),
                session_id: SessionId::derive(&run_id.root_session(), "judge", None),
            };
            let verdict = match self.judge.consolidate(&request).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    return self
                        .abort(
                            state,
                            FailureKind::ConsolidationFailure,
                            format!("Judge failed in round {}: {}", round, e),
                        )
                        .await;
                }
            };
            state.record_summary(verdict.summary.clone());
            self.event_bus.publish(OrchestrationEvent::RoundConsolidated {
                run_id: run_id.clone(),
                round,
                summary: verdict.summary.clone(),
                continue_run: verdict.continue_run,
                consolidated_at: Utc::now(),
            });

            let decision = decide(&verdict, round, max_rounds);
            info!(
                round,
                continue_requested = verdict.continue_run,
                ?decision,
                "Round consolidated"
            );
            match decision {
                RoundDecision::Continue => state.status = RunStatus::Continuing,
                RoundDecision::Complete => state.complete(),
            }

            if let Err(e) = self.repository.persist(&run_id, round, &state).await {
                return self
                    .abort(
                        state,
                        FailureKind::PersistenceFailure,
                        format!("Failed to record round {}: {}", round, e),
                    )
                    .await;
            }

            if decision == RoundDecision::Complete {
                info!(rounds = round, "Run completed");
                self.event_bus.publish(OrchestrationEvent::RunCompleted {
                    run_id: run_id.clone(),
                    rounds: round,
                    status: state.status,
                    completed_at: state.completed_at.unwrap_or_else(Utc::now),
                });
                return state;
            }
        }
    }

    /// Cross-round memory for the next planning call, read back from the store.
    async fn recall_memory(&self, state: &RunState) -> Result<Vec<RoundSummary>, String> {
        if state.round_number <= 1 {
            return Ok(Vec::new());
        }
        match self.repository.load(&state.run_id).await {
            Ok(Some(persisted)) => Ok(persisted.memory),
            Ok(None) => Err(format!(
                "No persisted rounds found for run {}",
                state.run_id
            )),
            Err(e) => Err(format!("Failed to reload cross-round memory: {}", e)),
        }
    }

    fn dispatch(&self, run_id: &RunId, round: u32, tasks: &[Task], worker_count: usize) {
        let topic = run_id.topic();
        for task in tasks {
            self.queue.publish(&topic, task.clone());
        }
        // Published last so every real task is drained before any worker stops.
        for _ in 0..worker_count {
            self.queue.publish_sentinel(&topic);
        }
        self.event_bus.publish(OrchestrationEvent::TasksDispatched {
            run_id: run_id.clone(),
            round,
            topic,
            task_count: tasks.len(),
            sentinel_count: worker_count,
            dispatched_at: Utc::now(),
        });
    }

    /// Every worker must have consumed exactly one sentinel and nothing may be
    /// left on the topic. Anything else is a dispatch counting bug.
    fn check_drained(&self, state: &mut RunState, report: &PoolReport, worker_count: usize) {
        let stats = self.queue.stats(&state.run_id.topic()).unwrap_or_default();
        let balanced = report.lost_workers == 0
            && report.sentinels_consumed() == worker_count
            && report.sentinels_per_worker.iter().all(|&n| n == 1)
            && stats.pending == 0
            && stats.in_flight == 0;
        if balanced {
            return;
        }

        let message = format!(
            "Round {} ended with {} of {} sentinels consumed, {} lost workers, \
             {} pending and {} unacknowledged messages",
            state.round_number,
            report.sentinels_consumed(),
            worker_count,
            report.lost_workers,
            stats.pending,
            stats.in_flight,
        );
        error!(round = state.round_number, "{}", message);
        metrics::counter!("conclave_queue_exhaustion_total")
            .increment(1);
        state.record_failure(FailureKind::QueueExhaustion, message);
    }

    async fn abort(&self, mut state: RunState, kind: FailureKind, message: String) -> RunState {
        error!(round = state.round_number, kind = %kind, "{}", message);
        state.fail(kind, message);

        let round = state.round_number;
        if let Err(e) = self.repository.persist(&state.run_id, round, &state).await {
            warn!(round, error = %e, "Failed to record run failure");
        }

        if let Some(failure) = state.error.clone() {
            self.event_bus.publish(OrchestrationEvent::RunFailed {
                run_id: state.run_id.clone(),
                round,
                failure,
                failed_at: state.completed_at.unwrap_or_else(Utc::now),
            });
        }
        state
    }
}
