// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Fixed-size worker pool draining one round's topic.

use chrono::Utc;
use conclave_core::application::DelegationService;
use conclave_core::domain::events::OrchestrationEvent;
use conclave_core::domain::run::RunId;
use conclave_core::domain::session::SessionId;
use conclave_core::domain::task::{Task, TaskResult};
use conclave_core::infrastructure::event_bus::EventBus;
use conclave_core::infrastructure::task_queue::{QueueMessage, Subscription, TaskQueue};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn, Instrument};

/// What the pool left behind once every worker exited.
#[derive(Debug)]
pub(crate) struct PoolReport {
    /// Ordered by append time.
    pub results: Vec<TaskResult>,
    /// Sentinels observed by each worker that exited normally.
    pub sentinels_per_worker: Vec<usize>,
    /// Workers that ended without returning (panicked or aborted).
    pub lost_workers: usize,
}

impl PoolReport {
    pub fn sentinels_consumed(&self) -> usize {
        self.sentinels_per_worker.iter().sum()
    }
}

pub(crate) struct WorkerPool {
    pub queue: Arc<TaskQueue<Task>>,
    pub delegation: DelegationService,
    pub event_bus: EventBus,
}

impl WorkerPool {
    /// Start `worker_count` workers on the run's topic and wait for all of them.
    pub async fn drain(&self, run_id: &RunId, round: u32, worker_count: usize) -> PoolReport {
        let topic = run_id.topic();
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut pool = JoinSet::new();

        for index in 0..worker_count {
            let worker = PoolWorker {
                index,
                run_id: run_id.clone(),
                round,
                caller_session_id: run_id.root_session(),
                queue: Arc::clone(&self.queue),
                delegation: self.delegation.clone(),
                event_bus: self.event_bus.clone(),
                results: Arc::clone(&results),
            };
            let subscription = self.queue.subscribe(&topic);
            let span = tracing::info_span!("pool_worker", worker = index);
            pool.spawn(worker.run(subscription).instrument(span));
        }

        let mut sentinels_per_worker = Vec::with_capacity(worker_count);
        let mut lost_workers = 0;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(sentinels) => sentinels_per_worker.push(sentinels),
                Err(e) => {
                    lost_workers += 1;
                    error!(run_id = %run_id, round, error = %e, "Pool worker did not exit cleanly");
                }
            }
        }

        let results = std::mem::take(&mut *results.lock());
        PoolReport {
            results,
            sentinels_per_worker,
            lost_workers,
        }
    }
}

struct PoolWorker {
    index: usize,
    run_id: RunId,
    round: u32,
    caller_session_id: SessionId,
    queue: Arc<TaskQueue<Task>>,
    delegation: DelegationService,
    event_bus: EventBus,
    results: Arc<Mutex<Vec<TaskResult>>>,
}

impl PoolWorker {
    /// Returns the number of sentinels consumed.
    async fn run(self, mut subscription: Subscription<Task>) -> usize {
        let mut sentinels = 0;
        while let Some(envelope) = subscription.next().await {
            match envelope.payload {
                QueueMessage::Sentinel => {
                    sentinels += 1;
                    debug!(worker = self.index, "Sentinel received; leaving pool");
                }
                QueueMessage::Item(task) => {
                    let result = self
                        .delegation
                        .delegate(
                            &task.mission(),
                            &task.assigned_role,
                            &self.caller_session_id,
                            None,
                        )
                        .await;
                    let task_result = TaskResult::from_subagent(task.task_id.clone(), result);

                    self.event_bus.publish(OrchestrationEvent::TaskCompleted {
                        run_id: self.run_id.clone(),
                        round: self.round,
                        task_id: task_result.task_id.clone(),
                        worker_session_id: task_result.worker_session_id.clone(),
                        status: task_result.status,
                        completed_at: Utc::now(),
                    });
                    match task_result.failure_kind() {
                        Some(kind) => warn!(
                            task_id = %task_result.task_id,
                            kind = %kind,
                            error = task_result.error.as_deref().unwrap_or_default(),
                            "Task failed; round continues"
                        ),
                        None => debug!(task_id = %task_result.task_id, "Task finished"),
                    }
                    self.results.lock().push(task_result);
                }
            }

            // Only after the result is in the round collection.
            if let Err(e) = self.queue.ack(envelope.delivery_id) {
                warn!(
                    delivery_id = %envelope.delivery_id,
                    error = %e,
                    "Failed to acknowledge delivery"
                );
            }
        }
        sentinels
    }
}
