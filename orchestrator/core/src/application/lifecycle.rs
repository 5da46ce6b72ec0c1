// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Sub-Agent Lifecycle Manager
//!
//! The one place worker resources are acquired and released. Every spawn:
//!
//! 1. derives a child session from the requested parent session,
//! 2. asks the [`WorkerFactory`] for a fresh worker,
//! 3. executes the mission under a wall-clock budget,
//! 4. closes the worker on every exit path,
//! 5. maps the outcome to a [`SubAgentResult`].
//!
//! Execution failures, panics and timeouts all become results; `spawn` itself
//! never fails. Teardown errors are logged and counted but never replace the
//! primary outcome.

use crate::domain::capability::{
    ExecutionContext, ExecutionError, ExecutionOutcome, WorkerFactory, WorkerHandle, WorkerRequest,
};
use crate::domain::errors::FailureKind;
use crate::domain::events::OrchestrationEvent;
use crate::domain::session::SessionId;
use crate::domain::subagent::{SubAgentResult, SubAgentSpec, SubAgentStatus};
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use futures::FutureExt;
use humantime_serde::re::humantime;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

pub struct SubAgentLifecycleManager {
    factory: Arc<dyn WorkerFactory>,
    default_timeout: Duration,
    event_bus: EventBus,
}

impl SubAgentLifecycleManager {
    pub fn new(
        factory: Arc<dyn WorkerFactory>,
        default_timeout: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self {
            factory,
            default_timeout,
            event_bus,
        }
    }

    /// Budget applied when a spec does not carry its own timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run `spec.mission` in a freshly created worker and tear the worker down.
    pub async fn spawn(&self, spec: SubAgentSpec) -> SubAgentResult {
        let session_id = SessionId::derive(&spec.parent_session_id, &spec.specialist_role, None);
        let span = tracing::info_span!(
            "subagent",
            session_id = %session_id,
            role = %spec.specialist_role,
        );
        self.spawn_in_session(spec, session_id)
            .instrument(span)
            .await
    }

    async fn spawn_in_session(&self, spec: SubAgentSpec, session_id: SessionId) -> SubAgentResult {
        let started = Instant::now();
        let timeout = spec.timeout.unwrap_or(self.default_timeout);

        metrics::counter!("conclave_subagents_spawned_total")
            .increment(1);
        self.event_bus.publish(OrchestrationEvent::SubAgentSpawned {
            session_id: session_id.clone(),
            parent_session_id: spec.parent_session_id.clone(),
            specialist_role: spec.specialist_role.clone(),
            spawned_at: Utc::now(),
        });

        let request = WorkerRequest {
            specialist_role: spec.specialist_role.clone(),
            planning_override: spec.planning_override,
        };
        let worker = match self.factory.create(&request).await {
            Ok(worker) => worker,
            Err(e) => {
                warn!(error = %e, "Failed to create worker");
                return self.finish(
                    session_id,
                    SubAgentStatus::Failure,
                    String::new(),
                    Some(e.to_string()),
                    started,
                );
            }
        };

        let guard = CloseGuard::new(Arc::from(worker), session_id.clone());
        let cancellation = CancellationToken::new();
        let ctx = ExecutionContext {
            session_id: session_id.clone(),
            timeout,
            cancellation: cancellation.clone(),
        };

        let budget = humantime::format_duration(timeout);
        debug!(timeout = %budget, "Executing mission");
        let (status, output, error) = {
            let worker = guard.worker();
            let execution = worker.execute(&spec.mission, &ctx);
            let execution = AssertUnwindSafe(execution).catch_unwind();
            let mut execution = std::pin::pin!(execution);
            let finished = tokio::time::timeout(timeout, &mut execution).await;
            match finished {
                Ok(Ok(Ok(outcome))) => map_outcome(outcome),
                Ok(Ok(Err(e))) => map_execution_error(e),
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    warn!(panic = %message, "Worker panicked during execution");
                    (
                        SubAgentStatus::Failure,
                        String::new(),
                        Some(format!("Worker panicked: {}", message)),
                    )
                }
                Err(_) => {
                    // Signal the worker before its future is dropped at the end of this block.
                    cancellation.cancel();
                    warn!(timeout = %budget, "Worker exceeded its time budget");
                    (
                        SubAgentStatus::Timeout,
                        String::new(),
                        Some(format!("Worker exceeded its {} budget", budget)),
                    )
                }
            }
        };

        let worker = guard.disarm();
        if let Err(e) = worker.close().await {
            metrics::counter!("conclave_subagent_teardown_failures_total")
                .increment(1);
            warn!(
                kind = %FailureKind::ResourceTeardownError,
                error = %e,
                "Worker teardown failed; keeping primary outcome"
            );
        }

        self.finish(session_id, status, output, error, started)
    }

    fn finish(
        &self,
        session_id: SessionId,
        status: SubAgentStatus,
        output: String,
        error: Option<String>,
        started: Instant,
    ) -> SubAgentResult {
        let duration = started.elapsed();
        let duration_ms = duration.as_millis() as u64;
        metrics::counter!("conclave_subagent_outcomes_total", "status" => status.as_str())
            .increment(1);
        metrics::histogram!("conclave_subagent_duration_seconds")
            .record(duration.as_secs_f64());

        self.event_bus.publish(OrchestrationEvent::SubAgentFinished {
            session_id: session_id.clone(),
            status,
            duration_ms,
            finished_at: Utc::now(),
        });
        match status.failure_kind() {
            Some(kind) => info!(status = %status, kind = %kind, duration_ms, "Sub-agent finished"),
            None => info!(status = %status, duration_ms, "Sub-agent finished"),
        }

        SubAgentResult {
            status,
            output,
            session_id,
            error,
            duration,
        }
    }
}

fn map_outcome(outcome: ExecutionOutcome) -> (SubAgentStatus, String, Option<String>) {
    if outcome.success {
        (SubAgentStatus::Success, outcome.output, None)
    } else {
        let error = outcome
            .error
            .unwrap_or_else(|| "Worker reported failure without detail".to_string());
        (SubAgentStatus::Failure, outcome.output, Some(error))
    }
}

fn map_execution_error(error: ExecutionError) -> (SubAgentStatus, String, Option<String>) {
    warn!(error = %error, "Worker execution raised");
    (
        SubAgentStatus::Failure,
        String::new(),
        Some(error.to_string()),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Owns an open worker until it is explicitly disarmed. If the spawn future is
/// dropped first, the worker is closed on the runtime instead.
struct CloseGuard {
    worker: Arc<dyn WorkerHandle>,
    session_id: SessionId,
    armed: bool,
}

impl CloseGuard {
    fn new(worker: Arc<dyn WorkerHandle>, session_id: SessionId) -> Self {
        Self {
            worker,
            session_id,
            armed: true,
        }
    }

    fn worker(&self) -> Arc<dyn WorkerHandle> {
        Arc::clone(&self.worker)
    }

    /// Hand the worker back to the caller, who becomes responsible for closing it.
    fn disarm(mut self) -> Arc<dyn WorkerHandle> {
        self.armed = false;
        Arc::clone(&self.worker)
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let worker = Arc::clone(&self.worker);
        let session_id = self.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(session_id = %session_id, "Spawn cancelled; closing worker in background");
                runtime.spawn(async move {
                    if let Err(e) = worker.close().await {
                        metrics::counter!("conclave_subagent_teardown_failures_total")
                            .increment(1);
                        warn!(
                            session_id = %session_id,
                            kind = %FailureKind::ResourceTeardownError,
                            error = %e,
                            "Background worker teardown failed"
                        );
                    }
                });
            }
            Err(_) => {
                warn!(session_id = %session_id, "No runtime available; worker resources leaked");
            }
        }
    }
}
