// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for delegation through the lifecycle manager.
//!
//! Covers nested delegation (a worker delegating to another specialist with
//! its own session as caller), event visibility per run, and teardown counts.

use async_trait::async_trait;
use conclave_core::application::{DelegationService, SubAgentLifecycleManager};
use conclave_core::domain::capability::{
    ExecutionCapability, ExecutionContext, ExecutionError, ExecutionOutcome, TeardownError,
    WorkerFactory, WorkerFactoryError, WorkerHandle, WorkerRequest,
};
use conclave_core::domain::events::OrchestrationEvent;
use conclave_core::domain::run::RunId;
use conclave_core::domain::session::SessionId;
use conclave_core::domain::subagent::{PlanningOverride, SubAgentStatus};
use conclave_core::infrastructure::event_bus::EventBus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Shared by the factory and its workers so a "lead" can delegate onwards.
struct Team {
    delegation: OnceLock<DelegationService>,
    closed: AtomicUsize,
    requests: Mutex<Vec<WorkerRequest>>,
}

struct TeamWorker {
    role: String,
    team: Arc<Team>,
}

#[async_trait]
impl ExecutionCapability for TeamWorker {
    async fn execute(
        &self,
        mission: &str,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        if self.role != "lead" {
            return Ok(ExecutionOutcome::success(format!(
                "{} handled '{}'",
                self.role, mission
            )));
        }
        let delegation = self
            .team
            .delegation
            .get()
            .ok_or_else(|| ExecutionError::Failed("team not wired".to_string()))?;

        // Each named helper is bound to the lead's own session.
        let reviewer = delegation.specialist(
            "reviewer",
            Some(PlanningOverride::Disabled),
            ctx.session_id.clone(),
        );
        let tester = delegation.specialist("tester", None, ctx.session_id.clone());
        let review = reviewer.call(mission).await;
        let test = tester.call(mission).await;

        Ok(ExecutionOutcome::success(format!(
            "{}\n{}\n{}\n{}",
            review.output, review.session_id, test.output, test.session_id
        )))
    }
}

#[async_trait]
impl WorkerHandle for TeamWorker {
    fn role(&self) -> &str {
        &self.role
    }

    async fn close(&self) -> Result<(), TeardownError> {
        self.team.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TeamFactory {
    team: Arc<Team>,
}

#[async_trait]
impl WorkerFactory for TeamFactory {
    async fn create(
        &self,
        request: &WorkerRequest,
    ) -> Result<Box<dyn WorkerHandle>, WorkerFactoryError> {
        self.team.requests.lock().push(request.clone());
        Ok(Box::new(TeamWorker {
            role: request.specialist_role.clone(),
            team: Arc::clone(&self.team),
        }))
    }
}

fn wire(event_bus: EventBus) -> (DelegationService, Arc<Team>) {
    let team = Arc::new(Team {
        delegation: OnceLock::new(),
        closed: AtomicUsize::new(0),
        requests: Mutex::new(Vec::new()),
    });
    let factory = Arc::new(TeamFactory {
        team: Arc::clone(&team),
    });
    let lifecycle = Arc::new(SubAgentLifecycleManager::new(
        factory,
        Duration::from_secs(5),
        event_bus,
    ));
    let delegation = DelegationService::new(lifecycle);
    let _ = team.delegation.set(delegation.clone());
    (delegation, team)
}

#[tokio::test]
async fn test_nested_delegation_threads_each_callers_session() {
    let (delegation, team) = wire(EventBus::new(64));
    let root = SessionId::root("run-42");

    let result = delegation.delegate("ship feature", "lead", &root, None).await;

    assert_eq!(result.status, SubAgentStatus::Success);
    let lead_session = result.session_id.clone();
    assert_eq!(lead_session.parent(), Some(root.clone()));

    let lines: Vec<&str> = result.output.lines().collect();
    assert_eq!(lines[0], "reviewer handled 'ship feature'");
    let reviewer_session = SessionId::root(lines[1]);
    let tester_session = SessionId::root(lines[3]);

    assert_eq!(reviewer_session.parent(), Some(lead_session.clone()));
    assert_eq!(tester_session.parent(), Some(lead_session));
    assert_eq!(reviewer_session.depth(), 2);
    assert!(tester_session.descends_from(&root));

    // Three workers created, three closed.
    assert_eq!(team.requests.lock().len(), 3);
    assert_eq!(team.closed.load(Ordering::SeqCst), 3);
    assert_eq!(
        team.requests.lock()[1].planning_override,
        Some(PlanningOverride::Disabled)
    );
}

#[tokio::test]
async fn test_run_subscription_sees_only_its_own_sub_agents() {
    let event_bus = EventBus::new(64);
    let (delegation, _) = wire(event_bus.clone());
    let mut mine = event_bus.subscribe_run(RunId::new("run-a").unwrap());

    delegation
        .delegate("noise", "helper", &SessionId::root("run-b"), None)
        .await;
    let result = delegation
        .delegate("signal", "helper", &SessionId::root("run-a"), None)
        .await;

    match mine.recv().await.unwrap() {
        OrchestrationEvent::SubAgentSpawned {
            session_id,
            parent_session_id,
            specialist_role,
            ..
        } => {
            assert_eq!(session_id, result.session_id);
            assert_eq!(parent_session_id.as_str(), "run-a");
            assert_eq!(specialist_role, "helper");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
        mine.recv().await.unwrap(),
        OrchestrationEvent::SubAgentFinished { status: SubAgentStatus::Success, .. }
    ));
}
