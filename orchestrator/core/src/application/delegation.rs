// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Delegation Entry Point
//!
//! Every delegated mission, whether it comes from a round worker or a named
//! specialist wrapper, becomes a [`SubAgentSpec`] handed to the
//! [`SubAgentLifecycleManager`]. There is no other path to a worker.
//!
//! The caller's session id is a required argument and always becomes the
//! spec's parent session.

use crate::application::lifecycle::SubAgentLifecycleManager;
use crate::domain::session::SessionId;
use crate::domain::subagent::{PlanningOverride, SubAgentResult, SubAgentSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct DelegationService {
    lifecycle: Arc<SubAgentLifecycleManager>,
    timeout: Option<Duration>,
}

impl DelegationService {
    pub fn new(lifecycle: Arc<SubAgentLifecycleManager>) -> Self {
        Self {
            lifecycle,
            timeout: None,
        }
    }

    /// Budget applied to every delegation made through this service. Without
    /// it the lifecycle manager's default applies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn delegate(
        &self,
        mission: &str,
        specialist_role: &str,
        caller_session_id: &SessionId,
        planning_override: Option<PlanningOverride>,
    ) -> SubAgentResult {
        debug!(
            caller_session_id = %caller_session_id,
            role = specialist_role,
            "Delegating mission"
        );
        let mut spec = SubAgentSpec::new(mission, specialist_role, caller_session_id.clone())
            .with_planning_override(planning_override);
        spec.timeout = self.timeout;
        self.lifecycle.spawn(spec).await
    }

    /// Wrapper bound to one specialist role and one caller.
    pub fn specialist(
        &self,
        specialist_role: impl Into<String>,
        planning_override: Option<PlanningOverride>,
        caller_session_id: SessionId,
    ) -> SpecialistDelegate {
        SpecialistDelegate {
            service: self.clone(),
            specialist_role: specialist_role.into(),
            planning_override,
            caller_session_id,
        }
    }
}

/// Fixed-specialist delegate. Callers only supply the mission.
#[derive(Clone)]
pub struct SpecialistDelegate {
    service: DelegationService,
    specialist_role: String,
    planning_override: Option<PlanningOverride>,
    caller_session_id: SessionId,
}

impl SpecialistDelegate {
    pub fn role(&self) -> &str {
        &self.specialist_role
    }

    pub async fn call(&self, mission: &str) -> SubAgentResult {
        self.service
            .delegate(
                mission,
                &self.specialist_role,
                &self.caller_session_id,
                self.planning_override,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{
        ExecutionCapability, ExecutionContext, ExecutionError, ExecutionOutcome, TeardownError,
        WorkerFactory, WorkerFactoryError, WorkerHandle, WorkerRequest,
    };
    use crate::domain::subagent::SubAgentStatus;
    use crate::infrastructure::event_bus::EventBus;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct EchoWorker {
        role: String,
    }

    #[async_trait]
    impl ExecutionCapability for EchoWorker {
        async fn execute(
            &self,
            mission: &str,
            ctx: &ExecutionContext,
        ) -> Result<ExecutionOutcome, ExecutionError> {
            let output = format!("{}|{}|{}", self.role, mission, ctx.timeout.as_millis());
            Ok(ExecutionOutcome::success(output))
        }
    }

    #[async_trait]
    impl WorkerHandle for EchoWorker {
        fn role(&self) -> &str {
            &self.role
        }

        async fn close(&self) -> Result<(), TeardownError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        requests: Mutex<Vec<WorkerRequest>>,
    }

    #[async_trait]
    impl WorkerFactory for RecordingFactory {
        async fn create(
            &self,
            request: &WorkerRequest,
        ) -> Result<Box<dyn WorkerHandle>, WorkerFactoryError> {
            self.requests.lock().push(request.clone());
            Ok(Box::new(EchoWorker {
                role: request.specialist_role.clone(),
            }))
        }
    }

    fn service() -> (DelegationService, Arc<RecordingFactory>) {
        let factory = Arc::new(RecordingFactory::default());
        let lifecycle = SubAgentLifecycleManager::new(
            factory.clone(),
            Duration::from_secs(60),
            EventBus::new(16),
        );
        (DelegationService::new(Arc::new(lifecycle)), factory)
    }

    #[tokio::test]
    async fn test_delegate_threads_caller_session() {
        let (service, factory) = service();
        let caller = SessionId::root("caller-7");

        let result = service
            .delegate(
                "summarise",
                "researcher",
                &caller,
                Some(PlanningOverride::Disabled),
            )
            .await;

        assert_eq!(result.status, SubAgentStatus::Success);
        assert_eq!(result.session_id.parent(), Some(caller));
        assert_eq!(result.output, "researcher|summarise|60000");
        assert_eq!(
            factory.requests.lock()[0].planning_override,
            Some(PlanningOverride::Disabled)
        );
    }

    #[tokio::test]
    async fn test_every_specialist_wrapper_propagates_its_caller() {
        let (service, _) = service();
        let callers = [
            SessionId::root("alpha"),
            SessionId::derive(&SessionId::root("beta"), "planner", Some("p1")),
        ];

        for (i, caller) in callers.iter().enumerate() {
            let role = format!("delegate_{}", i);
            let wrapper = service.specialist(role.clone(), None, caller.clone());
            let result = wrapper.call("task").await;

            assert_eq!(result.session_id.parent().as_ref(), Some(caller));
            assert_eq!(result.session_id.label(), Some(role.as_str()));
        }
    }

    #[tokio::test]
    async fn test_service_timeout_is_applied() {
        let (service, _) = service();
        let service = service.with_timeout(Duration::from_millis(1500));

        let result = service
            .specialist(
                "reviewer",
                Some(PlanningOverride::Enabled),
                SessionId::root("c"),
            )
            .call("check")
            .await;

        assert_eq!(result.output, "reviewer|check|1500");
    }
}
