// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for orchestration events
//
// Provides in-memory event streaming using tokio broadcast channels so CLIs,
// dashboards and tests can follow runs and delegations as they happen.
//
// In-memory only: events are lost on restart. The Round State Store remains
// the source of truth for run progress.

use crate::domain::events::OrchestrationEvent;
use crate::domain::run::RunId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to orchestration events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OrchestrationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before slow
    /// receivers start lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1024)
    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    /// Publish an event to all subscribers. Never blocks; having no
    /// subscribers is not an error.
    pub fn publish(&self, event: OrchestrationEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all orchestration events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for a single run (including its sub-agents)
    pub fn subscribe_run(&self, run_id: RunId) -> RunEventReceiver {
        RunEventReceiver {
            receiver: self.sender.subscribe(),
            run_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all orchestration events
pub struct EventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<OrchestrationEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Receiver for one run's events (filtered)
pub struct RunEventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
    run_id: RunId,
}

impl RunEventReceiver {
    /// Receive the next event for the run. Filters out events of other runs.
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.belongs_to(&self.run_id) {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionId;
    use chrono::Utc;

    fn round_started(run: &str, round: u32) -> OrchestrationEvent {
        OrchestrationEvent::RoundStarted {
            run_id: RunId::new(run).unwrap(),
            round,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(round_started("r1", 1));

        match receiver.recv().await.unwrap() {
            OrchestrationEvent::RoundStarted { run_id, round, .. } => {
                assert_eq!(run_id.as_str(), "r1");
                assert_eq!(round, 1);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let event_bus = EventBus::new(4);
        assert_eq!(event_bus.subscriber_count(), 0);
        event_bus.publish(round_started("r1", 1));
    }

    #[tokio::test]
    async fn test_run_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_run(RunId::new("r1").unwrap());

        event_bus.publish(round_started("r2", 1));
        event_bus.publish(OrchestrationEvent::SubAgentSpawned {
            session_id: SessionId::root("r2--sub_worker_aaaa"),
            parent_session_id: SessionId::root("r2"),
            specialist_role: "worker".to_string(),
            spawned_at: Utc::now(),
        });
        event_bus.publish(OrchestrationEvent::SubAgentSpawned {
            session_id: SessionId::root("r1--sub_worker_bbbb"),
            parent_session_id: SessionId::root("r1"),
            specialist_role: "worker".to_string(),
            spawned_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            OrchestrationEvent::SubAgentSpawned { session_id, .. } => {
                assert_eq!(session_id.as_str(), "r1--sub_worker_bbbb");
            }
            other => panic!("Wrong event received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drain_collects_buffered_events() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        event_bus.publish(round_started("r1", 1));
        event_bus.publish(round_started("r1", 2));

        assert_eq!(receiver.drain().len(), 2);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
