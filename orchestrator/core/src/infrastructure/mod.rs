// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod repositories;
pub mod task_queue;

pub use event_bus::EventBus;
pub use task_queue::TaskQueue;
