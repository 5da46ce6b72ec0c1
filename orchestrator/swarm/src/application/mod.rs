// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the round orchestrator and its worker pool.

pub mod orchestrator;
mod pool;

pub use orchestrator::{OrchestratorError, RoundOrchestrator};
