// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `conclave-swarm` — Round-Based Orchestration
//!
//! Drives a mission through repeated Plan / Dispatch / Execute / Consolidate
//! rounds with a fixed-size pool of workers.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `RoundDecision` and the pure `decide` rule |
//! | [`application`] | Application | `RoundOrchestrator`, the worker pool |
//!
//! ## Key Concepts
//!
//! - **Run**: one call to [`RoundOrchestrator::run_epic`]. The run id is the
//!   root session of every planner, worker and judge session derived in it.
//! - **Round**: tasks from the planner are published to `"<run_id>.tasks"`,
//!   followed by one sentinel per pool worker.
//! - **Pool worker**: drains the topic, delegating each task to a fresh
//!   sub-agent, until it consumes its sentinel.
//!
//! There is no run-level timeout; callers that need one wrap `run_epic`.

pub mod application;
pub mod domain;

pub use application::{OrchestratorError, RoundOrchestrator};
pub use domain::*;
