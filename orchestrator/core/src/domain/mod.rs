// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: pure types, invariants and the interfaces adapters implement.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`session`] | `SessionId` derivation and parsing |
//! | [`task`] | `Task`, `TaskResult` |
//! | [`run`] | `RunId`, `RunState`, status and phase |
//! | [`subagent`] | `SubAgentSpec`, `SubAgentResult` |
//! | [`capability`] | planner, judge, worker factory and execution traits |
//! | [`repository`] | Round State Store interface |
//! | [`events`] | `OrchestrationEvent` |
//! | [`errors`] | failure taxonomy |
//! | [`config`] | YAML configuration manifest |

pub mod capability;
pub mod config;
pub mod errors;
pub mod events;
pub mod repository;
pub mod run;
pub mod session;
pub mod subagent;
pub mod task;
