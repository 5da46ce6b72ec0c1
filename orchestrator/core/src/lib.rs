// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `conclave-core`
//!
//! Building blocks of the multi-agent orchestration engine: hierarchical
//! session identity, the sub-agent lifecycle manager, the single delegation
//! entry point, the in-process task queue and the round state store.
//!
//! The round-based orchestrator that composes these lives in `conclave-swarm`.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, application services and in-process infrastructure

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
