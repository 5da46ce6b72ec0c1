// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Conclave CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Operator commands over configuration and persisted runs

pub mod commands;
pub mod logging;
