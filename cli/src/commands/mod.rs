// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Conclave CLI

pub mod config;
pub mod runs;

pub use self::config::ConfigCommand;
pub use self::runs::RunsCommand;
