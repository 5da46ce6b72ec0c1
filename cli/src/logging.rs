// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Logging setup
//!
//! Level and format come from `--log-level`/`--log-format` (or their env
//! vars) first, then from `spec.observability` in the loaded config (its
//! defaults when no config could be loaded). `RUST_LOG`, when set, replaces
//! the level filter.

use anyhow::{Context, Result};
use conclave_core::domain::config::ObservabilityConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
}

impl LogSettings {
    pub fn resolve(
        level: Option<String>,
        format: Option<String>,
        observability: &ObservabilityConfig,
    ) -> Self {
        Self {
            level: level.unwrap_or_else(|| observability.log_level.clone()),
            format: format.unwrap_or_else(|| observability.log_format.clone()),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Initialize tracing subscriber for logging
pub fn init(settings: &LogSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&settings.level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if settings.is_json() {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
