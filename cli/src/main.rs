// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Conclave CLI
//!
//! Operator tooling for the Conclave orchestrator.
//!
//! ## Commands
//!
//! - `conclave config show|validate|generate` - Configuration management
//! - `conclave runs list|show` - Inspect runs recorded in the round state store

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use conclave_cli::commands::{self, ConfigCommand, RunsCommand};
use conclave_cli::logging::{self, LogSettings};
use conclave_core::domain::config::OrchestratorConfigManifest;

/// Conclave - round-based multi-agent orchestration
#[derive(Parser)]
#[command(name = "conclave")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONCLAVE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "CONCLAVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format (compact, json); defaults to the config file
    #[arg(long, global = true, env = "CONCLAVE_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Inspect persisted runs
    #[command(name = "runs")]
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands report load errors themselves; logging falls back to defaults.
    let observability = OrchestratorConfigManifest::load_or_default(cli.config.clone())
        .map(|manifest| manifest.spec.observability)
        .unwrap_or_default();
    let settings = LogSettings::resolve(cli.log_level, cli.log_format, &observability);
    logging::init(&settings)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Runs { command }) => {
            commands::runs::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
