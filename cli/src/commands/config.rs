// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use humantime_serde::re::humantime;
use std::path::{Path, PathBuf};

use conclave_core::domain::config::{OrchestratorConfigManifest, StorageKind, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./conclave-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./conclave-config.yaml");
        println!("  4. ~/.conclave/config.yaml");
        println!("  5. /etc/conclave/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();
    print!("{}", render_summary(&config));

    Ok(())
}

/// Human-readable summary of the effective configuration.
pub fn render_summary(config: &OrchestratorConfigManifest) -> String {
    let spec = &config.spec;
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Rounds:".bold()));
    out.push_str(&format!(
        "  Worker count: {}\n",
        spec.orchestrator.worker_count
    ));
    out.push_str(&format!(
        "  Max rounds: {}\n\n",
        spec.orchestrator.max_rounds
    ));

    out.push_str(&format!("{}\n", "Sub-agents:".bold()));
    out.push_str(&format!(
        "  Default timeout: {}\n\n",
        humantime::format_duration(spec.subagent.default_timeout)
    ));

    out.push_str(&format!("{}\n", "Storage:".bold()));
    match spec.storage.backend {
        StorageKind::Memory => out.push_str("  Backend: memory (runs are not kept after exit)\n\n"),
        StorageKind::File => {
            out.push_str("  Backend: file\n");
            out.push_str(&format!("  Path: {}\n\n", spec.storage.path.display()));
        }
    }

    out.push_str(&format!("{}\n", "Observability:".bold()));
    out.push_str(&format!("  Log level: {}\n", spec.observability.log_level));
    out.push_str(&format!(
        "  Log format: {}\n",
        spec.observability.log_format
    ));
    out.push_str(&format!(
        "  Event bus capacity: {}\n",
        spec.event_bus.capacity
    ));
    out
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;
    tracing::debug!(
        worker_count = config.spec.orchestrator.worker_count,
        max_rounds = config.spec.orchestrator.max_rounds,
        "Configuration validated"
    );

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    tokio::fs::write(output, sample)
        .await
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generated_templates_are_valid() {
        let dir = TempDir::new().unwrap();
        for examples in [false, true] {
            let path = dir.path().join(format!("config-{}.yaml", examples));
            generate(&path, examples).await.unwrap();

            let manifest = OrchestratorConfigManifest::from_yaml_file(&path).unwrap();
            manifest.validate().unwrap();
        }
    }

    #[test]
    fn test_summary_mentions_storage_path() {
        colored::control::set_override(false);
        let mut config = OrchestratorConfigManifest::default();
        config.spec.storage.path = PathBuf::from("/tmp/conclave-runs");

        let summary = render_summary(&config);

        assert!(summary.contains("Worker count: 4"));
        assert!(summary.contains("Default timeout: 10m"));
        assert!(summary.contains("/tmp/conclave-runs"));
    }
}
