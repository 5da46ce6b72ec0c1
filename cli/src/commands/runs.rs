// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Run inspection commands
//!
//! Read-only views over the file-backed round state store.
//!
//! Commands: list, show

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use conclave_core::domain::config::OrchestratorConfigManifest;
use conclave_core::domain::repository::{RoundRecord, RunStateRepository, StorageBackend};
use conclave_core::domain::run::{RunId, RunState, RunStatus};
use conclave_core::infrastructure::repositories::FileRunStateRepository;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// List recorded runs
    List,

    /// Show the latest state of a run
    Show {
        /// Run identifier
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Print every recorded round, oldest first
        #[arg(long)]
        history: bool,

        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(
    command: RunsCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;

    let path = match config.spec.storage.backend() {
        StorageBackend::File { path } => path,
        StorageBackend::InMemory => {
            println!(
                "{}",
                "Storage backend is 'memory'; no runs are kept between processes.".yellow()
            );
            return Ok(());
        }
    };
    tracing::debug!(path = %path.display(), "Opening run store");
    let repository = FileRunStateRepository::open(&path)
        .await
        .with_context(|| format!("Failed to open run store at {}", path.display()))?;

    match command {
        RunsCommand::List => list(&repository).await,
        RunsCommand::Show {
            run_id,
            history,
            json,
        } => show(&repository, &run_id, history, json).await,
    }
}

async fn list(repository: &FileRunStateRepository) -> Result<()> {
    let run_ids = repository.list_runs().await.context("Failed to list runs")?;
    if run_ids.is_empty() {
        println!("No runs recorded in {}", repository.base_path().display());
        return Ok(());
    }

    let header = format!(
        "{:<38} {:<24} {:>6}  {}",
        "RUN ID", "STATUS", "ROUND", "MISSION"
    );
    println!("{}", header.bold());
    for run_id in run_ids {
        match repository.load(&run_id).await {
            Ok(Some(state)) => println!("{}", render_list_line(&state)),
            Ok(None) => println!("{:<38} {}", run_id, "(no rounds)".dimmed()),
            Err(e) => println!("{:<38} {}", run_id, format!("unreadable: {}", e).red()),
        }
    }
    Ok(())
}

async fn show(
    repository: &FileRunStateRepository,
    run_id: &str,
    history: bool,
    json: bool,
) -> Result<()> {
    let run_id = RunId::new(run_id).context("Invalid run id")?;

    if history {
        let records = repository.history(&run_id).await.context("Failed to read run history")?;
        if records.is_empty() {
            anyhow::bail!("Run {} not found", run_id);
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            for record in &records {
                print!("{}", render_round(record));
            }
        }
        return Ok(());
    }

    let state = repository
        .load(&run_id)
        .await
        .context("Failed to load run")?
        .with_context(|| format!("Run {} not found", run_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_state(&state));
    }
    Ok(())
}

fn colored_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => status.as_str().green().to_string(),
        RunStatus::Failed => status.as_str().red().to_string(),
        _ => status.as_str().yellow().to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max {
        return first_line.to_string();
    }
    let mut out: String = first_line.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn render_list_line(state: &RunState) -> String {
    format!(
        "{:<38} {:<24} {:>6}  {}",
        state.run_id.as_str(),
        colored_status(state.status),
        state.round_number,
        truncate(&state.mission, 60)
    )
}

pub fn render_state(state: &RunState) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Run:".bold(), state.run_id));
    out.push_str(&format!("  Mission: {}\n", state.mission));
    out.push_str(&format!("  Status: {}\n", colored_status(state.status)));
    out.push_str(&format!("  Round: {}\n", state.round_number));
    out.push_str(&format!("  Started: {}\n", state.started_at.to_rfc3339()));
    if let Some(completed_at) = state.completed_at {
        out.push_str(&format!("  Completed: {}\n", completed_at.to_rfc3339()));
    }
    if let Some(error) = &state.error {
        out.push_str(&format!("  Error: {}\n", error.to_string().red()));
    }
    if let Some(summary) = &state.last_summary {
        out.push_str(&format!("  Last summary: {}\n", summary));
    }

    if !state.results.is_empty() {
        out.push_str(&format!("\n{}\n", "Results (last round):".bold()));
        for result in &state.results {
            let marker = if result.success { "✓".green() } else { "✗".red() };
            out.push_str(&format!(
                "  {} {} [{}] {}\n",
                marker,
                result.task_id,
                result.status,
                truncate(result.error.as_deref().unwrap_or(&result.output), 80)
            ));
        }
    }

    if !state.memory.is_empty() {
        out.push_str(&format!("\n{}\n", "Round summaries:".bold()));
        for entry in &state.memory {
            out.push_str(&format!(
                "  #{} ({} ok, {} failed): {}\n",
                entry.round,
                entry.succeeded,
                entry.failed,
                truncate(&entry.summary, 80)
            ));
        }
    }
    out
}

fn render_round(record: &RoundRecord) -> String {
    format!(
        "{} round {} at {}: {} ({} tasks, {} results)\n",
        "•".bold(),
        record.round_number,
        record.recorded_at.to_rfc3339(),
        colored_status(record.state.status),
        record.state.tasks.len(),
        record.state.results.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::domain::errors::FailureKind;

    fn state() -> RunState {
        colored::control::set_override(false);
        RunState::new(
            RunId::new("r1").unwrap(),
            "audit the repository\nthen fix it",
        )
    }

    #[test]
    fn test_list_line_uses_first_mission_line() {
        let line = render_list_line(&state());
        assert!(line.starts_with("r1"));
        assert!(line.contains("running"));
        assert!(line.ends_with("audit the repository"));
    }

    #[test]
    fn test_state_render_includes_failure() {
        let mut state = state();
        state.begin_round();
        state.fail(FailureKind::ConsolidationFailure, "judge unavailable");

        let text = render_state(&state);
        assert!(text.contains("Status: failed"));
        assert!(text.contains("consolidation_failure: judge unavailable"));
        assert!(text.contains("Completed:"));
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[tokio::test]
    async fn test_show_reads_file_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let repository = FileRunStateRepository::open(dir.path()).await.unwrap();
        let state = state();
        repository.persist(&state.run_id, 0, &state).await.unwrap();

        assert!(show(&repository, "r1", false, true).await.is_ok());
        assert!(show(&repository, "r1", true, false).await.is_ok());
        assert!(show(&repository, "missing", false, false).await.is_err());
        assert!(show(&repository, "../etc", false, false).await.is_err());
    }
}
