// Copyright (c) 2026 Conclave Contributors
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Round orchestration defaults (worker pool size, round limit)
// - Sub-agent wall-clock ceiling
// - Event bus capacity
// - Round state storage backend
// - Logging

use crate::domain::repository::StorageBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "conclave.dev/v1";
pub const KIND: &str = "OrchestratorConfig";
pub const CONFIG_PATH_ENV: &str = "CONCLAVE_CONFIG_PATH";

/// Top-level configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfigManifest {
    /// API version (must be "conclave.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: OrchestratorConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrchestratorConfigSpec {
    #[serde(default)]
    pub orchestrator: RoundSettings,

    #[serde(default)]
    pub subagent: SubAgentSettings,

    #[serde(default)]
    pub event_bus: EventBusSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSettings {
    /// Pool workers consuming each round's tasks
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Safety limit on Plan/Dispatch/Execute/Consolidate cycles per run
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentSettings {
    /// Budget applied when a delegation does not carry its own timeout
    #[serde(default = "default_subagent_timeout", with = "humantime_serde")]
    pub default_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusSettings {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_kind")]
    pub backend: StorageKind,

    /// Directory holding persisted rounds (file backend only)
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_worker_count() -> usize {
    4
}

fn default_max_rounds() -> u32 {
    3
}

fn default_subagent_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_event_capacity() -> usize {
    1024
}

fn default_storage_kind() -> StorageKind {
    StorageKind::File
}

fn default_storage_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".conclave").join("runs"))
        .unwrap_or_else(|| PathBuf::from(".conclave/runs"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl Default for SubAgentSettings {
    fn default() -> Self {
        Self {
            default_timeout: default_subagent_timeout(),
        }
    }
}

impl Default for EventBusSettings {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_kind(),
            path: default_storage_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl StorageSettings {
    pub fn backend(&self) -> StorageBackend {
        match self.backend {
            StorageKind::Memory => StorageBackend::InMemory,
            StorageKind::File => StorageBackend::File {
                path: self.resolved_path(),
            },
        }
    }

    /// Storage path with a leading `~` expanded to the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~") {
            Ok(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => self.path.clone(),
            },
            Err(_) => self.path.clone(),
        }
    }
}

impl Default for OrchestratorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "conclave".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorConfigSpec::default(),
        }
    }
}

impl OrchestratorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate configuration paths in precedence order
    /// 1. CONCLAVE_CONFIG_PATH environment variable
    /// 2. ./conclave-config.yaml (working directory)
    /// 3. ~/.conclave/config.yaml (user home)
    /// 4. /etc/conclave/config.yaml (system, Unix) or C:\ProgramData\Conclave\config.yaml (Windows)
    pub fn discovery_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }

        paths.push(PathBuf::from("./conclave-config.yaml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".conclave").join("config.yaml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/conclave/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\Conclave\\config.yaml"));

        paths
    }

    pub fn discover_config() -> Option<PathBuf> {
        Self::discovery_paths()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!(
                "Loading configuration from discovered path: {:?}",
                config_path
            );
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!(
                "No configuration file found in standard locations. Using defaults."
            );
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CONCLAVE_WORKER_COUNT") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: CONCLAVE_WORKER_COUNT={}", n);
                    self.spec.orchestrator.worker_count = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid CONCLAVE_WORKER_COUNT '{}': expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONCLAVE_MAX_ROUNDS") {
            match val.parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: CONCLAVE_MAX_ROUNDS={}", n);
                    self.spec.orchestrator.max_rounds = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid CONCLAVE_MAX_ROUNDS '{}': expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONCLAVE_SUBAGENT_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(d) => {
                    tracing::info!("Environment override: CONCLAVE_SUBAGENT_TIMEOUT={}", val);
                    self.spec.subagent.default_timeout = d;
                }
                Err(_) => tracing::warn!(
                    "Invalid CONCLAVE_SUBAGENT_TIMEOUT '{}': expected a duration like '90s'.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONCLAVE_STORAGE_PATH") {
            tracing::info!("Environment override: CONCLAVE_STORAGE_PATH={}", val);
            self.spec.storage.path = PathBuf::from(val);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name must not be empty");
        }

        if self.spec.orchestrator.worker_count == 0 {
            anyhow::bail!("spec.orchestrator.worker_count must be at least 1");
        }

        if self.spec.orchestrator.max_rounds == 0 {
            anyhow::bail!("spec.orchestrator.max_rounds must be at least 1");
        }

        if self.spec.subagent.default_timeout.is_zero() {
            anyhow::bail!("spec.subagent.default_timeout must be greater than zero");
        }

        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be at least 1");
        }

        if !matches!(self.spec.observability.log_format.as_str(), "compact" | "json") {
            anyhow::bail!(
                "Invalid observability.log_format: '{}'. Expected 'compact' or 'json'",
                self.spec.observability.log_format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = OrchestratorConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.orchestrator.worker_count, 4);
        assert_eq!(manifest.spec.orchestrator.max_rounds, 3);
        assert_eq!(
            manifest.spec.subagent.default_timeout,
            Duration::from_secs(600)
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_partial_spec() {
        let yaml = r#"
apiVersion: conclave.dev/v1
kind: OrchestratorConfig
metadata:
  name: dev
spec:
  orchestrator:
    worker_count: 8
  subagent:
    default_timeout: 90s
  storage:
    backend: memory
"#;
        let manifest = OrchestratorConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.orchestrator.worker_count, 8);
        assert_eq!(manifest.spec.orchestrator.max_rounds, 3);
        assert_eq!(
            manifest.spec.subagent.default_timeout,
            Duration::from_secs(90)
        );
        assert_eq!(manifest.spec.storage.backend(), StorageBackend::InMemory);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conclave-config.yaml");

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.spec.orchestrator.max_rounds = 5;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = OrchestratorConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.orchestrator.max_rounds, 5);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let result = OrchestratorConfigManifest::load_or_default(Some(missing));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = OrchestratorConfigManifest::default();
        manifest.api_version = "v0".to_string();
        assert!(manifest.validate().is_err());

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.spec.orchestrator.worker_count = 0;
        assert!(manifest.validate().is_err());

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.spec.subagent.default_timeout = Duration::ZERO;
        assert!(manifest.validate().is_err());

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.spec.observability.log_format = "xml".to_string();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut manifest = OrchestratorConfigManifest::default();
        manifest.apply_overrides(|key| match key {
            "CONCLAVE_WORKER_COUNT" => Some("2".to_string()),
            "CONCLAVE_MAX_ROUNDS" => Some("not-a-number".to_string()),
            "CONCLAVE_SUBAGENT_TIMEOUT" => Some("45s".to_string()),
            "CONCLAVE_STORAGE_PATH" => Some("/tmp/conclave-runs".to_string()),
            _ => None,
        });

        assert_eq!(manifest.spec.orchestrator.worker_count, 2);
        assert_eq!(manifest.spec.orchestrator.max_rounds, 3);
        assert_eq!(
            manifest.spec.subagent.default_timeout,
            Duration::from_secs(45)
        );
        assert_eq!(
            manifest.spec.storage.path,
            PathBuf::from("/tmp/conclave-runs")
        );
    }

    #[test]
    fn test_storage_path_expands_home() {
        let mut storage = StorageSettings::default();
        storage.path = PathBuf::from("/var/lib/conclave");
        assert_eq!(storage.resolved_path(), PathBuf::from("/var/lib/conclave"));

        storage.path = PathBuf::from("~/.conclave/runs");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(storage.resolved_path(), home.join(".conclave").join("runs"));
        }
    }
}
