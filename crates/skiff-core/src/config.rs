//! Sync configuration management
//!
//! Stores configuration in `~/.config/skiff/config.yaml`. Every value here
//! can also be set (and overridden) by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::kind::ResourceKind;

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Source cluster, the one being watched or listed
    #[serde(default)]
    pub source: ClusterConfig,

    /// Destination cluster, converged toward the source
    #[serde(default)]
    pub destination: ClusterConfig,

    /// Resource kinds to synchronize
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ResourceKind>,

    /// Manifest export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

fn default_api_version() -> String {
    "skiff.dev/v1".to_string()
}

fn default_kinds() -> Vec<ResourceKind> {
    ResourceKind::all()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            source: ClusterConfig::default(),
            destination: ClusterConfig::default(),
            kinds: default_kinds(),
            export: ExportConfig::default(),
            daemon: DaemonConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("skiff").join("config.yaml"))
    }

    /// Validate the fields a sync pass depends on
    ///
    /// The source namespace has no sensible default: syncing the wrong
    /// namespace deletes real objects, so its absence is an error.
    pub fn validate_for_sync(&self) -> Result<()> {
        match self.source.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => Ok(()),
            _ => Err(CoreError::MissingField {
                field: "source.namespace".to_string(),
            }),
        }
    }

    /// Destination namespace, defaulting to the source namespace
    pub fn destination_namespace(&self) -> Option<String> {
        self.destination
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.source.namespace.clone())
    }
}

/// Connection settings for one cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Kubeconfig path; when unset the client config is inferred
    /// (KUBECONFIG, default kubeconfig, then in-cluster)
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to operate in
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Manifest export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Write every synced source object as a YAML manifest
    #[serde(default)]
    pub enabled: bool,

    /// Directory manifests are written under, one file per object
    /// at `<dir>/<namespace>/<name>-<kind>.yaml`
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("yaml")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_export_dir(),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Address the liveness endpoint listens on
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

fn default_health_addr() -> String {
    "127.0.0.1:8086".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            health_addr: default_health_addr(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Log level filter, overridden by SKIFF_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.api_version, "skiff.dev/v1");
        assert_eq!(config.kinds, vec![ResourceKind::Workload, ResourceKind::Service]);
        assert!(!config.export.enabled);
        assert_eq!(config.export.dir, PathBuf::from("yaml"));
        assert_eq!(config.daemon.health_addr, "127.0.0.1:8086");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let yaml = "source:\n  namespace: demo\n";
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.namespace.as_deref(), Some("demo"));
        assert_eq!(config.kinds, ResourceKind::all());
        assert_eq!(config.export.dir, PathBuf::from("yaml"));
    }

    #[test]
    fn test_roundtrip() {
        let mut config = SyncConfig::default();
        config.source.namespace = Some("demo".to_string());
        config.destination.namespace = Some("demo-mirror".to_string());
        config.kinds = vec![ResourceKind::Service];

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SyncConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.source.namespace.as_deref(), Some("demo"));
        assert_eq!(parsed.kinds, vec![ResourceKind::Service]);
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = SyncConfig::default();
        config.source.namespace = Some("demo".to_string());
        config.save_to(&path).unwrap();

        let loaded = SyncConfig::load_from(&path).unwrap();
        assert_eq!(loaded.source.namespace.as_deref(), Some("demo"));
    }

    #[test]
    fn test_validate_requires_source_namespace() {
        let mut config = SyncConfig::default();
        assert!(config.validate_for_sync().is_err());

        config.source.namespace = Some(String::new());
        assert!(config.validate_for_sync().is_err());

        config.source.namespace = Some("demo".to_string());
        assert!(config.validate_for_sync().is_ok());
    }

    #[test]
    fn test_destination_namespace_falls_back_to_source() {
        let mut config = SyncConfig::default();
        config.source.namespace = Some("demo".to_string());
        assert_eq!(config.destination_namespace().as_deref(), Some("demo"));

        config.destination.namespace = Some("demo-mirror".to_string());
        assert_eq!(config.destination_namespace().as_deref(), Some("demo-mirror"));
    }
}
