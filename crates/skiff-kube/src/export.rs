//! Declarative manifest export
//!
//! Writes the filtered source objects to disk as applyable YAML, one file
//! per object under `<dir>/<namespace>/`. Typed objects do not carry their
//! own `apiVersion`/`kind`, so the sink injects them.

use std::fs;
use std::path::{Path, PathBuf};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::error::{KubeError, Result};
use crate::sync::filter::strip_export_annotations;

/// Writes manifests under one export directory
#[derive(Debug, Clone)]
pub struct ExportSink {
    dir: PathBuf,
}

impl ExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory manifests are written under
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a service manifest to `<dir>/<namespace>/<name>-service.yaml`
    pub fn write_service(&self, namespace: &str, svc: &Service) -> Result<PathBuf> {
        let mut svc = svc.clone();
        strip_export_annotations(&mut svc.metadata);
        let name = svc
            .metadata
            .name
            .clone()
            .ok_or(KubeError::MissingName { kind: "service" })?;
        self.write(namespace, &name, "service", "v1", "Service", &svc)
    }

    /// Write a workload manifest to `<dir>/<namespace>/<name>-deployment.yaml`
    pub fn write_workload(&self, namespace: &str, dp: &Deployment) -> Result<PathBuf> {
        let mut dp = dp.clone();
        strip_export_annotations(&mut dp.metadata);
        let name = dp
            .metadata
            .name
            .clone()
            .ok_or(KubeError::MissingName { kind: "workload" })?;
        self.write(namespace, &name, "deployment", "apps/v1", "Deployment", &dp)
    }

    fn write<T: Serialize>(
        &self,
        namespace: &str,
        name: &str,
        suffix: &str,
        api_version: &str,
        kind: &str,
        obj: &T,
    ) -> Result<PathBuf> {
        let mut value = serde_json::to_value(obj)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("apiVersion".to_string(), json!(api_version));
            map.insert("kind".to_string(), json!(kind));
        }
        let yaml = serde_yaml::to_string(&value)?;

        let dir = self.dir.join(namespace);
        fs::create_dir_all(&dir)
            .map_err(|e| KubeError::Export(format!("{}: {e}", dir.display())))?;

        let path = dir.join(format!("{name}-{suffix}.yaml"));
        fs::write(&path, yaml)
            .map_err(|e| KubeError::Export(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "exported manifest");
        Ok(path)
    }
}
