//! One-shot batch reconciliation

use std::path::Path;

use skiff_core::{ResourceKind, SyncConfig};
use skiff_kube::{ClusterClient, ExportSink, SyncEngine};
use tracing::info;

use crate::display::SyncRenderer;
use crate::error::Result;

pub async fn run(
    mut config: SyncConfig,
    src_kubeconfig: Option<&Path>,
    src_namespace: Option<&str>,
    dst_kubeconfig: Option<&Path>,
    dst_namespace: Option<&str>,
    kinds: &[String],
    export: bool,
    export_dir: Option<&Path>,
) -> Result<()> {
    if let Some(path) = src_kubeconfig {
        config.source.kubeconfig = Some(path.to_path_buf());
    }
    if let Some(namespace) = src_namespace {
        config.source.namespace = Some(namespace.to_string());
    }
    if let Some(path) = dst_kubeconfig {
        config.destination.kubeconfig = Some(path.to_path_buf());
    }
    if let Some(namespace) = dst_namespace {
        config.destination.namespace = Some(namespace.to_string());
    }
    if !kinds.is_empty() {
        config.kinds = super::parse_kinds(kinds)?;
    }
    if export {
        config.export.enabled = true;
    }
    if let Some(dir) = export_dir {
        config.export.dir = dir.to_path_buf();
    }

    config.validate_for_sync()?;
    // An unset destination namespace mirrors the source one
    config.destination.namespace = config.destination_namespace();

    let source = ClusterClient::connect("source", &config.source).await?;
    let destination = ClusterClient::connect("destination", &config.destination).await?;

    let engine = if config.export.enabled {
        info!(dir = %config.export.dir.display(), "manifest export enabled");
        SyncEngine::with_export(ExportSink::new(&config.export.dir))
    } else {
        SyncEngine::new()
    };

    let mut renderer = SyncRenderer::new();
    let mut total = 0;

    for kind in &config.kinds {
        let summary = match kind {
            ResourceKind::Workload => engine.sync_workloads(&source, &destination).await?,
            ResourceKind::Service => engine.sync_services(&source, &destination).await?,
        };
        total += summary.total();
        renderer.render_pass(&kind.to_string(), &summary)?;
    }

    renderer.render_footer(total)?;
    Ok(())
}
