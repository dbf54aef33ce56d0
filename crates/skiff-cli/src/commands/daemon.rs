//! Watch-driven daemon

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use kube::runtime::{WatchStreamExt, watcher};
use skiff_core::{ResourceKind, SyncConfig};
use skiff_kube::{
    ClusterClient, Controller, ControllerOptions, EventHandler, LogHandler, WatchedResource,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{CliError, Result};
use crate::health;

/// How long a stopping daemon waits for its controllers to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(
    mut config: SyncConfig,
    src_kubeconfig: Option<&Path>,
    namespace: Option<&str>,
    kinds: &[String],
    health_addr: Option<&str>,
    handler_name: &str,
) -> Result<()> {
    if let Some(path) = src_kubeconfig {
        config.source.kubeconfig = Some(path.to_path_buf());
    }
    if let Some(namespace) = namespace {
        config.source.namespace = Some(namespace.to_string());
    }
    if !kinds.is_empty() {
        config.kinds = super::parse_kinds(kinds)?;
    }
    if let Some(addr) = health_addr {
        config.daemon.health_addr = addr.to_string();
    }

    config.validate_for_sync()?;

    let mut handler = handler_for(handler_name)?;
    handler.init(&config)?;
    let handler: Arc<dyn EventHandler> = Arc::from(handler);

    let client = ClusterClient::connect("source", &config.source).await?;
    match client.server_version().await {
        Ok(version) => info!(version, "connected to Kubernetes"),
        Err(error) => warn!(%error, "could not read the server version"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks: Vec<(String, JoinHandle<()>)> = Vec::new();
    tasks.push((
        "health".to_string(),
        tokio::spawn(health::serve(
            config.daemon.health_addr.clone(),
            shutdown_rx.clone(),
        )),
    ));

    // One started_at shared by every controller, so restarts suppress the
    // same set of pre-existing creates
    let started_at = Utc::now();
    let options = || ControllerOptions {
        started_at,
        ..ControllerOptions::default()
    };

    let namespace = client.namespace().to_string();
    for kind in &config.kinds {
        let task = match kind {
            ResourceKind::Service => spawn_controller(
                Controller::<Service>::new(&namespace, Arc::clone(&handler), options()),
                client.services(),
                shutdown_rx.clone(),
            ),
            ResourceKind::Workload => spawn_controller(
                Controller::<Deployment>::new(&namespace, Arc::clone(&handler), options()),
                client.deployments(),
                shutdown_rx.clone(),
            ),
        };
        tasks.push((kind.to_string(), task));
    }

    info!(
        namespace,
        kinds = %join_kinds(&config.kinds),
        handler = handler_name,
        "daemon started"
    );

    shutdown_signal().await;
    info!("signal received, shutting down");
    let _ = shutdown_tx.send(true);

    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    for (label, task) in tasks {
        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(task = label, %error, "task panicked"),
            Err(_) => warn!(task = label, "task did not stop within the shutdown grace period"),
        }
    }

    handler.teardown();
    info!("daemon stopped");
    Ok(())
}

/// Look up a notification handler by name
fn handler_for(name: &str) -> Result<Box<dyn EventHandler>> {
    match name {
        "log" | "default" => Ok(Box::new(LogHandler)),
        other => Err(CliError::config_with_help(
            format!("unknown handler: {}", other),
            "available handlers: log",
        )),
    }
}

/// Run one controller over a backoff-wrapped watch of `api`.
///
/// A controller that dies takes its kind's notifications with it but
/// leaves the rest of the daemon running, so the failure is logged here
/// rather than propagated.
fn spawn_controller<K>(
    controller: Controller<K>,
    api: Api<K>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: WatchedResource,
{
    tokio::spawn(async move {
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        let resource = K::kind_label();
        match controller.run(stream, shutdown).await {
            Ok(()) => info!(resource, "controller stopped"),
            Err(error) => error!(resource, %error, "controller stopped"),
        }
    })
}

fn join_kinds(kinds: &[ResourceKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve on SIGINT, or SIGTERM where available
async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let Ok(mut terminate) = signal(SignalKind::terminate()) else {
            let _ = interrupt.await;
            return;
        };
        tokio::select! {
            _ = interrupt => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = interrupt.await;
    }
}
