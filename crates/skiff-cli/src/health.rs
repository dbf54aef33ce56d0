//! Daemon liveness endpoints

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Serve `GET /healthz` and `GET /version` until the shutdown flag flips.
///
/// A bind failure is logged and the daemon keeps running without the
/// endpoint; the watch loops do not depend on it.
pub async fn serve(addr: String, mut shutdown: watch::Receiver<bool>) {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/version", get(version));

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(error) => {
            warn!(%addr, %error, "health endpoint failed to bind");
            return;
        }
    };

    info!(%addr, "health endpoint listening");

    let served = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
    });
    if let Err(error) = served.await {
        warn!(%error, "health endpoint stopped");
    }
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "name": "skiff",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_version_payload() {
        let Json(value) = version().await;
        assert_eq!(value["name"], "skiff");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_serve_stops_when_shutdown_flips() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(serve("127.0.0.1:0".to_string(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_serve_survives_unbindable_addr() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        // Not a parseable socket address, so bind fails and serve returns
        serve("definitely-not-an-addr".to_string(), shutdown_rx).await;
    }
}
