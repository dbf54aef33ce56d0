//! Cluster connection handling
//!
//! A `ClusterClient` wraps a kube client together with the namespace it
//! operates in and a label ("source", "destination") carried into logs and
//! errors.

use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, warn};

use skiff_core::ClusterConfig;

use crate::error::{KubeError, Result};

/// A connected cluster, scoped to one namespace
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    cluster: String,
    namespace: String,
}

impl ClusterClient {
    /// Connect to the cluster described by `config`
    ///
    /// An explicit kubeconfig path wins. Otherwise the client config is
    /// inferred: `KUBECONFIG`, then the default kubeconfig, then the
    /// in-cluster service account.
    pub async fn connect(cluster: &str, config: &ClusterConfig) -> Result<Self> {
        let kube_config = match &config.kubeconfig {
            Some(path) => config_from_path(path).await?,
            None => Config::infer().await.map_err(|e| KubeError::Connect {
                cluster: cluster.to_string(),
                message: e.to_string(),
            })?,
        };

        let namespace = match config.namespace.clone().filter(|ns| !ns.is_empty()) {
            Some(ns) => ns,
            None => {
                let ns = kube_config.default_namespace.clone();
                warn!(cluster, namespace = %ns, "no namespace configured, using client default");
                ns
            }
        };

        let client = Client::try_from(kube_config).map_err(|e| KubeError::Connect {
            cluster: cluster.to_string(),
            message: e.to_string(),
        })?;

        debug!(cluster, namespace = %namespace, "connected");

        Ok(Self {
            client,
            cluster: cluster.to_string(),
            namespace,
        })
    }

    /// Label this client was connected under ("source", "destination")
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Namespace this client operates in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return the same connection scoped to a different namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The underlying kube client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Version of the API server, logged at daemon startup
    pub async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    /// Namespaced Deployment API
    pub fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Namespaced Service API
    pub fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

async fn config_from_path(path: &Path) -> Result<Config> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| KubeError::Kubeconfig {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| KubeError::Kubeconfig {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
