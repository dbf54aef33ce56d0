//! Typed resource operations against a cluster
//!
//! `ResourceOps` is the seam between the sync engine and the API server:
//! the engine plans against two implementations of this trait, and tests
//! swap in [`crate::mock::MockCluster`] without a cluster.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, ListParams, PostParams};

use crate::client::ClusterClient;
use crate::error::{KubeError, Result};

/// List, create, update and delete one resource kind in one namespace
#[async_trait]
pub trait ResourceOps<K>: Send + Sync {
    /// Namespace the operations are scoped to
    fn namespace(&self) -> &str;

    /// All objects of the kind in the namespace
    async fn list_all(&self) -> Result<Vec<K>>;

    /// Create `obj` in the namespace
    async fn create(&self, obj: &K) -> Result<()>;

    /// Replace the object named `name` with `obj`
    async fn update(&self, name: &str, obj: &K) -> Result<()>;

    /// Delete the object named `name`
    async fn delete(&self, name: &str) -> Result<()>;
}

#[async_trait]
impl ResourceOps<Service> for ClusterClient {
    fn namespace(&self) -> &str {
        self.namespace()
    }

    async fn list_all(&self) -> Result<Vec<Service>> {
        let list = self
            .services()
            .list(&ListParams::default())
            .await
            .map_err(|e| KubeError::List {
                kind: "service",
                namespace: self.namespace().to_string(),
                source: e,
            })?;
        Ok(list.items)
    }

    async fn create(&self, obj: &Service) -> Result<()> {
        let name = object_name(obj.metadata.name.as_deref(), "service")?;
        self.services()
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| op_error("create", "service", name, e))?;
        Ok(())
    }

    async fn update(&self, name: &str, obj: &Service) -> Result<()> {
        self.services()
            .replace(name, &PostParams::default(), obj)
            .await
            .map_err(|e| op_error("update", "service", name, e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.services()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| op_error("delete", "service", name, e))?;
        Ok(())
    }
}

#[async_trait]
impl ResourceOps<Deployment> for ClusterClient {
    fn namespace(&self) -> &str {
        self.namespace()
    }

    async fn list_all(&self) -> Result<Vec<Deployment>> {
        let list = self
            .deployments()
            .list(&ListParams::default())
            .await
            .map_err(|e| KubeError::List {
                kind: "workload",
                namespace: self.namespace().to_string(),
                source: e,
            })?;
        Ok(list.items)
    }

    async fn create(&self, obj: &Deployment) -> Result<()> {
        let name = object_name(obj.metadata.name.as_deref(), "workload")?;
        self.deployments()
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| op_error("create", "workload", name, e))?;
        Ok(())
    }

    async fn update(&self, name: &str, obj: &Deployment) -> Result<()> {
        self.deployments()
            .replace(name, &PostParams::default(), obj)
            .await
            .map_err(|e| op_error("update", "workload", name, e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.deployments()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| op_error("delete", "workload", name, e))?;
        Ok(())
    }
}

fn object_name<'a>(name: Option<&'a str>, kind: &'static str) -> Result<&'a str> {
    name.ok_or(KubeError::MissingName { kind })
}

fn op_error(verb: &'static str, kind: &'static str, name: &str, source: kube::Error) -> KubeError {
    KubeError::Operation {
        verb,
        kind,
        name: name.to_string(),
        source,
    }
}
