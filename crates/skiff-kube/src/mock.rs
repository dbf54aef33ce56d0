//! Mock cluster for testing
//!
//! Stores services and workloads in memory, useful for unit tests
//! without requiring a Kubernetes cluster. Also provides a recording
//! event handler for controller tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

use crate::controller::handler::{EventHandler, Notification};
use crate::error::{KubeError, Result};
use crate::ops::ResourceOps;

/// One recorded API call, for test assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRecord {
    pub verb: &'static str,
    pub kind: &'static str,
    pub name: String,
}

/// In-memory cluster for testing
#[derive(Clone)]
pub struct MockCluster {
    namespace: String,
    services: Arc<RwLock<BTreeMap<String, Service>>>,
    deployments: Arc<RwLock<BTreeMap<String, Deployment>>>,
    /// Every API call in order, for assertions
    operations: Arc<RwLock<Vec<OpRecord>>>,
    /// (verb, name) pairs whose calls fail with an injected API error
    failures: Arc<RwLock<HashSet<(String, String)>>>,
}

impl MockCluster {
    /// Create a new empty mock cluster scoped to `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            services: Arc::new(RwLock::new(BTreeMap::new())),
            deployments: Arc::new(RwLock::new(BTreeMap::new())),
            operations: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Seed services, keyed by metadata name (nameless objects are skipped)
    pub fn with_services(self, services: Vec<Service>) -> Self {
        {
            let mut store = self.services.write().unwrap();
            for svc in services {
                if let Some(name) = svc.metadata.name.clone() {
                    store.insert(name, svc);
                }
            }
        }
        self
    }

    /// Seed workloads, keyed by metadata name (nameless objects are skipped)
    pub fn with_deployments(self, deployments: Vec<Deployment>) -> Self {
        {
            let mut store = self.deployments.write().unwrap();
            for dp in deployments {
                if let Some(name) = dp.metadata.name.clone() {
                    store.insert(name, dp);
                }
            }
        }
        self
    }

    /// Make every `verb` call against `name` fail with an injected API error
    ///
    /// Lists match on the name `"*"`.
    pub fn fail_on(&self, verb: &str, name: &str) {
        self.failures
            .write()
            .unwrap()
            .insert((verb.to_string(), name.to_string()));
    }

    /// Current service names, sorted
    pub fn service_names(&self) -> Vec<String> {
        self.services.read().unwrap().keys().cloned().collect()
    }

    /// Current workload names, sorted
    pub fn deployment_names(&self) -> Vec<String> {
        self.deployments.read().unwrap().keys().cloned().collect()
    }

    /// Look up a stored service
    pub fn service(&self, name: &str) -> Option<Service> {
        self.services.read().unwrap().get(name).cloned()
    }

    /// Look up a stored workload
    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        self.deployments.read().unwrap().get(name).cloned()
    }

    /// All recorded API calls in order
    pub fn operations(&self) -> Vec<OpRecord> {
        self.operations.read().unwrap().clone()
    }

    fn record(&self, verb: &'static str, kind: &'static str, name: &str) -> Result<()> {
        {
            let mut ops = self.operations.write().unwrap();
            ops.push(OpRecord {
                verb,
                kind,
                name: name.to_string(),
            });
        }

        let failures = self.failures.read().unwrap();
        if failures.contains(&(verb.to_string(), name.to_string())) {
            return Err(KubeError::Operation {
                verb,
                kind,
                name: name.to_string(),
                source: api_error(500),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceOps<Service> for MockCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_all(&self) -> Result<Vec<Service>> {
        self.record("list", "service", "*")
            .map_err(|_| KubeError::List {
                kind: "service",
                namespace: self.namespace.clone(),
                source: api_error(500),
            })?;
        Ok(self.services.read().unwrap().values().cloned().collect())
    }

    async fn create(&self, obj: &Service) -> Result<()> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or(KubeError::MissingName { kind: "service" })?;
        self.record("create", "service", &name)?;

        let mut store = self.services.write().unwrap();
        if store.contains_key(&name) {
            return Err(KubeError::Operation {
                verb: "create",
                kind: "service",
                name,
                source: api_error(409),
            });
        }
        store.insert(name, obj.clone());
        Ok(())
    }

    async fn update(&self, name: &str, obj: &Service) -> Result<()> {
        self.record("update", "service", name)?;

        let mut store = self.services.write().unwrap();
        if !store.contains_key(name) {
            return Err(KubeError::Operation {
                verb: "update",
                kind: "service",
                name: name.to_string(),
                source: api_error(404),
            });
        }
        store.insert(name.to_string(), obj.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.record("delete", "service", name)?;

        let mut store = self.services.write().unwrap();
        if store.remove(name).is_none() {
            return Err(KubeError::Operation {
                verb: "delete",
                kind: "service",
                name: name.to_string(),
                source: api_error(404),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceOps<Deployment> for MockCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_all(&self) -> Result<Vec<Deployment>> {
        self.record("list", "workload", "*")
            .map_err(|_| KubeError::List {
                kind: "workload",
                namespace: self.namespace.clone(),
                source: api_error(500),
            })?;
        Ok(self.deployments.read().unwrap().values().cloned().collect())
    }

    async fn create(&self, obj: &Deployment) -> Result<()> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or(KubeError::MissingName { kind: "workload" })?;
        self.record("create", "workload", &name)?;

        let mut store = self.deployments.write().unwrap();
        if store.contains_key(&name) {
            return Err(KubeError::Operation {
                verb: "create",
                kind: "workload",
                name,
                source: api_error(409),
            });
        }
        store.insert(name, obj.clone());
        Ok(())
    }

    async fn update(&self, name: &str, obj: &Deployment) -> Result<()> {
        self.record("update", "workload", name)?;

        let mut store = self.deployments.write().unwrap();
        if !store.contains_key(name) {
            return Err(KubeError::Operation {
                verb: "update",
                kind: "workload",
                name: name.to_string(),
                source: api_error(404),
            });
        }
        store.insert(name.to_string(), obj.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.record("delete", "workload", name)?;

        let mut store = self.deployments.write().unwrap();
        if store.remove(name).is_none() {
            return Err(KubeError::Operation {
                verb: "delete",
                kind: "workload",
                name: name.to_string(),
                source: api_error(404),
            });
        }
        Ok(())
    }
}

fn api_error(code: u16) -> kube::Error {
    let reason = match code {
        404 => "NotFound",
        409 => "AlreadyExists",
        _ => "InternalError",
    };
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "injected failure".to_string(),
        reason: reason.to_string(),
        code,
    })
}

/// Event handler that records notifications and can fail on demand
#[derive(Default)]
pub struct RecordingHandler {
    notifications: Mutex<Vec<Notification>>,
    attempts: Mutex<HashMap<String, u32>>,
    /// name -> remaining injected failures
    failures: Mutex<HashMap<String, u32>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` deliveries for `name`, then succeed
    pub fn fail_times(&self, name: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), times);
    }

    /// Notifications delivered so far, in order
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// How many times a delivery was attempted for `name`
    pub fn attempts(&self, name: &str) -> u32 {
        self.attempts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, notification: &Notification) -> Result<()> {
        {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts.entry(notification.name.clone()).or_insert(0) += 1;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&notification.name)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(KubeError::Handler(format!(
                    "injected failure for {}",
                    notification.name
                )));
            }
        }

        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_seeded_names() {
        let cluster = MockCluster::new("demo")
            .with_services(vec![service("web"), service("api")]);

        assert_eq!(cluster.service_names(), vec!["api", "web"]);
        assert!(cluster.deployment_names().is_empty());
    }

    #[tokio::test]
    async fn test_mock_records_operations() {
        let cluster = MockCluster::new("demo");

        cluster.create(&service("web")).await.unwrap();
        cluster.update("web", &service("web")).await.unwrap();
        ResourceOps::<Service>::delete(&cluster, "web").await.unwrap();

        let verbs: Vec<&str> = cluster.operations().iter().map(|op| op.verb).collect();
        assert_eq!(verbs, vec!["create", "update", "delete"]);
    }

    #[tokio::test]
    async fn test_mock_create_duplicate_fails() {
        let cluster = MockCluster::new("demo").with_services(vec![service("web")]);

        let result = cluster.create(&service("web")).await;
        assert!(result.unwrap_err().is_already_exists());
    }

    #[tokio::test]
    async fn test_mock_delete_missing_fails() {
        let cluster = MockCluster::new("demo");

        let result = ResourceOps::<Service>::delete(&cluster, "ghost").await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mock_fail_on() {
        let cluster = MockCluster::new("demo");
        cluster.fail_on("create", "web");

        let result = cluster.create(&service("web")).await;
        assert!(matches!(result, Err(KubeError::Operation { verb: "create", .. })));

        // The failing call is still recorded
        assert_eq!(cluster.operations().len(), 1);
    }

    #[test]
    fn test_recording_handler_fails_then_succeeds() {
        let handler = RecordingHandler::new();
        handler.fail_times("web", 2);

        let notification = Notification {
            namespace: "demo".to_string(),
            kind: "service".to_string(),
            component: String::new(),
            host: String::new(),
            reason: "create".to_string(),
            status: crate::controller::handler::Severity::Normal,
            name: "web".to_string(),
        };

        assert!(handler.handle(&notification).is_err());
        assert!(handler.handle(&notification).is_err());
        assert!(handler.handle(&notification).is_ok());

        assert_eq!(handler.attempts("web"), 3);
        assert_eq!(handler.notifications().len(), 1);
    }
}
