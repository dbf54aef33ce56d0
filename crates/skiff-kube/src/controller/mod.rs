//! Watch-driven controller
//!
//! One controller owns one watch stream for one kind in one namespace.
//! An ingest task folds the raw stream into a last-known-state store and
//! classified [`ChangeEvent`]s on a coalescing queue; a worker pops
//! events, renders notifications and delivers them through the handler,
//! with failed deliveries retried under the queue's backoff policy.

pub mod event;
pub mod handler;
pub mod queue;

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Resource;
use kube::runtime::watcher;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use skiff_core::split_key;

use crate::controller::event::{ChangeEvent, EventType};
use crate::controller::handler::{EventHandler, Notification, classify};
use crate::controller::queue::{
    BackoffPolicy, DEFAULT_MAX_RETRIES, ExponentialBackoff, FailOutcome, WorkQueue,
};
use crate::error::{KubeError, Result};

/// A kind the controller can watch
pub trait WatchedResource:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static
{
    /// Label carried into notifications ("service", "workload")
    fn kind_label() -> &'static str;

    /// Component field for notifications
    fn component(&self) -> Option<String> {
        None
    }

    /// Host field for notifications
    fn host(&self) -> Option<String> {
        None
    }

    fn creation_timestamp(&self) -> Option<DateTime<Utc>>;
}

impl WatchedResource for Service {
    fn kind_label() -> &'static str {
        "service"
    }

    fn component(&self) -> Option<String> {
        self.spec.as_ref().and_then(|s| s.type_.clone())
    }

    fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }
}

impl WatchedResource for Deployment {
    fn kind_label() -> &'static str {
        "workload"
    }

    fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }
}

/// Tunables for a controller instance
pub struct ControllerOptions {
    /// Creates for objects older than this instant are suppressed, so a
    /// daemon restart does not replay the whole namespace
    pub started_at: DateTime<Utc>,

    pub max_retries: u32,

    pub backoff: Arc<dyn BackoffPolicy>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Arc::new(ExponentialBackoff::default()),
        }
    }
}

/// Watch-driven controller for one resource kind in one namespace
pub struct Controller<K: WatchedResource> {
    namespace: String,
    handler: Arc<dyn EventHandler>,
    queue: WorkQueue<ChangeEvent<K>>,
    store: Arc<RwLock<HashMap<String, K>>>,
    started_at: DateTime<Utc>,
}

impl<K: WatchedResource> Controller<K> {
    pub fn new(
        namespace: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            handler,
            queue: WorkQueue::new(options.max_retries, options.backoff),
            store: Arc::new(RwLock::new(HashMap::new())),
            started_at: options.started_at,
        }
    }

    /// Number of objects in the last-known-state store
    pub fn tracked(&self) -> usize {
        self.store.read().unwrap().len()
    }

    /// Consume the watch stream until it ends or `shutdown` flips
    ///
    /// The daemon passes `watcher(api, Config::default()).default_backoff()`;
    /// tests pass synthetic streams. Fails with [`KubeError::CacheSync`]
    /// when the stream ends, or shutdown arrives, before the first full
    /// listing lands.
    pub async fn run<S>(&self, stream: S, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        S: Stream<Item = std::result::Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
    {
        let (synced_tx, mut synced_rx) = watch::channel(false);

        let ingest = tokio::spawn(ingest_events(
            stream,
            self.queue.clone(),
            Arc::clone(&self.store),
            self.namespace.clone(),
            synced_tx,
        ));

        info!(
            resource = K::kind_label(),
            namespace = %self.namespace,
            "controller starting, waiting for initial sync"
        );

        let synced = tokio::select! {
            result = synced_rx.wait_for(|s| *s) => result.is_ok(),
            _ = wait_true(&mut shutdown) => false,
        };
        if !synced {
            self.queue.shut_down();
            ingest.abort();
            return Err(KubeError::CacheSync {
                resource: K::kind_label(),
            });
        }

        info!(resource = K::kind_label(), "controller synced and ready");

        loop {
            tokio::select! {
                biased;
                _ = wait_true(&mut shutdown) => break,
                item = self.queue.next() => {
                    let Some(event) = item else { break };
                    debug!(key = %event.key, event_type = %event.event_type, "processing event");
                    match self.process(&event) {
                        Ok(()) => self.queue.forget(&event.key),
                        Err(e) => match self.queue.fail(event.clone()) {
                            FailOutcome::Requeued { attempt } => {
                                warn!(attempt, error = %e, "processing {} failed (will retry)", event.key);
                            }
                            FailOutcome::Dropped { attempts } => {
                                error!(error = %e, "processing {} failed, over max {attempts} retries (giving up)", event.key);
                            }
                        },
                    }
                }
            }
        }

        self.queue.shut_down();
        ingest.abort();
        Ok(())
    }

    /// Render and deliver the notification for one event
    fn process(&self, event: &ChangeEvent<K>) -> Result<()> {
        let current = self.store.read().unwrap().get(&event.key).cloned();

        let (key_namespace, key_name) = split_key(&event.key);
        let namespace = if event.namespace.is_empty() {
            // Cluster-scoped watches leave the namespace empty; a
            // composite key still carries one worth promoting.
            key_namespace.unwrap_or_default().to_string()
        } else {
            event.namespace.clone()
        };

        let (obj, name) = match event.event_type {
            EventType::Create => {
                let Some(obj) = current else {
                    // Vanished before processing; a delete event follows
                    return Ok(());
                };
                let fresh = obj
                    .creation_timestamp()
                    .is_some_and(|t| t > self.started_at);
                if !fresh {
                    debug!(key = %event.key, "skipping create for pre-existing object");
                    return Ok(());
                }
                (Some(obj), key_name.to_string())
            }
            EventType::Update => {
                let obj = current.or_else(|| event.previous.clone());
                (obj, key_name.to_string())
            }
            EventType::Delete => {
                let obj = current.or_else(|| event.previous.clone());
                let name = obj
                    .as_ref()
                    .and_then(|o| o.meta().name.clone())
                    .unwrap_or_else(|| key_name.to_string());
                (obj, name)
            }
        };

        let notification = Notification {
            namespace,
            kind: event.resource.to_string(),
            component: obj.as_ref().and_then(|o| o.component()).unwrap_or_default(),
            host: obj.as_ref().and_then(|o| o.host()).unwrap_or_default(),
            reason: event.event_type.to_string(),
            status: classify(event.event_type, event.resource),
            name,
        };

        self.handler.handle(&notification)
    }
}

/// Resolve when the flag flips; a dropped sender also counts
async fn wait_true(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn ingest_events<K, S>(
    stream: S,
    queue: WorkQueue<ChangeEvent<K>>,
    store: Arc<RwLock<HashMap<String, K>>>,
    namespace: String,
    synced: watch::Sender<bool>,
) where
    K: WatchedResource,
    S: Stream<Item = std::result::Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut relist_seen: HashSet<String> = HashSet::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(watcher::Event::Init) => {
                relist_seen.clear();
            }
            Ok(watcher::Event::InitApply(obj)) => {
                let Some(key) = object_key(&obj) else { continue };
                relist_seen.insert(key.clone());
                upsert(&queue, &store, &namespace, key, obj);
            }
            Ok(watcher::Event::InitDone) => {
                let first = !*synced.borrow();
                if first {
                    let _ = synced.send(true);
                } else {
                    // A re-list: objects missing from it were deleted
                    // while the watch was away
                    emit_vanished(&queue, &store, &namespace, &relist_seen);
                }
                relist_seen.clear();
            }
            Ok(watcher::Event::Apply(obj)) => {
                let Some(key) = object_key(&obj) else { continue };
                upsert(&queue, &store, &namespace, key, obj);
            }
            Ok(watcher::Event::Delete(obj)) => {
                let Some(key) = object_key(&obj) else { continue };
                remove(&queue, &store, &namespace, key, obj);
            }
            Err(e) => {
                warn!(
                    resource = K::kind_label(),
                    error = %e,
                    "watch error, stream will recover"
                );
            }
        }
    }

    debug!(resource = K::kind_label(), "watch stream ended");
    queue.shut_down();
}

/// `namespace/name`, or the bare name outside any namespace
fn object_key<K: WatchedResource>(obj: &K) -> Option<String> {
    let meta = obj.meta();
    let name = meta.name.as_ref()?;
    Some(match &meta.namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.clone(),
    })
}

fn upsert<K: WatchedResource>(
    queue: &WorkQueue<ChangeEvent<K>>,
    store: &Arc<RwLock<HashMap<String, K>>>,
    namespace: &str,
    key: String,
    obj: K,
) {
    let previous = store.write().unwrap().insert(key.clone(), obj);
    let event_type = if previous.is_some() {
        EventType::Update
    } else {
        EventType::Create
    };
    queue.push(ChangeEvent {
        key,
        event_type,
        namespace: namespace.to_string(),
        resource: K::kind_label(),
        previous,
    });
}

fn remove<K: WatchedResource>(
    queue: &WorkQueue<ChangeEvent<K>>,
    store: &Arc<RwLock<HashMap<String, K>>>,
    namespace: &str,
    key: String,
    obj: K,
) {
    let previous = store.write().unwrap().remove(&key);
    queue.push(ChangeEvent {
        key,
        event_type: EventType::Delete,
        namespace: namespace.to_string(),
        resource: K::kind_label(),
        // The store's copy is older than the event's where both exist,
        // but it survives even when the event object is partial
        previous: previous.or(Some(obj)),
    });
}

fn emit_vanished<K: WatchedResource>(
    queue: &WorkQueue<ChangeEvent<K>>,
    store: &Arc<RwLock<HashMap<String, K>>>,
    namespace: &str,
    seen: &HashSet<String>,
) {
    let vanished: Vec<(String, K)> = {
        let mut store = store.write().unwrap();
        let keys: Vec<String> = store
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| store.remove(&key).map(|obj| (key, obj)))
            .collect()
    };

    for (key, obj) in vanished {
        debug!(key = %key, "object vanished during re-list");
        queue.push(ChangeEvent {
            key,
            event_type: EventType::Delete,
            namespace: namespace.to_string(),
            resource: K::kind_label(),
            previous: Some(obj),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHandler;
    use chrono::Duration;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    use crate::controller::handler::Severity;

    fn service(name: &str, created: Option<DateTime<Utc>>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("demo".to_string()),
                creation_timestamp: created.map(Time),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn change(key: &str, event_type: EventType, previous: Option<Service>) -> ChangeEvent<Service> {
        ChangeEvent {
            key: key.to_string(),
            event_type,
            namespace: "demo".to_string(),
            resource: "service",
            previous,
        }
    }

    fn controller_started_at(
        started_at: DateTime<Utc>,
    ) -> (Controller<Service>, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::new());
        let controller = Controller::new(
            "demo",
            handler.clone(),
            ControllerOptions {
                started_at,
                ..Default::default()
            },
        );
        (controller, handler)
    }

    #[test]
    fn test_process_create_suppressed_for_preexisting() {
        let (controller, handler) = controller_started_at(Utc::now());
        let old = service("web", Some(Utc::now() - Duration::hours(1)));
        controller
            .store
            .write()
            .unwrap()
            .insert("demo/web".to_string(), old);

        let result = controller.process(&change("demo/web", EventType::Create, None));

        assert!(result.is_ok());
        assert!(handler.notifications().is_empty());
    }

    #[test]
    fn test_process_create_fresh_object_notifies() {
        let (controller, handler) = controller_started_at(Utc::now() - Duration::hours(1));
        let fresh = service("web", Some(Utc::now()));
        controller
            .store
            .write()
            .unwrap()
            .insert("demo/web".to_string(), fresh);

        controller
            .process(&change("demo/web", EventType::Create, None))
            .unwrap();

        let notifications = handler.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].name, "web");
        assert_eq!(notifications[0].namespace, "demo");
        assert_eq!(notifications[0].reason, "create");
        assert_eq!(notifications[0].status, Severity::Normal);
        assert_eq!(notifications[0].component, "ClusterIP");
    }

    #[test]
    fn test_process_create_store_miss_suppressed() {
        let (controller, handler) = controller_started_at(Utc::now() - Duration::hours(1));

        let result = controller.process(&change("demo/web", EventType::Create, None));

        assert!(result.is_ok());
        assert!(handler.notifications().is_empty());
    }

    #[test]
    fn test_process_update_warns() {
        let (controller, handler) = controller_started_at(Utc::now());
        controller
            .store
            .write()
            .unwrap()
            .insert("demo/web".to_string(), service("web", None));

        controller
            .process(&change(
                "demo/web",
                EventType::Update,
                Some(service("web", None)),
            ))
            .unwrap();

        let notifications = handler.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].reason, "update");
        assert_eq!(notifications[0].status, Severity::Warning);
    }

    #[test]
    fn test_process_delete_falls_back_to_event_object() {
        let (controller, handler) = controller_started_at(Utc::now());

        controller
            .process(&change(
                "demo/web",
                EventType::Delete,
                Some(service("web", None)),
            ))
            .unwrap();

        let notifications = handler.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].name, "web");
        assert_eq!(notifications[0].status, Severity::Danger);
    }

    #[test]
    fn test_process_delete_with_bare_key_only() {
        let (controller, handler) = controller_started_at(Utc::now());

        controller
            .process(&change("demo/web", EventType::Delete, None))
            .unwrap();

        let notifications = handler.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].name, "web");
        assert_eq!(notifications[0].namespace, "demo");
    }

    #[test]
    fn test_process_promotes_namespace_from_key() {
        let (controller, handler) = controller_started_at(Utc::now());
        let mut event = change("other/web", EventType::Delete, Some(service("web", None)));
        event.namespace = String::new();

        controller.process(&event).unwrap();

        assert_eq!(handler.notifications()[0].namespace, "other");
    }

    #[test]
    fn test_object_key_forms() {
        let namespaced = service("web", None);
        assert_eq!(object_key(&namespaced).as_deref(), Some("demo/web"));

        let bare = Service {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(object_key(&bare).as_deref(), Some("web"));

        assert_eq!(object_key(&Service::default()), None);
    }
}
