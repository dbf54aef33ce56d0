//! Change events produced by the watch ingest

use std::fmt;

use crate::controller::queue::QueueItem;

/// What happened to the watched object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One classified change, immutable once built
///
/// `previous` carries the replaced object for updates and the last-known
/// object for deletes. `None` means the object was never cached; the
/// processing step then falls back to whatever the key alone can tell it.
#[derive(Debug, Clone)]
pub struct ChangeEvent<K> {
    /// `namespace/name`, or a bare name for cluster-scoped objects
    pub key: String,

    pub event_type: EventType,

    /// Namespace the watch ran in; empty for cluster-scoped objects
    pub namespace: String,

    /// Kind label ("service", "workload")
    pub resource: &'static str,

    pub previous: Option<K>,
}

impl<K: Clone + Send + 'static> QueueItem for ChangeEvent<K> {
    fn queue_key(&self) -> &str {
        &self.key
    }
}
