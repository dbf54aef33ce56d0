//! Notification rendering and delivery
//!
//! The controller turns raw watch events into [`Notification`]s and hands
//! them to an [`EventHandler`]. Handlers are selected by the embedding
//! application; [`LogHandler`] is the built-in default.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use skiff_core::SyncConfig;

use crate::controller::event::EventType;
use crate::error::Result;

/// Condition literals that always signal danger
pub const DANGER_RESOURCES: [&str; 4] = ["NodeReady", "NodeNotReady", "NodeRebooted", "Backoff"];

/// How alarming a notification is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Warning",
            Severity::Danger => "Danger",
        };
        f.write_str(s)
    }
}

/// Severity of an event, by event type and resource label
///
/// Creates are normal unless a danger literal, updates warn unless the
/// object is crash looping, deletes always alarm.
pub fn classify(event_type: EventType, resource: &str) -> Severity {
    match event_type {
        EventType::Create => {
            if DANGER_RESOURCES.contains(&resource) {
                Severity::Danger
            } else {
                Severity::Normal
            }
        }
        EventType::Update => {
            if resource == "Backoff" {
                Severity::Danger
            } else {
                Severity::Warning
            }
        }
        EventType::Delete => Severity::Danger,
    }
}

/// One processed event, ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub namespace: String,

    /// Kind label, or a condition literal for node-state events
    pub kind: String,

    /// Service type for services, empty otherwise
    pub component: String,

    /// Node name for pod events, empty otherwise
    pub host: String,

    /// The verb that produced this notification
    pub reason: String,

    pub status: Severity,

    pub name: String,
}

impl Notification {
    /// Human-readable sentence for this notification
    pub fn message(&self) -> String {
        match self.kind.as_str() {
            "namespace" => format!("A namespace `{}` has been `{}`", self.name, self.reason),
            "node" => format!("A node `{}` has been `{}`", self.name, self.reason),
            "cluster role" => {
                format!("A cluster role `{}` has been `{}`", self.name, self.reason)
            }
            "NodeReady" => format!("Node `{}` is Ready : \nNodeReady", self.name),
            "NodeNotReady" => format!("Node `{}` is Not Ready : \nNodeNotReady", self.name),
            "NodeRebooted" => format!("Node `{}` Rebooted : \nNodeRebooted", self.name),
            "Backoff" => format!(
                "Pod `{}` in `{}` Crashed : \nCrashLoopBackOff {}",
                self.name, self.namespace, self.reason
            ),
            _ => format!(
                "A `{}` in namespace `{}` has been `{}`:\n`{}`",
                self.kind, self.namespace, self.reason, self.name
            ),
        }
    }
}

/// Processes notifications produced by a controller
pub trait EventHandler: Send + Sync {
    /// Called once before the controller starts
    fn init(&mut self, _config: &SyncConfig) -> Result<()> {
        Ok(())
    }

    /// Deliver one notification
    ///
    /// Runs inside the worker's processing step, so it must stay short.
    /// An error feeds the queue's retry accounting.
    fn handle(&self, notification: &Notification) -> Result<()>;

    /// Called once on shutdown
    fn teardown(&self) {}
}

impl fmt::Debug for dyn EventHandler + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// Default handler, prints each notification through the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl EventHandler for LogHandler {
    fn handle(&self, notification: &Notification) -> Result<()> {
        info!(
            kind = %notification.kind,
            namespace = %notification.namespace,
            status = %notification.status,
            "{}",
            notification.message()
        );
        Ok(())
    }
}
