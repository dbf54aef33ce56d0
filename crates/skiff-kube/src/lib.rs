//! Skiff Kube - Kubernetes integration for Skiff
//!
//! This crate provides:
//! - **Cluster Clients**: kubeconfig resolution and namespaced typed APIs
//! - **Sync Engine**: three-way diff reconciliation from a source cluster
//!   namespace to a destination cluster namespace
//! - **Watch Controller**: change stream -> keyed work queue -> event handler,
//!   with bounded retries and create-suppression for pre-existing objects
//! - **Manifest Export**: write every synced object as a standalone YAML file
//! - **Mock Cluster**: in-memory `ResourceOps` implementation for tests

pub mod client;
pub mod controller;
pub mod error;
pub mod export;
pub mod mock;
pub mod ops;
pub mod sync;

pub use client::ClusterClient;
pub use controller::event::{ChangeEvent, EventType};
pub use controller::handler::{EventHandler, LogHandler, Notification, Severity};
pub use controller::queue::{
    BackoffPolicy, ExponentialBackoff, FailOutcome, FixedBackoff, QueueItem, WorkQueue,
};
pub use controller::{Controller, ControllerOptions, WatchedResource};
pub use error::{KubeError, Result};
pub use export::ExportSink;
pub use mock::{MockCluster, OpRecord, RecordingHandler};
pub use ops::ResourceOps;
pub use sync::plan::{SyncPlan, plan_by_name};
pub use sync::{SyncEngine, SyncSummary};
