//! Skiff Core - shared types for the cluster resource sync tool
//!
//! This crate provides the foundational types used throughout Skiff:
//! - `SyncConfig`: the configuration file model and its override rules
//! - `ResourceKind`: the kinds skiff knows how to synchronize
//! - `ObjectId` and the composite-key helpers shared by the sync engine
//!   and the watch controller

pub mod config;
pub mod kind;
pub mod error;

pub use config::{ClusterConfig, DaemonConfig, ExportConfig, LogConfig, SyncConfig};
pub use kind::{ObjectId, ResourceKind, split_key};
pub use error::{CoreError, Result};
