//! Error types for skiff-kube

use thiserror::Error;

/// Result type for skiff-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during Kubernetes operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be read or parsed
    #[error("failed to load kubeconfig '{path}': {message}")]
    Kubeconfig { path: String, message: String },

    /// Client construction failed
    #[error("failed to connect to {cluster} cluster: {message}")]
    Connect { cluster: String, message: String },

    /// Listing a namespace failed
    #[error("failed to list {kind} in namespace '{namespace}': {source}")]
    List {
        kind: &'static str,
        namespace: String,
        #[source]
        source: kube::Error,
    },

    /// A single resource operation failed
    #[error("failed to {verb} {kind} '{name}': {source}")]
    Operation {
        verb: &'static str,
        kind: &'static str,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// Object without a name cannot be synced
    #[error("{kind} object has no metadata.name")]
    MissingName { kind: &'static str },

    /// The watch ended or was cancelled before the initial listing completed
    #[error("timed out waiting for {resource} cache to sync")]
    CacheSync { resource: &'static str },

    /// Event handler failure
    #[error("handler error: {0}")]
    Handler(String),

    /// Manifest export failed
    #[error("export error: {0}")]
    Export(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<skiff_core::CoreError> for KubeError {
    fn from(e: skiff_core::CoreError) -> Self {
        KubeError::InvalidConfig(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            KubeError::Operation {
                source: kube::Error::Api(resp),
                ..
            } => resp.code == 404,
            _ => false,
        }
    }

    /// Check if this is a 409 Conflict, as returned for a create of an
    /// object that already exists
    pub fn is_already_exists(&self) -> bool {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 409,
            KubeError::Operation {
                source: kube::Error::Api(resp),
                ..
            } => resp.code == 409,
            _ => false,
        }
    }
}
