//! Resource kinds and object identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A kind of resource skiff can synchronize
///
/// Each kind is wired end to end by hand (list, filter, diff, update);
/// adding one means implementing those pieces, not registering a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Deployment-backed workloads
    Workload,

    /// Services (ClusterIP, NodePort, LoadBalancer)
    Service,
}

impl ResourceKind {
    /// All supported kinds, in sync order
    pub fn all() -> Vec<ResourceKind> {
        vec![ResourceKind::Workload, ResourceKind::Service]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Workload => "workload",
            Self::Service => "service",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "deployment" is the historical spelling and stays accepted
        match s.to_ascii_lowercase().as_str() {
            "workload" | "deployment" => Ok(ResourceKind::Workload),
            "service" => Ok(ResourceKind::Service),
            other => Err(CoreError::InvalidKind {
                name: other.to_string(),
            }),
        }
    }
}

/// Identity of a synchronized object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectId {
    /// Namespace the object lives in
    pub namespace: String,

    /// Object name
    pub name: String,

    /// Resource kind
    pub kind: ResourceKind,
}

impl ObjectId {
    /// Create a new object identity
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
        }
    }

    /// Composite `namespace/name` key, as produced by cluster watches
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key())
    }
}

/// Split a composite `namespace/name` key
///
/// Keys coming out of a watch are namespace-qualified; a key without a
/// separator is returned as a bare name.
pub fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("workload".parse::<ResourceKind>().unwrap(), ResourceKind::Workload);
        assert_eq!("deployment".parse::<ResourceKind>().unwrap(), ResourceKind::Workload);
        assert_eq!("Service".parse::<ResourceKind>().unwrap(), ResourceKind::Service);

        assert!("configmap".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::Workload.to_string(), "workload");
        assert_eq!(ResourceKind::Service.to_string(), "service");
    }

    #[test]
    fn test_object_key() {
        let id = ObjectId::new("demo", "web", ResourceKind::Service);
        assert_eq!(id.key(), "demo/web");
        assert_eq!(id.to_string(), "service demo/web");
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("demo/web"), (Some("demo"), "web"));
        assert_eq!(split_key("web"), (None, "web"));
        assert_eq!(split_key("demo/web/extra"), (Some("demo"), "web/extra"));
    }
}
