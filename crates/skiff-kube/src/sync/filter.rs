//! Volatile-field stripping
//!
//! Listed objects carry cluster-assigned fields (uid, resourceVersion,
//! cluster IPs, status) that must not travel to another cluster. Filtering
//! clears them in place before an object is created, exported or compared.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Annotations dropped from exported manifests
pub const EXPORT_ANNOTATIONS: [&str; 2] = [
    "kubectl.kubernetes.io/last-applied-configuration",
    "deployment.kubernetes.io/revision",
];

/// Clear the cluster-assigned metadata fields
pub fn filter_metadata(meta: &mut ObjectMeta) {
    meta.namespace = None;
    meta.creation_timestamp = None;
    meta.managed_fields = None;
    meta.uid = None;
    meta.resource_version = None;
}

/// Strip a listed service down to its portable fields
pub fn filter_service(svc: &mut Service) {
    filter_metadata(&mut svc.metadata);
    svc.status = None;
    if let Some(spec) = &mut svc.spec {
        spec.cluster_ip = None;
        spec.cluster_ips = None;
    }
}

/// Strip a listed workload down to its portable fields
pub fn filter_workload(dp: &mut Deployment) {
    filter_metadata(&mut dp.metadata);
    dp.status = None;
}

/// Drop the export annotations; an emptied map becomes `None` so it
/// disappears from the manifest entirely
pub fn strip_export_annotations(meta: &mut ObjectMeta) {
    if let Some(annotations) = &mut meta.annotations {
        for key in EXPORT_ANNOTATIONS {
            annotations.remove(key);
        }
        if annotations.is_empty() {
            meta.annotations = None;
        }
    }
}
