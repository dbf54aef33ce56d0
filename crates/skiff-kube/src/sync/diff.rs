//! Human-readable change descriptions, logged before an update
//!
//! These lines are purely informational. The engine updates
//! unconditionally; the diff never gates the verb.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Service, ServicePort};

/// Port-level differences between two services, one line each
pub fn service_changes(source: &Service, destination: &Service) -> Vec<String> {
    let src = ports_by_name(source);
    let dst = ports_by_name(destination);

    let mut changes = Vec::new();
    for (key, port) in &src {
        match dst.get(key) {
            None => changes.push(format!("add port: {} {}", key, port.port)),
            Some(existing) if existing.port != port.port => changes.push(format!(
                "change port: {} from {} to {}",
                key, existing.port, port.port
            )),
            Some(_) => {}
        }
    }
    for (key, port) in &dst {
        if !src.contains_key(key) {
            changes.push(format!("delete port: {} {}", key, port.port));
        }
    }
    changes
}

/// Container and replica differences between two workloads, one line each
pub fn workload_changes(source: &Deployment, destination: &Deployment) -> Vec<String> {
    let src = containers_by_name(source);
    let dst = containers_by_name(destination);

    let mut changes = Vec::new();
    for (name, container) in &src {
        match dst.get(name) {
            None => changes.push(format!(
                "add container: {} ({})",
                name,
                container.image.as_deref().unwrap_or_default()
            )),
            Some(existing) if existing.image != container.image => changes.push(format!(
                "change image: {} from {} to {}",
                name,
                existing.image.as_deref().unwrap_or_default(),
                container.image.as_deref().unwrap_or_default()
            )),
            Some(_) => {}
        }
    }
    for name in dst.keys() {
        if !src.contains_key(name) {
            changes.push(format!("delete container: {name}"));
        }
    }

    let src_replicas = replicas_of(source);
    let dst_replicas = replicas_of(destination);
    if src_replicas != dst_replicas {
        changes.push(format!(
            "change replicas: from {dst_replicas} to {src_replicas}"
        ));
    }
    changes
}

/// Ports keyed by name, falling back to the port number for unnamed ports
fn ports_by_name(svc: &Service) -> BTreeMap<String, &ServicePort> {
    let mut map = BTreeMap::new();
    if let Some(ports) = svc.spec.as_ref().and_then(|s| s.ports.as_ref()) {
        for port in ports {
            let key = port.name.clone().unwrap_or_else(|| port.port.to_string());
            map.insert(key, port);
        }
    }
    map
}

fn containers_by_name(dp: &Deployment) -> BTreeMap<&str, &Container> {
    let mut map = BTreeMap::new();
    if let Some(pod) = dp.spec.as_ref().and_then(|s| s.template.spec.as_ref()) {
        for container in &pod.containers {
            map.insert(container.name.as_str(), container);
        }
    }
    map
}

fn replicas_of(dp: &Deployment) -> i32 {
    dp.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec, ServiceSpec};

    fn service_with_ports(ports: Vec<(Option<&str>, i32)>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .into_iter()
                        .map(|(name, port)| ServicePort {
                            name: name.map(String::from),
                            port,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn workload(replicas: i32, containers: Vec<(&str, &str)>) -> Deployment {
        Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: containers
                            .into_iter()
                            .map(|(name, image)| Container {
                                name: name.to_string(),
                                image: Some(image.to_string()),
                                ..Default::default()
                            })
                            .collect(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_changes_add_change_delete() {
        let source = service_with_ports(vec![(Some("http"), 8080), (Some("metrics"), 9090)]);
        let destination = service_with_ports(vec![(Some("http"), 80), (Some("legacy"), 7070)]);

        let changes = service_changes(&source, &destination);
        assert_eq!(
            changes,
            vec![
                "change port: http from 80 to 8080",
                "add port: metrics 9090",
                "delete port: legacy 7070",
            ]
        );
    }

    #[test]
    fn test_service_changes_unnamed_ports_key_by_number() {
        let source = service_with_ports(vec![(None, 80)]);
        let destination = service_with_ports(vec![(None, 80)]);

        assert!(service_changes(&source, &destination).is_empty());
    }

    #[test]
    fn test_service_changes_identical() {
        let svc = service_with_ports(vec![(Some("http"), 80)]);
        assert!(service_changes(&svc, &svc).is_empty());
    }

    #[test]
    fn test_workload_changes_image_and_replicas() {
        let source = workload(3, vec![("app", "nginx:1.27")]);
        let destination = workload(1, vec![("app", "nginx:1.25")]);

        let changes = workload_changes(&source, &destination);
        assert_eq!(
            changes,
            vec![
                "change image: app from nginx:1.25 to nginx:1.27",
                "change replicas: from 1 to 3",
            ]
        );
    }

    #[test]
    fn test_workload_changes_containers_added_and_removed() {
        let source = workload(1, vec![("app", "nginx:1.27"), ("sidecar", "envoy:1.30")]);
        let destination = workload(1, vec![("app", "nginx:1.27"), ("old", "redis:7")]);

        let changes = workload_changes(&source, &destination);
        assert_eq!(
            changes,
            vec!["add container: sidecar (envoy:1.30)", "delete container: old"]
        );
    }

    #[test]
    fn test_workload_changes_missing_replicas_default_to_one() {
        let mut source = workload(1, vec![("app", "nginx:1.27")]);
        source.spec.as_mut().unwrap().replicas = None;
        let destination = workload(1, vec![("app", "nginx:1.27")]);

        assert!(workload_changes(&source, &destination).is_empty());
    }
}
