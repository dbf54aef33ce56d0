//! Reconciliation engine
//!
//! One pass lists both clusters, filters the source objects, exports them
//! if a sink is configured, then applies the planned verbs against the
//! destination: creates, updates, deletes, in that order. The first failed
//! verb aborts the pass; verbs already applied stay applied.

pub mod diff;
pub mod filter;
pub mod plan;

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use tracing::info;

use crate::error::Result;
use crate::export::ExportSink;
use crate::ops::ResourceOps;
use plan::plan_by_name;

/// Names touched by one sync pass, split by verb
#[derive(Debug, Default, Clone)]
pub struct SyncSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl SyncSummary {
    /// Total number of verbs applied
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted",
            self.created.len(),
            self.updated.len(),
            self.deleted.len()
        )
    }
}

/// Drives sync passes, optionally exporting manifests along the way
#[derive(Debug, Default)]
pub struct SyncEngine {
    export: Option<ExportSink>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self { export: None }
    }

    /// Engine that also writes every filtered source object to `sink`
    /// before mutating anything
    pub fn with_export(sink: ExportSink) -> Self {
        Self { export: Some(sink) }
    }

    /// Reconcile services from `source` into `destination`
    pub async fn sync_services(
        &self,
        source: &dyn ResourceOps<Service>,
        destination: &dyn ResourceOps<Service>,
    ) -> Result<SyncSummary> {
        info!(
            source = source.namespace(),
            destination = destination.namespace(),
            "sync services"
        );

        let src_list = source.list_all().await?;
        let dst_list = destination.list_all().await?;

        let src_list: Vec<Service> = src_list
            .into_iter()
            .map(|mut svc| {
                filter::filter_service(&mut svc);
                svc
            })
            .collect();

        if let Some(sink) = &self.export {
            for svc in &src_list {
                sink.write_service(source.namespace(), svc)?;
            }
        }

        let plan = plan_by_name(src_list, dst_list, |svc: &Service| svc.metadata.name.clone());
        let mut summary = SyncSummary::default();

        for svc in plan.create {
            let Some(name) = svc.metadata.name.clone() else {
                continue;
            };
            info!("create service: {name}");
            destination.create(&svc).await?;
            summary.created.push(name);
        }

        for (src, dst) in plan.update {
            let Some(name) = src.metadata.name.clone() else {
                continue;
            };
            for line in diff::service_changes(&src, &dst) {
                info!("{line}");
            }
            info!("update service: {name}");

            // Only ports travel; the destination keeps its virtual address
            // and everything else the cluster assigned to the spec.
            let ports = src.spec.as_ref().and_then(|s| s.ports.clone());
            let mut updated = dst.clone();
            match &mut updated.spec {
                Some(spec) => spec.ports = ports,
                None => {
                    updated.spec = Some(ServiceSpec {
                        ports,
                        ..Default::default()
                    })
                }
            }
            destination.update(&name, &updated).await?;
            summary.updated.push(name);
        }

        for svc in plan.delete {
            let Some(name) = svc.metadata.name.clone() else {
                continue;
            };
            info!("delete service: {name}");
            destination.delete(&name).await?;
            summary.deleted.push(name);
        }

        Ok(summary)
    }

    /// Reconcile workloads from `source` into `destination`
    pub async fn sync_workloads(
        &self,
        source: &dyn ResourceOps<Deployment>,
        destination: &dyn ResourceOps<Deployment>,
    ) -> Result<SyncSummary> {
        info!(
            source = source.namespace(),
            destination = destination.namespace(),
            "sync workloads"
        );

        let src_list = source.list_all().await?;
        let dst_list = destination.list_all().await?;

        let src_list: Vec<Deployment> = src_list
            .into_iter()
            .map(|mut dp| {
                filter::filter_workload(&mut dp);
                dp
            })
            .collect();

        if let Some(sink) = &self.export {
            for dp in &src_list {
                sink.write_workload(source.namespace(), dp)?;
            }
        }

        let plan = plan_by_name(src_list, dst_list, |dp: &Deployment| dp.metadata.name.clone());
        let mut summary = SyncSummary::default();

        for dp in plan.create {
            let Some(name) = dp.metadata.name.clone() else {
                continue;
            };
            info!("create workload: {name}");
            destination.create(&dp).await?;
            summary.created.push(name);
        }

        for (src, dst) in plan.update {
            let Some(name) = src.metadata.name.clone() else {
                continue;
            };
            for line in diff::workload_changes(&src, &dst) {
                info!("{line}");
            }
            info!("update workload: {name}");

            let mut updated = dst.clone();
            updated.spec = src.spec.clone();
            destination.update(&name, &updated).await?;
            summary.updated.push(name);
        }

        for dp in plan.delete {
            let Some(name) = dp.metadata.name.clone() else {
                continue;
            };
            info!("delete workload: {name}");
            destination.delete(&name).await?;
            summary.deleted.push(name);
        }

        Ok(summary)
    }
}
