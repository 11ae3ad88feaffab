//! Typed view over the three resource kinds this layer handles.

use std::fmt;

use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::{normalize, NormalizedObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    CronJob,
    Job,
    Pod,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::Job => "Job",
            WorkloadKind::Pod => "Pod",
        })
    }
}

/// A CronJob, Job or Pod as returned by the cluster.
#[derive(Debug, Clone)]
pub enum Workload {
    CronJob(CronJob),
    Job(Job),
    Pod(Pod),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::CronJob(_) => WorkloadKind::CronJob,
            Workload::Job(_) => WorkloadKind::Job,
            Workload::Pod(_) => WorkloadKind::Pod,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Workload::CronJob(o) => &o.metadata,
            Workload::Job(o) => &o.metadata,
            Workload::Pod(o) => &o.metadata,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.meta().name.as_deref()
    }

    /// Whether derived age applies. CronJobs have no `status.startTime`.
    pub fn has_age(&self) -> bool {
        !matches!(self, Workload::CronJob(_))
    }

    pub fn normalize(&self) -> serde_json::Result<NormalizedObject> {
        match self {
            Workload::CronJob(o) => normalize(o),
            Workload::Job(o) => normalize(o),
            Workload::Pod(o) => normalize(o),
        }
    }
}

impl From<CronJob> for Workload {
    fn from(v: CronJob) -> Self {
        Workload::CronJob(v)
    }
}

impl From<Job> for Workload {
    fn from(v: Job) -> Self {
        Workload::Job(v)
    }
}

impl From<Pod> for Workload {
    fn from(v: Pod) -> Self {
        Workload::Pod(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ManagedFieldsEntry;

    #[test]
    fn normalize_typed_job_carries_kind_and_drops_managed_fields() {
        let job = Job {
            metadata: ObjectMeta {
                name: Some("backup-1".into()),
                namespace: Some("qa".into()),
                managed_fields: Some(vec![ManagedFieldsEntry { manager: Some("kube-controller-manager".into()), ..Default::default() }]),
                ..Default::default()
            },
            ..Default::default()
        };
        let w = Workload::from(job);
        assert_eq!(w.kind(), WorkloadKind::Job);
        assert_eq!(w.name(), Some("backup-1"));
        let n = w.normalize().unwrap();
        assert_eq!(n.pointer("/kind").and_then(|v| v.as_str()), Some("Job"));
        assert_eq!(n.pointer("/apiVersion").and_then(|v| v.as_str()), Some("batch/v1"));
        assert!(n.pointer("/metadata/managedFields").is_none());
        assert_eq!(n.namespace(), Some("qa"));
    }

    #[test]
    fn only_jobs_and_pods_have_age() {
        assert!(!Workload::from(CronJob::default()).has_age());
        assert!(Workload::from(Job::default()).has_age());
        assert!(Workload::from(Pod::default()).has_age());
    }
}
