#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobStatus, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ManagedFieldsEntry, ObjectMeta, OwnerReference, Time};
use kron_api::{InProcApi, NamespacePolicy};
use kron_kubehub::MockBackend;

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()
}

pub fn api(mock: Arc<MockBackend>, policy: NamespacePolicy) -> InProcApi<MockBackend> {
    InProcApi::new(mock, policy).with_clock(noon)
}

fn meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(ns.into()),
        uid: Some(format!("uid-{name}")),
        resource_version: Some("7".into()),
        managed_fields: Some(vec![ManagedFieldsEntry { manager: Some("kube-controller-manager".into()), ..Default::default() }]),
        ..Default::default()
    }
}

fn owned_by(kind: &str, owner: &str) -> Option<Vec<OwnerReference>> {
    Some(vec![OwnerReference {
        api_version: "batch/v1".into(),
        kind: kind.into(),
        name: owner.into(),
        uid: format!("uid-{owner}"),
        ..Default::default()
    }])
}

pub fn cronjob(ns: &str, name: &str) -> CronJob {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), name.to_string());
    CronJob {
        metadata: meta(ns, name),
        spec: Some(CronJobSpec {
            schedule: "0 3 * * *".into(),
            job_template: JobTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(JobSpec { backoff_limit: Some(1), ..Default::default() }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Job started `ago` before noon, owned by `cronjob` through an owner reference.
pub fn scheduled_job(ns: &str, name: &str, cronjob: &str, ago: Duration) -> Job {
    let mut m = meta(ns, name);
    m.owner_references = owned_by("CronJob", cronjob);
    Job {
        metadata: m,
        spec: Some(JobSpec::default()),
        status: Some(JobStatus { start_time: Some(Time(noon() - ago)), ..Default::default() }),
    }
}

/// Job linked to `cronjob` only through the `created-from` label.
pub fn manual_job(ns: &str, name: &str, cronjob: &str, ago: Duration) -> Job {
    let mut m = meta(ns, name);
    let mut labels = BTreeMap::new();
    labels.insert("created-from".to_string(), cronjob.to_string());
    labels.insert("manually-triggered".to_string(), "true".to_string());
    m.labels = Some(labels);
    Job {
        metadata: m,
        spec: Some(JobSpec::default()),
        status: Some(JobStatus { start_time: Some(Time(noon() - ago)), ..Default::default() }),
    }
}

pub fn pod(ns: &str, name: &str, job: &str, ago: Option<Duration>) -> Pod {
    let mut m = meta(ns, name);
    m.owner_references = owned_by("Job", job);
    Pod {
        metadata: m,
        spec: None,
        status: Some(PodStatus { start_time: ago.map(|a| Time(noon() - a)), phase: Some("Succeeded".into()), ..Default::default() }),
    }
}
