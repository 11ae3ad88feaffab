//! Kron Ops: state-changing CronJob and Job operations.
//!
//! Every operation issues its remote calls sequentially and never retries. Read-then-write
//! operations (suspend toggle, upsert) are not atomic: two concurrent callers can both read
//! the same state and both write. The server's own conflict checks are the only guard.
//! Absence of the target is `Ok(None)`, not an error.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kron_core::{strip_mutable_state, LABEL_CREATED_FROM, LABEL_MANUALLY_TRIGGERED};
use kron_kubehub::{BackendError, CronJobStore, JobStore};
use metrics::counter;
use serde_json::Value as Json;
use tracing::{error, info};

/// Longest object name the cluster accepts.
pub const MAX_NAME_LEN: usize = 63;
/// Characters of the CronJob name kept as the manual Job name prefix.
pub const MANUAL_PREFIX_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid spec: {0}")]
    Invalid(String),
}

pub type OpsResult<T> = Result<T, OpsError>;

fn absent_as_none<T>(res: Result<T, BackendError>) -> OpsResult<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn record(op: &'static str) {
    counter!("kron_mutations_total", 1u64, "op" => op);
}

/// Name for a manually triggered Job: `{cronjob[:16]}-manual-{%Y%m%d%H%M%S-%f}`, capped at 63 chars.
///
/// CronJobs sharing a 16 character prefix produce the same prefix here.
pub fn manual_job_name(cronjob_name: &str, now: DateTime<Utc>) -> String {
    let base: String = cronjob_name.chars().take(MANUAL_PREFIX_LEN).collect();
    let name = format!("{}-manual-{}", base, now.format("%Y%m%d%H%M%S-%6f"));
    name.chars().take(MAX_NAME_LEN).collect()
}

/// Instantiate a Job from the CronJob's template, labelled with its lineage.
pub fn manual_job_from(cronjob: &CronJob, namespace: &str, now: DateTime<Utc>) -> OpsResult<Job> {
    let cronjob_name = cronjob.metadata.name.as_deref().ok_or_else(|| OpsError::Invalid("cronjob has no metadata.name".into()))?;
    let template = cronjob
        .spec
        .as_ref()
        .map(|s| &s.job_template)
        .ok_or_else(|| OpsError::Invalid(format!("cronjob {cronjob_name} has no spec.jobTemplate")))?;
    let tmeta = template.metadata.clone().unwrap_or_default();
    let mut labels: BTreeMap<String, String> = tmeta.labels.unwrap_or_default();
    labels.insert(LABEL_MANUALLY_TRIGGERED.to_string(), "true".to_string());
    labels.insert(LABEL_CREATED_FROM.to_string(), cronjob_name.to_string());
    Ok(Job {
        metadata: ObjectMeta {
            name: Some(manual_job_name(cronjob_name, now)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: tmeta.annotations,
            ..Default::default()
        },
        spec: template.spec.clone(),
        ..Default::default()
    })
}

/// Flip `spec.suspend`. Unset counts as not suspended.
pub async fn toggle_suspend<B>(backend: &B, namespace: &str, name: &str) -> OpsResult<Option<CronJob>>
where
    B: CronJobStore + ?Sized,
{
    let Some(current) = absent_as_none(backend.get_cronjob(namespace, name).await)? else {
        return Ok(None);
    };
    let suspended = current.spec.as_ref().and_then(|s| s.suspend).unwrap_or(false);
    let patch = serde_json::json!({"spec": {"suspend": !suspended}});
    let updated = backend.patch_cronjob(namespace, name, &patch).await?;
    record("toggle_suspend");
    info!(ns = %namespace, name = %name, suspend = !suspended, "ops: suspend toggled");
    Ok(Some(updated))
}

/// Create a Job from the CronJob's template right now.
pub async fn trigger_manual_job<B>(backend: &B, namespace: &str, cronjob_name: &str, now: DateTime<Utc>) -> OpsResult<Option<Job>>
where
    B: CronJobStore + JobStore + ?Sized,
{
    let Some(cronjob) = absent_as_none(backend.get_cronjob(namespace, cronjob_name).await)? else {
        return Ok(None);
    };
    let job = manual_job_from(&cronjob, namespace, now)?;
    let job_name = job.metadata.name.clone().unwrap_or_default();
    match backend.create_job(namespace, &job).await {
        Ok(created) => {
            record("trigger");
            counter!("kron_manual_triggers_total", 1u64);
            info!(ns = %namespace, cronjob = %cronjob_name, job = %job_name, "ops: manual job created");
            Ok(Some(created))
        }
        Err(e) => {
            error!(ns = %namespace, cronjob = %cronjob_name, job = %job_name, error = %e, "ops: manual job create failed");
            Err(e.into())
        }
    }
}

/// Create or update by existence check. `spec` may be a previously read object:
/// server-assigned state is stripped and `metadata.namespace` is forced to `namespace`.
pub async fn upsert_cronjob<B>(backend: &B, namespace: &str, spec: Json) -> OpsResult<CronJob>
where
    B: CronJobStore + ?Sized,
{
    let mut spec = strip_mutable_state(spec);
    let name = spec
        .pointer("/metadata/name")
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OpsError::Invalid("metadata.name is required".into()))?;
    match spec.pointer_mut("/metadata").and_then(Json::as_object_mut) {
        Some(meta) => {
            meta.insert("namespace".into(), Json::String(namespace.to_string()));
        }
        None => return Err(OpsError::Invalid("metadata must be a mapping".into())),
    }

    let exists = absent_as_none(backend.get_cronjob(namespace, &name).await)?.is_some();
    let out = if exists {
        let patched = backend.patch_cronjob(namespace, &name, &spec).await?;
        info!(ns = %namespace, name = %name, "ops: cronjob patched");
        patched
    } else {
        let cronjob: CronJob = serde_json::from_value(spec).map_err(|e| OpsError::Invalid(e.to_string()))?;
        let created = backend.create_cronjob(namespace, &cronjob).await?;
        info!(ns = %namespace, name = %name, "ops: cronjob created");
        created
    };
    record("upsert");
    Ok(out)
}

/// Copy an existing CronJob under `new_name` through the upsert path.
pub async fn clone_cronjob<B>(backend: &B, namespace: &str, name: &str, new_name: &str) -> OpsResult<Option<CronJob>>
where
    B: CronJobStore + ?Sized,
{
    let Some(source) = absent_as_none(backend.get_cronjob(namespace, name).await)? else {
        return Ok(None);
    };
    let mut spec = strip_mutable_state(serde_json::to_value(&source).map_err(BackendError::from)?);
    if let Some(meta) = spec.pointer_mut("/metadata").and_then(Json::as_object_mut) {
        meta.insert("name".into(), Json::String(new_name.to_string()));
        meta.remove("creationTimestamp");
        meta.remove("managedFields");
    }
    info!(ns = %namespace, from = %name, to = %new_name, "ops: cloning cronjob");
    upsert_cronjob(backend, namespace, spec).await.map(Some)
}

pub async fn delete_cronjob<B>(backend: &B, namespace: &str, name: &str) -> OpsResult<Option<Json>>
where
    B: CronJobStore + ?Sized,
{
    let res = absent_as_none(backend.delete_cronjob(namespace, name).await)?;
    if res.is_some() {
        record("delete_cronjob");
        info!(ns = %namespace, name = %name, "ops: cronjob deleted");
    }
    Ok(res)
}

pub async fn delete_job<B>(backend: &B, namespace: &str, name: &str) -> OpsResult<Option<Json>>
where
    B: JobStore + ?Sized,
{
    let res = absent_as_none(backend.delete_job(namespace, name).await)?;
    if res.is_some() {
        record("delete_job");
        info!(ns = %namespace, name = %name, "ops: job deleted");
    }
    Ok(res)
}
