//! Kron public API façade (in-process).
//!
//! Frontends (the CLI today, an HTTP shell later) depend on [`KronApi`]. Every
//! namespace-scoped call checks the [`NamespacePolicy`] before any remote call.
//! Three failure channels are kept apart: absence (`Ok(None)`), policy denial
//! ([`KronError::Denied`]) and remote failure ([`KronError::Remote`]).

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kron_core::{age_since, is_owned_by, sort_refs, AgeError, Workload};
use kron_kubehub::{Backend, BackendError, KubeBackend, LogRequest};
use kron_ops::OpsError;
use metrics::counter;
use serde_json::Value as Json;
use tracing::{error, info, warn};

pub use kron_core::{ErrorEnvelope, NamespacePolicy, NormalizedObject, ResourceRef};

/// Prefix of the placeholder returned when a pod's logs cannot be found.
pub const LOG_PLACEHOLDER_PREFIX: &str = "Kron> Error fetching logs:";

#[derive(Debug, thiserror::Error)]
pub enum KronError {
    /// Namespace rejected by policy before any remote call was made.
    #[error("access to namespace {namespace:?} is not permitted")]
    Denied { namespace: String },
    #[error(transparent)]
    Remote(#[from] ErrorEnvelope),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Timestamp(#[from] AgeError),
    #[error("internal: {0}")]
    Internal(String),
}

impl KronError {
    /// HTTP status a presentation layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            KronError::Denied { .. } => 403,
            KronError::Invalid(_) => 400,
            KronError::Remote(_) | KronError::Timestamp(_) | KronError::Internal(_) => 500,
        }
    }
}

pub type KronResult<T> = Result<T, KronError>;

/// Translate an upstream failure into the structured envelope.
pub fn envelope(e: BackendError) -> ErrorEnvelope {
    match e {
        BackendError::NotFound { reason, message } => ErrorEnvelope::new(404, reason, message),
        BackendError::Api { code, reason, message, .. } => ErrorEnvelope::new(code, reason, message),
        BackendError::Decode(m) => ErrorEnvelope::new(500, "Decode", m),
        BackendError::Transport(m) => ErrorEnvelope::new(500, "Transport", m),
    }
}

/// Declarative Kron API surface.
#[async_trait::async_trait]
pub trait KronApi: Send + Sync {
    fn policy(&self) -> &NamespacePolicy;

    /// Namespaces the caller may browse.
    async fn list_namespaces(&self) -> KronResult<Vec<String>>;

    /// CronJob refs sorted by name. `None` or `""` lists every permitted namespace.
    async fn list_cronjobs(&self, namespace: Option<&str>) -> KronResult<Vec<ResourceRef>>;

    /// `Ok(None)` when the CronJob does not exist.
    async fn get_cronjob(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>>;

    /// Jobs with `status.age`, restricted to those owned by `cronjob` when given.
    async fn list_jobs(&self, namespace: &str, cronjob: Option<&str>) -> KronResult<Vec<NormalizedObject>>;

    /// Pods with `status.age`, restricted to those owned by `job` when given.
    async fn list_pods(&self, namespace: &str, job: Option<&str>) -> KronResult<Vec<NormalizedObject>>;

    /// Jobs as in [`KronApi::list_jobs`], each carrying its pods under `pods`.
    async fn list_jobs_with_pods(&self, namespace: &str, cronjob: Option<&str>) -> KronResult<Vec<NormalizedObject>>;

    /// Last 1000 log lines with timestamps, or a placeholder when the pod is gone.
    async fn pod_logs(&self, namespace: &str, pod: &str) -> KronResult<String>;

    async fn toggle_suspend(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>>;

    async fn trigger(&self, namespace: &str, cronjob: &str) -> KronResult<Option<NormalizedObject>>;

    async fn upsert_cronjob(&self, namespace: &str, spec: Json) -> KronResult<NormalizedObject>;

    async fn clone_cronjob(&self, namespace: &str, name: &str, new_name: &str) -> KronResult<Option<NormalizedObject>>;

    async fn delete_cronjob(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>>;

    async fn delete_job(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>>;
}

// ----------------- In-process implementation -----------------

/// In-process implementation over an injected backend.
pub struct InProcApi<B: ?Sized> {
    backend: Arc<B>,
    policy: NamespacePolicy,
    clock: fn() -> DateTime<Utc>,
}

impl InProcApi<KubeBackend> {
    /// Connect to the cluster (in-cluster config first, then KUBECONFIG).
    pub async fn connect(policy: NamespacePolicy) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(KubeBackend::connect().await?), policy))
    }
}

impl<B: Backend + ?Sized> InProcApi<B> {
    pub fn new(backend: Arc<B>, policy: NamespacePolicy) -> Self {
        Self { backend, policy, clock: Utc::now }
    }

    /// Replace the reference clock used for ages and manual job names.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn guard(&self, namespace: &str) -> KronResult<()> {
        if self.policy.is_allowed(namespace) {
            return Ok(());
        }
        counter!("kron_denied_total", 1u64);
        warn!(ns = %namespace, "api: namespace denied by policy");
        Err(KronError::Denied { namespace: namespace.to_string() })
    }

    fn remote(op: &'static str, e: BackendError) -> KronError {
        counter!("kron_remote_errors_total", 1u64, "op" => op);
        error!(op, error = %e, "api: remote call failed");
        KronError::Remote(envelope(e))
    }

    fn ops_err(op: &'static str, e: OpsError) -> KronError {
        match e {
            OpsError::Backend(e) => Self::remote(op, e),
            OpsError::Invalid(m) => KronError::Invalid(m),
        }
    }

    fn normalize(w: impl Into<Workload>) -> KronResult<NormalizedObject> {
        w.into().normalize().map_err(|e| KronError::Internal(e.to_string()))
    }

    /// Normalize, keep what `owner` owns (everything when `None`), attach `status.age`.
    fn shape(&self, items: Vec<Workload>, owner: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        let now = self.now();
        let mut out = Vec::with_capacity(items.len());
        for w in items {
            let attach_age = w.has_age();
            let mut obj = Self::normalize(w)?;
            if let Some(owner) = owner {
                if !is_owned_by(&obj, owner) {
                    continue;
                }
            }
            if attach_age {
                let started = obj.pointer("/status/startTime").and_then(Json::as_str).map(str::to_string);
                if let Some(ts) = started {
                    let age = age_since(&ts, now)?;
                    obj.insert_status("age", Json::String(age));
                }
            }
            out.push(obj);
        }
        Ok(out)
    }

    async fn jobs(&self, namespace: &str, cronjob: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        let jobs: Vec<Job> = self.backend.list_jobs(namespace).await.map_err(|e| Self::remote("list_jobs", e))?;
        self.shape(jobs.into_iter().map(Workload::from).collect(), cronjob)
    }

    async fn pods(&self, namespace: &str, job: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        let pods: Vec<Pod> = self.backend.list_pods(namespace).await.map_err(|e| Self::remote("list_pods", e))?;
        self.shape(pods.into_iter().map(Workload::from).collect(), job)
    }
}

#[async_trait::async_trait]
impl<B: Backend + ?Sized> KronApi for InProcApi<B> {
    fn policy(&self) -> &NamespacePolicy {
        &self.policy
    }

    async fn list_namespaces(&self) -> KronResult<Vec<String>> {
        if let Some(allowed) = self.policy.namespaces() {
            return Ok(allowed.map(str::to_string).collect());
        }
        let t0 = Instant::now();
        let list = self.backend.list_namespaces().await.map_err(|e| Self::remote("list_namespaces", e))?;
        let mut names: Vec<String> = list.into_iter().filter_map(|n| n.metadata.name).collect();
        names.sort();
        info!(count = names.len(), took_ms = %t0.elapsed().as_millis(), "api: namespaces listed");
        Ok(names)
    }

    async fn list_cronjobs(&self, namespace: Option<&str>) -> KronResult<Vec<ResourceRef>> {
        let t0 = Instant::now();
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let allowed: Option<Vec<String>> = self.policy.namespaces().map(|it| it.map(str::to_string).collect());
        let cronjobs = match (namespace, allowed) {
            (Some(ns), _) => {
                self.guard(ns)?;
                self.backend.list_cronjobs(Some(ns)).await.map_err(|e| Self::remote("list_cronjobs", e))?
            }
            // Federate: one namespaced list per permitted namespace.
            (None, Some(allowed)) => {
                let mut all = Vec::new();
                for ns in &allowed {
                    all.extend(self.backend.list_cronjobs(Some(ns)).await.map_err(|e| Self::remote("list_cronjobs", e))?);
                }
                all
            }
            (None, None) => self.backend.list_cronjobs(None).await.map_err(|e| Self::remote("list_cronjobs", e))?,
        };
        let mut refs: Vec<ResourceRef> = cronjobs.iter().filter_map(|c| ResourceRef::from_meta(&c.metadata)).collect();
        sort_refs(&mut refs);
        info!(ns = %namespace.unwrap_or("(all)"), count = refs.len(), took_ms = %t0.elapsed().as_millis(), "api: cronjobs listed");
        Ok(refs)
    }

    async fn get_cronjob(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        match self.backend.get_cronjob(namespace, name).await {
            Ok(cj) => Self::normalize(cj).map(Some),
            Err(e) if e.is_not_found() => {
                info!(ns = %namespace, name = %name, "api: cronjob absent");
                Ok(None)
            }
            Err(e) => Err(Self::remote("get_cronjob", e)),
        }
    }

    async fn list_jobs(&self, namespace: &str, cronjob: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        self.guard(namespace)?;
        let t0 = Instant::now();
        let jobs = self.jobs(namespace, cronjob).await?;
        info!(ns = %namespace, cronjob = ?cronjob, count = jobs.len(), took_ms = %t0.elapsed().as_millis(), "api: jobs listed");
        Ok(jobs)
    }

    async fn list_pods(&self, namespace: &str, job: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        self.guard(namespace)?;
        let t0 = Instant::now();
        let pods = self.pods(namespace, job).await?;
        info!(ns = %namespace, job = ?job, count = pods.len(), took_ms = %t0.elapsed().as_millis(), "api: pods listed");
        Ok(pods)
    }

    async fn list_jobs_with_pods(&self, namespace: &str, cronjob: Option<&str>) -> KronResult<Vec<NormalizedObject>> {
        self.guard(namespace)?;
        let t0 = Instant::now();
        let mut jobs = self.jobs(namespace, cronjob).await?;
        // The API has no nested fetch: list pods once and join in memory.
        let pods = self.pods(namespace, None).await?;
        for job in jobs.iter_mut() {
            let owned: Vec<Json> = match job.name() {
                Some(job_name) => pods.iter().filter(|p| is_owned_by(p, job_name)).map(|p| p.as_value().clone()).collect(),
                None => Vec::new(),
            };
            job.insert("pods", Json::Array(owned));
        }
        info!(ns = %namespace, cronjob = ?cronjob, jobs = jobs.len(), pods = pods.len(), took_ms = %t0.elapsed().as_millis(), "api: jobs+pods joined");
        Ok(jobs)
    }

    async fn pod_logs(&self, namespace: &str, pod: &str) -> KronResult<String> {
        self.guard(namespace)?;
        match self.backend.pod_logs(namespace, pod, &LogRequest::default()).await {
            Ok(text) => Ok(text),
            Err(BackendError::NotFound { reason, .. }) => {
                info!(ns = %namespace, pod = %pod, "api: logs unavailable, pod not found");
                Ok(format!("{LOG_PLACEHOLDER_PREFIX} {reason}"))
            }
            Err(e) => Err(Self::remote("pod_logs", e)),
        }
    }

    async fn toggle_suspend(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        let res = kron_ops::toggle_suspend(self.backend.as_ref(), namespace, name).await.map_err(|e| Self::ops_err("toggle_suspend", e))?;
        res.map(Self::normalize).transpose()
    }

    async fn trigger(&self, namespace: &str, cronjob: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        let now = self.now();
        let res = kron_ops::trigger_manual_job(self.backend.as_ref(), namespace, cronjob, now).await.map_err(|e| Self::ops_err("trigger", e))?;
        res.map(Self::normalize).transpose()
    }

    async fn upsert_cronjob(&self, namespace: &str, spec: Json) -> KronResult<NormalizedObject> {
        self.guard(namespace)?;
        let cj = kron_ops::upsert_cronjob(self.backend.as_ref(), namespace, spec).await.map_err(|e| Self::ops_err("upsert_cronjob", e))?;
        Self::normalize(cj)
    }

    async fn clone_cronjob(&self, namespace: &str, name: &str, new_name: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        let res = kron_ops::clone_cronjob(self.backend.as_ref(), namespace, name, new_name).await.map_err(|e| Self::ops_err("clone_cronjob", e))?;
        res.map(Self::normalize).transpose()
    }

    async fn delete_cronjob(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        let res = kron_ops::delete_cronjob(self.backend.as_ref(), namespace, name).await.map_err(|e| Self::ops_err("delete_cronjob", e))?;
        Ok(res.map(NormalizedObject::from_value))
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> KronResult<Option<NormalizedObject>> {
        self.guard(namespace)?;
        let res = kron_ops::delete_job(self.backend.as_ref(), namespace, name).await.map_err(|e| Self::ops_err("delete_job", e))?;
        Ok(res.map(NormalizedObject::from_value))
    }
}
