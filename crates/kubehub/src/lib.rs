//! Kron kubehub: the remote orchestration API as injected capabilities.
//!
//! One trait per remote capability. [`KubeBackend`] talks to a live cluster through
//! kube-rs; [`MockBackend`] keeps objects in memory and counts calls for tests.
//! Absence is reported as [`BackendError::NotFound`]; callers decide whether that is
//! a sentinel or a failure.

#![forbid(unsafe_code)]

mod kube_backend;
mod mock;

use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use serde_json::Value as Json;

pub use kube_backend::{get_kube_client, KubeBackend};
pub use mock::{MockBackend, Op};

/// Lines of log tail fetched for a pod.
pub const LOG_TAIL_LINES: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {message}")]
    NotFound { reason: String, message: String },
    #[error("api error {code} ({reason}): {message}")]
    Api { code: u16, status: String, reason: String, message: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("transport: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        BackendError::NotFound { reason: "NotFound".into(), message: format!("{kind} \"{name}\" not found") }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<kube::Error> for BackendError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) if ae.code == 404 => BackendError::NotFound { reason: ae.reason, message: ae.message },
            kube::Error::Api(ae) => BackendError::Api { code: ae.code, status: ae.status, reason: ae.reason, message: ae.message },
            kube::Error::SerdeError(e) => BackendError::Decode(e.to_string()),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Options for a one-shot log read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub tail_lines: Option<i64>,
    pub timestamps: bool,
}

impl Default for LogRequest {
    fn default() -> Self {
        Self { tail_lines: Some(LOG_TAIL_LINES), timestamps: true }
    }
}

/// CronJob reader/writer.
#[async_trait::async_trait]
pub trait CronJobStore: Send + Sync {
    /// List CronJobs in `namespace`, or cluster-wide when `None`.
    async fn list_cronjobs(&self, namespace: Option<&str>) -> BackendResult<Vec<CronJob>>;
    async fn get_cronjob(&self, namespace: &str, name: &str) -> BackendResult<CronJob>;
    async fn create_cronjob(&self, namespace: &str, cronjob: &CronJob) -> BackendResult<CronJob>;
    /// JSON merge patch.
    async fn patch_cronjob(&self, namespace: &str, name: &str, patch: &Json) -> BackendResult<CronJob>;
    /// Returns the deleted object or the server's deletion status.
    async fn delete_cronjob(&self, namespace: &str, name: &str) -> BackendResult<Json>;
}

/// Job reader/writer.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    async fn list_jobs(&self, namespace: &str) -> BackendResult<Vec<Job>>;
    async fn create_job(&self, namespace: &str, job: &Job) -> BackendResult<Job>;
    async fn delete_job(&self, namespace: &str, name: &str) -> BackendResult<Json>;
}

#[async_trait::async_trait]
pub trait PodReader: Send + Sync {
    async fn list_pods(&self, namespace: &str) -> BackendResult<Vec<Pod>>;
}

#[async_trait::async_trait]
pub trait LogReader: Send + Sync {
    async fn pod_logs(&self, namespace: &str, pod: &str, req: &LogRequest) -> BackendResult<String>;
}

#[async_trait::async_trait]
pub trait NamespaceReader: Send + Sync {
    async fn list_namespaces(&self) -> BackendResult<Vec<Namespace>>;
}

/// Every capability the accessors and mutators need.
pub trait Backend: CronJobStore + JobStore + PodReader + LogReader + NamespaceReader {}

impl<T> Backend for T where T: CronJobStore + JobStore + PodReader + LogReader + NamespaceReader {}
