use anyhow::{Context, Result};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::{
    api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams},
    Client,
};
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::{BackendResult, CronJobStore, JobStore, LogReader, LogRequest, NamespaceReader, PodReader};

/// Build a client from the in-cluster service account, falling back to KUBECONFIG.
pub async fn get_kube_client() -> Result<Client> {
    let client = Client::try_default().await.context("building kube client (in-cluster or KUBECONFIG)")?;
    info!(default_ns = %client.default_namespace(), "kube client ready");
    Ok(client)
}

/// Live backend using kube-rs typed APIs. One remote call per method, no retries.
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect() -> Result<Self> {
        Ok(Self::new(get_kube_client().await?))
    }

    fn cronjobs(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

// Deletion answers with either the object (finalizers pending) or a Status.
fn deleted_to_json<K: serde::Serialize, S: serde::Serialize>(res: either::Either<K, S>) -> BackendResult<Json> {
    Ok(res.either(|obj| serde_json::to_value(obj), |status| serde_json::to_value(status))?)
}

#[async_trait::async_trait]
impl CronJobStore for KubeBackend {
    async fn list_cronjobs(&self, namespace: Option<&str>) -> BackendResult<Vec<CronJob>> {
        let api: Api<CronJob> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;
        debug!(ns = ?namespace, count = list.items.len(), "cronjobs listed");
        Ok(list.items)
    }

    async fn get_cronjob(&self, namespace: &str, name: &str) -> BackendResult<CronJob> {
        Ok(self.cronjobs(namespace).get(name).await?)
    }

    async fn create_cronjob(&self, namespace: &str, cronjob: &CronJob) -> BackendResult<CronJob> {
        Ok(self.cronjobs(namespace).create(&PostParams::default(), cronjob).await?)
    }

    async fn patch_cronjob(&self, namespace: &str, name: &str, patch: &Json) -> BackendResult<CronJob> {
        Ok(self.cronjobs(namespace).patch(name, &PatchParams::default(), &Patch::Merge(patch)).await?)
    }

    async fn delete_cronjob(&self, namespace: &str, name: &str) -> BackendResult<Json> {
        deleted_to_json(self.cronjobs(namespace).delete(name, &DeleteParams::default()).await?)
    }
}

#[async_trait::async_trait]
impl JobStore for KubeBackend {
    async fn list_jobs(&self, namespace: &str) -> BackendResult<Vec<Job>> {
        let list = self.jobs(namespace).list(&ListParams::default()).await?;
        debug!(ns = %namespace, count = list.items.len(), "jobs listed");
        Ok(list.items)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> BackendResult<Job> {
        Ok(self.jobs(namespace).create(&PostParams::default(), job).await?)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> BackendResult<Json> {
        // Background propagation so the Job's pods go with it.
        let dp = DeleteParams::background();
        deleted_to_json(self.jobs(namespace).delete(name, &dp).await?)
    }
}

#[async_trait::async_trait]
impl PodReader for KubeBackend {
    async fn list_pods(&self, namespace: &str) -> BackendResult<Vec<Pod>> {
        let list = self.pods(namespace).list(&ListParams::default()).await?;
        debug!(ns = %namespace, count = list.items.len(), "pods listed");
        Ok(list.items)
    }
}

#[async_trait::async_trait]
impl LogReader for KubeBackend {
    async fn pod_logs(&self, namespace: &str, pod: &str, req: &LogRequest) -> BackendResult<String> {
        let lp = LogParams { tail_lines: req.tail_lines, timestamps: req.timestamps, ..LogParams::default() };
        Ok(self.pods(namespace).logs(pod, &lp).await?)
    }
}

#[async_trait::async_trait]
impl NamespaceReader for KubeBackend {
    async fn list_namespaces(&self) -> BackendResult<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }
}
