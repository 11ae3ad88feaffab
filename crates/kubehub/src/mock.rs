//! In-memory backend for tests: seeded objects, per-operation call counters, failure injection.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value as Json;

use crate::{BackendError, BackendResult, CronJobStore, JobStore, LogReader, LogRequest, NamespaceReader, PodReader};

/// Remote operations the mock counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListCronJobs,
    GetCronJob,
    CreateCronJob,
    PatchCronJob,
    DeleteCronJob,
    ListJobs,
    CreateJob,
    DeleteJob,
    ListPods,
    PodLogs,
    ListNamespaces,
}

type Key = (String, String);

#[derive(Default)]
struct State {
    cronjobs: BTreeMap<Key, CronJob>,
    jobs: BTreeMap<Key, Job>,
    pods: BTreeMap<Key, Pod>,
    logs: HashMap<Key, String>,
    namespaces: BTreeSet<String>,
    calls: HashMap<Op, usize>,
    cronjob_scopes: Vec<Option<String>>,
    failures: HashMap<Op, BackendError>,
    last_log_request: Option<LogRequest>,
    rv: u64,
}

impl State {
    fn hit(&mut self, op: Op) -> BackendResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get(&op) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stamp(&mut self, meta: &mut ObjectMeta, namespace: &str) {
        self.rv += 1;
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(self.rv.to_string());
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
    }
}

fn key_of(meta: &ObjectMeta) -> Key {
    (meta.namespace.clone().unwrap_or_else(|| "default".to_string()), meta.name.clone().unwrap_or_default())
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn already_exists(kind: &str, name: &str) -> BackendError {
    BackendError::Api {
        code: 409,
        status: "Failure".into(),
        reason: "AlreadyExists".into(),
        message: format!("{kind} \"{name}\" already exists"),
    }
}

fn in_namespace<'a, T>(map: &'a BTreeMap<Key, T>, namespace: &'a str) -> impl Iterator<Item = &'a T> + 'a {
    map.iter().filter(move |((ns, _), _)| ns == namespace).map(|(_, v)| v)
}

/// Simple in-memory mock implementation for tests.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<State>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_cronjob(self, cronjob: CronJob) -> Self {
        self.lock().cronjobs.insert(key_of(&cronjob.metadata), cronjob);
        self
    }

    pub fn with_job(self, job: Job) -> Self {
        self.lock().jobs.insert(key_of(&job.metadata), job);
        self
    }

    pub fn with_pod(self, pod: Pod) -> Self {
        self.lock().pods.insert(key_of(&pod.metadata), pod);
        self
    }

    pub fn with_logs(self, namespace: &str, pod: &str, text: &str) -> Self {
        self.lock().logs.insert(key(namespace, pod), text.to_string());
        self
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        self.lock().namespaces.insert(namespace.to_string());
        self
    }

    /// Make every call of `op` fail with `err`.
    pub fn failing(self, op: Op, err: BackendError) -> Self {
        self.lock().failures.insert(op, err);
        self
    }

    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Namespace argument of each `list_cronjobs` call, in call order.
    pub fn cronjob_list_scopes(&self) -> Vec<Option<String>> {
        self.lock().cronjob_scopes.clone()
    }

    pub fn last_log_request(&self) -> Option<LogRequest> {
        self.lock().last_log_request.clone()
    }

    pub fn cronjob(&self, namespace: &str, name: &str) -> Option<CronJob> {
        self.lock().cronjobs.get(&key(namespace, name)).cloned()
    }

    pub fn jobs_in(&self, namespace: &str) -> Vec<Job> {
        in_namespace(&self.lock().jobs, namespace).cloned().collect()
    }
}

#[async_trait::async_trait]
impl CronJobStore for MockBackend {
    async fn list_cronjobs(&self, namespace: Option<&str>) -> BackendResult<Vec<CronJob>> {
        let mut st = self.lock();
        st.cronjob_scopes.push(namespace.map(str::to_string));
        st.hit(Op::ListCronJobs)?;
        Ok(match namespace {
            Some(ns) => in_namespace(&st.cronjobs, ns).cloned().collect(),
            None => st.cronjobs.values().cloned().collect(),
        })
    }

    async fn get_cronjob(&self, namespace: &str, name: &str) -> BackendResult<CronJob> {
        let mut st = self.lock();
        st.hit(Op::GetCronJob)?;
        st.cronjobs.get(&key(namespace, name)).cloned().ok_or_else(|| BackendError::not_found("cronjobs.batch", name))
    }

    async fn create_cronjob(&self, namespace: &str, cronjob: &CronJob) -> BackendResult<CronJob> {
        let mut st = self.lock();
        st.hit(Op::CreateCronJob)?;
        let name = cronjob.metadata.name.clone().unwrap_or_default();
        if st.cronjobs.contains_key(&key(namespace, &name)) {
            return Err(already_exists("cronjobs.batch", &name));
        }
        let mut created = cronjob.clone();
        st.stamp(&mut created.metadata, namespace);
        st.cronjobs.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn patch_cronjob(&self, namespace: &str, name: &str, patch: &Json) -> BackendResult<CronJob> {
        let mut st = self.lock();
        st.hit(Op::PatchCronJob)?;
        let current = st.cronjobs.get(&key(namespace, name)).ok_or_else(|| BackendError::not_found("cronjobs.batch", name))?;
        let mut doc = serde_json::to_value(current)?;
        json_patch::merge(&mut doc, patch);
        let mut patched: CronJob = serde_json::from_value(doc)?;
        st.stamp(&mut patched.metadata, namespace);
        st.cronjobs.insert(key(namespace, name), patched.clone());
        Ok(patched)
    }

    async fn delete_cronjob(&self, namespace: &str, name: &str) -> BackendResult<Json> {
        let mut st = self.lock();
        st.hit(Op::DeleteCronJob)?;
        let removed = st.cronjobs.remove(&key(namespace, name)).ok_or_else(|| BackendError::not_found("cronjobs.batch", name))?;
        Ok(serde_json::to_value(removed)?)
    }
}

#[async_trait::async_trait]
impl JobStore for MockBackend {
    async fn list_jobs(&self, namespace: &str) -> BackendResult<Vec<Job>> {
        let mut st = self.lock();
        st.hit(Op::ListJobs)?;
        Ok(in_namespace(&st.jobs, namespace).cloned().collect())
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> BackendResult<Job> {
        let mut st = self.lock();
        st.hit(Op::CreateJob)?;
        let name = job.metadata.name.clone().unwrap_or_default();
        if st.jobs.contains_key(&key(namespace, &name)) {
            return Err(already_exists("jobs.batch", &name));
        }
        let mut created = job.clone();
        st.stamp(&mut created.metadata, namespace);
        st.jobs.insert(key(namespace, &name), created.clone());
        Ok(created)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> BackendResult<Json> {
        let mut st = self.lock();
        st.hit(Op::DeleteJob)?;
        let removed = st.jobs.remove(&key(namespace, name)).ok_or_else(|| BackendError::not_found("jobs.batch", name))?;
        Ok(serde_json::to_value(removed)?)
    }
}

#[async_trait::async_trait]
impl PodReader for MockBackend {
    async fn list_pods(&self, namespace: &str) -> BackendResult<Vec<Pod>> {
        let mut st = self.lock();
        st.hit(Op::ListPods)?;
        Ok(in_namespace(&st.pods, namespace).cloned().collect())
    }
}

#[async_trait::async_trait]
impl LogReader for MockBackend {
    async fn pod_logs(&self, namespace: &str, pod: &str, req: &LogRequest) -> BackendResult<String> {
        let mut st = self.lock();
        st.last_log_request = Some(req.clone());
        st.hit(Op::PodLogs)?;
        st.logs.get(&key(namespace, pod)).cloned().ok_or_else(|| BackendError::not_found("pods", pod))
    }
}

#[async_trait::async_trait]
impl NamespaceReader for MockBackend {
    async fn list_namespaces(&self) -> BackendResult<Vec<Namespace>> {
        let mut st = self.lock();
        st.hit(Op::ListNamespaces)?;
        Ok(st
            .namespaces
            .iter()
            .map(|ns| Namespace { metadata: ObjectMeta { name: Some(ns.clone()), ..Default::default() }, ..Default::default() })
            .collect())
    }
}
