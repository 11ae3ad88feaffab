#![forbid(unsafe_code)]

mod common;

use std::sync::Arc;

use common::*;
use kron_api::{KronApi, KronError, NamespacePolicy};
use kron_kubehub::{BackendError, MockBackend, Op};
use serde_json::json;

fn label<'a>(obj: &'a kron_api::NormalizedObject, key: &str) -> Option<&'a str> {
    obj.as_value().get("metadata")?.get("labels")?.get(key)?.as_str()
}

#[tokio::test]
async fn triggered_job_is_labelled_and_listed_under_its_cronjob() {
    let mock = Arc::new(MockBackend::new().with_cronjob(cronjob("qa", "nightly")));
    let api = api(mock.clone(), NamespacePolicy::allow(["qa"]));
    let job = api.trigger("qa", "nightly").await.unwrap().expect("cronjob exists");
    assert_eq!(job.name(), Some("nightly-manual-20230101120000-000000"));
    assert_eq!(label(&job, "created-from"), Some("nightly"));
    assert_eq!(label(&job, "manually-triggered"), Some("true"));
    assert_eq!(label(&job, "app"), Some("nightly"));
    assert_eq!(job.pointer("/spec/backoffLimit").and_then(|v| v.as_i64()), Some(1));

    // No owner reference, found through the label; not started yet so no age.
    let jobs = api.list_jobs("qa", Some("nightly")).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].pointer("/status/age").is_none());
    assert_eq!(mock.calls(Op::CreateJob), 1);
}

#[tokio::test]
async fn trigger_of_absent_cronjob_creates_nothing() {
    let mock = Arc::new(MockBackend::new());
    let api = api(mock.clone(), NamespacePolicy::unrestricted());
    assert!(api.trigger("qa", "ghost").await.unwrap().is_none());
    assert_eq!(mock.calls(Op::CreateJob), 0);
}

#[tokio::test]
async fn trigger_create_failure_keeps_upstream_status() {
    let err = BackendError::Api { code: 403, status: "Failure".into(), reason: "Forbidden".into(), message: "jobs.batch is forbidden".into() };
    let mock = Arc::new(MockBackend::new().with_cronjob(cronjob("qa", "nightly")).failing(Op::CreateJob, err));
    let api = api(mock, NamespacePolicy::unrestricted());
    match api.trigger("qa", "nightly").await {
        Err(e @ KronError::Remote(_)) => {
            assert_eq!(e.http_status(), 500);
            let KronError::Remote(env) = e else { unreachable!() };
            assert_eq!((env.status, env.reason.as_str()), (403, "Forbidden"));
        }
        other => panic!("expected envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn toggle_round_trips_through_the_api() {
    let mock = Arc::new(MockBackend::new().with_cronjob(cronjob("qa", "nightly")));
    let api = api(mock, NamespacePolicy::unrestricted());
    let once = api.toggle_suspend("qa", "nightly").await.unwrap().unwrap();
    assert_eq!(once.pointer("/spec/suspend"), Some(&json!(true)));
    let twice = api.toggle_suspend("qa", "nightly").await.unwrap().unwrap();
    assert_eq!(twice.pointer("/spec/suspend"), Some(&json!(false)));
    assert!(api.toggle_suspend("qa", "ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_creates_then_patches() {
    let mock = Arc::new(MockBackend::new());
    let api = api(mock.clone(), NamespacePolicy::unrestricted());
    let doc = json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {"name": "report", "namespace": "elsewhere"},
        "spec": {"schedule": "0 1 * * *", "jobTemplate": {"spec": {}}}
    });
    let created = api.upsert_cronjob("qa", doc).await.unwrap();
    assert_eq!(created.namespace(), Some("qa"));
    assert_eq!((mock.calls(Op::CreateCronJob), mock.calls(Op::PatchCronJob)), (1, 0));

    // Feed the read-back object in again, server state included.
    let mut edited = api.get_cronjob("qa", "report").await.unwrap().unwrap().into_value();
    edited["spec"]["schedule"] = json!("0 2 * * *");
    let patched = api.upsert_cronjob("qa", edited).await.unwrap();
    assert_eq!(patched.pointer("/spec/schedule"), Some(&json!("0 2 * * *")));
    assert_eq!((mock.calls(Op::CreateCronJob), mock.calls(Op::PatchCronJob)), (1, 1));
}

#[tokio::test]
async fn upsert_without_name_is_invalid() {
    let mock = Arc::new(MockBackend::new());
    let api = api(mock.clone(), NamespacePolicy::unrestricted());
    let err = api.upsert_cronjob("qa", json!({"spec": {"schedule": "* * * * *"}})).await.unwrap_err();
    assert!(matches!(err, KronError::Invalid(_)));
    assert_eq!(err.http_status(), 400);
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn clone_copies_template_under_new_name() {
    let mock = Arc::new(MockBackend::new().with_cronjob(cronjob("qa", "nightly")));
    let api = api(mock.clone(), NamespacePolicy::unrestricted());
    let copy = api.clone_cronjob("qa", "nightly", "nightly-copy").await.unwrap().unwrap();
    assert_eq!(copy.name(), Some("nightly-copy"));
    assert_eq!(copy.pointer("/spec/schedule"), Some(&json!("0 3 * * *")));
    assert_ne!(copy.pointer("/metadata/uid"), Some(&json!("uid-nightly")));
    assert!(mock.cronjob("qa", "nightly").is_some());
    assert!(api.clone_cronjob("qa", "ghost", "x").await.unwrap().is_none());
}

#[tokio::test]
async fn deletes_return_the_object_or_none() {
    let mock = Arc::new(
        MockBackend::new()
            .with_cronjob(cronjob("qa", "nightly"))
            .with_job(scheduled_job("qa", "nightly-1", "nightly", chrono::Duration::hours(1))),
    );
    let api = api(mock.clone(), NamespacePolicy::unrestricted());
    let gone = api.delete_cronjob("qa", "nightly").await.unwrap().unwrap();
    assert_eq!(gone.name(), Some("nightly"));
    assert!(api.delete_cronjob("qa", "nightly").await.unwrap().is_none());

    let job = api.delete_job("qa", "nightly-1").await.unwrap().unwrap();
    assert!(job.pointer("/metadata/managedFields").is_none());
    assert!(api.delete_job("qa", "nightly-1").await.unwrap().is_none());
    assert!(mock.jobs_in("qa").is_empty());
}
