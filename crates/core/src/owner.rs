//! Parent/child ownership between CronJobs, Jobs and Pods.

use serde_json::Value as Json;

use crate::NormalizedObject;

/// Lineage label written on manually triggered Jobs, naming the source CronJob.
pub const LABEL_CREATED_FROM: &str = "created-from";
/// Marker label on manually triggered Jobs.
pub const LABEL_MANUALLY_TRIGGERED: &str = "manually-triggered";

/// True when the first owner reference names `owner`, or the `created-from` label does.
///
/// Manually triggered Jobs carry no owner reference, hence the label fallback.
pub fn is_owned_by(obj: &NormalizedObject, owner: &str) -> bool {
    let first_owner = obj
        .pointer("/metadata/ownerReferences")
        .and_then(Json::as_array)
        .and_then(|refs| refs.first())
        .and_then(|r| r.get("name"))
        .and_then(Json::as_str);
    if first_owner == Some(owner) {
        return true;
    }
    obj.pointer("/metadata/labels")
        .and_then(|l| l.get(LABEL_CREATED_FROM))
        .and_then(Json::as_str)
        == Some(owner)
}
