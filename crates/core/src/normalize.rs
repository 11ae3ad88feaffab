//! Object normalizer: typed API objects to canonical JSON mappings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Metadata fields projected into lightweight listings when none are requested.
pub const DEFAULT_FIELDS: &[&str] = &["name"];

/// Canonical mapping form of a CronJob, Job or Pod.
///
/// Never carries `metadata.managedFields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedObject(Json);

impl NormalizedObject {
    /// Wrap a raw mapping, stripping volatile fields.
    pub fn from_value(mut raw: Json) -> Self {
        strip_managed_fields(&mut raw);
        Self(raw)
    }

    pub fn as_value(&self) -> &Json {
        &self.0
    }

    pub fn into_value(self) -> Json {
        self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.pointer("/metadata/name").and_then(Json::as_str)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.pointer("/metadata/namespace").and_then(Json::as_str)
    }

    pub fn pointer(&self, path: &str) -> Option<&Json> {
        self.0.pointer(path)
    }

    /// Set a top-level field, e.g. `pods` on a Job. No-op unless the object is a mapping.
    pub fn insert(&mut self, key: &str, value: Json) {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }

    /// Set `status.<key>`, creating `status` if needed.
    pub fn insert_status(&mut self, key: &str, value: Json) {
        let Some(obj) = self.0.as_object_mut() else { return };
        let status = obj.entry("status").or_insert_with(|| Json::Object(Map::new()));
        if let Some(s) = status.as_object_mut() {
            s.insert(key.to_string(), value);
        }
    }
}

impl From<NormalizedObject> for Json {
    fn from(v: NormalizedObject) -> Self {
        v.0
    }
}

fn strip_managed_fields(v: &mut Json) {
    if let Some(meta) = v.get_mut("metadata").and_then(Json::as_object_mut) {
        meta.remove("managedFields");
    }
}

/// Serialize an API object and drop `metadata.managedFields`.
pub fn normalize<T: Serialize>(api_object: &T) -> serde_json::Result<NormalizedObject> {
    Ok(NormalizedObject::from_value(serde_json::to_value(api_object)?))
}

/// Project each item down to the requested top-level metadata fields.
/// Missing fields project to `null`.
pub fn project_fields(items: &[NormalizedObject], fields: &[&str]) -> Vec<Map<String, Json>> {
    let fields = if fields.is_empty() { DEFAULT_FIELDS } else { fields };
    items
        .iter()
        .map(|item| {
            let meta = item.0.get("metadata");
            fields
                .iter()
                .map(|f| ((*f).to_string(), meta.and_then(|m| m.get(*f)).cloned().unwrap_or(Json::Null)))
                .collect::<Map<String, Json>>()
        })
        .collect()
}

/// Remove server-assigned state before resubmitting an object as a create/update payload:
/// `status`, `metadata.uid` and `metadata.resourceVersion`.
pub fn strip_mutable_state(mut spec: Json) -> Json {
    if let Some(obj) = spec.as_object_mut() {
        obj.remove("status");
        if let Some(meta) = obj.get_mut("metadata").and_then(Json::as_object_mut) {
            meta.remove("uid");
            meta.remove("resourceVersion");
        }
    }
    spec
}
