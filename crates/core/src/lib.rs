//! Kron core types: namespace policy, object normalization, ownership and age.
//!
//! Everything here is pure and synchronous. Remote access lives in `kron-kubehub`,
//! composition and the namespace guard live in `kron_api`.

#![forbid(unsafe_code)]

pub mod age;
pub mod config;
pub mod error;
pub mod normalize;
pub mod owner;
pub mod policy;
pub mod workload;

use serde::{Deserialize, Serialize};

pub use age::{age_since, AgeError};
pub use config::{ConfigError, PolicyConfig};
pub use error::ErrorEnvelope;
pub use normalize::{normalize, project_fields, strip_mutable_state, NormalizedObject};
pub use owner::{is_owned_by, LABEL_CREATED_FROM, LABEL_MANUALLY_TRIGGERED};
pub use policy::NamespacePolicy;
pub use workload::{Workload, WorkloadKind};

/// Minimal identity used for summary listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceRef {
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Build from an object's metadata; objects without a name are skipped by callers.
    pub fn from_meta(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> Option<Self> {
        Some(Self { name: meta.name.clone()?, namespace: meta.namespace.clone() })
    }
}

/// Sort refs by name for deterministic listings; namespace breaks ties.
pub fn sort_refs(refs: &mut [ResourceRef]) {
    refs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.namespace.cmp(&b.namespace)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_sort_by_name_then_namespace() {
        let mut refs = vec![
            ResourceRef { name: "b".into(), namespace: Some("qa".into()) },
            ResourceRef { name: "a".into(), namespace: Some("prod".into()) },
            ResourceRef { name: "a".into(), namespace: Some("dev".into()) },
        ];
        sort_refs(&mut refs);
        let got: Vec<_> = refs.iter().map(|r| (r.name.as_str(), r.namespace.as_deref().unwrap_or(""))).collect();
        assert_eq!(got, vec![("a", "dev"), ("a", "prod"), ("b", "qa")]);
    }
}
