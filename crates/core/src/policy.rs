//! Namespace access policy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Optional allow-list of namespaces. `None` means unrestricted.
///
/// Loaded once at process start and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePolicy {
    allowed: Option<BTreeSet<String>>,
}

impl NamespacePolicy {
    pub fn unrestricted() -> Self {
        Self { allowed: None }
    }

    /// Build from an allow-list. Blank entries are dropped; an empty list is unrestricted.
    pub fn allow<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = namespaces
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { allowed: if set.is_empty() { None } else { Some(set) } }
    }

    /// Parse a comma separated list such as `"qa,prod"`.
    pub fn from_csv(csv: &str) -> Self {
        Self::allow(csv.split(','))
    }

    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn is_allowed(&self, namespace: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(set) => set.contains(namespace),
        }
    }

    /// Permitted namespaces in ascending order, if restricted.
    pub fn namespaces(&self) -> Option<impl Iterator<Item = &str>> {
        self.allowed.as_ref().map(|set| set.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_membership() {
        let p = NamespacePolicy::allow(["qa", "prod"]);
        assert!(p.is_restricted());
        assert!(!p.is_allowed("test"));
        assert!(p.is_allowed("qa"));
        assert!(p.is_allowed("prod"));
    }

    #[test]
    fn membership_is_case_sensitive() {
        let p = NamespacePolicy::allow(["qa"]);
        assert!(!p.is_allowed("QA"));
    }

    #[test]
    fn unset_or_empty_is_unrestricted() {
        assert!(NamespacePolicy::unrestricted().is_allowed("anything"));
        assert!(NamespacePolicy::default().is_allowed("kube-system"));
        let empty = NamespacePolicy::from_csv(" , ,");
        assert!(!empty.is_restricted());
        assert!(empty.is_allowed("anything"));
    }

    #[test]
    fn csv_trims_and_sorts() {
        let p = NamespacePolicy::from_csv("prod, qa ,dev");
        let ns: Vec<_> = p.namespaces().expect("restricted").collect();
        assert_eq!(ns, vec!["dev", "prod", "qa"]);
    }
}
