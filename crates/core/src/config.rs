//! Process-start configuration for the namespace policy.

use crate::NamespacePolicy;

pub const ENV_ALLOW_NAMESPACES: &str = "KRON_ALLOW_NAMESPACES";
pub const ENV_NAMESPACE_ONLY: &str = "KRON_NAMESPACE_ONLY";
pub const ENV_NAMESPACE: &str = "KRON_NAMESPACE";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("KRON_NAMESPACE is not set but namespace-only mode was requested")]
    MissingInstallNamespace,
}

/// Raw policy settings as read from flags or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Comma separated allow-list.
    pub allow_namespaces: Option<String>,
    /// Restrict access to the installation namespace only. Supersedes `allow_namespaces`.
    pub namespace_only: bool,
    /// Installation namespace, required when `namespace_only` is set.
    pub namespace: Option<String>,
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        Self {
            allow_namespaces: std::env::var(ENV_ALLOW_NAMESPACES).ok(),
            namespace_only: std::env::var(ENV_NAMESPACE_ONLY).ok().map(|v| truthy(&v)).unwrap_or(false),
            namespace: std::env::var(ENV_NAMESPACE).ok().filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn resolve(&self) -> Result<NamespacePolicy, ConfigError> {
        if self.namespace_only {
            let ns = self.namespace.as_deref().ok_or(ConfigError::MissingInstallNamespace)?;
            return Ok(NamespacePolicy::allow([ns]));
        }
        Ok(match self.allow_namespaces.as_deref() {
            Some(csv) => NamespacePolicy::from_csv(csv),
            None => NamespacePolicy::unrestricted(),
        })
    }
}

pub fn truthy(v: &str) -> bool {
    !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}
