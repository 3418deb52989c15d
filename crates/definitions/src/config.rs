//! Static resolver configuration.
//!
//! The well-known namespaces are configuration, not mutable global state: a
//! [`ResolverConfig`] is built once (usually deserialised by the composition
//! root) and handed to the resolver and to root contexts.

use serde::{Deserialize, Serialize};

use crate::naming::validate_qualified_name;
use crate::Namespace;

/// Platform-reserved namespace searched last for definitions.
pub const SYSTEM_DEFINITION_NAMESPACE: &str = "vela-system";

/// Namespace assumed for applications that arrive without one.
pub const DEFAULT_APP_NAMESPACE: &str = "default";

/// Annotation that opts a caller into auto-update resolution.
pub const ANNOTATION_AUTO_UPDATE: &str = "app.oam.dev/autoUpdate";

/// What the resolver does when a pinned revision exists in no namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRevisionPolicy {
    /// Return [`crate::ResolveError::NotFound`].
    #[default]
    Fail,
    /// Fall back to the live, unversioned definition.
    UseLive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub system_namespace: Namespace,
    pub default_app_namespace: Namespace,
    pub missing_revision: MissingRevisionPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            system_namespace: Namespace::from_validated(SYSTEM_DEFINITION_NAMESPACE.to_string()),
            default_app_namespace: Namespace::from_validated(DEFAULT_APP_NAMESPACE.to_string()),
            missing_revision: MissingRevisionPolicy::Fail,
        }
    }
}

impl ResolverConfig {
    /// Checks that both namespaces are usable store names.
    ///
    /// Returns one message per problem; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (field, ns) in [
            ("system_namespace", &self.system_namespace),
            ("default_app_namespace", &self.default_app_namespace),
        ] {
            let errs = validate_qualified_name(ns.as_str());
            if ns.as_str().contains('/') || !errs.is_empty() {
                problems.push(format!(
                    "{field} \"{ns}\" is not a valid namespace: {}",
                    if errs.is_empty() {
                        "must not contain '/'".to_string()
                    } else {
                        errs.join(",")
                    }
                ));
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let cfg: ResolverConfig = serde_json::from_str(r#"{"missing_revision":"use_live"}"#).unwrap();
        assert_eq!(cfg.system_namespace.as_str(), SYSTEM_DEFINITION_NAMESPACE);
        assert_eq!(cfg.default_app_namespace.as_str(), DEFAULT_APP_NAMESPACE);
        assert_eq!(cfg.missing_revision, MissingRevisionPolicy::UseLive);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn rejects_unusable_namespaces() {
        let cfg: ResolverConfig =
            serde_json::from_str(r#"{"system_namespace":"kube/system"}"#).unwrap();
        let problems = cfg.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("system_namespace"));

        let cfg: ResolverConfig =
            serde_json::from_str(r#"{"default_app_namespace":"-bad-"}"#).unwrap();
        assert_eq!(cfg.validate().len(), 1);
    }
}
