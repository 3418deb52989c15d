//! Error and retry-policy types for definition resolution.
//!
//! [`StoreError`] is what a [`crate::ResourceAccessor`] reports; the resolver
//! branches on [`StoreError::NotFound`] and passes everything else through.
//! [`ResolveError`] is what callers of the resolver see.
//!
//! [`RetryPolicy`] tells the caller (typically a reconciliation loop) whether
//! re-invoking the resolver later could succeed. The resolver itself never
//! retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DefinitionKind, Namespace, ObjectName, ResourceKind};

/// Message the store returns when a namespaced kind is fetched without a
/// namespace. The legacy cluster-scope fallback suppresses exactly this error.
pub const EMPTY_NAMESPACE_MESSAGE: &str =
    "an empty namespace may not be set when a resource name is provided";

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable`: transport failures and throttling by the store.
/// - `NonRetryable`: invalid names, corrupt stored versions, missing
///   revisions, permission failures, cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// Retrying without an external change will fail the same way.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Failures reported by the resource store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No object with this name exists in the requested scope.
    #[error("{kind} \"{name}\" not found in {}", display_scope(.namespace.as_ref()))]
    NotFound {
        kind: ResourceKind,
        /// `None` when the lookup was cluster-scoped.
        namespace: Option<Namespace>,
        name: ObjectName,
    },

    /// The request itself was rejected by the store's validation.
    #[error("{message}")]
    Invalid { message: String },

    /// The caller lacks permission for the request.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// The store could not be reached or answered with a server-side failure.
    #[error("store transport failure: {message}")]
    Transport {
        message: String,
        /// Back-off hint from the store, if it sent one.
        retry_after: Option<Duration>,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// `true` only for the store's rejection of a namespace-less lookup of a
    /// namespaced kind.
    pub fn is_empty_namespace_rejection(&self) -> bool {
        matches!(self, StoreError::Invalid { message } if message == EMPTY_NAMESPACE_MESSAGE)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            StoreError::Transport { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            StoreError::NotFound { .. } | StoreError::Invalid { .. } | StoreError::Forbidden { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

fn display_scope(namespace: Option<&Namespace>) -> String {
    match namespace {
        Some(ns) => format!("namespace \"{ns}\""),
        None => "cluster scope".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Resolver errors
// ---------------------------------------------------------------------------

/// Errors returned by the resolver's public operations.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A reference or constructed revision name fails resource-name validation.
    #[error("invalid definition revision name {name}: {}", .messages.join(","))]
    InvalidName { name: String, messages: Vec<String> },

    /// A stored revision name carries a version suffix that is not a semantic
    /// version. Indicates corrupt data upstream.
    #[error("revision {revision} has invalid version \"{version}\": {reason}")]
    InvalidVersion {
        revision: String,
        version: String,
        reason: String,
    },

    /// No matching revision exists in any of the searched namespaces.
    #[error(
        "no {kind} definition revision matching \"{name}\" found in namespaces [{}]",
        display_namespaces(.namespaces)
    )]
    NotFound {
        name: String,
        kind: DefinitionKind,
        namespaces: Vec<Namespace>,
        /// The first store-level not-found, when the failure came from a fetch.
        #[source]
        source: Option<StoreError>,
    },

    /// Any other store failure, passed through unchanged.
    #[error(transparent)]
    Upstream(#[from] StoreError),

    /// The call context was cancelled before the store answered.
    #[error("definition resolution was cancelled")]
    Cancelled,

    /// The call context's deadline passed before the store answered.
    #[error("definition resolution exceeded its deadline")]
    DeadlineExceeded,

    /// The store returned an object of a different kind than was asked for.
    #[error("store returned a {found} where a {expected} was expected")]
    UnexpectedResource {
        expected: ResourceKind,
        found: ResourceKind,
    },

    /// A revision was found under the requested name but snapshots a
    /// different kind of definition.
    #[error("revision {revision} holds a {found} definition, expected {expected}")]
    KindMismatch {
        revision: String,
        expected: DefinitionKind,
        found: DefinitionKind,
    },

    /// A revision name lacks a `v<number>` suffix.
    #[error("bad revision name {revision}")]
    BadRevision { revision: String },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    /// `true` if the operation was aborted rather than failed.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ResolveError::Cancelled | ResolveError::DeadlineExceeded)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ResolveError::Upstream(err) => err.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}

fn display_namespaces(namespaces: &[Namespace]) -> String {
    namespaces
        .iter()
        .map(Namespace::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
