//! Port trait for the resource store.
//!
//! The resolver never talks to storage directly; it asks a
//! [`ResourceAccessor`] for objects by name or by label selector. Adapters
//! (an API-server client, the in-memory store used in tests) implement this
//! trait outside this crate.

use async_trait::async_trait;

use crate::{LabelSelector, Namespace, ObjectName, Resource, ResourceKind, StoreError};

/// Read access to a namespaced, versioned resource store.
///
/// Implementations must report a missing object as
/// [`StoreError::NotFound`] and nothing else: the resolver's fallback logic
/// branches on that variant only.
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// Fetches one object.
    ///
    /// `namespace` is `None` for a cluster-scoped lookup. Stores reject a
    /// cluster-scoped lookup of a namespaced kind with
    /// [`crate::errors::EMPTY_NAMESPACE_MESSAGE`].
    async fn get(
        &self,
        namespace: Option<&Namespace>,
        name: &ObjectName,
        kind: ResourceKind,
    ) -> Result<Resource, StoreError>;

    /// Lists every object of `kind` in `namespace` whose labels satisfy
    /// `selector`. The order of the result is unspecified.
    async fn list(
        &self,
        namespace: &Namespace,
        selector: &LabelSelector,
        kind: ResourceKind,
    ) -> Result<Vec<Resource>, StoreError>;
}

#[async_trait]
impl<T: ResourceAccessor + ?Sized> ResourceAccessor for std::sync::Arc<T> {
    async fn get(
        &self,
        namespace: Option<&Namespace>,
        name: &ObjectName,
        kind: ResourceKind,
    ) -> Result<Resource, StoreError> {
        (**self).get(namespace, name, kind).await
    }

    async fn list(
        &self,
        namespace: &Namespace,
        selector: &LabelSelector,
        kind: ResourceKind,
    ) -> Result<Vec<Resource>, StoreError> {
        (**self).list(namespace, selector, kind).await
    }
}
