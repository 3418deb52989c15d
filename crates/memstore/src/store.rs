//! The in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use definitions::{
    LabelSelector, Namespace, ObjectName, Resource, ResourceAccessor, ResourceKind, StoreError,
    EMPTY_NAMESPACE_MESSAGE,
};
use tracing::trace;

type NamespacedKey = (Namespace, ResourceKind, ObjectName);
type ClusterKey = (ResourceKind, ObjectName);

/// Number of store calls served so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub gets: usize,
    pub lists: usize,
}

/// A failure to return instead of answering, scoped to one namespace or to
/// cluster-scoped lookups (`None`).
#[derive(Debug, Clone)]
struct InjectedFailure {
    namespace: Option<Namespace>,
    error: StoreError,
}

/// Resource store held entirely in memory.
///
/// A kind is served cluster-scoped as soon as one cluster-scoped object of
/// that kind is inserted, mimicking an old cluster whose definition CRDs were
/// installed without namespaces. For every other kind, a lookup without a
/// namespace is rejected with [`EMPTY_NAMESPACE_MESSAGE`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    namespaced: RwLock<HashMap<NamespacedKey, Resource>>,
    cluster_scoped: RwLock<HashMap<ClusterKey, Resource>>,
    cluster_scoped_kinds: RwLock<HashSet<ResourceKind>>,
    failures: RwLock<Vec<InjectedFailure>>,
    latency: Option<Duration>,
    gets: AtomicUsize,
    lists: AtomicUsize,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Transport {
        message: "in-memory store lock poisoned".to_string(),
        retry_after: None,
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call wait `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stores a namespaced object.
    ///
    /// Live definitions may be replaced; revisions are immutable and a second
    /// insert under the same name is rejected.
    pub fn insert(&self, resource: impl Into<Resource>) -> Result<(), StoreError> {
        let resource = resource.into();
        let meta = resource.meta();
        let namespace = meta.namespace.clone().ok_or_else(|| StoreError::Invalid {
            message: format!("{} \"{}\" has no namespace", resource.resource_kind(), meta.name),
        })?;
        let key = (namespace, resource.resource_kind(), meta.name.clone());

        let mut map = self.namespaced.write().map_err(poisoned)?;
        if matches!(resource, Resource::Revision(_)) && map.contains_key(&key) {
            return Err(StoreError::Invalid {
                message: format!(
                    "definition revision \"{}\" already exists in namespace \"{}\"",
                    key.2, key.0
                ),
            });
        }
        map.insert(key, resource);
        Ok(())
    }

    /// Stores a legacy cluster-scoped object and switches its kind to
    /// cluster-scoped lookups.
    pub fn insert_cluster_scoped(&self, resource: impl Into<Resource>) -> Result<(), StoreError> {
        let mut resource = resource.into();
        let kind = resource.resource_kind();
        match &mut resource {
            Resource::Definition(def) => def.meta.namespace = None,
            Resource::Revision(rev) => rev.meta.namespace = None,
        }
        let key = (kind, resource.meta().name.clone());

        self.cluster_scoped_kinds
            .write()
            .map_err(poisoned)?
            .insert(kind);
        self.cluster_scoped
            .write()
            .map_err(poisoned)?
            .insert(key, resource);
        Ok(())
    }

    /// Makes every call touching `namespace` (or cluster scope, for `None`)
    /// fail with `error`.
    pub fn inject_failure(
        &self,
        namespace: Option<Namespace>,
        error: StoreError,
    ) -> Result<(), StoreError> {
        self.failures
            .write()
            .map_err(poisoned)?
            .push(InjectedFailure { namespace, error });
        Ok(())
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            gets: self.gets.load(Ordering::SeqCst),
            lists: self.lists.load(Ordering::SeqCst),
        }
    }

    /// Number of namespaced plus cluster-scoped objects held.
    pub fn len(&self) -> usize {
        let namespaced = self.namespaced.read().map(|m| m.len()).unwrap_or(0);
        let cluster = self.cluster_scoped.read().map(|m| m.len()).unwrap_or(0);
        namespaced + cluster
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn injected(&self, namespace: Option<&Namespace>) -> Result<(), StoreError> {
        let failures = self.failures.read().map_err(poisoned)?;
        match failures.iter().find(|f| f.namespace.as_ref() == namespace) {
            Some(f) => Err(f.error.clone()),
            None => Ok(()),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ResourceAccessor for InMemoryStore {
    async fn get(
        &self,
        namespace: Option<&Namespace>,
        name: &ObjectName,
        kind: ResourceKind,
    ) -> Result<Resource, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.injected(namespace)?;
        trace!(namespace = ?namespace, %name, %kind, "get");

        let found = match namespace {
            Some(ns) => self
                .namespaced
                .read()
                .map_err(poisoned)?
                .get(&(ns.clone(), kind, name.clone()))
                .cloned(),
            None => {
                if !self.cluster_scoped_kinds.read().map_err(poisoned)?.contains(&kind) {
                    return Err(StoreError::Invalid {
                        message: EMPTY_NAMESPACE_MESSAGE.to_string(),
                    });
                }
                self.cluster_scoped
                    .read()
                    .map_err(poisoned)?
                    .get(&(kind, name.clone()))
                    .cloned()
            }
        };

        found.ok_or_else(|| StoreError::NotFound {
            kind,
            namespace: namespace.cloned(),
            name: name.clone(),
        })
    }

    async fn list(
        &self,
        namespace: &Namespace,
        selector: &LabelSelector,
        kind: ResourceKind,
    ) -> Result<Vec<Resource>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.injected(Some(namespace))?;
        trace!(%namespace, %selector, %kind, "list");

        let map = self.namespaced.read().map_err(poisoned)?;
        Ok(map
            .iter()
            .filter(|((ns, k, _), resource)| {
                ns == namespace && *k == kind && selector.matches(&resource.meta().labels)
            })
            .map(|(_, resource)| resource.clone())
            .collect())
    }
}
