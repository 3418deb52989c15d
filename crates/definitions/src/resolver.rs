//! The definition revision resolver.
//!
//! [`DefinitionResolver`] turns a capability reference into either "use the
//! live definition" or a specific stored [`DefinitionRevision`]. It holds no
//! mutable state; every call re-queries the store through its
//! [`ResourceAccessor`], so one resolver can be shared freely between tasks.
//!
//! ## Search order
//!
//! - Fetch by name: application namespace, x-definition namespace, system
//!   namespace. Kinds that may have legacy cluster-scoped instances are also
//!   looked up without a namespace once the namespaced lookup misses. An
//!   object holding a different definition kind counts as a miss.
//! - Latest revision in a version range: application namespace, then system
//!   namespace. An application-namespace revision shadows a system one.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::ANNOTATION_AUTO_UPDATE;
use crate::context::{fetch_namespaces, namespace_for_app, search_namespaces};
use crate::naming::{auto_update_prefix, convert_to_revision_name};
use crate::search::list_revisions;
use crate::selector::{select_best_revision, select_newest_in_range};
use crate::{
    CapabilityReference, Definition, DefinitionContext, DefinitionKind, DefinitionRevision,
    MissingRevisionPolicy, Namespace, ObjectName, ResolveError, ResolvedTarget, ResolverConfig,
    Resource, ResourceAccessor, ResourceKind, StoreError,
};

/// Outcome of looking a name up in one namespace tier.
enum Lookup {
    Found(Resource),
    /// The store's not-found for this tier.
    Missed(StoreError),
    /// An object exists under the name but holds this other kind.
    WrongKind(DefinitionKind),
}

pub struct DefinitionResolver<A: ?Sized> {
    accessor: Arc<A>,
    config: ResolverConfig,
}

impl<A: ?Sized> Clone for DefinitionResolver<A> {
    fn clone(&self) -> Self {
        Self {
            accessor: Arc::clone(&self.accessor),
            config: self.config.clone(),
        }
    }
}

impl<A> DefinitionResolver<A>
where
    A: ResourceAccessor + ?Sized,
{
    pub fn new(accessor: Arc<A>, config: ResolverConfig) -> Self {
        Self { accessor, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// A root context carrying this resolver's namespace configuration.
    pub fn root_context(&self) -> DefinitionContext {
        DefinitionContext::new(&self.config)
    }

    /// Resolves `reference` for a definition of `kind`.
    ///
    /// A reference without `@` always means the live definition and touches no
    /// store. A pinned reference resolves to its stored revision; with the
    /// auto-update annotation set to `"true"`, the pin is widened to its
    /// `major.minor` range first and the newest revision in that range wins.
    #[instrument(skip(self, ctx, annotations))]
    pub async fn resolve(
        &self,
        ctx: &DefinitionContext,
        reference: &str,
        kind: DefinitionKind,
        annotations: &BTreeMap<String, String>,
    ) -> Result<ResolvedTarget, ResolveError> {
        let Some((base_name, _)) = reference.split_once('@') else {
            return Ok(ResolvedTarget::UseLive);
        };

        let pinned = convert_to_revision_name(reference)?;
        let mut revision_name = pinned.to_object_name();

        if annotations
            .get(ANNOTATION_AUTO_UPDATE)
            .is_some_and(|v| v == "true")
        {
            let range = auto_update_prefix(&pinned, base_name);
            revision_name = self
                .latest_matching(ctx, base_name, kind, |revisions| {
                    select_newest_in_range(&range, base_name, revisions, kind)
                })
                .await?;
            info!(pinned = %pinned, resolved = %revision_name, "auto-update selected revision");
        }

        match self
            .fetch_of_kind(ctx, &revision_name, ResourceKind::DefinitionRevision, Some(kind))
            .await
        {
            Ok(Resource::Revision(rev)) => Ok(ResolvedTarget::UseRevision(rev)),
            Ok(other) => Err(ResolveError::UnexpectedResource {
                expected: ResourceKind::DefinitionRevision,
                found: other.resource_kind(),
            }),
            Err(ResolveError::Upstream(err)) if err.is_not_found() => {
                match self.config.missing_revision {
                    MissingRevisionPolicy::Fail => Err(ResolveError::NotFound {
                        name: revision_name.to_string(),
                        kind,
                        namespaces: fetch_namespaces(ctx),
                        source: Some(err),
                    }),
                    MissingRevisionPolicy::UseLive => {
                        debug!(revision = %revision_name, "revision missing, using live definition");
                        Ok(ResolvedTarget::UseLive)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Name of the newest revision of `base_name` matching `exact_token`.
    ///
    /// `exact_token` is either an exact revision name or a partial version
    /// range such as `worker-v1.3`. Namespaces are searched in priority order
    /// and the first namespace with a match decides.
    #[instrument(skip(self, ctx))]
    pub async fn latest_revision_name(
        &self,
        ctx: &DefinitionContext,
        base_name: &str,
        exact_token: &str,
        kind: DefinitionKind,
    ) -> Result<ObjectName, ResolveError> {
        self.latest_matching(ctx, base_name, kind, |revisions| {
            select_best_revision(exact_token, base_name, revisions, kind)
        })
        .await
    }

    /// Searches the application then the system namespace, applying `select`
    /// to each namespace's revisions of `base_name`. The first namespace with
    /// a selection decides.
    async fn latest_matching<F>(
        &self,
        ctx: &DefinitionContext,
        base_name: &str,
        kind: DefinitionKind,
        select: F,
    ) -> Result<ObjectName, ResolveError>
    where
        F: Fn(&[DefinitionRevision]) -> Result<Option<ObjectName>, ResolveError>,
    {
        let namespaces = search_namespaces(ctx);
        for ns in &namespaces {
            let revisions = list_revisions(&*self.accessor, ctx, ns, base_name, kind).await?;
            if let Some(name) = select(&revisions)? {
                debug!(namespace = %ns, revision = %name, "matched definition revision");
                return Ok(name);
            }
        }
        Err(ResolveError::NotFound {
            name: base_name.to_string(),
            kind,
            namespaces,
            source: None,
        })
    }

    /// Fetches `name` using the two-tier namespace search.
    ///
    /// Returns the first object found. Any failure other than not-found ends
    /// the search immediately. If every namespace misses, the first not-found
    /// is returned.
    #[instrument(skip(self, ctx))]
    pub async fn fetch_by_name(
        &self,
        ctx: &DefinitionContext,
        name: &ObjectName,
        kind: ResourceKind,
    ) -> Result<Resource, ResolveError> {
        self.fetch_of_kind(ctx, name, kind, None).await
    }

    /// Two-tier fetch that, given `expected`, passes over objects holding
    /// another definition kind and keeps searching.
    ///
    /// `KindMismatch` is returned only when no tier missed outright, i.e.
    /// every tier held the name under a different kind.
    async fn fetch_of_kind(
        &self,
        ctx: &DefinitionContext,
        name: &ObjectName,
        kind: ResourceKind,
        expected: Option<DefinitionKind>,
    ) -> Result<Resource, ResolveError> {
        let mut legacy_checked = false;
        let mut first_miss: Option<StoreError> = None;
        let mut first_mismatch: Option<(DefinitionKind, DefinitionKind)> = None;

        // fetch_namespaces always starts with the application namespace.
        for ns in fetch_namespaces(ctx) {
            match self
                .get_namespaced(ctx, name, kind, expected, &ns, &mut legacy_checked)
                .await?
            {
                Lookup::Found(resource) => return Ok(resource),
                Lookup::Missed(miss) => {
                    first_miss.get_or_insert(miss);
                }
                Lookup::WrongKind(found) => {
                    debug!(namespace = %ns, %found, "skipping object of another kind");
                    if let Some(expected) = expected {
                        first_mismatch.get_or_insert((expected, found));
                    }
                }
            }
        }

        if let Some(miss) = first_miss {
            return Err(miss.into());
        }
        match first_mismatch {
            Some((expected, found)) => Err(ResolveError::KindMismatch {
                revision: name.to_string(),
                expected,
                found,
            }),
            None => Err(StoreError::NotFound {
                kind,
                namespace: Some(namespace_for_app(ctx)),
                name: name.clone(),
            }
            .into()),
        }
    }

    /// One namespaced lookup, plus the legacy cluster-scoped retry on a miss.
    /// Store failures other than not-found come back as `Err`.
    async fn get_namespaced(
        &self,
        ctx: &DefinitionContext,
        name: &ObjectName,
        kind: ResourceKind,
        expected: Option<DefinitionKind>,
        ns: &Namespace,
        legacy_checked: &mut bool,
    ) -> Result<Lookup, ResolveError> {
        let outcome = match ctx.guard(self.accessor.get(Some(ns), name, kind)).await? {
            Ok(resource) => classify(resource, expected),
            Err(err) if err.is_not_found() => Lookup::Missed(err),
            Err(err) => return Err(err.into()),
        };
        if let Lookup::Found(_) = outcome {
            return Ok(outcome);
        }

        // The cluster-scoped lookup ignores the namespace, so one attempt per
        // fetch is enough.
        if kind.has_legacy_cluster_scope() && !*legacy_checked {
            *legacy_checked = true;
            if let Some(resource) = self.fetch_cluster_scoped(ctx, name, kind, ns).await? {
                if let found @ Lookup::Found(_) = classify(resource, expected) {
                    return Ok(found);
                }
            }
        }
        Ok(outcome)
    }

    /// Retries a missed namespaced lookup without a namespace, for clusters
    /// where this kind is still cluster-scoped.
    ///
    /// `Ok(None)` means the original not-found stands: either the legacy
    /// lookup missed too, or the store rejected it because the kind is
    /// namespaced there.
    async fn fetch_cluster_scoped(
        &self,
        ctx: &DefinitionContext,
        name: &ObjectName,
        kind: ResourceKind,
        missed_in: &Namespace,
    ) -> Result<Option<Resource>, ResolveError> {
        match ctx.guard(self.accessor.get(None, name, kind)).await? {
            Ok(resource) => {
                debug!(namespace = %missed_in, "found legacy cluster-scoped definition");
                Ok(Some(resource))
            }
            Err(err) if err.is_empty_namespace_rejection() || err.is_not_found() => {
                debug!(error = %err, "legacy cluster-scoped lookup did not apply");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves `reference` and returns the definition it designates: the
    /// live object, or the payload of the pinned revision presented under
    /// the base definition name.
    pub async fn get_capability_definition(
        &self,
        ctx: &DefinitionContext,
        reference: &str,
        kind: DefinitionKind,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Definition, ResolveError> {
        let parsed = CapabilityReference::parse(reference);
        let base_name =
            ObjectName::new(parsed.base_name.clone()).ok_or_else(|| ResolveError::InvalidName {
                name: reference.to_string(),
                messages: vec!["name part must be non-empty".to_string()],
            })?;

        match self.resolve(ctx, reference, kind, annotations).await? {
            ResolvedTarget::UseRevision(rev) => Ok(rev.into_definition(&base_name)),
            ResolvedTarget::UseLive => {
                match self
                    .fetch_of_kind(ctx, &base_name, kind.live_resource_kind(), Some(kind))
                    .await?
                {
                    Resource::Definition(def) => Ok(def),
                    other => Err(ResolveError::UnexpectedResource {
                        expected: kind.live_resource_kind(),
                        found: other.resource_kind(),
                    }),
                }
            }
        }
    }
}

fn classify(resource: Resource, expected: Option<DefinitionKind>) -> Lookup {
    match expected {
        Some(kind) if resource.definition_kind() != kind => {
            Lookup::WrongKind(resource.definition_kind())
        }
        _ => Lookup::Found(resource),
    }
}
