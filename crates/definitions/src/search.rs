//! Revision candidate search within one namespace.

use tracing::debug;

use crate::{
    DefinitionContext, DefinitionKind, DefinitionRevision, LabelSelector, Namespace,
    ResolveError, Resource, ResourceAccessor, ResourceKind,
};

/// Selector matching every revision of `base_name` for `kind`.
pub fn revision_selector(base_name: &str, kind: DefinitionKind) -> LabelSelector {
    LabelSelector::new().with(kind.name_label(), base_name)
}

/// Lists all stored revisions of `base_name` in `namespace`.
///
/// The store decides the order; callers must not rely on it. Revisions of a
/// different definition kind can still appear if labels collide, so the
/// selector filters on kind again.
pub async fn list_revisions<A>(
    accessor: &A,
    ctx: &DefinitionContext,
    namespace: &Namespace,
    base_name: &str,
    kind: DefinitionKind,
) -> Result<Vec<DefinitionRevision>, ResolveError>
where
    A: ResourceAccessor + ?Sized,
{
    let selector = revision_selector(base_name, kind);
    let resources = ctx
        .guard(accessor.list(namespace, &selector, ResourceKind::DefinitionRevision))
        .await??;

    let revisions = resources
        .into_iter()
        .map(|resource| match resource {
            Resource::Revision(rev) => Ok(rev),
            other => Err(ResolveError::UnexpectedResource {
                expected: ResourceKind::DefinitionRevision,
                found: other.resource_kind(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        namespace = %namespace,
        base_name,
        %kind,
        count = revisions.len(),
        "listed definition revisions"
    );
    Ok(revisions)
}
