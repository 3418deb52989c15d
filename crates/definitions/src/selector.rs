//! Picks the best revision among candidates for a requested version.
//!
//! A request is an exact revision name (`worker-v1.3.1`, `worker-v1-hotfix`)
//! or a partial version (`worker-v1`, `worker-v1.3`). An exact name always
//! wins. Otherwise every candidate that extends the partial version by at
//! least one more component (`worker-v1.` prefix) is a match, and the highest
//! semantic version among the matches is chosen.
//!
//! Auto-update ranges use [`select_newest_in_range`] instead, where a revision
//! named exactly after the range is just one more member of it.

use crate::{DefinitionKind, DefinitionRevision, ObjectName, ResolveError, SemanticVersion};

/// Returns the best revision for `exact_token`, or `None` if no candidate
/// matches.
///
/// Candidates of a different `kind` are ignored. A matching candidate whose
/// version suffix is not a semantic version is corrupt data and fails the
/// whole selection with [`ResolveError::InvalidVersion`]. The result does not
/// depend on the order of `candidates`.
pub fn select_best_revision<'a, I>(
    exact_token: &str,
    base_name: &str,
    candidates: I,
    kind: DefinitionKind,
) -> Result<Option<ObjectName>, ResolveError>
where
    I: IntoIterator<Item = &'a DefinitionRevision>,
{
    let candidates: Vec<&DefinitionRevision> = candidates
        .into_iter()
        .filter(|rev| rev.kind() == kind)
        .collect();

    if let Some(exact) = candidates
        .iter()
        .find(|rev| rev.meta.name.as_str() == exact_token)
    {
        return Ok(Some(exact.meta.name.clone()));
    }

    newest_matching(base_name, candidates, |name| {
        name.strip_prefix(exact_token)
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Returns the newest revision inside the version range `range_token`
/// (`worker-v1.3`), or `None` if no candidate falls in it.
///
/// Unlike [`select_best_revision`], a revision named exactly `range_token`
/// gets no precedence: it competes on its version like every other member of
/// the range, so `worker-v1.3.5` beats a stored `worker-v1.3`.
pub fn select_newest_in_range<'a, I>(
    range_token: &str,
    base_name: &str,
    candidates: I,
    kind: DefinitionKind,
) -> Result<Option<ObjectName>, ResolveError>
where
    I: IntoIterator<Item = &'a DefinitionRevision>,
{
    let candidates: Vec<&DefinitionRevision> = candidates
        .into_iter()
        .filter(|rev| rev.kind() == kind)
        .collect();

    // A revision named exactly after an opaque range token (`worker-v1-hotfix`)
    // has no version to compete with and only counts when nothing else matches.
    let base_prefix = format!("{base_name}-");
    let exact_is_versioned = range_token
        .strip_prefix(&base_prefix)
        .is_some_and(|suffix| SemanticVersion::parse(suffix).is_ok());
    let exact = candidates
        .iter()
        .find(|rev| rev.meta.name.as_str() == range_token)
        .map(|rev| rev.meta.name.clone());

    let newest = newest_matching(base_name, candidates, |name| {
        name.strip_prefix(range_token)
            .is_some_and(|rest| (rest.is_empty() && exact_is_versioned) || rest.starts_with('.'))
    })?;
    Ok(newest.or(exact))
}

fn newest_matching<F>(
    base_name: &str,
    candidates: Vec<&DefinitionRevision>,
    in_range: F,
) -> Result<Option<ObjectName>, ResolveError>
where
    F: Fn(&str) -> bool,
{
    let base_prefix = format!("{base_name}-");
    let mut best: Option<(SemanticVersion, &ObjectName)> = None;

    for rev in candidates {
        let name = rev.meta.name.as_str();
        if !in_range(name) {
            continue;
        }
        let suffix = name.strip_prefix(&base_prefix).unwrap_or(name);
        let version =
            SemanticVersion::parse(suffix).map_err(|err| ResolveError::InvalidVersion {
                revision: name.to_string(),
                version: suffix.to_string(),
                reason: err.to_string(),
            })?;

        let better = match &best {
            None => true,
            // Equal precedence (e.g. differing only in build metadata) falls
            // back to the name so the choice stays order-independent.
            Some((current, current_name)) => version
                .cmp(current)
                .then_with(|| name.cmp(current_name.as_str()))
                .is_gt(),
        };
        if better {
            best = Some((version, &rev.meta.name));
        }
    }

    Ok(best.map(|(_, name)| name.clone()))
}
