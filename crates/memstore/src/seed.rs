//! Builders for seeding a store with definitions and revisions.

use definitions::{
    ComponentDef, Definition, DefinitionKind, DefinitionPayload, DefinitionRevision, Namespace,
    ObjectMeta, ObjectName, PolicyDef, TraitDef, WorkflowStepDef,
};

use crate::FixtureError;

/// An empty payload of the given kind.
pub fn payload(kind: DefinitionKind) -> DefinitionPayload {
    match kind {
        DefinitionKind::Component => DefinitionPayload::Component(ComponentDef::default()),
        DefinitionKind::Trait => DefinitionPayload::Trait(TraitDef::default()),
        DefinitionKind::Policy => DefinitionPayload::Policy(PolicyDef::default()),
        DefinitionKind::WorkflowStep => DefinitionPayload::WorkflowStep(WorkflowStepDef::default()),
    }
}

fn meta(namespace: &str, name: String) -> Result<ObjectMeta, FixtureError> {
    let ns = Namespace::new(namespace).ok_or_else(|| FixtureError::InvalidName {
        name: name.clone(),
        reason: "namespace must be non-empty".into(),
    })?;
    let name = ObjectName::new(name).ok_or_else(|| FixtureError::InvalidName {
        name: String::new(),
        reason: "name must be non-empty".into(),
    })?;
    Ok(ObjectMeta::namespaced(name, ns))
}

/// A live definition named `name` in `namespace` with an empty payload.
pub fn definition(
    namespace: &str,
    name: &str,
    kind: DefinitionKind,
) -> Result<Definition, FixtureError> {
    Ok(Definition {
        meta: meta(namespace, name.to_string())?,
        payload: payload(kind),
    })
}

/// A revision `<base>-<version>` of `base`, labelled the way the authoring
/// side labels its snapshots so label-selector searches find it.
///
/// `version` is used verbatim, including its leading `v`.
pub fn revision(
    namespace: &str,
    base: &str,
    version: &str,
    kind: DefinitionKind,
) -> Result<DefinitionRevision, FixtureError> {
    if base.is_empty() {
        return Err(FixtureError::InvalidName {
            name: format!("-{version}"),
            reason: "base definition name must be non-empty".into(),
        });
    }
    let meta = meta(namespace, format!("{base}-{version}"))?.with_label(kind.name_label(), base);
    Ok(DefinitionRevision {
        meta,
        revision: 1,
        revision_hash: String::new(),
        payload: payload(kind),
    })
}

/// Like [`revision`] but with a description in the payload, so tests can
/// tell apart two revisions sharing a name in different namespaces.
pub fn described_revision(
    namespace: &str,
    base: &str,
    version: &str,
    kind: DefinitionKind,
    description: &str,
) -> Result<DefinitionRevision, FixtureError> {
    let mut rev = revision(namespace, base, version, kind)?;
    let text = Some(description.to_string());
    match &mut rev.payload {
        DefinitionPayload::Component(c) => c.description = text,
        DefinitionPayload::Trait(t) => t.description = text,
        DefinitionPayload::Policy(p) => p.description = text,
        DefinitionPayload::WorkflowStep(w) => w.description = text,
    }
    Ok(rev)
}
