//! Shared value types for capability definitions and their revisions.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the definition payloads themselves and the tags used to route store
//! queries (definition kind, resource kind, label selectors).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

// ---------------------------------------------------------------------------
// Well-known label keys
// ---------------------------------------------------------------------------

/// Label on a component revision naming the component definition it snapshots.
pub const LABEL_COMPONENT_DEFINITION_NAME: &str = "componentdefinition.oam.dev/name";
/// Label on a trait revision naming the trait definition it snapshots.
pub const LABEL_TRAIT_DEFINITION_NAME: &str = "trait.oam.dev/name";
/// Label on a policy revision naming the policy definition it snapshots.
pub const LABEL_POLICY_DEFINITION_NAME: &str = "policydefinition.oam.dev/name";
/// Label on a workflow-step revision naming the step definition it snapshots.
pub const LABEL_WORKFLOW_STEP_DEFINITION_NAME: &str = "workflowstepdefinition.oam.dev/name";

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The four kinds of capability definition.
///
/// The kind is fixed when a definition (or revision) is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionKind {
    Component,
    Trait,
    Policy,
    WorkflowStep,
}

impl DefinitionKind {
    /// Every kind, in declaration order.
    pub const ALL: [DefinitionKind; 4] = [
        DefinitionKind::Component,
        DefinitionKind::Trait,
        DefinitionKind::Policy,
        DefinitionKind::WorkflowStep,
    ];

    /// Label key whose value names the definition a revision belongs to.
    pub fn name_label(self) -> &'static str {
        match self {
            DefinitionKind::Component => LABEL_COMPONENT_DEFINITION_NAME,
            DefinitionKind::Trait => LABEL_TRAIT_DEFINITION_NAME,
            DefinitionKind::Policy => LABEL_POLICY_DEFINITION_NAME,
            DefinitionKind::WorkflowStep => LABEL_WORKFLOW_STEP_DEFINITION_NAME,
        }
    }

    /// Resource kind of the live (unversioned) object of this definition kind.
    pub fn live_resource_kind(self) -> ResourceKind {
        match self {
            DefinitionKind::Component => ResourceKind::ComponentDefinition,
            DefinitionKind::Trait => ResourceKind::TraitDefinition,
            DefinitionKind::Policy => ResourceKind::PolicyDefinition,
            DefinitionKind::WorkflowStep => ResourceKind::WorkflowStepDefinition,
        }
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DefinitionKind::Component => "Component",
            DefinitionKind::Trait => "Trait",
            DefinitionKind::Policy => "Policy",
            DefinitionKind::WorkflowStep => "WorkflowStep",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DefinitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "component" => Ok(DefinitionKind::Component),
            "trait" => Ok(DefinitionKind::Trait),
            "policy" => Ok(DefinitionKind::Policy),
            "workflowstep" | "workflow-step" => Ok(DefinitionKind::WorkflowStep),
            other => Err(format!("unknown definition kind '{other}'")),
        }
    }
}

/// Kinds of object the resolver asks the store for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ComponentDefinition,
    TraitDefinition,
    PolicyDefinition,
    WorkflowStepDefinition,
    DefinitionRevision,
}

impl ResourceKind {
    /// Whether old clusters may still hold cluster-scoped instances of this kind.
    ///
    /// Component and trait definitions (and their revisions) predate namespaced
    /// definitions; policy and workflow-step definitions were namespaced from
    /// the start.
    pub fn has_legacy_cluster_scope(self) -> bool {
        matches!(
            self,
            ResourceKind::ComponentDefinition
                | ResourceKind::TraitDefinition
                | ResourceKind::DefinitionRevision
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::ComponentDefinition => "ComponentDefinition",
            ResourceKind::TraitDefinition => "TraitDefinition",
            ResourceKind::PolicyDefinition => "PolicyDefinition",
            ResourceKind::WorkflowStepDefinition => "WorkflowStepDefinition",
            ResourceKind::DefinitionRevision => "DefinitionRevision",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// How a component definition produces its workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkloadType {
    /// Workload defined by the component definition's own template.
    #[default]
    ComponentDef,
    /// Workload refers to a raw resource kind.
    KubeDef,
    /// Workload rendered from a Helm chart.
    HelmDef,
    /// Workload provisioned through Terraform.
    TerraformDef,
    /// Workload that already exists and is only referenced.
    ReferWorkload,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDef {
    pub workload_type: WorkloadType,
    pub description: Option<String>,
    /// Opaque rendering template; interpreted by the renderer, not here.
    pub schematic: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitDef {
    /// Workload kinds this trait may attach to. Empty means any.
    pub applies_to_workloads: Vec<String>,
    /// Whether changing the trait restarts the workload's pods.
    pub pod_disruptive: bool,
    pub description: Option<String>,
    pub schematic: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDef {
    pub description: Option<String>,
    pub schematic: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStepDef {
    pub description: Option<String>,
    pub schematic: serde_json::Value,
}

/// The body of a definition, one variant per [`DefinitionKind`].
///
/// The kind of a definition or revision is always derived from the variant,
/// so a tag that disagrees with its payload cannot be constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum DefinitionPayload {
    Component(ComponentDef),
    Trait(TraitDef),
    Policy(PolicyDef),
    WorkflowStep(WorkflowStepDef),
}

impl DefinitionPayload {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            DefinitionPayload::Component(_) => DefinitionKind::Component,
            DefinitionPayload::Trait(_) => DefinitionKind::Trait,
            DefinitionPayload::Policy(_) => DefinitionKind::Policy,
            DefinitionPayload::WorkflowStep(_) => DefinitionKind::WorkflowStep,
        }
    }
}

// ---------------------------------------------------------------------------
// Stored objects
// ---------------------------------------------------------------------------

/// A live, unversioned capability definition. Always reflects the latest edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub meta: ObjectMeta,
    pub payload: DefinitionPayload,
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        self.payload.kind()
    }
}

/// An immutable snapshot of a capability definition.
///
/// Created once by the authoring side and never mutated afterwards. The
/// resolver only reads revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRevision {
    pub meta: ObjectMeta,
    /// Monotonic revision counter assigned by the authoring side.
    #[serde(default)]
    pub revision: i64,
    /// Hash of the snapshotted payload, used by the authoring side for dedup.
    #[serde(default)]
    pub revision_hash: String,
    pub payload: DefinitionPayload,
}

impl DefinitionRevision {
    pub fn kind(&self) -> DefinitionKind {
        self.payload.kind()
    }

    /// Returns the live-definition view of this snapshot.
    ///
    /// The returned definition keeps the revision's payload but takes the
    /// base definition name, so callers see the same shape whether they
    /// resolved to the live object or to a pinned revision.
    pub fn into_definition(self, base_name: &crate::ObjectName) -> Definition {
        let mut meta = self.meta;
        meta.name = base_name.clone();
        Definition {
            meta,
            payload: self.payload,
        }
    }
}

/// Anything the store can hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource")]
pub enum Resource {
    Definition(Definition),
    Revision(DefinitionRevision),
}

impl Resource {
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Resource::Definition(d) => &d.meta,
            Resource::Revision(r) => &r.meta,
        }
    }

    /// The store-level kind of this object.
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Resource::Definition(d) => d.kind().live_resource_kind(),
            Resource::Revision(_) => ResourceKind::DefinitionRevision,
        }
    }

    /// The kind of capability definition this object holds.
    pub fn definition_kind(&self) -> DefinitionKind {
        match self {
            Resource::Definition(d) => d.kind(),
            Resource::Revision(r) => r.kind(),
        }
    }
}

impl From<Definition> for Resource {
    fn from(def: Definition) -> Self {
        Resource::Definition(def)
    }
}

impl From<DefinitionRevision> for Resource {
    fn from(rev: DefinitionRevision) -> Self {
        Resource::Revision(rev)
    }
}

// ---------------------------------------------------------------------------
// Queries and results
// ---------------------------------------------------------------------------

/// Equality-only label selector: every listed key must be present with the
/// listed value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key == value` to the selector.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if `labels` satisfies every requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }

    pub fn requirements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(","))
    }
}

/// Outcome of resolving a capability reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target")]
pub enum ResolvedTarget {
    /// Fetch the live, unversioned definition.
    UseLive,
    /// Use this stored revision.
    UseRevision(DefinitionRevision),
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
