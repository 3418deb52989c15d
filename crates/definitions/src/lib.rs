//! Capability definition revision resolution.
//!
//! Applications refer to capability definitions (components, traits,
//! policies, workflow steps) by name, optionally pinned to a version:
//! `worker` or `worker@v1.3.1`. Every published version of a definition is
//! kept as an immutable [`DefinitionRevision`] named `<name>-v<version>`.
//! This crate decides which stored object a reference designates.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no storage I/O
//! itself. The store is reached only through the [`ResourceAccessor`] trait;
//! adapter crates supply the implementation.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Namespace`, `ObjectName`, `ObjectUid`) |
//! | [`types`] | Definition kinds, payloads, revisions, label selectors |
//! | [`meta`] | Object metadata and label/annotation helpers |
//! | [`errors`] | Store and resolver errors, retry policy |
//! | [`config`] | Well-known namespaces and resolver configuration |
//! | [`context`] | Per-call namespaces, cancellation and deadlines |
//! | [`naming`] | Reference parsing and revision-name construction |
//! | [`version`] | Semantic version parsing and ordering |
//! | [`store`] | The `ResourceAccessor` port |
//! | [`search`] | Revision candidate search within one namespace |
//! | [`selector`] | Best-revision selection |
//! | [`resolver`] | The orchestrating `DefinitionResolver` |

pub mod config;
pub mod context;
pub mod errors;
pub mod identifiers;
pub mod meta;
pub mod naming;
pub mod resolver;
pub mod search;
pub mod selector;
pub mod store;
pub mod types;
pub mod version;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    MissingRevisionPolicy, ResolverConfig, ANNOTATION_AUTO_UPDATE, DEFAULT_APP_NAMESPACE,
    SYSTEM_DEFINITION_NAMESPACE,
};
pub use context::{
    namespace_for_app, namespace_for_x_definition, CancelHandle, DefinitionContext,
    NamespaceAccessor,
};
pub use errors::{ResolveError, RetryPolicy, StoreError, EMPTY_NAMESPACE_MESSAGE};
pub use identifiers::{Namespace, ObjectName, ObjectUid};
pub use meta::{merge_map_override_with_dst, pass_label_and_annotation, ObjectMeta};
pub use naming::{
    convert_to_revision_name, extract_component_name, extract_revision_num,
    validate_qualified_name, CapabilityReference, RevisionName,
};
pub use resolver::DefinitionResolver;
pub use search::list_revisions;
pub use selector::{select_best_revision, select_newest_in_range};
pub use store::ResourceAccessor;
pub use types::{
    ComponentDef, Definition, DefinitionKind, DefinitionPayload, DefinitionRevision,
    LabelSelector, PolicyDef, ResolvedTarget, Resource, ResourceKind, Timestamp, TraitDef,
    WorkflowStepDef, WorkloadType,
};
pub use version::{SemanticVersion, VersionError};
