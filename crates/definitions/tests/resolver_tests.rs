use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use definitions::{
    DefinitionKind, DefinitionPayload, DefinitionResolver, MissingRevisionPolicy,
    Namespace, ObjectName, ResolveError, ResolvedTarget, ResolverConfig, ResourceKind,
    RetryPolicy, StoreError, ANNOTATION_AUTO_UPDATE,
};
use memstore::{seed, CallCounts, InMemoryStore};

fn ns(s: &str) -> Namespace {
    Namespace::new(s).unwrap()
}

fn resolver(store: &Arc<InMemoryStore>) -> DefinitionResolver<InMemoryStore> {
    DefinitionResolver::new(Arc::clone(store), ResolverConfig::default())
}

fn no_annotations() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn auto_update() -> BTreeMap<String, String> {
    BTreeMap::from([(ANNOTATION_AUTO_UPDATE.to_string(), "true".to_string())])
}

fn add_revision(store: &InMemoryStore, namespace: &str, base: &str, version: &str) {
    store
        .insert(seed::revision(namespace, base, version, DefinitionKind::Component).unwrap())
        .unwrap();
}

fn add_described(store: &InMemoryStore, namespace: &str, version: &str, description: &str) {
    store
        .insert(
            seed::described_revision(
                namespace,
                "worker",
                version,
                DefinitionKind::Component,
                description,
            )
            .unwrap(),
        )
        .unwrap();
}

fn revision_name(target: &ResolvedTarget) -> &str {
    match target {
        ResolvedTarget::UseRevision(rev) => rev.meta.name.as_str(),
        ResolvedTarget::UseLive => panic!("expected a revision, got UseLive"),
    }
}

fn description(target: &ResolvedTarget) -> Option<&str> {
    match target {
        ResolvedTarget::UseRevision(rev) => match &rev.payload {
            DefinitionPayload::Component(c) => c.description.as_deref(),
            other => panic!("unexpected payload {other:?}"),
        },
        ResolvedTarget::UseLive => None,
    }
}

// ---------------------------------------------------------------------------
// Unpinned and invalid references
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unpinned_reference_uses_live_definition_without_store_calls() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.0.0");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let target = resolver
        .resolve(&ctx, "worker", DefinitionKind::Component, &auto_update())
        .await
        .unwrap();

    assert_eq!(target, ResolvedTarget::UseLive);
    assert_eq!(store.calls(), CallCounts::default());
}

#[tokio::test]
async fn invalid_reference_fails_before_any_store_call() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);
    let ctx = resolver.root_context();

    let err = resolver
        .resolve(&ctx, "bad name@v1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    match err {
        ResolveError::InvalidName { name, messages } => {
            assert_eq!(name, "bad name-v1");
            assert!(!messages.is_empty());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(store.calls(), CallCounts::default());
}

// ---------------------------------------------------------------------------
// Two-tier namespace search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_revision_names_every_searched_namespace() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    match &err {
        ResolveError::NotFound {
            name,
            namespaces,
            source,
            ..
        } => {
            assert_eq!(name, "worker-v1.3.1");
            assert_eq!(namespaces, &vec![ns("default"), ns("vela-system")]);
            // The first miss, in the application namespace, is kept.
            match source {
                Some(StoreError::NotFound { namespace, .. }) => {
                    assert_eq!(namespace.as_ref(), Some(&ns("default")));
                }
                other => panic!("unexpected source {other:?}"),
            }
        }
        other => panic!("unexpected error {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("default"), "{message}");
    assert!(message.contains("vela-system"), "{message}");
    assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
}

#[tokio::test]
async fn system_namespace_revision_is_found_from_any_application() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.3.1");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("shop");

    let target = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();

    assert_eq!(revision_name(&target), "worker-v1.3.1");
}

#[tokio::test]
async fn application_namespace_shadows_system_namespace() {
    let store = Arc::new(InMemoryStore::new());
    add_described(&store, "vela-system", "v1.3.1", "system");
    add_described(&store, "shop", "v1.3.1", "shop");
    let resolver = resolver(&store);

    let shop = resolver.root_context().with_app_namespace("shop");
    let target = resolver
        .resolve(&shop, "worker@v1.3.1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(description(&target), Some("shop"));

    let other = resolver.root_context().with_app_namespace("billing");
    let target = resolver
        .resolve(&other, "worker@v1.3.1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(description(&target), Some("system"));
}

#[tokio::test]
async fn x_definition_namespace_is_searched_between_app_and_system() {
    let store = Arc::new(InMemoryStore::new());
    add_described(&store, "addons", "v2.0.0", "addon");
    add_described(&store, "vela-system", "v2.0.0", "system");
    let resolver = resolver(&store);
    let ctx = resolver
        .root_context()
        .with_app_namespace("shop")
        .with_x_definition_namespace("addons");

    let target = resolver
        .resolve(&ctx, "worker@v2.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(description(&target), Some("addon"));
}

#[tokio::test]
async fn opaque_revision_token_resolves_by_exact_name() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1-hotfix");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let target = resolver
        .resolve(&ctx, "worker@v1-hotfix", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1-hotfix");
}

#[tokio::test]
async fn revision_of_another_kind_is_a_mismatch() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(seed::revision("vela-system", "worker", "v1.0.0", DefinitionKind::Trait).unwrap())
        .unwrap();
    let resolver = resolver(&store);
    // Only the system namespace is searched, and it holds the name as a trait.
    let ctx = resolver.root_context();

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::KindMismatch {
            expected: DefinitionKind::Component,
            found: DefinitionKind::Trait,
            ..
        }
    ));
}

#[tokio::test]
async fn revision_of_another_kind_with_a_plain_miss_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(seed::revision("vela-system", "worker", "v1.0.0", DefinitionKind::Trait).unwrap())
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn revision_of_another_kind_does_not_hide_later_namespaces() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(seed::revision("shop", "worker", "v1.0.0", DefinitionKind::Trait).unwrap())
        .unwrap();
    add_described(&store, "vela-system", "v1.0.0", "system worker");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("shop");

    let target = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.0.0");
    assert_eq!(description(&target), Some("system worker"));
    match target {
        ResolvedTarget::UseRevision(rev) => {
            assert_eq!(rev.kind(), DefinitionKind::Component);
            assert_eq!(rev.meta.namespace, Some(ns("vela-system")));
        }
        other => panic!("unexpected target {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Legacy cluster-scoped objects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_cluster_scoped_revision_is_found() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_cluster_scoped(
            seed::revision("vela-system", "worker", "v1.0.0", DefinitionKind::Component).unwrap(),
        )
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let target = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    match target {
        ResolvedTarget::UseRevision(rev) => assert_eq!(rev.meta.namespace, None),
        other => panic!("unexpected target {other:?}"),
    }
}

#[tokio::test]
async fn empty_namespace_rejection_never_surfaces() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.to_string().contains("empty namespace"));
    // default, one legacy attempt, vela-system.
    assert_eq!(store.calls(), CallCounts { gets: 3, lists: 0 });
}

#[tokio::test]
async fn live_policy_lookup_skips_the_legacy_retry() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .fetch_by_name(
            &ctx,
            &ObjectName::new("apply-once").unwrap(),
            ResourceKind::PolicyDefinition,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Upstream(ref e) if e.is_not_found()));
    assert_eq!(store.calls(), CallCounts { gets: 2, lists: 0 });
}

// ---------------------------------------------------------------------------
// Upstream failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_not_found_failure_ends_the_search() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.0.0");
    store.inject_failure(
        Some(ns("default")),
        StoreError::Forbidden {
            message: "cannot get definitionrevisions in default".into(),
        },
    )
    .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Upstream(StoreError::Forbidden { .. })));
    assert_eq!(store.calls().gets, 1);
}

#[tokio::test]
async fn forbidden_legacy_lookup_is_surfaced() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.0.0");
    store
        .inject_failure(
            None,
            StoreError::Forbidden {
                message: "cluster rbac".into(),
            },
        )
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ResolveError::Upstream(StoreError::Forbidden { ref message }) if message == "cluster rbac"),
        "got {err:?}"
    );
    // default, then the cluster-scoped attempt; vela-system is never reached.
    assert_eq!(store.calls().gets, 2);
}

#[tokio::test]
async fn other_invalid_legacy_lookup_is_surfaced() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.0.0");
    store
        .inject_failure(
            None,
            StoreError::Invalid {
                message: "label selector is malformed".into(),
            },
        )
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    match err {
        ResolveError::Upstream(StoreError::Invalid { message }) => {
            assert_eq!(message, "label selector is malformed");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_in_fallback_namespace_is_retryable() {
    let store = Arc::new(InMemoryStore::new());
    store.inject_failure(
        Some(ns("vela-system")),
        StoreError::Transport {
            message: "connection reset".into(),
            retry_after: Some(Duration::from_secs(2)),
        },
    )
    .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();

    assert_eq!(
        err.retry_policy(),
        RetryPolicy::Retryable {
            after: Some(Duration::from_secs(2))
        }
    );
}

#[tokio::test]
async fn missing_revision_can_fall_back_to_live_definition() {
    let store = Arc::new(InMemoryStore::new());
    let config = ResolverConfig {
        missing_revision: MissingRevisionPolicy::UseLive,
        ..ResolverConfig::default()
    };
    let resolver = DefinitionResolver::new(Arc::clone(&store), config);
    let ctx = resolver.root_context();

    let target = resolver
        .resolve(&ctx, "worker@v9.9.9", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(target, ResolvedTarget::UseLive);
}

// ---------------------------------------------------------------------------
// Auto-update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auto_update_picks_newest_patch_in_pinned_minor() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.3.1");
    add_revision(&store, "vela-system", "worker", "v1.4.0");
    add_revision(&store, "vela-system", "worker", "v1.3.12");
    add_revision(&store, "vela-system", "worker", "v1.3.4");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let target = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &auto_update())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.3.12");

    // Without the annotation the pin is honoured exactly.
    let target = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.3.1");
}

#[tokio::test]
async fn auto_update_range_named_revision_competes_on_version() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.3");
    add_revision(&store, "vela-system", "worker", "v1.3.5");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let target = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &auto_update())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.3.5");

    // An explicit lookup of the range token still prefers the exact name.
    let name = resolver
        .latest_revision_name(&ctx, "worker", "worker-v1.3", DefinitionKind::Component)
        .await
        .unwrap();
    assert_eq!(name.as_str(), "worker-v1.3");
}

#[tokio::test]
async fn auto_update_annotation_must_be_exactly_true() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v1.3.1");
    add_revision(&store, "vela-system", "worker", "v1.3.2");
    let resolver = resolver(&store);
    let ctx = resolver.root_context();
    let annotations =
        BTreeMap::from([(ANNOTATION_AUTO_UPDATE.to_string(), "True".to_string())]);

    let target = resolver
        .resolve(&ctx, "worker@v1.3.1", DefinitionKind::Component, &annotations)
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.3.1");
    assert_eq!(store.calls().lists, 0);
}

#[tokio::test]
async fn auto_update_prefers_application_namespace_range() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "shop", "worker", "v1.3.2");
    add_revision(&store, "vela-system", "worker", "v1.3.9");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("shop");

    let target = resolver
        .resolve(&ctx, "worker@v1.3.0", DefinitionKind::Component, &auto_update())
        .await
        .unwrap();
    assert_eq!(revision_name(&target), "worker-v1.3.2");
}

#[tokio::test]
async fn latest_revision_name_reports_missing_range() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "vela-system", "worker", "v2.0.0");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .latest_revision_name(&ctx, "worker", "worker-v1", DefinitionKind::Component)
        .await
        .unwrap_err();
    match err {
        ResolveError::NotFound {
            name, namespaces, ..
        } => {
            assert_eq!(name, "worker");
            assert_eq!(namespaces, vec![ns("default"), ns("vela-system")]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(store.calls().lists, 2);
}

#[tokio::test]
async fn corrupt_stored_version_stops_the_search() {
    let store = Arc::new(InMemoryStore::new());
    add_revision(&store, "default", "worker", "v1.x.0");
    add_revision(&store, "vela-system", "worker", "v1.2.0");
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let err = resolver
        .latest_revision_name(&ctx, "worker", "worker-v1", DefinitionKind::Component)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidVersion { .. }));
    assert_eq!(store.calls().lists, 1);
}

// ---------------------------------------------------------------------------
// Cancellation and deadlines
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deadline_aborts_a_slow_store() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_secs(30)));
    add_revision(&store, "vela-system", "worker", "v1.0.0");
    let resolver = resolver(&store);
    let ctx = resolver
        .root_context()
        .with_app_namespace("default")
        .with_timeout(Duration::from_secs(1));

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::DeadlineExceeded));
    assert!(err.is_aborted());
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_root_aborts_in_flight_resolution() {
    let store = Arc::new(InMemoryStore::new().with_latency(Duration::from_secs(30)));
    let resolver = resolver(&store);
    let root = resolver.root_context();
    let ctx = root.with_app_namespace("default");
    let handle = root.cancel_handle();

    let task = tokio::spawn({
        let resolver = resolver.clone();
        async move {
            resolver
                .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &BTreeMap::new())
                .await
        }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled));
    assert_eq!(store.calls().gets, 1);
}

#[tokio::test]
async fn cancelled_context_makes_no_store_calls() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = resolver(&store);
    let ctx = resolver.root_context();
    ctx.cancel_handle().cancel();

    let err = resolver
        .resolve(&ctx, "worker@v1.0.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled));
    assert_eq!(store.calls(), CallCounts::default());
}

// ---------------------------------------------------------------------------
// Capability definitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn capability_definition_presents_revision_under_base_name() {
    let store = Arc::new(InMemoryStore::new());
    add_described(&store, "vela-system", "v1.2.0", "pinned");
    store
        .insert(seed::definition("vela-system", "worker", DefinitionKind::Component).unwrap())
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context().with_app_namespace("default");

    let pinned = resolver
        .get_capability_definition(&ctx, "worker@v1.2.0", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(pinned.meta.name.as_str(), "worker");
    match &pinned.payload {
        DefinitionPayload::Component(c) => assert_eq!(c.description.as_deref(), Some("pinned")),
        other => panic!("unexpected payload {other:?}"),
    }

    let live = resolver
        .get_capability_definition(&ctx, "worker", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap();
    assert_eq!(live.meta.name.as_str(), "worker");
    match &live.payload {
        DefinitionPayload::Component(c) => assert_eq!(c.description, None),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn live_capability_definition_of_wrong_kind_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(seed::definition("vela-system", "scaler", DefinitionKind::Trait).unwrap())
        .unwrap();
    let resolver = resolver(&store);
    let ctx = resolver.root_context();

    let err = resolver
        .get_capability_definition(&ctx, "scaler", DefinitionKind::Component, &no_annotations())
        .await
        .unwrap_err();
    // Looked up as a component definition, the trait is simply not there.
    assert!(matches!(err, ResolveError::Upstream(ref e) if e.is_not_found()));
}
