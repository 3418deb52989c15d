//! Per-call resolution context.
//!
//! A [`DefinitionContext`] carries the namespaces a lookup should search and
//! the caller's cancellation signal and deadline. Contexts are values: the
//! `with_*` methods return a derived context and never modify the original.
//! Derived contexts share the cancellation signal of the context they came
//! from, so cancelling a root aborts every call made under it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::DEFAULT_APP_NAMESPACE;
use crate::{Namespace, ResolveError, ResolverConfig, StoreError};

/// Cancels every call made under the context it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct DefinitionContext {
    app_namespace: Option<Namespace>,
    x_definition_namespace: Option<Namespace>,
    system_namespace: Namespace,
    default_app_namespace: Namespace,
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl DefinitionContext {
    /// Creates a root context using the namespaces from `config`.
    pub fn new(config: &ResolverConfig) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            app_namespace: None,
            x_definition_namespace: None,
            system_namespace: config.system_namespace.clone(),
            default_app_namespace: config.default_app_namespace.clone(),
            cancel: Arc::new(tx),
            deadline: None,
        }
    }

    /// Returns a context whose application namespace is `namespace`.
    ///
    /// Some callers receive requests with an empty application namespace;
    /// that means the default application namespace.
    pub fn with_app_namespace(&self, namespace: &str) -> Self {
        let ns = Namespace::new(namespace).unwrap_or_else(|| self.default_app_namespace.clone());
        Self {
            app_namespace: Some(ns),
            ..self.clone()
        }
    }

    /// Returns a context whose definitions are installed in `namespace`.
    /// An empty value means the system namespace.
    pub fn with_x_definition_namespace(&self, namespace: &str) -> Self {
        let ns = Namespace::new(namespace).unwrap_or_else(|| self.system_namespace.clone());
        Self {
            x_definition_namespace: Some(ns),
            ..self.clone()
        }
    }

    /// Returns a context that expires at `deadline`, or at the current
    /// deadline if that is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Handle that cancels this context and every context derived from the
    /// same root.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn system_namespace(&self) -> &Namespace {
        &self.system_namespace
    }

    /// Runs one store call under this context's cancellation and deadline.
    ///
    /// The outer `Result` reports whether the call was aborted; the inner one
    /// is the store's own answer, left intact so callers can branch on
    /// [`StoreError::NotFound`]. An aborted call's future is dropped.
    pub async fn guard<F, T>(&self, op: F) -> Result<Result<T, StoreError>, ResolveError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(ResolveError::DeadlineExceeded);
        }

        let mut rx = self.cancel.subscribe();
        let cancelled = async move {
            if rx.wait_for(|c| *c).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ResolveError::Cancelled),
            _ = expired => Err(ResolveError::DeadlineExceeded),
            result = op => Ok(result),
        }
    }
}

impl Default for DefinitionContext {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

/// The application namespace carried by `ctx`, or the system namespace if
/// none was set.
pub fn namespace_for_app(ctx: &DefinitionContext) -> Namespace {
    ctx.app_namespace
        .clone()
        .unwrap_or_else(|| ctx.system_namespace.clone())
}

/// The namespace definitions are installed to, or the system namespace if
/// none was set.
pub fn namespace_for_x_definition(ctx: &DefinitionContext) -> Namespace {
    ctx.x_definition_namespace
        .clone()
        .unwrap_or_else(|| ctx.system_namespace.clone())
}

/// Ordered, de-duplicated namespaces for a fetch by name: application
/// namespace, x-definition namespace, system namespace.
pub fn fetch_namespaces(ctx: &DefinitionContext) -> Vec<Namespace> {
    dedup_ordered([
        namespace_for_app(ctx),
        namespace_for_x_definition(ctx),
        ctx.system_namespace.clone(),
    ])
}

/// Ordered, de-duplicated namespaces for a latest-revision search:
/// application namespace then system namespace.
pub fn search_namespaces(ctx: &DefinitionContext) -> Vec<Namespace> {
    dedup_ordered([namespace_for_app(ctx), ctx.system_namespace.clone()])
}

fn dedup_ordered<const N: usize>(namespaces: [Namespace; N]) -> Vec<Namespace> {
    let mut out: Vec<Namespace> = Vec::with_capacity(N);
    for ns in namespaces {
        if !out.contains(&ns) {
            out.push(ns);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Resource namespace selection
// ---------------------------------------------------------------------------

/// Chooses the namespace for resources rendered on behalf of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceAccessor {
    application_namespace: Namespace,
    override_namespace: Option<Namespace>,
}

impl NamespaceAccessor {
    pub fn new(application_namespace: Namespace, override_namespace: Option<Namespace>) -> Self {
        Self {
            application_namespace,
            override_namespace,
        }
    }

    /// Namespace for a resource that may already name its own: the override
    /// wins, then the resource's own namespace, then the application's.
    pub fn for_object(&self, object_namespace: Option<&Namespace>) -> Namespace {
        self.override_namespace
            .as_ref()
            .or(object_namespace)
            .unwrap_or(&self.application_namespace)
            .clone()
    }

    pub fn namespace(&self) -> &Namespace {
        self.override_namespace
            .as_ref()
            .unwrap_or(&self.application_namespace)
    }
}

impl Default for NamespaceAccessor {
    fn default() -> Self {
        Self::new(
            Namespace::from_validated(DEFAULT_APP_NAMESPACE.to_string()),
            None,
        )
    }
}
