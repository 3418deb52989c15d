//! defrev CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load the JSON file named by `--config` (or
//!    `DEFREV_CONFIG`) and validate it.
//! 2. **Wire observability**: configure `tracing-subscriber` with an
//!    `EnvFilter` and a human or JSON formatter on stderr. Every `tracing`
//!    span and event emitted by the workspace crates flows through it.
//! 3. **Construct infrastructure**: seed an [`memstore::InMemoryStore`] from
//!    a fixture file and inject it into a [`DefinitionResolver`].
//! 4. **Run one command** and print its result as JSON on stdout.
//!
//! ```text
//! defrev resolve worker@v1.3.1 --kind component --fixture store.json --app-namespace shop
//! defrev latest worker worker-v1.3 --fixture store.json
//! defrev convert worker@v1.3.1
//! ```

mod config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use definitions::{
    convert_to_revision_name, CapabilityReference, DefinitionContext, DefinitionKind,
    DefinitionResolver, ResolveError, RetryPolicy, ANNOTATION_AUTO_UPDATE,
};
use memstore::{Fixture, InMemoryStore};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{CliConfig, ConfigSource, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "defrev")]
#[command(version)]
#[command(about = "Resolve capability definition references to stored revisions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file
    #[arg(long, global = true, env = "DEFREV_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a reference such as `worker` or `worker@v1.3.1`
    Resolve {
        reference: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Widen a pinned version to its newest compatible revision
        #[arg(long)]
        auto_update: bool,

        /// Print the resolved definition instead of the resolution target
        #[arg(long)]
        definition: bool,
    },

    /// Name of the newest revision of a definition within a version range
    Latest {
        /// Base definition name, e.g. `worker`
        base: String,

        /// Exact revision name or partial range, e.g. `worker-v1.3`
        token: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Convert a reference to its revision name (no store access)
    Convert { reference: String },
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Definition kind: component, trait, policy or workflow-step
    #[arg(long, default_value = "component")]
    kind: DefinitionKind,

    /// JSON fixture with the store contents
    #[arg(long)]
    fixture: PathBuf,

    /// Application namespace (empty means the default application namespace)
    #[arg(long)]
    app_namespace: Option<String>,

    /// Namespace definitions are installed to (empty means the system namespace)
    #[arg(long)]
    x_definition_namespace: Option<String>,

    /// Abort if the store has not answered within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl StoreArgs {
    fn context(&self, root: DefinitionContext) -> DefinitionContext {
        let mut ctx = root;
        if let Some(ns) = &self.app_namespace {
            ctx = ctx.with_app_namespace(ns);
        }
        if let Some(ns) = &self.x_definition_namespace {
            ctx = ctx.with_x_definition_namespace(ns);
        }
        if let Some(ms) = self.timeout_ms {
            ctx = ctx.with_timeout(Duration::from_millis(ms));
        }
        ctx
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, source) = match CliConfig::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            // Logging is not configured yet.
            eprintln!("defrev: {err:#}");
            print_json(&json!({ "error": format!("{err:#}"), "retryable": false }));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    match &source {
        ConfigSource::Defaults => info!("using default configuration"),
        ConfigSource::MissingFile(path) => {
            warn!(path = %path, "configuration file not found, using defaults")
        }
        ConfigSource::File(path) => info!(path = %path, "loaded configuration"),
    }

    match run(cli.command, &config).await {
        Ok(output) => {
            print_json(&output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            print_json(&error_output(&err));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Human => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(command: Command, config: &CliConfig) -> anyhow::Result<Value> {
    match command {
        Command::Convert { reference } => convert(&reference),
        Command::Resolve {
            reference,
            store,
            auto_update,
            definition,
        } => {
            let resolver = build_resolver(&store.fixture, config)?;
            let ctx = store.context(resolver.root_context());
            let mut annotations = BTreeMap::new();
            if auto_update {
                annotations.insert(ANNOTATION_AUTO_UPDATE.to_string(), "true".to_string());
            }

            if definition {
                let def = resolver
                    .get_capability_definition(&ctx, &reference, store.kind, &annotations)
                    .await?;
                return Ok(json!({
                    "reference": reference,
                    "kind": store.kind,
                    "definition": def,
                }));
            }

            let target = resolver
                .resolve(&ctx, &reference, store.kind, &annotations)
                .await?;
            Ok(json!({
                "reference": reference,
                "kind": store.kind,
                "result": target,
            }))
        }
        Command::Latest { base, token, store } => {
            let resolver = build_resolver(&store.fixture, config)?;
            let ctx = store.context(resolver.root_context());
            let name = resolver
                .latest_revision_name(&ctx, &base, &token, store.kind)
                .await?;
            Ok(json!({
                "base": base,
                "token": token,
                "kind": store.kind,
                "revision": name,
            }))
        }
    }
}

fn build_resolver(
    fixture: &Path,
    config: &CliConfig,
) -> anyhow::Result<DefinitionResolver<InMemoryStore>> {
    let store = Fixture::load(fixture)
        .and_then(Fixture::into_store)
        .with_context(|| format!("failed to load store fixture {}", fixture.display()))?;
    info!(objects = store.len(), "store ready");
    Ok(DefinitionResolver::new(
        Arc::new(store),
        config.resolver.clone(),
    ))
}

fn convert(reference: &str) -> anyhow::Result<Value> {
    let revision = convert_to_revision_name(reference)?;
    let parsed = CapabilityReference::parse(reference);
    Ok(json!({
        "reference": reference,
        "base_name": parsed.base_name,
        "version_token": parsed.version_token,
        "revision_name": revision,
    }))
}

fn error_output(err: &anyhow::Error) -> Value {
    let retryable = err
        .downcast_ref::<ResolveError>()
        .map(|e| matches!(e.retry_policy(), RetryPolicy::Retryable { .. }))
        .unwrap_or(false);
    json!({ "error": format!("{err:#}"), "retryable": retryable })
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("defrev: failed to render output: {err}"),
    }
}
