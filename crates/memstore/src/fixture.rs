//! JSON fixtures for seeding an [`InMemoryStore`].
//!
//! ```json
//! {
//!   "namespaced": [
//!     {
//!       "resource": "Revision",
//!       "meta": { "name": "worker-v1.3.1", "namespace": "vela-system",
//!                 "labels": { "componentdefinition.oam.dev/name": "worker" } },
//!       "revision": 3,
//!       "payload": { "kind": "Component", "spec": { "description": "worker" } }
//!     }
//!   ],
//!   "cluster_scoped": []
//! }
//! ```

use std::path::{Path, PathBuf};

use definitions::{Resource, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::InMemoryStore;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fixture rejected by store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid object name \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },
}

/// Store contents as written in a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub namespaced: Vec<Resource>,
    /// Legacy objects stored without a namespace. Any namespace in their
    /// metadata is dropped on load.
    pub cluster_scoped: Vec<Resource>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Builds a fresh store holding every object of the fixture.
    pub fn into_store(self) -> Result<InMemoryStore, FixtureError> {
        let store = InMemoryStore::new();
        self.seed(&store)?;
        Ok(store)
    }

    /// Inserts every object of the fixture into `store`.
    pub fn seed(self, store: &InMemoryStore) -> Result<(), FixtureError> {
        let namespaced = self.namespaced.len();
        let cluster_scoped = self.cluster_scoped.len();
        for resource in self.namespaced {
            store.insert(resource)?;
        }
        for resource in self.cluster_scoped {
            store.insert_cluster_scoped(resource)?;
        }
        info!(namespaced, cluster_scoped, "seeded in-memory store");
        Ok(())
    }
}
