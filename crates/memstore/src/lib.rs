//! In-memory resource store adapter.
//!
//! Implements the [`definitions::ResourceAccessor`] trait over plain maps. It
//! backs the `defrev` CLI (seeded from a JSON fixture) and the integration
//! tests of the `definitions` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The store reproduces the behaviours the resolver
//! depends on: namespaced and legacy cluster-scoped objects, exact
//! label-selector listing in unspecified order, rejection of namespace-less
//! lookups for namespaced kinds, and immutable revisions. It also counts calls
//! and can inject failures or latency so tests can observe the resolver's I/O.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`store`] | `InMemoryStore` and its `ResourceAccessor` implementation |
//! | [`fixture`] | JSON fixture format and loading |
//! | [`seed`] | Builders for definitions and revisions |

pub mod fixture;
pub mod seed;
pub mod store;

pub use fixture::{Fixture, FixtureError};
pub use store::{CallCounts, InMemoryStore};
