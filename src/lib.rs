//! Entity cache for the Discord API.
//!
//! Every remote object is decoded into a single shared instance per ID and
//! updated in place as gateway events arrive, with each update reporting the
//! prior values of what it changed.
//!
//! - [`types`]: entity types, typed IDs and the field converters.
//! - [`cache`]: the identity map ([`Registry`](cache::Registry)), the
//!   decode / diff / encode contract and cross-entity indices.
//! - [`events`]: gateway payload parsing.
//! - [`dispatch`]: applying parsed events to a registry.
//! - [`config`]: environment configuration of the `cache_replay` binary.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod types;
