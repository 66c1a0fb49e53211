//! Cluster health diagnosis core.
//!
//! One pass inspects a point-in-time snapshot of pods, nodes, replica
//! groups, and lifecycle events, derives problem messages per entity, and
//! filters them through a persisted deduplication store so recurring
//! problems are reported once per window. Fetching is abstracted behind
//! [`client::ClusterClient`]; rendering lives in the `notify` crate.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod alert;
pub mod client;
pub mod derive;
pub mod markup;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod units;

#[cfg(test)]
mod testutil;

pub use alert::{ClusterAlerts, EntityAlert};
pub use client::ClusterClient;
pub use orchestrator::{DiagnosisOutcome, Diagnostician};
pub use state::{EntityKind, EntityName, EntityState, EventState};
pub use store::{DedupStore, StoreError};
