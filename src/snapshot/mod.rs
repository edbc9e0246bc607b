//! Schema Snapshot Module
//!
//! Detecting what changed in an upstream schema.
//! This module provides:
//! - Schema snapshots (point-in-time column -> type captures)
//! - The column change taxonomy
//! - The drift detector (comparing snapshots)

pub mod changes;
pub mod diff;
pub mod store;

pub use changes::{ChangeRecord, ChangeType};
pub use diff::{ChangeSet, Drift, DriftDetector, DriftSummary};
pub use store::{SchemaSnapshot, SnapshotStore, TypeDescriptor};
