//! SchemaFlow Remediation - schema drift detection for data pipelines
//!
//! Compares two snapshots of a tabular schema (column name -> type), reports
//! every added, removed or retyped column, and asks a text-generation
//! backend for a suggested edit to the downstream transformation script.
//!
//! - `snapshot`: snapshot loading, the change taxonomy and the drift detector
//! - `pipeline`: the generation gateway, the remediation planner and the orchestrator

pub mod config;
pub mod error;
pub mod pipeline;
pub mod snapshot;

pub use error::{AppError, AppResult};
