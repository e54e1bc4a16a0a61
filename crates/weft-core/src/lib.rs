//! # weft-core
//!
//! Shared plumbing for the Weft workspace.
//!
//! Weft carries two independent engines:
//! - `weft-diff`: patience-diff sequence matching for line-level diff tools
//! - `weft-orchestrator`: a reconciliation loop keeping background watcher
//!   tasks in line with an observed set of resources and namespaces
//!
//! This crate holds what both of them (and the CLI) lean on: the unified
//! error type, repository-level configuration, and fail-open helpers.

pub mod config;
mod error;
pub mod fail_open;

pub use config::{DiffConfig, OrchestratorSettings, PeeringSettings, WeftConfig};
pub use error::{Result, WeftError};
