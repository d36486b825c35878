//! `stockmend-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the repair error taxonomy, runtime configuration, and the inventory status
//! rules the reconciler enforces.

pub mod config;
pub mod error;
pub mod status;

pub use config::Config;
pub use error::{RepairError, RepairResult};
pub use status::ItemStatus;
