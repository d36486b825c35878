//! Database client boundary.
//!
//! This module defines the capability the reconciler needs from a database
//! (a handful of catalog checks, DDL repairs and bulk updates) without making
//! any storage assumptions. `PostgresClient` is the real adapter;
//! `InMemoryClient` backs tests and dev runs.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryClient;
pub use postgres::PostgresClient;
pub use r#trait::{
    ClientError, InventorySample, NewNotification, NotificationRecord, SchemaClient,
};
