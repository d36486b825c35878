//! Schema reconciliation layer: declarative table specs, the database client
//! seam, and the plan runner that repairs the inventory application's tables.

pub mod client;
pub mod reconcile;
pub mod report;
pub mod schema;

#[cfg(test)]
mod integration_tests;

pub use client::{ClientError, InMemoryClient, PostgresClient, SchemaClient};
pub use reconcile::Reconciler;
pub use report::{ReconcilePlan, RunReport, StepKind, StepOutcome, StepReport};
pub use schema::{ColumnInfo, ColumnSpec, TableSpec};
