use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockmend_core::RepairError;

use crate::schema::{ColumnInfo, ColumnSpec, TableSpec};

/// Client-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The connection (or pool) is unusable.
    #[error("connection failed in {operation}: {message}")]
    Connection {
        operation: &'static str,
        message: String,
    },

    /// One statement failed; the operation it belonged to is named so the
    /// runner can report it.
    #[error("{operation} failed: {message}")]
    Statement {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn statement(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Statement {
            operation,
            message: message.into(),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Connection { operation, .. } | Self::Statement { operation, .. } => operation,
        }
    }
}

impl From<ClientError> for RepairError {
    fn from(err: ClientError) -> Self {
        RepairError::statement(err.operation(), err.to_string())
    }
}

/// A notification row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i32,
    pub title: String,
    pub message: String,
    /// Stored in the `type` column.
    pub kind: String,
    pub created_at: NaiveDateTime,
    pub is_read: bool,
}

/// Fields for a throwaway notification insert; everything else defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: String,
}

impl NewNotification {
    /// The disposable row the smoke test writes.
    pub fn smoke_test() -> Self {
        Self {
            title: "Connectivity check".to_string(),
            message: "Verifying notifications insert/delete round trip".to_string(),
            kind: "info".to_string(),
        }
    }
}

/// One inventory row, as much of it as the repair paths need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySample {
    pub id: i32,
    pub item_code: Option<String>,
    pub product_name: Option<String>,
    pub total_quantity: i64,
    pub status: Option<String>,
}

/// The database capability the reconciler runs against.
///
/// Every method maps to a single statement (or, for `rebuild_table`, a single
/// transaction). Implementations must be safe to call repeatedly; the
/// reconciler's idempotence rests on the catalog checks, not on client state.
#[async_trait]
pub trait SchemaClient: Send + Sync {
    /// `SELECT 1` connectivity check.
    async fn ping(&self) -> Result<(), ClientError>;

    /// Whether a table exists in the `public` schema.
    async fn table_exists(&self, table: &str) -> Result<bool, ClientError>;

    /// Catalog metadata for one column, `None` when absent.
    async fn column_info(&self, table: &str, column: &str)
        -> Result<Option<ColumnInfo>, ClientError>;

    /// All columns of a table in ordinal position order.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ClientError>;

    /// Create a table from its spec. Fails if it already exists; callers
    /// check existence first.
    async fn create_table(&self, spec: &TableSpec) -> Result<(), ClientError>;

    /// Add one column to an existing table.
    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<(), ClientError>;

    /// Atomically rebuild a table to match its spec, carrying every row's
    /// non-identity fields over. Returns the number of rows carried.
    ///
    /// Implementations must not expose a window in which the data is gone:
    /// the Postgres adapter builds a shadow table, copies, drops and renames
    /// inside one transaction.
    async fn rebuild_table(&self, spec: &TableSpec) -> Result<u64, ClientError>;

    /// `SELECT COUNT(*)`.
    async fn count_rows(&self, table: &str) -> Result<i64, ClientError>;

    /// Set status to 'active' wherever it is null. Returns rows changed.
    async fn clear_null_statuses(&self) -> Result<u64, ClientError>;

    /// Set status to 'out of stock' wherever quantity is zero and the status
    /// differs. Returns rows changed.
    async fn mark_depleted_out_of_stock(&self) -> Result<u64, ClientError>;

    /// Set status to 'active' wherever quantity is positive and the status
    /// differs. Returns rows changed.
    async fn mark_stocked_active(&self) -> Result<u64, ClientError>;

    /// Insert a notification and return its assigned identity.
    async fn insert_notification(&self, row: &NewNotification) -> Result<i32, ClientError>;

    /// Delete a notification by identity. Returns rows deleted.
    async fn delete_notification(&self, id: i32) -> Result<u64, ClientError>;

    /// Any one inventory row, or `None` when the table is empty.
    async fn sample_inventory_item(&self) -> Result<Option<InventorySample>, ClientError>;

    /// Overwrite one inventory row's quantity and status (touching
    /// `updated_at`), returning the row as stored, or `None` when the id no
    /// longer exists.
    async fn update_inventory_item(
        &self,
        id: i32,
        total_quantity: i64,
        status: Option<&str>,
    ) -> Result<Option<InventorySample>, ClientError>;
}
