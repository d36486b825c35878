//! Declarative table/column specifications.
//!
//! The tables the reconciler repairs are described as data, not as inline SQL
//! repeated per call site. A `TableSpec` can render its own `CREATE TABLE`
//! statement and knows which columns carry data (everything except the
//! identity column), which is what the rebuild path copies.

use serde::Serialize;

use stockmend_core::ItemStatus;

/// Name of the notifications table.
pub const NOTIFICATIONS: &str = "notifications";

/// Name of the inventory items table. Never created by the reconciler, only
/// repaired in place.
pub const INVENTORY_ITEMS: &str = "inventory_items";

/// Specification of a single column: its name plus the SQL definition that
/// follows it in DDL (`VARCHAR(255) NOT NULL`, `SERIAL PRIMARY KEY`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub definition: &'static str,
    /// Identity columns are auto-assigned on insert and never copied on rebuild.
    pub identity: bool,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, definition: &'static str) -> Self {
        Self {
            name,
            definition,
            identity: false,
        }
    }

    pub const fn identity(name: &'static str, definition: &'static str) -> Self {
        Self {
            name,
            definition,
            identity: true,
        }
    }

    /// `ADD COLUMN` fragment for this column.
    pub fn add_column_sql(&self, table: &str) -> String {
        format!(
            "ALTER TABLE {table} ADD COLUMN {} {}",
            self.name, self.definition
        )
    }

    /// The default expression declared for this column, if any.
    pub fn default_expr(&self) -> Option<&'static str> {
        self.definition
            .split_once("DEFAULT ")
            .map(|(_, rest)| rest.trim())
    }
}

/// Specification of a table: name plus ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Render `CREATE TABLE` DDL for this spec under its own name.
    pub fn create_sql(&self) -> String {
        self.create_sql_named(self.name)
    }

    /// Render `CREATE TABLE` DDL under a different name (shadow tables).
    pub fn create_sql_named(&self, name: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.definition))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {name} ({columns})")
    }

    /// Comma-separated list of the non-identity columns, in declared order.
    ///
    /// This is the column list a rebuild copies; identity values are
    /// reassigned by the fresh table.
    pub fn data_column_list(&self) -> String {
        self.columns
            .iter()
            .filter(|c| !c.identity)
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The notifications table as the application expects it.
pub fn notifications_table() -> TableSpec {
    TableSpec {
        name: NOTIFICATIONS,
        columns: vec![
            ColumnSpec::identity("id", "SERIAL PRIMARY KEY"),
            ColumnSpec::new("title", "VARCHAR(255) NOT NULL"),
            ColumnSpec::new("message", "TEXT NOT NULL"),
            ColumnSpec::new("type", "VARCHAR(50) DEFAULT 'info'"),
            ColumnSpec::new("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
            ColumnSpec::new("is_read", "BOOLEAN DEFAULT FALSE"),
        ],
    }
}

/// Columns the inventory table must carry; added in place when absent.
pub fn inventory_required_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("status", "VARCHAR(50) DEFAULT 'active'"),
        ColumnSpec::new("updated_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
    ]
}

/// Catalog metadata for one column, as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

impl ColumnInfo {
    /// Whether an identity column's auto-assignment is intact.
    ///
    /// A SERIAL column reports a `nextval(..)` default; a bare default-less
    /// `id` means the table was created without auto-increment and inserts
    /// will fail.
    pub fn has_identity_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Statuses the normalization scans write. Re-exported here so the SQL layer
/// and the in-memory layer agree on the exact text.
pub fn active_status() -> &'static str {
    ItemStatus::Active.as_str()
}

pub fn out_of_stock_status() -> &'static str {
    ItemStatus::OutOfStock.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_ddl_matches_expected_schema() {
        let sql = notifications_table().create_sql();
        assert_eq!(
            sql,
            "CREATE TABLE notifications (id SERIAL PRIMARY KEY, \
             title VARCHAR(255) NOT NULL, message TEXT NOT NULL, \
             type VARCHAR(50) DEFAULT 'info', \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
             is_read BOOLEAN DEFAULT FALSE)"
        );
    }

    #[test]
    fn data_columns_exclude_identity() {
        assert_eq!(
            notifications_table().data_column_list(),
            "title, message, type, created_at, is_read"
        );
    }

    #[test]
    fn shadow_ddl_uses_given_name() {
        let sql = notifications_table().create_sql_named("notifications_rebuild");
        assert!(sql.starts_with("CREATE TABLE notifications_rebuild ("));
    }

    #[test]
    fn column_default_is_extracted() {
        let spec = inventory_required_columns();
        assert_eq!(spec[0].default_expr(), Some("'active'"));
        assert_eq!(spec[1].default_expr(), Some("CURRENT_TIMESTAMP"));
        assert_eq!(ColumnSpec::new("message", "TEXT NOT NULL").default_expr(), None);
    }
}
