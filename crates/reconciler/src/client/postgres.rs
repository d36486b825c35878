//! Postgres-backed schema client.
//!
//! One `PgPool` per process invocation, one statement per method. Identifier
//! positions (table/column names) come from the static specs in
//! [`crate::schema`], never from user input; row values are always bound as
//! parameters.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `ClientError` as follows: pool/IO/TLS failures
//! become `Connection`, everything else (including database-reported errors
//! with an SQLSTATE) becomes `Statement` carrying the originating operation
//! name so the runner can log it.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use crate::schema::{ColumnInfo, ColumnSpec, TableSpec};

use super::r#trait::{
    ClientError, InventorySample, NewNotification, SchemaClient,
};

/// Postgres adapter for the reconciler.
#[derive(Debug, Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against the given connection string.
    ///
    /// The reconciler is strictly sequential, so a single connection is
    /// enough.
    pub async fn connect(database_url: &str) -> Result<Self, ClientError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SchemaClient for PostgresClient {
    #[instrument(skip(self), err)]
    async fn ping(&self) -> Result<(), ClientError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn table_exists(&self, table: &str) -> Result<bool, ClientError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("table_exists", e))
    }

    #[instrument(skip(self), err)]
    async fn column_info(
        &self,
        table: &str,
        column: &str,
    ) -> Result<Option<ColumnInfo>, ClientError> {
        let row: Option<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT column_name, data_type, is_nullable, column_default
            FROM information_schema.columns
            WHERE table_schema = 'public'
            AND table_name = $1
            AND column_name = $2
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("column_info", e))?;

        Ok(row.map(column_info_from_row))
    }

    #[instrument(skip(self), err)]
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ClientError> {
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT column_name, data_type, is_nullable, column_default
            FROM information_schema.columns
            WHERE table_schema = 'public'
            AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_columns", e))?;

        Ok(rows.into_iter().map(column_info_from_row).collect())
    }

    #[instrument(skip(self, spec), fields(table = spec.name), err)]
    async fn create_table(&self, spec: &TableSpec) -> Result<(), ClientError> {
        sqlx::query(&spec.create_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_table", e))?;
        Ok(())
    }

    #[instrument(skip(self, column), fields(column = column.name), err)]
    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<(), ClientError> {
        sqlx::query(&column.add_column_sql(table))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_column", e))?;
        Ok(())
    }

    /// Shadow-table rebuild, one transaction end to end.
    ///
    /// The old table keeps serving reads until the drop inside the
    /// transaction; a failure at any point rolls everything back and leaves
    /// the original untouched.
    #[instrument(skip(self, spec), fields(table = spec.name), err)]
    async fn rebuild_table(&self, spec: &TableSpec) -> Result<u64, ClientError> {
        let shadow = format!("{}_rebuild", spec.name);

        // Copy in identity order so the reassigned ids keep the rows'
        // original relative order. A malformed table may have lost the
        // identity column entirely, in which case there is no order to keep.
        let order_by = match spec.columns.iter().find(|c| c.identity) {
            Some(identity) => self
                .column_info(spec.name, identity.name)
                .await?
                .map(|_| identity.name),
            None => None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?;

        sqlx::query(&spec.create_sql_named(&shadow))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?;

        let carried = sqlx::query(&copy_rows_sql(spec, &shadow, order_by))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?
            .rows_affected();

        sqlx::query(&format!("DROP TABLE {} CASCADE", spec.name))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?;

        sqlx::query(&format!("ALTER TABLE {shadow} RENAME TO {}", spec.name))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("rebuild_table", e))?;

        Ok(carried)
    }

    #[instrument(skip(self), err)]
    async fn count_rows(&self, table: &str) -> Result<i64, ClientError> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_rows", e))
    }

    #[instrument(skip(self), err)]
    async fn clear_null_statuses(&self) -> Result<u64, ClientError> {
        let result = sqlx::query("UPDATE inventory_items SET status = $1 WHERE status IS NULL")
            .bind(crate::schema::active_status())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("clear_null_statuses", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn mark_depleted_out_of_stock(&self) -> Result<u64, ClientError> {
        let result = sqlx::query(
            "UPDATE inventory_items SET status = $1 \
             WHERE total_quantity = 0 AND status IS DISTINCT FROM $1",
        )
        .bind(crate::schema::out_of_stock_status())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_depleted_out_of_stock", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn mark_stocked_active(&self) -> Result<u64, ClientError> {
        let result = sqlx::query(
            "UPDATE inventory_items SET status = $1 \
             WHERE total_quantity > 0 AND status IS DISTINCT FROM $1",
        )
        .bind(crate::schema::active_status())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_stocked_active", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, row), err)]
    async fn insert_notification(&self, row: &NewNotification) -> Result<i32, ClientError> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO notifications (title, message, type) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&row.title)
        .bind(&row.message)
        .bind(&row.kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_notification", e))
    }

    #[instrument(skip(self), err)]
    async fn delete_notification(&self, id: i32) -> Result<u64, ClientError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_notification", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn sample_inventory_item(&self) -> Result<Option<InventorySample>, ClientError> {
        let row: Option<(i32, Option<String>, Option<String>, i64, Option<String>)> =
            sqlx::query_as(
                "SELECT id, item_code, product_name, total_quantity::BIGINT, status \
                 FROM inventory_items LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("sample_inventory_item", e))?;

        Ok(row.map(inventory_sample_from_row))
    }

    #[instrument(skip(self), err)]
    async fn update_inventory_item(
        &self,
        id: i32,
        total_quantity: i64,
        status: Option<&str>,
    ) -> Result<Option<InventorySample>, ClientError> {
        let row: Option<(i32, Option<String>, Option<String>, i64, Option<String>)> =
            sqlx::query_as(
                "UPDATE inventory_items \
                 SET total_quantity = $2, status = $3, updated_at = CURRENT_TIMESTAMP \
                 WHERE id = $1 \
                 RETURNING id, item_code, product_name, total_quantity::BIGINT, status",
            )
            .bind(id)
            .bind(total_quantity)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_inventory_item", e))?;

        Ok(row.map(inventory_sample_from_row))
    }
}

fn copy_rows_sql(spec: &TableSpec, shadow: &str, order_by: Option<&str>) -> String {
    let columns = spec.data_column_list();
    let mut sql = format!(
        "INSERT INTO {shadow} ({columns}) SELECT {columns} FROM {}",
        spec.name
    );
    if let Some(column) = order_by {
        sql.push_str(&format!(" ORDER BY {column}"));
    }
    sql
}

fn column_info_from_row(row: (String, String, String, Option<String>)) -> ColumnInfo {
    let (name, data_type, is_nullable, default) = row;
    ColumnInfo {
        name,
        data_type,
        is_nullable: is_nullable == "YES",
        default,
    }
}

fn inventory_sample_from_row(
    row: (i32, Option<String>, Option<String>, i64, Option<String>),
) -> InventorySample {
    let (id, item_code, product_name, total_quantity, status) = row;
    InventorySample {
        id,
        item_code,
        product_name,
        total_quantity,
        status,
    }
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> ClientError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = match db_err.code() {
                Some(code) => format!("{} (SQLSTATE {code})", db_err.message()),
                None => db_err.message().to_string(),
            };
            ClientError::Statement { operation, message: msg }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => ClientError::Connection {
            operation,
            message: "connection pool unavailable".to_string(),
        },
        sqlx::Error::Io(e) => ClientError::Connection {
            operation,
            message: e.to_string(),
        },
        sqlx::Error::Tls(e) => ClientError::Connection {
            operation,
            message: e.to_string(),
        },
        other => ClientError::Statement {
            operation,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::notifications_table;

    #[test]
    fn rebuild_copy_orders_by_identity() {
        let sql = copy_rows_sql(&notifications_table(), "notifications_rebuild", Some("id"));
        assert_eq!(
            sql,
            "INSERT INTO notifications_rebuild \
             (title, message, type, created_at, is_read) \
             SELECT title, message, type, created_at, is_read \
             FROM notifications ORDER BY id"
        );
    }

    #[test]
    fn rebuild_copy_skips_ordering_without_identity_column() {
        let sql = copy_rows_sql(&notifications_table(), "notifications_rebuild", None);
        assert!(!sql.contains("ORDER BY"));
    }
}
