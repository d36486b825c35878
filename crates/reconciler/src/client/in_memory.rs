use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};

use crate::schema::{self, ColumnInfo, ColumnSpec, TableSpec, INVENTORY_ITEMS, NOTIFICATIONS};

use super::r#trait::{
    ClientError, InventorySample, NewNotification, NotificationRecord, SchemaClient,
};

/// In-memory schema client.
///
/// Intended for tests/dev. Mirrors the observable behavior of the Postgres
/// adapter closely enough for the reconciler's logic to be exercised without
/// a live database: catalog metadata per table, `nextval`-style defaults on
/// identity columns, default backfill on `ADD COLUMN`, and insert failures
/// when an identity column has lost its default.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    tables: HashMap<String, Vec<ColumnInfo>>,
    notifications: Vec<NotificationRecord>,
    next_notification_id: i32,
    inventory: Vec<InventorySample>,
    next_inventory_id: i32,
    failing: HashSet<&'static str>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            notifications: Vec::new(),
            next_notification_id: 1,
            inventory: Vec::new(),
            next_inventory_id: 1,
            failing: HashSet::new(),
        }
    }
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call to the named operation fail.
    pub fn fail_on(&self, operation: &'static str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failing.insert(operation);
        }
    }

    /// Seed a notifications table whose `id` column has lost its identity
    /// default (the malformed shape the rebuild path repairs).
    pub fn seed_legacy_notifications_table(&self) {
        if let Ok(mut inner) = self.inner.write() {
            let mut columns = spec_columns(&schema::notifications_table());
            if let Some(id) = columns.iter_mut().find(|c| c.name == "id") {
                id.default = None;
            }
            inner.tables.insert(NOTIFICATIONS.to_string(), columns);
        }
    }

    /// Seed one stored notification, bypassing the insert path.
    pub fn seed_notification(
        &self,
        title: &str,
        message: &str,
        kind: &str,
        created_at: NaiveDateTime,
        is_read: bool,
    ) {
        if let Ok(mut inner) = self.inner.write() {
            let id = inner.next_notification_id;
            inner.next_notification_id += 1;
            inner.notifications.push(NotificationRecord {
                id,
                title: title.to_string(),
                message: message.to_string(),
                kind: kind.to_string(),
                created_at,
                is_read,
            });
        }
    }

    /// Seed an inventory table with the full expected column set.
    pub fn seed_inventory_table(&self) {
        self.seed_inventory_table_with(&["status", "updated_at"]);
    }

    /// Seed an inventory table missing the named repairable columns.
    pub fn seed_inventory_table_without(&self, missing: &[&str]) {
        let extra: Vec<&str> = ["status", "updated_at"]
            .into_iter()
            .filter(|c| !missing.contains(c))
            .collect();
        self.seed_inventory_table_with(&extra);
    }

    fn seed_inventory_table_with(&self, extra_columns: &[&str]) {
        if let Ok(mut inner) = self.inner.write() {
            let mut columns = vec![
                ColumnInfo {
                    name: "id".to_string(),
                    data_type: "integer".to_string(),
                    is_nullable: false,
                    default: Some(format!("nextval('{INVENTORY_ITEMS}_id_seq'::regclass)")),
                },
                ColumnInfo {
                    name: "item_code".to_string(),
                    data_type: "character varying".to_string(),
                    is_nullable: true,
                    default: None,
                },
                ColumnInfo {
                    name: "product_name".to_string(),
                    data_type: "character varying".to_string(),
                    is_nullable: true,
                    default: None,
                },
                ColumnInfo {
                    name: "total_quantity".to_string(),
                    data_type: "integer".to_string(),
                    is_nullable: false,
                    default: Some("0".to_string()),
                },
            ];
            for spec in schema::inventory_required_columns() {
                if extra_columns.contains(&spec.name) {
                    columns.push(column_info(&spec, INVENTORY_ITEMS));
                }
            }
            inner.tables.insert(INVENTORY_ITEMS.to_string(), columns);
        }
    }

    /// Seed one inventory row. Returns its id.
    pub fn seed_inventory_item(&self, total_quantity: i64, status: Option<&str>) -> i32 {
        let mut inner = self.inner.write().expect("lock poisoned");
        let id = inner.next_inventory_id;
        inner.next_inventory_id += 1;
        inner.inventory.push(InventorySample {
            id,
            item_code: Some(format!("SKU-{id:04}")),
            product_name: Some(format!("Item {id}")),
            total_quantity,
            status: status.map(str::to_string),
        });
        id
    }

    /// Snapshot of stored notifications (test inspection).
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner
            .read()
            .map(|i| i.notifications.clone())
            .unwrap_or_default()
    }

    /// Snapshot of stored inventory rows (test inspection).
    pub fn inventory(&self) -> Vec<InventorySample> {
        self.inner
            .read()
            .map(|i| i.inventory.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, ClientError> {
        self.inner
            .read()
            .map_err(|_| ClientError::statement("lock", "lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, ClientError> {
        self.inner
            .write()
            .map_err(|_| ClientError::statement("lock", "lock poisoned"))
    }

    fn check(&self, operation: &'static str) -> Result<(), ClientError> {
        let inner = self.read()?;
        if inner.failing.contains(operation) {
            return Err(ClientError::statement(operation, "injected failure"));
        }
        Ok(())
    }
}

fn require_table(inner: &Inner, table: &str, operation: &'static str) -> Result<(), ClientError> {
    if inner.tables.contains_key(table) {
        Ok(())
    } else {
        Err(ClientError::statement(
            operation,
            format!("relation \"{table}\" does not exist"),
        ))
    }
}

/// Catalog metadata a freshly created column would report.
fn column_info(spec: &ColumnSpec, table: &str) -> ColumnInfo {
    let type_token = spec
        .definition
        .split_whitespace()
        .next()
        .unwrap_or_default();
    let data_type = match type_token {
        "SERIAL" => "integer".to_string(),
        t if t.starts_with("VARCHAR") => "character varying".to_string(),
        "TEXT" => "text".to_string(),
        "TIMESTAMP" => "timestamp without time zone".to_string(),
        "BOOLEAN" => "boolean".to_string(),
        other => other.to_ascii_lowercase(),
    };
    let default = if spec.identity {
        Some(format!("nextval('{table}_id_seq'::regclass)"))
    } else {
        spec.default_expr().map(str::to_string)
    };
    ColumnInfo {
        name: spec.name.to_string(),
        data_type,
        is_nullable: !spec.identity && !spec.definition.contains("NOT NULL"),
        default,
    }
}

fn spec_columns(spec: &TableSpec) -> Vec<ColumnInfo> {
    spec.columns.iter().map(|c| column_info(c, spec.name)).collect()
}

#[async_trait]
impl SchemaClient for InMemoryClient {
    async fn ping(&self) -> Result<(), ClientError> {
        self.check("ping")
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ClientError> {
        self.check("table_exists")?;
        Ok(self.read()?.tables.contains_key(table))
    }

    async fn column_info(
        &self,
        table: &str,
        column: &str,
    ) -> Result<Option<ColumnInfo>, ClientError> {
        self.check("column_info")?;
        Ok(self
            .read()?
            .tables
            .get(table)
            .and_then(|cols| cols.iter().find(|c| c.name == column).cloned()))
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ClientError> {
        self.check("list_columns")?;
        Ok(self.read()?.tables.get(table).cloned().unwrap_or_default())
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), ClientError> {
        self.check("create_table")?;
        let mut inner = self.write()?;
        if inner.tables.contains_key(spec.name) {
            return Err(ClientError::statement(
                "create_table",
                format!("relation \"{}\" already exists", spec.name),
            ));
        }
        inner.tables.insert(spec.name.to_string(), spec_columns(spec));
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<(), ClientError> {
        self.check("add_column")?;
        let mut inner = self.write()?;
        let info = column_info(column, table);
        let Some(columns) = inner.tables.get_mut(table) else {
            return Err(ClientError::statement(
                "add_column",
                format!("relation \"{table}\" does not exist"),
            ));
        };
        if columns.iter().any(|c| c.name == column.name) {
            return Err(ClientError::statement(
                "add_column",
                format!("column \"{}\" already exists", column.name),
            ));
        }
        columns.push(info);

        // ADD COLUMN .. DEFAULT backfills existing rows.
        if table == INVENTORY_ITEMS && column.name == "status" {
            let filler = column
                .default_expr()
                .map(|d| d.trim_matches('\'').to_string());
            for row in &mut inner.inventory {
                if row.status.is_none() {
                    row.status = filler.clone();
                }
            }
        }
        Ok(())
    }

    async fn rebuild_table(&self, spec: &TableSpec) -> Result<u64, ClientError> {
        self.check("rebuild_table")?;
        // Only notification rows are stored rebuildably; refuse anything
        // else rather than renumbering unrelated state.
        if spec.name != NOTIFICATIONS {
            return Err(ClientError::statement(
                "rebuild_table",
                format!("rebuild of \"{}\" is not supported", spec.name),
            ));
        }
        let mut inner = self.write()?;
        require_table(&inner, spec.name, "rebuild_table")?;
        inner
            .tables
            .insert(spec.name.to_string(), spec_columns(spec));

        // Non-identity fields survive; identities are reassigned from 1.
        let mut carried = 0u64;
        for (idx, row) in inner.notifications.iter_mut().enumerate() {
            row.id = (idx + 1) as i32;
            carried += 1;
        }
        inner.next_notification_id = carried as i32 + 1;
        Ok(carried)
    }

    async fn count_rows(&self, table: &str) -> Result<i64, ClientError> {
        self.check("count_rows")?;
        let inner = self.read()?;
        require_table(&inner, table, "count_rows")?;
        let count = match table {
            NOTIFICATIONS => inner.notifications.len(),
            INVENTORY_ITEMS => inner.inventory.len(),
            _ => 0,
        };
        Ok(count as i64)
    }

    async fn clear_null_statuses(&self) -> Result<u64, ClientError> {
        self.check("clear_null_statuses")?;
        let mut inner = self.write()?;
        require_table(&inner, INVENTORY_ITEMS, "clear_null_statuses")?;
        let mut changed = 0u64;
        for row in &mut inner.inventory {
            if row.status.is_none() {
                row.status = Some(schema::active_status().to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn mark_depleted_out_of_stock(&self) -> Result<u64, ClientError> {
        self.check("mark_depleted_out_of_stock")?;
        let mut inner = self.write()?;
        require_table(&inner, INVENTORY_ITEMS, "mark_depleted_out_of_stock")?;
        let target = schema::out_of_stock_status();
        let mut changed = 0u64;
        for row in &mut inner.inventory {
            if row.total_quantity == 0 && row.status.as_deref() != Some(target) {
                row.status = Some(target.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn mark_stocked_active(&self) -> Result<u64, ClientError> {
        self.check("mark_stocked_active")?;
        let mut inner = self.write()?;
        require_table(&inner, INVENTORY_ITEMS, "mark_stocked_active")?;
        let target = schema::active_status();
        let mut changed = 0u64;
        for row in &mut inner.inventory {
            if row.total_quantity > 0 && row.status.as_deref() != Some(target) {
                row.status = Some(target.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_notification(&self, row: &NewNotification) -> Result<i32, ClientError> {
        self.check("insert_notification")?;
        let mut inner = self.write()?;
        require_table(&inner, NOTIFICATIONS, "insert_notification")?;

        let identity_ok = inner
            .tables
            .get(NOTIFICATIONS)
            .and_then(|cols| cols.iter().find(|c| c.name == "id"))
            .is_some_and(|c| c.has_identity_default());
        if !identity_ok {
            return Err(ClientError::statement(
                "insert_notification",
                "null value in column \"id\" violates not-null constraint",
            ));
        }

        let id = inner.next_notification_id;
        inner.next_notification_id += 1;
        inner.notifications.push(NotificationRecord {
            id,
            title: row.title.clone(),
            message: row.message.clone(),
            kind: row.kind.clone(),
            created_at: Utc::now().naive_utc(),
            is_read: false,
        });
        Ok(id)
    }

    async fn delete_notification(&self, id: i32) -> Result<u64, ClientError> {
        self.check("delete_notification")?;
        let mut inner = self.write()?;
        require_table(&inner, NOTIFICATIONS, "delete_notification")?;
        let before = inner.notifications.len();
        inner.notifications.retain(|n| n.id != id);
        Ok((before - inner.notifications.len()) as u64)
    }

    async fn sample_inventory_item(&self) -> Result<Option<InventorySample>, ClientError> {
        self.check("sample_inventory_item")?;
        let inner = self.read()?;
        require_table(&inner, INVENTORY_ITEMS, "sample_inventory_item")?;
        Ok(inner.inventory.first().cloned())
    }

    async fn update_inventory_item(
        &self,
        id: i32,
        total_quantity: i64,
        status: Option<&str>,
    ) -> Result<Option<InventorySample>, ClientError> {
        self.check("update_inventory_item")?;
        let mut inner = self.write()?;
        require_table(&inner, INVENTORY_ITEMS, "update_inventory_item")?;
        let Some(row) = inner.inventory.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        row.total_quantity = total_quantity;
        row.status = status.map(str::to_string);
        Ok(Some(row.clone()))
    }
}
