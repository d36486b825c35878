//! The reconciler: parameterized, idempotent schema repair operations and the
//! plan runner that sequences them.
//!
//! Every operation is safe to re-run; idempotence rests on catalog checks,
//! not on stored state. The runner isolates failures per step: a statement
//! failure is logged, recorded in the report, and the run continues.

use tracing::{error, info, warn};

use stockmend_core::{RepairError, RepairResult};

use crate::client::{NewNotification, SchemaClient};
use crate::report::{ReconcilePlan, RunReport, StepKind, StepOutcome};
use crate::schema::{
    self, ColumnInfo, ColumnSpec, TableSpec, INVENTORY_ITEMS, NOTIFICATIONS,
};

/// Result of an ensure operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyPresent,
}

/// Result of the notifications repair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationsRepair {
    /// Table present with a healthy identity column; nothing done.
    Healthy,
    /// Table was absent and has been created.
    Created,
    /// Identity default was lost; table rebuilt, rows carried over.
    Rebuilt { rows_carried: u64 },
}

/// Counts from the three normalization scans.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub cleared_null: u64,
    pub marked_out_of_stock: u64,
    pub marked_active: u64,
}

impl NormalizeSummary {
    pub fn total(&self) -> u64 {
        self.cleared_null + self.marked_out_of_stock + self.marked_active
    }
}

/// What the notification smoke test observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SmokeSummary {
    pub assigned_id: i32,
    pub rows_before: i64,
    pub rows_after: i64,
}

/// What the inventory round trip observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripSummary {
    pub item_id: i32,
    pub original_quantity: i64,
    pub bumped_quantity: i64,
}

/// Parameterized schema reconciler over any [`SchemaClient`].
#[derive(Debug)]
pub struct Reconciler<C: SchemaClient> {
    client: C,
}

impl<C: SchemaClient> Reconciler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create a table from its spec unless it already exists.
    pub async fn ensure_table(&self, spec: &TableSpec) -> RepairResult<EnsureOutcome> {
        if self.client.table_exists(spec.name).await? {
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        self.client.create_table(spec).await?;
        info!(table = spec.name, "table created");
        Ok(EnsureOutcome::Created)
    }

    /// Add a column unless it already exists.
    pub async fn ensure_column(
        &self,
        table: &str,
        column: &ColumnSpec,
    ) -> RepairResult<EnsureOutcome> {
        if self.client.column_info(table, column.name).await?.is_some() {
            return Ok(EnsureOutcome::AlreadyPresent);
        }
        self.client.add_column(table, column).await?;
        info!(table, column = column.name, "column added");
        Ok(EnsureOutcome::Created)
    }

    /// Ensure the notifications table exists with a working identity column.
    ///
    /// A table whose `id` lost its auto-increment default (or lost the column
    /// entirely) is rebuilt in a single transaction; field values survive,
    /// identities are reassigned.
    pub async fn repair_notifications(&self) -> RepairResult<NotificationsRepair> {
        let spec = schema::notifications_table();

        if !self.client.table_exists(NOTIFICATIONS).await? {
            self.client.create_table(&spec).await?;
            info!(table = NOTIFICATIONS, "table created");
            return Ok(NotificationsRepair::Created);
        }

        let healthy = self
            .client
            .column_info(NOTIFICATIONS, "id")
            .await?
            .is_some_and(|c| c.has_identity_default());
        if healthy {
            return Ok(NotificationsRepair::Healthy);
        }

        warn!(
            table = NOTIFICATIONS,
            "identity column misconfigured, rebuilding"
        );
        let rows_carried = self.client.rebuild_table(&spec).await?;
        info!(table = NOTIFICATIONS, rows_carried, "table rebuilt");
        Ok(NotificationsRepair::Rebuilt { rows_carried })
    }

    /// Add any missing repairable columns to the inventory table.
    ///
    /// Returns the names of columns added. Errors when the table itself is
    /// absent; the reconciler never creates it.
    pub async fn repair_inventory_columns(&self) -> RepairResult<Vec<&'static str>> {
        if !self.client.table_exists(INVENTORY_ITEMS).await? {
            return Err(RepairError::precondition(format!(
                "{INVENTORY_ITEMS} table does not exist"
            )));
        }
        let mut added = Vec::new();
        for column in schema::inventory_required_columns() {
            if self.ensure_column(INVENTORY_ITEMS, &column).await? == EnsureOutcome::Created {
                added.push(column.name);
            }
        }
        Ok(added)
    }

    /// Three corrective scans, each a bulk conditional update.
    pub async fn normalize_status(&self) -> RepairResult<NormalizeSummary> {
        let cleared_null = self.client.clear_null_statuses().await?;
        let marked_out_of_stock = self.client.mark_depleted_out_of_stock().await?;
        let marked_active = self.client.mark_stocked_active().await?;
        Ok(NormalizeSummary {
            cleared_null,
            marked_out_of_stock,
            marked_active,
        })
    }

    /// Insert a throwaway notification, assert it got an identity, delete it.
    ///
    /// Leaves the row count exactly where it started.
    pub async fn smoke_test(&self) -> RepairResult<SmokeSummary> {
        let rows_before = self.client.count_rows(NOTIFICATIONS).await?;
        let assigned_id = self
            .client
            .insert_notification(&NewNotification::smoke_test())
            .await?;
        let deleted = self.client.delete_notification(assigned_id).await?;
        let rows_after = self.client.count_rows(NOTIFICATIONS).await?;

        if deleted != 1 || rows_after != rows_before {
            return Err(RepairError::statement(
                "smoke_test",
                format!(
                    "cleanup mismatch: deleted {deleted}, rows {rows_before} -> {rows_after}"
                ),
            ));
        }
        Ok(SmokeSummary {
            assigned_id,
            rows_before,
            rows_after,
        })
    }

    /// Bump one inventory row's quantity, verify the stored value, revert.
    ///
    /// Returns `None` when there is no row to test with.
    pub async fn inventory_round_trip(&self) -> RepairResult<Option<RoundTripSummary>> {
        let Some(item) = self.client.sample_inventory_item().await? else {
            return Ok(None);
        };

        let bumped = item.total_quantity + 1;
        let updated = self
            .client
            .update_inventory_item(item.id, bumped, Some(schema::active_status()))
            .await?
            .ok_or_else(|| {
                RepairError::statement("inventory_round_trip", "update affected no rows")
            })?;

        if updated.total_quantity != bumped {
            return Err(RepairError::statement(
                "inventory_round_trip",
                format!(
                    "stored quantity {} does not match written {bumped}",
                    updated.total_quantity
                ),
            ));
        }

        // Put the row back exactly as found.
        self.client
            .update_inventory_item(item.id, item.total_quantity, item.status.as_deref())
            .await?;

        Ok(Some(RoundTripSummary {
            item_id: item.id,
            original_quantity: item.total_quantity,
            bumped_quantity: bumped,
        }))
    }

    /// Catalog metadata for one table; empty when the table is absent.
    pub async fn describe(&self, table: &str) -> RepairResult<Vec<ColumnInfo>> {
        Ok(self.client.list_columns(table).await?)
    }

    /// Execute a plan, one step at a time, isolating failures per step.
    pub async fn run(&self, plan: &ReconcilePlan) -> RunReport {
        let mut report = RunReport::default();
        for step in &plan.steps {
            let outcome = match self.run_step(*step).await {
                Ok(outcome) => outcome,
                Err(err) => StepOutcome::Failed {
                    error: err.to_string(),
                },
            };
            match &outcome {
                StepOutcome::Succeeded { detail } => {
                    info!(step = step.name(), "{detail}");
                }
                StepOutcome::Skipped { reason } => {
                    warn!(step = step.name(), "skipped: {reason}");
                }
                StepOutcome::Failed { error } => {
                    error!(step = step.name(), "{error}");
                }
            }
            report.record(*step, outcome);
        }
        info!("{}", report.summary());
        report
    }

    async fn run_step(&self, step: StepKind) -> RepairResult<StepOutcome> {
        match step {
            StepKind::Ping => {
                self.client.ping().await?;
                Ok(succeeded("database connection ok"))
            }
            StepKind::RepairNotifications => {
                let detail = match self.repair_notifications().await? {
                    NotificationsRepair::Healthy => {
                        "notifications table healthy".to_string()
                    }
                    NotificationsRepair::Created => "notifications table created".to_string(),
                    NotificationsRepair::Rebuilt { rows_carried } => {
                        format!("notifications table rebuilt, {rows_carried} rows carried over")
                    }
                };
                Ok(StepOutcome::Succeeded { detail })
            }
            StepKind::NotificationSmokeTest => {
                if !self.client.table_exists(NOTIFICATIONS).await? {
                    return Ok(skipped("notifications table does not exist"));
                }
                let smoke = self.smoke_test().await?;
                Ok(StepOutcome::Succeeded {
                    detail: format!(
                        "inserted and removed test notification id {}",
                        smoke.assigned_id
                    ),
                })
            }
            StepKind::RepairInventoryColumns => {
                if !self.client.table_exists(INVENTORY_ITEMS).await? {
                    return Ok(skipped("inventory_items table does not exist"));
                }
                let added = self.repair_inventory_columns().await?;
                let detail = if added.is_empty() {
                    "all required inventory columns present".to_string()
                } else {
                    format!("added inventory columns: {}", added.join(", "))
                };
                Ok(StepOutcome::Succeeded { detail })
            }
            StepKind::NormalizeStatus => {
                if !self.client.table_exists(INVENTORY_ITEMS).await? {
                    return Ok(skipped("inventory_items table does not exist"));
                }
                let summary = self.normalize_status().await?;
                Ok(StepOutcome::Succeeded {
                    detail: format!(
                        "normalized statuses: {} null cleared, {} out of stock, {} active",
                        summary.cleared_null, summary.marked_out_of_stock, summary.marked_active
                    ),
                })
            }
            StepKind::InventoryRoundTrip => {
                if !self.client.table_exists(INVENTORY_ITEMS).await? {
                    return Ok(skipped("inventory_items table does not exist"));
                }
                match self.inventory_round_trip().await? {
                    Some(trip) => Ok(StepOutcome::Succeeded {
                        detail: format!(
                            "item {} quantity {} -> {} and back",
                            trip.item_id, trip.original_quantity, trip.bumped_quantity
                        ),
                    }),
                    None => Ok(skipped("no inventory rows to test with")),
                }
            }
            StepKind::DescribeTables => {
                let mut described = Vec::new();
                for table in [NOTIFICATIONS, INVENTORY_ITEMS] {
                    let columns = self.describe(table).await?;
                    if columns.is_empty() {
                        warn!(table, "table does not exist");
                        continue;
                    }
                    for col in &columns {
                        info!(
                            table,
                            column = %col.name,
                            data_type = %col.data_type,
                            nullable = col.is_nullable,
                            default = col.default.as_deref().unwrap_or("none"),
                            "column"
                        );
                    }
                    described.push(format!("{table} ({} columns)", columns.len()));
                }
                Ok(StepOutcome::Succeeded {
                    detail: if described.is_empty() {
                        "no tables present".to_string()
                    } else {
                        described.join(", ")
                    },
                })
            }
            StepKind::VerifyTables => {
                let mut parts = Vec::new();
                for table in [NOTIFICATIONS, INVENTORY_ITEMS] {
                    if self.client.table_exists(table).await? {
                        let count = self.client.count_rows(table).await?;
                        parts.push(format!("{table}: {count} rows"));
                    } else {
                        parts.push(format!("{table}: absent"));
                    }
                }
                Ok(StepOutcome::Succeeded {
                    detail: parts.join(", "),
                })
            }
        }
    }
}

fn succeeded(detail: &str) -> StepOutcome {
    StepOutcome::Succeeded {
        detail: detail.to_string(),
    }
}

fn skipped(reason: &str) -> StepOutcome {
    StepOutcome::Skipped {
        reason: reason.to_string(),
    }
}
