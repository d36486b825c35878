//! End-to-end tests for the reconciler against the in-memory client.
//!
//! Verifies:
//! - Ensure operations are idempotent (second run is a no-op)
//! - Normalization enforces the status/quantity invariant
//! - Rebuild preserves field values and row count, reassigning identities
//! - A failing step does not prevent later independent steps from running

use chrono::NaiveDate;

use stockmend_core::{ItemStatus, RepairError};

use crate::client::{InMemoryClient, SchemaClient};
use crate::reconcile::{EnsureOutcome, NotificationsRepair, Reconciler};
use crate::report::{ReconcilePlan, StepKind, StepOutcome};
use crate::schema::{self, INVENTORY_ITEMS, NOTIFICATIONS};

fn reconciler() -> Reconciler<InMemoryClient> {
    Reconciler::new(InMemoryClient::new())
}

fn timestamp(day: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

#[tokio::test]
async fn ensure_table_is_idempotent() {
    let r = reconciler();
    let spec = schema::notifications_table();

    assert_eq!(r.ensure_table(&spec).await.unwrap(), EnsureOutcome::Created);
    assert_eq!(
        r.ensure_table(&spec).await.unwrap(),
        EnsureOutcome::AlreadyPresent
    );

    let columns = r.describe(NOTIFICATIONS).await.unwrap();
    assert_eq!(columns.len(), spec.columns.len());
}

#[tokio::test]
async fn ensure_column_is_idempotent() {
    let r = reconciler();
    r.client().seed_inventory_table_without(&["status", "updated_at"]);

    let added = r.repair_inventory_columns().await.unwrap();
    assert_eq!(added, vec!["status", "updated_at"]);

    let added_again = r.repair_inventory_columns().await.unwrap();
    assert!(added_again.is_empty());
}

#[tokio::test]
async fn repair_creates_missing_notifications_table() {
    let r = reconciler();

    assert_eq!(
        r.repair_notifications().await.unwrap(),
        NotificationsRepair::Created
    );
    assert_eq!(
        r.repair_notifications().await.unwrap(),
        NotificationsRepair::Healthy
    );
}

#[tokio::test]
async fn rebuild_preserves_rows_and_reassigns_identities() {
    let r = reconciler();
    r.client().seed_legacy_notifications_table();
    r.client()
        .seed_notification("Low stock", "Item A is low", "warning", timestamp(3), true);
    r.client()
        .seed_notification("Restocked", "Item B restocked", "info", timestamp(7), false);

    let repaired = r.repair_notifications().await.unwrap();
    assert_eq!(repaired, NotificationsRepair::Rebuilt { rows_carried: 2 });

    let rows = r.client().notifications();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[1].id, 2);
    // Field values survive untouched, timestamps and flags included.
    assert_eq!(rows[0].title, "Low stock");
    assert_eq!(rows[0].kind, "warning");
    assert_eq!(rows[0].created_at, timestamp(3));
    assert!(rows[0].is_read);
    assert_eq!(rows[1].message, "Item B restocked");
    assert!(!rows[1].is_read);

    // The rebuilt table accepts inserts again.
    let smoke = r.smoke_test().await.unwrap();
    assert_eq!(smoke.rows_before, 2);
    assert_eq!(smoke.rows_after, 2);
}

#[tokio::test]
async fn normalize_enforces_status_quantity_invariant() {
    let r = reconciler();
    r.client().seed_inventory_table();
    r.client().seed_inventory_item(0, None);
    r.client().seed_inventory_item(0, Some("active"));
    r.client().seed_inventory_item(5, Some("out of stock"));
    r.client().seed_inventory_item(12, Some("active"));
    r.client().seed_inventory_item(7, None);

    let summary = r.normalize_status().await.unwrap();
    assert_eq!(summary.cleared_null, 2);
    assert_eq!(summary.marked_out_of_stock, 2);
    assert_eq!(summary.marked_active, 1);

    for row in r.client().inventory() {
        let expected = ItemStatus::expected_for_quantity(row.total_quantity);
        assert_eq!(row.status.as_deref(), Some(expected.as_str()));
    }

    // Second pass finds nothing left to fix.
    let again = r.normalize_status().await.unwrap();
    assert_eq!(again.total(), 0);
}

#[tokio::test]
async fn normalize_clears_every_null_status() {
    let r = reconciler();
    r.client().seed_inventory_table();
    for qty in [0, 1, 4, 0, 9] {
        r.client().seed_inventory_item(qty, None);
    }

    r.normalize_status().await.unwrap();

    assert!(r.client().inventory().iter().all(|row| row.status.is_some()));
}

#[tokio::test]
async fn smoke_test_leaves_row_count_unchanged() {
    let r = reconciler();
    r.repair_notifications().await.unwrap();
    r.client()
        .seed_notification("Existing", "Pre-existing row", "info", timestamp(1), false);

    let before = r.client().count_rows(NOTIFICATIONS).await.unwrap();
    let smoke = r.smoke_test().await.unwrap();
    let after = r.client().count_rows(NOTIFICATIONS).await.unwrap();

    assert!(smoke.assigned_id > 0);
    assert_eq!(before, after);
}

#[tokio::test]
async fn round_trip_restores_the_sampled_row() {
    let r = reconciler();
    r.client().seed_inventory_table();
    let id = r.client().seed_inventory_item(4, Some("active"));

    let trip = r.inventory_round_trip().await.unwrap().unwrap();
    assert_eq!(trip.item_id, id);
    assert_eq!(trip.bumped_quantity, 5);

    let rows = r.client().inventory();
    assert_eq!(rows[0].total_quantity, 4);
    assert_eq!(rows[0].status.as_deref(), Some("active"));
}

#[tokio::test]
async fn round_trip_skips_when_inventory_is_empty() {
    let r = reconciler();
    r.client().seed_inventory_table();

    assert!(r.inventory_round_trip().await.unwrap().is_none());
}

#[tokio::test]
async fn inventory_repair_requires_the_table() {
    let r = reconciler();

    let err = r.repair_inventory_columns().await.unwrap_err();
    assert!(matches!(err, RepairError::Precondition(_)));
}

#[tokio::test]
async fn failing_step_does_not_abort_the_run() {
    let r = reconciler();
    r.client().seed_inventory_table();
    r.client().seed_inventory_item(0, None);
    r.client().fail_on("insert_notification");

    let report = r.run(&ReconcilePlan::full()).await;

    assert_eq!(report.failures(), 1);
    assert!(matches!(
        report.outcome_of(StepKind::NotificationSmokeTest),
        Some(StepOutcome::Failed { .. })
    ));
    // Later steps still ran and succeeded.
    assert!(matches!(
        report.outcome_of(StepKind::NormalizeStatus),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert!(matches!(
        report.outcome_of(StepKind::VerifyTables),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert_eq!(report.steps.len(), ReconcilePlan::full().steps.len());
}

#[tokio::test]
async fn check_run_creates_missing_notifications_table() {
    let r = reconciler();

    let report = r.run(&ReconcilePlan::check()).await;

    assert!(report.is_clean());
    assert!(r.client().table_exists(NOTIFICATIONS).await.unwrap());
    assert!(matches!(
        report.outcome_of(StepKind::RepairNotifications),
        Some(StepOutcome::Succeeded { .. })
    ));
    // Inspection writes nothing else: no rows, no inventory table.
    assert_eq!(r.client().count_rows(NOTIFICATIONS).await.unwrap(), 0);
    assert!(!r.client().table_exists(INVENTORY_ITEMS).await.unwrap());
}

#[tokio::test]
async fn rebuild_keeps_rows_in_identity_order() {
    let r = reconciler();
    r.client().seed_legacy_notifications_table();
    for day in [2, 5, 9] {
        r.client().seed_notification(
            &format!("Event {day}"),
            "ordered",
            "info",
            timestamp(day),
            false,
        );
    }

    r.repair_notifications().await.unwrap();

    let rows = r.client().notifications();
    let titles: Vec<_> = rows.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Event 2", "Event 5", "Event 9"]);
    let ids: Vec<_> = rows.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn full_run_without_inventory_table_skips_inventory_steps() {
    let r = reconciler();

    let report = r.run(&ReconcilePlan::full()).await;

    assert!(report.is_clean());
    assert!(matches!(
        report.outcome_of(StepKind::RepairInventoryColumns),
        Some(StepOutcome::Skipped { .. })
    ));
    assert!(matches!(
        report.outcome_of(StepKind::NormalizeStatus),
        Some(StepOutcome::Skipped { .. })
    ));
    // Notifications side still repaired and smoke tested.
    assert!(matches!(
        report.outcome_of(StepKind::NotificationSmokeTest),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert_eq!(
        r.client().count_rows(NOTIFICATIONS).await.unwrap(),
        0
    );
    assert!(!r.client().table_exists(INVENTORY_ITEMS).await.unwrap());
}
