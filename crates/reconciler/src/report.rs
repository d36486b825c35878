//! Reconciliation plans and run reports.
//!
//! A plan is declarative data: an ordered list of steps. The runner executes
//! each step in its own scope and records the outcome; a failed step never
//! prevents later independent steps from running.

use serde::Serialize;

/// One step of a reconciliation plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// `SELECT 1` connectivity check.
    Ping,
    /// Ensure the notifications table exists with a healthy identity column,
    /// rebuilding it transactionally when the identity default is lost.
    RepairNotifications,
    /// Insert a throwaway notification, verify it got an id, delete it.
    NotificationSmokeTest,
    /// Add missing `status`/`updated_at` columns to inventory_items.
    RepairInventoryColumns,
    /// Bulk-correct inventory statuses against quantities.
    NormalizeStatus,
    /// Bump one inventory row's quantity, verify the write, revert it.
    InventoryRoundTrip,
    /// Log catalog metadata for both tables.
    DescribeTables,
    /// Row-count accessibility check on both tables.
    VerifyTables,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::RepairNotifications => "repair_notifications",
            Self::NotificationSmokeTest => "notification_smoke_test",
            Self::RepairInventoryColumns => "repair_inventory_columns",
            Self::NormalizeStatus => "normalize_status",
            Self::InventoryRoundTrip => "inventory_round_trip",
            Self::DescribeTables => "describe_tables",
            Self::VerifyTables => "verify_tables",
        }
    }
}

/// An ordered reconciliation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub steps: Vec<StepKind>,
}

impl ReconcilePlan {
    /// The comprehensive repair sequence: connectivity, notifications repair
    /// and smoke test, inventory column repair, status normalization, final
    /// verification.
    pub fn full() -> Self {
        Self {
            steps: vec![
                StepKind::Ping,
                StepKind::RepairNotifications,
                StepKind::NotificationSmokeTest,
                StepKind::RepairInventoryColumns,
                StepKind::NormalizeStatus,
                StepKind::VerifyTables,
            ],
        }
    }

    /// Connectivity and structure inspection. Creates the notifications
    /// table when it is absent, but performs no other writes.
    pub fn check() -> Self {
        Self {
            steps: vec![
                StepKind::Ping,
                StepKind::RepairNotifications,
                StepKind::DescribeTables,
                StepKind::VerifyTables,
            ],
        }
    }

    /// Notifications-only repair.
    pub fn notifications() -> Self {
        Self {
            steps: vec![
                StepKind::Ping,
                StepKind::RepairNotifications,
                StepKind::NotificationSmokeTest,
            ],
        }
    }

    /// Inventory-focused repair; also ensures the notifications table exists.
    pub fn inventory() -> Self {
        Self {
            steps: vec![
                StepKind::Ping,
                StepKind::RepairInventoryColumns,
                StepKind::NormalizeStatus,
                StepKind::RepairNotifications,
            ],
        }
    }

    /// Disposable write tests only.
    pub fn smoke() -> Self {
        Self {
            steps: vec![
                StepKind::Ping,
                StepKind::NotificationSmokeTest,
                StepKind::InventoryRoundTrip,
            ],
        }
    }
}

/// How one step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { detail: String },
    Skipped { reason: String },
    Failed { error: String },
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: StepKind,
    pub outcome: StepOutcome,
}

/// Everything a run did, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn record(&mut self, step: StepKind, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
            .count()
    }

    /// Whether every step ran without a recorded failure.
    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }

    pub fn outcome_of(&self, step: StepKind) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let skipped = self
            .steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped { .. }))
            .count();
        format!(
            "{} steps, {} failed, {} skipped",
            self.steps.len(),
            self.failures(),
            skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_plan_repairs_before_verifying() {
        let plan = ReconcilePlan::full();
        let repair = plan
            .steps
            .iter()
            .position(|s| *s == StepKind::RepairNotifications)
            .unwrap();
        let smoke = plan
            .steps
            .iter()
            .position(|s| *s == StepKind::NotificationSmokeTest)
            .unwrap();
        assert!(repair < smoke);
        assert_eq!(plan.steps.first(), Some(&StepKind::Ping));
    }

    #[test]
    fn check_plan_ensures_notifications_before_describing() {
        let plan = ReconcilePlan::check();
        let repair = plan
            .steps
            .iter()
            .position(|s| *s == StepKind::RepairNotifications)
            .unwrap();
        let describe = plan
            .steps
            .iter()
            .position(|s| *s == StepKind::DescribeTables)
            .unwrap();
        assert!(repair < describe);
        // Inspection only: no status rewrites, no disposable test writes.
        assert!(!plan.steps.contains(&StepKind::NormalizeStatus));
        assert!(!plan.steps.contains(&StepKind::NotificationSmokeTest));
    }

    #[test]
    fn report_counts_failures() {
        let mut report = RunReport::default();
        report.record(
            StepKind::Ping,
            StepOutcome::Succeeded {
                detail: "ok".into(),
            },
        );
        report.record(
            StepKind::NormalizeStatus,
            StepOutcome::Failed {
                error: "boom".into(),
            },
        );
        assert_eq!(report.failures(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.summary(), "2 steps, 1 failed, 0 skipped");
    }

    #[test]
    fn report_serializes_step_names_snake_case() {
        let mut report = RunReport::default();
        report.record(
            StepKind::RepairNotifications,
            StepOutcome::Skipped {
                reason: "n/a".into(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][0]["step"], "repair_notifications");
        assert_eq!(json["steps"][0]["outcome"]["result"], "skipped");
    }
}
