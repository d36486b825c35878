//! One-shot schema repair for the inventory application's database.
//! Thin command surface over [`stockmend_reconciler`].
//!
//! Exit code 0 means the top-level sequence ran to completion, even when
//! individual steps failed and were logged; exit code 1 is reserved for
//! failures that escape the top-level handler.

use clap::{Parser, Subcommand};

use stockmend_core::Config;
use stockmend_reconciler::{PostgresClient, ReconcilePlan, Reconciler};

#[derive(Parser)]
#[command(name = "stockmend", about = "Repair and verify the inventory database schema")]
#[command(version)]
struct Cli {
    /// Print the run report as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Copy, Clone, Subcommand)]
enum Command {
    /// Connectivity check and table structure inspection
    Check,

    /// Repair the notifications table, rebuilding it if the identity column
    /// lost its default
    FixNotifications,

    /// Add missing inventory columns and normalize statuses
    FixInventory,

    /// Run the comprehensive repair sequence (the default)
    FixAll,

    /// Disposable write tests: notification insert/delete, inventory
    /// update round trip
    SmokeTest,
}

impl Command {
    fn plan(&self) -> ReconcilePlan {
        match self {
            Self::Check => ReconcilePlan::check(),
            Self::FixNotifications => ReconcilePlan::notifications(),
            Self::FixInventory => ReconcilePlan::inventory(),
            Self::FixAll => ReconcilePlan::full(),
            Self::SmokeTest => ReconcilePlan::smoke(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    stockmend_observability::init();

    // Missing configuration is a precondition failure for the whole run:
    // report it and end without ever opening a connection.
    let Some(config) = proceed_or_stop(Config::from_env(), "configuration") else {
        return Ok(());
    };

    let connected = PostgresClient::connect(config.database_url()).await;
    let Some(client) = proceed_or_stop(connected, "could not reach the database") else {
        return Ok(());
    };

    let plan = cli.command.unwrap_or(Command::FixAll).plan();
    let reconciler = Reconciler::new(client);
    let report = reconciler.run(&plan).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Precondition failures end the run gracefully: logged, never propagated,
/// so the process still exits 0.
fn proceed_or_stop<T>(result: Result<T, impl std::fmt::Display>, context: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!("{context}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockmend_core::RepairError;
    use stockmend_reconciler::StepKind;

    #[test]
    fn fix_all_runs_the_full_sequence() {
        let plan = Command::FixAll.plan();
        assert_eq!(plan, ReconcilePlan::full());
        assert!(plan.steps.contains(&StepKind::NormalizeStatus));
    }

    #[test]
    fn check_never_normalizes() {
        let plan = Command::Check.plan();
        assert!(!plan.steps.contains(&StepKind::NormalizeStatus));
        assert!(plan.steps.contains(&StepKind::DescribeTables));
    }

    #[test]
    fn missing_configuration_stops_the_run_without_an_error() {
        let result: Result<Config, RepairError> =
            Err(RepairError::missing_configuration("DATABASE_URL is not set"));
        assert!(proceed_or_stop(result, "configuration").is_none());
    }

    #[test]
    fn usable_configuration_proceeds() {
        let config = Config::from_database_url(Some("postgres://u:p@host/db".to_string()));
        assert!(proceed_or_stop(config, "configuration").is_some());
    }

    #[test]
    fn cli_parses_subcommands() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
