use chrono::DateTime;

use crate::error::SqlTideError;
use crate::upgrader::{CatalogStatus, UpgradeOutcome};

/// One target's run, as fed to the summary. `result` is Err when the run
/// never got to execute (bad descriptor, unreadable scripts, drift, ...);
/// a run that started but failed mid-script is Ok with a failure inside.
#[derive(Debug)]
pub struct TargetRun {
    pub catalog: String,
    pub address: String,
    pub result: Result<UpgradeOutcome, SqlTideError>,
}

impl TargetRun {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_success())
    }
}

pub struct Reports {
    // No fields
}

impl Reports {
    /// Per-target summary after `migrate`. Rendering only - the outcome
    /// values drive the exit code elsewhere.
    pub fn print_migrate_summary(runs: &[TargetRun]) {
        println!();
        println!("Migration summary:");

        for run in runs {
            match &run.result {
                Ok(outcome) => {
                    if let Some(failure) = &outcome.failure {
                        println!(
                            "  {} @ {}: FAILED at '{}': {}",
                            run.catalog, run.address, failure.script, failure.error
                        );
                        if !outcome.applied.is_empty() {
                            println!(
                                "      applied before failure: {}",
                                outcome.applied.join(", ")
                            );
                        }
                    } else if outcome.applied.is_empty() {
                        println!("  {} @ {}: ok (up to date)", run.catalog, run.address);
                    } else {
                        println!(
                            "  {} @ {}: ok ({} applied: {})",
                            run.catalog,
                            run.address,
                            outcome.applied.len(),
                            outcome.applied.join(", ")
                        );
                    }
                }
                Err(err) => {
                    println!("  {} @ {}: FAILED: {}", run.catalog, run.address, err);
                }
            }
        }
    }

    pub fn print_status(catalog: &str, address: &str, status: &CatalogStatus) {
        println!();
        println!("{catalog} @ {address}");

        if status.applied.is_empty() {
            println!("  applied: none");
        } else {
            println!("  applied:");
            for entry in &status.applied {
                println!(
                    "    {}  {}",
                    entry.script_id,
                    format_timestamp(entry.applied_at)
                );
            }
        }

        if status.pending.is_empty() {
            println!("  pending: none");
        } else {
            println!("  pending: {}", status.pending.join(", "));
        }

        for script in &status.drifted {
            println!("  drifted: {script} (changed after it was applied)");
        }
    }
}

fn format_timestamp(unix_secs: i64) -> String {
    DateTime::from_timestamp(unix_secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
