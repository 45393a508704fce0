use chrono::Utc;
use log::info;

use crate::database::Database;
use crate::error::SqlTideError;
use crate::hash::Hash;
use crate::journal::{Journal, JournalEntry};
use crate::planner::{DriftPolicy, UpgradePlan};
use crate::scripts::MigrationScript;

/// Result of one run against one target. Success means every pending script
/// committed; on failure, `applied` holds the scripts that committed before
/// the failing one.
#[derive(Debug, Default)]
pub struct UpgradeOutcome {
    pub applied: Vec<String>,
    pub failure: Option<UpgradeFailure>,
}

#[derive(Debug)]
pub struct UpgradeFailure {
    pub script: String,
    pub error: SqlTideError,
}

impl UpgradeOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applied/pending listing for the read-only `status` command.
#[derive(Debug)]
pub struct CatalogStatus {
    pub applied: Vec<JournalEntry>,
    pub pending: Vec<String>,
    pub drifted: Vec<String>,
}

pub struct Upgrader;

impl Upgrader {
    /// Apply every pending script to an open, locked database. The caller
    /// has already ensured the catalog exists.
    ///
    /// Per script: one transaction runs the script's SQL and records the
    /// journal row, then commits. The first failure rolls that transaction
    /// back, stops the run, and is carried in the outcome; scripts already
    /// committed stay committed.
    pub fn run(
        db: &mut Database,
        discovered: Vec<MigrationScript>,
        policy: DriftPolicy,
    ) -> Result<UpgradeOutcome, SqlTideError> {
        Journal::ensure(db.conn())?;
        let applied = Journal::applied_entries(db.conn())?;
        let plan = UpgradePlan::prepare(discovered, &applied, policy)?;

        let mut outcome = UpgradeOutcome::default();

        if plan.pending().is_empty() {
            info!("nothing pending, {} script(s) already applied", applied.len());
            return Ok(outcome);
        }

        for script in plan.into_pending() {
            match Self::apply_script(db, &script) {
                Ok(()) => {
                    info!("applied '{}'", script.id());
                    outcome.applied.push(script.id().to_owned());
                }
                Err(error) => {
                    outcome.failure = Some(UpgradeFailure {
                        script: script.id().to_owned(),
                        error,
                    });
                    break;
                }
            }
        }

        Ok(outcome)
    }

    fn apply_script(db: &mut Database, script: &MigrationScript) -> Result<(), SqlTideError> {
        let checksum = Hash::checksum(script.sql());
        let applied_at = Utc::now().timestamp();

        let tx = db.conn_mut().transaction()?;
        tx.execute_batch(script.sql())
            .map_err(|e| SqlTideError::Execution {
                script: script.id().to_owned(),
                source: e,
            })?;
        Journal::record_applied(&tx, script.id(), &checksum, applied_at)?;
        tx.commit()?;
        Ok(())
    }

    /// Read-only view of a catalog: what has been applied, what would run.
    /// Never creates the journal table; drift is reported, not fatal.
    pub fn status(
        db: &Database,
        discovered: Vec<MigrationScript>,
    ) -> Result<CatalogStatus, SqlTideError> {
        let applied = if Journal::exists(db.conn())? {
            Journal::applied_entries(db.conn())?
        } else {
            Vec::new()
        };

        let plan = UpgradePlan::prepare(discovered, &applied, DriftPolicy::Warn)?;

        Ok(CatalogStatus {
            pending: plan.pending().iter().map(|s| s.id().to_owned()).collect(),
            drifted: plan.drifted().to_vec(),
            applied,
        })
    }
}
