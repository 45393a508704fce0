use std::collections::HashMap;
use std::str::FromStr;

use log::warn;

use crate::error::SqlTideError;
use crate::hash::Hash;
use crate::journal::JournalEntry;
use crate::scripts::MigrationScript;

/// What to do when an already-applied script's text no longer matches its
/// recorded checksum. Fail-fast is the safe default; `warn` logs and keeps
/// going for deployments that knowingly rewrite history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPolicy {
    Fail,
    Warn,
}

impl FromStr for DriftPolicy {
    type Err = SqlTideError;

    fn from_str(s: &str) -> Result<Self, SqlTideError> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(DriftPolicy::Fail),
            "warn" => Ok(DriftPolicy::Warn),
            _ => Err(SqlTideError::Configuration(format!(
                "invalid drift policy '{s}' (expected 'fail' or 'warn')"
            ))),
        }
    }
}

/// The ordered subset of discovered scripts that still has to run.
#[derive(Debug)]
pub struct UpgradePlan {
    pending: Vec<MigrationScript>,
    drifted: Vec<String>,
}

impl UpgradePlan {
    /// Compute the pending list: discovered scripts whose identifier is not
    /// in the journal, preserving discovery order. Scripts that ARE in the
    /// journal are checked for drift against their recorded checksum.
    pub fn prepare(
        discovered: Vec<MigrationScript>,
        applied: &[JournalEntry],
        policy: DriftPolicy,
    ) -> Result<UpgradePlan, SqlTideError> {
        let recorded: HashMap<&str, &str> = applied
            .iter()
            .map(|e| (e.script_id.as_str(), e.checksum.as_str()))
            .collect();

        let mut pending = Vec::new();
        let mut drifted = Vec::new();

        for script in discovered {
            match recorded.get(script.id()) {
                None => pending.push(script),
                Some(recorded_checksum) => {
                    let actual = Hash::checksum(script.sql());
                    if actual != *recorded_checksum {
                        if policy == DriftPolicy::Fail {
                            return Err(SqlTideError::Drift {
                                script: script.id().to_owned(),
                                recorded: Hash::short(recorded_checksum).to_owned(),
                                actual: Hash::short(&actual).to_owned(),
                            });
                        }
                        warn!(
                            "script '{}' changed after it was applied (journal {}, disk {})",
                            script.id(),
                            Hash::short(recorded_checksum),
                            Hash::short(&actual)
                        );
                        drifted.push(script.id().to_owned());
                    }
                }
            }
        }

        Ok(UpgradePlan { pending, drifted })
    }

    pub fn pending(&self) -> &[MigrationScript] {
        &self.pending
    }

    pub fn into_pending(self) -> Vec<MigrationScript> {
        self.pending
    }

    pub fn drifted(&self) -> &[String] {
        &self.drifted
    }
}
