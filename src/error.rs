use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlTideError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error), // Converts io::Error into SqlTideError automatically

    #[error("Database error: {0}")]
    Database(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Script discovery error: {0}")]
    Discovery(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Drift detected in applied script '{script}': journal has {recorded}, on disk is {actual}")]
    Drift {
        script: String,
        recorded: String,
        actual: String,
    },

    #[error("Script '{script}' failed: {source}")]
    Execution {
        script: String,
        #[source]
        source: RusqliteError,
    },

    #[error("{failed} of {total} database(s) failed to migrate")]
    MigrationFailed { failed: usize, total: usize },
}
