use rusqlite::{params, Connection};

use crate::error::SqlTideError;

const JOURNAL_TABLE: &str = "migration_journal";

const CREATE_JOURNAL_SQL: &str = "
CREATE TABLE IF NOT EXISTS migration_journal (
    script_id  TEXT PRIMARY KEY,
    checksum   TEXT NOT NULL,
    applied_at INTEGER NOT NULL
)";

/// One row of the journal: a script that was successfully applied to this
/// database, when, and the checksum of its text at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub script_id: String,
    pub checksum: String,
    pub applied_at: i64,
}

/// The applied-script record inside the target database. Append-only: a
/// recorded script identifier is never reapplied.
///
/// Every function takes `&Connection` so the executor can hand in the open
/// script transaction - a script's effects and its journal row commit
/// together or not at all.
pub struct Journal;

impl Journal {
    /// Create the journal table if absent. Idempotent.
    pub fn ensure(conn: &Connection) -> Result<(), SqlTideError> {
        conn.execute_batch(CREATE_JOURNAL_SQL)
            .map_err(|e| SqlTideError::Journal(format!("could not create journal table: {e}")))
    }

    pub fn exists(conn: &Connection) -> Result<bool, SqlTideError> {
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [JOURNAL_TABLE],
                |row| row.get(0),
            )
            .map_err(SqlTideError::Database)?;
        Ok(count > 0)
    }

    /// All recorded entries, in application order.
    pub fn applied_entries(conn: &Connection) -> Result<Vec<JournalEntry>, SqlTideError> {
        let mut stmt = conn
            .prepare("SELECT script_id, checksum, applied_at FROM migration_journal ORDER BY rowid")
            .map_err(|e| SqlTideError::Journal(format!("journal table unusable: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(JournalEntry {
                    script_id: row.get(0)?,
                    checksum: row.get(1)?,
                    applied_at: row.get(2)?,
                })
            })
            .map_err(|e| SqlTideError::Journal(format!("journal table unusable: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(
                row.map_err(|e| SqlTideError::Journal(format!("journal row unreadable: {e}")))?,
            );
        }

        Ok(entries)
    }

    /// Append one entry. Called on the same transaction that executed the
    /// script.
    pub fn record_applied(
        conn: &Connection,
        script_id: &str,
        checksum: &str,
        applied_at: i64,
    ) -> Result<(), SqlTideError> {
        conn.execute(
            "INSERT INTO migration_journal (script_id, checksum, applied_at) VALUES (?, ?, ?)",
            params![script_id, checksum, applied_at],
        )
        .map_err(|e| {
            SqlTideError::Journal(format!("could not record script '{script_id}': {e}"))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let conn = mem_conn();
        Journal::ensure(&conn).unwrap();
        Journal::ensure(&conn).unwrap();
        assert!(Journal::exists(&conn).unwrap());
    }

    #[test]
    fn test_exists_false_on_fresh_database() {
        let conn = mem_conn();
        assert!(!Journal::exists(&conn).unwrap());
    }

    #[test]
    fn test_record_and_read_back_in_application_order() {
        let conn = mem_conn();
        Journal::ensure(&conn).unwrap();

        Journal::record_applied(&conn, "002_b", "cafe", 1700000100).unwrap();
        Journal::record_applied(&conn, "001_a", "beef", 1700000100).unwrap();

        let entries = Journal::applied_entries(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        // Application order, not identifier order
        assert_eq!(entries[0].script_id, "002_b");
        assert_eq!(entries[1].script_id, "001_a");
        assert_eq!(entries[0].checksum, "cafe");
        assert_eq!(entries[0].applied_at, 1700000100);
    }

    #[test]
    fn test_record_rejects_duplicate_identifier() {
        let conn = mem_conn();
        Journal::ensure(&conn).unwrap();

        Journal::record_applied(&conn, "001_a", "beef", 1700000100).unwrap();
        let err = Journal::record_applied(&conn, "001_a", "beef", 1700000200).unwrap_err();
        assert!(matches!(err, SqlTideError::Journal(_)));
    }

    #[test]
    fn test_record_within_rolled_back_transaction_leaves_no_row() {
        let mut conn = mem_conn();
        Journal::ensure(&conn).unwrap();

        let tx = conn.transaction().unwrap();
        Journal::record_applied(&tx, "001_a", "beef", 1700000100).unwrap();
        drop(tx); // rollback

        let entries = Journal::applied_entries(&conn).unwrap();
        assert!(entries.is_empty());
    }
}
