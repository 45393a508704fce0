use std::fs;
use std::path::PathBuf;

use crate::error::SqlTideError;

/// One migration script, loaded from disk. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    id: String,
    sort_key: u64,
    sql: String,
}

impl MigrationScript {
    pub fn new(id: impl Into<String>, sort_key: u64, sql: impl Into<String>) -> Self {
        MigrationScript {
            id: id.into(),
            sort_key,
            sql: sql.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sort_key(&self) -> u64 {
        self.sort_key
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Filesystem script source. Scripts for a catalog live in
/// `<root>/<catalog>/*.sql` and are ordered by the leading decimal prefix
/// of the file name (001_create.sql, 002_widen.sql, ...).
pub struct ScriptSource {
    root: PathBuf,
    require_dir: bool,
}

impl ScriptSource {
    pub fn new(root: impl Into<PathBuf>, require_dir: bool) -> Self {
        ScriptSource {
            root: root.into(),
            require_dir,
        }
    }

    /// Discover the ordered script sequence for one catalog. Deterministic:
    /// unchanged input yields the same ordered result regardless of the
    /// order the directory happens to be read in.
    pub fn discover(&self, catalog: &str) -> Result<Vec<MigrationScript>, SqlTideError> {
        let dir = self.root.join(catalog);

        if !dir.is_dir() {
            if self.require_dir {
                return Err(SqlTideError::Discovery(format!(
                    "script directory '{}' does not exist",
                    dir.display()
                )));
            }
            return Ok(Vec::new());
        }

        let mut scripts: Vec<MigrationScript> = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let is_sql = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
            if !is_sql {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| {
                    SqlTideError::Discovery(format!(
                        "script '{}' has a non-UTF-8 name",
                        path.display()
                    ))
                })?;

            let sort_key = sort_key_of(stem).ok_or_else(|| {
                SqlTideError::Discovery(format!(
                    "script '{}' has no numeric version prefix",
                    path.display()
                ))
            })?;

            let sql = fs::read_to_string(&path)?;
            scripts.push(MigrationScript::new(stem, sort_key, sql));
        }

        scripts.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.id().cmp(b.id()))
        });

        // Equal sort keys would make the apply order ambiguous
        for pair in scripts.windows(2) {
            if pair[0].sort_key() == pair[1].sort_key() {
                return Err(SqlTideError::Discovery(format!(
                    "scripts '{}' and '{}' in '{}' share sort key {}",
                    pair[0].id(),
                    pair[1].id(),
                    dir.display(),
                    pair[0].sort_key()
                )));
            }
        }

        Ok(scripts)
    }
}

/// Leading decimal digit run of a script name, or None when there isn't one
/// (or it overflows u64).
fn sort_key_of(stem: &str) -> Option<u64> {
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_script(dir: &std::path::Path, name: &str, sql: &str) {
        fs::write(dir.join(name), sql).unwrap();
    }

    #[test]
    fn test_sort_key_of() {
        assert_eq!(sort_key_of("001_create"), Some(1));
        assert_eq!(sort_key_of("0010_widen"), Some(10));
        assert_eq!(sort_key_of("42"), Some(42));
        assert_eq!(sort_key_of("create_users"), None);
        assert_eq!(sort_key_of(""), None);
        // A digit run longer than u64 is unorderable, not a panic
        assert_eq!(sort_key_of("99999999999999999999999999_x"), None);
    }

    #[test]
    fn test_discover_orders_by_prefix() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("billing");
        fs::create_dir(&dir).unwrap();
        write_script(&dir, "003_x.sql", "SELECT 3;");
        write_script(&dir, "001_a.sql", "SELECT 1;");
        write_script(&dir, "002_b.sql", "SELECT 2;");

        let source = ScriptSource::new(tmp.path(), false);
        let scripts = source.discover("billing").unwrap();

        let ids: Vec<&str> = scripts.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["001_a", "002_b", "003_x"]);
        assert_eq!(scripts[0].sql(), "SELECT 1;");
    }

    #[test]
    fn test_discover_ignores_non_sql_files() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("billing");
        fs::create_dir(&dir).unwrap();
        write_script(&dir, "001_a.sql", "SELECT 1;");
        write_script(&dir, "notes.md", "not a script");

        let source = ScriptSource::new(tmp.path(), false);
        let scripts = source.discover("billing").unwrap();
        assert_eq!(scripts.len(), 1);
    }

    #[test]
    fn test_discover_rejects_duplicate_sort_keys() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("billing");
        fs::create_dir(&dir).unwrap();
        write_script(&dir, "001_a.sql", "SELECT 1;");
        write_script(&dir, "001_b.sql", "SELECT 1;");

        let source = ScriptSource::new(tmp.path(), false);
        let err = source.discover("billing").unwrap_err();
        assert!(matches!(err, SqlTideError::Discovery(_)));
    }

    #[test]
    fn test_discover_rejects_unprefixed_names() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("billing");
        fs::create_dir(&dir).unwrap();
        write_script(&dir, "create_users.sql", "SELECT 1;");

        let source = ScriptSource::new(tmp.path(), false);
        let err = source.discover("billing").unwrap_err();
        assert!(matches!(err, SqlTideError::Discovery(_)));
    }

    #[test]
    fn test_discover_missing_dir_is_empty_by_default() {
        let tmp = tempdir().unwrap();
        let source = ScriptSource::new(tmp.path(), false);
        let scripts = source.discover("billing").unwrap();
        assert!(scripts.is_empty());
    }

    #[test]
    fn test_discover_missing_dir_errors_when_required() {
        let tmp = tempdir().unwrap();
        let source = ScriptSource::new(tmp.path(), true);
        let err = source.discover("billing").unwrap_err();
        assert!(matches!(err, SqlTideError::Discovery(_)));
    }

    #[test]
    fn test_discover_is_deterministic() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("billing");
        fs::create_dir(&dir).unwrap();
        for i in 1..=9 {
            write_script(&dir, &format!("00{i}_s.sql"), "SELECT 1;");
        }

        let source = ScriptSource::new(tmp.path(), false);
        let first = source.discover("billing").unwrap();
        let second = source.discover("billing").unwrap();
        assert_eq!(first, second);
    }
}
