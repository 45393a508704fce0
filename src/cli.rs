use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info};

use crate::config::Config;
use crate::database::Database;
use crate::error::SqlTideError;
use crate::reports::{Reports, TargetRun};
use crate::scripts::ScriptSource;
use crate::targets::DatabaseTarget;
use crate::upgrader::{CatalogStatus, UpgradeOutcome, Upgrader};

#[derive(Parser)]
#[command(
    name = "sqltide",
    version,
    about = "sqltide: configuration-driven schema migration runner"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c', default_value = "sqltide.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring every configured database to the latest schema (default if no
    /// command specified)
    Migrate {
        /// Only migrate the named catalog
        #[arg(long = "database", short = 'd')]
        database: Option<String>,
    },

    /// Show applied and pending scripts without applying anything
    Status {
        /// Only show the named catalog
        #[arg(long = "database", short = 'd')]
        database: Option<String>,
    },
}

impl Cli {
    pub fn handle_command_line() -> Result<(), SqlTideError> {
        let args = Cli::parse();
        let config = Config::load(&args.config)?;

        // Keep the handle alive for the rest of the process
        let _logger = flexi_logger::Logger::try_with_str(&config.logging.level)
            .and_then(|logger| logger.start())
            .map_err(|e| SqlTideError::Configuration(format!("could not start logger: {e}")))?;

        // Default to Migrate if no command specified
        match args.command.unwrap_or(Command::Migrate { database: None }) {
            Command::Migrate { database } => Self::run_migrate(&config, database.as_deref()),
            Command::Status { database } => Self::run_status(&config, database.as_deref()),
        }
    }

    fn run_migrate(config: &Config, only: Option<&str>) -> Result<(), SqlTideError> {
        let runs = Self::migrate_targets(config, only)?;
        if runs.is_empty() {
            return Ok(());
        }

        Reports::print_migrate_summary(&runs);

        let failed = runs.iter().filter(|run| !run.succeeded()).count();
        if failed > 0 {
            return Err(SqlTideError::MigrationFailed {
                failed,
                total: runs.len(),
            });
        }
        Ok(())
    }

    /// Run every selected target, each in isolation: one target's failure
    /// never stops the others.
    fn migrate_targets(
        config: &Config,
        only: Option<&str>,
    ) -> Result<Vec<TargetRun>, SqlTideError> {
        let targets = Self::selected_targets(config, only)?;
        if targets.is_empty() {
            info!("no databases configured, nothing to do");
            return Ok(Vec::new());
        }

        let mut runs = Vec::with_capacity(targets.len());
        for target in targets {
            let result = Self::migrate_target(config, target);
            match &result {
                Ok(outcome) if outcome.is_success() => {
                    info!(
                        "migrated '{}' ({} script(s) applied)",
                        target.catalog,
                        outcome.applied.len()
                    );
                }
                Ok(outcome) => {
                    if let Some(failure) = &outcome.failure {
                        error!(
                            "migration of '{}' failed at '{}': {}",
                            target.catalog, failure.script, failure.error
                        );
                    }
                }
                Err(err) => {
                    error!("migration of '{}' failed: {}", target.catalog, err);
                }
            }
            runs.push(TargetRun {
                catalog: target.catalog.clone(),
                address: Self::address_of(target),
                result,
            });
        }

        Ok(runs)
    }

    fn migrate_target(
        config: &Config,
        target: &DatabaseTarget,
    ) -> Result<UpgradeOutcome, SqlTideError> {
        let spec = target.resolve()?;

        let source = ScriptSource::new(&config.scripts.root, config.scripts.require_dir);
        let discovered = source.discover(spec.catalog())?;

        Database::create_if_absent(&spec, &config.storage.root)?;
        let mut db = Database::connect(&spec, &config.storage.root)?;
        db.lock_exclusive()?;

        Upgrader::run(&mut db, discovered, config.policy.drift_policy())
    }

    fn run_status(config: &Config, only: Option<&str>) -> Result<(), SqlTideError> {
        let targets = Self::selected_targets(config, only)?;
        if targets.is_empty() {
            info!("no databases configured");
            return Ok(());
        }

        for target in targets {
            let spec = target.resolve()?;
            let source = ScriptSource::new(&config.scripts.root, config.scripts.require_dir);
            let discovered = source.discover(spec.catalog())?;

            // A catalog that was never created has everything pending;
            // connecting would create the file as a side effect
            let status = if spec.catalog_path(&config.storage.root).is_file() {
                let db = Database::connect(&spec, &config.storage.root)?;
                Upgrader::status(&db, discovered)?
            } else {
                CatalogStatus {
                    applied: Vec::new(),
                    pending: discovered.iter().map(|s| s.id().to_owned()).collect(),
                    drifted: Vec::new(),
                }
            };

            Reports::print_status(spec.catalog(), &spec.address(), &status);
        }

        Ok(())
    }

    fn selected_targets<'a>(
        config: &'a Config,
        only: Option<&str>,
    ) -> Result<Vec<&'a DatabaseTarget>, SqlTideError> {
        match only {
            None => Ok(config.databases.iter().collect()),
            Some(name) => {
                let matched: Vec<&DatabaseTarget> = config
                    .databases
                    .iter()
                    .filter(|t| t.catalog == name)
                    .collect();
                if matched.is_empty() {
                    return Err(SqlTideError::Configuration(format!(
                        "database '{name}' is not configured"
                    )));
                }
                Ok(matched)
            }
        }
    }

    fn address_of(target: &DatabaseTarget) -> String {
        match target.resolve() {
            Ok(spec) => spec.address(),
            Err(_) => target.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoggingConfig, PolicyConfig, ScriptsConfig, StorageConfig};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cli_parsing_no_command_defaults_to_migrate() {
        let result = Cli::try_parse_from(["sqltide"]);
        assert!(result.is_ok(), "Should accept no command");

        let cli = result.unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("sqltide.toml"));
        assert!(matches!(
            cli.command.unwrap_or(Command::Migrate { database: None }),
            Command::Migrate { database: None }
        ));
    }

    #[test]
    fn test_cli_parsing_migrate_with_database_filter() {
        let cli = Cli::try_parse_from(["sqltide", "migrate", "--database", "billing"]).unwrap();
        match cli.command {
            Some(Command::Migrate { database }) => assert_eq!(database.as_deref(), Some("billing")),
            _ => panic!("expected migrate command"),
        }
    }

    #[test]
    fn test_cli_parsing_status_and_config_path() {
        let cli = Cli::try_parse_from(["sqltide", "status", "--config", "deploy.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("deploy.toml"));
        assert!(matches!(cli.command, Some(Command::Status { .. })));
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["sqltide", "nonexistent-command"]);
        assert!(result.is_err(), "Should reject unknown commands");

        let result = Cli::try_parse_from(["sqltide", "migrate", "--invalid-flag"]);
        assert!(result.is_err(), "Should reject unknown flags on migrate");
    }

    fn target(catalog: &str) -> DatabaseTarget {
        DatabaseTarget {
            server: "db1".to_string(),
            port: 0,
            catalog: catalog.to_string(),
            username: String::new(),
            password: String::new(),
        }
    }

    fn config_in(root: &std::path::Path, databases: Vec<DatabaseTarget>) -> Config {
        Config {
            databases,
            scripts: ScriptsConfig {
                root: root.join("scripts"),
                require_dir: false,
            },
            storage: StorageConfig {
                root: root.join("data"),
            },
            policy: PolicyConfig {
                drift: "fail".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_one_failing_target_does_not_affect_the_others() {
        let tmp = tempdir().unwrap();
        let bad_dir = tmp.path().join("scripts").join("bad");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("001_a.sql"), "CREATE TABLE t (id INTEGER);").unwrap();
        fs::write(bad_dir.join("002_b.sql"), "THIS IS NOT SQL;").unwrap();
        // "good" has no script directory at all: an empty, successful run

        let config = config_in(tmp.path(), vec![target("bad"), target("good")]);
        let runs = Cli::migrate_targets(&config, None).unwrap();

        assert_eq!(runs.len(), 2);
        assert!(!runs[0].succeeded());
        assert!(runs[1].succeeded());

        // The failing neighbor did not keep "good" from getting its journal
        assert!(tmp.path().join("data").join("db1").join("good.db").is_file());

        // And run_migrate surfaces the aggregate failure for the exit code
        let err = Cli::run_migrate(&config, None).unwrap_err();
        assert!(matches!(
            err,
            SqlTideError::MigrationFailed { failed: 1, total: 2 }
        ));
    }

    #[test]
    fn test_unknown_database_filter_is_a_configuration_error() {
        let tmp = tempdir().unwrap();
        let config = config_in(tmp.path(), vec![target("billing")]);
        let err = Cli::migrate_targets(&config, Some("nope")).unwrap_err();
        assert!(matches!(err, SqlTideError::Configuration(_)));
    }

    #[test]
    fn test_no_databases_configured_is_a_clean_noop() {
        let tmp = tempdir().unwrap();
        let config = config_in(tmp.path(), Vec::new());
        assert!(Cli::run_migrate(&config, None).is_ok());
    }
}
