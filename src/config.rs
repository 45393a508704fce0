use std::path::{Path, PathBuf};
use std::str::FromStr;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::SqlTideError;
use crate::planner::DriftPolicy;
use crate::targets::DatabaseTarget;

const ENV_PREFIX: &str = "SQLTIDE_";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const DEFAULT_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            level: Self::DEFAULT_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.level.clone();
        self.level = self.level.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.level.as_str()) {
            eprintln!(
                "Config error: log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::DEFAULT_LEVEL
            );
            self.level = Self::DEFAULT_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScriptsConfig {
    /// Directory holding one subdirectory of .sql scripts per catalog
    pub root: PathBuf,
    /// Treat a missing per-catalog directory as an error instead of an
    /// empty script set
    pub require_dir: bool,
}

impl ScriptsConfig {
    fn default() -> Self {
        ScriptsConfig {
            root: PathBuf::from("scripts"),
            require_dir: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StorageConfig {
    /// Directory the embedded engine keeps catalog files under
    pub root: PathBuf,
}

impl StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("data"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolicyConfig {
    pub drift: String,
}

impl PolicyConfig {
    const DEFAULT_DRIFT: &str = "fail";

    pub fn drift_policy(&self) -> DriftPolicy {
        // ensure_valid already clamped the string, so this cannot fail
        DriftPolicy::from_str(&self.drift).unwrap_or(DriftPolicy::Fail)
    }

    fn default() -> Self {
        PolicyConfig {
            drift: Self::DEFAULT_DRIFT.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.drift.clone();
        self.drift = self.drift.trim().to_ascii_lowercase();
        if DriftPolicy::from_str(&self.drift).is_err() {
            eprintln!(
                "Config error: drift policy of '{}' is invalid - using default of '{}'",
                str_original,
                Self::DEFAULT_DRIFT
            );
            self.drift = Self::DEFAULT_DRIFT.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub databases: Vec<DatabaseTarget>,
    pub scripts: ScriptsConfig,
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file merged with SQLTIDE_-prefixed
    /// environment variables (nested keys split on "__") over defaults.
    /// A missing file is fine - env vars or defaults carry the run.
    pub fn load(path: &Path) -> Result<Self, SqlTideError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Config = figment.extract().map_err(|err| {
            SqlTideError::Configuration(format!(
                "could not load config from {}: {}",
                path.display(),
                err
            ))
        })?;

        config.ensure_valid();

        Ok(config)
    }

    pub fn default() -> Self {
        Config {
            databases: Vec::new(),
            scripts: ScriptsConfig::default(),
            storage: StorageConfig::default(),
            policy: PolicyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.policy.ensure_valid();
    }
}
