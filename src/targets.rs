use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SqlTideError;

/// Standard port of the server engine, substituted when a target leaves the
/// port at the 0 sentinel.
const DEFAULT_PORT: u16 = 1433;

/// One database to be brought to the latest schema version, as configured.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseTarget {
    pub server: String,
    #[serde(default)]
    pub port: u16,
    pub catalog: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Resolved connection descriptor: validated host and catalog, concrete
/// port, credentials, and the server-certificate trust policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    host: String,
    port: u16,
    catalog: String,
    username: String,
    password: String,
    trust_server_cert: bool,
}

impl DatabaseTarget {
    /// Produce the connection descriptor for this target. Pure - no side
    /// effects. Host and catalog must be non-empty after trimming.
    pub fn resolve(&self) -> Result<ConnectionSpec, SqlTideError> {
        let host = self.server.trim();
        if host.is_empty() {
            return Err(SqlTideError::Configuration(
                "database target has an empty server".to_string(),
            ));
        }

        let catalog = self.catalog.trim();
        if catalog.is_empty() {
            return Err(SqlTideError::Configuration(format!(
                "database target on '{host}' has an empty catalog name"
            )));
        }

        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };

        Ok(ConnectionSpec {
            host: host.to_owned(),
            port,
            catalog: catalog.to_owned(),
            username: self.username.clone(),
            password: self.password.clone(),
            trust_server_cert: true,
        })
    }
}

impl ConnectionSpec {
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    // Carried for engines that authenticate; the embedded engine does not
    #[allow(dead_code)]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[allow(dead_code)]
    pub fn trust_server_cert(&self) -> bool {
        self.trust_server_cert
    }

    /// "host:port" as used in log lines and the run summary.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where the embedded engine stores this catalog. Catalogs of distinct
    /// configured servers are namespaced by host so two servers can carry
    /// a catalog with the same name.
    pub fn catalog_path(&self, storage_root: &Path) -> PathBuf {
        storage_root
            .join(&self.host)
            .join(format!("{}.db", self.catalog))
    }
}
