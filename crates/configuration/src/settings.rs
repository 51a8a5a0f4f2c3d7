use core_types::{TypeCatalog, ValueType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::kinds::KindConfig;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Replaces the built-in type catalog when present.
    #[serde(default)]
    pub type_mapping: Option<BTreeMap<ValueType, SqlTypeList>>,
    /// Record shapes declared in the configuration file, keyed by kind name.
    #[serde(default)]
    pub kinds: BTreeMap<String, KindConfig>,
}

impl Config {
    /// The type catalog to validate kinds against.
    pub fn type_catalog(&self) -> TypeCatalog {
        match &self.type_mapping {
            Some(mapping) => TypeCatalog::from_mapping(
                mapping
                    .iter()
                    .map(|(value_type, types)| (*value_type, types.to_vec()))
                    .collect(),
            ),
            None => TypeCatalog::default(),
        }
    }
}

/// One SQL type name or a list of them; the legacy mapping table mixes both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SqlTypeList {
    One(String),
    Many(Vec<String>),
}

impl SqlTypeList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            SqlTypeList::One(t) => vec![t.clone()],
            SqlTypeList::Many(types) => types.clone(),
        }
    }
}

/// Where and how to reach the PostgreSQL store.
///
/// Every connection parameter is optional; absent ones are left out of the
/// connection target and fall back to the driver's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub db_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upper bound on establishing a connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on executing and committing a single statement.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_statement_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            hostname: None,
            port: None,
            db_name: None,
            username: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_secs: default_statement_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    /// A libpq-style description of the connection target for diagnostics.
    /// The password is masked.
    pub fn connection_target(&self) -> String {
        let mut parts = Vec::new();
        if let Some(host) = &self.hostname {
            parts.push(format!("host={host}"));
        }
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if let Some(db_name) = &self.db_name {
            parts.push(format!("dbname={db_name}"));
        }
        if let Some(user) = &self.username {
            parts.push(format!("user={user}"));
        }
        if self.password.is_some() {
            parts.push("password=********".to_string());
        }
        parts.join(" ")
    }
}

/// Command-line overrides for the connection target.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct DatabaseOverrides {
    /// Database server host name.
    #[cfg_attr(feature = "clap", arg(long))]
    pub host: Option<String>,
    /// Database server port.
    #[cfg_attr(feature = "clap", arg(long))]
    pub port: Option<u16>,
    /// Database name.
    #[cfg_attr(feature = "clap", arg(long))]
    pub db_name: Option<String>,
    /// User to connect as.
    #[cfg_attr(feature = "clap", arg(long))]
    pub user: Option<String>,
}

impl DatabaseSettings {
    pub fn apply_overrides(&mut self, overrides: &DatabaseOverrides) {
        if let Some(host) = &overrides.host {
            self.hostname = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.port = Some(port);
        }
        if let Some(db_name) = &overrides.db_name {
            self.db_name = Some(db_name.clone());
        }
        if let Some(user) = &overrides.user {
            self.username = Some(user.clone());
        }
    }
}

/// Controls the tracing subscriber installed by [`crate::init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive, used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs go to a daily rolling file in this directory instead of stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "marquee.log".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}
