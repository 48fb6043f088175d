//! Connection configuration.
//!
//! `DbConfig` carries the conventional MySQL connection parameters and can
//! be populated from environment variables, the way the test suite is
//! configured (`TEST_DB_HOST`, `TEST_DB_PORT`, ...).

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Default MySQL server port
pub const DEFAULT_PORT: u16 = 3306;

/// MySQL connection configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Host name or IP address of the server
    pub host: String,
    /// TCP port of the server
    pub port: u16,
    /// User name to authenticate as
    pub user: String,
    /// Password for the user
    pub password: String,
    /// Database to select after connecting; empty selects none
    pub db_name: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: "root".to_string(),
            password: String::new(),
            db_name: "test".to_string(),
        }
    }
}

impl DbConfig {
    /// Create a config from the four conventional connection parameters,
    /// on the default port.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            db_name: db_name.into(),
        }
    }

    /// Override the server port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Load settings from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWD` and
    /// `DB_DBNAME`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix("DB")
    }

    /// Load settings from `<PREFIX>_HOST`, `<PREFIX>_PORT`, `<PREFIX>_USER`,
    /// `<PREFIX>_PASSWD` and `<PREFIX>_DBNAME`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(host) = env::var(format!("{prefix}_HOST")) {
            config.host = host;
        }
        if let Ok(port) = env::var(format!("{prefix}_PORT")) {
            config.port = port.parse().map_err(|_| DbError::InvalidConfig {
                name: format!("{prefix}_PORT"),
                value: port.clone(),
            })?;
        }
        if let Ok(user) = env::var(format!("{prefix}_USER")) {
            config.user = user;
        }
        if let Ok(password) = env::var(format!("{prefix}_PASSWD")) {
            config.password = password;
        }
        if let Ok(db_name) = env::var(format!("{prefix}_DBNAME")) {
            config.db_name = db_name;
        }
        Ok(config)
    }
}

// Password stays out of logs and panic messages.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db_name", &self.db_name)
            .finish()
    }
}
