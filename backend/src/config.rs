//! Batch configuration.
//!
//! Built once at startup from the environment (a `.env` file is loaded by
//! the binary first), optionally overridden from the command line, then
//! passed by value to the components that need it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_INPUT: &str = "csvFiles/generated_users.csv";
pub const DEFAULT_OUTPUT: &str = "csvFiles/processed_users.csv";
pub const DEFAULT_DELIMITER: u8 = b';';
pub const DEFAULT_HOST: &str = "localhost";
/// Standard PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DBNAME: &str = "ETL";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection parameters for the Persistence Gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dbname: DEFAULT_DBNAME.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl DatabaseConfig {
    /// `host:port/dbname`, safe to log.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }
}

/// Everything one batch run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Field delimiter shared by the input and output files
    pub delimiter: u8,
    pub database: DatabaseConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            delimiter: DEFAULT_DELIMITER,
            database: DatabaseConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to the defaults; set but invalid ones fail.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let delimiter = match get("USERLOAD_DELIMITER") {
            Some(raw) => parse_delimiter(&raw)?,
            None => defaults.delimiter,
        };

        let port = match get("DB_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "DB_PORT",
                value: raw.clone(),
                reason: "expected a port number",
            })?,
            None => defaults.database.port,
        };

        let connect_timeout = match get("DB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => defaults.database.connect_timeout,
        };

        Ok(Self {
            input_path: get("USERLOAD_INPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_path),
            output_path: get("USERLOAD_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_path),
            delimiter,
            database: DatabaseConfig {
                host: get("DB_HOST").unwrap_or(defaults.database.host),
                port,
                dbname: get("DB_NAME").unwrap_or(defaults.database.dbname),
                user: get("DB_USER").unwrap_or(defaults.database.user),
                // An empty password is a legitimate value.
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                connect_timeout,
            },
        })
    }

    /// Apply command-line overrides on top of the environment values.
    pub fn with_overrides(
        mut self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        delimiter: Option<char>,
    ) -> ConfigResult<Self> {
        if let Some(path) = input {
            self.input_path = path;
        }
        if let Some(path) = output {
            self.output_path = path;
        }
        if let Some(c) = delimiter {
            self.delimiter = parse_delimiter(&c.to_string())?;
        }
        Ok(self)
    }
}

/// A delimiter must be exactly one ASCII character. `\t` is accepted for tab.
pub fn parse_delimiter(raw: &str) -> ConfigResult<u8> {
    let invalid = |reason| ConfigError::InvalidValue {
        name: "USERLOAD_DELIMITER",
        value: raw.to_string(),
        reason,
    };

    if raw == "\\t" {
        return Ok(b'\t');
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => Ok(c as u8),
        (Some(_), None) => Err(invalid("delimiter must be an ASCII character other than a quote or newline")),
        _ => Err(invalid("delimiter must be a single character")),
    }
}

fn parse_timeout(raw: &str) -> ConfigResult<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            name: "DB_CONNECT_TIMEOUT_SECS",
            value: raw.to_string(),
            reason: "expected a positive number of seconds",
        }),
    }
}
