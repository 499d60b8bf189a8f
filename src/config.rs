use std::env;
use std::fmt;

use thiserror::Error;

pub const PORT: u16 = 8080;
/// Request bodies for `POST /add` may be this large.
pub const FORM_LIMIT_MIB: u64 = 10;

const DEFAULT_MYSQL_HOST: &str = "localhost";
const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_MSSQL_SERVER: &str = "localhost";
const DEFAULT_MSSQL_PORT: u16 = 1433;
const DEFAULT_SQLITE_PATH: &str = "tasks.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("unsupported database backend `{0}`")]
    UnsupportedBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Mysql,
    Postgres,
    Mssql,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Mysql => "mysql",
            Backend::Postgres => "postgres",
            Backend::Mssql => "mssql",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "mysql" => Ok(Backend::Mysql),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "mssql" | "sqlserver" => Ok(Backend::Mssql),
            _ => Err(ConfigError::UnsupportedBackend(value.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub app_env: String,
    pub backend: Backend,
    pub database_url: String,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let app_env = var("APP_ENV").unwrap_or_else(|| "production".to_string());

        let backend = match var("DB_BACKEND") {
            Some(name) => Backend::parse(&name)?,
            None if MSSQL_VARS.iter().any(|&k| var(k).is_some()) => Backend::Mssql,
            None if MYSQL_VARS.iter().any(|&k| var(k).is_some()) => Backend::Mysql,
            None => Backend::Sqlite,
        };

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => match backend {
                Backend::Sqlite => var("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
                Backend::Mysql => mysql_url(&var)?,
                Backend::Postgres => return Err(ConfigError::Missing("DATABASE_URL")),
                Backend::Mssql => mssql_ado(&var)?,
            },
        };

        Ok(Config {
            app_env,
            backend,
            database_url,
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

const MYSQL_VARS: [&str; 5] = ["MYSQL_USER", "MYSQL_PASSWORD", "MYSQL_HOST", "MYSQL_PORT", "MYSQL_DB"];
const MSSQL_VARS: [&str; 5] = ["MSSQL_SERVER", "MSSQL_PORT", "MSSQL_DB", "MSSQL_USER", "MSSQL_PASSWORD"];

fn port<F>(var: &F, key: &'static str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid { var: key, value: port }),
        None => Ok(default),
    }
}

fn mysql_url<F>(var: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let user = var("MYSQL_USER").ok_or(ConfigError::Missing("MYSQL_USER"))?;
    let password = var("MYSQL_PASSWORD").ok_or(ConfigError::Missing("MYSQL_PASSWORD"))?;
    let db = var("MYSQL_DB").ok_or(ConfigError::Missing("MYSQL_DB"))?;
    let host = var("MYSQL_HOST").unwrap_or_else(|| DEFAULT_MYSQL_HOST.to_string());
    let port = port(var, "MYSQL_PORT", DEFAULT_MYSQL_PORT)?;

    Ok(format!("mysql://{}:{}@{}:{}/{}", user, password, host, port, db))
}

/// ADO.NET style string, the form SQL Server drivers accept.
fn mssql_ado<F>(var: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let user = var("MSSQL_USER").ok_or(ConfigError::Missing("MSSQL_USER"))?;
    let password = var("MSSQL_PASSWORD").ok_or(ConfigError::Missing("MSSQL_PASSWORD"))?;
    let db = var("MSSQL_DB").ok_or(ConfigError::Missing("MSSQL_DB"))?;
    let server = var("MSSQL_SERVER").unwrap_or_else(|| DEFAULT_MSSQL_SERVER.to_string());
    let port = port(var, "MSSQL_PORT", DEFAULT_MSSQL_PORT)?;

    Ok(format!(
        "server=tcp:{},{};database={};user id={};password={};TrustServerCertificate=true",
        server, port, db, user, password
    ))
}
