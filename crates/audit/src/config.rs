//! Audit configuration loaded from environment variables.

use std::str::FromStr;

use hypertext_core::site::SiteConfig;

/// Default database pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub database_url: String,
    pub site: SiteConfig,
    pub max_connections: u32,
    /// Restrict the audit to one account's pages.
    pub owner_uid: Option<String>,
    pub log_format: LogFormat,
}

impl AuditConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var              | Required | Default |
    /// |----------------------|----------|---------|
    /// | `DATABASE_URL`       | **yes**  | --      |
    /// | `SITE_URL`           | no       | `""`    |
    /// | `DB_MAX_CONNECTIONS` | no       | `5`     |
    /// | `AUDIT_OWNER`        | no       | all     |
    /// | `LOG_FORMAT`         | no       | `text`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let database_url = non_empty("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let site = SiteConfig::new(non_empty("SITE_URL").unwrap_or_default());
        let max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            non_empty("DB_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let owner_uid = non_empty("AUDIT_OWNER");
        let log_format = parse_or("LOG_FORMAT", non_empty("LOG_FORMAT"), LogFormat::Text)?;

        Ok(Self {
            database_url,
            site,
            max_connections,
            owner_uid,
            log_format,
        })
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => {
            let parsed: Result<T, T::Err> = value.trim().parse();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}
