use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::prompt::Truncation;
use crate::util::{self, Lookup};

/// Errors raised while reading configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// A credential that never shows up in logs
#[derive(Clone, PartialEq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub mail: MailConfig,
    pub report: ReportConfig,
}

/// HTTP listener
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<Secret>,
    pub name: String,
    /// Encrypt the connection (certificate is not verified)
    pub ssl: bool,
    /// Create the `metrics` table on startup
    pub run_migrations: bool,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

/// Summarization endpoint settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Full chat-completions URL, including deployment and api-version
    pub endpoint: String,
    pub api_key: Secret,
    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<Secret>,
    /// Sender address, defaults to the SMTP user
    pub from: String,
    /// Implicit TLS instead of opportunistic STARTTLS
    pub secure: bool,
    pub recipients: Vec<String>,
}

/// What the report contains and when it runs
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Five-field cron expression, evaluated in local time
    pub cron: String,
    pub output_dir: PathBuf,
    /// Days of metrics each host's summary covers
    pub window_days: u32,
    /// Maximum metric rows embedded in one prompt
    pub row_cap: usize,
    pub truncation: Truncation,
}

impl Config {
    /// Read configuration from the process environment
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&util::process_env)
    }

    /// Read configuration from an arbitrary key/value source
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let mail_user = util::required(lookup, "MAIL_USER")?;

        let config = Self {
            server: ServerConfig {
                bind_addr: util::parsed_or(lookup, util::BIND_ADDR, util::DEFAULT_ADDR)?,
                port: util::parsed_or(lookup, util::PORT, util::DEFAULT_PORT)?,
            },
            database: DatabaseConfig {
                host: util::required(lookup, "DB_HOST")?,
                port: util::parsed_or(lookup, "DB_PORT", util::DEFAULT_DB_PORT)?,
                user: util::required(lookup, "DB_USER")?,
                password: util::optional(lookup, "DB_PASSWORD").map(Secret),
                name: util::required(lookup, "DB_NAME")?,
                ssl: util::flag(lookup, "DB_SSL")?,
                run_migrations: util::flag(lookup, "DB_RUN_MIGRATIONS")?,
                max_connections: util::parsed_or(lookup, "DB_MAX_CONNECTIONS", 1)?,
                connect_timeout: Duration::from_secs(util::parsed_or(
                    lookup,
                    "DB_CONNECT_TIMEOUT_SECS",
                    30,
                )?),
            },
            llm: LlmConfig {
                endpoint: util::required(lookup, "AZURE_OPENAI_ENDPOINT")?,
                api_key: Secret(util::required(lookup, "AZURE_OPENAI_KEY")?),
                timeout: util::parsed_opt(lookup, "AZURE_OPENAI_TIMEOUT_SECS")?
                    .map(Duration::from_secs),
                temperature: util::parsed_or(lookup, "AZURE_OPENAI_TEMPERATURE", 0.7)?,
                max_tokens: util::parsed_or(lookup, "AZURE_OPENAI_MAX_TOKENS", 1500)?,
            },
            mail: MailConfig {
                host: util::required(lookup, "MAIL_HOST")?,
                port: util::parsed_or(lookup, "MAIL_PORT", util::DEFAULT_MAIL_PORT)?,
                from: util::optional(lookup, "MAIL_FROM").unwrap_or_else(|| mail_user.clone()),
                user: mail_user,
                password: util::optional(lookup, "MAIL_PASSWORD").map(Secret),
                secure: util::flag(lookup, "MAIL_SECURE")?,
                recipients: parse_recipients(&util::required(lookup, "MAIL_TO")?)?,
            },
            report: ReportConfig {
                cron: util::optional(lookup, "REPORT_CRON")
                    .unwrap_or_else(|| util::DEFAULT_CRON.to_string()),
                output_dir: util::optional(lookup, "REPORT_DIR")
                    .unwrap_or_else(|| util::DEFAULT_REPORT_DIR.to_string())
                    .into(),
                window_days: util::bounded_or(
                    lookup,
                    "METRICS_WINDOW_DAYS",
                    util::DEFAULT_WINDOW_DAYS,
                    1..=util::MAX_WINDOW_DAYS,
                )?,
                row_cap: util::bounded_or(
                    lookup,
                    "PROMPT_ROW_CAP",
                    util::DEFAULT_ROW_CAP,
                    1..=usize::MAX,
                )?,
                truncation: util::parsed_or(lookup, "PROMPT_TRUNCATION", Truncation::default())?,
            },
        };

        trace!("loaded config: {config:?}");
        Ok(config)
    }
}

/// Split a comma-separated recipient list
fn parse_recipients(value: &str) -> Result<Vec<String>, ConfigError> {
    let recipients: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect();

    if recipients.is_empty() {
        return Err(ConfigError::Missing("MAIL_TO"));
    }

    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DB_HOST", "db.internal"),
            ("DB_USER", "digest"),
            ("DB_NAME", "monitoring"),
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com/chat"),
            ("AZURE_OPENAI_KEY", "secret"),
            ("MAIL_HOST", "smtp.example.com"),
            ("MAIL_USER", "reports@example.com"),
            ("MAIL_TO", "ops@example.com"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(&|key: &str| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.port, 5432);
        assert!(!config.database.ssl);
        assert_eq!(config.mail.port, 587);
        assert_eq!(config.report.cron, "0 12 * * 0");
        assert_eq!(config.report.output_dir, PathBuf::from("reports"));
        assert_eq!(config.report.window_days, 7);
        assert_eq!(config.report.row_cap, 400);
        assert_eq!(config.report.truncation, Truncation::OldestFirst);
        assert!(config.llm.timeout.is_none());
        assert_eq!(config.llm.max_tokens, 1500);
        assert_eq!(config.mail.from, "reports@example.com");
    }

    #[test]
    fn test_missing_required_key_is_reported() {
        let mut env = base_env();
        env.remove("AZURE_OPENAI_KEY");

        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("AZURE_OPENAI_KEY"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("MAIL_TO", " , ");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("MAIL_TO"));

        env.insert("MAIL_TO", "");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("MAIL_TO"));
    }

    #[test]
    fn test_recipients_are_split_and_trimmed() {
        let mut env = base_env();
        env.insert("MAIL_TO", "ops@example.com, oncall@example.com ,");

        let config = load(&env).unwrap();
        assert_eq!(
            config.mail.recipients,
            vec!["ops@example.com", "oncall@example.com"]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut env = base_env();
        env.insert("PORT", "eighty");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "PORT", .. }
        ));

        let mut env = base_env();
        env.insert("DB_SSL", "maybe");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "DB_SSL", .. }
        ));
    }

    #[test]
    fn test_window_days_must_be_in_range() {
        for value in ["0", "36501", "4000000000"] {
            let mut env = base_env();
            env.insert("METRICS_WINDOW_DAYS", value);
            assert!(matches!(
                load(&env).unwrap_err(),
                ConfigError::Invalid { key: "METRICS_WINDOW_DAYS", .. }
            ));
        }

        let mut env = base_env();
        env.insert("METRICS_WINDOW_DAYS", "36500");
        assert_eq!(load(&env).unwrap().report.window_days, 36_500);
    }

    #[test]
    fn test_row_cap_of_zero_is_rejected() {
        let mut env = base_env();
        env.insert("PROMPT_ROW_CAP", "0");

        assert_eq!(
            load(&env).unwrap_err(),
            ConfigError::Invalid {
                key: "PROMPT_ROW_CAP",
                value: "0".to_string(),
                reason: format!("expected a value from 1 to {}", usize::MAX),
            }
        );
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("DB_SSL", "true");
        env.insert("AZURE_OPENAI_TIMEOUT_SECS", "90");
        env.insert("PROMPT_TRUNCATION", "newest-first");
        env.insert("PROMPT_ROW_CAP", "200");
        env.insert("REPORT_CRON", "0 0 * * 0");

        let config = load(&env).unwrap();
        assert!(config.database.ssl);
        assert_eq!(config.llm.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.report.truncation, Truncation::NewestFirst);
        assert_eq!(config.report.row_cap, 200);
        assert_eq!(config.report.cron, "0 0 * * 0");
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let mut env = base_env();
        env.insert("MAIL_PASSWORD", "hunter2");
        env.insert("DB_PASSWORD", "correct-horse");

        let config = load(&env).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("correct-horse"));
        assert!(!debug.contains("secret"));
        assert_eq!(config.llm.api_key.expose(), "secret");
    }
}
