//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env is
//! loaded first) > defaults. Secrets have no defaults and must come from
//! one of the first two.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feedback::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::mail::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use crate::retry::RetryPolicy;
use crate::store::DEFAULT_SHEETS_API_BASE;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{key}` (or env {env})")]
    Missing { key: &'static str, env: &'static str },

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("setting `{key}` has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

// ==================== File Structure ====================

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    sheets: SheetsSection,
    #[serde(default)]
    openai: OpenAiSection,
    #[serde(default)]
    email: EmailSection,
    #[serde(default)]
    retry: RetrySection,
    #[serde(default)]
    session: SessionSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsSection {
    spreadsheet_id: Option<String>,
    range: Option<String>,
    api_base: Option<String>,
    credentials_path: Option<PathBuf>,
    credentials_json: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiSection {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailSection {
    address: Option<String>,
    password: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySection {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    expiry_hours: Option<i64>,
}

// ==================== Resolved Configuration ====================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
}

impl ServerConfig {
    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

#[derive(Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub range: String,
    pub api_base: String,
    /// Service-account key file contents (JSON)
    pub credentials_json: String,
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct EmailConfig {
    pub address: String,
    pub password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sheets: SheetsConfig,
    pub openai: OpenAiConfig,
    pub email: EmailConfig,
    pub retry: RetryPolicy,
    pub session_expiry: chrono::Duration,
}

// Secrets are redacted so configs can be logged.

impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("api_base", &self.api_base)
            .field("credentials_json", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Server address to bind to
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const DEFAULT_SERVER_PORT: u16 = 3000;

pub const DEFAULT_SHEETS_RANGE: &str = "Sheet1";
pub const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 2;

/// Upper bound for `session.expiry_hours` (one year)
pub const MAX_SESSION_EXPIRY_HOURS: i64 = 24 * 365;

impl AppConfig {
    /// Load from ./config.toml (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
    }

    /// Load from `path` (skipped when it does not exist) with `env` as the
    /// fallback source.
    pub fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!("Using configuration from {}", path.display());
                toml::from_str::<FileConfig>(&contents)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::resolve(file, &env)
    }

    fn resolve(file: FileConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            addr: file
                .server
                .addr
                .or_else(|| env("SERVER_ADDR"))
                .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
            port: match file.server.port {
                Some(port) => port,
                None => parse_env(env, "PORT", "server.port")?.unwrap_or(DEFAULT_SERVER_PORT),
            },
        };

        let credentials_json = match file.sheets.credentials_json.or_else(|| env("GCP_CREDENTIALS")) {
            Some(json) => json,
            None => {
                let path = file
                    .sheets
                    .credentials_path
                    .or_else(|| env("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from))
                    .ok_or(ConfigError::Missing {
                        key: "sheets.credentials_path",
                        env: "GOOGLE_APPLICATION_CREDENTIALS",
                    })?;
                std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?
            }
        };

        let sheets = SheetsConfig {
            spreadsheet_id: required(file.sheets.spreadsheet_id, env, "sheets.spreadsheet_id", "SPREADSHEET_ID")?,
            range: file
                .sheets
                .range
                .or_else(|| env("SHEETS_RANGE"))
                .unwrap_or_else(|| DEFAULT_SHEETS_RANGE.to_string()),
            api_base: file
                .sheets
                .api_base
                .or_else(|| env("SHEETS_API_BASE"))
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            credentials_json,
        };

        let openai = OpenAiConfig {
            api_key: required(file.openai.api_key, env, "openai.api_key", "OPENAI_API_KEY")?,
            base_url: file
                .openai
                .base_url
                .or_else(|| env("OPENAI_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: file
                .openai
                .model
                .or_else(|| env("OPENAI_MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(file.openai.timeout_secs.unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS)),
        };

        let email = EmailConfig {
            address: required(file.email.address, env, "email.address", "EMAIL_ADDRESS")?,
            password: required(file.email.password, env, "email.password", "EMAIL_PASSWORD")?,
            smtp_host: file
                .email
                .smtp_host
                .or_else(|| env("SMTP_HOST"))
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: match file.email.smtp_port {
                Some(port) => port,
                None => parse_env(env, "SMTP_PORT", "email.smtp_port")?.unwrap_or(DEFAULT_SMTP_PORT),
            },
            timeout: Duration::from_secs(file.email.timeout_secs.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS)),
        };

        let max_attempts = file.retry.max_attempts.unwrap_or(1);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts",
                value: max_attempts.to_string(),
            });
        }
        let retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(file.retry.base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS)),
            max_delay: Duration::from_millis(file.retry.max_delay_ms.unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS)),
        };

        let expiry_hours = file.session.expiry_hours.unwrap_or(DEFAULT_SESSION_EXPIRY_HOURS);
        if !(1..=MAX_SESSION_EXPIRY_HOURS).contains(&expiry_hours) {
            return Err(ConfigError::Invalid {
                key: "session.expiry_hours",
                value: expiry_hours.to_string(),
            });
        }
        let session_expiry = chrono::Duration::hours(expiry_hours);

        Ok(Self {
            server,
            sheets,
            openai,
            email,
            retry,
            session_expiry,
        })
    }
}

fn required(
    value: Option<String>,
    env: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
    env_key: &'static str,
) -> Result<String, ConfigError> {
    value
        .or_else(|| env(env_key))
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key, env: env_key })
}

fn parse_env<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    env_key: &str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env(env_key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(None),
    }
}
