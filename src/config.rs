//! Runtime configuration read from environment variables.
//!
//! | Variable           | Default                           |
//! |--------------------|-----------------------------------|
//! | `WATCH_DIRECTORY`  | `./data`                          |
//! | `RECIPIENT_EMAIL`  | `demo@statement-mailer.local`     |
//! | `OUTBOX_DIRECTORY` | `./outbox`                        |
//! | `MAIL_FROM`        | `noreply@statement-mailer.local`  |
//! | `STORE_PATH`       | unset (persistence disabled)      |
//! | `LOG_LEVEL`        | `info`                            |
//! | `POLL_INTERVAL_MS` | `1000`                            |
//! | `SMTP_HOST`        | unset (messages go to the outbox) |
//! | `SMTP_PORT`        | `587`                             |
//! | `SMTP_USERNAME`    | unset                             |
//! | `SMTP_PASSWORD`    | unset                             |
//!
//! Empty values count as unset.

use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// SMTP relay settings, present only when `SMTP_HOST` is set.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub watch_directory: PathBuf,
    pub recipient: String,
    pub outbox_directory: PathBuf,
    pub mail_from: String,
    pub store_path: Option<PathBuf>,
    pub log_level: String,
    pub poll_interval: Duration,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, validating every field and
    /// reporting all problems at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let mut errors = Vec::new();

        let recipient = or("RECIPIENT_EMAIL", "demo@statement-mailer.local");
        if !recipient.contains('@') {
            errors.push(format!("RECIPIENT_EMAIL is not an email address: {}", recipient));
        }

        let mail_from = or("MAIL_FROM", "noreply@statement-mailer.local");
        if !mail_from.contains('@') {
            errors.push(format!("MAIL_FROM is not an email address: {}", mail_from));
        }

        let log_level = or("LOG_LEVEL", "info").to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            errors.push(format!("LOG_LEVEL must be one of: {}", LOG_LEVELS.join(", ")));
        }

        let poll_ms = or("POLL_INTERVAL_MS", "1000");
        let poll_interval = match poll_ms.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                errors.push("POLL_INTERVAL_MS must be a positive integer".to_string());
                Duration::ZERO
            }
        };

        let smtp_port = or("SMTP_PORT", "587");
        let port = match smtp_port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                errors.push(format!("SMTP_PORT must be a port number: {}", smtp_port));
                0
            }
        };
        let smtp = get("SMTP_HOST").map(|host| SmtpConfig {
            host: host.trim().to_string(),
            port,
            username: get("SMTP_USERNAME"),
            password: get("SMTP_PASSWORD"),
        });

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        Ok(Config {
            watch_directory: PathBuf::from(or("WATCH_DIRECTORY", "./data")),
            recipient,
            outbox_directory: PathBuf::from(or("OUTBOX_DIRECTORY", "./outbox")),
            mail_from,
            store_path: get("STORE_PATH").map(PathBuf::from),
            log_level,
            poll_interval,
            smtp,
        })
    }
}
