use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use anyhow::{anyhow, bail};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown STORAGE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

/// Lifetimes and deadlines used by the account and session managers.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub reset_token_ttl_minutes: i64,
    pub verification_token_ttl_hours: i64,
    pub store_timeout_secs: u64,
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            reset_token_ttl_minutes: 60,
            verification_token_ttl_hours: 24,
            store_timeout_secs: 5,
            cookie_secure: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Base for links placed in outgoing mail, e.g. `https://app.example.com`.
    pub public_base_url: String,
    /// `None` means mail is written to the log instead of being sent.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

/// Parse `key` when set, rejecting values that do not parse or fall outside
/// `range`. Unset keys take `default`.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    range: RangeInclusive<T>,
) -> anyhow::Result<T>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key}={raw:?} is not valid: {e}"))?;
    if !range.contains(&value) {
        bail!(
            "{key}={value} is out of range ({}..={})",
            range.start(),
            range.end()
        );
    }
    Ok(value)
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> anyhow::Result<bool> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{key}={v:?} is not a boolean"),
        },
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = match lookup("STORAGE_BACKEND") {
            Some(v) => v.parse::<StorageBackend>()?,
            None => StorageBackend::Postgres,
        };
        let database_url = lookup("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }
        let storage = StorageConfig {
            backend,
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10, 1..=1000)?,
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            session_ttl_hours: parse_or(
                &lookup,
                "SESSION_TTL_HOURS",
                defaults.session_ttl_hours,
                1..=24 * 366,
            )?,
            reset_token_ttl_minutes: parse_or(
                &lookup,
                "RESET_TOKEN_TTL_MINUTES",
                defaults.reset_token_ttl_minutes,
                1..=24 * 60,
            )?,
            verification_token_ttl_hours: parse_or(
                &lookup,
                "VERIFICATION_TOKEN_TTL_HOURS",
                defaults.verification_token_ttl_hours,
                1..=24 * 30,
            )?,
            store_timeout_secs: parse_or(
                &lookup,
                "STORE_TIMEOUT_SECS",
                defaults.store_timeout_secs,
                1..=300,
            )?,
            cookie_secure: parse_flag(&lookup, "COOKIE_SECURE", defaults.cookie_secure)?,
        };

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 587, 1..=u16::MAX)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
                from: lookup("MAIL_FROM").unwrap_or_else(|| "accounts@localhost".into()),
            }),
            None => None,
        };
        let mail = MailConfig {
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".into()),
            smtp,
        };

        Ok(Self {
            storage,
            auth,
            mail,
        })
    }
}
