use std::str::FromStr;

use anyhow::{Context, bail};
use chrono::Duration;

use crate::auth::password::clamp_cost;
use crate::auth::SessionPolicy;
use crate::records::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://instance/bmi.db?mode=rwc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Sqlite,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SessionBackend::Sqlite),
            "memory" => Ok(SessionBackend::Memory),
            other => bail!("Unknown session backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_backend: SessionBackend,
    pub session_ttl_minutes: i64,
    pub session_sweep_interval_secs: u64,
    pub bcrypt_cost: u32,
    pub history_limit: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_backend: SessionBackend::Sqlite,
            session_ttl_minutes: 60,
            session_sweep_interval_secs: 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            database_url: dotenvy::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.database_url),
            session_backend: match dotenvy::var("SESSION_BACKEND") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.session_backend,
            },
            session_ttl_minutes: parse_var("SESSION_TTL_MINUTES", defaults.session_ttl_minutes)?,
            session_sweep_interval_secs: parse_var(
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.session_sweep_interval_secs,
            )?,
            bcrypt_cost: clamp_cost(parse_var("BCRYPT_COST", defaults.bcrypt_cost)?),
            history_limit: parse_var("HISTORY_LIMIT", defaults.history_limit)?,
        };

        if config.session_ttl_minutes <= 0 {
            bail!("SESSION_TTL_MINUTES must be positive");
        }
        if config.history_limit <= 0 {
            bail!("HISTORY_LIMIT must be positive");
        }

        Ok(config)
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            ttl: Duration::minutes(self.session_ttl_minutes),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenvy::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, value)),
        Err(_) => Ok(default),
    }
}
