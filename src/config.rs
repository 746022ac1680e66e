/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, 表示用タイムゾーン, タイムアウトなど)
 * - 設定値のバリデーション (不正なら起動失敗)
 */
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // None -> in-memory store (development only)
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    // Deadline for every credential store call
    pub db_acquire_timeout: Duration,

    // Presentation only; exp/iat are always UTC instants
    pub display_offset: FixedOffset,

    pub token_endpoint_enabled: bool,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            app_env: AppEnv::Development,
            database_url: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(5),
            display_offset: Utc.fix(),
            token_endpoint_enabled: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port: u16 = parse_or("PORT", defaults.addr.port())?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::from_env();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", defaults.db_max_connections)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid("DB_MAX_CONNECTIONS"));
        }
        let db_acquire_timeout = Duration::from_secs(parse_or(
            "DB_ACQUIRE_TIMEOUT_SECONDS",
            defaults.db_acquire_timeout.as_secs(),
        )?);

        let display_offset = parse_or("DISPLAY_UTC_OFFSET", defaults.display_offset)?;

        // The issuance endpoint is an administrative surface; keep it off in production unless asked.
        let token_endpoint_enabled =
            parse_or("TOKEN_ENDPOINT_ENABLED", !app_env.is_production())?;

        let request_timeout = Duration::from_secs(parse_or(
            "REQUEST_TIMEOUT_SECONDS",
            defaults.request_timeout.as_secs(),
        )?);

        Ok(Config {
            addr,
            app_env,
            database_url,
            db_max_connections,
            db_acquire_timeout,
            display_offset,
            token_endpoint_enabled,
            request_timeout,
        })
    }
}

// Absent -> default; present but unparsable -> error (no silent fallback).
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}
