use anyhow::Result;
use std::env;
use std::time::Duration;
use crate::constants::{
    DEFAULT_SERVER_PORT, DELETE_VERIFY_BACKOFF_MS, DELETE_VERIFY_MAX_ATTEMPTS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub delete_verify_attempts: u32,
    pub delete_verify_backoff: Duration,
    pub app_base_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_SERVER_PORT.to_string())
                .parse()
                .unwrap_or(DEFAULT_SERVER_PORT),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| parse_origins(&origins))
                .unwrap_or_default(),
            delete_verify_attempts: env::var("DELETE_VERIFY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DELETE_VERIFY_MAX_ATTEMPTS)
                .max(1),
            delete_verify_backoff: Duration::from_millis(
                env::var("DELETE_VERIFY_BACKOFF_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DELETE_VERIFY_BACKOFF_MS),
            ),
            app_base_path: env::var("APP_BASE_PATH")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_default(),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
