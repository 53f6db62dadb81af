//! Configuration loading
//!
//! Sources, later ones winning: `config.toml` (optional), `COINFLIP_*`
//! environment variables with `__` as the section separator, and the
//! legacy `BOT_TOKEN` / `ADMIN_ID` / `DATABASE_PATH` variables.

use crate::error::{BotError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub round: RoundConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    pub dashboard: Option<DashboardConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// The only user allowed to run admin commands
    pub operator_id: i64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Photo URL or Telegram file_id sent with payment instructions
    pub payment_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoundConfig {
    /// Capacity used when no settings have been persisted yet
    #[serde(default = "default_total_slots")]
    pub default_total_slots: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            default_total_slots: default_total_slots(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_recipient_timeout")]
    pub per_recipient_timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            per_recipient_timeout_ms: default_recipient_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_db_path() -> String {
    "data/coinflip.db".to_string()
}

fn default_total_slots() -> u32 {
    30
}

fn default_concurrency() -> usize {
    16
}

fn default_recipient_timeout() -> u64 {
    5000
}

fn default_dashboard_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from a file plus the environment.
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("COINFLIP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("telegram.bot_token", std::env::var("BOT_TOKEN").ok())?
            .set_override_option("telegram.operator_id", legacy_operator_id()?)?
            .set_override_option("database.path", std::env::var("DATABASE_PATH").ok())?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(BotError::Config("telegram.bot_token is empty".into()));
        }
        if self.telegram.operator_id <= 0 {
            return Err(BotError::Config(format!(
                "telegram.operator_id must be positive, got {}",
                self.telegram.operator_id
            )));
        }
        if self.notify.concurrency == 0 {
            return Err(BotError::Config("notify.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Database path with `~` and `$VARS` expanded.
    pub fn database_path(&self) -> Result<String> {
        shellexpand::full(&self.database.path)
            .map(|p| p.into_owned())
            .map_err(|e| BotError::Config(format!("database.path: {}", e)))
    }
}

fn legacy_operator_id() -> Result<Option<i64>> {
    match std::env::var("ADMIN_ID") {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| BotError::Config(format!("ADMIN_ID is not an integer: {}", e))),
        Err(_) => Ok(None),
    }
}
