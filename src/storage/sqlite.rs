//! SQLite-backed store
//!
//! Users live in their own table; the three round singletons are stored
//! as JSON documents in `round_state`, keyed by name.

use super::{Store, Write};
use crate::error::{BotError, Result};
use crate::types::{BetStatus, ResultTally, RoundSettings, Side, User, UserId, WinnerSet};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use std::path::Path;
use std::str::FromStr;

const SETTINGS_KEY: &str = "settings";
const TALLY_KEY: &str = "results";
const WINNERS_KEY: &str = "winners";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        bet TEXT,
        status TEXT,
        payment_attempts INTEGER NOT NULL DEFAULT 0,
        registered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS round_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BotError::Internal(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        // One connection keeps every commit on a single writer.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        tracing::info!(path, "Database ready");
        Ok(db)
    }

    /// Private in-memory database, gone when dropped.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn load_singleton<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM round_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }
}

async fn put_singleton<T: Serialize>(conn: &mut SqliteConnection, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    sqlx::query(
        "INSERT INTO round_state (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(raw)
    .execute(conn)
    .await?;
    Ok(())
}

async fn put_user(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (user_id, name, bet, status, payment_attempts, registered_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
             name = excluded.name,
             bet = excluded.bet,
             status = excluded.status,
             payment_attempts = excluded.payment_attempts",
    )
    .bind(user.user_id)
    .bind(&user.name)
    .bind(user.bet.map(|s| s.as_str()))
    .bind(user.status.map(|s| s.as_str()))
    .bind(i64::from(user.payment_attempts))
    .bind(user.registered_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let bet: Option<String> = row.try_get("bet")?;
    let status: Option<String> = row.try_get("status")?;
    let attempts: i64 = row.try_get("payment_attempts")?;
    let user_id: UserId = row.try_get("user_id")?;

    let corrupt = |what: &str, value: &str| {
        BotError::Internal(format!("user {}: stored {} {:?} is invalid", user_id, what, value))
    };

    Ok(User {
        user_id,
        name: row.try_get("name")?,
        bet: bet
            .as_deref()
            .map(|raw| Side::from_str(raw).map_err(|_| corrupt("bet", raw)))
            .transpose()?,
        status: status
            .as_deref()
            .map(|raw| BetStatus::from_str(raw).map_err(|_| corrupt("status", raw)))
            .transpose()?,
        payment_attempts: u32::try_from(attempts)
            .map_err(|_| corrupt("payment_attempts", &attempts.to_string()))?,
        registered_at: row.try_get("registered_at")?,
    })
}

#[async_trait]
impl Store for Database {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn settings(&self) -> Result<Option<RoundSettings>> {
        self.load_singleton(SETTINGS_KEY).await
    }

    async fn tally(&self) -> Result<Option<ResultTally>> {
        self.load_singleton(TALLY_KEY).await
    }

    async fn winners(&self) -> Result<Option<WinnerSet>> {
        self.load_singleton(WINNERS_KEY).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for write in &writes {
            match write {
                Write::User(user) => put_user(&mut *tx, user).await?,
                Write::Settings(settings) => put_singleton(&mut *tx, SETTINGS_KEY, settings).await?,
                Write::Tally(tally) => put_singleton(&mut *tx, TALLY_KEY, tally).await?,
                Write::Winners(winners) => put_singleton(&mut *tx, WINNERS_KEY, winners).await?,
            }
        }
        tx.commit().await?;
        tracing::debug!(writes = writes.len(), "Committed");
        Ok(())
    }
}
