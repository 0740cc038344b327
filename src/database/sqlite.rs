//! SQLite database connection and schema

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::time::Duration;
use tracing::info;

use crate::config::{ensure_parent_dir, SqliteConfig};
use crate::error::Result;

/// SQLite connection pool type alias
pub type SqlitePool = sqlx::SqlitePool;

/// Initialize the SQLite connection pool, creating the file if needed
pub async fn init_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    info!("Initializing SQLite database at {}", config.path.display());

    ensure_parent_dir(&config.path)?;

    let journal_mode = if config.wal_mode {
        SqliteJournalMode::Wal
    } else {
        SqliteJournalMode::Delete
    };

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(journal_mode)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("SQLite connection pool initialized successfully");
    Ok(pool)
}

/// Database migrations
pub mod migrations {
    use super::*;

    /// Run all migrations
    pub async fn run(pool: &SqlitePool) -> Result<()> {
        info!("Running database migrations");

        // Conversation log, one row per message
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_user_id ON conversations(user_id)")
            .execute(pool)
            .await?;

        // One JSON document per user
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id INTEGER PRIMARY KEY,
                data TEXT NOT NULL
            )
        "#,
        )
        .execute(pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Message and profile store backed by SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pub(super) pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database described by `config` and bring the schema up to date
    pub async fn connect(config: &SqliteConfig) -> Result<Self> {
        let pool = init_pool(config).await?;
        migrations::run(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// A migrated store in a fresh temporary directory
    pub async fn temp_store() -> (SqliteStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig {
            path: dir.path().join("data").join("home_agent.db"),
            ..Default::default()
        };
        let store = SqliteStore::connect(&config).await.unwrap();
        (store, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_file_and_schema() {
        let (store, dir) = temp_store().await;
        assert!(dir.path().join("data").join("home_agent.db").exists());

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(store.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(names.contains(&"conversations"));
        assert!(names.contains(&"user_profiles"));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (store, _dir) = temp_store().await;
        migrations::run(store.pool()).await.unwrap();
    }
}
