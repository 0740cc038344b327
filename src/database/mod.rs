//! Database module - SQLite persistence
//!
//! Provides storage for:
//! - Conversations: append-only per-user log of model messages
//! - User profiles: one JSON document per user, replaced wholesale on save
//!
//! Callers depend on the [`MessageStore`] and [`ProfileStore`] capabilities;
//! [`SqliteStore`] implements both.

mod conversations;
mod profiles;
mod sqlite;

use async_trait::async_trait;

use crate::agent::ModelMessage;
use crate::error::Result;
use crate::profile::UserProfile;

pub use sqlite::{init_pool, migrations, SqlitePool, SqliteStore};

#[cfg(test)]
pub(crate) use sqlite::test_support;

/// Append-only per-user message log
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message to the end of the user's log
    async fn append(&self, user_id: i64, message: &ModelMessage) -> Result<()>;

    /// Append messages in order
    async fn append_all(&self, user_id: i64, messages: &[ModelMessage]) -> Result<()> {
        for message in messages {
            self.append(user_id, message).await?;
        }
        Ok(())
    }

    /// The user's full log, oldest first
    async fn read_all(&self, user_id: i64) -> Result<Vec<ModelMessage>>;

    /// The last `limit` messages of the user's log, oldest first
    async fn read_recent(&self, user_id: i64, limit: usize) -> Result<Vec<ModelMessage>>;
}

/// One profile record per user
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the user's profile, if one was ever saved
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Store `profile` as the user's profile, replacing any previous record
    async fn replace_profile(&self, user_id: i64, profile: &UserProfile) -> Result<()>;
}
