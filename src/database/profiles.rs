//! User profile storage

use async_trait::async_trait;
use tracing::debug;

use super::sqlite::SqliteStore;
use super::ProfileStore;
use crate::error::Result;
use crate::profile::UserProfile;

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((data,)) => {
                let mut profile: UserProfile = serde_json::from_str(&data)?;
                profile.user_id = user_id;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn replace_profile(&self, user_id: i64, profile: &UserProfile) -> Result<()> {
        let data = serde_json::to_string(profile)?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, data) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET data = excluded.data
        "#,
        )
        .bind(user_id)
        .bind(data)
        .execute(&self.pool)
        .await?;

        debug!("Replaced profile for user {}", user_id);
        Ok(())
    }
}
