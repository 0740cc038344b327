//! Conversation log storage

use async_trait::async_trait;
use tracing::{debug, warn};

use super::sqlite::SqliteStore;
use super::MessageStore;
use crate::agent::ModelMessage;
use crate::error::Result;

/// Decode stored rows, skipping any that no longer parse
fn decode_rows(user_id: i64, rows: Vec<(i64, String)>) -> Vec<ModelMessage> {
    rows.into_iter()
        .filter_map(|(id, content)| match serde_json::from_str(&content) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping undecodable message {} for user {}: {}", id, user_id, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, user_id: i64, message: &ModelMessage) -> Result<()> {
        let content = serde_json::to_string(message)?;

        sqlx::query("INSERT INTO conversations (user_id, role, content) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(message.role())
            .bind(content)
            .execute(&self.pool)
            .await?;

        debug!("Saved {} for user {}", message.role(), user_id);
        Ok(())
    }

    async fn append_all(&self, user_id: i64, messages: &[ModelMessage]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for message in messages {
            let content = serde_json::to_string(message)?;
            sqlx::query("INSERT INTO conversations (user_id, role, content) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(message.role())
                .bind(content)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Saved {} messages for user {}", messages.len(), user_id);
        Ok(())
    }

    async fn read_all(&self, user_id: i64) -> Result<Vec<ModelMessage>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, content FROM conversations WHERE user_id = ? ORDER BY id ASC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(decode_rows(user_id, rows))
    }

    async fn read_recent(&self, user_id: i64, limit: usize) -> Result<Vec<ModelMessage>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, content FROM (
                SELECT id, content FROM conversations
                WHERE user_id = ?
                ORDER BY id DESC
                LIMIT ?
            ) ORDER BY id ASC
        "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(user_id, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ModelRequest, ModelResponse};
    use crate::database::test_support::temp_store;

    fn exchange(i: usize) -> Vec<ModelMessage> {
        vec![
            ModelMessage::from(ModelRequest::user(format!("q{}", i))),
            ModelMessage::from(ModelResponse::from_text(format!("a{}", i))),
        ]
    }

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let (store, _dir) = temp_store().await;

        let mut written = Vec::new();
        for i in 0..3 {
            let messages = exchange(i);
            store.append_all(42, &messages).await.unwrap();
            written.extend(messages);
        }

        let log = store.read_all(42).await.unwrap();
        assert_eq!(log, written);
        assert!(matches!(&log[5], ModelMessage::Response(r) if r.text() == "a2"));
    }

    #[tokio::test]
    async fn test_logs_are_per_user() {
        let (store, _dir) = temp_store().await;
        store.append_all(1, &exchange(0)).await.unwrap();
        store
            .append(2, &ModelMessage::from(ModelRequest::user("other")))
            .await
            .unwrap();

        assert_eq!(store.read_all(1).await.unwrap().len(), 2);
        assert_eq!(
            store.read_all(2).await.unwrap(),
            vec![ModelMessage::from(ModelRequest::user("other"))]
        );
        assert!(store.read_all(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_recent_returns_tail_oldest_first() {
        let (store, _dir) = temp_store().await;
        for i in 0..5 {
            store.append_all(7, &exchange(i)).await.unwrap();
        }

        let recent = store.read_recent(7, 3).await.unwrap();
        let all = store.read_all(7).await.unwrap();
        assert_eq!(recent, all[7..].to_vec());
    }

    #[tokio::test]
    async fn test_role_column_matches_message_kind() {
        let (store, _dir) = temp_store().await;
        store.append_all(9, &exchange(0)).await.unwrap();

        let roles: Vec<(String,)> =
            sqlx::query_as("SELECT role FROM conversations WHERE user_id = 9 ORDER BY id")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(roles, vec![("request".to_string(),), ("response".to_string(),)]);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_skipped() {
        let (store, _dir) = temp_store().await;
        sqlx::query("INSERT INTO conversations (user_id, role, content) VALUES (5, 'request', 'not json')")
            .execute(store.pool())
            .await
            .unwrap();
        store.append_all(5, &exchange(0)).await.unwrap();

        assert_eq!(store.read_all(5).await.unwrap().len(), 2);
    }
}
