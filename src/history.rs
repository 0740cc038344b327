//! Per-user conversation log

use std::sync::Arc;
use tracing::debug;

use crate::agent::ModelMessage;
use crate::database::MessageStore;
use crate::error::Result;

/// Reads and appends a user's message log
#[derive(Clone)]
pub struct HistoryManager {
    store: Arc<dyn MessageStore>,
}

impl HistoryManager {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        HistoryManager { store }
    }

    /// Everything the user and the agent exchanged, oldest first
    pub async fn get_history(&self, user_id: i64) -> Result<Vec<ModelMessage>> {
        let history = self.store.read_all(user_id).await?;
        debug!("Loaded {} messages for user {}", history.len(), user_id);
        Ok(history)
    }

    /// The last `limit` messages, oldest first
    pub async fn get_recent(&self, user_id: i64, limit: usize) -> Result<Vec<ModelMessage>> {
        self.store.read_recent(user_id, limit).await
    }

    /// Append the messages of one turn in order
    pub async fn save_turn(&self, user_id: i64, messages: &[ModelMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        self.store.append_all(user_id, messages).await?;
        debug!("Appended {} messages for user {}", messages.len(), user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ModelRequest, ModelResponse};
    use crate::database::test_support::temp_store;

    fn turn(question: &str, answer: &str) -> Vec<ModelMessage> {
        vec![
            ModelRequest::user(question).into(),
            ModelResponse::from_text(answer).into(),
        ]
    }

    #[tokio::test]
    async fn test_turns_accumulate_per_user() {
        let (store, _dir) = temp_store().await;
        let history = HistoryManager::new(Arc::new(store));

        let first = turn("hi", "hello");
        let second = turn("how are you", "fine");
        history.save_turn(1, &first).await.unwrap();
        history.save_turn(1, &second).await.unwrap();
        history.save_turn(2, &turn("other", "user")).await.unwrap();

        let log = history.get_history(1).await.unwrap();
        assert_eq!(log, [first, second.clone()].concat());
        assert_eq!(history.get_recent(1, 2).await.unwrap(), second);
        assert_eq!(history.get_history(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_turn_is_noop() {
        let (store, _dir) = temp_store().await;
        let history = HistoryManager::new(Arc::new(store));
        history.save_turn(1, &[]).await.unwrap();
        assert!(history.get_history(1).await.unwrap().is_empty());
    }
}
