//! Chat service
//!
//! Everything that happens between an inbound chat message and the reply,
//! independent of the chat platform: the whitelist check, profile
//! bootstrap, the agent turn and persisting the turn's messages.

use tracing::{debug, error, info, warn};

use crate::agent::{Agent, TurnContext};
use crate::error::Result;
use crate::history::HistoryManager;
use crate::profile::{ConfirmationMode, ProfileManager, UserProfile};

pub const REJECTION_MESSAGE: &str = "Sorry, you are not authorized to use this bot.";
pub const BUSY_MESSAGE: &str =
    "I'm getting too many requests right now. Please try again in a minute.";
pub const ERROR_MESSAGE: &str =
    "Sorry, something went wrong while handling your message. Please try again.";
pub const EMPTY_MESSAGE: &str = "I'm having trouble processing this request. Please try again.";

/// An inbound text message
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user_id: i64,
    pub text: String,
    /// Client locale, e.g. `nl` or `pt-br`
    pub language_code: Option<String>,
}

impl IncomingMessage {
    pub fn new(user_id: i64, text: impl Into<String>) -> Self {
        IncomingMessage {
            user_id,
            text: text.into(),
            language_code: None,
        }
    }

    pub fn with_language_code(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }
}

/// What to send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The agent's answer
    Answer(String),
    /// The user is not on the whitelist
    Rejected,
    /// The model kept rate limiting until the retry budget ran out
    Busy,
    /// Any other failure
    Failed,
}

impl Reply {
    /// Text shown to the user
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) => text,
            Reply::Rejected => REJECTION_MESSAGE,
            Reply::Busy => BUSY_MESSAGE,
            Reply::Failed => ERROR_MESSAGE,
        }
    }
}

/// Handles messages for every user
pub struct ChatService {
    allow_from: Vec<i64>,
    profiles: ProfileManager,
    history: HistoryManager,
    agent: Agent,
}

impl ChatService {
    pub fn new(
        allow_from: Vec<i64>,
        profiles: ProfileManager,
        history: HistoryManager,
        agent: Agent,
    ) -> Self {
        ChatService {
            allow_from,
            profiles,
            history,
            agent,
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allow_from.contains(&user_id)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Run one turn for `message` and decide what to reply
    ///
    /// A rejected user gets the rejection text and nothing is stored. On
    /// failure nothing of the turn is stored either.
    pub async fn handle_message(&self, message: &IncomingMessage) -> Reply {
        if !self.is_allowed(message.user_id) {
            info!("Rejected unauthorized user {}", message.user_id);
            return Reply::Rejected;
        }

        debug!("Authorized user {} sent a message", message.user_id);
        match self.run_turn(message).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Agent produced an empty answer for user {}", message.user_id);
                Reply::Answer(EMPTY_MESSAGE.to_string())
            }
            Ok(text) => Reply::Answer(text),
            Err(e) if e.is_retries_exhausted() => {
                warn!("Model busy for user {}: {}", message.user_id, e);
                Reply::Busy
            }
            Err(e) => {
                error!("Turn failed for user {}: {}", message.user_id, e);
                Reply::Failed
            }
        }
    }

    async fn run_turn(&self, message: &IncomingMessage) -> Result<String> {
        let profile = self
            .profiles
            .get(message.user_id, message.language_code.as_deref())
            .await?;
        let history = self.history.get_history(message.user_id).await?;

        let mut ctx = TurnContext::new(profile, self.profiles.clone());
        let output = self.agent.run(&mut ctx, &history, &message.text).await?;

        self.history
            .save_turn(message.user_id, &output.new_messages)
            .await?;
        Ok(output.text)
    }

    /// A readable summary of what is stored about the user
    pub async fn describe_profile(&self, user_id: i64, language_code: Option<&str>) -> Reply {
        if !self.is_allowed(user_id) {
            return Reply::Rejected;
        }
        match self.profiles.get(user_id, language_code).await {
            Ok(profile) => Reply::Answer(profile_summary(&profile)),
            Err(e) => {
                error!("Failed to load profile for user {}: {}", user_id, e);
                Reply::Failed
            }
        }
    }
}

/// Plain-text profile overview for the `/profile` command
pub fn profile_summary(profile: &UserProfile) -> String {
    let prefs = &profile.media_preferences;
    let quality = |q: Option<crate::profile::MediaQuality>| {
        q.map(|q| q.to_string()).unwrap_or_else(|| "ask each time".to_string())
    };

    let mut lines = vec![
        format!("Name: {}", profile.name.as_deref().unwrap_or("not set")),
        format!("Reply language: {}", profile.reply_language),
        format!("Movie quality: {}", quality(prefs.movie_quality)),
        format!("Series quality: {}", quality(prefs.series_quality)),
        format!(
            "Confirm before requesting: {}",
            match profile.confirmation_mode {
                ConfirmationMode::Always => "yes",
                ConfirmationMode::Never => "no",
            }
        ),
    ];
    if profile.notes.is_empty() {
        lines.push("Notes: none".to_string());
    } else {
        lines.push("Notes:".to_string());
        lines.extend(profile.notes.iter().map(|n| format!("- {}", n)));
    }
    lines.join("\n")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::agent::{
        ModelMessage, ModelResponse, ModelTransport, RequestParameters, ResponseStream,
        ToolRegistry,
    };
    use crate::config::AgentConfig;
    use crate::database::test_support::temp_store;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transport that replays canned responses in order
    pub struct Script(Mutex<VecDeque<Result<ModelResponse>>>);

    #[async_trait]
    impl ModelTransport for Script {
        fn model_name(&self) -> &str {
            "script"
        }

        async fn request(
            &self,
            _messages: &[ModelMessage],
            _params: &RequestParameters,
        ) -> Result<ModelResponse> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Internal("script exhausted".to_string())))
        }

        async fn request_stream(
            &self,
            _messages: &[ModelMessage],
            _params: &RequestParameters,
        ) -> Result<ResponseStream> {
            Err(Error::Internal("not used".to_string()))
        }
    }

    /// Service on a temporary database that allows user 100 only
    pub async fn service(
        responses: Vec<Result<ModelResponse>>,
    ) -> (ChatService, HistoryManager, ProfileManager, tempfile::TempDir) {
        let (store, dir) = temp_store().await;
        let store = Arc::new(store);
        let profiles = ProfileManager::new(store.clone());
        let history = HistoryManager::new(store);

        let mut tools = ToolRegistry::new();
        crate::agent::register_profile_tools(&mut tools);
        let transport = Arc::new(Script(Mutex::new(responses.into())));
        let agent = Agent::new(transport, tools, &AgentConfig::default()).unwrap();

        let service = ChatService::new(vec![100], profiles.clone(), history.clone(), agent);
        (service, history, profiles, dir)
    }
}
