//! Agent turn loop
//!
//! One turn: the user's text goes in, the model is called with a windowed
//! view of the conversation, requested tools run, and the loop repeats until
//! the model answers with text.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::history::window;
use super::prompts::SystemPrompt;
use super::tools::{ToolCall, ToolRegistry, ToolResult, TurnContext};
use super::transport::{ModelTransport, RequestParameters};
use super::types::{ModelMessage, ModelRequest, ModelResponse, RequestPart};
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::profile::UserProfile;

/// Outcome of one turn
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// Final text for the user
    pub text: String,
    /// Messages produced during the turn, oldest first, to be appended to the log
    pub new_messages: Vec<ModelMessage>,
    /// The user's profile as it stands after the turn
    pub profile: UserProfile,
}

/// Runs turns against a model transport with a fixed set of tools
pub struct Agent {
    transport: Arc<dyn ModelTransport>,
    tools: ToolRegistry,
    system_prompt: SystemPrompt,
    history_window: usize,
    max_iterations: u32,
}

impl Agent {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        tools: ToolRegistry,
        config: &AgentConfig,
    ) -> Result<Self> {
        Ok(Agent {
            transport,
            tools,
            system_prompt: SystemPrompt::new(config.system_prompt.as_str())?,
            history_window: config.history_window,
            max_iterations: config.max_iterations,
        })
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model_name(&self) -> &str {
        self.transport.model_name()
    }

    /// Run one turn for `user_text` on top of `history`.
    ///
    /// Every model call sees the last `history_window` pairs plus the
    /// in-flight part of this turn. Each requested tool is executed exactly
    /// once, after the model call that asked for it succeeded.
    pub async fn run(
        &self,
        ctx: &mut TurnContext,
        history: &[ModelMessage],
        user_text: &str,
    ) -> Result<TurnOutput> {
        let mut messages: Vec<ModelMessage> = history.to_vec();
        let turn_start = messages.len();
        messages.push(ModelRequest::user(user_text).into());

        let params = RequestParameters::with_tools(self.tools.definitions());

        for iteration in 1..=self.max_iterations {
            debug!(
                "Agent iteration {}/{} for user {}",
                iteration, self.max_iterations, ctx.user_id
            );

            let system = self.system_prompt.render(&ctx.profile)?;
            let context = with_system_prompt(window(&messages, self.history_window), &system);

            let response = self.transport.request(&context, &params).await?;
            let calls = collect_calls(&response);
            let text = response.text();
            messages.push(response.into());

            if calls.is_empty() {
                info!(
                    "Turn finished for user {} after {} model call(s)",
                    ctx.user_id, iteration
                );
                return Ok(TurnOutput {
                    text,
                    new_messages: messages.split_off(turn_start),
                    profile: ctx.profile.clone(),
                });
            }

            let mut returns = Vec::with_capacity(calls.len());
            for call in &calls {
                info!("Executing tool {} for user {}", call.name, ctx.user_id);
                let result = match self.tools.execute(ctx, call).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Tool {} failed: {}", call.name, e);
                        ToolResult::failure(e.to_string())
                    }
                };
                returns.push(RequestPart::ToolReturn {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content: result.to_string(),
                });
            }
            messages.push(ModelRequest::new(returns).into());
        }

        warn!(
            "Agent exceeded {} iterations for user {}",
            self.max_iterations, ctx.user_id
        );
        Err(Error::Agent("tool loop limit reached".to_string()))
    }
}

fn collect_calls(response: &ModelResponse) -> Vec<ToolCall> {
    response
        .tool_calls()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id.to_string(),
            name: call.name.to_string(),
            arguments: call.arguments.clone(),
        })
        .collect()
}

/// Replace any stored system prompts with `system` at the head of the
/// first request
fn with_system_prompt(mut messages: Vec<ModelMessage>, system: &str) -> Vec<ModelMessage> {
    for message in &mut messages {
        if let ModelMessage::Request(request) = message {
            request
                .parts
                .retain(|p| !matches!(p, RequestPart::SystemPrompt { .. }));
        }
    }

    let prompt = RequestPart::SystemPrompt {
        content: system.to_string(),
    };
    match messages.iter_mut().find_map(|m| match m {
        ModelMessage::Request(request) => Some(request),
        ModelMessage::Response(_) => None,
    }) {
        Some(first) => first.parts.insert(0, prompt),
        None => messages.insert(0, ModelRequest::new(vec![prompt]).into()),
    }
    messages
}
