//! Tools that let the agent update the user's profile
//!
//! Every tool builds a new profile value from the one in the
//! [`TurnContext`], saves it, and leaves the saved value in the context.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::tools::{parameters_for, parse_arguments, Tool, ToolRegistry, ToolResult, TurnContext};
use crate::error::Result;
use crate::profile::{ConfirmationMode, MediaQuality};

/// Register every profile tool
pub fn register_profile_tools(registry: &mut ToolRegistry) {
    registry.register(UpdateUserNote);
    registry.register(SetMovieQuality);
    registry.register(SetSeriesQuality);
    registry.register(SetReplyLanguage);
    registry.register(SetConfirmationMode);
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoteParams {
    /// Free-form note about the user's preferences or behavior
    pub note: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QualityParams {
    /// Preferred quality, either '4k' or '1080p'
    pub quality: MediaQuality,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LanguageParams {
    /// Human-readable language name to use for replies, e.g. 'Dutch'
    pub language: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfirmationParams {
    /// 'always' to confirm before requesting media, 'never' to request immediately
    pub mode: ConfirmationMode,
}

/// Adds an observation about the user
pub struct UpdateUserNote;

#[async_trait]
impl Tool for UpdateUserNote {
    fn name(&self) -> &str {
        "update_user_note"
    }

    fn description(&self) -> &str {
        "Add an observation about the user to their profile. Call this when you learn \
         something meaningful about the user's preferences, habits, or personality that \
         would help you serve them better in future conversations."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<NoteParams>()
    }

    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        let params: NoteParams = parse_arguments(&args)?;
        let updated = ctx.profile.with_note(params.note.as_str());
        ctx.replace_profile(updated).await?;

        info!("Added note to profile for user {}", ctx.user_id);
        Ok(ToolResult::success(format!("Noted: {}", params.note)))
    }
}

pub struct SetMovieQuality;

#[async_trait]
impl Tool for SetMovieQuality {
    fn name(&self) -> &str {
        "set_movie_quality"
    }

    fn description(&self) -> &str {
        "Store the user's preferred movie download quality. Once set, use this quality \
         for all future movie requests without asking again."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<QualityParams>()
    }

    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        let params: QualityParams = parse_arguments(&args)?;
        let updated = ctx.profile.with_movie_quality(params.quality);
        ctx.replace_profile(updated).await?;

        info!("Set movie quality to {} for user {}", params.quality, ctx.user_id);
        Ok(ToolResult::success(format!(
            "Got it! I'll request movies in {} from now on.",
            params.quality
        )))
    }
}

pub struct SetSeriesQuality;

#[async_trait]
impl Tool for SetSeriesQuality {
    fn name(&self) -> &str {
        "set_series_quality"
    }

    fn description(&self) -> &str {
        "Store the user's preferred TV series download quality. Once set, use this quality \
         for all future series requests without asking again."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<QualityParams>()
    }

    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        let params: QualityParams = parse_arguments(&args)?;
        let updated = ctx.profile.with_series_quality(params.quality);
        ctx.replace_profile(updated).await?;

        info!("Set series quality to {} for user {}", params.quality, ctx.user_id);
        Ok(ToolResult::success(format!(
            "Got it! I'll request series in {} from now on.",
            params.quality
        )))
    }
}

pub struct SetReplyLanguage;

#[async_trait]
impl Tool for SetReplyLanguage {
    fn name(&self) -> &str {
        "set_reply_language"
    }

    fn description(&self) -> &str {
        "Update the language used to reply to this user, e.g. when they say 'from now on \
         talk to me in Dutch'. Pass a language name such as 'Dutch' or 'French', not a code."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<LanguageParams>()
    }

    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        let params: LanguageParams = parse_arguments(&args)?;
        let language = params.language.trim();
        if language.is_empty() {
            return Ok(ToolResult::failure("language must not be empty"));
        }

        let updated = ctx.profile.with_reply_language(language);
        ctx.replace_profile(updated).await?;

        info!("Set reply language to {} for user {}", language, ctx.user_id);
        Ok(ToolResult::success(format!(
            "Understood! I'll reply in {} from now on.",
            language
        )))
    }
}

pub struct SetConfirmationMode;

#[async_trait]
impl Tool for SetConfirmationMode {
    fn name(&self) -> &str {
        "set_confirmation_mode"
    }

    fn description(&self) -> &str {
        "Toggle whether to confirm before requesting media. 'always' confirms first \
         (default), 'never' requests immediately without asking."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<ConfirmationParams>()
    }

    async fn execute(&self, ctx: &mut TurnContext, args: Value) -> Result<ToolResult> {
        let params: ConfirmationParams = parse_arguments(&args)?;
        let updated = ctx.profile.with_confirmation_mode(params.mode);
        ctx.replace_profile(updated).await?;

        info!("Set confirmation mode to {} for user {}", params.mode, ctx.user_id);
        let message = match params.mode {
            ConfirmationMode::Never => {
                "Got it! I'll request media immediately without asking for confirmation."
            }
            ConfirmationMode::Always => "Got it! I'll always confirm before requesting media.",
        };
        Ok(ToolResult::success(message))
    }
}
