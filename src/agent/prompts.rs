//! Prompt templates and engineering

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::profile::{ConfirmationMode, UserProfile};

/// Base instructions for the home server assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful home server assistant. \
You help the user manage their home server services including media, monitoring, and more. \
Always be concise and friendly. \
For destructive or irreversible actions, always ask for confirmation before proceeding.";

/// Per-user fragment appended to the base instructions
const PROFILE_TEMPLATE: &str = r#"{{base}}

{{#if name}}The user's name is {{name}}.{{else}}The user has not set a name.{{/if}} Media preferences: quality {{quality}}, language {{language}}, genres: {{genres}}, avoid: {{avoid}}.
{{#if movie_quality}}Request movies in {{movie_quality}} without asking.
{{/if}}{{#if series_quality}}Request series in {{series_quality}} without asking.
{{/if}}{{#if confirm}}Always confirm with the user before requesting media.{{else}}Request media immediately without asking for confirmation.{{/if}}
Always reply in {{reply_language}}.{{#if notes}}
Notes about this user: {{notes}}{{/if}}"#;

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

#[derive(Serialize)]
struct ProfileContext<'a> {
    base: &'a str,
    name: Option<&'a str>,
    quality: &'a str,
    language: &'a str,
    genres: String,
    avoid: String,
    movie_quality: Option<String>,
    series_quality: Option<String>,
    confirm: bool,
    reply_language: &'a str,
    notes: String,
}

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

/// Renders the system prompt for one user
pub struct SystemPrompt {
    base: String,
    template: PromptTemplate,
}

impl SystemPrompt {
    /// Build a renderer on top of `base` instructions
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Ok(SystemPrompt {
            base: base.into(),
            template: PromptTemplate::new("system", PROFILE_TEMPLATE)?,
        })
    }

    /// Base instructions followed by what is known about the user
    pub fn render(&self, profile: &UserProfile) -> Result<String> {
        let prefs = &profile.media_preferences;
        let context = ProfileContext {
            base: self.base.trim(),
            name: profile.name.as_deref(),
            quality: &prefs.preferred_quality,
            language: &prefs.preferred_language,
            genres: list_or(&prefs.preferred_genres, "none set"),
            avoid: list_or(&prefs.avoid_genres, "none"),
            movie_quality: prefs.movie_quality.map(|q| q.to_string()),
            series_quality: prefs.series_quality.map(|q| q.to_string()),
            confirm: profile.confirmation_mode == ConfirmationMode::Always,
            reply_language: &profile.reply_language,
            notes: profile.notes.join("; "),
        };

        self.template.render(&context)
    }
}
