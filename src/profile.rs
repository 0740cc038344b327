//! User profiles
//!
//! One profile per Telegram user, created on first contact and replaced
//! wholesale on every change. Profiles are values: the `with_*` builders
//! return an updated copy and the caller saves it through
//! [`ProfileManager::save`], which returns the stored value.

use chrono::{DateTime, NaiveTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::database::ProfileStore;
use crate::error::Result;

/// Reply language used when nothing better is known
pub const DEFAULT_REPLY_LANGUAGE: &str = "English";

/// Download quality for media requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MediaQuality {
    #[serde(rename = "4k")]
    UltraHd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl std::fmt::Display for MediaQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaQuality::UltraHd => write!(f, "4k"),
            MediaQuality::FullHd => write!(f, "1080p"),
        }
    }
}

/// Whether the agent asks before requesting media
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    #[default]
    Always,
    Never,
}

impl std::fmt::Display for ConfirmationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationMode::Always => write!(f, "always"),
            ConfirmationMode::Never => write!(f, "never"),
        }
    }
}

/// Media consumption preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPreferences {
    #[serde(default)]
    pub preferred_genres: Vec<String>,
    #[serde(default = "default_quality")]
    pub preferred_quality: String,
    #[serde(default = "default_language")]
    pub preferred_language: String,
    #[serde(default)]
    pub avoid_genres: Vec<String>,
    /// Quality for movie requests, once the user picked one
    #[serde(default)]
    pub movie_quality: Option<MediaQuality>,
    /// Quality for series requests, once the user picked one
    #[serde(default)]
    pub series_quality: Option<MediaQuality>,
}

impl Default for MediaPreferences {
    fn default() -> Self {
        MediaPreferences {
            preferred_genres: Vec::new(),
            preferred_quality: default_quality(),
            preferred_language: default_language(),
            avoid_genres: Vec::new(),
            movie_quality: None,
            series_quality: None,
        }
    }
}

fn default_quality() -> String {
    "1080p".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub quiet_hours_start: Option<NaiveTime>,
    #[serde(default)]
    pub quiet_hours_end: Option<NaiveTime>,
    #[serde(default = "default_sources")]
    pub notifications_by_source: BTreeMap<String, bool>,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        NotificationPrefs {
            enabled: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            notifications_by_source: default_sources(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sources() -> BTreeMap<String, bool> {
    BTreeMap::from([
        ("media_requests".to_string(), true),
        ("system_alerts".to_string(), true),
    ])
}

/// Usage counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub requests_made: u64,
    #[serde(default)]
    pub downloads_completed: u64,
}

/// Everything the assistant remembers about one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub media_preferences: MediaPreferences,
    #[serde(default)]
    pub notification_prefs: NotificationPrefs,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub stats: ProfileStats,
    #[serde(default = "default_reply_language")]
    pub reply_language: String,
    #[serde(default)]
    pub confirmation_mode: ConfirmationMode,
}

fn default_reply_language() -> String {
    DEFAULT_REPLY_LANGUAGE.to_string()
}

impl UserProfile {
    /// A fresh profile with default settings
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        UserProfile {
            user_id,
            name: None,
            created_at: now,
            updated_at: now,
            media_preferences: MediaPreferences::default(),
            notification_prefs: NotificationPrefs::default(),
            notes: Vec::new(),
            stats: ProfileStats::default(),
            reply_language: default_reply_language(),
            confirmation_mode: ConfirmationMode::default(),
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        UserProfile {
            name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Copy with `note` appended to the notes
    pub fn with_note(&self, note: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.notes.push(note.into());
        next
    }

    pub fn with_movie_quality(&self, quality: MediaQuality) -> Self {
        let mut next = self.clone();
        next.media_preferences.movie_quality = Some(quality);
        next
    }

    pub fn with_series_quality(&self, quality: MediaQuality) -> Self {
        let mut next = self.clone();
        next.media_preferences.series_quality = Some(quality);
        next
    }

    pub fn with_reply_language(&self, language: impl Into<String>) -> Self {
        UserProfile {
            reply_language: language.into(),
            ..self.clone()
        }
    }

    pub fn with_confirmation_mode(&self, mode: ConfirmationMode) -> Self {
        UserProfile {
            confirmation_mode: mode,
            ..self.clone()
        }
    }
}

/// English name of the language behind a Telegram locale such as `nl` or
/// `pt-br`
pub fn language_name(code: &str) -> Option<&'static str> {
    let primary = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let name = match primary.as_str() {
        "ar" => "Arabic",
        "cs" => "Czech",
        "da" => "Danish",
        "de" => "German",
        "el" => "Greek",
        "en" => "English",
        "es" => "Spanish",
        "fi" => "Finnish",
        "fr" => "French",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "hu" => "Hungarian",
        "id" => "Indonesian",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "nb" | "nn" | "no" => "Norwegian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "pt" => "Portuguese",
        "ro" => "Romanian",
        "ru" => "Russian",
        "sv" => "Swedish",
        "th" => "Thai",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "vi" => "Vietnamese",
        "zh" => "Chinese",
        _ => return None,
    };
    Some(name)
}

/// Loads, creates and saves user profiles
#[derive(Clone)]
pub struct ProfileManager {
    store: Arc<dyn ProfileStore>,
}

impl ProfileManager {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        ProfileManager { store }
    }

    /// Load the user's profile, creating and saving a default one on first
    /// contact.
    ///
    /// `language_code` (the Telegram locale) only seeds the reply language of
    /// a new profile; an existing profile is never changed by it.
    pub async fn get(&self, user_id: i64, language_code: Option<&str>) -> Result<UserProfile> {
        if let Some(profile) = self.store.get_profile(user_id).await? {
            return Ok(profile);
        }

        info!("Creating default profile for user {}", user_id);
        let mut profile = UserProfile::new(user_id);
        if let Some(language) = language_code.and_then(language_name) {
            profile.reply_language = language.to_string();
        }
        self.save(&profile).await
    }

    /// Stamp `updated_at`, replace the stored record and return the stored
    /// value
    pub async fn save(&self, profile: &UserProfile) -> Result<UserProfile> {
        let saved = UserProfile {
            updated_at: Utc::now(),
            ..profile.clone()
        };
        self.store.replace_profile(saved.user_id, &saved).await?;
        info!("Saved profile for user {}", saved.user_id);
        Ok(saved)
    }
}
