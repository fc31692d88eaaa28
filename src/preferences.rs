//! User preferences storage
//!
//! Handles saving and loading user preferences to a JSON file
//! in the platform config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// User preferences
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Custom photo storage location (None = use default)
    pub photo_location: Option<PathBuf>,
    /// Custom transcript storage location (None = use default)
    pub transcript_location: Option<PathBuf>,
    /// Language tag for transcription (e.g., "ja", "en")
    pub language_code: Option<String>,
}

/// Get the preferences file path
fn preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Camscribe").join("preferences.json"))
}

/// Load preferences from disk
///
/// Returns default preferences if the file doesn't exist or can't be read
pub fn load_preferences() -> Preferences {
    let Some(path) = preferences_path() else {
        return Preferences::default();
    };

    if !path.exists() {
        return Preferences::default();
    }

    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("Failed to parse preferences: {}", e);
                Preferences::default()
            }
        },
        Err(e) => {
            error!("Failed to read preferences file: {}", e);
            Preferences::default()
        }
    }
}

/// Save preferences to disk
pub fn save_preferences(prefs: &Preferences) -> Result<(), PreferencesError> {
    let path = preferences_path().ok_or(PreferencesError::NoConfigDir)?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            info!("Created preferences directory: {:?}", parent);
        }
    }

    let json = serde_json::to_string_pretty(prefs)?;
    fs::write(&path, json)?;
    info!("Saved preferences to: {:?}", path);

    Ok(())
}

/// Get the custom photo location, if set
pub fn get_photo_location() -> Option<PathBuf> {
    load_preferences().photo_location
}

/// Get the default photo location
pub fn default_photo_location() -> Option<PathBuf> {
    dirs::picture_dir()
        .or_else(dirs::document_dir)
        .map(|d| d.join("Camscribe"))
}

/// Get the custom transcript location, if set
pub fn get_transcript_location() -> Option<PathBuf> {
    load_preferences().transcript_location
}

/// Get the default transcript location
pub fn default_transcript_location() -> Option<PathBuf> {
    dirs::document_dir().map(|d| d.join("Camscribe").join("transcripts"))
}

/// Get the language tag for transcription, if the user set one
pub fn get_language_code() -> Option<String> {
    load_preferences().language_code
}

/// Set the language tag for transcription
pub fn set_language_code(code: &str) -> Result<(), PreferencesError> {
    let mut prefs = load_preferences();
    prefs.language_code = Some(code.to_string());
    save_preferences(&prefs)
}

/// Preferences errors
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
