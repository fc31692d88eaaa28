//! Local storage for transcripts
//!
//! Saves finished transcripts to the user's Documents folder, or a
//! custom location if configured in preferences.

use crate::preferences;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Get the transcripts directory
///
/// Returns the custom location from preferences if set, otherwise the
/// default location in Documents.
pub fn transcripts_dir() -> Option<PathBuf> {
    preferences::get_transcript_location().or_else(preferences::default_transcript_location)
}

/// Save a transcript to a timestamped file in the transcripts directory
///
/// Returns the path to the saved file
pub fn save_transcript(transcript: &str) -> Result<PathBuf, StorageError> {
    let dir = transcripts_dir().ok_or(StorageError::NoDocumentsDir)?;
    save_transcript_in(&dir, transcript)
}

/// Save a transcript into a specific directory
pub fn save_transcript_in(dir: &Path, transcript: &str) -> Result<PathBuf, StorageError> {
    if transcript.trim().is_empty() {
        return Err(StorageError::EmptyTranscript);
    }

    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;
        info!("Created transcripts directory: {:?}", dir);
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let filename = format!("transcript-{}.txt", timestamp);
    let filepath = dir.join(&filename);

    let mut file = fs::File::create(&filepath).map_err(|e| StorageError::CreateFile {
        path: filepath.clone(),
        source: e,
    })?;

    file.write_all(transcript.as_bytes())
        .map_err(|e| StorageError::WriteFile {
            path: filepath.clone(),
            source: e,
        })?;

    file.flush().map_err(|e| StorageError::WriteFile {
        path: filepath.clone(),
        source: e,
    })?;

    info!("Saved transcript to: {:?}", filepath);
    Ok(filepath)
}

/// Storage errors with contextual information
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Could not find Documents directory")]
    NoDocumentsDir,

    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_transcript_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();

        let path = save_transcript_in(dir.path(), "hello world\n").unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("transcript-"));
        assert!(name.ends_with(".txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world\n");
    }

    #[test]
    fn test_save_transcript_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("transcripts");

        let path = save_transcript_in(&nested, "text").unwrap();
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn test_empty_transcript_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let result = save_transcript_in(dir.path(), "   \n");
        assert!(matches!(result, Err(StorageError::EmptyTranscript)));
    }
}
