//! Photo gallery
//!
//! The gallery is the photos directory on disk: saving a capture
//! renders it, deleting removes it. Saved photos are also copied to the
//! system clipboard so they can be pasted straight into other
//! applications.

use crate::camera::EncodedPhoto;
use crate::preferences;
use arboard::Clipboard;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Get the photos directory
///
/// Uses the custom location from preferences if set, otherwise the
/// default location under the user's pictures folder.
pub fn photos_dir() -> Option<PathBuf> {
    preferences::get_photo_location().or_else(preferences::default_photo_location)
}

/// Save a captured photo under a timestamped filename
///
/// Returns the path of the saved file.
pub fn save_photo(photo: &EncodedPhoto) -> Result<PathBuf, GalleryError> {
    let dir = photos_dir().ok_or(GalleryError::NoPhotosDir)?;
    let path = save_photo_in(&dir, photo)?;
    copy_to_clipboard(photo);
    Ok(path)
}

/// Save a captured photo into a specific directory
pub fn save_photo_in(dir: &Path, photo: &EncodedPhoto) -> Result<PathBuf, GalleryError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        info!("Created photos directory: {:?}", dir);
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let filename = format!("photo_{}.png", timestamp);
    let filepath = dir.join(&filename);

    fs::write(&filepath, &photo.png)?;
    info!(
        width = photo.width,
        height = photo.height,
        "Photo saved to: {:?}",
        filepath
    );

    Ok(filepath)
}

/// List saved photos, newest first
pub fn list_photos() -> Result<Vec<PathBuf>, GalleryError> {
    let dir = photos_dir().ok_or(GalleryError::NoPhotosDir)?;
    list_photos_in(&dir)
}

/// List the photos in a specific directory, newest first
pub fn list_photos_in(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut photos: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "png").unwrap_or(false))
        .collect();

    photos.sort();
    photos.reverse();
    Ok(photos)
}

/// Remove a saved photo by filename
///
/// Only bare filenames inside the photos directory are accepted.
pub fn delete_photo(name: &str) -> Result<(), GalleryError> {
    let dir = photos_dir().ok_or(GalleryError::NoPhotosDir)?;
    delete_photo_in(&dir, name)
}

/// Remove a photo from a specific directory
pub fn delete_photo_in(dir: &Path, name: &str) -> Result<(), GalleryError> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(GalleryError::InvalidName(name.to_string()));
    }

    let path = dir.join(name);
    if !path.exists() {
        return Err(GalleryError::NotFound(name.to_string()));
    }

    fs::remove_file(&path)?;
    info!("Deleted photo: {:?}", path);
    Ok(())
}

/// Copy a captured photo to the system clipboard
fn copy_to_clipboard(photo: &EncodedPhoto) {
    // Decode the PNG back to raw pixels for the clipboard
    let img = match image::load_from_memory(&photo.png) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            error!("Failed to decode photo for clipboard: {}", e);
            return;
        }
    };

    let (width, height) = img.dimensions();
    let image_data = arboard::ImageData {
        width: width as usize,
        height: height as usize,
        bytes: img.into_raw().into(),
    };

    match Clipboard::new() {
        Ok(mut clipboard) => match clipboard.set_image(image_data) {
            Ok(_) => info!("Photo copied to clipboard"),
            Err(e) => error!("Failed to copy photo to clipboard: {}", e),
        },
        Err(e) => error!("Failed to initialize clipboard: {}", e),
    }
}

/// Gallery errors
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("Could not determine photos directory")]
    NoPhotosDir,

    #[error("Invalid photo name: {0}")]
    InvalidName(String),

    #[error("No such photo: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
