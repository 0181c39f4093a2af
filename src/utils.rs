//! Utility functions for file output and media types

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename`, `archive.zip` becomes `archive (1).zip`, then `archive (2).zip`, and so on.
/// For `Skip`, an existing file is an [`std::io::ErrorKind::AlreadyExists`] error.
/// For `Overwrite`, the path is returned unchanged.
///
/// # Examples
///
/// ```
/// use batch_uploader::utils::get_unique_path;
/// use batch_uploader::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/processed_images.zip");
/// let unique = get_unique_path(path, FileCollisionAction::Overwrite).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("'{}' already exists", path.display()),
                )));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("cannot extract file stem from '{}'", path.display()),
                ))
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "could not find a unique name for '{}' after {} attempts",
                    path.display(),
                    MAX_RENAME_ATTEMPTS
                ),
            )))
        }
    }
}

/// Infer a media type from a file name's extension
///
/// Unknown or missing extensions map to `application/octet-stream`.
#[must_use]
pub fn media_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
