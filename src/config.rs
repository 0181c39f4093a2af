//! Configuration types for batch-uploader

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote processing service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// URL the multipart batch is POSTed to (default: "http://127.0.0.1:8000/process")
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Timeout for the whole request, including reading the response body (default: 300s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every submission
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Batch-level constraints enforced before anything reaches the network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of files in one selection (default: 5)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-file size limit in bytes (None = left to the remote service)
    #[serde(default)]
    pub max_file_bytes: Option<u64>,

    /// Accepted media types, e.g. "image/png" (empty = left to the remote service)
    #[serde(default)]
    pub allowed_media_types: Vec<String>,

    /// How two files that normalize to the same name are handled
    #[serde(default)]
    pub name_collision: NameCollision,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: None,
            allowed_media_types: Vec::new(),
            name_collision: NameCollision::default(),
        }
    }
}

/// Where returned archives are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory archives are saved into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Filename for archives returned in local mode (default: "processed_images.zip")
    #[serde(default = "default_archive_filename")]
    pub archive_filename: String,

    /// What to do when the archive filename already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            archive_filename: default_archive_filename(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Main configuration for [`Uploader`](crate::Uploader)
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote processing service
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Selection constraints
    #[serde(default)]
    pub batch: BatchConfig,

    /// Archive output
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Check the configuration for values that can never work
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint.url).map_err(|e| Error::Config {
            message: format!("invalid endpoint URL '{}': {}", self.endpoint.url, e),
            key: Some("endpoint.url".to_string()),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported endpoint scheme '{}'", url.scheme()),
                key: Some("endpoint.url".to_string()),
            });
        }

        if self.endpoint.timeout.is_zero() {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("endpoint.timeout".to_string()),
            });
        }

        if self.batch.max_files == 0 {
            return Err(Error::Config {
                message: "max_files must allow at least one file".to_string(),
                key: Some("batch.max_files".to_string()),
            });
        }

        if let Err(e) = crate::validation::check_name(&self.output.archive_filename) {
            return Err(Error::Config {
                message: format!("invalid archive filename: {}", e),
                key: Some("output.archive_filename".to_string()),
            });
        }
        // "." and ".." name a directory once joined onto download_dir
        if matches!(self.output.archive_filename.trim(), "." | "..") {
            return Err(Error::Config {
                message: format!(
                    "invalid archive filename: '{}' is not a file name",
                    self.output.archive_filename
                ),
                key: Some("output.archive_filename".to_string()),
            });
        }

        Ok(())
    }
}

/// Handling of two files whose names normalize to the same canonical name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCollision {
    /// Append _1, _2, etc. to the base name (default)
    #[default]
    Rename,
    /// Send the duplicate names as they are; the service keeps the last one
    Keep,
}

/// File collision handling strategy for saved archives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Fail the save, keep existing
    Skip,
}

fn default_endpoint_url() -> String {
    "http://127.0.0.1:8000/process".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_user_agent() -> String {
    format!("batch-uploader/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_files() -> usize {
    5
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_archive_filename() -> String {
    "processed_images.zip".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
