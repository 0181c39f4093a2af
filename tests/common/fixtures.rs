//! Test fixtures: on-disk sample files and uploader configuration

use batch_uploader::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimal PNG signature, enough for a file that looks like an image
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Archive body returned by the mock service in local mode
pub const ZIP_BYTES: &[u8] = b"PK\x03\x04\x14\0\0\0\x08\0";

/// Write sample files named as a user would select them, return their paths
pub fn write_sample_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, PNG_BYTES).unwrap();
            path
        })
        .collect()
}

/// Configuration pointing at `server_uri`, saving archives under `dir/downloads`
pub fn test_config(server_uri: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.endpoint.url = format!("{}/process", server_uri);
    config.endpoint.timeout = Duration::from_secs(5);
    config.output.download_dir = dir.join("downloads");
    config
}
