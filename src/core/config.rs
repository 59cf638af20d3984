//! Configuration objects for the map view and its tile pipeline.
//!
//! Server credentials, cache root and timeouts are all explicit values
//! passed in at construction; nothing lives in process-wide state.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where tiles come from: URL template, subdomain shards and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileServerConfig {
    /// URL template with `{s}`, `{z}`, `{x}` and `{y}` placeholders
    pub url_template: String,
    /// Subdomain shards substituted for `{s}`; may be empty
    pub subdomains: Vec<String>,
    /// Optional access token appended as a `key` query parameter
    pub api_key: Option<String>,
    /// User-Agent header sent with every tile request
    pub user_agent: String,
    /// Per-request timeout in milliseconds
    pub fetch_timeout_ms: u64,
}

impl Default for TileServerConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            api_key: None,
            user_agent: concat!("tileview/", env!("CARGO_PKG_VERSION")).to_string(),
            fetch_timeout_ms: 15_000,
        }
    }
}

impl TileServerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Top-level map configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub server: TileServerConfig,
    /// Tile cache root directory; `None` disables disk caching
    pub cache_dir: Option<PathBuf>,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Decoded tiles kept in memory before the least recently used one
    /// is dropped
    pub memory_cache_tiles: usize,
    /// Capacity of the fetch result channel
    pub result_buffer: usize,
    /// How long a fetch task waits to hand over its outcome before
    /// discarding it, in milliseconds
    pub send_timeout_ms: u64,
    /// Marker hit-test radius in pixels
    pub marker_hit_radius: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            server: TileServerConfig::default(),
            cache_dir: Some(PathBuf::from("cache/tiles")),
            min_zoom: 0,
            max_zoom: 19,
            memory_cache_tiles: 512,
            result_buffer: 64,
            send_timeout_ms: 5_000,
            marker_hit_radius: 10.0,
        }
    }
}

impl MapConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Parses a configuration from JSON; omitted fields keep defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
