use crate::humanize::ByteSize;
use crate::request::PixelFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
}

/// Worker pool and retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Hunters allowed to run at once
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Extra attempts after a transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay, doubled on every further attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Capacity of the dispatcher's message channel
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            channel_size: default_channel_size(),
        }
    }
}

fn default_workers() -> usize {
    3
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_channel_size() -> usize {
    256
}

/// In-memory result cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Total decoded pixel bytes kept; `0` disables the cache
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: ByteSize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_bytes: default_memory_bytes(),
        }
    }
}

fn default_memory_bytes() -> ByteSize {
    ByteSize::mib(64)
}

/// Decoder budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    #[serde(default = "default_max_alloc")]
    pub max_alloc: ByteSize,
    /// Applied when a request has no pixel format of its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<PixelFormat>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_alloc: default_max_alloc(),
            pixel_format: None,
        }
    }
}

fn default_max_alloc() -> ByteSize {
    ByteSize::mib(512)
}

/// HTTP client settings for the network handler
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("snapfetch/{}", env!("CARGO_PKG_VERSION"))
}

/// Roots and tier bounds for the built-in handlers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlersConfig {
    /// Root for `asset:///` URIs
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    /// Media store root for `gallery://` URIs
    #[serde(default = "default_gallery_root")]
    pub gallery_root: PathBuf,
    #[serde(default = "default_micro_max")]
    pub micro_max: [u32; 2],
    #[serde(default = "default_mini_max")]
    pub mini_max: [u32; 2],
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            gallery_root: default_gallery_root(),
            micro_max: default_micro_max(),
            mini_max: default_mini_max(),
        }
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_gallery_root() -> PathBuf {
    PathBuf::from("gallery")
}

fn default_micro_max() -> [u32; 2] {
    [96, 96]
}

fn default_mini_max() -> [u32; 2] {
    [512, 384]
}
