//! Configuration types for timeline-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Remote API endpoints and the browser-like identity sent with every request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Posts-by-subject GraphQL operation URL
    #[serde(default = "default_timeline_endpoint")]
    pub timeline_endpoint: String,

    /// Handle-to-subject lookup GraphQL operation URL
    #[serde(default = "default_user_lookup_endpoint")]
    pub user_lookup_endpoint: String,

    /// User-Agent header value (the API rejects non-browser agents)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header value
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Referer header value
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_millis")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeline_endpoint: default_timeline_endpoint(),
            user_lookup_endpoint: default_user_lookup_endpoint(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            referer: default_referer(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Fetch loop limits and proactive throttling
///
/// The ceilings here are stop conditions, not errors: crossing one ends the run
/// with whatever has been collected so far.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Items requested per call, independent of the overall target (default: 40)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard ceiling on pages issued per run (default: 150)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Stop after this many consecutive pages without items (default: 15)
    #[serde(default = "default_max_consecutive_empty_pages")]
    pub max_consecutive_empty_pages: u32,

    /// Stop after this many consecutive failed pages (default: 10)
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Fixed pause between successful pages (default: 1 second)
    #[serde(default = "default_inter_page_delay", with = "duration_millis")]
    pub inter_page_delay: Duration,

    /// Upper bound of the random jitter added to `inter_page_delay` (default: 500ms)
    #[serde(default = "default_inter_page_jitter", with = "duration_millis")]
    pub inter_page_jitter: Duration,

    /// Pause after a failed page before moving on (default: 2 seconds)
    #[serde(default = "default_error_page_delay", with = "duration_millis")]
    pub error_page_delay: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_consecutive_empty_pages: default_max_consecutive_empty_pages(),
            max_consecutive_errors: default_max_consecutive_errors(),
            inter_page_delay: default_inter_page_delay(),
            inter_page_jitter: default_inter_page_jitter(),
            error_page_delay: default_error_page_delay(),
        }
    }
}

/// Backoff configuration for rate-limited and network failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry ceiling for HTTP 429 responses (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_rate_limit_retries: u32,

    /// Retry ceiling for connection failures and timeouts (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_network_retries: u32,

    /// Base delay, doubled on every attempt (default: 2 seconds)
    #[serde(default = "default_base_delay", with = "duration_millis")]
    pub base_delay: Duration,

    /// Upper bound of the uniform jitter added to each delay (default: 1 second)
    #[serde(default = "default_max_jitter", with = "duration_millis")]
    pub max_jitter: Duration,

    /// Cap on the exponential part of the delay (default: 5 minutes)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: default_max_retries(),
            max_network_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_jitter: default_max_jitter(),
            max_delay: default_max_delay(),
        }
    }
}

/// Export delivery settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Storage API endpoint used by [`crate::export::HttpUploader`]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Upload request timeout (default: 60 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_millis")]
    pub timeout: Duration,

    /// Content type announced for the payload
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: default_upload_timeout(),
            content_type: default_content_type(),
        }
    }
}

/// Main configuration for [`crate::Harvester`]
///
/// Every field has a default, so `Config::default()` works out of the box and a
/// JSON file only needs the keys it wants to change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API endpoints and request identity
    #[serde(default)]
    pub api: ApiConfig,

    /// Fetch loop ceilings and throttling
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Failure backoff policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Export delivery
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the fetch loop meaningless
    pub fn validate(&self) -> Result<()> {
        let p = &self.pagination;
        if p.page_size == 0 {
            return Err(invalid("page size must be positive", "pagination.page_size"));
        }
        if p.max_pages == 0 {
            return Err(invalid("page ceiling must be positive", "pagination.max_pages"));
        }
        if p.max_consecutive_empty_pages == 0 {
            return Err(invalid(
                "empty-page ceiling must be positive",
                "pagination.max_consecutive_empty_pages",
            ));
        }
        if p.max_consecutive_errors == 0 {
            return Err(invalid(
                "error ceiling must be positive",
                "pagination.max_consecutive_errors",
            ));
        }
        for (key, endpoint) in [
            ("api.timeline_endpoint", &self.api.timeline_endpoint),
            ("api.user_lookup_endpoint", &self.api.user_lookup_endpoint),
        ] {
            url::Url::parse(endpoint)
                .map_err(|e| invalid(&format!("invalid endpoint URL: {e}"), key))?;
        }
        if let Some(endpoint) = &self.upload.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| invalid(&format!("invalid upload URL: {e}"), "upload.endpoint"))?;
        }
        Ok(())
    }
}

fn invalid(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_timeline_endpoint() -> String {
    "https://x.com/i/api/graphql/p8aXzC3mi1Zjdv4H1E0O1Q/UserTweets".to_string()
}

fn default_user_lookup_endpoint() -> String {
    "https://x.com/i/api/graphql/IHyLL37gkgw1TgIXAL6Wlw/UserByScreenName".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/138.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_referer() -> String {
    "https://x.com/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_page_size() -> u32 {
    40
}

fn default_max_pages() -> u32 {
    150
}

fn default_max_consecutive_empty_pages() -> u32 {
    15
}

fn default_max_consecutive_errors() -> u32 {
    10
}

fn default_inter_page_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_inter_page_jitter() -> Duration {
    Duration::from_millis(500)
}

fn default_error_page_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_content_type() -> String {
    "application/json".to_string()
}

// Durations are stored as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
