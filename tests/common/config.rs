//! Test configuration helpers for mock servers and .env credentials

use std::time::Duration;
use timeline_dl::{Config, Credentials, StaticSession, SubjectId};

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Config pointing every endpoint at `base_uri` with millisecond-scale delays
pub fn mock_server_config(base_uri: &str) -> Config {
    let mut config = Config::default();
    config.api.timeline_endpoint = format!("{base_uri}/i/api/graphql/test/UserTweets");
    config.api.user_lookup_endpoint = format!("{base_uri}/i/api/graphql/test/UserByScreenName");
    config.api.request_timeout = Duration::from_secs(5);
    config.pagination.inter_page_delay = Duration::from_millis(1);
    config.pagination.inter_page_jitter = Duration::ZERO;
    config.pagination.error_page_delay = Duration::from_millis(1);
    config.retry.base_delay = Duration::from_millis(5);
    config.retry.max_jitter = Duration::ZERO;
    config.upload.endpoint = Some(format!("{base_uri}/api/upload"));
    config
}

/// Session with fixed test tokens for subject `42`
pub fn test_session() -> StaticSession {
    StaticSession::new(Credentials::new("test-bearer", "test-csrf"))
        .with_subject(SubjectId::new("42").expect("static subject id"))
}

/// Load a live session from environment variables
///
/// Required environment variables:
/// - `TIMELINE_BEARER` - Bearer token of the web client
/// - `TIMELINE_CSRF_TOKEN` - `ct0` anti-forgery token of the logged-in session
/// - `TIMELINE_COOKIE` - Full cookie header of the logged-in session
///
/// One of:
/// - `TIMELINE_SUBJECT_ID` - Numeric id of the account to collect
/// - `TIMELINE_HANDLE` - Handle of the account to collect
pub fn load_live_session() -> Result<StaticSession, ConfigError> {
    dotenvy::dotenv().ok();

    let bearer = std::env::var("TIMELINE_BEARER")
        .map_err(|_| ConfigError("TIMELINE_BEARER not set in environment".to_string()))?;
    let csrf = std::env::var("TIMELINE_CSRF_TOKEN")
        .map_err(|_| ConfigError("TIMELINE_CSRF_TOKEN not set in environment".to_string()))?;
    let cookie = std::env::var("TIMELINE_COOKIE")
        .map_err(|_| ConfigError("TIMELINE_COOKIE not set in environment".to_string()))?;

    let mut session = StaticSession::new(Credentials::new(bearer, csrf).with_cookie(cookie));
    if let Some(subject) = std::env::var("TIMELINE_SUBJECT_ID")
        .ok()
        .and_then(SubjectId::new)
    {
        session = session.with_subject(subject);
    }
    if let Ok(handle) = std::env::var("TIMELINE_HANDLE") {
        session = session.with_handle(handle);
    }
    Ok(session)
}

/// Check if live test credentials are available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("TIMELINE_BEARER").is_ok()
        && std::env::var("TIMELINE_CSRF_TOKEN").is_ok()
        && std::env::var("TIMELINE_COOKIE").is_ok()
        && (std::env::var("TIMELINE_SUBJECT_ID").is_ok() || std::env::var("TIMELINE_HANDLE").is_ok())
}

/// Skip test if credentials are not available
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: TIMELINE_* credentials not found in .env");
            return;
        }
    };
}
