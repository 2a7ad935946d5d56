//! HTTP transport for the remote API
//!
//! The transport executes exactly one GET per call and passes the status code
//! through untouched. Retry decisions belong to the harvester, not this layer.

use crate::config::ApiConfig;
use crate::error::{Error, Result, TransportError};
use crate::request::RequestSpec;
use crate::types::Credentials;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Raw status and body of one response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl RawResponse {
    /// Build a response from parts
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request against the remote API
///
/// Implementations must attach the session credentials and the browser-like
/// header set to every request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` with `credentials`; non-2xx statuses are returned, not raised
    async fn send(
        &self,
        request: &RequestSpec,
        credentials: &Credentials,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Production [`Transport`] backed by a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    static_headers: HeaderMap,
}

impl HttpTransport {
    /// Create a transport from API settings
    ///
    /// # Errors
    /// Returns error if a configured header value is not valid ASCII or the
    /// HTTP client cannot be built
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .user_agent(api.user_agent.as_str())
            .build()?;

        let mut static_headers = HeaderMap::new();
        for (name, value) in [
            ("accept", "*/*"),
            ("accept-language", api.accept_language.as_str()),
            ("content-type", "application/json"),
            ("x-twitter-active-user", "yes"),
            ("x-twitter-auth-type", "OAuth2Session"),
            ("x-twitter-client-language", "en"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("referer", api.referer.as_str()),
        ] {
            let value = HeaderValue::from_str(value).map_err(|e| Error::Config {
                message: format!("invalid value for header {name}: {e}"),
                key: Some("api".to_string()),
            })?;
            static_headers.insert(HeaderName::from_static(name), value);
        }

        Ok(Self {
            client,
            static_headers,
        })
    }

    fn session_headers(
        credentials: &Credentials,
    ) -> std::result::Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        let invalid =
            |what: &str| TransportError::InvalidRequest(format!("{what} is not a valid header value"));

        headers.insert(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", credentials.bearer))
                .map_err(|_| invalid("bearer token"))?,
        );
        headers.insert(
            HeaderName::from_static("x-csrf-token"),
            HeaderValue::from_str(&credentials.csrf_token).map_err(|_| invalid("csrf token"))?,
        );
        if let Some(cookie) = &credentials.cookie {
            headers.insert(
                reqwest::header::COOKIE,
                HeaderValue::from_str(cookie).map_err(|_| invalid("cookie"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RequestSpec,
        credentials: &Credentials,
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(&request.endpoint)
            .query(&request.query)
            .headers(self.static_headers.clone())
            .headers(Self::session_headers(credentials)?)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        tracing::trace!(status, bytes = body.len(), endpoint = %request.endpoint, "response received");
        Ok(RawResponse { status, body })
    }
}
