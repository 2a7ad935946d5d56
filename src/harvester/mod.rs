//! Collection driver split into focused submodules.
//!
//! The `Harvester` struct and its methods are organized by stage:
//! - [`page`] - One page request with rate-limit and network backoff
//! - [`pagination`] - The sequential, cursor-driven fetch loop
//! - [`lookup`] - Subject resolution through the host session
//! - [`delivery`] - Export and upload of a finished collection

mod delivery;
mod lookup;
mod page;
mod pagination;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use delivery::HarvestOutcome;
pub use lookup::LOOKUP_PAGE;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::host::HostSession;
use crate::request::RequestBuilder;
use crate::retry::{BackoffController, JitterSource, ThreadRngJitter};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Credentials, Event};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capacity of the event channel; slow subscribers lose the oldest events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Collection client (cloneable - all fields are Arc-wrapped or cheap)
///
/// Holds no per-run state; every [`fetch_all`](Harvester::fetch_all) call owns
/// its own cursor and counters, so independent runs can share one instance.
#[derive(Clone)]
pub struct Harvester {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// One-request-per-call transport
    pub(crate) transport: Arc<dyn Transport>,
    /// Source of the subject and the session credentials
    pub(crate) session: Arc<dyn HostSession>,
    /// Pure request construction
    pub(crate) requests: RequestBuilder,
    /// Failure backoff policy
    pub(crate) backoff: BackoffController,
    /// Jitter for the inter-page delay
    pub(crate) jitter: Arc<dyn JitterSource>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Harvester {
    /// Create a harvester over an arbitrary transport
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration fails validation
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        session: Arc<dyn HostSession>,
    ) -> Result<Self> {
        config.validate()?;

        let requests = RequestBuilder::new(
            config.api.timeline_endpoint.clone(),
            config.api.user_lookup_endpoint.clone(),
        );
        let jitter: Arc<dyn JitterSource> = Arc::new(ThreadRngJitter);
        let backoff = BackoffController::new(config.retry.clone(), jitter.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            transport,
            session,
            requests,
            backoff,
            jitter,
            event_tx,
        })
    }

    /// Create a harvester backed by [`HttpTransport`]
    pub fn with_http(config: Config, session: Arc<dyn HostSession>) -> Result<Self> {
        let transport = HttpTransport::new(&config.api)?;
        Self::new(config, Arc::new(transport), session)
    }

    /// Replace the jitter source for both backoff and inter-page delays
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.backoff = BackoffController::new(self.config.retry.clone(), jitter.clone());
        self.jitter = jitter;
        self
    }

    /// Subscribe to harvester events
    ///
    /// Multiple subscribers are supported; each receives every event sent after
    /// it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Read the session credentials once for a run
    pub(crate) async fn credentials(&self) -> Result<Credentials> {
        let credentials = self
            .session
            .session_credentials()
            .await
            .ok_or(Error::CredentialMissing("session credentials"))?;

        if credentials.bearer.trim().is_empty() {
            return Err(Error::CredentialMissing("bearer token"));
        }
        if credentials.csrf_token.trim().is_empty() {
            return Err(Error::CredentialMissing("anti-forgery token"));
        }

        // A token that cannot be a header value fails every request the same way
        if HeaderValue::from_str(&format!("Bearer {}", credentials.bearer)).is_err() {
            return Err(Error::CredentialMissing("bearer token is not a valid header value"));
        }
        if HeaderValue::from_str(&credentials.csrf_token).is_err() {
            return Err(Error::CredentialMissing(
                "anti-forgery token is not a valid header value",
            ));
        }
        if let Some(cookie) = &credentials.cookie
            && HeaderValue::from_str(cookie).is_err()
        {
            return Err(Error::CredentialMissing("cookie is not a valid header value"));
        }
        Ok(credentials)
    }
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Sleep for `duration` unless `cancel` fires first
///
/// Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
