//! # timeline-dl
//!
//! Rate-limit aware collection of a subject's post stream from a cursor-paginated
//! GraphQL timeline API.
//!
//! ## Design Philosophy
//!
//! timeline-dl is designed to be:
//! - **Sequential and throttled** - Pages are fetched one at a time with a proactive inter-page delay
//! - **Degrading, not failing** - Rate limits, network errors and schema drift end a run with a partial result
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use timeline_dl::{Config, Credentials, Harvester, StaticSession, SubjectId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = StaticSession::new(Credentials::new("bearer-token", "csrf-token"));
//!     let harvester = Harvester::with_http(Config::default(), Arc::new(session))?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let subject = SubjectId::new("1663994484529717249").ok_or("empty subject")?;
//!     let report = harvester.fetch_all(&subject, 200).await?.truncated(200);
//!     println!("collected {} items ({})", report.items.len(), report.stop_reason);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Deduplication and ordering
pub mod dedup;
/// Error types
pub mod error;
/// Export payload and upload delivery
pub mod export;
/// Collection driver (decomposed into focused submodules)
pub mod harvester;
/// Host integration seam
pub mod host;
/// Timeline response parsing
pub mod parser;
/// Request construction
pub mod request;
/// Backoff policy with exponential delay and jitter
pub mod retry;
/// HTTP transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ParseError, Result, TransportError, UploadError};
pub use export::{HttpUploader, Payload, UploadReceipt, Uploader};
pub use harvester::{HarvestOutcome, Harvester};
pub use host::{HostSession, StaticSession};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    Credentials, Cursor, Event, HarvestReport, ItemRecord, PageResult, StopReason, SubjectId,
};

/// Cancel `token` when the process receives a termination signal.
///
/// Spawns a task that waits for the signal; a run given the token returns its
/// partial result with [`StopReason::Cancelled`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use timeline_dl::{CancellationToken, Config, Credentials, Harvester, StaticSession, SubjectId, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let session = StaticSession::new(Credentials::new("bearer-token", "csrf-token"));
///     let harvester = Harvester::with_http(Config::default(), Arc::new(session))?;
///     let token = CancellationToken::new();
///     cancel_on_signal(token.clone());
///
///     let subject = SubjectId::new("42").ok_or("empty subject")?;
///     let report = harvester.fetch_all_with_cancel(&subject, 1000, token).await?;
///     println!("stopped: {}", report.stop_reason);
///     Ok(())
/// }
/// ```
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal, cancelling collection");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C), cancelling collection");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C), cancelling collection");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal, cancelling collection");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal, cancelling collection");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_on_signal_task_ends_when_token_is_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone());
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("signal task should exit")
            .unwrap();
    }
}
