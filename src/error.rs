//! Error types for timeline-dl
//!
//! This module provides the error taxonomy for the collection pipeline:
//! - Transport failures (network, timeout, unexpected HTTP status)
//! - Parse failures (remote envelope drift, API-level errors)
//! - Upload failures (delivery of a finished payload)
//! - Fatal start-up failures (missing credentials or subject)
//!
//! Only the fatal start-up failures ever escape [`crate::Harvester::fetch_all`];
//! everything below the loop level is absorbed into the pagination stop conditions.

use crate::retry::FailureClass;
use thiserror::Error;

/// Result type alias for timeline-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for timeline-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pagination.page_size")
        key: Option<String>,
    },

    /// The host session could not supply a usable bearer or anti-forgery token
    #[error("session credentials missing: {0}")]
    CredentialMissing(&'static str),

    /// Neither a subject id nor a resolvable handle was available
    #[error("could not determine the subject to collect")]
    SubjectMissing,

    /// A single request failed at the transport level
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Delivering the export payload failed
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Retries for a rate-limited request were exhausted
    #[error("rate limited: retries exhausted")]
    RateLimited,

    /// A request was abandoned because the run was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// HTTP client construction or request building error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable error code
    ///
    /// Stable across releases so callers can branch on it without matching variants.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::CredentialMissing(_) => "credential_missing",
            Error::SubjectMissing => "subject_missing",
            Error::Transport(e) => match e {
                TransportError::Connect(_) => "connect_failed",
                TransportError::Timeout => "timeout",
                TransportError::Status { status: 429, .. } => "rate_limited",
                TransportError::Status { .. } => "http_status",
                TransportError::Body(_) => "body_read_failed",
                TransportError::InvalidRequest(_) => "invalid_request",
            },
            Error::Parse(e) => match e {
                ParseError::InvalidJson(_) => "invalid_json",
                ParseError::MissingEnvelope { .. } => "missing_envelope",
                ParseError::MalformedEnvelope { .. } => "malformed_envelope",
                ParseError::ApiErrors(_) => "api_errors",
            },
            Error::Upload(_) => "upload_failed",
            Error::RateLimited => "rate_limited",
            Error::Cancelled => "cancelled",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }

    /// True for errors that abort a run before any page is requested
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CredentialMissing(_) | Error::SubjectMissing | Error::Config { .. }
        )
    }
}

/// Failures while executing a single HTTP request
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established or the request could not be sent
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The request could not be built, so no attempt can ever succeed
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Classify this failure for the backoff policy
    ///
    /// Returns `None` for failures that must not be retried: any non-2xx other
    /// than 429, and requests that could not be built.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            TransportError::Status { status: 429, .. } => Some(FailureClass::RateLimited),
            TransportError::Status { .. } | TransportError::InvalidRequest(_) => None,
            TransportError::Connect(_) | TransportError::Timeout | TransportError::Body(_) => {
                Some(FailureClass::NetworkError)
            }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

/// Failures while interpreting a response body
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The instruction envelope was absent
    #[error("expected envelope missing at {path} (top-level keys: {top_level_keys:?})")]
    MissingEnvelope {
        /// Dotted path of the first missing segment
        path: &'static str,
        /// Keys present at the root of the body, for schema-drift diagnosis
        top_level_keys: Vec<String>,
    },

    /// The instruction envelope was present but not a list of instructions
    #[error("malformed envelope at {path}: {message} (top-level keys: {top_level_keys:?})")]
    MalformedEnvelope {
        /// Dotted path of the malformed segment
        path: &'static str,
        /// Why the segment could not be read
        message: String,
        /// Keys present at the root of the body, for schema-drift diagnosis
        top_level_keys: Vec<String>,
    },

    /// The body carried an `errors` array instead of data
    #[error("remote API returned errors: {}", .0.join("; "))]
    ApiErrors(Vec<String>),
}

impl ParseError {
    /// Top-level keys of the offending body, when known
    pub fn top_level_keys(&self) -> &[String] {
        match self {
            ParseError::MissingEnvelope { top_level_keys, .. }
            | ParseError::MalformedEnvelope { top_level_keys, .. } => top_level_keys,
            _ => &[],
        }
    }
}

/// Failures while delivering an export payload
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The storage backend refused the payload
    #[error("upload rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code returned by the backend
        status: u16,
        /// Error message returned by the backend
        message: String,
    },

    /// The backend could not be reached
    #[error("upload request failed: {0}")]
    Network(String),

    /// The backend answered with a body we could not understand
    #[error("invalid upload response: {0}")]
    InvalidResponse(String),

    /// The payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Payload(String),
}
