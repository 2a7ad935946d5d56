//! Core types for timeline-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retry::FailureClass;

/// Opaque identifier of the stream owner
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a new SubjectId, rejecting empty or whitespace-only values
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination token pointing at the next page of a stream
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a raw cursor value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw cursor value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; cursors are long and unreadable
    pub fn preview(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(20)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

/// Session credentials supplied by the host integration
///
/// Read-only for the whole run; never mutated by the pipeline.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token sent in the `authorization` header
    pub bearer: String,
    /// Anti-forgery token sent in the `x-csrf-token` header
    pub csrf_token: String,
    /// Session cookie header, for hosts that are not a browser
    #[serde(default)]
    pub cookie: Option<String>,
}

impl Credentials {
    /// Create credentials without a cookie header
    pub fn new(bearer: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            bearer: bearer.into(),
            csrf_token: csrf_token.into(),
            cookie: None,
        }
    }

    /// Attach a raw `cookie` header value
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

// Tokens must never end up in logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Engagement counters of one item; absent counters are zero
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    /// Like count
    pub likes: u64,
    /// Reshare (retweet) count
    pub reshares: u64,
    /// Reply count
    pub replies: u64,
    /// View count
    pub views: u64,
    /// Quote count
    pub quotes: u64,
    /// Bookmark count
    pub bookmarks: u64,
}

impl std::ops::AddAssign for Engagement {
    fn add_assign(&mut self, rhs: Self) {
        self.likes = self.likes.saturating_add(rhs.likes);
        self.reshares = self.reshares.saturating_add(rhs.reshares);
        self.replies = self.replies.saturating_add(rhs.replies);
        self.views = self.views.saturating_add(rhs.views);
        self.quotes = self.quotes.saturating_add(rhs.quotes);
        self.bookmarks = self.bookmarks.saturating_add(rhs.bookmarks);
    }
}

/// Summary of the account that authored an item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    /// Author identity
    pub id: String,
    /// Handle (screen name)
    pub handle: Option<String>,
    /// Display name
    pub display_name: Option<String>,
    /// Verified flag
    pub verified: bool,
    /// Follower count
    pub followers: u64,
}

/// One collected post
///
/// Immutable once parsed. Identity is only unique after [`crate::dedup::process`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Opaque identity, unique within the subject's stream
    pub id: String,
    /// Text body
    pub text: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Engagement counters
    pub engagement: Engagement,
    /// Author summary, when the entry carried one
    pub author: Option<AuthorSummary>,
    /// Client the post was made from
    pub source: Option<String>,
    /// Conversation (thread root) identity
    pub conversation_id: Option<String>,
    /// Detected language code
    pub lang: Option<String>,
    /// Whether the post quotes another post
    pub is_quote: bool,
    /// Whether the post is flagged as possibly sensitive
    pub possibly_sensitive: bool,
}

/// Items and the next cursor produced by one request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageResult {
    /// Items in page order (may duplicate items of other pages)
    pub items: Vec<ItemRecord>,
    /// Cursor of the next page; `None` means no further pages
    pub cursor: Option<Cursor>,
}

/// Why a fetch loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Collected at least the requested number of items
    TargetReached,
    /// The remote stream returned no further cursor
    EndOfStream,
    /// Too many consecutive pages without items
    EmptyPageCeiling,
    /// Too many consecutive failed pages
    ErrorCeiling,
    /// The hard page ceiling was reached
    PageCeiling,
    /// The caller cancelled the run
    Cancelled,
}

impl StopReason {
    /// True when the run ended before the stream or the target was exhausted
    pub fn is_partial(&self) -> bool {
        !matches!(self, StopReason::TargetReached | StopReason::EndOfStream)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::TargetReached => "target reached",
            StopReason::EndOfStream => "end of stream",
            StopReason::EmptyPageCeiling => "empty-page ceiling",
            StopReason::ErrorCeiling => "error ceiling",
            StopReason::PageCeiling => "page ceiling",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of one collection run
///
/// `items` is deduplicated and sorted ascending by `(created_at, id)`. It may
/// hold up to one page more than requested; see [`HarvestReport::truncated`].
#[derive(Clone, Debug, PartialEq)]
pub struct HarvestReport {
    /// Subject the items were collected for
    pub subject: SubjectId,
    /// Deduplicated, time-ordered items
    pub items: Vec<ItemRecord>,
    /// Pages issued during the run
    pub pages: u32,
    /// Items accumulated before deduplication
    pub raw_count: usize,
    /// Why the loop stopped
    pub stop_reason: StopReason,
}

impl HarvestReport {
    /// Empty report for a run that issued no requests
    pub fn empty(subject: SubjectId, stop_reason: StopReason) -> Self {
        Self {
            subject,
            items: Vec::new(),
            pages: 0,
            raw_count: 0,
            stop_reason,
        }
    }

    /// Keep at most `target` items, oldest first
    #[must_use]
    pub fn truncated(mut self, target: usize) -> Self {
        self.items.truncate(target);
        self
    }

    /// The `n` oldest items, oldest first
    pub fn oldest(&self, n: usize) -> &[ItemRecord] {
        &self.items[..n.min(self.items.len())]
    }

    /// The `n` newest items, newest first
    pub fn newest(&self, n: usize) -> Vec<&ItemRecord> {
        self.items.iter().rev().take(n).collect()
    }

    /// Items whose text contains `term`, ignoring case
    pub fn search(&self, term: &str) -> Vec<&ItemRecord> {
        let needle = term.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.text.to_lowercase().contains(&needle))
            .collect()
    }
}

/// Events emitted by the harvester
///
/// Subscribe via [`crate::Harvester::subscribe`]. Events are informational;
/// the typed return values of the harvester are the source of truth.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A collection run started
    RunStarted {
        /// Subject being collected
        subject: SubjectId,
        /// Requested item count
        target: usize,
    },

    /// A page was fetched and parsed
    PageFetched {
        /// 1-based page number
        page: u32,
        /// Items on this page
        items: usize,
        /// Items accumulated so far (before dedup)
        total: usize,
    },

    /// A request failed and will be retried after a delay
    RetryScheduled {
        /// 1-based page number, or [`LOOKUP_PAGE`](crate::harvester::LOOKUP_PAGE)
        /// for a handle lookup
        page: u32,
        /// Failure class that triggered the retry
        class: FailureClass,
        /// 0-based retry attempt
        attempt: u32,
        /// Delay before the retry, in milliseconds
        delay_ms: u64,
    },

    /// A page could not be fetched or parsed
    PageFailed {
        /// 1-based page number
        page: u32,
        /// Error message
        error: String,
    },

    /// The fetch loop stopped
    Stopped {
        /// Why the loop stopped
        reason: StopReason,
        /// Items accumulated (before dedup)
        total: usize,
    },

    /// The export payload was delivered
    Uploaded {
        /// Storage location
        url: String,
        /// Stored filename
        filename: String,
    },

    /// Delivering the export payload failed
    UploadFailed {
        /// Error message
        error: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, secs: i64, text: &str) -> ItemRecord {
        ItemRecord {
            id: id.to_string(),
            text: text.to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            engagement: Engagement::default(),
            author: None,
            source: None,
            conversation_id: None,
            lang: None,
            is_quote: false,
            possibly_sensitive: false,
        }
    }

    fn report(items: Vec<ItemRecord>) -> HarvestReport {
        HarvestReport {
            subject: SubjectId::new("42").unwrap(),
            raw_count: items.len(),
            items,
            pages: 1,
            stop_reason: StopReason::EndOfStream,
        }
    }

    #[test]
    fn subject_id_rejects_blank_values() {
        assert!(SubjectId::new("").is_none());
        assert!(SubjectId::new("   ").is_none());
        assert_eq!(SubjectId::new("1663994484529717249").unwrap().as_str(), "1663994484529717249");
    }

    #[test]
    fn cursor_preview_is_char_boundary_safe() {
        let cursor = Cursor::new("DAABCgABGdLs0wj__-kKAAIZ0s3q");
        assert_eq!(cursor.preview(), "DAABCgABGdLs0wj__-kK");

        let short = Cursor::new("abc");
        assert_eq!(short.preview(), "abc");

        let wide = Cursor::new("é".repeat(30));
        assert_eq!(wide.preview().chars().count(), 20);
    }

    #[test]
    fn credentials_debug_redacts_tokens() {
        let creds = Credentials::new("secret-bearer", "secret-csrf").with_cookie("ct0=abc");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-bearer"));
        assert!(!debug.contains("secret-csrf"));
        assert!(!debug.contains("ct0=abc"));
    }

    #[test]
    fn engagement_sums_saturate() {
        let mut total = Engagement {
            likes: u64::MAX,
            ..Default::default()
        };
        total += Engagement {
            likes: 1,
            views: 7,
            ..Default::default()
        };
        assert_eq!(total.likes, u64::MAX);
        assert_eq!(total.views, 7);
    }

    #[test]
    fn stop_reason_partiality() {
        assert!(!StopReason::TargetReached.is_partial());
        assert!(!StopReason::EndOfStream.is_partial());
        assert!(StopReason::EmptyPageCeiling.is_partial());
        assert!(StopReason::ErrorCeiling.is_partial());
        assert!(StopReason::PageCeiling.is_partial());
        assert!(StopReason::Cancelled.is_partial());
    }

    #[test]
    fn truncation_keeps_oldest_items() {
        let r = report(vec![item("a", 1, ""), item("b", 2, ""), item("c", 3, "")]);
        let t = r.truncated(2);
        let ids: Vec<_> = t.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let r = report(vec![item("a", 1, "")]);
        assert_eq!(r.truncated(10).items.len(), 1);
    }

    #[test]
    fn oldest_and_newest_views() {
        let r = report(vec![item("a", 1, ""), item("b", 2, ""), item("c", 3, "")]);
        let oldest: Vec<_> = r.oldest(2).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(oldest, ["a", "b"]);
        let newest: Vec<_> = r.newest(2).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(newest, ["c", "b"]);
        assert_eq!(r.oldest(99).len(), 3);
    }

    #[test]
    fn search_ignores_case() {
        let r = report(vec![
            item("a", 1, "Shipping Rust today"),
            item("b", 2, "coffee"),
            item("c", 3, "more RUST"),
        ]);
        let hits: Vec<_> = r.search("rust").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(hits, ["a", "c"]);
        assert!(r.search("tea").is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::PageFetched {
            page: 2,
            items: 40,
            total: 80,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "page_fetched");
        assert_eq!(json["total"], 80);

        let stopped = Event::Stopped {
            reason: StopReason::EmptyPageCeiling,
            total: 3,
        };
        let json = serde_json::to_value(&stopped).unwrap();
        assert_eq!(json["reason"], "empty_page_ceiling");
    }
}
