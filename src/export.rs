//! Export payload construction and delivery
//!
//! [`export`] turns the final collection into a [`Payload`] with summary
//! metadata. Delivery goes through the narrow [`Uploader`] interface; the
//! exporter does not know how the payload is persisted.

use crate::config::UploadConfig;
use crate::error::{Error, Result, UploadError};
use crate::types::{Engagement, ItemRecord, SubjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of the subject a payload is exported for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectMeta {
    /// Subject id the items were collected for
    pub subject_id: SubjectId,
    /// Handle, when the host integration knows it
    pub username: Option<String>,
}

impl SubjectMeta {
    /// Metadata for a subject without a known handle
    pub fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            username: None,
        }
    }

    /// Attach a handle; a leading `@` is dropped
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = Some(username.trim_start_matches('@').to_string());
        self
    }

    fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .unwrap_or_else(|| self.subject_id.as_str())
    }
}

/// Oldest and newest creation timestamps of the exported items
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest `created_at`
    pub oldest: Option<DateTime<Utc>>,
    /// Latest `created_at`
    pub newest: Option<DateTime<Utc>>,
}

/// Engagement counters summed over every exported item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalEngagement {
    /// Sum of likes
    pub likes: u64,
    /// Sum of reshares
    pub retweets: u64,
    /// Sum of replies
    pub replies: u64,
    /// Sum of views
    pub views: u64,
    /// Sum of quotes
    pub quotes: u64,
    /// Sum of bookmarks
    pub bookmarks: u64,
}

impl From<Engagement> for TotalEngagement {
    fn from(e: Engagement) -> Self {
        Self {
            likes: e.likes,
            retweets: e.reshares,
            replies: e.replies,
            views: e.views,
            quotes: e.quotes,
            bookmarks: e.bookmarks,
        }
    }
}

/// Summary section of a payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// Handle of the subject, or its id when the handle is unknown
    pub username: String,
    /// Subject id
    pub subject_id: SubjectId,
    /// Number of exported items
    pub total_count: usize,
    /// When the payload was produced
    pub extracted_at: DateTime<Utc>,
    /// Time span covered by the items
    pub date_range: DateRange,
    /// Aggregate engagement
    pub total_engagement: TotalEngagement,
}

/// One exported item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadItem {
    /// Item identity
    pub id: String,
    /// Text body
    pub text: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Reshare count
    pub retweet_count: u64,
    /// Like count
    pub favorite_count: u64,
    /// Reply count
    pub reply_count: u64,
    /// View count
    pub view_count: u64,
    /// Quote count
    pub quote_count: u64,
    /// Bookmark count
    pub bookmark_count: u64,
    /// Conversation identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Language code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Whether the item quotes another item
    #[serde(default)]
    pub is_quote_status: bool,
    /// Sensitivity flag
    #[serde(default)]
    pub possibly_sensitive: bool,
}

impl From<&ItemRecord> for PayloadItem {
    fn from(item: &ItemRecord) -> Self {
        let e = &item.engagement;
        Self {
            id: item.id.clone(),
            text: item.text.clone(),
            created_at: item.created_at,
            retweet_count: e.reshares,
            favorite_count: e.likes,
            reply_count: e.replies,
            view_count: e.views,
            quote_count: e.quotes,
            bookmark_count: e.bookmarks,
            conversation_id: item.conversation_id.clone(),
            lang: item.lang.clone(),
            is_quote_status: item.is_quote,
            possibly_sensitive: item.possibly_sensitive,
        }
    }
}

/// Transfer payload: metadata plus the normalized item list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Summary metadata
    pub metadata: PayloadMetadata,
    /// Exported items, in collection order
    pub items: Vec<PayloadItem>,
}

impl Payload {
    /// Storage filename, `<username>_tweet_archive_<count>_<timestamp>.json`
    pub fn filename(&self) -> String {
        let stamp = self
            .metadata
            .extracted_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!(
            "{}_tweet_archive_{}_{}.json",
            self.metadata.username, self.metadata.total_count, stamp
        )
    }

    /// Pretty-printed JSON body
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the export payload for `items`
///
/// `items` is expected to be the deduplicated, sorted collection; the date
/// range is computed from the timestamps rather than from positions.
pub fn export(items: &[ItemRecord], subject: &SubjectMeta, extracted_at: DateTime<Utc>) -> Payload {
    let mut total = Engagement::default();
    for item in items {
        total += item.engagement;
    }

    let metadata = PayloadMetadata {
        username: subject.display_name().to_string(),
        subject_id: subject.subject_id.clone(),
        total_count: items.len(),
        extracted_at,
        date_range: DateRange {
            oldest: items.iter().map(|i| i.created_at).min(),
            newest: items.iter().map(|i| i.created_at).max(),
        },
        total_engagement: total.into(),
    };

    Payload {
        metadata,
        items: items.iter().map(PayloadItem::from).collect(),
    }
}

/// A finished payload handed to an [`Uploader`]
#[derive(Clone, Copy, Debug)]
pub struct UploadRequest<'a> {
    /// Serialized payload
    pub content: &'a str,
    /// MIME type of `content`
    pub content_type: &'a str,
    /// Requested storage filename
    pub filename: &'a str,
}

/// Where an uploaded payload ended up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Storage location
    pub url: String,
    /// Stored filename
    pub filename: String,
}

/// Storage backend the exporter delivers to
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Store `request.content`, authenticating with `credential`
    async fn upload(
        &self,
        request: UploadRequest<'_>,
        credential: &str,
    ) -> std::result::Result<UploadReceipt, UploadError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody<'a> {
    data: Value,
    filename: &'a str,
    content_type: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`Uploader`] that POSTs the payload to a storage API
#[derive(Clone, Debug)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader from the upload settings
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no endpoint is configured
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| Error::Config {
            message: "upload endpoint not configured".to_string(),
            key: Some("upload.endpoint".to_string()),
        })?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        request: UploadRequest<'_>,
        credential: &str,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        // JSON payloads travel as structured data, anything else as a string
        let data = serde_json::from_str(request.content)
            .unwrap_or_else(|_| Value::String(request.content.to_string()));
        let body = UploadBody {
            data,
            filename: request.filename,
            content_type: request.content_type,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;
        let parsed: Option<UploadResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| if text.is_empty() { "Upload failed".to_string() } else { text });
            tracing::warn!(status = status.as_u16(), error = %message, "upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.ok_or_else(|| UploadError::InvalidResponse(text.clone()))?;
        let url = parsed
            .url
            .ok_or_else(|| UploadError::InvalidResponse("response has no url".to_string()))?;
        let filename = parsed
            .filename
            .unwrap_or_else(|| request.filename.to_string());

        tracing::info!(url = %url, filename = %filename, "payload uploaded");
        Ok(UploadReceipt { url, filename })
    }
}
