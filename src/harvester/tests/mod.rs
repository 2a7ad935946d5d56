mod page;

use super::*;
use crate::error::{TransportError, UploadError};
use crate::export::{UploadReceipt, UploadRequest, Uploader};
use crate::host::StaticSession;
use crate::request::RequestSpec;
use crate::retry::FixedJitter;
use crate::transport::RawResponse;
use crate::types::{Credentials, SubjectId};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::VecDeque;

/// Scripted transport: pops one response per call and records every request
struct MockTransport {
    responses: std::sync::Mutex<VecDeque<std::result::Result<RawResponse, TransportError>>>,
    requests: std::sync::Mutex<Vec<RequestSpec>>,
}

impl MockTransport {
    fn with_responses(responses: Vec<std::result::Result<RawResponse, TransportError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(VecDeque::from(responses)),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every call answers 200 with the given bodies, in order
    fn pages(bodies: Vec<String>) -> Self {
        Self::with_responses(bodies.into_iter().map(|b| Ok(RawResponse::new(200, b))).collect())
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Cursor sent with each timeline request, in order
    fn cursors(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| {
                let vars: Value = serde_json::from_str(r.param("variables").unwrap()).unwrap();
                vars.get("cursor").and_then(Value::as_str).map(str::to_string)
            })
            .collect()
    }

    fn endpoints(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.endpoint.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &RequestSpec,
        _credentials: &Credentials,
    ) -> std::result::Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("No more mock responses".to_string())))
    }
}

/// Uploader that records what it was given and answers with a fixed result
struct MockUploader {
    result: std::result::Result<UploadReceipt, UploadError>,
    received: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl MockUploader {
    fn succeeding() -> Self {
        Self {
            result: Ok(UploadReceipt {
                url: "https://storage.example.com/archive.json".to_string(),
                filename: "archive.json".to_string(),
            }),
            received: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            result: Err(UploadError::Rejected {
                status: 503,
                message: "storage unavailable".to_string(),
            }),
            received: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn uploads(&self) -> Vec<(String, String, String)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Uploader for MockUploader {
    async fn upload(
        &self,
        request: UploadRequest<'_>,
        credential: &str,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        self.received.lock().unwrap().push((
            request.filename.to_string(),
            request.content.to_string(),
            credential.to_string(),
        ));
        self.result.clone()
    }
}

fn subject() -> SubjectId {
    SubjectId::new("42").unwrap()
}

fn session() -> StaticSession {
    StaticSession::new(Credentials::new("bearer", "csrf")).with_subject(subject())
}

fn test_config() -> Config {
    Config::default()
}

fn harvester_with(transport: Arc<MockTransport>, config: Config, session: StaticSession) -> Harvester {
    Harvester::new(config, transport, Arc::new(session))
        .unwrap()
        .with_jitter(Arc::new(FixedJitter::ZERO))
}

fn harvester(transport: Arc<MockTransport>) -> Harvester {
    harvester_with(transport, test_config(), session())
}

fn timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .unwrap()
        .format("%a %b %d %H:%M:%S %z %Y")
        .to_string()
}

fn tweet(id: &str, secs: i64) -> Value {
    json!({
        "entryId": format!("tweet-{id}"),
        "content": {
            "entryType": "TimelineTimelineItem",
            "itemContent": {
                "itemType": "TimelineTweet",
                "tweet_results": { "result": {
                    "__typename": "Tweet",
                    "rest_id": id,
                    "views": { "count": "10" },
                    "legacy": {
                        "id_str": id,
                        "full_text": format!("post {id}"),
                        "created_at": timestamp(secs),
                        "favorite_count": 1
                    }
                }}
            }
        }
    })
}

/// Timeline body with the given `(id, created_at seconds)` items and optional bottom cursor
fn page_body(items: &[(&str, i64)], cursor: Option<&str>) -> String {
    let mut entries: Vec<Value> = items.iter().map(|(id, secs)| tweet(id, *secs)).collect();
    entries.push(json!({
        "entryId": "cursor-top-1",
        "content": { "entryType": "TimelineTimelineCursor", "value": "top", "cursorType": "Top" }
    }));
    if let Some(cursor) = cursor {
        entries.push(json!({
            "entryId": "cursor-bottom-1",
            "content": { "entryType": "TimelineTimelineCursor", "value": cursor, "cursorType": "Bottom" }
        }));
    }
    json!({
        "data": { "user": { "result": { "timeline": { "timeline": { "instructions": [
            { "type": "TimelineClearCache" },
            { "type": "TimelineAddEntries", "entries": entries }
        ]}}}}}
    })
    .to_string()
}

/// `count` items with distinct ids and ascending timestamps starting at `offset`
fn numbered(prefix: &str, count: usize, offset: i64) -> Vec<(String, i64)> {
    (0..count)
        .map(|i| (format!("{prefix}{i}"), offset + i as i64))
        .collect()
}

fn page_of(items: &[(String, i64)], cursor: Option<&str>) -> String {
    let borrowed: Vec<(&str, i64)> = items.iter().map(|(id, t)| (id.as_str(), *t)).collect();
    page_body(&borrowed, cursor)
}

fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn ids(report: &crate::types::HarvestReport) -> Vec<&str> {
    report.items.iter().map(|i| i.id.as_str()).collect()
}
