//! Response parsing for the instruction-based timeline envelope
//!
//! The envelope lives at `data.user.result.timeline.timeline.instructions[]`.
//! Instructions, entries, item contents and tweet results are each modelled as
//! a tagged union with an `Unknown` variant, so new kinds the remote API starts
//! sending are skipped instead of failing the page. Individual entries that do
//! not match any known shape are kept as raw JSON and skipped as well.

use crate::error::ParseError;
use crate::types::{AuthorSummary, Cursor, Engagement, ItemRecord, PageResult, SubjectId};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

/// Timestamp format used by the remote API, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

const INSTRUCTIONS_PATH: &[(&str, &str)] = &[
    ("/data", "data"),
    ("/data/user", "data.user"),
    ("/data/user/result", "data.user.result"),
    ("/data/user/result/timeline", "data.user.result.timeline"),
    ("/data/user/result/timeline/timeline", "data.user.result.timeline.timeline"),
    (
        "/data/user/result/timeline/timeline/instructions",
        "data.user.result.timeline.timeline.instructions",
    ),
];

/// A value that either matches `T` or is kept as raw JSON
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Known(T),
    Malformed(Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Instruction {
    TimelineAddEntries {
        #[serde(default)]
        entries: Vec<Lenient<Entry>>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "entryId", default)]
    entry_id: String,
    content: EntryContent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "entryType")]
enum EntryContent {
    TimelineTimelineItem {
        #[serde(rename = "itemContent")]
        item_content: Lenient<ItemContent>,
    },
    TimelineTimelineCursor {
        value: String,
        #[serde(rename = "cursorType", default)]
        cursor_type: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "itemType")]
enum ItemContent {
    TimelineTweet {
        #[serde(default)]
        tweet_results: Option<TweetResults>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct TweetResults {
    #[serde(default)]
    result: Option<Lenient<TweetResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum TweetResult {
    Tweet(TweetNode),
    TweetWithVisibilityResults { tweet: TweetNode },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct TweetNode {
    #[serde(default)]
    rest_id: Option<String>,
    #[serde(default)]
    legacy: Option<TweetLegacy>,
    #[serde(default)]
    views: Option<Views>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    core: Option<TweetCore>,
}

#[derive(Debug, Deserialize)]
struct TweetLegacy {
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    full_text: Option<String>,
    created_at: String,
    #[serde(default)]
    favorite_count: Option<u64>,
    #[serde(default)]
    retweet_count: Option<u64>,
    #[serde(default)]
    reply_count: Option<u64>,
    #[serde(default)]
    quote_count: Option<u64>,
    #[serde(default)]
    bookmark_count: Option<u64>,
    #[serde(default)]
    conversation_id_str: Option<String>,
    #[serde(default)]
    is_quote_status: Option<bool>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    possibly_sensitive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Views {
    #[serde(default)]
    count: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TweetCore {
    #[serde(default)]
    user_results: Option<UserResults>,
}

#[derive(Debug, Deserialize)]
struct UserResults {
    #[serde(default)]
    result: Option<AuthorNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorNode {
    #[serde(default)]
    rest_id: Option<String>,
    #[serde(default)]
    core: Option<AuthorCore>,
    #[serde(default)]
    verification: Option<Verification>,
    #[serde(default)]
    legacy: Option<AuthorLegacy>,
}

#[derive(Debug, Deserialize)]
struct AuthorCore {
    #[serde(default)]
    screen_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Verification {
    #[serde(default)]
    verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AuthorLegacy {
    #[serde(default)]
    followers_count: Option<u64>,
    #[serde(default)]
    screen_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    verified: Option<bool>,
}

/// Parse one timeline page
///
/// A page with zero items is a valid result. Missing optional sub-objects
/// (views, author) degrade to defaults. Fails only when the body is not JSON,
/// carries an `errors` array, or lacks the instruction envelope.
pub fn parse(body: &str) -> Result<PageResult, ParseError> {
    let mut root = parse_root(body)?;
    let instructions = take_instructions(&mut root)?;

    let instructions: Vec<Lenient<Instruction>> =
        serde_json::from_value(instructions).map_err(|e| ParseError::MalformedEnvelope {
            path: "data.user.result.timeline.timeline.instructions",
            message: e.to_string(),
            top_level_keys: root_keys(&root),
        })?;

    let mut page = PageResult::default();
    for instruction in instructions {
        let entries = match instruction {
            Lenient::Known(Instruction::TimelineAddEntries { entries }) => entries,
            Lenient::Known(Instruction::Unknown) => continue,
            Lenient::Malformed(raw) => {
                trace!(instruction = %raw, "skipping malformed instruction");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Lenient::Known(entry) => entry,
                Lenient::Malformed(raw) => {
                    debug!(entry_id = ?raw.get("entryId"), "skipping malformed entry");
                    continue;
                }
            };
            absorb_entry(entry, &mut page);
        }
    }

    debug!(
        items = page.items.len(),
        has_cursor = page.cursor.is_some(),
        "parsed timeline page"
    );
    Ok(page)
}

/// Parse the handle lookup response into a subject id
///
/// Returns `Ok(None)` when the envelope is intact but names no account.
pub fn parse_user_lookup(body: &str) -> Result<Option<SubjectId>, ParseError> {
    let root = parse_root(body)?;
    let user = root
        .pointer("/data/user")
        .ok_or_else(|| missing(&root, "data.user"))?;

    Ok(user
        .pointer("/result/rest_id")
        .and_then(Value::as_str)
        .and_then(SubjectId::new))
}

fn parse_root(body: &str) -> Result<Value, ParseError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    if let Some(errors) = root.get("errors").and_then(Value::as_array)
        && !errors.is_empty()
    {
        let messages = errors
            .iter()
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| e.to_string(), str::to_string)
            })
            .collect();
        return Err(ParseError::ApiErrors(messages));
    }
    Ok(root)
}

fn take_instructions(root: &mut Value) -> Result<Value, ParseError> {
    for (pointer, dotted) in INSTRUCTIONS_PATH {
        if root.pointer(pointer).is_none_or(Value::is_null) {
            return Err(missing(root, dotted));
        }
    }
    let (last, _) = INSTRUCTIONS_PATH[INSTRUCTIONS_PATH.len() - 1];
    Ok(root.pointer_mut(last).map(Value::take).unwrap_or_default())
}

fn missing(root: &Value, path: &'static str) -> ParseError {
    ParseError::MissingEnvelope {
        path,
        top_level_keys: root_keys(root),
    }
}

fn root_keys(root: &Value) -> Vec<String> {
    match root {
        Value::Object(map) => map.keys().cloned().collect(),
        other => vec![format!("<{}>", json_kind(other))],
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn absorb_entry(entry: Entry, page: &mut PageResult) {
    let is_bottom_id = entry.entry_id.contains("cursor-bottom");
    match entry.content {
        EntryContent::TimelineTimelineItem { item_content } => {
            let node = match item_content {
                Lenient::Known(ItemContent::TimelineTweet {
                    tweet_results: Some(TweetResults { result: Some(result) }),
                }) => match result {
                    Lenient::Known(TweetResult::Tweet(node)) => node,
                    Lenient::Known(TweetResult::TweetWithVisibilityResults { tweet }) => tweet,
                    Lenient::Known(TweetResult::Unknown) => return,
                    Lenient::Malformed(_) => {
                        debug!(entry_id = %entry.entry_id, "skipping malformed tweet result");
                        return;
                    }
                },
                _ => return,
            };
            if let Some(item) = to_item(node, &entry.entry_id) {
                page.items.push(item);
            }
        }
        EntryContent::TimelineTimelineCursor { value, cursor_type } => {
            if is_bottom_id || cursor_type.as_deref() == Some("Bottom") {
                page.cursor = Some(Cursor::new(value));
            }
        }
        EntryContent::Unknown => {}
    }
}

fn to_item(node: TweetNode, entry_id: &str) -> Option<ItemRecord> {
    let Some(legacy) = node.legacy else {
        debug!(entry_id, "tweet without legacy payload");
        return None;
    };
    let Some(id) = legacy.id_str.or(node.rest_id) else {
        debug!(entry_id, "tweet without identity");
        return None;
    };
    let created_at = match DateTime::parse_from_str(&legacy.created_at, CREATED_AT_FORMAT) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            debug!(entry_id, id = %id, created_at = %legacy.created_at, error = %e, "unparseable timestamp");
            return None;
        }
    };

    let engagement = Engagement {
        likes: legacy.favorite_count.unwrap_or(0),
        reshares: legacy.retweet_count.unwrap_or(0),
        replies: legacy.reply_count.unwrap_or(0),
        views: node
            .views
            .and_then(|v| v.count)
            .map_or(0, |c| count_value(&c)),
        quotes: legacy.quote_count.unwrap_or(0),
        bookmarks: legacy.bookmark_count.unwrap_or(0),
    };

    let author = node
        .core
        .and_then(|c| c.user_results)
        .and_then(|u| u.result)
        .and_then(to_author);

    Some(ItemRecord {
        id,
        text: legacy.full_text.unwrap_or_default(),
        created_at,
        engagement,
        author,
        source: node.source,
        conversation_id: legacy.conversation_id_str,
        lang: legacy.lang,
        is_quote: legacy.is_quote_status.unwrap_or(false),
        possibly_sensitive: legacy.possibly_sensitive.unwrap_or(false),
    })
}

fn to_author(node: AuthorNode) -> Option<AuthorSummary> {
    let id = node.rest_id?;
    let (core_handle, core_name) = node
        .core
        .map(|c| (c.screen_name, c.name))
        .unwrap_or_default();
    let legacy = node.legacy;
    let legacy_verified = legacy.as_ref().and_then(|l| l.verified);

    Some(AuthorSummary {
        id,
        handle: core_handle.or_else(|| legacy.as_ref().and_then(|l| l.screen_name.clone())),
        display_name: core_name.or_else(|| legacy.as_ref().and_then(|l| l.name.clone())),
        verified: node
            .verification
            .and_then(|v| v.verified)
            .or(legacy_verified)
            .unwrap_or(false),
        followers: legacy.and_then(|l| l.followers_count).unwrap_or(0),
    })
}

// View counts arrive as decimal strings, occasionally as numbers
fn count_value(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}
