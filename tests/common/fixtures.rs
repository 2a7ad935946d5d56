//! Timeline response fixtures

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

/// Remote timestamp format for `secs` seconds after the epoch
pub fn remote_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%a %b %d %H:%M:%S %z %Y").to_string())
        .unwrap_or_default()
}

/// One `TimelineTweet` entry
pub fn tweet_entry(id: &str, secs: i64, likes: u64) -> Value {
    json!({
        "entryId": format!("tweet-{id}"),
        "sortIndex": id,
        "content": {
            "entryType": "TimelineTimelineItem",
            "__typename": "TimelineTimelineItem",
            "itemContent": {
                "itemType": "TimelineTweet",
                "__typename": "TimelineTweet",
                "tweet_results": { "result": {
                    "__typename": "Tweet",
                    "rest_id": id,
                    "views": { "count": "100", "state": "EnabledWithCount" },
                    "core": { "user_results": { "result": {
                        "__typename": "User",
                        "rest_id": "42",
                        "core": { "screen_name": "rustlang", "name": "Rust" },
                        "legacy": { "followers_count": 1000 }
                    }}},
                    "legacy": {
                        "id_str": id,
                        "full_text": format!("post number {id}"),
                        "created_at": remote_timestamp(secs),
                        "favorite_count": likes,
                        "retweet_count": 1,
                        "reply_count": 0,
                        "quote_count": 0,
                        "bookmark_count": 0,
                        "lang": "en"
                    }
                }}
            }
        }
    })
}

/// A bottom cursor entry
pub fn bottom_cursor(value: &str) -> Value {
    json!({
        "entryId": format!("cursor-bottom-{value}"),
        "content": {
            "entryType": "TimelineTimelineCursor",
            "__typename": "TimelineTimelineCursor",
            "value": value,
            "cursorType": "Bottom"
        }
    })
}

/// Timeline envelope with `(id, created_at seconds)` items and an optional bottom cursor
pub fn timeline_page(items: &[(&str, i64)], cursor: Option<&str>) -> Value {
    let mut entries: Vec<Value> = items
        .iter()
        .map(|(id, secs)| tweet_entry(id, *secs, 2))
        .collect();
    if let Some(cursor) = cursor {
        entries.push(bottom_cursor(cursor));
    }
    json!({
        "data": { "user": { "result": {
            "__typename": "User",
            "timeline": { "timeline": { "instructions": [
                { "type": "TimelineClearCache" },
                { "type": "TimelineAddEntries", "entries": entries }
            ]}}
        }}}
    })
}

/// Handle lookup response resolving to `rest_id`
pub fn user_lookup(rest_id: &str) -> Value {
    json!({ "data": { "user": { "result": {
        "__typename": "User",
        "rest_id": rest_id,
        "core": { "screen_name": "rustlang" }
    }}}})
}
