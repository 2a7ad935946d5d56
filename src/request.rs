//! Request construction for the remote GraphQL operations
//!
//! Building a request is pure: no I/O, no clock, no randomness. The timeline
//! request carries three JSON-encoded query parameters (`variables`, `features`,
//! `fieldToggles`); the feature map must be sent verbatim or the API refuses
//! the call.

use crate::types::{Cursor, SubjectId};
use serde::Serialize;
use serde_json::{Map, Value};

/// Capability flags the posts-by-subject operation requires
const TIMELINE_FEATURES: &[(&str, bool)] = &[
    ("rweb_video_screen_enabled", false),
    ("payments_enabled", false),
    ("profile_label_improvements_pcf_label_in_post_enabled", true),
    ("rweb_tipjar_consumption_enabled", true),
    ("verified_phone_label_enabled", true),
    ("creator_subscriptions_tweet_preview_api_enabled", true),
    ("responsive_web_graphql_timeline_navigation_enabled", true),
    ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
    ("premium_content_api_read_enabled", false),
    ("communities_web_enable_tweet_community_results_fetch", true),
    ("c9s_tweet_anatomy_moderator_badge_enabled", true),
    ("responsive_web_grok_analyze_button_fetch_trends_enabled", false),
    ("responsive_web_grok_analyze_post_followups_enabled", true),
    ("responsive_web_jetfuel_frame", true),
    ("responsive_web_grok_share_attachment_enabled", true),
    ("articles_preview_enabled", true),
    ("responsive_web_edit_tweet_api_enabled", true),
    ("graphql_is_translatable_rweb_tweet_is_translatable_enabled", true),
    ("view_counts_everywhere_api_enabled", true),
    ("longform_notetweets_consumption_enabled", true),
    ("responsive_web_twitter_article_tweet_consumption_enabled", true),
    ("tweet_awards_web_tipping_enabled", false),
    ("responsive_web_grok_show_grok_translated_post", false),
    ("responsive_web_grok_analysis_button_from_backend", true),
    ("creator_subscriptions_quote_tweet_preview_enabled", false),
    ("freedom_of_speech_not_reach_fetch_enabled", true),
    ("standardized_nudges_misinfo", true),
    ("tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled", true),
    ("longform_notetweets_rich_text_read_enabled", true),
    ("longform_notetweets_inline_media_enabled", true),
    ("responsive_web_grok_image_annotation_enabled", true),
    ("responsive_web_grok_community_note_auto_translation_is_enabled", false),
    ("responsive_web_enhance_cards_enabled", false),
];

const TIMELINE_FIELD_TOGGLES: &[(&str, bool)] = &[("withArticlePlainText", false)];

/// Capability flags the handle lookup operation requires
const USER_LOOKUP_FEATURES: &[(&str, bool)] = &[
    ("hidden_profile_subscriptions_enabled", true),
    ("payments_enabled", false),
    ("profile_label_improvements_pcf_label_in_post_enabled", true),
    ("rweb_tipjar_consumption_enabled", true),
    ("verified_phone_label_enabled", true),
    ("subscriptions_verification_info_is_identity_verified_enabled", true),
    ("subscriptions_verification_info_verified_since_enabled", true),
    ("highlights_tweets_tab_ui_enabled", true),
    ("responsive_web_twitter_article_notes_tab_enabled", true),
    ("subscriptions_feature_can_gift_premium", true),
    ("creator_subscriptions_tweet_preview_api_enabled", true),
    ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
    ("responsive_web_graphql_timeline_navigation_enabled", true),
];

const USER_LOOKUP_FIELD_TOGGLES: &[(&str, bool)] = &[("withAuxiliaryUserLabels", true)];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineVariables<'a> {
    user_id: &'a str,
    count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    include_promoted_content: bool,
    with_quick_promote_eligibility_tweet_fields: bool,
    with_voice: bool,
}

#[derive(Serialize)]
struct UserLookupVariables<'a> {
    screen_name: &'a str,
    #[serde(rename = "withGrokTranslatedBio")]
    with_grok_translated_bio: bool,
}

/// A fully formed GET request: endpoint plus query parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSpec {
    /// Endpoint URL without query string
    pub endpoint: String,
    /// Query parameters in the order they are sent
    pub query: Vec<(&'static str, String)>,
}

impl RequestSpec {
    /// Value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Full URL with the query string encoded
    pub fn to_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse_with_params(&self.endpoint, self.query.iter().map(|(k, v)| (*k, v)))
    }
}

/// Builds requests for the timeline and handle-lookup operations
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    timeline_endpoint: String,
    user_lookup_endpoint: String,
}

impl RequestBuilder {
    /// Create a builder for the given operation endpoints
    pub fn new(timeline_endpoint: impl Into<String>, user_lookup_endpoint: impl Into<String>) -> Self {
        Self {
            timeline_endpoint: timeline_endpoint.into(),
            user_lookup_endpoint: user_lookup_endpoint.into(),
        }
    }

    /// Build the request for one timeline page
    ///
    /// `cursor` is forwarded verbatim when present. `page_size` is the per-call
    /// batch size, never the caller's overall target.
    pub fn build(&self, subject: &SubjectId, cursor: Option<&Cursor>, page_size: u32) -> RequestSpec {
        let variables = TimelineVariables {
            user_id: subject.as_str(),
            count: page_size,
            cursor: cursor.map(Cursor::as_str),
            include_promoted_content: true,
            with_quick_promote_eligibility_tweet_fields: true,
            with_voice: true,
        };

        RequestSpec {
            endpoint: self.timeline_endpoint.clone(),
            query: vec![
                ("variables", encode(&variables)),
                ("features", encode(&flag_map(TIMELINE_FEATURES))),
                ("fieldToggles", encode(&flag_map(TIMELINE_FIELD_TOGGLES))),
            ],
        }
    }

    /// Build the request that resolves a handle (screen name) to a subject id
    pub fn build_user_lookup(&self, handle: &str) -> RequestSpec {
        let variables = UserLookupVariables {
            screen_name: handle.trim_start_matches('@'),
            with_grok_translated_bio: false,
        };

        RequestSpec {
            endpoint: self.user_lookup_endpoint.clone(),
            query: vec![
                ("variables", encode(&variables)),
                ("features", encode(&flag_map(USER_LOOKUP_FEATURES))),
                ("fieldToggles", encode(&flag_map(USER_LOOKUP_FIELD_TOGGLES))),
            ],
        }
    }
}

fn flag_map(flags: &[(&str, bool)]) -> Map<String, Value> {
    flags
        .iter()
        .map(|(name, enabled)| ((*name).to_string(), Value::Bool(*enabled)))
        .collect()
}

// Serializing plain structs and maps of bools cannot fail
fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
