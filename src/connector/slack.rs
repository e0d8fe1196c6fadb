//! Slack chat connector.
//!
//! The chat source has a single scope covering every configured channel;
//! channels are enumerated here. A channel that cannot be read is logged
//! and skipped, and the scope only fails when no channel could be read.

use super::{decode, read_body, transport_error, truncate, unsupported_scope, Connector};
use crate::models::{ActivityItem, ActivityRecord, DateRange, ItemKind, ScopeError, SourceKind};
use crate::scope::Scope;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Messages requested per history page.
const HISTORY_LIMIT: &str = "200";

/// Upper bound on history pages read per channel.
const MAX_PAGES: usize = 10;

const TITLE_LIMIT: usize = 120;

/// Message subtypes that never count as team activity.
const SKIPPED_SUBTYPES: &[&str] = &["bot_message", "channel_join", "channel_leave"];

/// Connector for the Slack Web API using a bot token.
pub struct SlackConnector {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SlackStatus {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    channel: ChannelName,
}

#[derive(Debug, Deserialize)]
struct ChannelName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    #[serde(default)]
    reply_count: u32,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: UserRecord,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    profile: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    real_name: String,
}

impl UserProfile {
    fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.real_name
        } else {
            &self.display_name
        }
    }
}

impl SlackConnector {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Call a Web API method and return the body of an `ok` response.
    async fn call(&self, method: &str, query: &[(&str, &str)], token: &str) -> Result<String, ScopeError> {
        let url = format!("{}/{}", self.api_url, method);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(e, &self.api_url))?;

        let body = read_body(response, &self.api_url).await?;
        check_ok(&body, method)?;
        Ok(body)
    }

    async fn channel_name(&self, channel: &str, token: &str) -> String {
        let result = self
            .call("conversations.info", &[("channel", channel)], token)
            .await
            .and_then(|body| decode::<ChannelInfo>(&body, "conversations.info"));

        match result {
            Ok(info) => info.channel.name,
            Err(e) => {
                warn!("Could not get channel info for {}: {}", channel, e);
                channel.to_string()
            }
        }
    }

    async fn history(
        &self,
        channel: &str,
        range: &DateRange,
        token: &str,
    ) -> Result<Vec<SlackMessage>, ScopeError> {
        let oldest = range.start_datetime().timestamp().to_string();
        let latest = range.end_datetime().timestamp().to_string();

        let mut messages = Vec::new();
        let mut cursor = String::new();

        for page in 0..MAX_PAGES {
            let body = {
                let mut query = vec![
                    ("channel", channel),
                    ("oldest", oldest.as_str()),
                    ("latest", latest.as_str()),
                    ("limit", HISTORY_LIMIT),
                ];
                if !cursor.is_empty() {
                    query.push(("cursor", cursor.as_str()));
                }
                self.call("conversations.history", &query, token).await?
            };
            let history: HistoryPage = decode(&body, "conversations.history")?;
            debug!("Channel {} page {}: {} messages", channel, page + 1, history.messages.len());
            messages.extend(history.messages);

            let next = history
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if !history.has_more || next.is_empty() {
                break;
            }
            if page + 1 == MAX_PAGES {
                warn!(
                    "Channel {}: stopped after {} pages; older messages in the window were not read",
                    channel, MAX_PAGES
                );
                break;
            }
            cursor = next;
        }

        Ok(messages)
    }

    async fn user_profile(
        &self,
        user_id: &str,
        token: &str,
        cache: &mut HashMap<String, Option<UserProfile>>,
    ) -> Option<UserProfile> {
        if let Some(cached) = cache.get(user_id) {
            return cached.clone();
        }

        let result = self
            .call("users.info", &[("user", user_id)], token)
            .await
            .and_then(|body| decode::<UserInfo>(&body, "users.info"));

        let profile = match result {
            Ok(info) => Some(info.user.profile),
            Err(e) => {
                warn!("Could not get user info for {}: {}", user_id, e);
                None
            }
        };
        cache.insert(user_id.to_string(), profile.clone());
        profile
    }

    async fn channel_items(
        &self,
        channel: &str,
        allow: &[String],
        range: &DateRange,
        token: &str,
        users: &mut HashMap<String, Option<UserProfile>>,
    ) -> Result<Vec<ActivityItem>, ScopeError> {
        let name = self.channel_name(channel, token).await;
        let messages = self.history(channel, range, token).await?;
        info!("Found {} messages in #{}", messages.len(), name);

        let mut items = Vec::new();
        for message in messages.into_iter().filter(is_member_message) {
            let Some(user_id) = message.user.as_deref() else {
                continue;
            };
            let Some(profile) = self.user_profile(user_id, token, users).await else {
                continue;
            };
            if !sender_allowed(allow, &profile.display_name, &profile.real_name) {
                continue;
            }
            let item = message_to_item(channel, &name, profile.name(), &message)?;
            if range.contains(item.created_at) {
                items.push(item);
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl Connector for SlackConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Chat
    }

    async fn fetch(&self, scope: &Scope, range: &DateRange, token: &str) -> ActivityRecord {
        let Scope::Channels { channels, users } = scope else {
            return unsupported_scope(self.kind(), scope);
        };

        if channels.is_empty() {
            info!("No Slack channels configured");
            return ActivityRecord::success(self.kind(), scope.id(), Vec::new());
        }

        let mut profiles = HashMap::new();
        let mut results = Vec::with_capacity(channels.len());

        for channel in channels {
            let result = self
                .channel_items(channel, users, range, token, &mut profiles)
                .await;
            if let Err(ref e) = result {
                warn!("Failed to read Slack channel {}: {}", channel, e);
                if e.message.contains("not_in_channel") {
                    warn!("Bot needs to be invited to channel {}", channel);
                }
            }
            results.push(result);
        }

        let read = results.iter().filter(|r| r.is_ok()).count();
        match combine_channels(results) {
            Ok(items) => {
                info!("Slack: {} messages from {} channels", items.len(), read);
                ActivityRecord::success(self.kind(), scope.id(), items)
            }
            Err(e) => ActivityRecord::failure(self.kind(), scope.id(), e),
        }
    }
}

/// Join per-channel results in channel order.
///
/// Failed channels are dropped. Only when every channel failed is the
/// first error returned.
fn combine_channels(
    results: Vec<Result<Vec<ActivityItem>, ScopeError>>,
) -> Result<Vec<ActivityItem>, ScopeError> {
    let total = results.len();
    let mut items = Vec::new();
    let mut failed = 0;
    let mut first_error = None;

    for result in results {
        match result {
            Ok(found) => items.extend(found),
            Err(e) => {
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if failed == total => Err(e),
        _ => Ok(items),
    }
}

/// Fail on `{"ok": false}` envelopes.
fn check_ok(body: &str, method: &str) -> Result<(), ScopeError> {
    let status: SlackStatus = decode(body, method)?;
    if status.ok {
        Ok(())
    } else {
        Err(ScopeError::transport(format!(
            "Slack {} failed: {}",
            method,
            status.error.unwrap_or_else(|| "unknown_error".to_string())
        )))
    }
}

/// Messages written by a person, excluding bot and membership notices.
fn is_member_message(message: &SlackMessage) -> bool {
    if let Some(subtype) = message.subtype.as_deref() {
        if SKIPPED_SUBTYPES.contains(&subtype) {
            return false;
        }
    }
    message.user.is_some()
}

/// Whether a sender matches the allow-list. An empty list allows everyone.
pub fn sender_allowed(allow: &[String], display_name: &str, real_name: &str) -> bool {
    let allow: Vec<String> = allow
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();
    if allow.is_empty() {
        return true;
    }

    let display = display_name.to_lowercase();
    let real = real_name.to_lowercase();
    allow
        .iter()
        .any(|a| display.contains(a.as_str()) || real.contains(a.as_str()))
}

fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, _) = ts.split_once('.').unwrap_or((ts, ""));
    let secs: i64 = secs.parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn message_to_item(
    channel_id: &str,
    channel_name: &str,
    sender: &str,
    message: &SlackMessage,
) -> Result<ActivityItem, ScopeError> {
    let posted_at = parse_ts(&message.ts).ok_or_else(|| {
        ScopeError::malformed(format!("bad message timestamp {:?} in {}", message.ts, channel_id))
    })?;

    let first_line = message.text.lines().next().unwrap_or_default();
    let mut item = ActivityItem::new(
        ItemKind::Message,
        format!("{}:{}", channel_id, message.ts),
        truncate(first_line, TITLE_LIMIT),
        sender,
        "posted",
        posted_at,
    );
    if item.title != message.text {
        item.detail = Some(message.text.clone());
    }
    item.labels.push(format!("#{}", channel_name));
    if message.reply_count > 0 {
        item.labels.push(format!("replies:{}", message.reply_count));
    }
    Ok(item)
}
