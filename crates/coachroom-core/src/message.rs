//! Coaching message types.
//!
//! A [`MessageDraft`] is what the generator proposes; a [`Message`] is what
//! the message center admitted and now owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coaching domain. Unit of cooldown and engagement tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Nutrition,
    Hydration,
    Fasting,
    Sleep,
    Activity,
    Progress,
    Wellness,
    Motivation,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Nutrition,
        Topic::Hydration,
        Topic::Fasting,
        Topic::Sleep,
        Topic::Activity,
        Topic::Progress,
        Topic::Wellness,
        Topic::Motivation,
    ];

    /// Hours before advice of this kind is actionable again, before any
    /// dismissal backoff.
    pub fn base_cooldown_hours(self) -> u32 {
        match self {
            Topic::Nutrition => 4,
            Topic::Hydration => 2,
            Topic::Fasting => 6,
            Topic::Sleep => 12,
            Topic::Activity => 6,
            Topic::Progress => 24,
            Topic::Wellness => 8,
            Topic::Motivation => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Nutrition => "nutrition",
            Topic::Hydration => "hydration",
            Topic::Fasting => "fasting",
            Topic::Sleep => "sleep",
            Topic::Activity => "activity",
            Topic::Progress => "progress",
            Topic::Wellness => "wellness",
            Topic::Motivation => "motivation",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown topic: '{s}'"))
    }
}

/// Presentation category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Alert,
    Action,
    Celebration,
    Tip,
    Insight,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Alert => "alert",
            MessageType::Action => "action",
            MessageType::Celebration => "celebration",
            MessageType::Tip => "tip",
            MessageType::Insight => "insight",
        };
        f.write_str(s)
    }
}

/// Display priority. `P0` is the most urgent; the derived ordering sorts
/// `P0` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessagePriority {
    P0,
    P1,
    P2,
    P3,
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A candidate message produced by the generator, not yet admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub topic: Topic,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub title: String,
    pub body: String,
    /// Deep-link target screen identifier.
    pub route: String,
    /// Unit of deduplication: rule id plus local date.
    pub dedup_key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An admitted message owned by the message center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub topic: Topic,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub title: String,
    pub body: String,
    pub route: String,
    pub dedup_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Materialize a draft with a fresh id.
    pub fn from_draft(draft: MessageDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: draft.topic,
            message_type: draft.message_type,
            priority: draft.priority,
            title: draft.title,
            body: draft.body,
            route: draft.route,
            dedup_key: draft.dedup_key,
            created_at,
            read: false,
            dismissed: false,
            expires_at: draft.expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Not dismissed and not past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.dismissed && !self.is_expired(now)
    }
}
