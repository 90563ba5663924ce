//! Priority scheduler: ranks active messages for display.
//!
//! Ordering is a stable total order on (priority, ledger topic score,
//! newest first), so re-ranking on every render keeps the same layout.

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::center::MessageCenter;
use crate::ledger::{CoachState, Ledger};
use crate::message::{Message, MessageType, Topic};

static MEAL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^meal-reminder-(breakfast|lunch|snack|dinner)-\d{4}-\d{2}-\d{2}$")
        .expect("meal pattern is valid")
});

static STREAK_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^streak-(\d+)-\d{4}-\d{2}-\d{2}$").expect("streak pattern is valid")
});

/// Ranked view handed to the display layer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFeed {
    /// Top-ranked message, surfaced on its own.
    pub featured: Option<Message>,
    /// Everything else, grouped by type, each group in rank order.
    pub by_type: BTreeMap<MessageType, Vec<Message>>,
    pub unread_count: usize,
}

/// Where a tap on a message should navigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionTarget {
    pub route: String,
    /// Sub-parameter pulled from the dedup key, e.g. the meal type.
    pub param: Option<String>,
}

/// Sort `messages` for display against the ledger state at `now`.
pub fn rank_messages<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
    state: &CoachState,
    now: DateTime<FixedOffset>,
) -> Vec<&'a Message> {
    let mut scores: HashMap<Topic, u8> = HashMap::new();
    let mut ranked: Vec<&Message> = messages.into_iter().collect();
    for m in &ranked {
        scores
            .entry(m.topic)
            .or_insert_with(|| state.topic_priority(m.topic, now));
    }
    ranked.sort_by_key(|m| (m.priority, scores[&m.topic], Reverse(m.created_at)));
    ranked
}

/// Rank the center's active messages into a feed.
pub fn build_feed(center: &MessageCenter, ledger: &Ledger) -> RankedFeed {
    let now = ledger.now();
    let active = center.active_messages_at(now.with_timezone(&Utc));
    let unread_count = active.iter().filter(|m| !m.read).count();

    let mut ranked = rank_messages(active, ledger.state(), now).into_iter();
    let featured = ranked.next().cloned();

    let mut by_type: BTreeMap<MessageType, Vec<Message>> = BTreeMap::new();
    for message in ranked {
        by_type
            .entry(message.message_type)
            .or_default()
            .push(message.clone());
    }

    RankedFeed {
        featured,
        by_type,
        unread_count,
    }
}

/// Resolve the navigation target for a tapped message.
pub fn resolve_action(message: &Message) -> ActionTarget {
    let param = MEAL_PARAM
        .captures(&message.dedup_key)
        .or_else(|| STREAK_PARAM.captures(&message.dedup_key))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    ActionTarget {
        route: message.route.clone(),
        param,
    }
}
