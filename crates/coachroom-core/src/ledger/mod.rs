//! Engagement and cooldown ledger.
//!
//! [`CoachState`] holds the per-topic show/dismiss/push history and the
//! learned engagement pattern. [`Ledger`] wraps it with an injected clock and
//! store: every mutation updates memory first, then writes the whole state
//! back. Write failures are logged and swallowed because the ledger is
//! advisory.

mod engagement;
mod state;

pub use engagement::{
    preferred_hours, AppOpen, EngagementPattern, DEFAULT_PREFERRED_HOURS, HISTORY_CAP,
    PERSISTED_HISTORY_CAP,
};
pub use state::{CoachState, PushDecision, TopicState, GLOBAL_PUSH_SPACING_HOURS};

use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

use crate::clock::Clock;
use crate::message::Topic;
use crate::storage::{KeyValueStore, LEDGER_KEY};

pub struct Ledger {
    state: CoachState,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
}

impl Ledger {
    /// A fresh ledger with defaults for every topic. Nothing is read.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: CoachState::default(),
            clock,
            store,
        }
    }

    /// Hydrate from the store. A missing, unreadable or corrupted blob
    /// falls back to defaults.
    pub async fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let state = match store.get(LEDGER_KEY).await {
            Ok(Some(raw)) => CoachState::from_blob(&raw),
            Ok(None) => CoachState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read ledger, starting fresh");
                CoachState::default()
            }
        };
        Self { state, clock, store }
    }

    pub fn state(&self) -> &CoachState {
        &self.state
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    async fn persist(&self) {
        let blob = match self.state.to_blob() {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode ledger");
                return;
            }
        };
        if let Err(e) = self.store.set(LEDGER_KEY, &blob).await {
            tracing::warn!(error = %e, "failed to persist ledger");
        }
    }

    /// Call once per app foreground.
    pub async fn record_app_open(&mut self) {
        let now = self.clock.now();
        self.state.record_app_open(now);
        tracing::debug!(
            preferred_hours = ?self.state.engagement().preferred_hours,
            days_since_active = self.state.engagement().days_since_active,
            "recorded app open"
        );
        self.persist().await;
    }

    pub async fn reset_daily_push_count(&mut self) {
        let now = self.clock.now();
        if self.state.reset_daily_push_count(now) {
            self.persist().await;
        }
    }

    pub async fn record_message_shown(&mut self, topic: Topic, was_push: bool) {
        let now = self.clock.now();
        self.record_message_shown_at(topic, was_push, now).await;
    }

    pub(crate) async fn record_message_shown_at(
        &mut self,
        topic: Topic,
        was_push: bool,
        now: DateTime<FixedOffset>,
    ) {
        self.state.record_message_shown(topic, was_push, now);
        self.persist().await;
    }

    pub async fn record_dismiss(&mut self, topic: Topic) {
        let now = self.clock.now();
        self.record_dismiss_at(topic, now).await;
    }

    pub(crate) async fn record_dismiss_at(&mut self, topic: Topic, now: DateTime<FixedOffset>) {
        self.state.record_dismiss(topic, now);
        tracing::debug!(
            topic = %topic,
            dismiss_count = self.state.topic_state(topic).dismiss_count,
            "recorded dismissal"
        );
        self.persist().await;
    }

    pub fn can_show_topic(&self, topic: Topic, min_hours_since_shown: f64) -> bool {
        self.state.can_show_topic(topic, min_hours_since_shown, self.clock.now())
    }

    pub fn can_send_push(&self, max_push_per_day: u32) -> bool {
        self.push_decision(max_push_per_day).is_allowed()
    }

    pub fn push_decision(&self, max_push_per_day: u32) -> PushDecision {
        self.state.push_decision(max_push_per_day, self.clock.now())
    }

    pub fn topic_cooldown_hours(&self, topic: Topic) -> u32 {
        self.state.topic_cooldown_hours(topic)
    }

    pub fn is_in_preferred_window(&self) -> bool {
        self.state.is_in_preferred_window(self.clock.now())
    }

    pub fn topic_priority(&self, topic: Topic) -> u8 {
        self.state.topic_priority(topic, self.clock.now())
    }
}
