//! The ledger aggregate and its admission policy.
//!
//! Every method takes the caller's `now` so one operation never reads the
//! clock twice.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::engagement::{AppOpen, EngagementPattern, HISTORY_CAP, PERSISTED_HISTORY_CAP};
use crate::message::Topic;
use crate::storage::{decode_each, encode_blob, BlobReader};

/// Minimum spacing between any two pushes, across topics.
pub const GLOBAL_PUSH_SPACING_HOURS: f64 = 2.0;

/// Upper bound on the dismissal backoff multiplier.
pub const MAX_DISMISS_MULTIPLIER: f64 = 4.0;

/// Backoff added per dismissal.
pub const DISMISS_STEP: f64 = 0.5;

const PRIORITY_BASE: i64 = 50;
const PRIORITY_MAX_DECAY: f64 = 30.0;
const PRIORITY_DECAY_PER_HOUR: f64 = 2.0;
const PRIORITY_PER_DISMISS: i64 = 10;

/// Per-topic show/push/dismiss history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicState {
    #[serde(default)]
    pub last_shown_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_push_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dismiss_count: u32,
    #[serde(default)]
    pub last_dismiss_at: Option<DateTime<Utc>>,
}

impl TopicState {
    fn from_reader(fields: &BlobReader) -> Self {
        Self {
            last_shown_at: fields.field("lastShownAt"),
            last_push_at: fields.field("lastPushAt"),
            dismiss_count: fields.field_or("dismissCount", 0),
            last_dismiss_at: fields.field("lastDismissAt"),
        }
    }
}

/// Why a push is or is not allowed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDecision {
    Allowed,
    /// `pushCountToday` reached the daily maximum.
    DailyBudgetExhausted,
    /// Another push went out less than two hours ago.
    TooSoon,
}

impl PushDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, PushDecision::Allowed)
    }
}

/// Engagement and cooldown ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachState {
    topic_states: BTreeMap<Topic, TopicState>,
    last_push_at: Option<DateTime<Utc>>,
    push_count_today: u32,
    last_push_count_reset_date: Option<NaiveDate>,
    engagement: EngagementPattern,
    app_open_history: Vec<AppOpen>,
}

impl Default for CoachState {
    fn default() -> Self {
        Self {
            topic_states: Topic::ALL
                .into_iter()
                .map(|t| (t, TopicState::default()))
                .collect(),
            last_push_at: None,
            push_count_today: 0,
            last_push_count_reset_date: None,
            engagement: EngagementPattern::default(),
            app_open_history: Vec::new(),
        }
    }
}

/// Persisted shape. History is truncated on the way out.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLedger<'a> {
    topic_states: &'a BTreeMap<Topic, TopicState>,
    last_push_at: Option<DateTime<Utc>>,
    push_count_today: u32,
    last_push_count_reset_date: Option<NaiveDate>,
    engagement: &'a EngagementPattern,
    app_open_history: &'a [AppOpen],
}

fn hours_between(then: DateTime<Utc>, now: DateTime<FixedOffset>) -> f64 {
    (now.with_timezone(&Utc) - then).num_milliseconds() as f64 / 3_600_000.0
}

impl CoachState {
    pub fn topic_state(&self, topic: Topic) -> &TopicState {
        // Every topic is inserted at construction and on load.
        &self.topic_states[&topic]
    }

    fn topic_state_mut(&mut self, topic: Topic) -> &mut TopicState {
        self.topic_states.entry(topic).or_default()
    }

    pub fn last_push_at(&self) -> Option<DateTime<Utc>> {
        self.last_push_at
    }

    pub fn push_count_today(&self) -> u32 {
        self.push_count_today
    }

    pub fn last_push_count_reset_date(&self) -> Option<NaiveDate> {
        self.last_push_count_reset_date
    }

    pub fn engagement(&self) -> &EngagementPattern {
        &self.engagement
    }

    /// Most recent first.
    pub fn app_open_history(&self) -> &[AppOpen] {
        &self.app_open_history
    }

    // ── recording ───────────────────────────────────────────────────────

    pub fn record_app_open(&mut self, now: DateTime<FixedOffset>) {
        self.app_open_history.insert(0, AppOpen::at(now));
        self.app_open_history.truncate(HISTORY_CAP);
        self.engagement.observe_open(&self.app_open_history, now);
        self.reset_daily_push_count(now);
    }

    /// Zero the push counter on the first call of a new local day. Returns
    /// whether anything changed.
    pub fn reset_daily_push_count(&mut self, now: DateTime<FixedOffset>) -> bool {
        let today = now.date_naive();
        if self.last_push_count_reset_date == Some(today) {
            return false;
        }
        self.push_count_today = 0;
        self.last_push_count_reset_date = Some(today);
        true
    }

    pub fn record_message_shown(&mut self, topic: Topic, was_push: bool, now: DateTime<FixedOffset>) {
        let now = now.with_timezone(&Utc);
        let state = self.topic_state_mut(topic);
        state.last_shown_at = Some(now);
        if was_push {
            state.last_push_at = Some(now);
            self.last_push_at = Some(now);
            self.push_count_today = self.push_count_today.saturating_add(1);
        }
    }

    pub fn record_dismiss(&mut self, topic: Topic, now: DateTime<FixedOffset>) {
        let state = self.topic_state_mut(topic);
        state.dismiss_count = state.dismiss_count.saturating_add(1);
        state.last_dismiss_at = Some(now.with_timezone(&Utc));
    }

    // ── policy ──────────────────────────────────────────────────────────

    /// `min(4, 1 + 0.5 × dismissCount)`.
    pub fn dismiss_multiplier(&self, topic: Topic) -> f64 {
        let dismissals = f64::from(self.topic_state(topic).dismiss_count);
        (1.0 + dismissals * DISMISS_STEP).min(MAX_DISMISS_MULTIPLIER)
    }

    pub fn can_show_topic(&self, topic: Topic, min_hours_since_shown: f64, now: DateTime<FixedOffset>) -> bool {
        match self.topic_state(topic).last_shown_at {
            None => true,
            Some(shown) => {
                hours_between(shown, now) >= min_hours_since_shown * self.dismiss_multiplier(topic)
            }
        }
    }

    pub fn push_decision(&self, max_push_per_day: u32, now: DateTime<FixedOffset>) -> PushDecision {
        if self.push_count_today >= max_push_per_day {
            return PushDecision::DailyBudgetExhausted;
        }
        if let Some(last) = self.last_push_at {
            if hours_between(last, now) < GLOBAL_PUSH_SPACING_HOURS {
                return PushDecision::TooSoon;
            }
        }
        PushDecision::Allowed
    }

    pub fn can_send_push(&self, max_push_per_day: u32, now: DateTime<FixedOffset>) -> bool {
        self.push_decision(max_push_per_day, now).is_allowed()
    }

    /// Base cooldown scaled by dismissal backoff, rounded to the nearest hour.
    pub fn topic_cooldown_hours(&self, topic: Topic) -> u32 {
        (f64::from(topic.base_cooldown_hours()) * self.dismiss_multiplier(topic)).round() as u32
    }

    pub fn is_in_preferred_window(&self, now: DateTime<FixedOffset>) -> bool {
        self.engagement.is_preferred_hour(now.hour() as u8)
    }

    /// Engagement score in `[0, 100]`; lower means show sooner.
    pub fn topic_priority(&self, topic: Topic, now: DateTime<FixedOffset>) -> u8 {
        let state = self.topic_state(topic);
        let decay = match state.last_shown_at {
            None => PRIORITY_MAX_DECAY,
            Some(shown) => {
                (hours_between(shown, now).max(0.0) * PRIORITY_DECAY_PER_HOUR).min(PRIORITY_MAX_DECAY)
            }
        };
        let penalty = i64::from(state.dismiss_count).saturating_mul(PRIORITY_PER_DISMISS);
        let score = PRIORITY_BASE
            .saturating_sub(decay.round() as i64)
            .saturating_add(penalty);
        score.clamp(0, 100) as u8
    }

    // ── persistence ─────────────────────────────────────────────────────

    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        let keep = self.app_open_history.len().min(PERSISTED_HISTORY_CAP);
        encode_blob(&PersistedLedger {
            topic_states: &self.topic_states,
            last_push_at: self.last_push_at,
            push_count_today: self.push_count_today,
            last_push_count_reset_date: self.last_push_count_reset_date,
            engagement: &self.engagement,
            app_open_history: &self.app_open_history[..keep],
        })
    }

    /// Decode a persisted ledger, recovering each field independently.
    pub fn from_blob(raw: &str) -> Self {
        let Some(blob) = BlobReader::parse(raw, "ledger") else {
            return Self::default();
        };

        let mut state = Self::default();

        if let Some(topics) = blob.object("topicStates") {
            for topic in Topic::ALL {
                if let Some(fields) = topics.object(topic.as_str()) {
                    state.topic_states.insert(topic, TopicState::from_reader(&fields));
                }
            }
        }

        state.last_push_at = blob.field("lastPushAt");
        state.push_count_today = blob.field_or("pushCountToday", 0);
        state.last_push_count_reset_date = blob.field("lastPushCountResetDate");

        if let Some(fields) = blob.object("engagement") {
            state.engagement = EngagementPattern::from_reader(&fields);
        }

        let mut history: Vec<AppOpen> = decode_each(blob.raw("appOpenHistory"), "appOpenHistory");
        history.retain(|open| open.hour < 24);
        history.truncate(PERSISTED_HISTORY_CAP);
        state.app_open_history = history;

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap().fixed_offset()
    }

    #[test]
    fn default_has_every_topic() {
        let state = CoachState::default();
        for topic in Topic::ALL {
            assert_eq!(state.topic_state(topic), &TopicState::default());
        }
    }

    #[test]
    fn never_shown_topic_is_showable() {
        let state = CoachState::default();
        assert!(state.can_show_topic(Topic::Progress, 24.0, t0()));
    }

    #[test]
    fn hydration_backoff_after_one_dismiss() {
        let mut state = CoachState::default();
        state.record_message_shown(Topic::Hydration, false, t0());
        state.record_dismiss(Topic::Hydration, t0());

        assert!(!state.can_show_topic(Topic::Hydration, 2.0, t0() + Duration::hours(2)));
        assert!(state.can_show_topic(Topic::Hydration, 2.0, t0() + Duration::hours(3)));
    }

    #[test]
    fn cooldown_is_capped_at_four_times_base() {
        let mut state = CoachState::default();
        let mut last = state.topic_cooldown_hours(Topic::Progress);
        assert_eq!(last, 24);
        for _ in 0..10 {
            state.record_dismiss(Topic::Progress, t0());
            let next = state.topic_cooldown_hours(Topic::Progress);
            assert!(next >= last);
            last = next;
        }
        assert_eq!(last, 96);
    }

    #[test]
    fn cooldown_rounds_to_nearest_hour() {
        let mut state = CoachState::default();
        state.record_dismiss(Topic::Fasting, t0());
        // 6 × 1.5
        assert_eq!(state.topic_cooldown_hours(Topic::Fasting), 9);
        state.record_dismiss(Topic::Hydration, t0());
        // 2 × 1.5
        assert_eq!(state.topic_cooldown_hours(Topic::Hydration), 3);
    }

    #[test]
    fn push_budget_and_spacing() {
        let mut state = CoachState::default();
        state.reset_daily_push_count(t0());
        state.record_message_shown(Topic::Nutrition, true, t0());
        state.record_message_shown(Topic::Sleep, true, t0() + Duration::hours(3));

        let later = t0() + Duration::hours(3) + Duration::minutes(90);
        assert_eq!(state.push_count_today(), 2);
        assert_eq!(state.push_decision(3, later), PushDecision::TooSoon);
        assert!(state.can_send_push(3, later + Duration::minutes(30)));
        assert_eq!(state.push_decision(2, later + Duration::hours(5)), PushDecision::DailyBudgetExhausted);
    }

    #[test]
    fn non_push_show_does_not_touch_budget() {
        let mut state = CoachState::default();
        state.record_message_shown(Topic::Wellness, false, t0());
        assert_eq!(state.push_count_today(), 0);
        assert!(state.last_push_at().is_none());
        assert!(state.topic_state(Topic::Wellness).last_push_at.is_none());
    }

    #[test]
    fn reset_is_idempotent_within_a_day() {
        let mut state = CoachState::default();
        assert!(state.reset_daily_push_count(t0()));
        state.record_message_shown(Topic::Nutrition, true, t0());
        assert!(!state.reset_daily_push_count(t0() + Duration::hours(5)));
        assert_eq!(state.push_count_today(), 1);
        assert!(state.reset_daily_push_count(t0() + Duration::days(1)));
        assert_eq!(state.push_count_today(), 0);
    }

    #[test]
    fn reset_follows_local_calendar_day() {
        let mut state = CoachState::default();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        // 23:30 local on the 12th, then 00:30 local on the 13th: one UTC day,
        // two local days.
        let late = offset.with_ymd_and_hms(2026, 1, 12, 23, 30, 0).unwrap();
        state.reset_daily_push_count(late);
        state.record_message_shown(Topic::Nutrition, true, late);
        assert!(state.reset_daily_push_count(late + Duration::hours(1)));
    }

    #[test]
    fn priority_decays_and_penalizes_dismissals() {
        let mut state = CoachState::default();
        assert_eq!(state.topic_priority(Topic::Sleep, t0()), 20);

        state.record_message_shown(Topic::Sleep, false, t0());
        assert_eq!(state.topic_priority(Topic::Sleep, t0()), 50);
        assert_eq!(state.topic_priority(Topic::Sleep, t0() + Duration::hours(5)), 40);
        assert_eq!(state.topic_priority(Topic::Sleep, t0() + Duration::hours(40)), 20);

        state.record_dismiss(Topic::Sleep, t0());
        assert_eq!(state.topic_priority(Topic::Sleep, t0() + Duration::hours(40)), 30);
        for _ in 0..20 {
            state.record_dismiss(Topic::Sleep, t0());
        }
        assert_eq!(state.topic_priority(Topic::Sleep, t0()), 100);
    }

    #[test]
    fn app_open_updates_engagement() {
        let mut state = CoachState::default();
        state.record_app_open(t0());
        assert_eq!(state.engagement().days_since_active, 0);
        assert_eq!(state.engagement().preferred_hours, vec![8, 12, 19]);

        let later = t0() + Duration::days(3) + Duration::hours(11);
        state.record_app_open(later);
        assert_eq!(state.engagement().days_since_active, 3);
        assert_eq!(state.engagement().preferred_hours, vec![20, 9]);
        assert_eq!(state.engagement().last_active_at, Some(later.with_timezone(&Utc)));
        assert_eq!(state.app_open_history()[0].hour, 20);
    }

    #[test]
    fn history_caps_at_fifty_and_persists_thirty() {
        let mut state = CoachState::default();
        for i in 0..60 {
            state.record_app_open(t0() + Duration::hours(i));
        }
        assert_eq!(state.app_open_history().len(), 50);

        let restored = CoachState::from_blob(&state.to_blob().unwrap());
        assert_eq!(restored.app_open_history().len(), 30);
        assert_eq!(restored.app_open_history()[0], state.app_open_history()[0]);
        assert_eq!(restored.engagement(), state.engagement());
    }

    #[test]
    fn blob_restores_counters() {
        let mut state = CoachState::default();
        state.record_app_open(t0());
        state.record_message_shown(Topic::Hydration, true, t0());
        state.record_dismiss(Topic::Hydration, t0());

        let restored = CoachState::from_blob(&state.to_blob().unwrap());
        assert_eq!(restored, state);
    }

    #[test]
    fn corrupted_fields_fall_back_individually() {
        let raw = r#"{
            "schemaVersion": 1,
            "topicStates": {
                "hydration": {"dismissCount": 2},
                "sleep": {"dismissCount": "many"}
            },
            "pushCountToday": "two",
            "lastPushCountResetDate": "2026-01-12",
            "engagement": {"preferredHours": [7, 99], "daysSinceActive": 4},
            "appOpenHistory": [{"date": "2026-01-12", "hour": 7}, {"hour": "x"}]
        }"#;
        let state = CoachState::from_blob(raw);
        assert_eq!(state.topic_state(Topic::Hydration).dismiss_count, 2);
        assert_eq!(state.topic_state(Topic::Sleep).dismiss_count, 0);
        assert_eq!(state.topic_state(Topic::Progress), &TopicState::default());
        assert_eq!(state.push_count_today(), 0);
        assert_eq!(state.last_push_count_reset_date(), NaiveDate::from_ymd_opt(2026, 1, 12));
        assert_eq!(state.engagement().preferred_hours, vec![7]);
        assert_eq!(state.engagement().days_since_active, 4);
        assert_eq!(state.app_open_history().len(), 1);
    }

    #[test]
    fn bad_topic_field_keeps_its_siblings() {
        let raw = r#"{
            "schemaVersion": 1,
            "topicStates": {
                "hydration": {"lastShownAt": "2026-01-12T09:00:00Z", "dismissCount": "many"},
                "sleep": "not an object"
            }
        }"#;
        let state = CoachState::from_blob(raw);
        let hydration = state.topic_state(Topic::Hydration);
        assert_eq!(hydration.last_shown_at, Some(t0().with_timezone(&Utc)));
        assert_eq!(hydration.dismiss_count, 0);
        assert!(!state.can_show_topic(Topic::Hydration, 2.0, t0() + Duration::minutes(30)));
        assert_eq!(state.topic_state(Topic::Sleep), &TopicState::default());
    }

    #[test]
    fn bad_engagement_field_keeps_its_siblings() {
        let raw = r#"{
            "schemaVersion": 1,
            "engagement": {
                "preferredHours": [7, 21, "noon", 300],
                "lastActiveAt": "2026-01-12T09:00:00Z",
                "daysSinceActive": -1,
                "avgSessionDuration": 7.5
            }
        }"#;
        let state = CoachState::from_blob(raw);
        let engagement = state.engagement();
        assert_eq!(engagement.preferred_hours, vec![7, 21]);
        assert_eq!(engagement.last_active_at, Some(t0().with_timezone(&Utc)));
        assert_eq!(engagement.days_since_active, 0);
        assert_eq!(engagement.avg_session_duration, 7.5);
    }

    #[test]
    fn unversioned_history_is_cut_to_persisted_cap() {
        let history: Vec<String> = (0..40)
            .map(|i| format!(r#"{{"date": "2026-01-12", "hour": {}}}"#, i % 24))
            .collect();
        let raw = format!(r#"{{"appOpenHistory": [{}]}}"#, history.join(","));
        let state = CoachState::from_blob(&raw);
        assert_eq!(state.app_open_history().len(), PERSISTED_HISTORY_CAP);
        assert_eq!(state.app_open_history()[0].hour, 0);
    }

    #[test]
    fn garbage_blob_yields_defaults() {
        assert_eq!(CoachState::from_blob("not json"), CoachState::default());
        assert_eq!(CoachState::from_blob("42"), CoachState::default());
    }
}
