//! App-open history and the engagement pattern learned from it.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::storage::{decode_each, BlobReader};

/// Hours used until the history shows at least two distinct open hours.
pub const DEFAULT_PREFERRED_HOURS: [u8; 3] = [8, 12, 19];

/// In-memory cap on app-open history.
pub const HISTORY_CAP: usize = 50;

/// Cap applied when history is persisted.
pub const PERSISTED_HISTORY_CAP: usize = 30;

const MAX_PREFERRED_HOURS: usize = 3;

/// One app foreground event, reduced to local date and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppOpen {
    pub date: NaiveDate,
    pub hour: u8,
}

impl AppOpen {
    pub fn at(now: DateTime<FixedOffset>) -> Self {
        Self {
            date: now.date_naive(),
            hour: now.hour() as u8,
        }
    }
}

/// When the user tends to open the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementPattern {
    #[serde(default = "default_preferred_hours")]
    pub preferred_hours: Vec<u8>,
    /// Minutes. Stored for consumers; not learned yet.
    #[serde(default = "default_avg_session_duration")]
    pub avg_session_duration: f64,
    #[serde(default)]
    pub days_since_active: u32,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

fn default_preferred_hours() -> Vec<u8> {
    DEFAULT_PREFERRED_HOURS.to_vec()
}
fn default_avg_session_duration() -> f64 {
    5.0
}

impl Default for EngagementPattern {
    fn default() -> Self {
        Self {
            preferred_hours: default_preferred_hours(),
            avg_session_duration: default_avg_session_duration(),
            days_since_active: 0,
            last_active_at: None,
        }
    }
}

impl EngagementPattern {
    /// Fold a new app open into the pattern. `history` must already contain
    /// the open, most recent first.
    pub fn observe_open(&mut self, history: &[AppOpen], now: DateTime<FixedOffset>) {
        self.preferred_hours = preferred_hours(history);

        let now_utc = now.with_timezone(&Utc);
        self.days_since_active = match self.last_active_at {
            Some(prev) => (now_utc - prev).num_days().max(0) as u32,
            None => 0,
        };
        self.last_active_at = Some(now_utc);
    }

    /// Whether `hour` is within one hour of a preferred hour. 23 and 0 are
    /// adjacent.
    pub fn is_preferred_hour(&self, hour: u8) -> bool {
        self.preferred_hours.iter().any(|&preferred| {
            let diff = (i16::from(hour) - i16::from(preferred)).rem_euclid(24);
            diff <= 1 || diff >= 23
        })
    }

    /// Decode a persisted pattern field by field, then repair what survived.
    pub(crate) fn from_reader(fields: &BlobReader) -> Self {
        let mut pattern = Self {
            preferred_hours: decode_each(fields.raw("preferredHours"), "preferredHours"),
            avg_session_duration: fields.field_or("avgSessionDuration", default_avg_session_duration()),
            days_since_active: fields.field_or("daysSinceActive", 0),
            last_active_at: fields.field("lastActiveAt"),
        };
        pattern.sanitize();
        pattern
    }

    /// Drop out-of-range hours left by a corrupted blob.
    pub(crate) fn sanitize(&mut self) {
        self.preferred_hours.retain(|&h| h < 24);
        self.preferred_hours.truncate(MAX_PREFERRED_HOURS);
        if self.preferred_hours.is_empty() {
            self.preferred_hours = default_preferred_hours();
        }
        if !self.avg_session_duration.is_finite() || self.avg_session_duration < 0.0 {
            self.avg_session_duration = default_avg_session_duration();
        }
    }
}

/// Top three open hours by frequency. Ties go to the hour seen most
/// recently. Falls back to [`DEFAULT_PREFERRED_HOURS`] with fewer than two
/// distinct hours.
pub fn preferred_hours(history: &[AppOpen]) -> Vec<u8> {
    // hour -> (count, index of most recent sighting)
    let mut histogram: HashMap<u8, (usize, usize)> = HashMap::new();
    for (idx, open) in history.iter().enumerate() {
        histogram
            .entry(open.hour)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, idx));
    }

    if histogram.len() < 2 {
        return default_preferred_hours();
    }

    let mut ranked: Vec<(u8, usize, usize)> = histogram
        .into_iter()
        .map(|(hour, (count, first_seen))| (hour, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(MAX_PREFERRED_HOURS)
        .map(|(hour, _, _)| hour)
        .collect()
}
