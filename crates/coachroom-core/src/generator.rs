//! Threshold rules that turn a daily metrics snapshot into message drafts.
//!
//! Generation is pure: no storage, no clock reads. Each rule emits at most
//! one draft, keyed by rule id and local date so the same advice cannot be
//! admitted twice on one calendar day.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::message::{MessageDraft, MessagePriority, MessageType, Topic};

/// Streak lengths worth celebrating.
pub const STREAK_MILESTONES: [u32; 7] = [3, 7, 14, 30, 60, 100, 365];

/// Hours without a logged meal before a reminder fires.
pub const MEAL_GAP_HOURS: i64 = 6;

/// Daily treat allowance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaisirBudget {
    pub available: bool,
    /// kcal allowed per treat meal.
    pub max_per_meal: u32,
    pub remaining_meals: u32,
}

/// Current intermittent-fasting window, if the user runs one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastingWindow {
    pub active: bool,
    pub ends_at: DateTime<Utc>,
}

/// Today's figures, produced by the metrics provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsSnapshot {
    pub calories_consumed: f64,
    pub calories_target: f64,
    pub protein_g: f64,
    pub protein_target_g: f64,
    pub carbs_g: f64,
    pub carbs_target_g: f64,
    pub fat_g: f64,
    pub fat_target_g: f64,
    /// Percent of the hydration goal, may exceed 100.
    pub hydration_percent: f64,
    pub sleep_hours: Option<f64>,
    pub streak_days: u32,
    pub last_meal_at: Option<DateTime<Utc>>,
    pub steps: Option<u32>,
    pub steps_goal: u32,
    pub fasting: Option<FastingWindow>,
    pub plaisir: PlaisirBudget,
}

/// User-controlled generation preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub enabled_topics: BTreeSet<Topic>,
    pub max_push_per_day: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled_topics: Topic::ALL.into_iter().collect(),
            max_push_per_day: 3,
        }
    }
}

/// Meal slot inferred from the local hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

impl MealSlot {
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            0..=10 => MealSlot::Breakfast,
            11..=14 => MealSlot::Lunch,
            15..=17 => MealSlot::Snack,
            _ => MealSlot::Dinner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Snack => "snack",
            MealSlot::Dinner => "dinner",
        }
    }
}

struct RuleContext<'a> {
    metrics: &'a MetricsSnapshot,
    now: DateTime<FixedOffset>,
    date_key: String,
    end_of_day: DateTime<Utc>,
}

impl RuleContext<'_> {
    #[allow(clippy::too_many_arguments)]
    fn draft(
        &self,
        rule_id: &str,
        topic: Topic,
        message_type: MessageType,
        priority: MessagePriority,
        title: String,
        body: String,
        route: &str,
    ) -> MessageDraft {
        MessageDraft {
            topic,
            message_type,
            priority,
            title,
            body,
            route: route.to_string(),
            dedup_key: format!("{rule_id}-{}", self.date_key),
            expires_at: Some(self.end_of_day),
        }
    }

    fn hour(&self) -> u32 {
        self.now.hour()
    }

    /// Fraction of the local day already elapsed, in `[0, 1)`.
    fn day_elapsed(&self) -> f64 {
        f64::from(self.now.num_seconds_from_midnight()) / 86_400.0
    }
}

fn percent(value: f64, target: f64) -> Option<f64> {
    (target > 0.0).then(|| value / target * 100.0)
}

type Rule = fn(&RuleContext<'_>) -> Option<MessageDraft>;

const RULES: &[Rule] = &[
    calories_over,
    meal_reminder,
    protein_low,
    hydration_low,
    streak_milestone,
    sleep_short,
    plaisir_available,
    activity_low,
    on_track,
    fasting_window,
];

fn calories_over(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let m = ctx.metrics;
    let pct = percent(m.calories_consumed, m.calories_target)?;
    (pct >= 110.0).then(|| {
        ctx.draft(
            "calories-over",
            Topic::Nutrition,
            MessageType::Alert,
            MessagePriority::P1,
            "Above your calorie target".into(),
            format!(
                "You're at {:.0}% of today's {:.0} kcal. A light, protein-rich dinner keeps the week on track.",
                pct, m.calories_target
            ),
            "journal",
        )
    })
}

fn meal_reminder(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let hour = ctx.hour();
    if !(6..22).contains(&hour) {
        return None;
    }
    let overdue = match ctx.metrics.last_meal_at {
        None => true,
        Some(last) => ctx.now.with_timezone(&Utc) - last > Duration::hours(MEAL_GAP_HOURS),
    };
    if !overdue {
        return None;
    }
    let meal = MealSlot::for_hour(hour).as_str();
    Some(ctx.draft(
        &format!("meal-reminder-{meal}"),
        Topic::Nutrition,
        MessageType::Action,
        MessagePriority::P1,
        format!("Time to log your {meal}"),
        format!("No meal logged for over {MEAL_GAP_HOURS} hours. Add your {meal} to keep your day accurate."),
        "add-meal",
    ))
}

fn protein_low(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let m = ctx.metrics;
    let pct = percent(m.protein_g, m.protein_target_g)?;
    (pct < 80.0 && ctx.day_elapsed() > 0.7).then(|| {
        ctx.draft(
            "protein-low",
            Topic::Nutrition,
            MessageType::Tip,
            MessagePriority::P2,
            "Protein is running low".into(),
            format!(
                "{:.0} g of {:.0} g so far. Eggs, yogurt or legumes can close the gap.",
                m.protein_g, m.protein_target_g
            ),
            "journal",
        )
    })
}

fn hydration_low(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let pct = ctx.metrics.hydration_percent;
    (pct < 50.0 && ctx.hour() >= 14).then(|| {
        ctx.draft(
            "hydration-low",
            Topic::Hydration,
            MessageType::Action,
            MessagePriority::P1,
            "Drink a glass of water".into(),
            format!("You're at {pct:.0}% of your hydration goal this afternoon."),
            "hydration",
        )
    })
}

fn streak_milestone(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let days = ctx.metrics.streak_days;
    STREAK_MILESTONES.contains(&days).then(|| {
        ctx.draft(
            &format!("streak-{days}"),
            Topic::Progress,
            MessageType::Celebration,
            MessagePriority::P2,
            format!("{days}-day streak!"),
            format!("You've logged {days} days in a row. Keep it going."),
            "progress",
        )
    })
}

fn sleep_short(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let hours = ctx.metrics.sleep_hours?;
    (hours < 6.0).then(|| {
        ctx.draft(
            "sleep-short",
            Topic::Sleep,
            MessageType::Insight,
            MessagePriority::P2,
            "Short night".into(),
            format!("{hours:.1} h of sleep can raise cravings today. Plan a filling breakfast."),
            "sleep",
        )
    })
}

fn plaisir_available(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let budget = &ctx.metrics.plaisir;
    (budget.available && budget.remaining_meals > 0).then(|| {
        ctx.draft(
            "plaisir-available",
            Topic::Wellness,
            MessageType::Tip,
            MessagePriority::P3,
            "Your plaisir budget is ready".into(),
            format!(
                "Up to {} kcal per meal for {} more meal(s) this week.",
                budget.max_per_meal, budget.remaining_meals
            ),
            "plaisir",
        )
    })
}

fn activity_low(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let m = ctx.metrics;
    let steps = m.steps?;
    let pct = percent(f64::from(steps), f64::from(m.steps_goal))?;
    (pct < 50.0 && ctx.hour() >= 17).then(|| {
        ctx.draft(
            "activity-low",
            Topic::Activity,
            MessageType::Action,
            MessagePriority::P2,
            "A short walk?".into(),
            format!("{steps} of {} steps so far. Ten minutes outside helps.", m.steps_goal),
            "activity",
        )
    })
}

fn on_track(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let m = ctx.metrics;
    let pct = percent(m.calories_consumed, m.calories_target)?;
    (ctx.hour() >= 19 && (90.0..=105.0).contains(&pct)).then(|| {
        ctx.draft(
            "on-track",
            Topic::Motivation,
            MessageType::Celebration,
            MessagePriority::P3,
            "Right on target".into(),
            format!("{pct:.0}% of your calories, nicely balanced. Great day."),
            "progress",
        )
    })
}

fn fasting_window(ctx: &RuleContext<'_>) -> Option<MessageDraft> {
    let fasting = ctx.metrics.fasting.as_ref().filter(|f| f.active)?;
    let remaining = fasting.ends_at - ctx.now.with_timezone(&Utc);
    (remaining > Duration::zero() && remaining <= Duration::hours(1)).then(|| {
        ctx.draft(
            "fasting-window",
            Topic::Fasting,
            MessageType::Insight,
            MessagePriority::P2,
            "Fast almost complete".into(),
            format!(
                "{} minutes left. Break it with protein and vegetables.",
                remaining.num_minutes().max(1)
            ),
            "fasting",
        )
    })
}

fn end_of_local_day(now: DateTime<FixedOffset>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    now.offset()
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::hours(24))
}

/// Evaluate every rule against `metrics` at `now`, dropping drafts for
/// topics the user disabled.
pub fn generate_daily_messages(
    metrics: &MetricsSnapshot,
    preferences: &Preferences,
    now: DateTime<FixedOffset>,
) -> Vec<MessageDraft> {
    let ctx = RuleContext {
        metrics,
        now,
        date_key: now.date_naive().format("%Y-%m-%d").to_string(),
        end_of_day: end_of_local_day(now),
    };

    RULES
        .iter()
        .filter_map(|rule| rule(&ctx))
        .filter(|draft| preferences.enabled_topics.contains(&draft.topic))
        .collect()
}
