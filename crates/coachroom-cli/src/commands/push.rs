use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use serde_json::json;

use coachroom_core::{PushDecision, Topic};

use super::open_session;

#[derive(Subcommand)]
pub enum PushAction {
    /// Check whether a push may be sent now
    Check,
    /// Record that a push for a topic was delivered
    Record {
        /// Topic (nutrition, hydration, fasting, sleep, activity, progress, wellness, motivation)
        topic: Topic,
    },
}

pub async fn open(at: Option<DateTime<FixedOffset>>) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(at).await?;
    session.ledger.record_app_open().await;
    let engagement = session.ledger.state().engagement();
    println!(
        "app open recorded (preferred hours {:?}, {} days since active)",
        engagement.preferred_hours, engagement.days_since_active
    );
    Ok(())
}

pub async fn run(
    action: PushAction,
    at: Option<DateTime<FixedOffset>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(at).await?;
    let max_push_per_day = session.config.preferences().max_push_per_day;
    session.ledger.reset_daily_push_count().await;

    match action {
        PushAction::Check => {
            match session.ledger.push_decision(max_push_per_day) {
                PushDecision::Allowed => println!("allowed"),
                PushDecision::DailyBudgetExhausted => {
                    println!("blocked: daily budget of {max_push_per_day} exhausted")
                }
                PushDecision::TooSoon => println!("blocked: last push was too recent"),
            }
            if !session.ledger.is_in_preferred_window() {
                println!("note: outside the preferred engagement window");
            }
        }
        PushAction::Record { topic } => {
            let decision = session.ledger.push_decision(max_push_per_day);
            if !decision.is_allowed() {
                tracing::warn!(?decision, %topic, "recording a push the gate would have blocked");
            }
            session.ledger.record_message_shown(topic, true).await;
            println!(
                "push recorded: {topic} ({}/{max_push_per_day} today)",
                session.ledger.state().push_count_today()
            );
        }
    }
    Ok(())
}

pub async fn show_ledger(
    json: bool,
    at: Option<DateTime<FixedOffset>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(at).await?;
    let ledger = &session.ledger;
    let state = ledger.state();

    if json {
        let topics: Vec<_> = Topic::ALL
            .into_iter()
            .map(|topic| {
                let ts = state.topic_state(topic);
                json!({
                    "topic": topic,
                    "lastShownAt": ts.last_shown_at,
                    "dismissCount": ts.dismiss_count,
                    "lastDismissAt": ts.last_dismiss_at,
                    "cooldownHours": ledger.topic_cooldown_hours(topic),
                    "priority": ledger.topic_priority(topic),
                })
            })
            .collect();
        let out = json!({
            "pushCountToday": state.push_count_today(),
            "engagement": state.engagement(),
            "topics": topics,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let engagement = state.engagement();
    println!("Pushes today: {}", state.push_count_today());
    println!("Preferred hours: {:?}", engagement.preferred_hours);
    println!("Days since active: {}", engagement.days_since_active);
    println!();
    println!("{:<11} {:>9} {:>9} {:>8}  last shown", "topic", "dismissed", "cooldown", "priority");
    for topic in Topic::ALL {
        let ts = state.topic_state(topic);
        let last = ts
            .last_shown_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".into());
        println!(
            "{:<11} {:>9} {:>8}h {:>8}  {last}",
            topic.as_str(),
            ts.dismiss_count,
            ledger.topic_cooldown_hours(topic),
            ledger.topic_priority(topic),
        );
    }
    Ok(())
}
