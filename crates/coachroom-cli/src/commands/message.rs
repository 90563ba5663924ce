use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use std::path::PathBuf;

use coachroom_core::{build_feed, generate_daily_messages, resolve_action, Message, MetricsSnapshot};

use super::open_session;

#[derive(Subcommand)]
pub enum MessageAction {
    /// Generate drafts from a metrics snapshot and admit them
    Generate {
        /// Path to a JSON metrics snapshot
        #[arg(long)]
        metrics: PathBuf,
    },
    /// Show the ranked feed of active messages
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a message as read
    Read {
        /// Message ID
        id: String,
    },
    /// Mark every active message as read
    ReadAll,
    /// Dismiss a message (feeds the topic backoff)
    Dismiss {
        /// Message ID
        id: String,
    },
    /// Remove expired messages
    Expire,
    /// Resolve where tapping a message navigates, and mark it read
    Action {
        /// Message ID
        id: String,
    },
}

fn print_line(message: &Message) {
    let marker = if message.read { " " } else { "*" };
    println!(
        "{marker} [{}] {:<11} {:<10} {}  ({})",
        message.priority,
        message.message_type.to_string(),
        message.topic.as_str(),
        message.title,
        message.id
    );
}

pub async fn run(
    action: MessageAction,
    at: Option<DateTime<FixedOffset>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(at).await?;

    match action {
        MessageAction::Generate { metrics } => {
            let raw = std::fs::read_to_string(&metrics)?;
            let snapshot: MetricsSnapshot = serde_json::from_str(&raw)?;
            let preferences = session.config.preferences();
            let drafts = generate_daily_messages(&snapshot, &preferences, session.clock.now());
            let generated = drafts.len();
            let admitted = session
                .center
                .add_messages(drafts, &mut session.ledger)
                .await;
            println!("generated {generated} drafts, admitted {}", admitted.len());
            for id in admitted {
                println!("  {id}");
            }
        }
        MessageAction::List { json } => {
            let feed = build_feed(&session.center, &session.ledger);
            if json {
                println!("{}", serde_json::to_string_pretty(&feed)?);
            } else {
                println!("Unread: {}", feed.unread_count);
                match &feed.featured {
                    Some(featured) => {
                        println!("Featured:");
                        print_line(featured);
                    }
                    None => println!("No active messages."),
                }
                for (message_type, group) in &feed.by_type {
                    println!("{message_type}:");
                    for message in group {
                        print_line(message);
                    }
                }
            }
        }
        MessageAction::Read { id } => {
            if session.center.get(&id).is_none() {
                return Err(format!("message not found: {id}").into());
            }
            session.center.mark_as_read(&id).await;
            println!("marked read: {id}");
        }
        MessageAction::ReadAll => {
            session.center.mark_all_as_read().await;
            println!("all messages marked read");
        }
        MessageAction::Dismiss { id } => {
            let topic = match session.center.get(&id) {
                Some(message) => message.topic,
                None => return Err(format!("message not found: {id}").into()),
            };
            session.center.dismiss(&id, &mut session.ledger).await;
            println!(
                "dismissed: {id} ({topic} cooldown now {}h)",
                session.ledger.topic_cooldown_hours(topic)
            );
        }
        MessageAction::Expire => {
            let removed = session.center.clear_expired().await;
            println!("removed {removed} expired messages");
        }
        MessageAction::Action { id } => {
            let target = match session.center.get(&id) {
                Some(message) => resolve_action(message),
                None => return Err(format!("message not found: {id}").into()),
            };
            session.center.mark_as_read(&id).await;
            match target.param {
                Some(param) => println!("{} {param}", target.route),
                None => println!("{}", target.route),
            }
        }
    }
    Ok(())
}
