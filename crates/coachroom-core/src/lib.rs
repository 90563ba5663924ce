//! # Coachroom Core Library
//!
//! Adaptive coaching notification engine: decides which coaching message a
//! user sees, when, and how often, given a daily metrics snapshot and the
//! user's engagement history.
//!
//! ## Architecture
//!
//! - **Ledger**: per-topic show/dismiss/push history, dismissal backoff,
//!   daily push budget and the learned engagement window
//! - **Generator**: pure threshold rules mapping metrics to message drafts
//! - **Message Center**: owned message set with cooldown and dedup-key
//!   admission, read/dismiss/expire
//! - **Scheduler**: stable ranking of active messages for display
//! - **Storage**: async key-value adapters (SQLite, in-memory) and versioned
//!   blob encoding
//!
//! All time reads go through an injected [`Clock`].
//!
//! ## Key Components
//!
//! - [`Ledger`]: engagement and cooldown ledger
//! - [`MessageCenter`]: admission and message lifecycle
//! - [`generate_daily_messages`]: draft generation
//! - [`build_feed`]: ranked display feed

pub mod center;
pub mod clock;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod message;
pub mod scheduler;
pub mod storage;

pub use center::{Admission, MessageCenter};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, StorageError};
pub use generator::{generate_daily_messages, FastingWindow, MetricsSnapshot, PlaisirBudget, Preferences};
pub use ledger::{CoachState, EngagementPattern, Ledger, PushDecision, TopicState};
pub use message::{Message, MessageDraft, MessagePriority, MessageType, Topic};
pub use scheduler::{build_feed, rank_messages, resolve_action, ActionTarget, RankedFeed};
pub use storage::{Config, KeyValueStore, MemoryStore, SqliteStore};
