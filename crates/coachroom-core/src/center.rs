//! Message center: the owned set of coaching messages.
//!
//! Admission consults the [`Ledger`] for topic cooldowns, then enforces the
//! dedup-key invariant: at most one active message per `dedup_key`. The
//! center never owns the ledger; callers pass it in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::message::{Message, MessageDraft};
use crate::storage::{decode_each, encode_blob, BlobReader, KeyValueStore, MESSAGES_KEY};

/// Outcome of [`MessageCenter::add_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Appended with this id.
    Admitted(String),
    /// The topic was shown too recently.
    CoolingDown,
    /// An active message with the same dedup key exists.
    Duplicate,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

#[derive(Serialize)]
struct PersistedMessages<'a> {
    messages: &'a [Message],
}

fn decode_messages(raw: &str) -> Vec<Message> {
    // Unversioned blobs were a bare array of messages.
    if let Ok(value @ serde_json::Value::Array(_)) = serde_json::from_str::<serde_json::Value>(raw) {
        return decode_each(Some(&value), "messages");
    }
    match BlobReader::parse(raw, "messages") {
        Some(blob) => decode_each(blob.raw("messages"), "messages"),
        None => Vec::new(),
    }
}

pub struct MessageCenter {
    messages: Vec<Message>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
}

impl MessageCenter {
    /// An empty message set. Nothing is read.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: Vec::new(),
            clock,
            store,
        }
    }

    /// Hydrate from the store. Entries that fail to decode are dropped; the
    /// rest survive.
    pub async fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let messages = match store.get(MESSAGES_KEY).await {
            Ok(Some(raw)) => decode_messages(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read messages, starting empty");
                Vec::new()
            }
        };
        Self {
            messages,
            clock,
            store,
        }
    }

    async fn persist(&self) {
        let blob = match encode_blob(&PersistedMessages {
            messages: &self.messages,
        }) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode messages");
                return;
            }
        };
        if let Err(e) = self.store.set(MESSAGES_KEY, &blob).await {
            tracing::warn!(error = %e, "failed to persist messages");
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    /// Admit a draft if its topic is out of cooldown and no active message
    /// shares its dedup key. Admission records a (non-push) show on the
    /// ledger.
    pub async fn add_message(&mut self, draft: MessageDraft, ledger: &mut Ledger) -> Admission {
        let now = self.clock.now();
        let now_utc = now.with_timezone(&Utc);
        let topic = draft.topic;

        let cooldown = f64::from(ledger.topic_cooldown_hours(topic));
        if !ledger.state().can_show_topic(topic, cooldown, now) {
            tracing::debug!(topic = %topic, dedup_key = %draft.dedup_key, "discarding draft: topic cooling down");
            return Admission::CoolingDown;
        }

        if self
            .messages
            .iter()
            .any(|m| m.dedup_key == draft.dedup_key && m.is_active(now_utc))
        {
            tracing::debug!(dedup_key = %draft.dedup_key, "discarding draft: duplicate");
            return Admission::Duplicate;
        }

        let message = Message::from_draft(draft, now_utc);
        let id = message.id.clone();
        self.messages.push(message);
        self.persist().await;
        ledger.record_message_shown_at(topic, false, now).await;
        Admission::Admitted(id)
    }

    /// Admit a batch of drafts in order. Returns the admitted ids.
    pub async fn add_messages(&mut self, drafts: Vec<MessageDraft>, ledger: &mut Ledger) -> Vec<String> {
        let mut admitted = Vec::new();
        for draft in drafts {
            if let Admission::Admitted(id) = self.add_message(draft, ledger).await {
                admitted.push(id);
            }
        }
        admitted
    }

    pub async fn mark_as_read(&mut self, id: &str) {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return;
        };
        if message.read {
            return;
        }
        message.read = true;
        self.persist().await;
    }

    /// Mark every active message read.
    pub async fn mark_all_as_read(&mut self) {
        let now = self.now_utc();
        let mut changed = false;
        for message in self.messages.iter_mut().filter(|m| m.is_active(now) && !m.read) {
            message.read = true;
            changed = true;
        }
        if changed {
            self.persist().await;
        }
    }

    /// Dismiss a message and feed the rejection back into the ledger.
    /// Unknown or already dismissed ids are ignored.
    pub async fn dismiss(&mut self, id: &str, ledger: &mut Ledger) {
        let now = self.clock.now();
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id && !m.dismissed) else {
            return;
        };
        message.dismissed = true;
        let topic = message.topic;
        self.persist().await;
        ledger.record_dismiss_at(topic, now).await;
    }

    /// Remove every message whose expiry has passed. Returns how many were
    /// removed.
    pub async fn clear_expired(&mut self) -> usize {
        let now = self.now_utc();
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_expired(now));
        let removed = before - self.messages.len();
        if removed > 0 {
            self.persist().await;
        }
        removed
    }

    /// Every stored message, including dismissed and expired ones.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn active_messages(&self) -> Vec<&Message> {
        self.active_messages_at(self.now_utc())
    }

    pub fn active_messages_at(&self, now: DateTime<Utc>) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.is_active(now)).collect()
    }

    pub fn unread_count(&self) -> usize {
        let now = self.now_utc();
        self.messages
            .iter()
            .filter(|m| m.is_active(now) && !m.read)
            .count()
    }
}
