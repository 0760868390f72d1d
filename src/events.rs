// 📜 Audit trail for vote lifecycle changes
// "Every change is an event": each submit, approval and rejection appends an
// immutable event keyed under its vote, so a decision can be traced later.

use crate::codec::decode_lenient;
use crate::record::VoteRecord;
use crate::store::{KeyValueStore, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const EVENT_PREFIX: &str = "vote_event:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Submitted,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub vote_id: String,
    pub entry_id: String,
    pub username: String,
    pub actor: String,
}

impl VoteEvent {
    pub fn new(event_type: EventType, record: &VoteRecord, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            vote_id: record.id.clone(),
            entry_id: record.entry_id.clone(),
            username: record.username.clone(),
            actor: actor.to_string(),
        }
    }

    fn key(&self) -> String {
        format!("{EVENT_PREFIX}{}:{}", self.vote_id, self.event_id)
    }
}

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn KeyValueStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn append(&self, event: &VoteEvent) -> StoreResult<()> {
        self.store.set(&event.key(), serde_json::to_value(event)?)
    }

    /// Append without failing the caller. The vote change already happened;
    /// a lost audit line is logged, not propagated.
    pub fn record(&self, event_type: EventType, record: &VoteRecord, actor: &str) {
        let event = VoteEvent::new(event_type, record, actor);
        if let Err(e) = self.append(&event) {
            warn!(vote_id = %record.id, error = %e, "Failed to write audit event");
        }
    }

    /// Events for one vote, oldest first
    pub fn for_vote(&self, vote_id: &str) -> StoreResult<Vec<VoteEvent>> {
        let prefix = format!("{EVENT_PREFIX}{vote_id}:");
        let mut events = Vec::new();

        for key in self.store.keys(&prefix)? {
            if let Some(value) = self.store.get(&key)? {
                if let Some(event) = decode_lenient::<VoteEvent>(&key, value) {
                    events.push(event);
                }
            }
        }

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
