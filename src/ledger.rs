// 🗳️ Vote Ledger
// Owns vote records: creation, the pending/approved partitions, and the
// one-vote-per-user rule. Only the ledger writes records; only the stats
// aggregator writes counters.
//
// Store layout:
//   pending_votes  hash  record id -> VoteRecord
//   approved_votes hash  record id -> VoteRecord
//   voters         hash  username  -> record id (claim, insert-if-absent)

use crate::codec::decode_lenient;
use crate::error::{Result, VoteError};
use crate::events::{AuditLog, EventType};
use crate::record::VoteRecord;
use crate::stats::StatsAggregator;
use crate::store::{KeyValueStore, StoreResult};
use crate::username::normalize;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PENDING_KEY: &str = "pending_votes";
pub const APPROVED_KEY: &str = "approved_votes";
pub const VOTERS_KEY: &str = "voters";

#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn KeyValueStore>,
    stats: StatsAggregator,
    audit: AuditLog,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, stats: StatsAggregator, audit: AuditLog) -> Self {
        Self {
            store,
            stats,
            audit,
        }
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    fn partition(&self, key: &str) -> StoreResult<Vec<VoteRecord>> {
        let records = self
            .store
            .hgetall(key)?
            .into_iter()
            .filter_map(|(field, value)| decode_lenient(&format!("{key}:{field}"), value))
            .collect();
        Ok(records)
    }

    fn find_in(&self, key: &str, vote_id: &str) -> StoreResult<Option<VoteRecord>> {
        Ok(self
            .store
            .hget(key, vote_id)?
            .and_then(|value| decode_lenient(&format!("{key}:{vote_id}"), value)))
    }

    /// The vote cast by this user, approved or pending. Read-only.
    pub fn has_voted(&self, username: &str) -> Result<Option<VoteRecord>> {
        let username = normalize(username);

        for key in [APPROVED_KEY, PENDING_KEY] {
            if let Some(record) = self
                .partition(key)?
                .into_iter()
                .find(|r| r.username == username)
            {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Pending votes, oldest first. A fresh read on every call.
    pub fn list_pending(&self) -> Result<Vec<VoteRecord>> {
        let mut records = self.partition(PENDING_KEY)?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    /// Approved votes, oldest first
    pub fn get_approved(&self) -> Result<Vec<VoteRecord>> {
        let mut records = self.partition(APPROVED_KEY)?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    pub fn pending(&self, vote_id: &str) -> Result<Option<VoteRecord>> {
        Ok(self.find_in(PENDING_KEY, vote_id)?)
    }

    pub fn approved(&self, vote_id: &str) -> Result<Option<VoteRecord>> {
        Ok(self.find_in(APPROVED_KEY, vote_id)?)
    }

    // ========================================================================
    // SUBMISSION
    // ========================================================================

    /// Record a vote.
    ///
    /// Verified voters go straight to the approved partition and are counted
    /// at once; everyone else waits in pending without touching the stats.
    pub fn submit(&self, entry_id: &str, username: &str, is_verified: bool) -> Result<VoteRecord> {
        self.submit_at(entry_id, username, is_verified, Utc::now().timestamp_millis())
    }

    pub(crate) fn submit_at(
        &self,
        entry_id: &str,
        username: &str,
        is_verified: bool,
        timestamp: i64,
    ) -> Result<VoteRecord> {
        let username = normalize(username);

        if self.has_voted(&username)?.is_some() {
            return Err(VoteError::DuplicateVote { username });
        }

        let record = VoteRecord::new(entry_id, &username, timestamp, is_verified);

        // Closes the gap between the scan above and the write below: only one
        // concurrent submission per username gets the claim.
        if !self
            .store
            .hset_nx(VOTERS_KEY, &username, Value::String(record.id.clone()))?
        {
            return Err(VoteError::DuplicateVote { username });
        }

        let partition = if is_verified { APPROVED_KEY } else { PENDING_KEY };
        if let Err(e) = self.write(partition, &record) {
            self.release_claim(&username);
            return Err(e.into());
        }

        // A verified vote and its count land together or not at all
        if is_verified {
            if let Err(e) = self.stats.increment(entry_id, 1) {
                warn!(vote_id = %record.id, error = %e, "Count failed, withdrawing vote");
                if let Err(undo) = self.store.hdel(APPROVED_KEY, &record.id) {
                    warn!(vote_id = %record.id, error = %undo, "Failed to withdraw approved copy");
                }
                self.release_claim(&username);
                return Err(e.into());
            }
        }

        info!(
            vote_id = %record.id,
            entry_id,
            verified = is_verified,
            "Vote submitted"
        );

        self.audit.record(EventType::Submitted, &record, "voter");
        Ok(record)
    }

    // ========================================================================
    // MOVEMENT (used by the approval workflow)
    // ========================================================================

    fn write(&self, partition: &str, record: &VoteRecord) -> StoreResult<()> {
        self.store
            .hset(partition, &record.id, serde_json::to_value(record)?)
    }

    pub fn write_approved(&self, record: &VoteRecord) -> Result<()> {
        debug_assert!(record.approved);
        Ok(self.write(APPROVED_KEY, record)?)
    }

    /// Returns whether this call removed the pending copy
    pub fn remove_pending(&self, vote_id: &str) -> Result<bool> {
        Ok(self.store.hdel(PENDING_KEY, vote_id)?)
    }

    /// Let the user vote again. Best effort: a stale claim only blocks that
    /// user, so failures are logged.
    pub fn release_claim(&self, username: &str) {
        match self.store.hdel(VOTERS_KEY, username) {
            Ok(true) => debug!(username, "Released voter claim"),
            Ok(false) => {}
            Err(e) => warn!(username, error = %e, "Failed to release voter claim"),
        }
    }
}
