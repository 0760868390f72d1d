// Voting service facade
// Wires the registry, ledger, aggregator and workflow around one store and
// the configured entry list. The HTTP layer and the CLI only talk to this.

use crate::approval::{ApprovalWorkflow, Decision};
use crate::config::Config;
use crate::error::{Result, VoteError};
use crate::events::{AuditLog, VoteEvent};
use crate::followers::FollowerRegistry;
use crate::ledger::VoteLedger;
use crate::record::{EntryStat, StatsSnapshot, VoteRecord};
use crate::sqlite_store::SqliteStore;
use crate::stats::StatsAggregator;
use crate::store::KeyValueStore;
use crate::username;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a vote submission, with the message shown to the voter
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: VoteRecord,
    pub message: &'static str,
}

pub struct VotingService {
    entry_ids: Vec<String>,
    followers: Arc<FollowerRegistry>,
    ledger: VoteLedger,
    stats: StatsAggregator,
    workflow: ApprovalWorkflow,
    audit: AuditLog,
}

impl VotingService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        followers: Arc<FollowerRegistry>,
        entry_ids: Vec<String>,
    ) -> Self {
        let stats = StatsAggregator::new(store.clone());
        let audit = AuditLog::new(store.clone());
        let ledger = VoteLedger::new(store, stats.clone(), audit.clone());
        let workflow = ApprovalWorkflow::new(ledger.clone(), stats.clone(), audit.clone());

        Self {
            entry_ids,
            followers,
            ledger,
            stats,
            workflow,
            audit,
        }
    }

    /// Open the SQLite store and follower list named by the config. A missing
    /// follower file is not fatal: every vote then goes to review.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = SqliteStore::open(&config.db_path)
            .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?;
        info!(path = %config.db_path.display(), "Store opened");

        let followers = FollowerRegistry::load(&config.followers_path).unwrap_or_else(|e| {
            warn!(error = %e, "Follower list unavailable, all votes need approval");
            FollowerRegistry::empty()
        });

        Ok(Self::new(
            Arc::new(store),
            Arc::new(followers),
            config.entry_ids.clone(),
        ))
    }

    pub fn entry_ids(&self) -> &[String] {
        &self.entry_ids
    }

    /// Validate, check the follower gate, and record the vote
    pub fn submit_vote(&self, entry_id: &str, raw_username: &str) -> Result<Submission> {
        let entry_id = entry_id.trim();
        if entry_id.is_empty() {
            return Err(VoteError::validation("Missing required fields"));
        }

        let username = username::parse(raw_username)?;

        if !self.entry_ids.iter().any(|id| id == entry_id) {
            return Err(VoteError::validation(format!("Unknown entry: {entry_id}")));
        }

        let verified = self.followers.is_verified(&username);
        let record = self.ledger.submit(entry_id, &username, verified)?;

        let message = if verified {
            "Vote recorded!"
        } else {
            "Vote pending approval"
        };

        Ok(Submission { record, message })
    }

    pub fn vote_status(&self, raw_username: &str) -> Result<Option<VoteRecord>> {
        if raw_username.trim().is_empty() {
            return Err(VoteError::validation("Username required"));
        }
        self.ledger.has_voted(raw_username)
    }

    /// Public results; creates or backfills the counters on the way
    pub fn stats(&self) -> Result<StatsSnapshot> {
        let stats = self.stats.initialize(&self.entry_ids)?;
        Ok(StatsSnapshot::from_stats(&stats, Utc::now().timestamp_millis()))
    }

    pub fn pending_votes(&self) -> Result<Vec<VoteRecord>> {
        self.ledger.list_pending()
    }

    pub fn approved_votes(&self) -> Result<Vec<VoteRecord>> {
        self.ledger.get_approved()
    }

    pub fn decide(&self, decision: Decision, vote_id: &str) -> Result<VoteRecord> {
        let vote_id = vote_id.trim();
        if vote_id.is_empty() {
            return Err(VoteError::validation("Missing required fields"));
        }
        self.workflow.decide(decision, vote_id)
    }

    /// Rebuild the counters from the approved partition
    pub fn recount(&self) -> Result<Vec<EntryStat>> {
        let approved = self.ledger.get_approved()?;
        Ok(self.stats.recount(&self.entry_ids, &approved)?)
    }

    pub fn history(&self, vote_id: &str) -> Result<Vec<VoteEvent>> {
        Ok(self.audit.for_vote(vote_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> VotingService {
        VotingService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FollowerRegistry::from_usernames(["alice"])),
            vec!["E1".to_string(), "E2".to_string()],
        )
    }

    #[test]
    fn test_submit_routes_by_follower_status() {
        let svc = service();

        let alice = svc.submit_vote("E1", "@Alice").unwrap();
        assert_eq!(alice.message, "Vote recorded!");
        assert!(alice.record.approved);
        assert_eq!(alice.record.username, "alice");

        let bob = svc.submit_vote("E2", "bob").unwrap();
        assert_eq!(bob.message, "Vote pending approval");
        assert!(!bob.record.approved);
    }

    #[test]
    fn test_submit_validation() {
        let svc = service();

        for (entry, user) in [("", "bob"), ("E1", ""), ("E1", "bob."), ("E9", "bob")] {
            let err = svc.submit_vote(entry, user).unwrap_err();
            assert!(matches!(err, VoteError::Validation(_)), "{entry}/{user}");
        }
        assert!(svc.pending_votes().unwrap().is_empty());
    }

    #[test]
    fn test_stats_auto_initializes() {
        let svc = service();

        let snapshot = svc.stats().unwrap();
        assert_eq!(snapshot.per_entry.len(), 2);
        assert_eq!(snapshot.total_votes, 0);
        assert!(snapshot.per_entry.iter().all(|e| e.percentage == 0));
    }

    #[test]
    fn test_status_and_history() {
        let svc = service();
        assert!(svc.vote_status("bob").unwrap().is_none());
        assert!(matches!(svc.vote_status(" ").unwrap_err(), VoteError::Validation(_)));

        let bob = svc.submit_vote("E2", "bob").unwrap().record;
        svc.decide(Decision::Approve, &bob.id).unwrap();

        assert!(svc.vote_status("BOB").unwrap().unwrap().approved);
        assert_eq!(svc.history(&bob.id).unwrap().len(), 2);
    }

    #[test]
    fn test_recount_matches_counters() {
        let svc = service();
        svc.submit_vote("E1", "alice").unwrap();
        let bob = svc.submit_vote("E2", "bob").unwrap().record;
        svc.decide(Decision::Approve, &bob.id).unwrap();

        let live = svc.stats().unwrap();
        let rebuilt = svc.recount().unwrap();

        assert_eq!(StatsSnapshot::from_stats(&rebuilt, live.timestamp), live);
    }
}
