// ✅ Approval Workflow
// Pending -> Approved | Rejected. Approved is permanent for the voting
// period; Rejected removes the record.
//
// approve() is a sequence of store writes without a transaction:
//   1. fetch pending   2. write approved copy   3. delete pending copy
//   4. increment stats, only if step 3 removed the pending copy
// The approved copy is written before the pending one is deleted, so a crash
// never loses the vote, and a retry after such a crash counts it exactly
// once. A crash between 3 and 4 leaves the entry one vote short until
// StatsAggregator::recount runs.

use crate::error::{Result, VoteError};
use crate::events::{AuditLog, EventType};
use crate::ledger::VoteLedger;
use crate::record::VoteRecord;
use crate::stats::StatsAggregator;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            _ => Err(VoteError::validation("Invalid action")),
        }
    }
}

#[derive(Clone)]
pub struct ApprovalWorkflow {
    ledger: VoteLedger,
    stats: StatsAggregator,
    audit: AuditLog,
}

impl ApprovalWorkflow {
    pub fn new(ledger: VoteLedger, stats: StatsAggregator, audit: AuditLog) -> Self {
        Self {
            ledger,
            stats,
            audit,
        }
    }

    fn fetch_pending(&self, vote_id: &str) -> Result<VoteRecord> {
        self.ledger
            .pending(vote_id)?
            .ok_or_else(|| VoteError::NotFound {
                vote_id: vote_id.to_string(),
            })
    }

    pub fn approve(&self, vote_id: &str) -> Result<VoteRecord> {
        let approved = self.fetch_pending(vote_id)?.into_approved();

        self.ledger.write_approved(&approved)?;

        if !self.ledger.remove_pending(vote_id)? {
            // Another decision removed the pending copy after our fetch and
            // owns both the count and the audit entry. recount reconciles any
            // approved copy left behind by a racing reject.
            warn!(vote_id, "Pending copy already gone, not counting again");
            return Ok(approved);
        }

        self.stats.increment(&approved.entry_id, 1)?;
        info!(vote_id, entry_id = %approved.entry_id, "Vote approved");

        self.audit.record(EventType::Approved, &approved, "admin");
        Ok(approved)
    }

    /// Drop a pending vote. It was never counted, so stats are untouched.
    /// The voter may vote again afterwards.
    pub fn reject(&self, vote_id: &str) -> Result<VoteRecord> {
        let record = self.fetch_pending(vote_id)?;

        if !self.ledger.remove_pending(vote_id)? {
            return Err(VoteError::NotFound {
                vote_id: vote_id.to_string(),
            });
        }

        self.ledger.release_claim(&record.username);
        info!(vote_id, entry_id = %record.entry_id, "Vote rejected");

        self.audit.record(EventType::Rejected, &record, "admin");
        Ok(record)
    }

    pub fn decide(&self, decision: Decision, vote_id: &str) -> Result<VoteRecord> {
        match decision {
            Decision::Approve => self.approve(vote_id),
            Decision::Reject => self.reject(vote_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{APPROVED_KEY, PENDING_KEY};
    use crate::store::testing::FaultyStore;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: VoteLedger,
        stats: StatsAggregator,
        workflow: ApprovalWorkflow,
        audit: AuditLog,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn KeyValueStore> = store.clone();
        let stats = StatsAggregator::new(shared.clone());
        let audit = AuditLog::new(shared.clone());
        let ledger = VoteLedger::new(shared, stats.clone(), audit.clone());
        let workflow = ApprovalWorkflow::new(ledger.clone(), stats.clone(), audit.clone());
        stats.initialize(&["E1".to_string(), "E2".to_string()]).unwrap();

        Harness {
            store,
            ledger,
            stats,
            workflow,
            audit,
        }
    }

    fn votes(h: &Harness, entry_id: &str) -> u64 {
        h.stats
            .get_all()
            .unwrap()
            .into_iter()
            .find(|s| s.entry_id == entry_id)
            .map(|s| s.votes)
            .unwrap_or(0)
    }

    #[test]
    fn test_approve_moves_and_counts() {
        let h = harness();
        let pending = h.ledger.submit("E2", "bob", false).unwrap();

        let approved = h.workflow.approve(&pending.id).unwrap();

        assert!(approved.approved);
        assert!(!approved.verified);
        assert!(h.ledger.list_pending().unwrap().is_empty());
        assert_eq!(h.ledger.get_approved().unwrap(), vec![approved]);
        assert_eq!(votes(&h, "E2"), 1);

        let events = h.audit.for_vote(&pending.id).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_approve_twice_is_not_found() {
        let h = harness();
        let pending = h.ledger.submit("E1", "bob", false).unwrap();
        h.workflow.approve(&pending.id).unwrap();

        let err = h.workflow.approve(&pending.id).unwrap_err();
        assert!(matches!(err, VoteError::NotFound { .. }));
        assert_eq!(votes(&h, "E1"), 1);
    }

    #[test]
    fn test_retry_after_partial_approval_counts_once() {
        let h = harness();
        let pending = h.ledger.submit("E1", "frank", false).unwrap();

        // Crash after writing the approved copy, before deleting pending
        h.ledger
            .write_approved(&pending.clone().into_approved())
            .unwrap();
        assert_eq!(votes(&h, "E1"), 0);

        h.workflow.approve(&pending.id).unwrap();

        assert_eq!(votes(&h, "E1"), 1);
        assert_eq!(h.ledger.get_approved().unwrap().len(), 1);
        assert!(h.ledger.list_pending().unwrap().is_empty());
    }

    #[test]
    fn test_lost_pending_delete_neither_counts_nor_audits() {
        let store: Arc<dyn KeyValueStore> = Arc::new(FaultyStore::failing(&["hdel_lost"]));
        let stats = StatsAggregator::new(store.clone());
        let audit = AuditLog::new(store.clone());
        let ledger = VoteLedger::new(store, stats.clone(), audit.clone());
        let workflow = ApprovalWorkflow::new(ledger.clone(), stats.clone(), audit.clone());
        stats.initialize(&["E1".to_string()]).unwrap();

        let pending = ledger.submit("E1", "gus", false).unwrap();
        let approved = workflow.approve(&pending.id).unwrap();

        assert!(approved.approved);
        assert_eq!(stats.get_all().unwrap()[0].votes, 0);

        let events = audit.for_vote(&pending.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Submitted);
    }

    #[test]
    fn test_reject_removes_without_counting() {
        let h = harness();
        h.ledger.submit("E1", "alice", true).unwrap();
        let carol = h.ledger.submit("E1", "carol", false).unwrap();

        let rejected = h.workflow.reject(&carol.id).unwrap();

        assert_eq!(rejected, carol);
        assert!(h.ledger.list_pending().unwrap().is_empty());
        assert!(h.ledger.get_approved().unwrap().iter().all(|r| r.id != carol.id));
        assert_eq!(votes(&h, "E1"), 1);
    }

    #[test]
    fn test_rejected_user_can_vote_again() {
        let h = harness();
        let first = h.ledger.submit_at("E1", "carol", false, 1).unwrap();
        h.workflow.reject(&first.id).unwrap();

        let second = h.ledger.submit_at("E2", "carol", false, 2).unwrap();
        assert_eq!(second.entry_id, "E2");
    }

    #[test]
    fn test_unknown_vote() {
        let h = harness();
        assert!(matches!(
            h.workflow.approve("ghost_1").unwrap_err(),
            VoteError::NotFound { .. }
        ));
        assert!(matches!(
            h.workflow.reject("ghost_1").unwrap_err(),
            VoteError::NotFound { .. }
        ));
    }

    #[test]
    fn test_approved_votes_cannot_be_rejected() {
        let h = harness();
        let alice = h.ledger.submit("E1", "alice", true).unwrap();

        let err = h.workflow.reject(&alice.id).unwrap_err();
        assert!(matches!(err, VoteError::NotFound { .. }));
        assert_eq!(h.ledger.approved(&alice.id).unwrap(), Some(alice.clone()));
        assert!(h.store.hget(PENDING_KEY, &alice.id).unwrap().is_none());
        assert!(h.store.hget(APPROVED_KEY, &alice.id).unwrap().is_some());
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approve);
        assert_eq!("reject".parse::<Decision>().unwrap(), Decision::Reject);
        assert!("delete".parse::<Decision>().is_err());
        assert_eq!(Decision::Reject.as_str(), "reject");
    }
}
