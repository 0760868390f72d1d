// Vote records and per-entry statistics

use serde::{Deserialize, Deserializer, Serialize};

/// Entry ids are strings, but older clients and stored data may carry
/// them as JSON numbers.
pub(crate) fn entry_id_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(d)? {
        RawId::Text(text) => text,
        RawId::Number(n) => n.to_string(),
    })
}

/// One user's vote.
///
/// `id` is `"{username}_{timestamp}"`; `username` is always normalized.
/// Once `approved` is true the record never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub id: String,

    /// Older deployments wrote this field as `outfitId`
    #[serde(alias = "outfitId", deserialize_with = "entry_id_from_any")]
    pub entry_id: String,

    pub username: String,

    /// Epoch millis
    pub timestamp: i64,

    pub approved: bool,

    /// Whether the voter was in the follower registry at submission time
    pub verified: bool,
}

impl VoteRecord {
    pub fn new(entry_id: &str, username: &str, timestamp: i64, verified: bool) -> Self {
        Self {
            id: format!("{username}_{timestamp}"),
            entry_id: entry_id.to_string(),
            username: username.to_string(),
            timestamp,
            approved: verified,
            verified,
        }
    }

    /// The approved copy of a pending record
    pub fn into_approved(self) -> Self {
        Self {
            approved: true,
            ..self
        }
    }
}

/// Vote counter for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStat {
    #[serde(alias = "outfitId", deserialize_with = "entry_id_from_any")]
    pub entry_id: String,
    pub votes: u64,
}

impl EntryStat {
    pub fn zero(entry_id: &str) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            votes: 0,
        }
    }
}

// ============================================================================
// DERIVED VIEW
// ============================================================================

/// `round(100 * votes / total)`, 0 when there are no votes
pub fn percentage(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((votes as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResult {
    pub entry_id: String,
    pub votes: u64,
    pub percentage: u32,
}

/// Public results at one instant. Stateless; recomputed on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub per_entry: Vec<EntryResult>,
    pub total_votes: u64,
    pub timestamp: i64,
}

impl StatsSnapshot {
    pub fn from_stats(stats: &[EntryStat], timestamp: i64) -> Self {
        let total_votes: u64 = stats.iter().map(|s| s.votes).sum();

        let per_entry = stats
            .iter()
            .map(|s| EntryResult {
                entry_id: s.entry_id.clone(),
                votes: s.votes,
                percentage: percentage(s.votes, total_votes),
            })
            .collect();

        Self {
            per_entry,
            total_votes,
            timestamp,
        }
    }

    /// Leaders by vote count, most votes first. Ties keep persisted order.
    pub fn top(&self, n: usize) -> Vec<&EntryResult> {
        let mut ranked: Vec<&EntryResult> = self.per_entry.iter().collect();
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranked.truncate(n);
        ranked
    }

    pub fn entry(&self, entry_id: &str) -> Option<&EntryResult> {
        self.per_entry.iter().find(|e| e.entry_id == entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_and_flags() {
        let record = VoteRecord::new("E1", "alice", 1_700_000_000_000, true);
        assert_eq!(record.id, "alice_1700000000000");
        assert!(record.approved && record.verified);

        let pending = VoteRecord::new("E2", "bob", 5, false);
        assert!(!pending.approved);
        let approved = pending.clone().into_approved();
        assert!(approved.approved);
        assert!(!approved.verified);
        assert_eq!(approved.id, pending.id);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = VoteRecord::new("E1", "alice", 7, false);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": "alice_7",
                "entryId": "E1",
                "username": "alice",
                "timestamp": 7,
                "approved": false,
                "verified": false
            })
        );
    }

    #[test]
    fn test_legacy_field_name() {
        let record: VoteRecord = serde_json::from_value(json!({
            "id": "bob_1",
            "outfitId": 3,
            "username": "bob",
            "timestamp": 1,
            "approved": false,
            "verified": false
        }))
        .unwrap();
        assert_eq!(record.entry_id, "3");

        let stat: EntryStat = serde_json::from_value(json!({"outfitId": "3", "votes": 4})).unwrap();
        assert_eq!(stat.entry_id, "3");
    }

    #[test]
    fn test_percentages() {
        let stats = vec![
            EntryStat { entry_id: "E1".to_string(), votes: 3 },
            EntryStat { entry_id: "E2".to_string(), votes: 1 },
        ];
        let snapshot = StatsSnapshot::from_stats(&stats, 0);

        assert_eq!(snapshot.total_votes, 4);
        assert_eq!(snapshot.entry("E1").unwrap().percentage, 75);
        assert_eq!(snapshot.entry("E2").unwrap().percentage, 25);
    }

    #[test]
    fn test_percentage_rounding_and_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
    }

    #[test]
    fn test_top() {
        let stats = vec![
            EntryStat { entry_id: "a".to_string(), votes: 1 },
            EntryStat { entry_id: "b".to_string(), votes: 5 },
            EntryStat { entry_id: "c".to_string(), votes: 3 },
        ];
        let snapshot = StatsSnapshot::from_stats(&stats, 0);
        let leaders: Vec<&str> = snapshot.top(2).iter().map(|e| e.entry_id.as_str()).collect();

        assert_eq!(leaders, vec!["b", "c"]);
    }
}
