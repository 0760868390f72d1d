// 📊 Stats Aggregator
// Per-entry vote counters, persisted as one blob. The blob is the single
// source of truth for public results and must always match the ledger's
// approved partition.
//
// Every write is a compare-and-set against the value that was read, retried
// on conflict, so concurrent approvals cannot overwrite each other's counts.

use crate::codec::{decode, decode_or_default};
use crate::error::StoreError;
use crate::record::{EntryStat, VoteRecord};
use crate::store::{KeyValueStore, StoreResult};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STATS_KEY: &str = "vote_stats";

/// Attempts before a contended write gives up
const MAX_ATTEMPTS: usize = 64;

#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn KeyValueStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the raw blob and its decoded form. `None` for the stats means the
    /// blob is missing or unusable.
    fn load(&self) -> StoreResult<(Option<Value>, Option<Vec<EntryStat>>)> {
        let raw = self.store.get(STATS_KEY)?;
        let stats = match raw.clone() {
            None => None,
            Some(value) => match decode::<Vec<EntryStat>>(value) {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "Stored stats are malformed");
                    None
                }
            },
        };
        Ok((raw, stats))
    }

    /// Read-modify-write loop. `apply` returns the new stats and whether they
    /// need writing back.
    fn update<F>(&self, mut apply: F) -> StoreResult<Vec<EntryStat>>
    where
        F: FnMut(Option<Vec<EntryStat>>) -> (Vec<EntryStat>, bool),
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let (raw, current) = self.load()?;
            let (next, changed) = apply(current);

            if !changed {
                return Ok(next);
            }

            let encoded = serde_json::to_value(&next)?;
            if self.store.compare_and_set(STATS_KEY, raw.as_ref(), encoded)? {
                return Ok(next);
            }

            debug!(attempt, "Stats changed underneath us, retrying");
            std::thread::yield_now();
        }

        Err(StoreError::Contention {
            key: STATS_KEY.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Make sure every entry has a counter.
    ///
    /// Creates zeroed stats when none exist (or the stored blob is unusable),
    /// backfills entries added since, and otherwise returns the stored stats
    /// untouched.
    pub fn initialize(&self, entry_ids: &[String]) -> StoreResult<Vec<EntryStat>> {
        self.update(|current| match current {
            Some(mut stats) if !stats.is_empty() => {
                let known: HashSet<String> = stats.iter().map(|s| s.entry_id.clone()).collect();
                let missing: Vec<&String> =
                    entry_ids.iter().filter(|id| !known.contains(*id)).collect();

                if missing.is_empty() {
                    return (stats, false);
                }

                info!(count = missing.len(), "Backfilling stats for new entries");
                stats.extend(missing.into_iter().map(|id| EntryStat::zero(id)));
                (stats, true)
            }
            _ => {
                info!(entries = entry_ids.len(), "Initializing vote stats");
                (zeroed(entry_ids), true)
            }
        })
    }

    /// Add `delta` to one entry, clamped at zero. An entry without a counter
    /// yet gets one.
    pub fn increment(&self, entry_id: &str, delta: i64) -> StoreResult<Vec<EntryStat>> {
        self.update(|current| {
            let mut stats = current.unwrap_or_default();

            match stats.iter_mut().find(|s| s.entry_id == entry_id) {
                Some(stat) => stat.votes = apply_delta(stat.votes, delta),
                None => stats.push(EntryStat {
                    entry_id: entry_id.to_string(),
                    votes: apply_delta(0, delta),
                }),
            }

            (stats, true)
        })
    }

    /// Current stats, or empty when uninitialized or unreadable
    pub fn get_all(&self) -> StoreResult<Vec<EntryStat>> {
        Ok(decode_or_default(STATS_KEY, self.store.get(STATS_KEY)?))
    }

    /// Rebuild the counters from the approved votes. Repairs drift left by a
    /// crash between ledger and stats writes.
    pub fn recount(
        &self,
        entry_ids: &[String],
        approved: &[VoteRecord],
    ) -> StoreResult<Vec<EntryStat>> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for record in approved.iter().filter(|r| r.approved) {
            *counts.entry(record.entry_id.as_str()).or_default() += 1;
        }

        let mut stats: Vec<EntryStat> = entry_ids
            .iter()
            .map(|id| EntryStat {
                entry_id: id.clone(),
                votes: counts.remove(id.as_str()).unwrap_or(0),
            })
            .collect();

        // Votes for entries no longer configured still count
        let mut extra: Vec<EntryStat> = counts
            .into_iter()
            .map(|(id, votes)| EntryStat {
                entry_id: id.to_string(),
                votes,
            })
            .collect();
        extra.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        stats.extend(extra);

        self.store.set(STATS_KEY, serde_json::to_value(&stats)?)?;
        info!(approved = approved.len(), "Recounted vote stats");
        Ok(stats)
    }
}

fn zeroed(entry_ids: &[String]) -> Vec<EntryStat> {
    entry_ids.iter().map(|id| EntryStat::zero(id)).collect()
}

fn apply_delta(votes: u64, delta: i64) -> u64 {
    if delta >= 0 {
        votes.saturating_add(delta as u64)
    } else {
        votes.saturating_sub(delta.unsigned_abs())
    }
}
