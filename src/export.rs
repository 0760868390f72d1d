// 📤 Approved-vote export
// Audit copy of the approved partition as CSV, one row per vote.

use crate::record::VoteRecord;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

pub fn write_votes_csv<W: Write>(writer: W, votes: &[VoteRecord]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(["id", "entry_id", "username", "timestamp", "approved", "verified"])?;
    for vote in votes {
        let timestamp = vote.timestamp.to_string();
        let approved = vote.approved.to_string();
        let verified = vote.verified.to_string();

        wtr.write_record([
            vote.id.as_str(),
            vote.entry_id.as_str(),
            vote.username.as_str(),
            timestamp.as_str(),
            approved.as_str(),
            verified.as_str(),
        ])?;
    }

    wtr.flush().context("Failed to flush CSV export")?;
    Ok(votes.len())
}

pub fn export_votes(path: &Path, votes: &[VoteRecord]) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_votes_csv(file, votes)
}
