use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use outfit_vote::{export_votes, Config, Decision, VotingService};

const USAGE: &str = "usage: outfit-vote <command>

commands:
  stats               show live results
  pending             list votes waiting for review
  approve <vote-id>   approve a pending vote
  reject <vote-id>    reject a pending vote
  status <username>   show a user's vote and its history
  recount             rebuild counters from approved votes
  export <file.csv>   write approved votes to CSV";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);
    let argument = args.get(2).map(String::as_str);

    if matches!(command, None | Some("help" | "--help" | "-h")) {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::load()?;
    let service = VotingService::from_config(&config)?;

    match (command, argument) {
        (Some("stats"), _) => show_stats(&service),
        (Some("pending"), _) => show_pending(&service),
        (Some("approve"), Some(vote_id)) => decide(&service, Decision::Approve, vote_id),
        (Some("reject"), Some(vote_id)) => decide(&service, Decision::Reject, vote_id),
        (Some("status"), Some(username)) => show_status(&service, username),
        (Some("recount"), _) => recount(&service),
        (Some("export"), Some(path)) => export(&service, Path::new(path)),
        _ => {
            eprintln!("{USAGE}");
            bail!("unknown or incomplete command");
        }
    }
}

fn show_stats(service: &VotingService) -> Result<()> {
    let snapshot = service.stats()?;

    println!("📊 Live results ({} entries)", service.entry_ids().len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for entry in &snapshot.per_entry {
        println!("{:<20} {:>6} votes {:>4}%", entry.entry_id, entry.votes, entry.percentage);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total: {} votes", snapshot.total_votes);

    let leaders: Vec<String> = snapshot
        .top(3)
        .iter()
        .filter(|e| e.votes > 0)
        .map(|e| e.entry_id.clone())
        .collect();
    if !leaders.is_empty() {
        println!("🏆 Top: {}", leaders.join(", "));
    }

    Ok(())
}

fn show_pending(service: &VotingService) -> Result<()> {
    let pending = service.pending_votes()?;

    println!("⏳ {} pending votes", pending.len());
    for vote in &pending {
        let when = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(vote.timestamp)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| vote.timestamp.to_string());
        println!("  {}  @{} → {}  ({})", vote.id, vote.username, vote.entry_id, when);
    }

    Ok(())
}

fn decide(service: &VotingService, decision: Decision, vote_id: &str) -> Result<()> {
    let vote = service
        .decide(decision, vote_id)
        .with_context(|| format!("Failed to {} {vote_id}", decision.as_str()))?;

    match decision {
        Decision::Approve => println!("✅ Approved @{} → {}", vote.username, vote.entry_id),
        Decision::Reject => println!("🗑️  Rejected @{} → {}", vote.username, vote.entry_id),
    }

    Ok(())
}

fn show_status(service: &VotingService, username: &str) -> Result<()> {
    let Some(vote) = service.vote_status(username)? else {
        println!("@{username} has not voted");
        return Ok(());
    };

    let state = if vote.approved { "approved" } else { "pending" };
    println!("@{} voted for {} ({state})", vote.username, vote.entry_id);

    for event in service.history(&vote.id)? {
        println!(
            "  {}  {:?} by {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor
        );
    }

    Ok(())
}

fn recount(service: &VotingService) -> Result<()> {
    let stats = service.recount()?;
    let total: u64 = stats.iter().map(|s| s.votes).sum();

    println!("🔁 Recounted {} entries, {total} approved votes", stats.len());
    Ok(())
}

fn export(service: &VotingService, path: &Path) -> Result<()> {
    let approved = service.approved_votes()?;
    let written = export_votes(path, &approved)?;

    println!("📤 Exported {written} approved votes to {}", path.display());
    Ok(())
}
