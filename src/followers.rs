// 👥 Follower Registry
// Read-only set of verified usernames, built once at startup and shared by
// reference. Votes from these users skip manual review.

use crate::username::normalize;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Header names recognized as the username column, in priority order
const USERNAME_COLUMNS: [&str; 2] = ["username", "handle"];

#[derive(Debug, Clone, Default)]
pub struct FollowerRegistry {
    usernames: HashSet<String>,
}

impl FollowerRegistry {
    /// Registry with nobody verified: every vote goes to review
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_usernames<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let usernames = usernames
            .into_iter()
            .map(|u| normalize(u.as_ref()))
            .filter(|u| !u.is_empty())
            .collect();

        Self { usernames }
    }

    /// Parse a follower export. The username is taken from the `username`
    /// column, else `handle`, else the first column. Headers are matched
    /// case-insensitively.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read follower CSV headers")?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let column = USERNAME_COLUMNS
            .iter()
            .find_map(|name| headers.iter().position(|h| h == name))
            .unwrap_or(0);

        let mut usernames = Vec::new();
        let mut skipped = 0;

        for result in rdr.records() {
            match result {
                Ok(record) => {
                    if let Some(value) = record.get(column) {
                        usernames.push(value.to_string());
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "Skipping unreadable follower row");
                }
            }
        }

        let registry = Self::from_usernames(usernames);
        info!(
            followers = registry.len(),
            skipped, "Loaded follower registry"
        );
        Ok(registry)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open follower CSV {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Whether the raw username belongs to a verified follower
    pub fn is_verified(&self, username: &str) -> bool {
        let normalized = normalize(username);
        !normalized.is_empty() && self.usernames.contains(&normalized)
    }

    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }
}
