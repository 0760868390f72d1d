// ⚙️ Configuration
// Read once from the environment at startup. Optional values log and fall
// back to defaults; a value that is present but unparsable is an error.

use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::fs::read_to_string;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub followers_path: PathBuf,
    /// Closed universe of entry ids, in display order
    pub entry_ids: Vec<String>,
    /// `None` disables the admin endpoints
    pub admin_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let entry_ids = parse_entry_ids(&var("VOTE_ENTRIES").unwrap_or_default());
        if entry_ids.is_empty() {
            warn!("VOTE_ENTRIES is empty, every submission will be rejected");
        }

        let admin_token = var("ADMIN_TOKEN").or_else(|| read_secret("ADMIN_TOKEN"));
        if admin_token.is_none() {
            warn!("No ADMIN_TOKEN configured, admin endpoints are disabled");
        }

        Ok(Self {
            port: try_load("VOTE_PORT", "3000")?,
            db_path: try_load("VOTE_DB_PATH", "votes.db")?,
            followers_path: try_load("VOTE_FOLLOWERS_CSV", "data/followers.csv")?,
            entry_ids,
            admin_token,
        })
    }
}

/// Comma-separated ids, trimmed, empties and repeats dropped
pub fn parse_entry_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}
