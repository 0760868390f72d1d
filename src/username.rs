// Username rules
// Usernames are social handles: normalized the same way at every boundary
// before any lookup or storage.

use crate::error::{Result, VoteError};

pub const MAX_USERNAME_LEN: usize = 30;

/// Trim, lowercase, and strip one leading '@'
pub fn normalize(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.strip_prefix('@') {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Check the handle format on an already normalized username:
/// 1-30 characters of letters, digits, periods and underscores,
/// no leading, trailing or consecutive periods.
pub fn is_valid(normalized: &str) -> bool {
    let len = normalized.chars().count();
    if len == 0 || len > MAX_USERNAME_LEN {
        return false;
    }

    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return false;
    }

    !normalized.starts_with('.') && !normalized.ends_with('.') && !normalized.contains("..")
}

/// Normalize and validate in one step, as the API boundary does
pub fn parse(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(VoteError::validation("Missing required fields"));
    }

    let normalized = normalize(raw);
    if !is_valid(&normalized) {
        return Err(VoteError::validation("Invalid username format"));
    }

    Ok(normalized)
}
