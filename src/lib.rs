// Outfit Vote - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod approval;
pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod followers;
pub mod ledger;
pub mod record;
pub mod service;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod username;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use approval::{ApprovalWorkflow, Decision};
pub use auth::AdminCredential;
pub use config::Config;
pub use error::{Result, StoreError, VoteError};
pub use events::{AuditLog, EventType, VoteEvent};
pub use export::{export_votes, write_votes_csv};
pub use followers::FollowerRegistry;
pub use ledger::VoteLedger;
pub use record::{percentage, EntryResult, EntryStat, StatsSnapshot, VoteRecord};
pub use service::{Submission, VotingService};
pub use sqlite_store::SqliteStore;
pub use stats::StatsAggregator;
pub use store::{KeyValueStore, MemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
