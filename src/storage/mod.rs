//! Coaching Log Storage
//!
//! Durable record of registered users and generated coaching results.
//! Producers never touch the store directly: they enqueue jobs on the
//! [`WriteBehindLogger`], whose single worker thread owns the connection.
//!
//! - [`SledStore`]: embedded sled database (default)
//! - [`InMemoryStore`]: volatile store for tests and dry runs

pub mod persistence;
pub mod sled_store;
pub mod writer;

pub use persistence::{CoachingStore, InMemoryConnector, InMemoryStore, StoreConnector};
pub use sled_store::{SledConnector, SledStore, StoredCoachingRecord, StoredUser};
pub use writer::{LogJob, LoggerStats, WriteBehindLogger};

use thiserror::Error;

/// Persistence failures. Absorbed by the logger worker, never surfaced to
/// producers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
