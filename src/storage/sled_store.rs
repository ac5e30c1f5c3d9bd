//! Sled-backed coaching log
//!
//! Two trees:
//! - `users`: key = user id, value = JSON `StoredUser`
//! - `coaching`: key = sled-generated id as u64 big-endian (insertion order),
//!   value = JSON `StoredCoachingRecord`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::persistence::{CoachingStore, StoreConnector};
use super::StoreError;
use crate::types::{CoachingRecord, UserRole};

const USERS_TREE: &str = "users";
const COACHING_TREE: &str = "coaching";

/// Coaching record with storage metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCoachingRecord {
    pub record: CoachingRecord,
    pub stored_at: DateTime<Utc>,
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub user_id: String,
    pub role: UserRole,
    pub registered_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    users: sled::Tree,
    coaching: sled::Tree,
}

impl SledStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let users = db.open_tree(USERS_TREE)?;
        let coaching = db.open_tree(COACHING_TREE)?;
        info!(path = %path.display(), records = coaching.len(), "Coaching store opened");
        Ok(Self { db, users, coaching })
    }

    /// Most recent coaching records first
    pub fn recent_records(&self, limit: usize) -> Result<Vec<StoredCoachingRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.coaching.iter().rev() {
            if records.len() >= limit {
                break;
            }
            let (_key, value) = item?;
            match serde_json::from_slice::<StoredCoachingRecord>(&value) {
                Ok(stored) => records.push(stored),
                Err(e) => warn!(error = %e, "Skipping undecodable coaching record"),
            }
        }
        Ok(records)
    }

    /// All registered users, ordered by id
    pub fn users(&self) -> Result<Vec<StoredUser>, StoreError> {
        let mut users = Vec::new();
        for item in self.users.iter() {
            let (_key, value) = item?;
            users.push(serde_json::from_slice(&value)?);
        }
        Ok(users)
    }

    pub fn record_count(&self) -> usize {
        self.coaching.len()
    }
}

impl CoachingStore for SledStore {
    fn is_alive(&self) -> bool {
        true
    }

    fn register_user(&self, user_id: &str, role: UserRole) -> Result<bool, StoreError> {
        let user = StoredUser { user_id: user_id.to_string(), role, registered_at: Utc::now() };
        let value = serde_json::to_vec(&user)?;
        let inserted = self
            .users
            .compare_and_swap(user_id.as_bytes(), None as Option<&[u8]>, Some(value))?
            .is_ok();
        if inserted {
            self.users.flush()?;
        }
        debug!(user_id = %user_id, role = %role, inserted, "Register user");
        Ok(inserted)
    }

    fn insert_coaching(&self, record: &CoachingRecord) -> Result<(), StoreError> {
        let stored = StoredCoachingRecord { record: record.clone(), stored_at: Utc::now() };
        let key = self.db.generate_id()?.to_be_bytes();
        self.coaching.insert(key, serde_json::to_vec(&stored)?)?;
        self.coaching.flush()?;
        debug!(
            driver_id = %record.driver_id,
            trip_id = %record.trip_id,
            window = record.window_index,
            "Stored coaching record"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

/// Opens a [`SledStore`] at a fixed path
#[derive(Debug, Clone)]
pub struct SledConnector {
    path: PathBuf,
}

impl SledConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StoreConnector for SledConnector {
    fn connect(&self) -> Result<Box<dyn CoachingStore>, StoreError> {
        Ok(Box::new(SledStore::open(&self.path)?))
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }
}
