//! CoachingStore trait - pluggable storage backend
//!
//! The write-behind worker obtains connections through a [`StoreConnector`]
//! and reconnects whenever the current one is missing or stale:
//! - `SledConnector`: opens the embedded sled database
//! - `InMemoryConnector`: in-memory store that can be made unreachable, for
//!   tests and minimal deployments

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::StoreError;
use crate::types::{CoachingRecord, UserRole};

/// A live connection to a coaching store.
///
/// Owned by a single worker thread, so only `Send` is required.
pub trait CoachingStore: Send {
    /// False once the connection can no longer be used
    fn is_alive(&self) -> bool;

    /// Insert-if-absent. Returns `true` when the user was new.
    fn register_user(&self, user_id: &str, role: UserRole) -> Result<bool, StoreError>;

    /// Plain insert; duplicates are kept.
    fn insert_coaching(&self, record: &CoachingRecord) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Opens connections to a store.
pub trait StoreConnector: Send + 'static {
    fn connect(&self) -> Result<Box<dyn CoachingStore>, StoreError>;

    /// Human-readable description of what `connect` opens
    fn target(&self) -> String;
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
struct Tables {
    users: Vec<(String, UserRole)>,
    coaching: Vec<CoachingRecord>,
}

/// In-memory coaching store.
///
/// Clones share the same tables. Not durable; data is lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered users in insertion order
    pub fn users(&self) -> Vec<(String, UserRole)> {
        self.tables.read().map(|t| t.users.clone()).unwrap_or_default()
    }

    /// Logged coaching records in insertion order
    pub fn coaching_records(&self) -> Vec<CoachingRecord> {
        self.tables.read().map(|t| t.coaching.clone()).unwrap_or_default()
    }

    fn register(&self, user_id: &str, role: UserRole) -> Result<bool, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if tables.users.iter().any(|(id, _)| id == user_id) {
            return Ok(false);
        }
        tables.users.push((user_id.to_string(), role));
        Ok(true)
    }

    fn insert(&self, record: &CoachingRecord) -> Result<(), StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .coaching
            .push(record.clone());
        Ok(())
    }
}

/// Connector for an [`InMemoryStore`] with a reachability switch.
///
/// While unreachable, `connect` fails and live connections report themselves
/// stale and reject writes.
#[derive(Clone)]
pub struct InMemoryConnector {
    store: InMemoryStore,
    reachable: Arc<AtomicBool>,
}

impl InMemoryConnector {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store, reachable: Arc::new(AtomicBool::new(true)) }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl StoreConnector for InMemoryConnector {
    fn connect(&self) -> Result<Box<dyn CoachingStore>, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is unreachable".to_string()));
        }
        Ok(Box::new(InMemoryConnection {
            store: self.store.clone(),
            reachable: Arc::clone(&self.reachable),
        }))
    }

    fn target(&self) -> String {
        "in-memory".to_string()
    }
}

struct InMemoryConnection {
    store: InMemoryStore,
    reachable: Arc<AtomicBool>,
}

impl InMemoryConnection {
    fn check(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection lost".to_string()))
        }
    }
}

impl CoachingStore for InMemoryConnection {
    fn is_alive(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn register_user(&self, user_id: &str, role: UserRole) -> Result<bool, StoreError> {
        self.check()?;
        self.store.register(user_id, role)
    }

    fn insert_coaching(&self, record: &CoachingRecord) -> Result<(), StoreError> {
        self.check()?;
        self.store.insert(record)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
