//! Driver presence tracking
//!
//! In-process record of which drivers are logged in. Nothing here is
//! persisted; a restart logs everyone out.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::types::DriverStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub display_name: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DriverPresence {
    online: RwLock<HashMap<String, PresenceEntry>>,
}

impl DriverPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a driver online. Logging in again refreshes the entry.
    pub fn login(&self, driver_id: &str, display_name: &str) {
        let entry = PresenceEntry { display_name: display_name.to_string(), since: Utc::now() };
        self.online
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(driver_id.to_string(), entry);
        info!(driver_id, display_name, "Driver logged in");
    }

    /// Mark a driver offline. Returns whether they were online.
    pub fn logout(&self, driver_id: &str) -> bool {
        let was_online = self
            .online
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(driver_id)
            .is_some();
        if was_online {
            info!(driver_id, "Driver logged out");
        }
        was_online
    }

    pub fn is_online(&self, driver_id: &str) -> bool {
        self.entry(driver_id).is_some()
    }

    pub fn entry(&self, driver_id: &str) -> Option<PresenceEntry> {
        self.online
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(driver_id)
            .cloned()
    }

    pub fn status(&self, driver_id: &str) -> DriverStatus {
        DriverStatus { driver_id: driver_id.to_string(), online: self.is_online(driver_id) }
    }

    /// Online drivers, sorted
    pub fn online_drivers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .online
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_logout() {
        let presence = DriverPresence::new();
        assert!(!presence.status("adam").online);

        presence.login("adam", "Adam");
        presence.login("zoe", "Zoe");
        assert!(presence.status("adam").online);
        assert_eq!(presence.entry("adam").unwrap().display_name, "Adam");
        assert_eq!(presence.online_drivers(), vec!["adam", "zoe"]);

        assert!(presence.logout("adam"));
        assert!(!presence.logout("adam"));
        assert_eq!(presence.status("adam"), DriverStatus { driver_id: "adam".to_string(), online: false });
    }
}
