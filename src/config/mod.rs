//! Coach Configuration Module
//!
//! Deployment settings loaded from TOML: where trips live, where the coaching
//! log is stored, how the streaming scheduler paces itself and how inference
//! is provided.
//!
//! ## Loading Order
//!
//! 1. `DRIVE_COACH_CONFIG` environment variable (path to TOML file)
//! 2. `coach_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(CoachConfig::load());
//!
//! // Anywhere in the binary:
//! let root = &config::get().data.trips_root;
//! ```

mod coach_config;
pub mod validation;
pub mod defaults;

pub use coach_config::*;
pub use validation::ValidationWarning;

use std::sync::OnceLock;

/// Global coach configuration, initialized once at startup.
static COACH_CONFIG: OnceLock<CoachConfig> = OnceLock::new();

/// Initialize the global coach configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: CoachConfig) {
    if COACH_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global coach configuration.
///
/// Falls back to built-in defaults when `init()` has not been called.
pub fn get() -> &'static CoachConfig {
    COACH_CONFIG.get_or_init(CoachConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    COACH_CONFIG.get().is_some()
}
