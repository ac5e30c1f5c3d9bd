//! Coaching outputs, persistence jobs and consumer-facing views

use serde::{Deserialize, Serialize};

use super::SeverityTier;

/// Who the generated feedback is addressed to.
///
/// Coach mode applies the configured terminology substitutions to the model
/// output; driver mode returns it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackMode {
    #[default]
    Driver,
    Coach,
}

/// Account role recorded on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Driver,
    Coach,
}

impl UserRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            UserRole::Driver => "driver",
            UserRole::Coach => "coach",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(UserRole::Driver),
            "coach" => Ok(UserRole::Coach),
            other => Err(format!("unknown role '{other}' (expected driver or coach)")),
        }
    }
}

/// One generated coaching result, as logged to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingRecord {
    pub driver_id: String,
    pub trip_id: String,
    pub window_index: usize,
    pub severity: SeverityTier,
    pub summary: String,
    pub coaching: String,
}

/// Severity of one window, without running inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSeverity {
    pub window_index: usize,
    pub severity: SeverityTier,
}

/// Full analysis of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAnalysis {
    pub window_index: usize,
    pub severity: SeverityTier,
    pub summary: String,
    pub coaching: String,
}

/// Result of analyzing a whole trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TripReport {
    /// The trip produced no usable windows
    Empty { message: String },
    Ok {
        trip_id: String,
        #[serde(flatten)]
        analysis: WindowAnalysis,
    },
}

/// Online status of a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub driver_id: String,
    pub online: bool,
}
