//! Window feature records and severity tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived driving-event features for one accepted 30 s window.
///
/// Produced by [`crate::processing::extract`] in window order; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Position in the emitted sequence (0-based)
    pub index: usize,
    /// Anchor timestamp (a location sample) of the window
    pub window_start: DateTime<Utc>,

    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Sample variance of speed in (m/s)²
    pub speed_variance: f64,

    pub harsh_brake_count: u32,
    pub harsh_accel_count: u32,
    pub sharp_corner_count: u32,
    pub bump_count: u32,

    /// Mean |d(accel_y)/dt| in g/s
    pub mean_abs_jerk: f64,
    /// Sample variance of yaw rate in (rad/s)²
    pub yaw_variance: f64,
}

impl FeatureRecord {
    /// All-zero record anchored at `window_start`
    pub fn empty(index: usize, window_start: DateTime<Utc>) -> Self {
        Self {
            index,
            window_start,
            avg_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            speed_variance: 0.0,
            harsh_brake_count: 0,
            harsh_accel_count: 0,
            sharp_corner_count: 0,
            bump_count: 0,
            mean_abs_jerk: 0.0,
            yaw_variance: 0.0,
        }
    }
}

/// Coarse risk tier of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl SeverityTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            SeverityTier::Low => "LOW",
            SeverityTier::Medium => "MEDIUM",
            SeverityTier::High => "HIGH",
        }
    }

    /// Position in lookup tables indexed by tier
    pub const fn ordinal(self) -> usize {
        match self {
            SeverityTier::Low => 0,
            SeverityTier::Medium => 1,
            SeverityTier::High => 2,
        }
    }

    /// Tiers that should raise an alert in the driver view
    pub const fn is_alert(self) -> bool {
        matches!(self, SeverityTier::High)
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeverityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(SeverityTier::Low),
            "MEDIUM" => Ok(SeverityTier::Medium),
            "HIGH" => Ok(SeverityTier::High),
            other => Err(format!("unknown severity tier '{other}'")),
        }
    }
}
