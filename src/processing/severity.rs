//! Severity scoring and the driving-summary text block
//!
//! Both are pure functions of a [`FeatureRecord`]. The summary text is fed to
//! the model verbatim, so its layout must not change.

use std::fmt::Write;

use super::metrics::round_to;
use crate::config::defaults::{
    EVENT_COUNT_THRESHOLD, HIGH_SCORE, JERK_THRESHOLD, MEDIUM_SCORE, SPEED_THRESHOLD_KMH,
};
use crate::types::{FeatureRecord, SeverityTier};

/// Additive risk score of a window.
pub fn severity_score(f: &FeatureRecord) -> u32 {
    let mut score = 0;
    if f.harsh_brake_count > EVENT_COUNT_THRESHOLD {
        score += 2;
    }
    if f.harsh_accel_count > EVENT_COUNT_THRESHOLD {
        score += 2;
    }
    if f.sharp_corner_count > EVENT_COUNT_THRESHOLD {
        score += 2;
    }
    if f.bump_count > EVENT_COUNT_THRESHOLD {
        score += 1;
    }
    if f.mean_abs_jerk > JERK_THRESHOLD {
        score += 2;
    }
    if f.avg_speed_kmh > SPEED_THRESHOLD_KMH {
        score += 2;
    }
    score
}

/// Tier for a score.
pub const fn tier_for_score(score: u32) -> SeverityTier {
    if score >= HIGH_SCORE {
        SeverityTier::High
    } else if score >= MEDIUM_SCORE {
        SeverityTier::Medium
    } else {
        SeverityTier::Low
    }
}

/// Classify a window.
pub fn classify(f: &FeatureRecord) -> SeverityTier {
    tier_for_score(severity_score(f))
}

/// Render the fixed summary block. No trailing newline.
pub fn build_summary(f: &FeatureRecord) -> String {
    let mut out = String::with_capacity(256);
    // Writing to a String cannot fail
    let _ = write!(
        out,
        "Driving sensor summary (30s segment):\n\
         • Avg/Max speed: {}/{} km/h (variance {})\n\
         • Harsh brakes: {}\n\
         • Harsh accelerations: {}\n\
         • Sharp corners: {}\n\
         • Bumps: {}\n\
         • Mean jerk: {} m/s³\n\
         • Yaw variance: {}",
        format_number(f.avg_speed_kmh, 1),
        format_number(f.max_speed_kmh, 1),
        format_number(f.speed_variance, 1),
        f.harsh_brake_count,
        f.harsh_accel_count,
        f.sharp_corner_count,
        f.bump_count,
        format_number(f.mean_abs_jerk, 2),
        format_number(f.yaw_variance, 3),
    );
    out
}

/// Round, then render in shortest round-trip form; whole values keep `.0`.
pub fn format_number(value: f64, decimals: u32) -> String {
    let rounded = round_to(value, decimals);
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}
