//! Fixed algorithm constants and built-in configuration defaults.
//!
//! Window policy and event thresholds are not runtime-tunable; the tunable
//! deployment values live in [`super::CoachConfig`].

// ============================================================================
// Windowing
// ============================================================================

/// Length of one behavioral window (seconds).
pub const WINDOW_SECONDS: i64 = 30;

/// Nominal IMU sampling rate (Hz).
pub const IMU_HZ: f64 = 25.0;

/// Nominal IMU sample interval (seconds).
pub const DT: f64 = 1.0 / IMU_HZ;

/// Percentage of the nominal accelerometer sample count a window must hold.
pub const COVERAGE_PERCENT: usize = 70;

/// Accelerometer samples in a fully covered window.
pub const NOMINAL_WINDOW_SAMPLES: usize = WINDOW_SECONDS as usize * IMU_HZ as usize;

/// Minimum accelerometer samples per accepted window.
pub const MIN_WINDOW_SAMPLES: usize = NOMINAL_WINDOW_SAMPLES * COVERAGE_PERCENT / 100;

const _: () = assert!(MIN_WINDOW_SAMPLES == 525);

/// Maximum distance between an accelerometer sample and the gyroscope sample
/// paired with it (milliseconds). Half an IMU interval.
pub const PAIRING_TOLERANCE_MS: i64 = 20;

/// Metres per second to kilometres per hour.
pub const MS_TO_KMH: f64 = 3.6;

// ============================================================================
// Event Thresholds
// ============================================================================

/// Longitudinal deceleration counted as a harsh brake (g).
pub const HARSH_BRAKE_G: f64 = -0.4;

/// Longitudinal acceleration counted as a harsh acceleration (g).
pub const HARSH_ACCEL_G: f64 = 0.4;

/// Lateral acceleration magnitude for a sharp corner (g).
pub const LATERAL_G_THRESHOLD: f64 = 0.35;

/// Yaw-rate magnitude for a sharp corner (rad/s).
pub const YAW_RATE_THRESHOLD: f64 = 0.3;

/// Peak height of gravity-compensated vertical acceleration for a bump (g).
pub const BUMP_G_THRESHOLD: f64 = 0.3;

// ============================================================================
// Severity Scoring
// ============================================================================

/// Event count above which a category adds to the severity score.
pub const EVENT_COUNT_THRESHOLD: u32 = 3;

/// Mean absolute jerk above which the score increases (g/s).
pub const JERK_THRESHOLD: f64 = 2.5;

/// Average speed above which the score increases (km/h).
pub const SPEED_THRESHOLD_KMH: f64 = 60.0;

/// Score at or above which a window is HIGH.
pub const HIGH_SCORE: u32 = 7;

/// Score at or above which a window is MEDIUM.
pub const MEDIUM_SCORE: u32 = 4;

// ============================================================================
// Scheduler
// ============================================================================

/// Windows walked per streaming session.
pub const DEFAULT_MAX_WINDOWS: usize = 15;

/// Interval between scheduler ticks in the streaming view (seconds).
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

// ============================================================================
// Deployment Defaults
// ============================================================================

/// Directory holding `<driver>/<trip>/` telemetry folders.
pub const DEFAULT_TRIPS_ROOT: &str = "data/trips";

/// sled database directory for the coaching log.
pub const DEFAULT_STORE_PATH: &str = "./data/coach_store";

/// Prefix reserved for coach accounts; such ids never own trips.
pub const COACH_ID_PREFIX: &str = "coach_";

/// Message returned when a trip yields no usable window.
pub const EMPTY_TRIP_MESSAGE: &str = "No valid trip data";
