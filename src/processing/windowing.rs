//! Window feature extraction
//!
//! Every location timestamp anchors a candidate window `[t, t + 30 s)`.
//! Candidates stop once a window would run past the last location fix. A
//! candidate is kept only when the accelerometer delivered at least 70 % of
//! the nominal sample count inside it.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use super::metrics::{count_peaks, finite_values, max, mean, mean_abs_rate, round_to, sample_variance};
use crate::acquisition::{InputError, TripTelemetry};
use crate::config::defaults::{
    BUMP_G_THRESHOLD, DT, HARSH_ACCEL_G, HARSH_BRAKE_G, LATERAL_G_THRESHOLD, MIN_WINDOW_SAMPLES,
    MS_TO_KMH, PAIRING_TOLERANCE_MS, WINDOW_SECONDS, YAW_RATE_THRESHOLD,
};
use crate::types::{AccelSample, FeatureRecord, GyroSample, LocationSample, SensorStream};

/// Extract feature records from three sorted streams.
///
/// Stops without error once `max_windows` records have been emitted.
pub fn extract(
    location: &SensorStream<LocationSample>,
    accel: &SensorStream<AccelSample>,
    gyro: &SensorStream<GyroSample>,
    max_windows: Option<usize>,
) -> Vec<FeatureRecord> {
    let span = Duration::seconds(WINDOW_SECONDS);
    let last_fix = location.last_timestamp();
    let cap = max_windows.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for anchor in location.samples() {
        if records.len() >= cap {
            break;
        }
        let start = anchor.timestamp;
        let end = start + span;
        if end > last_fix {
            break;
        }

        let acc = accel.slice(start, end);
        if acc.len() < MIN_WINDOW_SAMPLES {
            trace!(start = %start, samples = acc.len(), "Window below accelerometer coverage, skipped");
            skipped += 1;
            continue;
        }

        records.push(window_features(
            records.len(),
            start,
            location.slice(start, end),
            acc,
            gyro.slice(start, end),
        ));
    }

    debug!(emitted = records.len(), skipped, "Window extraction complete");
    records
}

/// Extract from unsorted sample vectors.
///
/// Any empty stream is an [`InputError::EmptyStream`].
pub fn extract_samples(
    location: Vec<LocationSample>,
    accel: Vec<AccelSample>,
    gyro: Vec<GyroSample>,
    max_windows: Option<usize>,
) -> Result<Vec<FeatureRecord>, InputError> {
    let location = SensorStream::new(location)?;
    let accel = SensorStream::new(accel)?;
    let gyro = SensorStream::new(gyro)?;
    Ok(extract(&location, &accel, &gyro, max_windows))
}

/// Extract from a loaded trip.
pub fn extract_trip(trip: &TripTelemetry, max_windows: Option<usize>) -> Vec<FeatureRecord> {
    extract(&trip.location, &trip.accel, &trip.gyro, max_windows)
}

fn window_features(
    index: usize,
    start: DateTime<Utc>,
    loc: &[LocationSample],
    acc: &[AccelSample],
    gyro: &[GyroSample],
) -> FeatureRecord {
    let speeds = finite_values(loc.iter().map(|s| s.speed));
    let accel_y: Vec<f64> = acc.iter().map(|s| s.y).collect();
    let vertical: Vec<f64> = acc.iter().map(|s| (s.z + 1.0).abs()).collect();
    let yaw = finite_values(gyro.iter().map(|s| s.rotation_rate_z));

    FeatureRecord {
        index,
        window_start: start,
        avg_speed_kmh: round_to(mean(&speeds) * MS_TO_KMH, 1),
        max_speed_kmh: round_to(max(&speeds) * MS_TO_KMH, 1),
        speed_variance: round_to(sample_variance(&speeds), 2),
        harsh_brake_count: count(acc, |s| s.y < HARSH_BRAKE_G),
        harsh_accel_count: count(acc, |s| s.y > HARSH_ACCEL_G),
        sharp_corner_count: sharp_corners(acc, gyro),
        bump_count: count_peaks(&vertical, BUMP_G_THRESHOLD),
        mean_abs_jerk: round_to(mean_abs_rate(&accel_y, DT), 3),
        yaw_variance: round_to(sample_variance(&yaw), 6),
    }
}

fn count(acc: &[AccelSample], pred: impl Fn(&AccelSample) -> bool) -> u32 {
    u32::try_from(acc.iter().filter(|s| pred(s)).count()).unwrap_or(u32::MAX)
}

/// Accelerometer samples over the lateral threshold whose paired gyroscope
/// sample is over the yaw threshold.
fn sharp_corners(acc: &[AccelSample], gyro: &[GyroSample]) -> u32 {
    count(acc, |a| {
        a.x.abs() > LATERAL_G_THRESHOLD
            && nearest_gyro(gyro, a.timestamp)
                .is_some_and(|g| g.rotation_rate_z.abs() > YAW_RATE_THRESHOLD)
    })
}

/// Gyroscope sample closest to `t`, if one lies within half an IMU interval.
fn nearest_gyro(gyro: &[GyroSample], t: DateTime<Utc>) -> Option<&GyroSample> {
    let tolerance = Duration::milliseconds(PAIRING_TOLERANCE_MS);
    let idx = gyro.partition_point(|g| g.timestamp < t);

    let before = idx.checked_sub(1).and_then(|i| gyro.get(i));
    let after = gyro.get(idx);
    let candidate = match (before, after) {
        (Some(b), Some(a)) => {
            if t - b.timestamp <= a.timestamp - t { b } else { a }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    ((candidate.timestamp - t).abs() <= tolerance).then_some(candidate)
}
