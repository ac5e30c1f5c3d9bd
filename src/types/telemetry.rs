//! Raw telemetry samples and time-sorted sensor streams

use chrono::{DateTime, Utc};

use crate::acquisition::InputError;

/// Which of the three trip sensor files a stream came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Location,
    Accelerometer,
    Gyroscope,
}

impl StreamKind {
    /// File name of this stream inside a trip directory
    pub const fn file_name(self) -> &'static str {
        match self {
            StreamKind::Location => "location_data.csv",
            StreamKind::Accelerometer => "accelerometer_data.csv",
            StreamKind::Gyroscope => "gyroscope_data.csv",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Location => write!(f, "location"),
            StreamKind::Accelerometer => write!(f, "accelerometer"),
            StreamKind::Gyroscope => write!(f, "gyroscope"),
        }
    }
}

/// A timestamped sensor row
pub trait Sample: Clone + std::fmt::Debug {
    const KIND: StreamKind;

    fn timestamp(&self) -> DateTime<Utc>;
}

/// GPS fix with ground speed in m/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    pub timestamp: DateTime<Utc>,
    /// Ground speed (m/s), NaN when the fix carried no speed
    pub speed: f64,
}

/// Accelerometer reading in g.
///
/// X is lateral, Y longitudinal (positive = accelerating), Z vertical
/// (about -1 g at rest).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSample {
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Gyroscope yaw rate (rad/s)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroSample {
    pub timestamp: DateTime<Utc>,
    pub rotation_rate_z: f64,
}

impl Sample for LocationSample {
    const KIND: StreamKind = StreamKind::Location;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Sample for AccelSample {
    const KIND: StreamKind = StreamKind::Accelerometer;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Sample for GyroSample {
    const KIND: StreamKind = StreamKind::Gyroscope;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Time-ordered samples of one sensor.
///
/// Construction sorts (stably) by timestamp and rejects empty input, so every
/// `SensorStream` is non-empty and non-decreasing in time.
#[derive(Debug, Clone)]
pub struct SensorStream<S: Sample> {
    samples: Vec<S>,
}

impl<S: Sample> SensorStream<S> {
    pub fn new(mut samples: Vec<S>) -> Result<Self, InputError> {
        if samples.is_empty() {
            return Err(InputError::EmptyStream(S::KIND));
        }
        samples.sort_by_key(Sample::timestamp);
        Ok(Self { samples })
    }

    pub fn kind(&self) -> StreamKind {
        S::KIND
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.samples[0].timestamp()
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].timestamp()
    }

    /// Samples with `start <= t < end`
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[S] {
        let lo = self.samples.partition_point(|s| s.timestamp() < start);
        let hi = self.samples.partition_point(|s| s.timestamp() < end);
        &self.samples[lo..hi.max(lo)]
    }
}
