//! Telemetry acquisition module
//!
//! Loads a trip's three sensor CSV files into time-sorted [`SensorStream`]s.
//!
//! [`SensorStream`]: crate::types::SensorStream

mod csv_stream;

pub use csv_stream::{load_accel, load_gyro, load_location, load_trip, parse_timestamp, TripTelemetry};

use std::path::PathBuf;
use thiserror::Error;

use crate::types::StreamKind;

/// Telemetry that cannot be turned into a valid stream.
///
/// Fatal to the extraction call that hit it; no partial result is produced.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("telemetry file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("{}: missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{0} stream has no samples")]
    EmptyStream(StreamKind),

    #[error("{}:{line}: {message}", .path.display())]
    Malformed { path: PathBuf, line: usize, message: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
