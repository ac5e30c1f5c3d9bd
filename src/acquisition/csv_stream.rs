//! CSV telemetry loader
//!
//! Each trip directory holds `location_data.csv`, `accelerometer_data.csv`
//! and `gyroscope_data.csv`. Files carry a header row; columns are located by
//! exact name and extra columns are ignored.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::InputError;
use crate::types::{AccelSample, GyroSample, LocationSample, Sample, SensorStream, StreamKind};

/// The three sensor streams of one trip.
#[derive(Debug, Clone)]
pub struct TripTelemetry {
    pub location: SensorStream<LocationSample>,
    pub accel: SensorStream<AccelSample>,
    pub gyro: SensorStream<GyroSample>,
}

/// Load all three streams from a trip directory.
pub fn load_trip(dir: &Path) -> Result<TripTelemetry, InputError> {
    let telemetry = TripTelemetry {
        location: load_location(&dir.join(StreamKind::Location.file_name()))?,
        accel: load_accel(&dir.join(StreamKind::Accelerometer.file_name()))?,
        gyro: load_gyro(&dir.join(StreamKind::Gyroscope.file_name()))?,
    };
    debug!(
        dir = %dir.display(),
        location = telemetry.location.len(),
        accel = telemetry.accel.len(),
        gyro = telemetry.gyro.len(),
        "Loaded trip telemetry"
    );
    Ok(telemetry)
}

/// `timestamp`, `speed` (m/s)
pub fn load_location(path: &Path) -> Result<SensorStream<LocationSample>, InputError> {
    load_stream(path, &["speed"], |timestamp, v| LocationSample { timestamp, speed: v[0] })
}

/// `timestamp`, `accelerationX`, `accelerationY`, `accelerationZ` (g)
pub fn load_accel(path: &Path) -> Result<SensorStream<AccelSample>, InputError> {
    load_stream(
        path,
        &["accelerationX", "accelerationY", "accelerationZ"],
        |timestamp, v| AccelSample { timestamp, x: v[0], y: v[1], z: v[2] },
    )
}

/// `timestamp`, `rotationRateZ` (rad/s)
pub fn load_gyro(path: &Path) -> Result<SensorStream<GyroSample>, InputError> {
    load_stream(path, &["rotationRateZ"], |timestamp, v| GyroSample {
        timestamp,
        rotation_rate_z: v[0],
    })
}

// ============================================================================
// Generic loader
// ============================================================================

fn load_stream<S, F>(path: &Path, columns: &[&str], build: F) -> Result<SensorStream<S>, InputError>
where
    S: Sample,
    F: Fn(DateTime<Utc>, &[f64]) -> S,
{
    if !path.is_file() {
        return Err(InputError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|source| InputError::Io { path: path.to_path_buf(), source })?;

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return Err(InputError::EmptyStream(S::KIND));
    };
    let header: Vec<String> = csv_split(header_line.trim_start_matches('\u{feff}'))
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let ts_idx = column_index(&header, "timestamp", path)?;
    let value_idx: Vec<usize> = columns
        .iter()
        .map(|c| column_index(&header, c, path))
        .collect::<Result<_, _>>()?;

    let mut samples = Vec::new();
    let mut values = vec![0.0; columns.len()];
    for (line_no, line) in lines {
        let fields = csv_split(line);
        let malformed = |message: String| InputError::Malformed {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };

        let raw_ts = fields.get(ts_idx).map_or("", String::as_str);
        let timestamp = parse_timestamp(raw_ts).map_err(malformed)?;

        for (slot, (&idx, name)) in values.iter_mut().zip(value_idx.iter().zip(columns)) {
            let raw = fields.get(idx).map_or("", String::as_str);
            *slot = parse_value(raw)
                .ok_or_else(|| malformed(format!("column '{name}': not a number: '{raw}'")))?;
        }
        samples.push(build(timestamp, &values));
    }

    SensorStream::new(samples)
}

fn column_index(header: &[String], name: &str, path: &Path) -> Result<usize, InputError> {
    header.iter().position(|h| h == name).ok_or_else(|| InputError::MissingColumn {
        path: PathBuf::from(path),
        column: name.to_string(),
    })
}

/// Split a CSV line into fields, honouring double quotes and `""` escapes.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Numeric cell. Blank, `nan` and `null` are missing values (NaN).
fn parse_value(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

// ============================================================================
// Timestamps
// ============================================================================

const EPOCH_NANOS_FLOOR: f64 = 1e17;
const EPOCH_MILLIS_FLOOR: f64 = 1e11;

/// Parse a timestamp cell into UTC.
///
/// Accepts RFC 3339 / ISO 8601 (zone optional, UTC assumed), with `T` or space
/// separator and optional fractional seconds, and numeric epochs in seconds,
/// milliseconds or nanoseconds (detected by magnitude).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Err("empty timestamp".to_string());
    }

    if let Ok(epoch) = s.parse::<f64>() {
        return epoch_to_datetime(epoch).ok_or_else(|| format!("epoch out of range: '{s}'"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    // Without timezone (assume UTC)
    for fmt in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(format!("unrecognised timestamp: '{s}'"))
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let magnitude = epoch.abs();
    let nanos = if magnitude >= EPOCH_NANOS_FLOOR {
        epoch
    } else if magnitude >= EPOCH_MILLIS_FLOOR {
        epoch * 1e6
    } else {
        epoch * 1e9
    };
    if nanos.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Utc.timestamp_nanos(nanos.round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_split_quotes() {
        assert_eq!(csv_split("a,\"b,c\",d"), vec!["a", "b,c", "d"]);
        assert_eq!(csv_split("\"say \"\"hi\"\"\",2"), vec!["say \"hi\"", "2"]);
        assert_eq!(csv_split("1,,3"), vec!["1", "", "3"]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2023-05-01T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-05-01 12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-05-01T14:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-05-01 12:00:00+00:00").unwrap(), expected);

        let epoch = expected.timestamp();
        assert_eq!(parse_timestamp(&epoch.to_string()).unwrap(), expected);
        assert_eq!(parse_timestamp(&(epoch * 1000).to_string()).unwrap(), expected);
        assert_eq!(parse_timestamp(&(epoch * 1_000_000_000).to_string()).unwrap(), expected);

        let frac = parse_timestamp("2023-05-01T12:00:00.040").unwrap();
        assert_eq!(frac.timestamp_subsec_millis(), 40);

        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_load_location_sorts_and_tolerates_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "location_data.csv",
            "timestamp,latitude,speed\n\
             2023-05-01T12:00:02Z,1.0,3.5\n\
             2023-05-01T12:00:00Z,1.0,\n\
             2023-05-01T12:00:01Z,1.0,nan\n",
        );
        let stream = load_location(&path).unwrap();
        assert_eq!(stream.len(), 3);
        assert!(stream.samples()[0].speed.is_nan());
        assert!(stream.samples()[1].speed.is_nan());
        assert!((stream.samples()[2].speed - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_column_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "gyroscope_data.csv", "timestamp,rotationRateX\n0,1\n");
        match load_gyro(&path).unwrap_err() {
            InputError::MissingColumn { column, .. } => assert_eq!(column, "rotationRateZ"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            load_gyro(&dir.path().join("nope.csv")).unwrap_err(),
            InputError::MissingFile(_)
        ));
    }

    #[test]
    fn test_header_only_is_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "accelerometer_data.csv",
            "timestamp,accelerationX,accelerationY,accelerationZ\n",
        );
        assert!(matches!(
            load_accel(&path).unwrap_err(),
            InputError::EmptyStream(StreamKind::Accelerometer)
        ));
    }

    #[test]
    fn test_garbage_value_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "gyroscope_data.csv",
            "timestamp,rotationRateZ\n1700000000,0.1\n1700000001,fast\n",
        );
        match load_gyro(&path).unwrap_err() {
            InputError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
