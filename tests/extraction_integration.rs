//! Extraction Integration Tests
//!
//! Trips written to disk as CSV, discovered and windowed through the
//! registry, then classified and summarized.

mod common;

use common::{write_trip, TripShape};
use drive_coach::acquisition::{load_trip, InputError};
use drive_coach::processing::{build_summary, classify, extract_trip};
use drive_coach::{RegistryError, SeverityTier, TripRegistry};

#[test]
fn calm_trip_windows_are_low_severity() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(40));

    let registry = TripRegistry::new(root.path(), 15);
    assert_eq!(registry.list_windows("alice", "t1").unwrap(), (0..11).collect::<Vec<_>>());

    let severities = registry.window_severities("alice", "t1").unwrap();
    assert_eq!(severities.len(), 11);
    assert!(severities.iter().all(|w| w.severity == SeverityTier::Low));
}

#[test]
fn windows_are_capped_at_max_windows() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "long", TripShape::calm(90));

    let registry = TripRegistry::new(root.path(), 15);
    let windows = registry.list_windows("alice", "long").unwrap();
    assert_eq!(windows.len(), 15);
    assert_eq!(windows.last(), Some(&14));
}

#[test]
fn braking_at_speed_is_medium() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "bob", "t1", TripShape { seconds: 31, speed: 20.0, braking: true });

    let telemetry = load_trip(&root.path().join("bob").join("t1")).unwrap();
    let records = extract_trip(&telemetry, None);
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.harsh_brake_count, 150);
    assert_eq!(first.harsh_accel_count, 0);
    assert!((first.avg_speed_kmh - 72.0).abs() < 1e-9);
    assert_eq!(classify(first), SeverityTier::Medium);

    let summary = build_summary(first);
    assert!(summary.starts_with("Driving sensor summary (30s segment):\n"));
    assert!(summary.contains("• Avg/Max speed: 72.0/72.0 km/h (variance 0.0)"));
    assert!(summary.contains("• Harsh brakes: 150"));
    assert!(!summary.ends_with('\n'));

    let registry = TripRegistry::new(root.path(), 15);
    let prepared = registry.prepare_window("bob", "t1", 1).unwrap();
    assert_eq!(prepared.severity, SeverityTier::Medium);
    assert_eq!(prepared.summary, build_summary(&records[1]));
}

#[test]
fn short_trip_has_no_windows() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "short", TripShape::calm(20));

    let registry = TripRegistry::new(root.path(), 15);
    assert!(registry.list_windows("alice", "short").unwrap().is_empty());
}

#[test]
fn empty_accelerometer_file_is_input_error() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(40));
    let accel = root.path().join("alice/t1/accelerometer_data.csv");
    std::fs::write(&accel, "timestamp,accelerationX,accelerationY,accelerationZ\n").unwrap();

    let registry = TripRegistry::new(root.path(), 15);
    assert!(matches!(
        registry.features("alice", "t1"),
        Err(RegistryError::Input(InputError::EmptyStream(_)))
    ));
}

#[test]
fn cached_features_survive_until_invalidated() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(40));

    let registry = TripRegistry::new(root.path(), 15);
    assert_eq!(registry.list_windows("alice", "t1").unwrap().len(), 11);

    // Shorter telemetry on disk is not seen until the cache entry is dropped
    write_trip(root.path(), "alice", "t1", TripShape::calm(35));
    assert_eq!(registry.list_windows("alice", "t1").unwrap().len(), 11);
    registry.invalidate("alice", "t1");
    assert_eq!(registry.list_windows("alice", "t1").unwrap().len(), 6);
}
