//! Scheduler Integration Tests
//!
//! Streams on-disk trips through the coach service with fake generators and
//! checks ordering, prefetch, the single inference slot, stop semantics and
//! retry after failure.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{service, wait_for, write_trip, CountingGenerator, FlakyGenerator, GatedGenerator, TripShape};
use drive_coach::types::TripReport;
use drive_coach::{
    RegistryError, SchedulerError, ServiceError, Session, SessionState, StartOutcome, TickOutcome,
    WindowAnalysis,
};

/// Tick every 5 ms until the session completes, collecting surfaced windows.
async fn stream_to_completion(service: &drive_coach::CoachService, session: &mut Session) -> Vec<WindowAnalysis> {
    let mut surfaced = Vec::new();
    for _ in 0..2000 {
        match service.tick(session) {
            TickOutcome::Surfaced(analysis) => surfaced.push(analysis),
            TickOutcome::Complete => return surfaced,
            TickOutcome::Pending { .. } => tokio::time::sleep(Duration::from_millis(5)).await,
            TickOutcome::Idle => panic!("session went idle while streaming"),
        }
    }
    panic!("stream did not complete; surfaced {} windows", surfaced.len());
}

#[tokio::test]
async fn windows_surface_in_order_and_are_logged() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "2024-03-01", TripShape::calm(32));
    write_trip(root.path(), "alice", "2024-03-02", TripShape::calm(40));
    let generator = Arc::new(CountingGenerator::with_delay(2));
    let (service, connector) = service(root.path(), Some(generator.clone()));

    let mut session = service.new_session("alice");
    let outcome = service.start_session(&mut session).unwrap();
    let StartOutcome::Streaming { trip_id, windows } = outcome else {
        panic!("expected streaming, got {outcome:?}");
    };
    assert_eq!(trip_id, "2024-03-01");
    assert_eq!(windows.len(), 3);
    assert_eq!(session.state(), SessionState::Streaming);

    let surfaced = stream_to_completion(&service, &mut session).await;
    let indices: Vec<usize> = surfaced.iter().map(|a| a.window_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(surfaced[0].coaching, "coaching #0 for this segment");
    assert!(surfaced.iter().all(|a| a.summary.starts_with("Driving sensor summary")));

    // The last window is never surfaced twice
    assert_eq!(service.tick(&mut session), TickOutcome::Complete);
    assert_eq!(service.tick(&mut session), TickOutcome::Complete);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

    service.flush().await;
    let logged: Vec<usize> = connector.store().coaching_records().iter().map(|r| r.window_index).collect();
    assert_eq!(logged, vec![0, 1, 2]);
    let first = &connector.store().coaching_records()[0];
    assert_eq!(first.driver_id, "alice");
    assert_eq!(first.trip_id, "2024-03-01");
    service.shutdown().await;
}

#[tokio::test]
async fn pending_tick_does_not_restart_inference() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(31));
    let generator = Arc::new(GatedGenerator::new());
    let (service, _connector) = service(root.path(), Some(generator.clone()));

    let mut session = service.new_session("alice");
    service.start_session(&mut session).unwrap();
    assert!(wait_for(|| generator.calls.load(Ordering::SeqCst) == 1).await);

    for _ in 0..5 {
        assert_eq!(service.tick(&mut session), TickOutcome::Pending { index: 0 });
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.scheduler().results().in_flight(), 1);

    // Window 0 completes; surfacing it prefetches window 1
    generator.release(1);
    assert!(wait_for(|| service.scheduler().results().in_flight() == 0).await);
    let TickOutcome::Surfaced(first) = service.tick(&mut session) else {
        panic!("window 0 should be ready");
    };
    assert_eq!(first.window_index, 0);
    assert!(wait_for(|| generator.calls.load(Ordering::SeqCst) == 2).await);
    assert_eq!(session.pointer(), Some(1));

    generator.release(1);
    assert_eq!(stream_to_completion(&service, &mut session).await.len(), 1);
}

#[tokio::test]
async fn one_inference_at_a_time_across_sessions() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(33));
    write_trip(root.path(), "bob", "t1", TripShape::calm(33));
    let generator = Arc::new(CountingGenerator::with_delay(10));
    let (service, _connector) = service(root.path(), Some(generator.clone()));

    let mut alice = service.new_session("alice");
    let mut bob = service.new_session("bob");
    assert_ne!(alice.id(), bob.id());
    service.start_session(&mut alice).unwrap();
    service.start_session(&mut bob).unwrap();

    let streams = async {
        let mut done = (false, false);
        for _ in 0..2000 {
            done.0 |= service.tick(&mut alice) == TickOutcome::Complete;
            done.1 |= service.tick(&mut bob) == TickOutcome::Complete;
            if done == (true, true) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(3)).await;
        }
        done
    };
    let analyses = async {
        let a = service.analyze_window("alice", "t1", 2).await.unwrap();
        let b = service.analyze_window("bob", "t1", 3).await.unwrap();
        (a, b)
    };
    let (done, (a, b)) = tokio::join!(streams, analyses);

    assert_eq!(done, (true, true));
    assert_eq!(a.window_index, 2);
    assert_eq!(b.window_index, 3);
    assert!(a.coaching.ends_with("for this trip"));
    assert_eq!(generator.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 4 + 4 + 2);
}

#[tokio::test]
async fn stop_orphans_in_flight_result() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(32));
    let generator = Arc::new(GatedGenerator::new());
    let (service, connector) = service(root.path(), Some(generator.clone()));

    let mut session = service.new_session("alice");
    service.start_session(&mut session).unwrap();
    assert!(wait_for(|| generator.calls.load(Ordering::SeqCst) == 1).await);

    service.stop_session(&mut session);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.trip_id().is_none());
    assert!(service.scheduler().results().is_empty());
    assert_eq!(service.tick(&mut session), TickOutcome::Idle);

    // The finished inference is still logged but never reaches the table
    generator.release(1);
    assert!(wait_for(|| connector.store().coaching_records().len() == 1).await);
    assert!(service.scheduler().results().is_empty());

    // Restarting begins a fresh run at window 0
    generator.release(8);
    let outcome = service.start_session(&mut session).unwrap();
    assert!(matches!(outcome, StartOutcome::Streaming { .. }));
    assert_eq!(session.pointer(), Some(0));
    let indices: Vec<usize> =
        stream_to_completion(&service, &mut session).await.iter().map(|a| a.window_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn failed_inference_is_retried_on_next_tick() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(30));
    let generator = Arc::new(FlakyGenerator::new(1));
    let (service, connector) = service(root.path(), Some(generator.clone()));

    let mut session = service.new_session("alice");
    service.start_session(&mut session).unwrap();
    let surfaced = stream_to_completion(&service, &mut session).await;

    assert_eq!(surfaced.len(), 1);
    assert_eq!(surfaced[0].coaching, "recovered coaching");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.gateway().stats().await.failures, 1);

    service.flush().await;
    assert_eq!(connector.store().coaching_records().len(), 1);
}

#[tokio::test]
async fn start_without_generator_is_not_initialized() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(40));
    let (service, _connector) = service(root.path(), None);

    let mut session = service.new_session("alice");
    assert!(matches!(
        service.start_session(&mut session),
        Err(ServiceError::Scheduler(SchedulerError::NotInitialized))
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn nothing_to_stream_leaves_session_idle() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "bob", "short", TripShape::calm(10));
    std::fs::create_dir_all(root.path().join("carol")).unwrap();
    let (service, _connector) = service(root.path(), Some(Arc::new(CountingGenerator::default())));

    let mut carol = service.new_session("carol");
    assert_eq!(service.start_session(&mut carol).unwrap(), StartOutcome::NoTrips);
    assert_eq!(carol.state(), SessionState::Idle);

    let mut bob = service.new_session("bob");
    assert_eq!(
        service.start_session(&mut bob).unwrap(),
        StartOutcome::NoWindows { trip_id: "short".to_string() }
    );
    assert_eq!(bob.state(), SessionState::Idle);

    let mut coach = service.new_session("coach_kim");
    assert!(matches!(
        service.start_session(&mut coach),
        Err(ServiceError::Scheduler(SchedulerError::Registry(RegistryError::InvalidDriver(_))))
    ));
}

#[tokio::test]
async fn unusable_trip_telemetry_reads_as_empty() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "dana", "header-only", TripShape::calm(40));
    std::fs::write(
        root.path().join("dana/header-only/accelerometer_data.csv"),
        "timestamp,accelerationX,accelerationY,accelerationZ\n",
    )
    .unwrap();
    write_trip(root.path(), "dana", "no-gyro", TripShape::calm(40));
    std::fs::remove_file(root.path().join("dana/no-gyro/gyroscope_data.csv")).unwrap();
    let generator = Arc::new(CountingGenerator::default());
    let (service, _connector) = service(root.path(), Some(generator.clone()));

    let mut session = service.new_session("dana");
    assert_eq!(
        service.start_session(&mut session).unwrap(),
        StartOutcome::NoWindows { trip_id: "header-only".to_string() }
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(service.tick(&mut session), TickOutcome::Idle);

    for trip in ["header-only", "no-gyro"] {
        assert!(service.list_windows("dana", trip).unwrap().is_empty());
        assert!(service.window_severities("dana", trip).unwrap().is_empty());
        assert!(matches!(service.analyze_trip("dana", trip).await.unwrap(), TripReport::Empty { .. }));
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    // Bad ids still surface as errors
    assert!(matches!(
        service.window_severities("dana", ".."),
        Err(ServiceError::Registry(RegistryError::InvalidId(_)))
    ));
}

#[tokio::test]
async fn analyze_reports_and_errors() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(31));
    write_trip(root.path(), "alice", "short", TripShape::calm(5));
    let (service, connector) = service(root.path(), Some(Arc::new(CountingGenerator::default())));

    let report = service.analyze_trip("alice", "t1").await.unwrap();
    let TripReport::Ok { trip_id, analysis } = report else {
        panic!("expected a report");
    };
    assert_eq!(trip_id, "t1");
    assert_eq!(analysis.window_index, 0);
    assert_eq!(analysis.coaching, "coaching #0 for this trip");

    let empty = TripReport::Empty { message: "No valid trip data".to_string() };
    assert_eq!(service.analyze_trip("alice", "short").await.unwrap(), empty);
    assert_eq!(service.analyze_trip("alice", "missing").await.unwrap(), empty);

    assert!(matches!(
        service.analyze_window("alice", "t1", 9).await,
        Err(ServiceError::Registry(RegistryError::InvalidIndex { index: 9, len: 2 }))
    ));

    // Coach-mode analyses are not written to the coaching log
    service.flush().await;
    assert!(connector.store().coaching_records().is_empty());
}

#[tokio::test]
async fn presence_and_logout() {
    let root = tempfile::tempdir().unwrap();
    write_trip(root.path(), "alice", "t1", TripShape::calm(31));
    let generator = Arc::new(GatedGenerator::new());
    let (service, connector) = service(root.path(), Some(generator.clone()));

    assert!(service.driver_status("nobody").is_none());
    assert!(!service.driver_status("alice").unwrap().online);

    service.login("alice", "Alice");
    assert!(service.driver_status("alice").unwrap().online);

    let mut session = service.new_session("alice");
    service.start_session(&mut session).unwrap();
    service.logout("alice", Some(&mut session));
    assert!(!service.driver_status("alice").unwrap().online);
    assert_eq!(session.state(), SessionState::Stopped);

    service.register_user("alice", drive_coach::UserRole::Driver);
    service.register_user("alice", drive_coach::UserRole::Driver);
    service.flush().await;
    assert_eq!(connector.store().users().len(), 1);
    generator.release(1);
}
