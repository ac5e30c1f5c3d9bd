//! Segment Scheduler - walks a trip's windows with one-ahead prefetch
//!
//! Each tick surfaces at most one window, strictly in index order. Inference
//! runs in short-lived tokio tasks that hold the gateway's single slot; when
//! the slot is taken the attempt is abandoned and the next tick tries again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::results::{ResultKey, ResultTable};
use super::session::{ActiveTrip, RunId, Session, SessionId, SessionState};
use crate::llm::{GatewayError, InferenceGateway};
use crate::registry::{RegistryError, TripRegistry};
use crate::storage::WriteBehindLogger;
use crate::types::{CoachingRecord, FeedbackMode, WindowAnalysis, WindowSeverity};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("inference capability not initialized")]
    NotInitialized,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result of [`SegmentScheduler::start`]
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Streaming { trip_id: String, windows: Vec<WindowSeverity> },
    /// The driver has no trips; the session stays idle
    NoTrips,
    /// The first trip has no accepted windows; the session stays idle
    NoWindows { trip_id: String },
}

/// Result of [`SegmentScheduler::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session is not streaming
    Idle,
    /// The current window's coaching is not ready yet
    Pending { index: usize },
    Surfaced(WindowAnalysis),
    /// Every window has been surfaced
    Complete,
}

pub struct SegmentScheduler {
    registry: Arc<TripRegistry>,
    gateway: Arc<InferenceGateway>,
    logger: WriteBehindLogger,
    results: Arc<ResultTable>,
    next_session: AtomicU64,
    next_run: AtomicU64,
}

impl SegmentScheduler {
    pub fn new(registry: Arc<TripRegistry>, gateway: Arc<InferenceGateway>, logger: WriteBehindLogger) -> Self {
        Self {
            registry,
            gateway,
            logger,
            results: Arc::new(ResultTable::new()),
            next_session: AtomicU64::new(1),
            next_run: AtomicU64::new(1),
        }
    }

    pub fn new_session(&self, driver_id: impl Into<String>) -> Session {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        Session::new(id, driver_id)
    }

    /// Results currently held for all sessions
    pub fn results(&self) -> &ResultTable {
        &self.results
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Begin streaming the driver's first trip.
    pub fn start(&self, session: &mut Session) -> Result<StartOutcome, SchedulerError> {
        if !self.gateway.is_initialized() {
            return Err(SchedulerError::NotInitialized);
        }
        self.discard(session, SessionState::Idle);

        let trips = self.registry.list_trips(session.driver_id())?;
        let Some(trip_id) = trips.into_iter().next() else {
            info!(session = %session.id(), driver_id = session.driver_id(), "No trips to stream");
            return Ok(StartOutcome::NoTrips);
        };

        let windows = match self.registry.prepare_windows(session.driver_id(), &trip_id) {
            Ok(windows) => windows,
            Err(RegistryError::Input(e)) => {
                warn!(session = %session.id(), driver_id = session.driver_id(), trip_id = %trip_id, error = %e, "Trip telemetry unusable");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        if windows.is_empty() {
            info!(session = %session.id(), driver_id = session.driver_id(), trip_id = %trip_id, "Trip has no valid windows");
            return Ok(StartOutcome::NoWindows { trip_id });
        }

        let run = RunId(self.next_run.fetch_add(1, Ordering::Relaxed));
        session.trip = Some(ActiveTrip { run, trip_id: trip_id.clone(), windows, pointer: 0, finished: false });
        session.state = SessionState::Streaming;
        let severities = session.severities();

        info!(
            session = %session.id(),
            driver_id = session.driver_id(),
            trip_id = %trip_id,
            windows = severities.len(),
            "Streaming started"
        );
        self.ensure_inference(session, 0);
        Ok(StartOutcome::Streaming { trip_id, windows: severities })
    }

    /// Surface the current window if its coaching is ready.
    pub fn tick(&self, session: &mut Session) -> TickOutcome {
        if session.state != SessionState::Streaming {
            return TickOutcome::Idle;
        }
        let Some(trip) = session.trip.as_mut() else {
            return TickOutcome::Idle;
        };
        if trip.finished {
            return TickOutcome::Complete;
        }

        let pointer = trip.pointer;
        let Some(text) = self.results.take_ready(ResultKey { run: trip.run, index: pointer }) else {
            self.ensure_inference(session, pointer);
            return TickOutcome::Pending { index: pointer };
        };

        let window = &trip.windows[pointer];
        let analysis = WindowAnalysis {
            window_index: window.index,
            severity: window.severity,
            summary: window.summary.clone(),
            coaching: text,
        };

        if pointer + 1 >= trip.windows.len() {
            trip.finished = true;
            info!(session = %session.id(), window = pointer, "Last window surfaced");
        } else {
            trip.pointer = pointer + 1;
            debug!(session = %session.id(), window = pointer, "Window surfaced");
            self.ensure_inference(session, pointer + 1);
        }
        TickOutcome::Surfaced(analysis)
    }

    /// Stop streaming. In-flight inference finishes but its result is dropped.
    pub fn stop(&self, session: &mut Session) {
        self.discard(session, SessionState::Stopped);
        info!(session = %session.id(), "Streaming stopped");
    }

    /// Return a session to idle so it can be started again.
    pub fn reset(&self, session: &mut Session) {
        self.discard(session, SessionState::Idle);
    }

    fn discard(&self, session: &mut Session, state: SessionState) {
        if let Some(trip) = session.trip.as_ref() {
            let evicted = self.results.evict_run(trip.run);
            debug!(session = %session.id(), evicted, "Session results evicted");
        }
        session.clear(state);
    }

    // ========================================================================
    // Background inference
    // ========================================================================

    /// Start inference for a window unless it is already in flight or ready.
    fn ensure_inference(&self, session: &Session, index: usize) {
        let Some(trip) = session.trip.as_ref() else {
            return;
        };
        let Some(window) = trip.windows.get(index) else {
            return;
        };
        let key = ResultKey { run: trip.run, index };
        if self.results.contains(key) {
            return;
        }

        let permit = match self.gateway.try_reserve() {
            Ok(permit) => permit,
            Err(GatewayError::Busy) => {
                debug!(session = %session.id(), window = index, "Inference slot busy, retry next tick");
                return;
            }
            Err(e) => {
                warn!(session = %session.id(), window = index, error = %e, "Cannot start inference");
                return;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No async runtime for background inference");
                return;
            }
        };
        if !self.results.claim(key) {
            return;
        }

        let gateway = Arc::clone(&self.gateway);
        let results = Arc::clone(&self.results);
        let logger = self.logger.clone();
        let session_id = session.id();
        let driver_id = session.driver_id().to_string();
        let trip_id = trip.trip_id.clone();
        let window = window.clone();

        debug!(session = %session_id, window = index, tier = %window.severity, "Background inference started");
        runtime.spawn(async move {
            match gateway.generate_with(permit, &window.summary, window.severity, FeedbackMode::Driver).await {
                Ok(coaching) => {
                    logger.log_coaching_result(CoachingRecord {
                        driver_id,
                        trip_id,
                        window_index: window.index,
                        severity: window.severity,
                        summary: window.summary,
                        coaching: coaching.clone(),
                    });
                    if !results.complete(key, coaching) {
                        debug!(session = %session_id, window = index, "Result orphaned by stop");
                    }
                }
                Err(e) => {
                    warn!(session = %session_id, window = index, error = %e, "Background inference failed");
                    results.release(key);
                }
            }
        });
    }
}

impl std::fmt::Debug for SegmentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentScheduler")
            .field("results", &self.results.len())
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubGenerator;
    use crate::storage::{InMemoryConnector, InMemoryStore};

    fn scheduler(root: &std::path::Path, injected: bool) -> (SegmentScheduler, InMemoryConnector) {
        let gateway = InferenceGateway::new(Vec::new());
        if injected {
            gateway.inject(Arc::new(StubGenerator)).unwrap();
        }
        let connector = InMemoryConnector::new(InMemoryStore::new());
        let logger = WriteBehindLogger::spawn(connector.clone()).unwrap();
        let registry = Arc::new(TripRegistry::new(root, 15));
        (SegmentScheduler::new(registry, Arc::new(gateway), logger), connector)
    }

    #[tokio::test]
    async fn test_start_requires_generator() {
        let root = tempfile::tempdir().unwrap();
        let (scheduler, _) = scheduler(root.path(), false);
        let mut session = scheduler.new_session("adam");
        assert!(matches!(scheduler.start(&mut session), Err(SchedulerError::NotInitialized)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_no_trips_stays_idle() {
        let root = tempfile::tempdir().unwrap();
        let (scheduler, _) = scheduler(root.path(), true);
        let mut session = scheduler.new_session("adam");
        assert_eq!(scheduler.start(&mut session).unwrap(), StartOutcome::NoTrips);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(scheduler.tick(&mut session), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_stop_marks_stopped_and_reset_returns_idle() {
        let root = tempfile::tempdir().unwrap();
        let (scheduler, _) = scheduler(root.path(), true);
        let mut session = scheduler.new_session("adam");
        scheduler.stop(&mut session);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(scheduler.tick(&mut session), TickOutcome::Idle);
        scheduler.reset(&mut session);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let (scheduler, _) = scheduler(root.path(), true);
        let a = scheduler.new_session("adam");
        let b = scheduler.new_session("adam");
        assert_ne!(a.id(), b.id());
    }
}
