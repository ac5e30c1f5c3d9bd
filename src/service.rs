//! Coach Service - consumer-facing query surface
//!
//! Bundles the registry, inference gateway, scheduler, write-behind logger and
//! presence table behind one handle. Everything a front end needs goes
//! through here; sessions are handed out as plain values.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::defaults::EMPTY_TRIP_MESSAGE;
use crate::config::CoachConfig;
use crate::llm::{GatewayError, InferenceGateway};
use crate::pipeline::{SchedulerError, SegmentScheduler, Session, StartOutcome, TickOutcome};
use crate::presence::DriverPresence;
use crate::registry::{RegistryError, TripRegistry};
use crate::storage::{LoggerStats, SledConnector, WriteBehindLogger};
use crate::types::{DriverStatus, FeedbackMode, TripReport, UserRole, WindowAnalysis, WindowSeverity};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Whole-trip absence of data reads as no windows.
fn or_empty<T>(result: Result<Vec<T>, RegistryError>, driver_id: &str, trip_id: &str) -> Result<Vec<T>, ServiceError> {
    match result {
        Err(RegistryError::Input(e)) => {
            warn!(driver_id, trip_id, error = %e, "Trip telemetry unusable");
            Ok(Vec::new())
        }
        other => Ok(other?),
    }
}

#[derive(Debug)]
pub struct CoachService {
    registry: Arc<TripRegistry>,
    gateway: Arc<InferenceGateway>,
    logger: WriteBehindLogger,
    scheduler: SegmentScheduler,
    presence: DriverPresence,
}

impl CoachService {
    pub fn new(registry: Arc<TripRegistry>, gateway: Arc<InferenceGateway>, logger: WriteBehindLogger) -> Self {
        let scheduler = SegmentScheduler::new(Arc::clone(&registry), Arc::clone(&gateway), logger.clone());
        Self { registry, gateway, logger, scheduler, presence: DriverPresence::new() }
    }

    /// Wire up a service from configuration, logging to the sled store.
    ///
    /// The gateway starts empty; inject a generator before streaming.
    pub fn from_config(config: &CoachConfig) -> std::io::Result<Self> {
        let registry = Arc::new(TripRegistry::new(&config.data.trips_root, config.scheduler.max_windows));
        let gateway = Arc::new(InferenceGateway::new(config.inference.coach_substitutions.clone()));
        let logger = WriteBehindLogger::spawn(SledConnector::new(&config.store.path))?;
        Ok(Self::new(registry, gateway, logger))
    }

    pub fn gateway(&self) -> &Arc<InferenceGateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<TripRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &SegmentScheduler {
        &self.scheduler
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn list_drivers(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.registry.list_drivers()?)
    }

    pub fn list_trips(&self, driver_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self.registry.list_trips(driver_id)?)
    }

    /// Window indices of a trip; empty when its telemetry is unusable.
    pub fn list_windows(&self, driver_id: &str, trip_id: &str) -> Result<Vec<usize>, ServiceError> {
        or_empty(self.registry.list_windows(driver_id, trip_id), driver_id, trip_id)
    }

    /// Severity of every window; empty when the trip's telemetry is unusable.
    pub fn window_severities(&self, driver_id: &str, trip_id: &str) -> Result<Vec<WindowSeverity>, ServiceError> {
        or_empty(self.registry.window_severities(driver_id, trip_id), driver_id, trip_id)
    }

    /// Coach-mode analysis of one window. Waits for the inference slot and is
    /// not written to the coaching log.
    pub async fn analyze_window(
        &self,
        driver_id: &str,
        trip_id: &str,
        index: usize,
    ) -> Result<WindowAnalysis, ServiceError> {
        let window = self.registry.prepare_window(driver_id, trip_id, index)?;
        let coaching = self.gateway.generate(&window.summary, window.severity, FeedbackMode::Coach).await?;
        Ok(WindowAnalysis {
            window_index: window.index,
            severity: window.severity,
            summary: window.summary,
            coaching,
        })
    }

    /// Analyze the first window of a trip.
    pub async fn analyze_trip(&self, driver_id: &str, trip_id: &str) -> Result<TripReport, ServiceError> {
        if self.list_windows(driver_id, trip_id)?.is_empty() {
            return Ok(TripReport::Empty { message: EMPTY_TRIP_MESSAGE.to_string() });
        }
        let analysis = self.analyze_window(driver_id, trip_id, 0).await?;
        Ok(TripReport::Ok { trip_id: trip_id.to_string(), analysis })
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    pub fn new_session(&self, driver_id: &str) -> Session {
        self.scheduler.new_session(driver_id)
    }

    pub fn start_session(&self, session: &mut Session) -> Result<StartOutcome, ServiceError> {
        Ok(self.scheduler.start(session)?)
    }

    pub fn tick(&self, session: &mut Session) -> TickOutcome {
        self.scheduler.tick(session)
    }

    pub fn stop_session(&self, session: &mut Session) {
        self.scheduler.stop(session);
    }

    // ========================================================================
    // Users and presence
    // ========================================================================

    /// Record a user in the coaching log. Registering twice is a no-op.
    pub fn register_user(&self, user_id: &str, role: UserRole) {
        self.logger.log_user(user_id, role);
    }

    pub fn login(&self, driver_id: &str, display_name: &str) {
        self.presence.login(driver_id, display_name);
    }

    /// Log a driver out, stopping their session if one is given.
    pub fn logout(&self, driver_id: &str, session: Option<&mut Session>) {
        if let Some(session) = session {
            self.scheduler.stop(session);
        }
        self.presence.logout(driver_id);
    }

    /// Presence of a known driver; `None` if the driver has no data directory.
    pub fn driver_status(&self, driver_id: &str) -> Option<DriverStatus> {
        self.registry.driver_exists(driver_id).then(|| self.presence.status(driver_id))
    }

    pub fn logger_stats(&self) -> LoggerStats {
        self.logger.stats()
    }

    /// Wait for queued log jobs to be attempted.
    pub async fn flush(&self) {
        self.logger.flush().await;
    }

    /// Drain the coaching log and stop its worker.
    pub async fn shutdown(&self) {
        self.logger.shutdown().await;
        info!(stats = %self.logger.stats(), "Coach service stopped");
    }
}
