//! Streaming session state
//!
//! A [`Session`] is owned by its caller and mutated only through the
//! scheduler's `start` / `tick` / `stop` / `reset`.

use crate::registry::PreparedWindow;
use crate::types::WindowSeverity;

/// Identity of a session for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Identity of one `start` of a session. Results are keyed by run, so a
/// restarted session never sees results from its earlier runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "IDLE"),
            SessionState::Streaming => write!(f, "STREAMING"),
            SessionState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// The trip a streaming session walks.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTrip {
    pub(crate) run: RunId,
    pub(crate) trip_id: String,
    pub(crate) windows: Vec<PreparedWindow>,
    pub(crate) pointer: usize,
    pub(crate) finished: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    driver_id: String,
    pub(crate) state: SessionState,
    pub(crate) trip: Option<ActiveTrip>,
}

impl Session {
    pub(crate) fn new(id: SessionId, driver_id: impl Into<String>) -> Self {
        Self { id, driver_id: driver_id.into(), state: SessionState::Idle, trip: None }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.trip.as_ref().map(|t| t.trip_id.as_str())
    }

    /// Index of the window the next tick will try to surface
    pub fn pointer(&self) -> Option<usize> {
        self.trip.as_ref().map(|t| t.pointer)
    }

    pub fn window_count(&self) -> usize {
        self.trip.as_ref().map_or(0, |t| t.windows.len())
    }

    /// True once the last window has been surfaced
    pub fn is_finished(&self) -> bool {
        self.trip.as_ref().is_some_and(|t| t.finished)
    }

    /// Severity of every window in the current trip
    pub fn severities(&self) -> Vec<WindowSeverity> {
        self.trip
            .as_ref()
            .map(|t| {
                t.windows
                    .iter()
                    .map(|w| WindowSeverity { window_index: w.index, severity: w.severity })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn clear(&mut self, state: SessionState) {
        self.trip = None;
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(SessionId(3), "driver_a");
        assert_eq!(session.id().to_string(), "session-3");
        assert_eq!(session.driver_id(), "driver_a");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.trip_id().is_none());
        assert!(session.pointer().is_none());
        assert_eq!(session.window_count(), 0);
        assert!(!session.is_finished());
        assert!(session.severities().is_empty());
    }
}
