//! Streaming Pipeline Module
//!
//! Drives coaching for a trip one window at a time:
//!
//! 1. `start` loads the driver's first trip and classifies every window
//! 2. Background inference begins for window 0
//! 3. Each `tick` surfaces the current window once its coaching is ready and
//!    prefetches the next one
//! 4. `stop` discards the session; late results are orphaned
//!
//! Sessions are plain values owned by the caller. The scheduler owns the
//! result table shared by all sessions.

mod results;
mod scheduler;
mod session;

pub use results::ResultTable;
pub use scheduler::{SchedulerError, SegmentScheduler, StartOutcome, TickOutcome};
pub use session::{RunId, Session, SessionId, SessionState};
