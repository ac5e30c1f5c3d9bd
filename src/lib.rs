//! Drive Coach: Driving Behaviour Coaching
//!
//! Turns raw vehicle telemetry into per-window coaching feedback.
//!
//! ## Architecture
//!
//! - **Acquisition**: location, accelerometer and gyroscope CSV streams
//! - **Processing**: 30 s window features, severity tiers, frozen summaries
//! - **LLM Module**: single-slot inference gateway over an opaque generator
//! - **Pipeline**: per-session scheduler with one-ahead prefetch
//! - **Storage**: write-behind coaching log backed by sled

pub mod acquisition;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod presence;
pub mod processing;
pub mod registry;
pub mod service;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::CoachConfig;

// Re-export commonly used types
pub use types::{
    CoachingRecord, DriverStatus, FeatureRecord, FeedbackMode, SeverityTier, TripReport, UserRole,
    WindowAnalysis, WindowSeverity,
};

// Re-export the pipeline surface
pub use acquisition::InputError;
pub use llm::{GatewayError, InferenceGateway, StubGenerator, TextGenerator};
pub use pipeline::{SchedulerError, SegmentScheduler, Session, SessionState, StartOutcome, TickOutcome};
pub use registry::{RegistryError, TripRegistry};
pub use service::{CoachService, ServiceError};
pub use storage::{StoreError, WriteBehindLogger};
