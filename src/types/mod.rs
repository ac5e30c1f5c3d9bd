//! Shared data structures for the driving-coach pipeline
//!
//! - Ingestion: `SensorStream` of location / accelerometer / gyroscope samples
//! - Extraction: `FeatureRecord` per accepted 30 s window
//! - Classification: `SeverityTier`
//! - Inference and logging: `CoachingRecord`, consumer views

mod telemetry;
mod features;
mod coaching;

pub use telemetry::*;
pub use features::*;
pub use coaching::*;
