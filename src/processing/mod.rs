//! Signal processing module - window features, severity and summaries
//!
//! Synchronous and pure: nothing here blocks, locks or logs above `debug`.

pub mod metrics;
mod severity;
mod windowing;

pub use severity::{build_summary, classify, format_number, severity_score, tier_for_score};
pub use windowing::{extract, extract_samples, extract_trip};
