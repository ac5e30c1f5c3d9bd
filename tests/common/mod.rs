//! Shared fixtures for integration tests: on-disk trips and fake generators.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use drive_coach::llm::{GenerationConfig, InferenceGateway, TextGenerator};
use drive_coach::storage::{InMemoryConnector, InMemoryStore, WriteBehindLogger};
use drive_coach::{CoachService, TripRegistry};

/// 2024-03-01T08:00:00Z
pub const TRIP_START_EPOCH_MS: i64 = 1_709_280_000_000;

/// Shape of a synthetic trip.
#[derive(Debug, Clone, Copy)]
pub struct TripShape {
    /// Location fixes at 1 Hz for `0..=seconds`
    pub seconds: i64,
    /// Constant speed in m/s
    pub speed: f64,
    /// Brake at -0.6 g for the first 5 IMU samples of every second
    pub braking: bool,
}

impl TripShape {
    pub fn calm(seconds: i64) -> Self {
        Self { seconds, speed: 10.0, braking: false }
    }
}

/// Write the three sensor CSVs for `<root>/<driver>/<trip>/`.
///
/// Location uses ISO timestamps; the IMU files use epoch milliseconds.
pub fn write_trip(root: &Path, driver: &str, trip: &str, shape: TripShape) {
    let dir = root.join(driver).join(trip);
    std::fs::create_dir_all(&dir).unwrap();

    let mut location = String::from("timestamp,latitude,longitude,speed\n");
    for s in 0..=shape.seconds {
        writeln!(location, "2024-03-01T08:{:02}:{:02}Z,51.5,-0.12,{}", s / 60, s % 60, shape.speed).unwrap();
    }

    let imu_samples = (shape.seconds + 1) * 25;
    let mut accel = String::from("timestamp,accelerationX,accelerationY,accelerationZ\n");
    let mut gyro = String::from("timestamp,rotationRateX,rotationRateY,rotationRateZ\n");
    for i in 0..imu_samples {
        let ts = TRIP_START_EPOCH_MS + i * 40;
        let y = if shape.braking && i % 25 < 5 { -0.6 } else { 0.0 };
        writeln!(accel, "{ts},0.0,{y},-1.0").unwrap();
        writeln!(gyro, "{ts},0.0,0.0,0.0").unwrap();
    }

    std::fs::write(dir.join("location_data.csv"), location).unwrap();
    std::fs::write(dir.join("accelerometer_data.csv"), accel).unwrap();
    std::fs::write(dir.join("gyroscope_data.csv"), gyro).unwrap();
}

/// Service over an in-memory coaching log.
pub fn service(root: &Path, generator: Option<Arc<dyn TextGenerator>>) -> (CoachService, InMemoryConnector) {
    let gateway = InferenceGateway::new(vec![("segment".to_string(), "trip".to_string())]);
    if let Some(generator) = generator {
        gateway.inject(generator).unwrap();
    }
    let connector = InMemoryConnector::new(InMemoryStore::new());
    let logger = WriteBehindLogger::spawn(connector.clone()).unwrap();
    let registry = Arc::new(TripRegistry::new(root, 15));
    (CoachService::new(registry, Arc::new(gateway), logger), connector)
}

/// Poll `cond` every 5 ms for up to two seconds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

// ============================================================================
// Fake generators
// ============================================================================

/// Numbers its responses and tracks how many calls overlap.
#[derive(Debug, Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay_ms: u64,
}

impl CountingGenerator {
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms, ..Self::default() }
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("coaching #{n} for this segment"))
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// Blocks every call until the test opens the gate once per call.
#[derive(Debug)]
pub struct GatedGenerator {
    gate: Semaphore,
    pub calls: AtomicUsize,
}

impl GatedGenerator {
    pub fn new() -> Self {
        Self { gate: Semaphore::new(0), calls: AtomicUsize::new(0) }
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        Ok("gated coaching".to_string())
    }

    fn backend_name(&self) -> &'static str {
        "gated"
    }
}

/// Fails the first `failures` calls, then answers.
#[derive(Debug)]
pub struct FlakyGenerator {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn new(failures: usize) -> Self {
        Self { failures, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl TextGenerator for FlakyGenerator {
    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            anyhow::bail!("backend hiccup {n}");
        }
        Ok("recovered coaching".to_string())
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
