//! Write-behind logger
//!
//! Producers enqueue [`LogJob`]s on an unbounded channel and return at once.
//! A single OS thread drains the channel in order and applies each job to the
//! store, opening a connection lazily and reopening it after any failure.
//! Failed jobs are logged and dropped; nothing is retried or surfaced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::persistence::{CoachingStore, StoreConnector};
use crate::types::{CoachingRecord, UserRole};

const WORKER_THREAD_NAME: &str = "coach-log-writer";

/// A persistence request
#[derive(Debug, Clone, PartialEq)]
pub enum LogJob {
    /// Insert-if-absent
    RegisterUser { user_id: String, role: UserRole },
    /// Plain insert
    CoachingResult(CoachingRecord),
}

impl LogJob {
    fn kind(&self) -> &'static str {
        match self {
            LogJob::RegisterUser { .. } => "register_user",
            LogJob::CoachingResult(_) => "coaching_result",
        }
    }
}

enum Command {
    Job(LogJob),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    applied: AtomicU64,
    dropped: AtomicU64,
    connects: AtomicU64,
}

/// Snapshot of logger counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerStats {
    pub enqueued: u64,
    pub applied: u64,
    pub dropped: u64,
    pub connects: u64,
}

impl std::fmt::Display for LoggerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Coaching log: {} enqueued, {} applied, {} dropped, {} connects",
            self.enqueued, self.applied, self.dropped, self.connects
        )
    }
}

/// Handle to the write-behind queue. Cheap to clone.
#[derive(Clone)]
pub struct WriteBehindLogger {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WriteBehindLogger {
    /// Start the worker thread.
    pub fn spawn<C: StoreConnector>(connector: C) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let target = connector.target();

        let worker_counters = Arc::clone(&counters);
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(&connector, rx, &worker_counters))?;

        info!(target_store = %target, "Write-behind logger started");
        Ok(Self { tx, counters, worker: Arc::new(Mutex::new(Some(handle))) })
    }

    /// Queue a job. Never blocks and never fails; a stopped worker counts the
    /// job as dropped.
    pub fn enqueue(&self, job: LogJob) {
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        if let Err(mpsc::error::SendError(Command::Job(job))) = self.tx.send(Command::Job(job)) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(job = job.kind(), "Write-behind worker stopped, job dropped");
        }
    }

    pub fn log_user(&self, user_id: &str, role: UserRole) {
        self.enqueue(LogJob::RegisterUser { user_id: user_id.to_string(), role });
    }

    pub fn log_coaching_result(&self, record: CoachingRecord) {
        self.enqueue(LogJob::CoachingResult(record));
    }

    /// Wait until every job enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            // Err means the worker exited, which also drains the queue
            let _ = done_rx.await;
        }
    }

    /// Drain the queue, then stop the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if tokio::task::spawn_blocking(move || handle.join()).await.is_err() {
                warn!("Write-behind worker did not shut down cleanly");
            }
        }
    }

    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            applied: self.counters.applied.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            connects: self.counters.connects.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for WriteBehindLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehindLogger").field("stats", &self.stats()).finish_non_exhaustive()
    }
}

// ============================================================================
// Worker
// ============================================================================

fn run_worker(
    connector: &dyn StoreConnector,
    mut rx: mpsc::UnboundedReceiver<Command>,
    counters: &Counters,
) {
    let mut connection: Option<Box<dyn CoachingStore>> = None;

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Job(job) => apply_job(connector, &mut connection, job, counters),
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => break,
        }
    }

    // Jobs still queued behind a shutdown are dropped
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let Command::Job(job) = command {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(job = job.kind(), "Job discarded at shutdown");
        }
    }
    info!("Write-behind worker stopped");
}

fn apply_job(
    connector: &dyn StoreConnector,
    connection: &mut Option<Box<dyn CoachingStore>>,
    job: LogJob,
    counters: &Counters,
) {
    if connection.as_ref().map_or(true, |c| !c.is_alive()) {
        *connection = None;
        match connector.connect() {
            Ok(store) => {
                counters.connects.fetch_add(1, Ordering::Relaxed);
                debug!(backend = store.backend_name(), "Coaching store connected");
                *connection = Some(store);
            }
            Err(e) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(job = job.kind(), target_store = %connector.target(), error = %e, "Store connect failed, job dropped");
                return;
            }
        }
    }
    let Some(store) = connection.as_ref() else {
        return;
    };

    let result = match &job {
        LogJob::RegisterUser { user_id, role } => store.register_user(user_id, *role).map(|inserted| {
            if !inserted {
                debug!(user_id = %user_id, "User already registered");
            }
        }),
        LogJob::CoachingResult(record) => store.insert_coaching(record),
    };

    match result {
        Ok(()) => {
            counters.applied.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(job = job.kind(), error = %e, "Store write failed, job dropped");
            *connection = None;
        }
    }
}
