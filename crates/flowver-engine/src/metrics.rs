//! Metrics Aggregator
//!
//! Recording execution outcomes must never affect the execution that
//! produced them. [`record_or_warn`] folds one outcome into the store and
//! logs failures instead of returning them. [`MetricsRecorder`] moves that
//! work onto a worker thread with its own connection so callers only pay
//! for a channel send.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use flowver_core::errors::{ExError, ExErrorKind};
use flowver_store::errors::Result;
use flowver_store::metrics::{record_execution, ExecutionRecord};
use flowver_store::Database;
use rusqlite::Connection;

/// Record one execution; failures are logged and swallowed.
///
/// Returns whether the outcome was stored.
pub fn record_or_warn(conn: &Connection, record: &ExecutionRecord) -> bool {
    match record_execution(conn, record) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                version_id = %record.version_id,
                err_code = err.code(),
                error = %err,
                "Failed to record execution metrics"
            );
            false
        }
    }
}

/// Fire-and-forget metrics recording on a background thread.
///
/// Dropping the recorder (or calling [`MetricsRecorder::shutdown`]) closes
/// the queue and waits for already queued records to be written.
#[derive(Debug)]
pub struct MetricsRecorder {
    sender: Option<Sender<ExecutionRecord>>,
    worker: Option<JoinHandle<u64>>,
}

impl MetricsRecorder {
    /// Open a dedicated connection and start the worker.
    ///
    /// ## Errors
    ///
    /// - `Persistence`: the connection cannot be opened
    /// - `Internal`: the worker thread cannot be spawned
    pub fn spawn(db: &Database) -> Result<Self> {
        let conn = db.connect()?;
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("flowver-metrics".to_string())
            .spawn(move || drain(conn, receiver))
            .map_err(|e| {
                ExError::new(ExErrorKind::Internal)
                    .with_op("spawn_metrics_recorder")
                    .with_message(format!("cannot start metrics worker: {}", e))
            })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue one record. Never blocks on the store and never fails.
    pub fn record(&self, record: ExecutionRecord) {
        let sent = self
            .sender
            .as_ref()
            .map(|sender| sender.send(record).is_ok())
            .unwrap_or(false);
        if !sent {
            tracing::warn!("Metrics worker is gone; execution outcome dropped");
        }
    }

    /// Stop accepting records, flush the queue and return how many records
    /// the worker stored over its lifetime.
    pub fn shutdown(mut self) -> u64 {
        self.close()
    }

    fn close(&mut self) -> u64 {
        self.sender.take();
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(stored)) => stored,
            Some(Err(_)) => {
                tracing::warn!("Metrics worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for MetricsRecorder {
    fn drop(&mut self) {
        self.close();
    }
}

fn drain(conn: Connection, receiver: Receiver<ExecutionRecord>) -> u64 {
    let mut stored = 0;
    for record in receiver {
        if record_or_warn(&conn, &record) {
            stored += 1;
        }
    }
    tracing::debug!(stored = stored, "Metrics worker stopped");
    stored
}
