// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-blocking telemetry recorder backed by a bounded queue.
//!
//! Request tasks call [`TelemetryRecorder::record`], which never waits: when
//! the queue is full the record is dropped and counted. A background worker
//! drains the queue into a [`TelemetrySink`] until every recorder handle has
//! been dropped, then flushes the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use amo_core::{AmoError, TelemetryRecord, TelemetrySink};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::recording;

struct Shared {
    tx: mpsc::Sender<TelemetryRecord>,
    dropped: AtomicU64,
}

/// Cloneable handle for enqueueing telemetry records.
#[derive(Clone)]
pub struct TelemetryRecorder {
    shared: Arc<Shared>,
}

/// Handle to the background worker draining the queue.
pub struct TelemetryWorker {
    handle: JoinHandle<u64>,
}

impl TelemetryRecorder {
    /// Create a recorder with a bounded queue of `capacity` records and spawn
    /// the worker that drains it into `sink`.
    pub fn spawn(capacity: usize, sink: Arc<dyn TelemetrySink>) -> (Self, TelemetryWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let recorder = Self {
            shared: Arc::new(Shared {
                tx,
                dropped: AtomicU64::new(0),
            }),
        };
        let handle = tokio::spawn(drain(rx, sink));
        (recorder, TelemetryWorker { handle })
    }

    /// Enqueue one record without waiting.
    ///
    /// A full (or closed) queue drops the record and increments the drop
    /// counter; the caller never sees an error.
    pub fn record(&self, record: TelemetryRecord) {
        recording::record_route(&record);

        match self.shared.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) | Err(TrySendError::Closed(record)) => {
                let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                recording::record_telemetry_dropped();
                warn!(
                    session_id = %record.session_id,
                    dropped_total = dropped,
                    "telemetry queue full, record dropped"
                );
            }
        }
    }

    /// Total records dropped since the recorder was created.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetryWorker {
    /// Wait for the worker to drain the queue and flush the sink.
    ///
    /// Completes only after every [`TelemetryRecorder`] clone has been dropped.
    /// Returns the number of records written.
    pub async fn join(self) -> Result<u64, AmoError> {
        self.handle
            .await
            .map_err(|e| AmoError::Telemetry(format!("telemetry worker failed: {e}")))
    }
}

async fn drain(mut rx: mpsc::Receiver<TelemetryRecord>, sink: Arc<dyn TelemetrySink>) -> u64 {
    let mut written = 0u64;
    while let Some(record) = rx.recv().await {
        match sink.write(&record).await {
            Ok(()) => written += 1,
            Err(e) => warn!(sink = sink.name(), error = %e, "telemetry sink write failed"),
        }
    }

    if let Err(e) = sink.flush().await {
        warn!(sink = sink.name(), error = %e, "telemetry sink flush failed");
    }
    debug!(sink = sink.name(), written, "telemetry worker drained");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use amo_test_utils::{MemorySink, sample_record};
    use async_trait::async_trait;
    use std::time::Duration;

    #[tokio::test]
    async fn records_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let (recorder, worker) = TelemetryRecorder::spawn(8, sink.clone());
        recorder.record(sample_record("a"));
        recorder.record(sample_record("b"));

        let records = sink.wait_for(2, Duration::from_secs(5)).await;
        assert_eq!(records.len(), 2);
        assert_eq!(recorder.dropped(), 0);

        drop(recorder);
        assert_eq!(worker.join().await.unwrap(), 2);
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test]
    async fn overflow_drops_and_counts() {
        let sink = Arc::new(MemorySink::new());
        let (recorder, worker) = TelemetryRecorder::spawn(2, sink.clone());

        // Current-thread runtime: the worker cannot run until we yield, so
        // only the first two records fit.
        for i in 0..5 {
            recorder.record(sample_record(&format!("s{i}")));
        }
        assert_eq!(recorder.dropped(), 3);

        drop(recorder);
        assert_eq!(worker.join().await.unwrap(), 2);
        let sessions: Vec<String> = sink
            .records()
            .await
            .iter()
            .map(|r| r.session_id.to_string())
            .collect();
        assert_eq!(sessions, vec!["s0", "s1"]);
    }

    #[tokio::test]
    async fn worker_outlives_clones_until_all_dropped() {
        let sink = Arc::new(MemorySink::new());
        let (recorder, worker) = TelemetryRecorder::spawn(4, sink.clone());
        let clone = recorder.clone();
        drop(recorder);

        clone.record(sample_record("late"));
        assert_eq!(clone.dropped(), 0);
        drop(clone);

        assert_eq!(worker.join().await.unwrap(), 1);
    }

    struct FailingSink;

    #[async_trait]
    impl TelemetrySink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn write(&self, _record: &TelemetryRecord) -> Result<(), AmoError> {
            Err(AmoError::Telemetry("disk full".into()))
        }
    }

    #[tokio::test]
    async fn sink_errors_are_swallowed() {
        let (recorder, worker) = TelemetryRecorder::spawn(4, Arc::new(FailingSink));
        recorder.record(sample_record("a"));
        drop(recorder);
        assert_eq!(worker.join().await.unwrap(), 0);
    }
}
