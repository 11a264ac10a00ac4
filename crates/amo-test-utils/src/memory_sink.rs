// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory telemetry sink that captures records for assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use amo_core::{AmoError, TelemetrySink, TelemetryRecord};

/// A telemetry sink that keeps every record it receives.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
    written: Notify,
    flushes: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records captured so far, in arrival order.
    pub async fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().await.clone()
    }

    /// Wait until at least `count` records have arrived, or `timeout` elapses.
    ///
    /// Returns the captured records either way.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<TelemetryRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.written.notified();
            {
                let records = self.records.lock().await;
                if records.len() >= count {
                    return records.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.records().await;
            }
        }
    }

    /// How many times the sink was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, record: &TelemetryRecord) -> Result<(), AmoError> {
        self.records.lock().await.push(record.clone());
        self.written.notify_waiters();
        Ok(())
    }

    async fn flush(&self) -> Result<(), AmoError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
