// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telemetry sink trait for routing records.

use async_trait::async_trait;

use crate::error::AmoError;
use crate::types::TelemetryRecord;

/// Destination for drained telemetry records.
///
/// Sinks run on the telemetry worker, never on the chat path, so they may
/// perform slow I/O.
#[async_trait]
pub trait TelemetrySink: Send + Sync + 'static {
    /// Human-readable name of this sink.
    fn name(&self) -> &str;

    /// Persist a single record.
    async fn write(&self, record: &TelemetryRecord) -> Result<(), AmoError>;

    /// Flush buffered state. Called once when the worker drains.
    async fn flush(&self) -> Result<(), AmoError> {
        Ok(())
    }
}
