// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing telemetry for the Adaptive Model Optimizer.
//!
//! - [`TelemetryRecorder`]: non-blocking, bounded-queue recorder with a drop counter
//! - [`TracingSink`], [`SqliteSink`], [`NoopSink`]: where drained records go
//! - [`recording`]: metrics-rs counters and histograms, plus the Prometheus recorder

pub mod recorder;
pub mod recording;
pub mod sinks;

pub use recorder::{TelemetryRecorder, TelemetryWorker};
pub use recording::{install_prometheus, register_metrics};
pub use sinks::{NoopSink, SqliteSink, TracingSink, build_sink};
