// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Adaptive Model Optimizer integration tests.
//!
//! # Components
//!
//! - [`ScriptedProvider`] - Provider invoker with per-tier scripted behavior
//! - [`MemorySink`] - Telemetry sink that captures records for assertions

pub mod memory_sink;
pub mod scripted_provider;

pub use memory_sink::MemorySink;
pub use scripted_provider::{Script, ScriptedProvider};

use std::time::Duration;

use amo_core::{Intent, ReasonCode, SessionId, TelemetryRecord, TerminalState, Tier};

/// A completed light-tier record for `session_id`.
pub fn sample_record(session_id: &str) -> TelemetryRecord {
    TelemetryRecord {
        session_id: SessionId::from(session_id),
        intent: Intent::Casual,
        requested_tier: Tier::Light,
        effective_tier: Tier::Light,
        reason_code: ReasonCode::Normal,
        fallback_applied: false,
        message_length: 2,
        decision_time: Duration::from_micros(35),
        response_time: Some(Duration::from_millis(20)),
        completed: true,
        outcome: TerminalState::Completed,
        cancelled: false,
        recorded_at: chrono::Utc::now(),
    }
}
