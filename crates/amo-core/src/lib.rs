// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Adaptive Model Optimizer.
//!
//! This crate provides the shared types (tiers, intents, decisions, telemetry
//! records, stream events), the error type, and the collaborator traits that
//! the routing, telemetry, and streaming crates build on.

pub mod error;
pub mod traits;
pub mod types;

pub use error::AmoError;
pub use traits::{Moderator, NoopModerator, ProviderInvoker, TelemetrySink, TokenStream};
pub use types::{
    ChatRequest, CompletionStatus, ImageContext, Intent, ModerationResult, ProviderEvent,
    ReasonCode, SessionId, StreamEvent, TelemetryRecord, TerminalState, Tier, TierDecision,
};
