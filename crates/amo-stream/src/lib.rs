// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming side of the Adaptive Model Optimizer.
//!
//! - [`FallbackController`]: one provider run with a commit point and a single
//!   pre-commit fallback to the standard tier
//! - [`SoftModerator`]: masks offensive terms in replies to aggressive messages
//! - [`StreamCoordinator`]: routes a chat turn and turns it into `meta`,
//!   `chunk`, `done` and `error` events

pub mod coordinator;
pub mod fallback;
pub mod moderation;

pub use coordinator::{StreamCoordinator, UNAVAILABLE_MESSAGE};
pub use fallback::{FallbackController, FallbackEvent, RunContext};
pub use moderation::SoftModerator;
