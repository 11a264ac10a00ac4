// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator seams AMO depends on but does not own.
//!
//! Provider clients, telemetry storage, and content moderation live outside
//! the routing core and are reached only through these traits.

pub mod moderation;
pub mod provider;
pub mod telemetry;

pub use moderation::{Moderator, NoopModerator};
pub use provider::{ProviderInvoker, TokenStream};
pub use telemetry::TelemetrySink;
