// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification and cost-guarded tier selection.
//!
//! This crate provides:
//! - [`IntentClassifier`]: heuristic, deterministic intent classification
//! - [`CostGuard`]: per-session consecutive high-cost cap and session/global rate windows
//! - [`TierSelector`]: intent-to-tier mapping filtered through the guard
//! - [`AdaptiveRouter`]: classify-then-select for one [`amo_core::ChatRequest`]

pub mod classifier;
pub mod guard;
pub mod router;
pub mod selector;

pub use classifier::IntentClassifier;
pub use guard::{CostGuard, SessionRoutingState, SessionSnapshot};
pub use router::{AdaptiveRouter, RoutedRequest};
pub use selector::{TierSelector, tier_for_intent};
