// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tier selection: intent-driven candidate filtered through the cost guard.

use std::sync::Arc;

use amo_core::{Intent, ReasonCode, SessionId, Tier, TierDecision};
use tracing::{debug, info};

use crate::guard::CostGuard;

/// Default tier for each intent, before any safety override.
pub fn tier_for_intent(intent: Intent) -> Tier {
    match intent {
        Intent::Casual => Tier::Light,
        Intent::Normal => Tier::Standard,
        Intent::Coding => Tier::Reasoning,
        Intent::VisionRequest => Tier::Vision,
    }
}

/// Combines the intent mapping with the [`CostGuard`] gate.
pub struct TierSelector {
    guard: Arc<CostGuard>,
}

impl TierSelector {
    pub fn new(guard: Arc<CostGuard>) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &Arc<CostGuard> {
        &self.guard
    }

    /// Produce the routing decision for one request and commit it to the guard.
    pub async fn select(&self, intent: Intent, session_id: &SessionId) -> TierDecision {
        let requested_tier = tier_for_intent(intent);
        let (effective_tier, reason_code) = self.guard.evaluate(session_id, requested_tier).await;

        let decision = TierDecision {
            intent,
            requested_tier,
            effective_tier,
            reason_code,
            fallback_applied: false,
        };

        if reason_code != ReasonCode::Normal {
            info!(
                session_id = %session_id,
                requested = %requested_tier,
                effective = %effective_tier,
                reason = %reason_code,
                "cost-safety downgrade"
            );
        } else {
            debug!(
                session_id = %session_id,
                intent = %intent,
                tier = %effective_tier,
                "tier selected"
            );
        }

        decision
    }
}
