// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classify-then-select routing for one chat request.

use std::sync::Arc;
use std::time::Duration;

use amo_config::AmoConfig;
use amo_core::{AmoError, ChatRequest, Intent, SessionId, TierDecision};
use tokio::time::Instant;

use crate::classifier::IntentClassifier;
use crate::guard::CostGuard;
use crate::selector::TierSelector;

/// A routing decision together with how long it took to reach.
#[derive(Debug, Clone, Copy)]
pub struct RoutedRequest {
    pub decision: TierDecision,
    pub decision_time: Duration,
}

/// Orchestrates intent classification and guarded tier selection.
pub struct AdaptiveRouter {
    classifier: IntentClassifier,
    selector: TierSelector,
}

impl AdaptiveRouter {
    /// Build a router with a fresh [`CostGuard`] from the given configuration.
    pub fn new(config: &AmoConfig) -> Result<Self, AmoError> {
        let guard = Arc::new(CostGuard::new(&config.guard));
        Self::with_guard(config, guard)
    }

    /// Build a router around an existing guard (shared with a sweeper, for example).
    pub fn with_guard(config: &AmoConfig, guard: Arc<CostGuard>) -> Result<Self, AmoError> {
        Ok(Self {
            classifier: IntentClassifier::new(&config.classifier)?,
            selector: TierSelector::new(guard),
        })
    }

    pub fn classify(&self, request: &ChatRequest) -> Intent {
        self.classifier
            .classify(&request.message, request.has_image())
    }

    /// Classify the request, select its tier, and commit the decision.
    pub async fn route(&self, request: &ChatRequest) -> RoutedRequest {
        let started = Instant::now();
        let intent = self.classify(request);
        let decision = self.selector.select(intent, &request.session_id).await;
        RoutedRequest {
            decision,
            decision_time: started.elapsed(),
        }
    }

    pub fn guard(&self) -> &Arc<CostGuard> {
        self.selector.guard()
    }

    /// Forget routing history for a terminated session.
    pub fn end_session(&self, session_id: &SessionId) -> bool {
        self.guard().end_session(session_id)
    }
}
