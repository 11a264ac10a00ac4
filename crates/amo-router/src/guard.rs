// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost-safety gate: consecutive high-cost cap and request-rate windows.
//!
//! [`CostGuard`] owns one [`SessionRoutingState`] per active session plus a
//! process-wide rate window. Every routed request goes through
//! [`CostGuard::evaluate`], which checks the constraints and commits the
//! resulting tier in the same critical section.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use amo_config::GuardConfig;
use amo_core::{ReasonCode, SessionId, Tier};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Minimum number of committed tiers kept per session.
const MIN_HISTORY: usize = 3;

/// Sliding window of request timestamps with an optional ceiling.
///
/// Only the newest `limit` hits are retained; a window without a limit
/// tracks nothing and is never saturated.
#[derive(Debug)]
pub(crate) struct RateWindow {
    span: Duration,
    limit: Option<usize>,
    hits: VecDeque<Instant>,
}

impl RateWindow {
    pub(crate) fn new(span: Duration, limit: Option<usize>) -> Self {
        Self {
            span,
            limit,
            hits: VecDeque::with_capacity(limit.unwrap_or(0).min(1024)),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.duration_since(oldest) >= self.span {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the window already holds `limit` requests, so one more would exceed it.
    pub(crate) fn saturated(&mut self, now: Instant) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };
        self.prune(now);
        self.hits.len() >= limit
    }

    pub(crate) fn record(&mut self, now: Instant) {
        let Some(limit) = self.limit else {
            return;
        };
        self.prune(now);
        self.hits.push_back(now);
        while self.hits.len() > limit {
            self.hits.pop_front();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Per-session routing state, owned by [`CostGuard`].
#[derive(Debug)]
pub struct SessionRoutingState {
    history: VecDeque<Tier>,
    requests: u64,
    window: RateWindow,
    last_seen: Instant,
}

impl SessionRoutingState {
    fn new(span: Duration, limit: Option<usize>, now: Instant) -> Self {
        Self {
            history: VecDeque::new(),
            requests: 0,
            window: RateWindow::new(span, limit),
            last_seen: now,
        }
    }

    /// Number of trailing committed tiers that are high-cost.
    fn high_cost_streak(&self) -> usize {
        self.history
            .iter()
            .rev()
            .take_while(|tier| tier.is_high_cost())
            .count()
    }

    fn commit(&mut self, tier: Tier, now: Instant, history_len: usize) {
        self.history.push_back(tier);
        while self.history.len() > history_len {
            self.history.pop_front();
        }
        self.requests += 1;
        self.window.record(now);
        self.last_seen = now;
    }
}

/// Read-only view of a session's routing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Committed tiers, oldest first.
    pub history: Vec<Tier>,
    /// Total requests routed for the session.
    pub requests: u64,
    /// Requests inside the current rate window.
    pub window_len: usize,
}

/// Per-session and global cost-safety gate.
pub struct CostGuard {
    sessions: DashMap<SessionId, Arc<Mutex<SessionRoutingState>>>,
    global: Mutex<RateWindow>,
    cap_window: usize,
    history_len: usize,
    rate_window: Duration,
    session_rate_limit: Option<usize>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl CostGuard {
    pub fn new(config: &GuardConfig) -> Self {
        let rate_window = Duration::from_secs(config.rate_window_secs);
        let cap_window = config.cap_window.max(1);
        Self {
            sessions: DashMap::new(),
            global: Mutex::new(RateWindow::new(rate_window, config.global_rate_limit)),
            cap_window,
            history_len: config.history_len.max(cap_window).max(MIN_HISTORY),
            rate_window,
            session_rate_limit: config.session_rate_limit,
            idle_timeout: Duration::from_secs(config.session_idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Decide whether `candidate` may run now for `session_id`, and commit the
    /// allowed tier.
    ///
    /// The consecutive high-cost cap is checked against the candidate first,
    /// then the session and global rate windows against the result. Neither
    /// check can upgrade. The session entry stays locked from the read through
    /// the commit, so commits within one session are linearized.
    pub async fn evaluate(&self, session_id: &SessionId, candidate: Tier) -> (Tier, ReasonCode) {
        let mut state = self.lock_session(session_id).await;
        let now = Instant::now();

        let mut allowed = candidate;
        let mut reason = ReasonCode::Normal;

        if candidate.is_high_cost() && state.high_cost_streak() >= self.cap_window {
            allowed = Tier::Standard;
            reason = ReasonCode::CapExceeded;
        }

        let mut global = self.global.lock().await;
        let session_saturated = state.window.saturated(now);
        let global_saturated = global.saturated(now);
        if allowed.is_high_cost() && (session_saturated || global_saturated) {
            allowed = allowed.capped_at(Tier::Standard);
            reason = ReasonCode::RateLimited;
        }

        state.commit(allowed, now, self.history_len);
        global.record(now);

        debug!(
            session_id = %session_id,
            candidate = %candidate,
            allowed = %allowed,
            reason = %reason,
            session_saturated,
            global_saturated,
            "cost guard evaluated"
        );

        (allowed, reason)
    }

    /// Lock the live state for `session_id`.
    ///
    /// The entry can be removed from the map while we wait on its lock. A
    /// guard on a removed entry is discarded and the lookup repeated, so
    /// commits never land in orphaned state.
    async fn lock_session(&self, session_id: &SessionId) -> OwnedMutexGuard<SessionRoutingState> {
        loop {
            let entry = self.session_entry(session_id);
            let state = Arc::clone(&entry).lock_owned().await;
            let live = self
                .sessions
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &entry));
            if live {
                return state;
            }
            debug!(session_id = %session_id, "session state removed while waiting, retrying");
        }
    }

    fn session_entry(&self, session_id: &SessionId) -> Arc<Mutex<SessionRoutingState>> {
        if let Some(existing) = self.sessions.get(session_id) {
            return Arc::clone(existing.value());
        }
        let entry = self.sessions.entry(session_id.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(SessionRoutingState::new(
                self.rate_window,
                self.session_rate_limit,
                Instant::now(),
            )))
        });
        Arc::clone(entry.value())
    }

    /// Drop all state for a terminated session. Returns whether it existed.
    pub fn end_session(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "session routing state evicted");
        }
        removed
    }

    /// Evict sessions idle longer than the configured timeout.
    ///
    /// Sessions whose state is currently locked are mid-request and kept.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.sessions.retain(|_, state| match state.try_lock() {
            Ok(s) if now.duration_since(s.last_seen) >= self.idle_timeout => {
                evicted += 1;
                false
            }
            _ => true,
        });
        evicted
    }

    /// Run [`CostGuard::evict_idle`] every sweep interval until `cancel` fires.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let guard = Arc::clone(self);
        let period = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("idle session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = guard.evict_idle();
                        if evicted > 0 {
                            debug!(evicted, remaining = guard.session_count(), "evicted idle sessions");
                        }
                    }
                }
            }
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot a session's state, waiting for any in-flight evaluation.
    pub async fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        let entry = self.sessions.get(session_id).map(|e| Arc::clone(e.value()))?;
        let state = entry.lock().await;
        Some(SessionSnapshot {
            history: state.history.iter().copied().collect(),
            requests: state.requests,
            window_len: state.window.len(),
        })
    }

    pub fn cap_window(&self) -> usize {
        self.cap_window
    }
}
