// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback-controlled provider streaming.
//!
//! [`FallbackController::run`] wraps one provider invocation in a lazy,
//! non-restartable event stream with an explicit commit point:
//!
//! ```text
//! Committing --pre-commit failure--> Falling back --pre-commit failure--> Failed
//!     |                                   |
//!     +--first token / ready--------------+--> Streaming --end--> Completed
//!                                                  |
//!                                                  +--failure--> Partial
//! ```
//!
//! Every run records exactly one telemetry entry when it reaches a terminal
//! state, including when the caller drops the stream first.

use std::sync::Arc;
use std::time::Duration;

use amo_config::FallbackConfig;
use amo_core::{
    AmoError, ChatRequest, ProviderEvent, ProviderInvoker, TelemetryRecord, TerminalState, Tier,
    TierDecision, TokenStream,
};
use amo_telemetry::TelemetryRecorder;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Output of a fallback-controlled run. The tier is never part of an event.
#[derive(Debug)]
pub enum FallbackEvent {
    /// Text fragment from the committed provider attempt.
    Token(String),
    /// The provider finished normally.
    Done,
    /// The committed provider failed mid-stream; no other tier is tried.
    Partial { error: AmoError },
    /// No attempt reached the commit point.
    Failed(AmoError),
}

impl FallbackEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FallbackEvent::Token(_))
    }
}

/// Everything a run needs besides the provider.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub request: ChatRequest,
    pub decision: TierDecision,
    /// Time spent classifying and selecting, carried into telemetry.
    pub decision_time: Duration,
}

/// Runs provider attempts with a single pre-commit fallback to the standard tier.
#[derive(Clone)]
pub struct FallbackController {
    primary_timeout: Duration,
    fallback_timeout: Duration,
    recorder: TelemetryRecorder,
}

impl FallbackController {
    pub fn new(config: &FallbackConfig, recorder: TelemetryRecorder) -> Self {
        Self {
            primary_timeout: Duration::from_millis(config.primary_timeout_ms),
            fallback_timeout: Duration::from_millis(config.fallback_timeout_ms),
            recorder,
        }
    }

    /// Start a run. Nothing happens until the returned stream is polled, and
    /// once it has ended every further poll yields `None`.
    pub fn run(
        &self,
        context: RunContext,
        invoker: Arc<dyn ProviderInvoker>,
    ) -> BoxStream<'static, FallbackEvent> {
        let run = Run {
            invoker,
            message_length: context.request.message.trim().chars().count(),
            request: context.request,
            decision: context.decision,
            decision_time: context.decision_time,
            primary_timeout: self.primary_timeout,
            fallback_timeout: self.fallback_timeout,
            recorder: self.recorder.clone(),
            started: None,
            phase: Phase::Invoke,
            committed: false,
            recorded: false,
        };

        stream::unfold(run, |mut run| async move {
            let event = run.next_event().await?;
            Some((event, run))
        })
        .fuse()
        .boxed()
    }
}

enum Phase {
    /// Next step is to invoke the provider at the decision's effective tier.
    Invoke,
    /// An attempt is in flight with its deadline.
    Attempt {
        stream: TokenStream,
        deadline: Instant,
    },
    /// A terminal state was reached.
    Finished,
}

struct Run {
    invoker: Arc<dyn ProviderInvoker>,
    request: ChatRequest,
    decision: TierDecision,
    decision_time: Duration,
    message_length: usize,
    primary_timeout: Duration,
    fallback_timeout: Duration,
    recorder: TelemetryRecorder,
    started: Option<Instant>,
    phase: Phase,
    committed: bool,
    recorded: bool,
}

impl Run {
    fn attempt_timeout(&self) -> Duration {
        if self.decision.fallback_applied {
            self.fallback_timeout
        } else {
            self.primary_timeout
        }
    }

    async fn next_event(&mut self) -> Option<FallbackEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return None,
                Phase::Invoke => {
                    let now = Instant::now();
                    self.started.get_or_insert(now);
                    let timeout = self.attempt_timeout();
                    let deadline = now + timeout;
                    let tier = self.decision.effective_tier;

                    match timeout_at(deadline, self.invoker.invoke(tier, &self.request)).await {
                        Ok(Ok(stream)) => self.phase = Phase::Attempt { stream, deadline },
                        Ok(Err(error)) => {
                            if let Some(event) = self.fail_before_commit(error) {
                                return Some(event);
                            }
                        }
                        Err(_) => {
                            let error = AmoError::Timeout { duration: timeout };
                            if let Some(event) = self.fail_before_commit(error) {
                                return Some(event);
                            }
                        }
                    }
                }
                Phase::Attempt {
                    mut stream,
                    deadline,
                } => {
                    let error = match timeout_at(deadline, stream.next()).await {
                        Ok(Some(Ok(ProviderEvent::Ready))) => {
                            self.commit();
                            self.phase = Phase::Attempt { stream, deadline };
                            continue;
                        }
                        Ok(Some(Ok(ProviderEvent::Token(text)))) => {
                            self.commit();
                            self.phase = Phase::Attempt { stream, deadline };
                            return Some(FallbackEvent::Token(text));
                        }
                        Ok(None) => {
                            self.finish(TerminalState::Completed, false);
                            return Some(FallbackEvent::Done);
                        }
                        Ok(Some(Err(error))) => error,
                        Err(_) => AmoError::Timeout {
                            duration: self.attempt_timeout(),
                        },
                    };
                    drop(stream);

                    if self.committed {
                        warn!(
                            session_id = %self.request.session_id,
                            provider = self.invoker.name(),
                            error = %error,
                            "provider failed after commit; ending with partial response"
                        );
                        self.finish(TerminalState::Partial, false);
                        return Some(FallbackEvent::Partial { error });
                    }
                    if let Some(event) = self.fail_before_commit(error) {
                        return Some(event);
                    }
                }
            }
        }
    }

    /// Pre-commit failure: substitute the standard tier once, or give up.
    fn fail_before_commit(&mut self, error: AmoError) -> Option<FallbackEvent> {
        warn!(
            session_id = %self.request.session_id,
            provider = self.invoker.name(),
            tier = %self.decision.effective_tier,
            error = %error,
            "provider failed before first token"
        );

        if self.decision.fallback_applied || self.decision.effective_tier == Tier::Standard {
            self.finish(TerminalState::Failed, false);
            return Some(FallbackEvent::Failed(error));
        }

        info!(
            session_id = %self.request.session_id,
            from = %self.decision.effective_tier,
            "falling back to standard tier"
        );
        self.decision = self.decision.with_fallback();
        self.phase = Phase::Invoke;
        None
    }

    fn commit(&mut self) {
        if !self.committed {
            self.committed = true;
            debug!(
                session_id = %self.request.session_id,
                tier = %self.decision.effective_tier,
                "provider committed"
            );
        }
    }

    fn finish(&mut self, outcome: TerminalState, cancelled: bool) {
        self.phase = Phase::Finished;
        if self.recorded {
            return;
        }
        self.recorded = true;

        let response_time = match outcome {
            TerminalState::Completed | TerminalState::Partial => {
                self.started.map(|started| started.elapsed())
            }
            TerminalState::Failed => None,
        };

        self.recorder.record(TelemetryRecord {
            session_id: self.request.session_id.clone(),
            intent: self.decision.intent,
            requested_tier: self.decision.requested_tier,
            effective_tier: self.decision.effective_tier,
            reason_code: self.decision.reason_code,
            fallback_applied: self.decision.fallback_applied,
            message_length: self.message_length,
            decision_time: self.decision_time,
            response_time,
            completed: outcome == TerminalState::Completed,
            outcome,
            cancelled,
            recorded_at: chrono::Utc::now(),
        });
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }
        let outcome = if self.committed {
            TerminalState::Partial
        } else {
            TerminalState::Failed
        };
        info!(
            session_id = %self.request.session_id,
            outcome = %outcome,
            "stream dropped by caller before completion"
        );
        self.finish(outcome, true);
    }
}
