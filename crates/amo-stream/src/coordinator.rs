// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request coordination: route, stream through the fallback controller,
//! moderate the finished text, and translate everything into transport events.

use std::sync::Arc;

use amo_config::AmoConfig;
use amo_core::{
    AmoError, ChatRequest, CompletionStatus, Intent, Moderator, NoopModerator, ProviderInvoker,
    SessionId, StreamEvent,
};
use amo_router::AdaptiveRouter;
use amo_telemetry::TelemetryRecorder;
use futures::StreamExt;
use futures::future;
use futures::stream::{self, BoxStream};
use tracing::warn;

use crate::fallback::{FallbackController, FallbackEvent, RunContext};
use crate::moderation::SoftModerator;

/// Message shown to the user when no tier could answer. Never names a tier.
pub const UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a moment.";

/// Entry point for one chat turn.
#[derive(Clone)]
pub struct StreamCoordinator {
    router: Arc<AdaptiveRouter>,
    invoker: Arc<dyn ProviderInvoker>,
    fallback: FallbackController,
    moderator: Arc<dyn Moderator>,
}

impl StreamCoordinator {
    pub fn new(
        router: Arc<AdaptiveRouter>,
        invoker: Arc<dyn ProviderInvoker>,
        fallback: FallbackController,
        moderator: Arc<dyn Moderator>,
    ) -> Self {
        Self {
            router,
            invoker,
            fallback,
            moderator,
        }
    }

    /// Wire up a coordinator from configuration.
    pub fn from_config(
        config: &AmoConfig,
        invoker: Arc<dyn ProviderInvoker>,
        recorder: TelemetryRecorder,
    ) -> Result<Self, AmoError> {
        let router = Arc::new(AdaptiveRouter::new(config)?);
        Self::with_router(config, router, invoker, recorder)
    }

    /// Like [`StreamCoordinator::from_config`] but around an existing router,
    /// so the caller can keep a handle on its guard.
    pub fn with_router(
        config: &AmoConfig,
        router: Arc<AdaptiveRouter>,
        invoker: Arc<dyn ProviderInvoker>,
        recorder: TelemetryRecorder,
    ) -> Result<Self, AmoError> {
        let moderator: Arc<dyn Moderator> = if config.moderation.enabled {
            Arc::new(SoftModerator::new(&config.moderation)?)
        } else {
            Arc::new(NoopModerator)
        };
        let fallback = FallbackController::new(&config.fallback, recorder);
        Ok(Self::new(router, invoker, fallback, moderator))
    }

    pub fn router(&self) -> &Arc<AdaptiveRouter> {
        &self.router
    }

    /// Forget routing history for a terminated session.
    pub fn end_session(&self, session_id: &SessionId) -> bool {
        self.router.end_session(session_id)
    }

    /// Handle one chat turn.
    ///
    /// The returned stream yields `meta` first, then zero or more `chunk`
    /// events, then exactly one `done` or `error`. Routing happens on first
    /// poll; dropping the stream cancels the provider call.
    pub fn handle(&self, request: ChatRequest) -> BoxStream<'static, StreamEvent> {
        let router = Arc::clone(&self.router);
        let invoker = Arc::clone(&self.invoker);
        let fallback = self.fallback.clone();
        let moderator = Arc::clone(&self.moderator);

        stream::once(async move {
            let routed = router.route(&request).await;
            let meta = StreamEvent::Meta {
                technical_assistant: routed.decision.intent == Intent::Coding,
                show_image_tools: request.has_image(),
            };

            let session_id = request.session_id.clone();
            let user_message = request.message.clone();
            let context = RunContext {
                request,
                decision: routed.decision,
                decision_time: routed.decision_time,
            };

            let mut text = String::new();
            let events = fallback.run(context, invoker).map(move |event| match event {
                FallbackEvent::Token(chunk) => {
                    text.push_str(&chunk);
                    StreamEvent::Chunk { text: chunk }
                }
                FallbackEvent::Done => {
                    finished(&*moderator, &user_message, &text, CompletionStatus::Completed)
                }
                FallbackEvent::Partial { .. } => {
                    finished(&*moderator, &user_message, &text, CompletionStatus::Partial)
                }
                FallbackEvent::Failed(error) => {
                    warn!(session_id = %session_id, error = %error, "chat turn failed");
                    StreamEvent::Error {
                        message: UNAVAILABLE_MESSAGE.to_string(),
                    }
                }
            });

            stream::once(future::ready(meta)).chain(events)
        })
        .flatten()
        .fuse()
        .boxed()
    }
}

fn finished(
    moderator: &dyn Moderator,
    user_message: &str,
    text: &str,
    status: CompletionStatus,
) -> StreamEvent {
    let result = moderator.moderate(user_message, text);
    if result.moderated {
        StreamEvent::Done {
            status,
            moderated: true,
            masked_text: Some(result.display_text),
            raw_text: Some(result.original_text),
        }
    } else {
        StreamEvent::Done {
            status,
            moderated: false,
            masked_text: None,
            raw_text: None,
        }
    }
}
