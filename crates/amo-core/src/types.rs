// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the classifier, guard, fallback controller, and
//! telemetry pipeline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Backend model tier a chat turn can be routed to.
///
/// Relative cost: `Light < Standard < Reasoning ≈ Vision`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Light,
    Standard,
    Reasoning,
    Vision,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Light, Tier::Standard, Tier::Reasoning, Tier::Vision];

    /// Reasoning and Vision count toward the consecutive high-cost cap.
    pub fn is_high_cost(self) -> bool {
        matches!(self, Tier::Reasoning | Tier::Vision)
    }

    /// Relative cost rank. Reasoning and Vision share the top rank.
    pub fn cost_rank(self) -> u8 {
        match self {
            Tier::Light => 0,
            Tier::Standard => 1,
            Tier::Reasoning | Tier::Vision => 2,
        }
    }

    /// Clamp this tier to at most `ceiling`. Never upgrades.
    pub fn capped_at(self, ceiling: Tier) -> Tier {
        if self.cost_rank() > ceiling.cost_rank() {
            ceiling
        } else {
            self
        }
    }
}

/// Heuristically classified category of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Casual,
    Normal,
    Coding,
    VisionRequest,
}

/// Why a routing decision ended up at its effective tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// No safety override applied.
    Normal,
    /// Consecutive high-cost cap hit for the session.
    CapExceeded,
    /// Session or global request rate above threshold.
    RateLimited,
    /// Provider failed before the commit point; standard tier substituted.
    ProviderFallback,
}

/// Immutable result of one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDecision {
    pub intent: Intent,
    /// Tier the intent alone would have chosen, before any safety override.
    pub requested_tier: Tier,
    /// Tier actually invoked.
    pub effective_tier: Tier,
    pub reason_code: ReasonCode,
    pub fallback_applied: bool,
}

impl TierDecision {
    /// The same decision context, re-pointed at the standard tier after a
    /// pre-commit provider failure.
    pub fn with_fallback(&self) -> TierDecision {
        TierDecision {
            effective_tier: Tier::Standard,
            reason_code: ReasonCode::ProviderFallback,
            fallback_applied: true,
            ..*self
        }
    }

    /// Whether a safety override moved the effective tier below the request.
    pub fn downgraded(&self) -> bool {
        self.effective_tier != self.requested_tier
    }
}

/// Opaque image attachment carried alongside a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContext {
    pub mime_type: String,
    /// Encoded image payload, passed through to the provider untouched.
    pub data: String,
}

/// One chat turn handed to AMO by the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub message: String,
    #[serde(default)]
    pub image_context: Option<ImageContext>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: SessionId(session_id.into()),
            message: message.into(),
            image_context: None,
        }
    }

    pub fn with_image(mut self, image: ImageContext) -> Self {
        self.image_context = Some(image);
        self
    }

    pub fn has_image(&self) -> bool {
        self.image_context.is_some()
    }
}

/// A single item yielded by a provider token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Provider signals it is committed to answering. Produces no output.
    Ready,
    /// An incremental text fragment.
    Token(String),
}

/// Terminal state reached by one fallback-controlled provider run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Completed,
    Partial,
    Failed,
}

/// Completion status carried by the `done` event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Partial,
}

/// Immutable telemetry entry, one per terminal routing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub session_id: SessionId,
    pub intent: Intent,
    pub requested_tier: Tier,
    pub effective_tier: Tier,
    pub reason_code: ReasonCode,
    pub fallback_applied: bool,
    /// Character count of the trimmed user message.
    pub message_length: usize,
    pub decision_time: Duration,
    /// Elapsed wall time for Completed/Partial; `None` when no token was seen.
    pub response_time: Option<Duration>,
    pub completed: bool,
    pub outcome: TerminalState,
    /// The caller dropped the stream before a terminal state was reached.
    pub cancelled: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of soft moderation over an assistant response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationResult {
    pub display_text: String,
    pub original_text: String,
    pub moderated: bool,
}

impl ModerationResult {
    /// A pass-through result that leaves the text untouched.
    pub fn untouched(text: &str) -> Self {
        Self {
            display_text: text.to_string(),
            original_text: text.to_string(),
            moderated: false,
        }
    }
}

/// Logical events emitted toward the transport layer.
///
/// The concrete tier is never part of any event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Emitted once before any chunk.
    Meta {
        technical_assistant: bool,
        show_image_tools: bool,
    },
    Chunk {
        text: String,
    },
    Done {
        status: CompletionStatus,
        moderated: bool,
        masked_text: Option<String>,
        raw_text: Option<String>,
    },
    /// Whole-request failure: no tier could produce output.
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// Event name used by the transport (`meta`, `chunk`, `done`, `error`).
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Meta { .. } => "meta",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// JSON payload for the event.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            StreamEvent::Meta {
                technical_assistant,
                show_image_tools,
            } => serde_json::json!({
                "technical_assistant": technical_assistant,
                "show_image_tools": show_image_tools,
            }),
            StreamEvent::Chunk { text } => serde_json::json!({ "text": text }),
            StreamEvent::Done {
                status,
                moderated,
                masked_text,
                raw_text,
            } => serde_json::json!({
                "status": status.to_string(),
                "moderated": moderated,
                "masked_text": masked_text,
                "raw_text": raw_text,
            }),
            StreamEvent::Error { message } => serde_json::json!({ "error": message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
