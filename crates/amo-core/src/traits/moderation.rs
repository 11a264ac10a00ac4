// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content moderation seam applied to finished responses.

use crate::types::ModerationResult;

/// Reviews a finished assistant response in the light of the user's message.
pub trait Moderator: Send + Sync + 'static {
    fn moderate(&self, user_message: &str, response_text: &str) -> ModerationResult;
}

/// Moderator that never changes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopModerator;

impl Moderator for NoopModerator {
    fn moderate(&self, _user_message: &str, response_text: &str) -> ModerationResult {
        ModerationResult::untouched(response_text)
    }
}
