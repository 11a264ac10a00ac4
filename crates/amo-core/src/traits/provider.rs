// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider invoker trait: one calling convention shared by all four tiers.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::AmoError;
use crate::types::{ChatRequest, ProviderEvent, Tier};

/// A lazily produced provider response.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent, AmoError>> + Send>>;

/// Capability to run a chat request against a model tier.
///
/// The tier is a plain value, so substituting one tier for another during
/// fallback is just a different argument to the same call. The concrete wire
/// protocol (HTTP, gRPC, SDK) is the implementor's concern.
#[async_trait]
pub trait ProviderInvoker: Send + Sync + 'static {
    /// Human-readable name of this invoker, used in logs.
    fn name(&self) -> &str;

    /// Start a response for `request` at `tier`.
    ///
    /// Returning `Err` means the provider failed before producing anything.
    /// Errors yielded inside the stream are failures mid-response.
    async fn invoke(&self, tier: Tier, request: &ChatRequest) -> Result<TokenStream, AmoError>;
}
