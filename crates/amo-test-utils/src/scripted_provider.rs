// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted provider invoker for deterministic testing.
//!
//! `ScriptedProvider` implements `ProviderInvoker` with a per-tier script that
//! decides what each invocation yields: tokens, failures at a given point, or
//! a stream that never produces anything.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::Mutex;

use amo_core::{AmoError, ChatRequest, ProviderEvent, ProviderInvoker, Tier, TokenStream};

/// What one invocation at a tier does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Yield the tokens, then end normally.
    Tokens(Vec<String>),
    /// Yield an explicit ready signal, then the tokens.
    ReadyThenTokens(Vec<String>),
    /// `invoke` itself returns an error.
    FailToStart,
    /// The stream yields an error before any token.
    FailBeforeFirstToken,
    /// Yield the tokens, then an error.
    FailAfter(Vec<String>),
    /// Never yield anything.
    Hang,
    /// Yield the tokens, then never yield again.
    TokensThenHang(Vec<String>),
}

impl Script {
    /// Tokens script from string slices.
    pub fn tokens(tokens: &[&str]) -> Self {
        Script::Tokens(owned(tokens))
    }

    /// Fail-after script from string slices.
    pub fn fail_after(tokens: &[&str]) -> Self {
        Script::FailAfter(owned(tokens))
    }
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[derive(Default)]
struct Scripts {
    defaults: HashMap<Tier, Script>,
    queued: HashMap<Tier, VecDeque<Script>>,
}

/// Increments a shared counter when the stream holding it is dropped.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A provider invoker driven by per-tier scripts.
///
/// One-shot scripts queued with [`ScriptedProvider::queue`] run first; after
/// that the tier's default script from [`ScriptedProvider::with_script`] runs.
/// Tiers with neither yield a single "mock response" token.
pub struct ScriptedProvider {
    scripts: Mutex<Scripts>,
    calls: Mutex<Vec<Tier>>,
    token_delay: Option<Duration>,
    streams_dropped: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(Scripts::default()),
            calls: Mutex::new(Vec::new()),
            token_delay: None,
            streams_dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the default script for a tier.
    pub fn with_script(mut self, tier: Tier, script: Script) -> Self {
        self.scripts.get_mut().defaults.insert(tier, script);
        self
    }

    /// Sleep this long before every stream item.
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Queue a one-shot script for the next invocation at `tier`.
    pub async fn queue(&self, tier: Tier, script: Script) {
        self.scripts
            .lock()
            .await
            .queued
            .entry(tier)
            .or_default()
            .push_back(script);
    }

    /// Tiers invoked so far, in call order.
    pub async fn calls(&self) -> Vec<Tier> {
        self.calls.lock().await.clone()
    }

    /// Number of invocations at `tier`.
    pub async fn calls_at(&self, tier: Tier) -> usize {
        self.calls.lock().await.iter().filter(|t| **t == tier).count()
    }

    /// Number of streams handed out that have since been dropped.
    pub fn streams_dropped(&self) -> usize {
        self.streams_dropped.load(Ordering::SeqCst)
    }

    async fn next_script(&self, tier: Tier) -> Script {
        let mut scripts = self.scripts.lock().await;
        if let Some(script) = scripts.queued.get_mut(&tier).and_then(VecDeque::pop_front) {
            return script;
        }
        scripts
            .defaults
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| Script::tokens(&["mock response"]))
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderInvoker for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, tier: Tier, _request: &ChatRequest) -> Result<TokenStream, AmoError> {
        self.calls.lock().await.push(tier);
        let script = self.next_script(tier).await;

        let token = |t: String| Ok(ProviderEvent::Token(t));
        let items: Vec<Result<ProviderEvent, AmoError>> = match &script {
            Script::FailToStart => {
                return Err(AmoError::provider(format!("{tier} tier unavailable")));
            }
            Script::Tokens(tokens) | Script::TokensThenHang(tokens) => {
                tokens.iter().cloned().map(token).collect()
            }
            Script::ReadyThenTokens(tokens) => std::iter::once(Ok(ProviderEvent::Ready))
                .chain(tokens.iter().cloned().map(token))
                .collect(),
            Script::FailBeforeFirstToken => {
                vec![Err(AmoError::provider(format!("{tier} tier failed")))]
            }
            Script::FailAfter(tokens) => tokens
                .iter()
                .cloned()
                .map(token)
                .chain(std::iter::once(Err(AmoError::provider(format!(
                    "{tier} tier dropped the stream"
                )))))
                .collect(),
            Script::Hang => Vec::new(),
        };
        let hangs = matches!(script, Script::Hang | Script::TokensThenHang(_));

        let base = if hangs {
            stream::iter(items).chain(stream::pending()).boxed()
        } else {
            stream::iter(items).boxed()
        };

        let delayed = match self.token_delay {
            Some(delay) => base
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed(),
            None => base,
        };

        let guard = DropCounter(Arc::clone(&self.streams_dropped));
        Ok(Box::pin(delayed.map(move |item| {
            let _ = &guard;
            item
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest::new("s1", "hello")
    }

    async fn collect(stream: TokenStream) -> Vec<Result<ProviderEvent, String>> {
        stream
            .map(|item| item.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn default_script_yields_mock_response() {
        let provider = ScriptedProvider::new();
        let items = collect(provider.invoke(Tier::Light, &request()).await.unwrap()).await;
        assert_eq!(
            items,
            vec![Ok(ProviderEvent::Token("mock response".to_string()))]
        );
    }

    #[tokio::test]
    async fn queued_scripts_run_before_default() {
        let provider =
            ScriptedProvider::new().with_script(Tier::Reasoning, Script::tokens(&["default"]));
        provider
            .queue(Tier::Reasoning, Script::FailBeforeFirstToken)
            .await;

        let first = collect(provider.invoke(Tier::Reasoning, &request()).await.unwrap()).await;
        assert!(first[0].is_err());

        let second = collect(provider.invoke(Tier::Reasoning, &request()).await.unwrap()).await;
        assert_eq!(second, vec![Ok(ProviderEvent::Token("default".into()))]);
        assert_eq!(provider.calls_at(Tier::Reasoning).await, 2);
    }

    #[tokio::test]
    async fn fail_to_start_errors_from_invoke() {
        let provider = ScriptedProvider::new().with_script(Tier::Vision, Script::FailToStart);
        assert!(provider.invoke(Tier::Vision, &request()).await.is_err());
        assert_eq!(provider.calls().await, vec![Tier::Vision]);
    }

    #[tokio::test]
    async fn dropped_streams_are_counted() {
        let provider = ScriptedProvider::new().with_script(Tier::Standard, Script::Hang);
        let stream = provider.invoke(Tier::Standard, &request()).await.unwrap();
        assert_eq!(provider.streams_dropped(), 0);
        drop(stream);
        assert_eq!(provider.streams_dropped(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_yields() {
        let provider = ScriptedProvider::new().with_script(Tier::Standard, Script::Hang);
        let mut stream = provider.invoke(Tier::Standard, &request()).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(30), stream.next()).await;
        assert!(next.is_err());
    }
}
