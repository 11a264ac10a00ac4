// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `amo simulate` command implementation.
//!
//! Streams chat turns through the full coordinator against a simulated
//! provider with per-tier latency and a configurable transient failure rate,
//! printing each event as an SSE frame.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amo_config::AmoConfig;
use amo_core::{AmoError, ChatRequest, ProviderEvent, ProviderInvoker, StreamEvent, Tier, TokenStream};
use amo_router::AdaptiveRouter;
use amo_stream::StreamCoordinator;
use amo_telemetry::{TelemetryRecorder, build_sink};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Time to first token for each tier.
pub fn tier_latency(tier: Tier) -> Duration {
    match tier {
        Tier::Light => Duration::from_millis(20),
        Tier::Standard => Duration::from_millis(40),
        Tier::Reasoning => Duration::from_millis(70),
        Tier::Vision => Duration::from_millis(80),
    }
}

/// Provider stand-in that sleeps, maybe fails, then streams a canned reply.
pub struct SimulatedProvider {
    rng: Mutex<StdRng>,
    failure_rate: f64,
    token_delay: Duration,
}

impl SimulatedProvider {
    /// `failure_rate` is clamped to `[0, 1]`.
    pub fn new(failure_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            token_delay: Duration::from_millis(5),
        }
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    fn draw_failure(&self) -> bool {
        self.rng
            .lock()
            .map(|mut rng| rng.gen_bool(self.failure_rate))
            .unwrap_or(false)
    }
}

fn canned_reply(request: &ChatRequest) -> String {
    let topic: String = request.message.trim().chars().take(40).collect();
    if request.has_image() {
        format!("I can see the picture you shared. You asked: \"{topic}\".")
    } else if topic.is_empty() {
        "Could you tell me a little more about what you need?".to_string()
    } else {
        format!("Here is a simulated answer about \"{topic}\".")
    }
}

#[async_trait]
impl ProviderInvoker for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn invoke(&self, tier: Tier, request: &ChatRequest) -> Result<TokenStream, AmoError> {
        let fails = self.draw_failure();
        tokio::time::sleep(tier_latency(tier)).await;
        if fails {
            debug!(tier = %tier, "simulated transient failure");
            return Err(AmoError::provider(format!("{tier} tier transient failure")));
        }

        let words: Vec<String> = canned_reply(request)
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        let delay = self.token_delay;
        Ok(Box::pin(stream::iter(words).then(move |word| async move {
            tokio::time::sleep(delay).await;
            Ok(ProviderEvent::Token(word))
        })))
    }
}

/// Render one event as an SSE frame.
pub fn sse_frame(event: &StreamEvent) -> String {
    format!("event: {}\ndata: {}\n\n", event.name(), event.payload())
}

/// Options for `amo simulate`.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub session: String,
    pub image: bool,
    pub failure_rate: f64,
    pub seed: Option<u64>,
    pub turns: usize,
}

/// Run the `amo simulate` command, writing frames to stdout.
pub async fn run_simulate(
    config: &AmoConfig,
    message: &str,
    options: SimulateOptions,
) -> Result<(), AmoError> {
    let mut stdout = std::io::stdout().lock();
    simulate_into(config, message, options, &mut stdout).await
}

/// Stream `options.turns` chat turns into `out`, then drain telemetry.
pub async fn simulate_into<W: Write>(
    config: &AmoConfig,
    message: &str,
    options: SimulateOptions,
    out: &mut W,
) -> Result<(), AmoError> {
    let sink = build_sink(&config.telemetry).await?;
    let (recorder, worker) = TelemetryRecorder::spawn(config.telemetry.queue_capacity, sink);

    let router = Arc::new(AdaptiveRouter::new(config)?);
    let cancel = CancellationToken::new();
    let sweeper = router.guard().spawn_idle_sweeper(cancel.clone());

    let provider = Arc::new(SimulatedProvider::new(options.failure_rate, options.seed));
    let coordinator =
        StreamCoordinator::with_router(config, Arc::clone(&router), provider, recorder.clone())?;

    let streamed = stream_turns(&coordinator, message, &options, out).await;
    let stopped = stop_sweeper(cancel, sweeper).await;
    streamed?;
    stopped?;

    let dropped = recorder.dropped();
    drop(coordinator);
    drop(recorder);
    let written = worker.join().await?;
    info!(written, dropped, "telemetry drained");
    Ok(())
}

async fn stream_turns<W: Write>(
    coordinator: &StreamCoordinator,
    message: &str,
    options: &SimulateOptions,
    out: &mut W,
) -> Result<(), AmoError> {
    for turn in 0..options.turns.max(1) {
        debug!(turn, session = %options.session, "simulated turn");
        let request = crate::build_request(&options.session, message, options.image);
        let mut events = coordinator.handle(request);
        while let Some(event) = events.next().await {
            write!(out, "{}", sse_frame(&event))
                .and_then(|()| out.flush())
                .map_err(|e| AmoError::Internal(format!("failed to write event: {e}")))?;
        }
    }
    Ok(())
}

/// Cancel the idle sweeper and wait for it to exit.
async fn stop_sweeper(cancel: CancellationToken, sweeper: JoinHandle<()>) -> Result<(), AmoError> {
    cancel.cancel();
    sweeper
        .await
        .map_err(|e| AmoError::Internal(format!("idle sweeper failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use amo_config::{SinkKind, TelemetryConfig};

    fn quiet_config() -> AmoConfig {
        AmoConfig {
            telemetry: TelemetryConfig {
                sink: SinkKind::Disabled,
                ..TelemetryConfig::default()
            },
            ..AmoConfig::default()
        }
    }

    fn options(turns: usize, failure_rate: f64) -> SimulateOptions {
        SimulateOptions {
            session: "sim".into(),
            image: false,
            failure_rate,
            seed: Some(7),
            turns,
        }
    }

    fn frames(output: &[u8]) -> Vec<String> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .split("\n\n")
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn frame_has_event_and_data_lines() {
        let frame = sse_frame(&StreamEvent::Chunk {
            text: "hi".into(),
        });
        assert_eq!(frame, "event: chunk\ndata: {\"text\":\"hi\"}\n\n");
    }

    #[test]
    fn latency_follows_tier_cost() {
        assert!(tier_latency(Tier::Light) < tier_latency(Tier::Standard));
        assert!(tier_latency(Tier::Standard) < tier_latency(Tier::Reasoning));
        assert!(tier_latency(Tier::Reasoning) <= tier_latency(Tier::Vision));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_always_fails_at_rate_one() {
        let provider = SimulatedProvider::new(1.0, Some(1));
        let request = ChatRequest::new("s", "hi");
        assert!(provider.invoke(Tier::Light, &request).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn provider_streams_reply_at_rate_zero() {
        let provider = SimulatedProvider::new(0.0, None).with_token_delay(Duration::ZERO);
        let request = ChatRequest::new("s", "tell me about tides");
        let tokens: Vec<String> = provider
            .invoke(Tier::Standard, &request)
            .await
            .unwrap()
            .filter_map(|item| async move {
                match item {
                    Ok(ProviderEvent::Token(t)) => Some(t),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(
            tokens.concat(),
            "Here is a simulated answer about \"tell me about tides\"."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn simulate_writes_meta_chunks_done() {
        let mut out = Vec::new();
        simulate_into(&quiet_config(), "hello", options(1, 0.0), &mut out)
            .await
            .unwrap();
        let frames = frames(&out);
        assert!(frames[0].starts_with("event: meta\n"));
        assert!(frames[1].starts_with("event: chunk\n"));
        assert!(frames.last().unwrap().starts_with("event: done\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_yields_error_frame() {
        let mut out = Vec::new();
        simulate_into(&quiet_config(), "explain ownership in rust", options(1, 1.0), &mut out)
            .await
            .unwrap();
        let frames = frames(&out);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].starts_with("event: error\n"));
        assert!(!frames[1].contains("standard"));
    }

    #[tokio::test(start_paused = true)]
    async fn multiple_turns_share_a_session() {
        let mut out = Vec::new();
        simulate_into(&quiet_config(), "hi", options(3, 0.0), &mut out)
            .await
            .unwrap();
        let metas = frames(&out)
            .iter()
            .filter(|f| f.starts_with("event: meta\n"))
            .count();
        assert_eq!(metas, 3);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_is_reported() {
        let err = simulate_into(&quiet_config(), "hello", options(2, 0.0), &mut BrokenPipe)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to write event"), "{err}");
    }

    #[tokio::test]
    async fn sweeper_panic_is_reported() {
        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(async { panic!("sweeper blew up") });
        let err = stop_sweeper(cancel.clone(), sweeper).await.unwrap_err();
        assert!(err.to_string().contains("idle sweeper failed"), "{err}");
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn sweeper_stops_cleanly() {
        let router = AdaptiveRouter::new(&AmoConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        let sweeper = router.guard().spawn_idle_sweeper(cancel.clone());
        stop_sweeper(cancel, sweeper).await.unwrap();
    }
}
