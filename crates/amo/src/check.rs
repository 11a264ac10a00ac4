// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `amo check` command implementation.
//!
//! Runs the routing self-check: sample intents, the consecutive high-cost
//! cap scenario, and a decision latency bound. With `--metrics`, also streams
//! a few simulated turns and prints the Prometheus exposition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use amo_config::AmoConfig;
use amo_core::{AmoError, Intent, ReasonCode, Tier};
use amo_router::AdaptiveRouter;
use amo_stream::StreamCoordinator;
use amo_telemetry::{NoopSink, TelemetryRecorder, install_prometheus};
use futures::StreamExt;

use crate::build_request;
use crate::simulate::SimulatedProvider;

/// Number of routing decisions timed by the latency check.
const LATENCY_ROUTES: usize = 2000;

/// Upper bound on any single routing decision.
const LATENCY_BOUND: Duration = Duration::from_millis(5);

const SAMPLE_TRACE: &str = "Traceback (most recent call last):\n  File \"app.py\", line 12, in main\nValueError: bad input";

/// Status of a self-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// Result of a single self-check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: impl Into<String>, passed: bool, message: String, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: if passed {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            message,
            duration,
        }
    }
}

/// Run the `amo check` command.
pub async fn run_check(config: &AmoConfig, metrics: bool) -> Result<(), AmoError> {
    let prometheus = if metrics {
        Some(install_prometheus()?)
    } else {
        None
    };

    let mut results = check_intents(config)?;
    results.push(check_cap(config).await?);
    results.push(check_latency(config).await?);

    println!();
    println!("  amo check");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    for result in &results {
        let duration_ms = result.duration.as_millis();
        let label = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {label} {:<22} {} ({duration_ms}ms)",
            result.name, result.message
        );
    }
    println!();

    if let Some(handle) = prometheus {
        exercise_pipeline(config).await?;
        println!("{}", handle.render());
    }

    if fail_count > 0 {
        return Err(AmoError::Internal(format!(
            "{fail_count} of {} checks failed",
            results.len()
        )));
    }
    println!("  all {} checks passed", results.len());
    Ok(())
}

/// Classify a fixed set of sample messages.
pub fn check_intents(config: &AmoConfig) -> Result<Vec<CheckResult>, AmoError> {
    let router = AdaptiveRouter::new(config)?;
    let long_prompt = "Tell me a story about a lighthouse keeper. "
        .repeat(config.classifier.long_prompt_chars / 40 + 1);

    let samples: [(&str, &str, bool, Intent); 6] = [
        ("greeting", "hi", false, Intent::Casual),
        ("question", "What's a good name for a cat?", false, Intent::Normal),
        ("stack trace", SAMPLE_TRACE, false, Intent::Coding),
        ("code fence", "```\nfn main() {}\n```", false, Intent::Coding),
        ("long prompt", long_prompt.as_str(), false, Intent::Coding),
        ("image", "", true, Intent::VisionRequest),
    ];

    Ok(samples
        .iter()
        .map(|(name, message, image, expected)| {
            let start = Instant::now();
            let intent = router.classify(&build_request("check-intents", *message, *image));
            CheckResult::new(
                format!("intent: {name}"),
                intent == *expected,
                format!("{intent} (expected {expected})"),
                start.elapsed(),
            )
        })
        .collect())
}

/// Route a casual turn, then one more high-cost turn than the cap allows.
pub async fn check_cap(config: &AmoConfig) -> Result<CheckResult, AmoError> {
    let router = AdaptiveRouter::new(config)?;
    let start = Instant::now();
    let session = "check-cap";
    let cap = config.guard.cap_window;

    let casual = router.route(&build_request(session, "hi", false)).await.decision;
    let mut problems = Vec::new();
    if casual.effective_tier != Tier::Light {
        problems.push(format!("greeting routed to {}", casual.effective_tier));
    }

    for turn in 1..=cap {
        let d = router
            .route(&build_request(session, SAMPLE_TRACE, false))
            .await
            .decision;
        if d.effective_tier != Tier::Reasoning {
            problems.push(format!("trace {turn} routed to {}", d.effective_tier));
        }
    }

    let capped = router
        .route(&build_request(session, SAMPLE_TRACE, false))
        .await
        .decision;
    if capped.effective_tier != Tier::Standard || capped.reason_code != ReasonCode::CapExceeded {
        problems.push(format!(
            "trace {} routed to {} ({})",
            cap + 1,
            capped.effective_tier,
            capped.reason_code
        ));
    }

    let message = if problems.is_empty() {
        format!("downgraded after {cap} consecutive high-cost turns")
    } else {
        problems.join("; ")
    };
    Ok(CheckResult::new(
        "cost cap",
        problems.is_empty(),
        message,
        start.elapsed(),
    ))
}

/// Time many routing decisions and compare the slowest against the bound.
pub async fn check_latency(config: &AmoConfig) -> Result<CheckResult, AmoError> {
    let router = AdaptiveRouter::new(config)?;
    let messages = ["hi", "What's a good name for a cat?", SAMPLE_TRACE, "thanks"];
    let start = Instant::now();
    let mut slowest = Duration::ZERO;

    for i in 0..LATENCY_ROUTES {
        let session = format!("check-latency-{}", i % 64);
        let request = build_request(&session, messages[i % messages.len()], i % 17 == 0);
        let begin = Instant::now();
        router.route(&request).await;
        slowest = slowest.max(begin.elapsed());
    }

    Ok(CheckResult::new(
        "decision latency",
        slowest < LATENCY_BOUND,
        format!("{LATENCY_ROUTES} routes, slowest {}us", slowest.as_micros()),
        start.elapsed(),
    ))
}

/// Stream a few simulated turns so the exporter has something to show.
async fn exercise_pipeline(config: &AmoConfig) -> Result<(), AmoError> {
    let (recorder, worker) = TelemetryRecorder::spawn(64, Arc::new(NoopSink));
    let provider =
        Arc::new(SimulatedProvider::new(0.2, Some(42)).with_token_delay(Duration::from_millis(1)));
    let coordinator = StreamCoordinator::from_config(config, provider, recorder)?;

    for message in ["hi", SAMPLE_TRACE, "What's a good name for a cat?", SAMPLE_TRACE] {
        let events = coordinator.handle(build_request("check-metrics", message, false));
        events.for_each(|_| async {}).await;
    }

    drop(coordinator);
    worker.join().await?;
    Ok(())
}
