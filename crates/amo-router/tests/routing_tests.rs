// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for classification, guarding, and selection together.

use std::sync::Arc;
use std::time::Duration;

use amo_config::{AmoConfig, ClassifierConfig, GuardConfig};
use amo_core::{ChatRequest, ImageContext, Intent, ReasonCode, Tier};
use amo_router::{AdaptiveRouter, IntentClassifier};
use proptest::prelude::*;

fn stack_trace_message(len: usize) -> String {
    let mut msg = String::from(
        "My service keeps dying, here is the output:\n\
         Traceback (most recent call last):\n  File \"worker.py\", line 42, in run\n",
    );
    while msg.chars().count() < len {
        msg.push_str("    data = queue.get(timeout=5)\n");
    }
    msg
}

/// "hi" is light; three stack traces route to reasoning; the fourth hits the cap.
#[tokio::test]
async fn casual_then_three_traces_then_cap() {
    let router = AdaptiveRouter::new(&AmoConfig::default()).unwrap();

    let hi = router.route(&ChatRequest::new("s1", "hi")).await.decision;
    assert_eq!(hi.intent, Intent::Casual);
    assert_eq!(hi.effective_tier, Tier::Light);

    let trace = stack_trace_message(600);
    assert!(trace.chars().count() >= 600);
    for _ in 0..3 {
        let d = router.route(&ChatRequest::new("s1", &trace)).await.decision;
        assert_eq!(d.intent, Intent::Coding);
        assert_eq!(d.effective_tier, Tier::Reasoning);
        assert_eq!(d.reason_code, ReasonCode::Normal);
    }

    let fourth = router.route(&ChatRequest::new("s1", &trace)).await.decision;
    assert_eq!(fourth.requested_tier, Tier::Reasoning);
    assert_eq!(fourth.effective_tier, Tier::Standard);
    assert_eq!(fourth.reason_code, ReasonCode::CapExceeded);

    // A casual turn resets the streak.
    router.route(&ChatRequest::new("s1", "thanks")).await;
    let after = router.route(&ChatRequest::new("s1", &trace)).await.decision;
    assert_eq!(after.effective_tier, Tier::Reasoning);
}

/// An image routes to vision whatever the text says.
#[tokio::test]
async fn image_context_requests_vision_regardless_of_text() {
    let router = AdaptiveRouter::new(&AmoConfig::default()).unwrap();
    let trace = stack_trace_message(300);
    for (i, text) in ["", "hi", trace.as_str(), "what is this?"].iter().enumerate() {
        let req = ChatRequest::new(format!("s{i}"), *text).with_image(ImageContext {
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo".into(),
        });
        let d = router.route(&req).await.decision;
        assert_eq!(d.requested_tier, Tier::Vision, "text: {text:?}");
    }
}

/// Above the global threshold every concurrent request sees a non-high-cost
/// tier, until the window slides.
#[tokio::test(start_paused = true)]
async fn global_spike_downgrades_concurrent_sessions() {
    let config = AmoConfig {
        guard: GuardConfig {
            global_rate_limit: Some(5),
            session_rate_limit: None,
            ..GuardConfig::default()
        },
        ..AmoConfig::default()
    };
    let router = Arc::new(AdaptiveRouter::new(&config).unwrap());

    for i in 0..5 {
        router
            .route(&ChatRequest::new(format!("warm{i}"), "hello"))
            .await;
    }

    let mut handles = Vec::new();
    for i in 0..10 {
        let router = Arc::clone(&router);
        handles.push(tokio::spawn(async move {
            router
                .route(&ChatRequest::new(format!("burst{i}"), "debug my sql query"))
                .await
                .decision
        }));
    }
    for handle in handles {
        let d = handle.await.unwrap();
        assert!(!d.effective_tier.is_high_cost());
        assert_eq!(d.reason_code, ReasonCode::RateLimited);
    }

    tokio::time::advance(Duration::from_secs(61)).await;
    let d = router
        .route(&ChatRequest::new("later", "debug my sql query"))
        .await
        .decision;
    assert_eq!(d.effective_tier, Tier::Reasoning);
}

#[tokio::test]
async fn decision_time_is_measured() {
    let router = AdaptiveRouter::new(&AmoConfig::default()).unwrap();
    let routed = router.route(&ChatRequest::new("s1", "hello")).await;
    assert!(routed.decision_time < Duration::from_secs(1));
}

proptest! {
    /// Classification is a pure function of its inputs.
    #[test]
    fn classification_is_deterministic(text in "\\PC{0,300}", image in any::<bool>()) {
        let a = IntentClassifier::new(&ClassifierConfig::default()).unwrap();
        let b = IntentClassifier::new(&ClassifierConfig::default()).unwrap();
        let first = a.classify(&text, image);
        prop_assert_eq!(first, a.classify(&text, image));
        prop_assert_eq!(first, b.classify(&text, image));
        if image {
            prop_assert_eq!(first, Intent::VisionRequest);
        }
    }

    /// Anything with a code fence is coding unless an image is attached.
    #[test]
    fn code_fences_are_always_coding(prefix in "[a-z ]{0,40}", body in "[a-z;= ]{0,40}") {
        let c = IntentClassifier::new(&ClassifierConfig::default()).unwrap();
        let text = format!("{prefix}\n```\n{body}\n```");
        prop_assert_eq!(c.classify(&text, false), Intent::Coding);
    }
}
