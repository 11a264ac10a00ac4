// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end chat turns through router, fallback, moderation and telemetry.

use std::sync::Arc;
use std::time::Duration;

use amo_config::AmoConfig;
use amo_core::{
    ChatRequest, CompletionStatus, ImageContext, ReasonCode, SessionId, StreamEvent,
    TerminalState, Tier,
};
use amo_stream::StreamCoordinator;
use amo_telemetry::TelemetryRecorder;
use amo_test_utils::{MemorySink, Script, ScriptedProvider};
use futures::StreamExt;

const TRACE: &str = "Traceback (most recent call last):\n  File \"app.py\", line 3, in <module>\nKeyError: 'id'";

fn setup(
    config: &AmoConfig,
    provider: Arc<ScriptedProvider>,
) -> (StreamCoordinator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let (recorder, _worker) = TelemetryRecorder::spawn(256, sink.clone());
    let coordinator = StreamCoordinator::from_config(config, provider, recorder).unwrap();
    (coordinator, sink)
}

async fn turn(coordinator: &StreamCoordinator, request: ChatRequest) -> Vec<StreamEvent> {
    coordinator.handle(request).collect().await
}

fn assert_well_formed(events: &[StreamEvent]) {
    assert!(matches!(events.first(), Some(StreamEvent::Meta { .. })));
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(events.last().is_some_and(StreamEvent::is_terminal));
    for event in events {
        let payload = event.payload().to_string();
        for tier in Tier::ALL {
            assert!(
                !payload.contains(&format!("\"{tier}\"")),
                "{payload} leaks a tier"
            );
        }
    }
}

/// A coding session hits the cap and every turn is recorded once, in order.
#[tokio::test]
async fn coding_session_records_one_entry_per_turn() {
    let provider = Arc::new(ScriptedProvider::new());
    let (coordinator, sink) = setup(&AmoConfig::default(), provider.clone());

    for _ in 0..4 {
        let events = turn(&coordinator, ChatRequest::new("dev", TRACE)).await;
        assert_well_formed(&events);
        assert_eq!(
            events[0],
            StreamEvent::Meta {
                technical_assistant: true,
                show_image_tools: false,
            }
        );
    }

    let records = sink.wait_for(4, Duration::from_secs(5)).await;
    assert_eq!(records.len(), 4);
    let tiers: Vec<Tier> = records.iter().map(|r| r.effective_tier).collect();
    assert_eq!(
        tiers,
        vec![Tier::Reasoning, Tier::Reasoning, Tier::Reasoning, Tier::Standard]
    );
    assert_eq!(records[3].reason_code, ReasonCode::CapExceeded);
    assert!(records.iter().all(|r| r.outcome == TerminalState::Completed));
    assert_eq!(
        provider.calls().await,
        vec![Tier::Reasoning, Tier::Reasoning, Tier::Reasoning, Tier::Standard]
    );
}

/// A vision failure before the first token falls back to standard invisibly.
#[tokio::test]
async fn vision_failure_falls_back_without_telling_the_user() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_script(Tier::Vision, Script::FailBeforeFirstToken)
            .with_script(Tier::Standard, Script::tokens(&["It looks like a cat."])),
    );
    let (coordinator, sink) = setup(&AmoConfig::default(), provider);

    let request = ChatRequest::new("pics", "what is in this picture?").with_image(ImageContext {
        mime_type: "image/png".into(),
        data: "iVBORw0KGgo=".into(),
    });
    let events = turn(&coordinator, request).await;
    assert_well_formed(&events);
    assert_eq!(
        events,
        vec![
            StreamEvent::Meta {
                technical_assistant: false,
                show_image_tools: true,
            },
            StreamEvent::Chunk {
                text: "It looks like a cat.".into()
            },
            StreamEvent::Done {
                status: CompletionStatus::Completed,
                moderated: false,
                masked_text: None,
                raw_text: None,
            },
        ]
    );

    let record = &sink.wait_for(1, Duration::from_secs(5)).await[0];
    assert_eq!(record.requested_tier, Tier::Vision);
    assert_eq!(record.effective_tier, Tier::Standard);
    assert_eq!(record.reason_code, ReasonCode::ProviderFallback);
}

/// Ending a session forgets its streak; other sessions are unaffected.
#[tokio::test]
async fn end_session_resets_cap_for_that_session_only() {
    let provider = Arc::new(ScriptedProvider::new());
    let (coordinator, _sink) = setup(&AmoConfig::default(), provider.clone());

    for session in ["a", "b"] {
        for _ in 0..3 {
            turn(&coordinator, ChatRequest::new(session, TRACE)).await;
        }
    }
    assert!(coordinator.end_session(&SessionId::from("a")));
    assert!(!coordinator.end_session(&SessionId::from("missing")));

    turn(&coordinator, ChatRequest::new("a", TRACE)).await;
    turn(&coordinator, ChatRequest::new("b", TRACE)).await;
    let calls = provider.calls().await;
    assert_eq!(&calls[calls.len() - 2..], &[Tier::Reasoning, Tier::Standard]);
}

/// Concurrent turns across sessions each get exactly one terminal event and record.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_turns_are_isolated() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_token_delay(Duration::from_millis(2))
            .with_script(Tier::Light, Script::tokens(&["hey", "!"])),
    );
    let (coordinator, sink) = setup(&AmoConfig::default(), provider);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move {
            turn(&coordinator, ChatRequest::new(format!("c{i}"), "hello")).await
        }));
    }
    for task in tasks {
        let events = task.await.unwrap();
        assert_well_formed(&events);
        assert_eq!(events.len(), 4);
    }

    let records = sink.wait_for(16, Duration::from_secs(5)).await;
    assert_eq!(records.len(), 16);
    assert!(records.iter().all(|r| r.effective_tier == Tier::Light));
}

/// A caller that walks away mid-stream still produces one cancelled record.
#[tokio::test]
async fn abandoned_stream_is_recorded_as_cancelled() {
    let provider = Arc::new(ScriptedProvider::new().with_script(
        Tier::Standard,
        Script::TokensThenHang(vec!["Let me think".into()]),
    ));
    let (coordinator, sink) = setup(&AmoConfig::default(), provider.clone());

    let mut stream = coordinator.handle(ChatRequest::new("gone", "tell me about the ocean"));
    assert!(matches!(stream.next().await, Some(StreamEvent::Meta { .. })));
    assert!(matches!(stream.next().await, Some(StreamEvent::Chunk { .. })));
    drop(stream);

    assert_eq!(provider.streams_dropped(), 1);
    let records = sink.wait_for(1, Duration::from_secs(5)).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].cancelled);
    assert_eq!(records[0].outcome, TerminalState::Partial);
}
