//! Renderer timing and cancellation under paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::logger::TestLogger;
use luna::core::renderer::{
    BufferTarget, DEFAULT_CADENCE, RenderStatus, Renderer, TargetEvent,
};

fn renderer() -> (Renderer, Arc<BufferTarget>) {
    let target = Arc::new(BufferTarget::new());
    (Renderer::with_defaults(target.clone()), target)
}

/// Let the reveal task run after a clock change.
async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn hi_there_reveals_one_character_per_tick() {
    let log = TestLogger::new("hi_there_reveals_one_character_per_tick");
    let (renderer, target) = renderer();
    let session = renderer.render("Hi there");
    assert!(renderer.is_rendering());
    assert_eq!(session.output(), "");

    for revealed in 1..=8 {
        tokio::time::advance(DEFAULT_CADENCE).await;
        settle().await;
        assert_eq!(session.output().chars().count(), revealed);
    }

    assert_eq!(session.status(), RenderStatus::Completed);
    assert_eq!(session.output(), "Hi there");
    assert!(!renderer.is_rendering());
    assert!(renderer.live().is_none());
    assert_eq!(
        target.events().last(),
        Some(&TargetEvent::Finish(session.generation()))
    );
    log.finish_ok();
}

#[tokio::test(start_paused = true)]
async fn nothing_is_revealed_before_the_first_tick() {
    let (renderer, _target) = renderer();
    let session = renderer.render("abc");
    tokio::time::advance(DEFAULT_CADENCE - Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(session.output(), "");
    assert!(session.is_live());
}

#[tokio::test(start_paused = true)]
async fn superseded_session_gets_one_marker_and_no_later_writes() {
    let (renderer, target) = renderer();
    let first = renderer.render("The first reply is long");
    tokio::time::advance(DEFAULT_CADENCE * 3).await;
    settle().await;
    let revealed = first.output();

    let second = renderer.render("Second");
    assert_eq!(first.status(), RenderStatus::Cancelled);
    assert_eq!(first.output(), format!("{revealed}…"));

    second.wait().await;
    assert_eq!(second.output(), "Second");

    // Nothing more arrives for the first generation once sealed.
    let first_events: Vec<_> = target
        .events()
        .into_iter()
        .filter(|e| match e {
            TargetEvent::Reveal(g, _) | TargetEvent::Seal(g, _) => *g == first.generation(),
            _ => false,
        })
        .collect();
    assert!(matches!(first_events.last(), Some(TargetEvent::Seal(_, m)) if m == "…"));
    assert_eq!(
        first_events
            .iter()
            .filter(|e| matches!(e, TargetEvent::Seal(..)))
            .count(),
        1
    );
    assert_eq!(target.text_of(first.generation()), first.output());
}

#[tokio::test(start_paused = true)]
async fn uncancelled_render_yields_exact_text() {
    let (renderer, target) = renderer();
    for text in ["x", "Bonjour, ça va ?", "line one\nline two"] {
        let session = renderer.render(text);
        assert_eq!(session.wait().await, RenderStatus::Completed);
        assert_eq!(session.output(), text);
        assert_eq!(target.text_of(session.generation()), text);
    }
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_live_session() {
    let (renderer, _target) = renderer();
    let session = renderer.render("stop me");
    tokio::time::advance(DEFAULT_CADENCE).await;
    settle().await;

    renderer.stop();
    assert_eq!(session.wait().await, RenderStatus::Cancelled);
    assert_eq!(session.output(), "s…");

    tokio::time::advance(DEFAULT_CADENCE * 10).await;
    settle().await;
    assert_eq!(session.output(), "s…");
}

#[tokio::test(start_paused = true)]
async fn custom_cadence_and_marker() {
    let target = Arc::new(BufferTarget::new());
    let renderer = Renderer::new(target, Duration::from_millis(100), " [cut]");
    let session = renderer.render("abcdef");

    tokio::time::advance(Duration::from_millis(250)).await;
    settle().await;
    renderer.cancel(&session);

    assert_eq!(session.output(), "ab [cut]");
}
