//! Incremental "typing" renderer.
//!
//! A reply is revealed one character per cadence tick by a spawned task, so
//! rendering never blocks the caller. At most one [`RenderSession`] is live;
//! starting a new one seals the previous one with the truncation marker.
//!
//! Every session carries a generation number. Before writing, the reveal task
//! checks its generation against the live one while holding the renderer
//! lock, then takes the session lock. Cancellation takes the locks in the
//! same order, so a superseded session can never write after its marker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;

/// Default delay before each revealed character.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(15);

/// Default marker appended to a cut-short render.
pub const DEFAULT_TRUNCATION_MARKER: &str = "…";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Render Target
// =============================================================================

/// Where revealed text goes.
///
/// Calls for one generation arrive in order: `begin`, any number of
/// `reveal`, then exactly one of `seal` or `finish`.
pub trait RenderTarget: Send + Sync {
    fn begin(&self, _generation: u64) {}
    fn reveal(&self, generation: u64, ch: char);
    /// The render was cut short; `marker` is the last thing written.
    fn seal(&self, generation: u64, marker: &str);
    fn finish(&self, _generation: u64) {}
    /// A message is waiting on providers.
    fn thinking(&self, _active: bool) {}
}

/// One call received by a [`BufferTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    Begin(u64),
    Reveal(u64, char),
    Seal(u64, String),
    Finish(u64),
    Thinking(bool),
}

/// In-memory target that records every call.
#[derive(Debug, Default)]
pub struct BufferTarget {
    events: Mutex<Vec<TargetEvent>>,
}

impl BufferTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<TargetEvent> {
        lock(&self.events).clone()
    }

    /// Everything written for `generation`, marker included.
    #[must_use]
    pub fn text_of(&self, generation: u64) -> String {
        let mut out = String::new();
        for event in lock(&self.events).iter() {
            match event {
                TargetEvent::Reveal(g, ch) if *g == generation => out.push(*ch),
                TargetEvent::Seal(g, marker) if *g == generation => out.push_str(marker),
                _ => {}
            }
        }
        out
    }

    fn record(&self, event: TargetEvent) {
        lock(&self.events).push(event);
    }
}

impl RenderTarget for BufferTarget {
    fn begin(&self, generation: u64) {
        self.record(TargetEvent::Begin(generation));
    }

    fn reveal(&self, generation: u64, ch: char) {
        self.record(TargetEvent::Reveal(generation, ch));
    }

    fn seal(&self, generation: u64, marker: &str) {
        self.record(TargetEvent::Seal(generation, marker.to_string()));
    }

    fn finish(&self, generation: u64) {
        self.record(TargetEvent::Finish(generation));
    }

    fn thinking(&self, active: bool) {
        self.record(TargetEvent::Thinking(active));
    }
}

// =============================================================================
// Render Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Live,
    Completed,
    Cancelled,
}

#[derive(Debug)]
struct SessionState {
    text: Vec<char>,
    next: usize,
    output: String,
    status: RenderStatus,
}

#[derive(Debug)]
struct SessionShared {
    generation: u64,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<RenderStatus>,
    token: CancellationToken,
}

/// Handle to one render. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RenderSession {
    shared: Arc<SessionShared>,
}

impl RenderSession {
    fn new(generation: u64, text: &str) -> Self {
        let (status_tx, _) = watch::channel(RenderStatus::Live);
        Self {
            shared: Arc::new(SessionShared {
                generation,
                state: Mutex::new(SessionState {
                    text: text.chars().collect(),
                    next: 0,
                    output: String::with_capacity(text.len()),
                    status: RenderStatus::Live,
                }),
                status_tx,
                token: CancellationToken::new(),
            }),
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.generation
    }

    #[must_use]
    pub fn status(&self) -> RenderStatus {
        lock(&self.shared.state).status
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status() == RenderStatus::Live
    }

    /// Text revealed so far, including the marker if the render was cut short.
    #[must_use]
    pub fn output(&self) -> String {
        lock(&self.shared.state).output.clone()
    }

    /// The full text this session was asked to render.
    #[must_use]
    pub fn text(&self) -> String {
        lock(&self.shared.state).text.iter().collect()
    }

    /// Index of the next character to reveal.
    #[must_use]
    pub fn position(&self) -> usize {
        lock(&self.shared.state).next
    }

    /// Wait until the session is no longer live.
    pub async fn wait(&self) -> RenderStatus {
        let mut rx = self.shared.status_tx.subscribe();
        match rx.wait_for(|status| *status != RenderStatus::Live).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Move a live session to `status`. Returns false if it had already ended.
    fn end(&self, state: &mut SessionState, status: RenderStatus) -> bool {
        if state.status != RenderStatus::Live {
            return false;
        }
        state.status = status;
        self.shared.status_tx.send_replace(status);
        self.shared.token.cancel();
        true
    }
}

// =============================================================================
// Renderer
// =============================================================================

#[derive(Debug, Default)]
struct LiveSlot {
    last_generation: u64,
    live: Option<RenderSession>,
}

struct RendererShared {
    slot: Mutex<LiveSlot>,
    cadence: Duration,
    marker: String,
    target: Arc<dyn RenderTarget>,
}

/// Renders replies one character at a time. Cheap to clone.
#[derive(Clone)]
pub struct Renderer {
    shared: Arc<RendererShared>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("cadence", &self.shared.cadence)
            .field("marker", &self.shared.marker)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    #[must_use]
    pub fn new(target: Arc<dyn RenderTarget>, cadence: Duration, marker: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(RendererShared {
                slot: Mutex::new(LiveSlot::default()),
                cadence,
                marker: marker.into(),
                target,
            }),
        }
    }

    /// Renderer with the default cadence and marker.
    #[must_use]
    pub fn with_defaults(target: Arc<dyn RenderTarget>) -> Self {
        Self::new(target, DEFAULT_CADENCE, DEFAULT_TRUNCATION_MARKER)
    }

    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.shared.cadence
    }

    #[must_use]
    pub fn target(&self) -> &Arc<dyn RenderTarget> {
        &self.shared.target
    }

    /// Start rendering `text`, cancelling whatever is live.
    ///
    /// Must be called inside a tokio runtime.
    pub fn render(&self, text: &str) -> RenderSession {
        let mut slot = lock(&self.shared.slot);
        if let Some(previous) = slot.live.take() {
            self.seal(&previous);
        }

        slot.last_generation += 1;
        let session = RenderSession::new(slot.last_generation, text);
        let generation = session.generation();
        self.shared.target.begin(generation);

        if text.is_empty() {
            let mut state = lock(&session.shared.state);
            session.end(&mut state, RenderStatus::Completed);
            drop(state);
            self.shared.target.finish(generation);
            return session;
        }

        slot.live = Some(session.clone());
        drop(slot);

        // Ticks are anchored at render time, not at the task's first poll.
        let cadence = self.shared.cadence;
        let ticker = tokio::time::interval_at(tokio::time::Instant::now() + cadence, cadence);
        tracing::debug!(generation, chars = text.chars().count(), "Render started");
        tokio::spawn(reveal_loop(self.clone(), session.clone(), ticker));
        session
    }

    /// Cancel `session` if it is still live. Idempotent.
    pub fn cancel(&self, session: &RenderSession) {
        let mut slot = lock(&self.shared.slot);
        if slot
            .live
            .as_ref()
            .is_some_and(|live| live.generation() == session.generation())
        {
            slot.live = None;
        }
        self.seal(session);
    }

    /// Cancel whatever is live.
    pub fn stop(&self) {
        let mut slot = lock(&self.shared.slot);
        if let Some(live) = slot.live.take() {
            self.seal(&live);
        }
    }

    /// The live session, if any.
    #[must_use]
    pub fn live(&self) -> Option<RenderSession> {
        lock(&self.shared.slot).live.clone()
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        lock(&self.shared.slot).live.is_some()
    }

    /// Append the marker and end the session. Caller holds the slot lock.
    fn seal(&self, session: &RenderSession) {
        let mut state = lock(&session.shared.state);
        if state.status != RenderStatus::Live {
            return;
        }
        state.output.push_str(&self.shared.marker);
        session.end(&mut state, RenderStatus::Cancelled);
        self.shared.target.seal(session.generation(), &self.shared.marker);
        tracing::debug!(
            generation = session.generation(),
            revealed = state.next,
            "Render cancelled"
        );
    }
}

/// Reveal one character per tick until the text is done or the session ends.
async fn reveal_loop(renderer: Renderer, session: RenderSession, mut ticker: Interval) {
    let generation = session.generation();
    let token = session.shared.token.clone();

    loop {
        tokio::select! {
            () = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let mut slot = lock(&renderer.shared.slot);
        if slot.live.as_ref().map(RenderSession::generation) != Some(generation) {
            return;
        }

        let mut state = lock(&session.shared.state);
        if state.status != RenderStatus::Live {
            return;
        }
        let Some(&ch) = state.text.get(state.next) else {
            return;
        };
        state.next += 1;
        state.output.push(ch);
        renderer.shared.target.reveal(generation, ch);

        if state.next == state.text.len() {
            session.end(&mut state, RenderStatus::Completed);
            renderer.shared.target.finish(generation);
            drop(state);
            slot.live = None;
            tracing::debug!(generation, "Render completed");
            return;
        }
    }
}
