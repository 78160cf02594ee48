//! Provider status events.
//!
//! The prober and the dispatcher report provider state changes through a
//! [`StatusReporter`]. Every event is folded into the reporter's own
//! [`StatusBoard`], which holds one entry per provider. Events are also
//! forwarded on an unbounded channel, but only while a subscriber holds the
//! receiving end, so nothing queues up when nobody is watching.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Reported state of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Offline,
    Available,
    MostRecentlyUsed,
}

impl ProviderState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Available => "available",
            Self::MostRecentlyUsed => "in use",
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub provider: String,
    pub state: ProviderState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Shared {
    board: StatusBoard,
    subscriber: Option<mpsc::UnboundedSender<StatusEvent>>,
}

/// Sending half of the status stream.
///
/// Clones share one board and one subscriber. Emitting never fails from the
/// caller's point of view.
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    shared: Arc<Mutex<Shared>>,
}

impl StatusReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(&self, provider: &str, state: ProviderState) {
        tracing::trace!(provider, state = state.label(), "Status event");
        let event = StatusEvent {
            provider: provider.to_string(),
            state,
            at: Utc::now(),
        };
        let mut shared = self.shared();
        shared.board.apply(&event);
        let closed = shared
            .subscriber
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_err());
        if closed {
            tracing::trace!("Status subscriber gone");
            shared.subscriber = None;
        }
    }

    /// Receive events emitted from now on.
    ///
    /// `None` while another subscriber is still listening. Once that
    /// receiver is dropped a new subscription may be taken.
    #[must_use]
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<StatusEvent>> {
        let mut shared = self.shared();
        if shared.subscriber.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.subscriber = Some(tx);
        Some(rx)
    }

    /// Latest state per provider, whether or not anyone subscribed.
    #[must_use]
    pub fn board(&self) -> StatusBoard {
        self.shared().board.clone()
    }
}

/// A reporter with a subscriber already attached.
#[must_use]
pub fn channel() -> (StatusReporter, mpsc::UnboundedReceiver<StatusEvent>) {
    let reporter = StatusReporter::new();
    let (tx, rx) = mpsc::unbounded_channel();
    reporter.shared().subscriber = Some(tx);
    (reporter, rx)
}

/// Latest known state per provider, folded from events.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusBoard {
    states: BTreeMap<String, ProviderState>,
}

impl StatusBoard {
    /// Apply one event. Only one provider holds `MostRecentlyUsed` at a time.
    pub fn apply(&mut self, event: &StatusEvent) {
        if event.state == ProviderState::MostRecentlyUsed {
            for state in self.states.values_mut() {
                if *state == ProviderState::MostRecentlyUsed {
                    *state = ProviderState::Available;
                }
            }
        }
        self.states.insert(event.provider.clone(), event.state);
    }

    /// Apply everything currently queued on `rx` without waiting.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<StatusEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(&event);
            applied += 1;
        }
        applied
    }

    #[must_use]
    pub fn get(&self, provider: &str) -> Option<ProviderState> {
        self.states.get(provider).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ProviderState)> {
        self.states.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
