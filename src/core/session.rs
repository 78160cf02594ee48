//! Caller-facing chat session.
//!
//! A [`ChatSession`] ties the pipeline together: probe (or reuse a cached
//! snapshot), dispatch with fallback, then render the reply. Messages are
//! handled one at a time; the conversation lock is held from probe to the
//! start of rendering, never while characters are being revealed.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use super::availability::{AvailabilitySnapshot, Prober, SnapshotCache};
use super::credentials::CredentialSet;
use super::dispatch::{DispatchOutcome, DispatchState, Orchestrator, transition};
use super::events::{StatusBoard, StatusEvent, StatusReporter};
use super::fallback::FallbackTrace;
use super::history::ConversationHistory;
use super::http::ProviderClient;
use super::provider::ProviderRegistry;
use super::renderer::{RenderSession, RenderTarget, Renderer};
use crate::error::{LunaError, Result};
use crate::storage::config::ResolvedConfig;

/// What happened to one message.
#[derive(Debug)]
pub struct Answer {
    /// The render of the reply or of the notice shown instead.
    pub render: RenderSession,
    pub outcome: DispatchOutcome,
}

impl Answer {
    /// The text being rendered.
    #[must_use]
    pub fn text(&self) -> String {
        self.render.text()
    }
}

#[derive(Debug)]
struct Conversation {
    history: ConversationHistory,
    cache: SnapshotCache,
    last_trace: Option<FallbackTrace>,
}

struct Inner {
    registry: Arc<ProviderRegistry>,
    credentials: Arc<CredentialSet>,
    prober: Prober,
    orchestrator: Orchestrator,
    renderer: Renderer,
    conversation: tokio::sync::Mutex<Conversation>,
    reporter: StatusReporter,
}

/// Cheap to clone; clones share one conversation.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("providers", &self.inner.registry.len())
            .field("renderer", &self.inner.renderer)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        config: &ResolvedConfig,
        registry: Arc<ProviderRegistry>,
        credentials: Arc<CredentialSet>,
        target: Arc<dyn RenderTarget>,
    ) -> Result<Self> {
        let client = ProviderClient::new()?;
        let reporter = StatusReporter::new();

        let prober =
            Prober::new(client.clone(), config.probe_timeout).with_reporter(reporter.clone());
        let orchestrator = Orchestrator::new(Arc::clone(&registry), Arc::clone(&credentials), client)
            .with_timeout(config.request_timeout)
            .with_preferred(config.default_provider.clone())
            .with_reporter(reporter.clone());
        let renderer = Renderer::new(target, config.cadence, config.truncation_marker.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                credentials,
                prober,
                orchestrator,
                renderer,
                conversation: tokio::sync::Mutex::new(Conversation {
                    history: ConversationHistory::new(config.history_limit),
                    cache: SnapshotCache::new(config.probe_cache_ttl),
                    last_trace: None,
                }),
                reporter,
            }),
        })
    }

    /// Send `text` without waiting for anything. Blank input is ignored.
    pub fn send_message(&self, text: impl Into<String>) -> JoinHandle<()> {
        let session = self.clone();
        let text = text.into();
        tokio::spawn(async move {
            let _ = session.ask(&text).await;
        })
    }

    /// Run one message through probe, dispatch and render.
    ///
    /// Returns once rendering has started. `None` for blank input.
    pub async fn ask(&self, text: &str) -> Option<Answer> {
        let message = text.trim();
        if message.is_empty() {
            return None;
        }

        let mut conversation = self.inner.conversation.lock().await;
        let target = self.inner.renderer.target();
        target.thinking(true);

        let mut snapshot = self.snapshot_for(&mut conversation).await;
        let outcome = self
            .inner
            .orchestrator
            .dispatch(message, &mut snapshot, &mut conversation.history)
            .await;
        target.thinking(false);

        let failed = outcome.trace.had_failures();
        conversation.cache.store(snapshot);
        if failed {
            conversation.cache.expire();
        }
        conversation.last_trace = Some(outcome.trace.clone());

        let reply = match &outcome.result {
            Ok(reply) => reply.text.clone(),
            Err(e @ LunaError::AllProvidersExhausted { .. }) => {
                tracing::info!(code = e.error_code(), "Message not answered");
                e.user_notice()
            }
            Err(e) => {
                tracing::warn!(code = e.error_code(), error = %e, "Message not answered");
                e.user_notice()
            }
        };
        let render = self.inner.renderer.render(&reply);
        drop(conversation);
        transition(&DispatchState::Idle);

        Some(Answer { render, outcome })
    }

    async fn snapshot_for(&self, conversation: &mut Conversation) -> AvailabilitySnapshot {
        if let Some(snapshot) = conversation.cache.fresh() {
            tracing::debug!(available = snapshot.len(), "Reusing availability snapshot");
            return snapshot.clone();
        }
        transition(&DispatchState::Probing);
        self.inner
            .prober
            .probe_after(
                &self.inner.registry,
                &self.inner.credentials,
                conversation.cache.last(),
            )
            .await
    }

    /// Cancel the live render, if any.
    pub fn stop(&self) {
        self.inner.renderer.stop();
    }

    /// Status events from now on. `None` while an earlier receiver is alive.
    #[must_use]
    pub fn events(&self) -> Option<UnboundedReceiver<StatusEvent>> {
        self.inner.reporter.subscribe()
    }

    /// Latest reported state per provider.
    #[must_use]
    pub fn status_board(&self) -> StatusBoard {
        self.inner.reporter.board()
    }

    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.inner.renderer
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    /// The most recent availability snapshot, if any message was sent.
    pub async fn snapshot(&self) -> Option<AvailabilitySnapshot> {
        self.inner.conversation.lock().await.cache.last().cloned()
    }

    /// Attempts made for the most recent message.
    pub async fn last_trace(&self) -> Option<FallbackTrace> {
        self.inner.conversation.lock().await.last_trace.clone()
    }

    /// Number of exchanges currently kept as context.
    pub async fn history_len(&self) -> usize {
        self.inner.conversation.lock().await.history.len()
    }
}
