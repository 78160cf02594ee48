//! Dispatch orchestrator.
//!
//! Sends one message to the best available provider and walks the fallback
//! plan when that fails. Attempts are strictly sequential; the first usable
//! reply wins.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::availability::AvailabilitySnapshot;
use super::credentials::CredentialSet;
use super::events::{ProviderState, StatusReporter};
use super::fallback::{AttemptOutcome, DispatchAttempt, FailureClass, FallbackPlan, FallbackTrace};
use super::history::ConversationHistory;
use super::http::{Call, ProviderClient};
use super::provider::{ProviderDescriptor, ProviderRegistry};
use crate::error::LunaError;

/// Default per-attempt timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one message, logged at debug on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Probing,
    Dispatching { provider: String, model: String },
    FallingBack { from: String, reason: &'static str },
    Succeeded { provider: String },
    Exhausted,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Probing => write!(f, "probing"),
            Self::Dispatching { provider, model } => write!(f, "dispatching({provider}/{model})"),
            Self::FallingBack { from, reason } => write!(f, "falling_back({from}: {reason})"),
            Self::Succeeded { provider } => write!(f, "succeeded({provider})"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Log a state transition.
pub fn transition(state: &DispatchState) {
    tracing::debug!(state = %state, "Dispatch state");
}

fn last_outcome(trace: &FallbackTrace) -> &'static str {
    trace
        .attempts
        .last()
        .map_or(AttemptOutcome::Failed.as_str(), |a| a.outcome.as_str())
}

/// A usable reply and who produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    pub provider: String,
    pub model: String,
    pub text: String,
}

/// Result of dispatching one message, with every attempt made.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub result: Result<DispatchReply, LunaError>,
    pub trace: FallbackTrace,
}

impl DispatchOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    credentials: Arc<CredentialSet>,
    client: ProviderClient,
    request_timeout: Duration,
    preferred: Option<String>,
    reporter: Option<StatusReporter>,
}

impl Orchestrator {
    #[must_use]
    pub const fn new(
        registry: Arc<ProviderRegistry>,
        credentials: Arc<CredentialSet>,
        client: ProviderClient,
    ) -> Self {
        Self {
            registry,
            credentials,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            preferred: None,
            reporter: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Provider to try first when it is available.
    #[must_use]
    pub fn with_preferred(mut self, provider: Option<String>) -> Self {
        self.preferred = provider;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Dispatch `message`, falling back across available providers.
    ///
    /// On success the winner becomes the snapshot's most recently used
    /// provider and the exchange is appended to `history`.
    pub async fn dispatch(
        &self,
        message: &str,
        snapshot: &mut AvailabilitySnapshot,
        history: &mut ConversationHistory,
    ) -> DispatchOutcome {
        let registry = Arc::clone(&self.registry);
        let mut plan = FallbackPlan::new(&registry, snapshot);
        let mut trace = FallbackTrace::default();

        let Some(mut current) = plan.primary(self.preferred.as_deref()) else {
            tracing::info!("No provider available");
            return self.exhausted(trace);
        };
        let mut variant = 0usize;

        loop {
            plan.mark_tried(current);
            let model = current
                .model_variants()
                .nth(variant)
                .unwrap_or(current.model.as_str())
                .to_string();
            transition(&DispatchState::Dispatching {
                provider: current.id.clone(),
                model: model.clone(),
            });

            let result = self.attempt(current, &model, message, history, &mut trace).await;

            let error = match result {
                Ok(text) => {
                    snapshot.set_most_recently_used(&current.id);
                    history.push(message, text.clone());
                    self.emit(&current.id, ProviderState::MostRecentlyUsed);
                    transition(&DispatchState::Succeeded {
                        provider: current.id.clone(),
                    });
                    return DispatchOutcome {
                        result: Ok(DispatchReply {
                            provider: current.id.clone(),
                            model,
                            text,
                        }),
                        trace,
                    };
                }
                Err(e) => e,
            };

            self.emit(&current.id, ProviderState::Offline);

            let next = match FailureClass::of(&error) {
                FailureClass::Timeout => {
                    let next = plan.after_timeout(current);
                    if next.is_none() {
                        tracing::info!(
                            provider = %current.id,
                            retry_used = plan.timeout_retry_used(),
                            "Timed out with no retry left"
                        );
                        return self.exhausted(trace);
                    }
                    next
                }
                FailureClass::RateLimited if variant + 1 < current.max_attempts() => {
                    variant += 1;
                    tracing::info!(provider = %current.id, variant, "Rate limited, trying reduced model");
                    transition(&DispatchState::FallingBack {
                        from: current.id.clone(),
                        reason: "rate_limited",
                    });
                    continue;
                }
                FailureClass::RateLimited | FailureClass::Empty => {
                    tracing::info!(
                        provider = %current.id,
                        outcome = last_outcome(&trace),
                        "Passing to next provider"
                    );
                    plan.after_empty(current)
                }
                FailureClass::Fatal => {
                    tracing::warn!(provider = %current.id, error = %error, "Dispatch failed");
                    return DispatchOutcome {
                        result: Err(LunaError::DispatchFailed {
                            provider: current.id.clone(),
                            message: error.to_string(),
                        }),
                        trace,
                    };
                }
            };

            match next {
                Some(next) => {
                    transition(&DispatchState::FallingBack {
                        from: current.id.clone(),
                        reason: last_outcome(&trace),
                    });
                    current = next;
                    variant = 0;
                }
                None => return self.exhausted(trace),
            }
        }
    }

    async fn attempt(
        &self,
        descriptor: &ProviderDescriptor,
        model: &str,
        message: &str,
        history: &ConversationHistory,
        trace: &mut FallbackTrace,
    ) -> Result<String, LunaError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let result = self
            .client
            .complete(Call {
                descriptor,
                model,
                credential: self.credentials.get(&descriptor.id),
                history,
                prompt: message,
                timeout: self.request_timeout,
            })
            .await;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let outcome = AttemptOutcome::of(&result);
        tracing::info!(
            provider = %descriptor.id,
            model,
            duration_ms,
            outcome = outcome.as_str(),
            "Dispatch attempt"
        );
        trace.push(DispatchAttempt {
            provider: descriptor.id.clone(),
            model: model.to_string(),
            started_at,
            duration_ms,
            outcome,
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    fn exhausted(&self, trace: FallbackTrace) -> DispatchOutcome {
        transition(&DispatchState::Exhausted);
        tracing::info!(attempts = trace.len(), trace = %trace.summary(), "All providers exhausted");
        DispatchOutcome {
            result: Err(LunaError::AllProvidersExhausted {
                attempts: trace.len(),
            }),
            trace,
        }
    }

    fn emit(&self, provider: &str, state: ProviderState) {
        if let Some(reporter) = &self.reporter {
            reporter.emit(provider, state);
        }
    }
}
