//! Availability probing.
//!
//! Before a message is dispatched every eligible provider gets a tiny
//! "ping" request. Providers that answer with usable text inside the probe
//! timeout make up the [`AvailabilitySnapshot`] the dispatcher draws from.
//! Providers that need a credential and have none are never contacted.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::credentials::CredentialSet;
use super::events::{ProviderState, StatusReporter};
use super::history::ConversationHistory;
use super::http::{Call, ProviderClient};
use super::provider::{ProviderDescriptor, ProviderRegistry};
use crate::error::LunaError;

/// Prompt sent by probes.
pub const PROBE_PROMPT: &str = "ping";

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Snapshot
// =============================================================================

/// Providers reachable right now, and which one answered last.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailabilitySnapshot {
    available: BTreeSet<String>,
    most_recently_used: Option<String>,
    taken_at: Option<DateTime<Utc>>,
}

impl AvailabilitySnapshot {
    /// Snapshot with exactly `ids` available.
    pub fn from_available<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            available: ids.into_iter().collect(),
            most_recently_used: None,
            taken_at: Some(Utc::now()),
        }
    }

    #[must_use]
    pub fn is_available(&self, id: &str) -> bool {
        self.available.contains(id)
    }

    /// Available ids in lexical order.
    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(String::as_str)
    }

    #[must_use]
    pub fn most_recently_used(&self) -> Option<&str> {
        self.most_recently_used.as_deref()
    }

    /// Mark the provider that produced the last reply.
    pub fn set_most_recently_used(&mut self, id: &str) {
        self.most_recently_used = Some(id.to_string());
    }

    #[must_use]
    pub const fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.available.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// State to report for `id`. Offline wins over the MRU marker.
    #[must_use]
    pub fn state_of(&self, id: &str) -> ProviderState {
        if !self.is_available(id) {
            ProviderState::Offline
        } else if self.most_recently_used.as_deref() == Some(id) {
            ProviderState::MostRecentlyUsed
        } else {
            ProviderState::Available
        }
    }
}

/// Outcome of probing one provider, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub provider: String,
    pub available: bool,
    /// Why the provider was excluded, if it was.
    pub reason: Option<String>,
    pub duration_ms: u64,
}

// =============================================================================
// Prober
// =============================================================================

#[derive(Debug, Clone)]
pub struct Prober {
    client: ProviderClient,
    timeout: Duration,
    reporter: Option<StatusReporter>,
}

impl Prober {
    #[must_use]
    pub const fn new(client: ProviderClient, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            reporter: None,
        }
    }

    /// Emit a status event per provider after each probe round.
    #[must_use]
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Probe every eligible provider concurrently.
    pub async fn probe(
        &self,
        registry: &ProviderRegistry,
        credentials: &CredentialSet,
    ) -> AvailabilitySnapshot {
        self.probe_after(registry, credentials, None).await
    }

    /// Probe, carrying the most-recently-used marker over from `previous`.
    pub async fn probe_after(
        &self,
        registry: &ProviderRegistry,
        credentials: &CredentialSet,
        previous: Option<&AvailabilitySnapshot>,
    ) -> AvailabilitySnapshot {
        let results = self.probe_all(registry, credentials).await;

        let mut snapshot = AvailabilitySnapshot::from_available(
            results
                .iter()
                .filter(|r| r.available)
                .map(|r| r.provider.clone()),
        );
        if let Some(mru) = previous.and_then(AvailabilitySnapshot::most_recently_used) {
            snapshot.set_most_recently_used(mru);
        }

        tracing::debug!(
            available = ?snapshot.available().collect::<Vec<_>>(),
            probed = results.len(),
            "Availability snapshot"
        );

        if let Some(reporter) = &self.reporter {
            for descriptor in registry.iter() {
                reporter.emit(&descriptor.id, snapshot.state_of(&descriptor.id));
            }
        }
        snapshot
    }

    /// Probe every eligible provider and return one result per registered provider.
    pub async fn probe_all(
        &self,
        registry: &ProviderRegistry,
        credentials: &CredentialSet,
    ) -> Vec<ProbeResult> {
        let futures: Vec<_> = registry
            .iter()
            .map(|descriptor| self.probe_one(descriptor, credentials))
            .collect();
        futures::future::join_all(futures).await
    }

    async fn probe_one(
        &self,
        descriptor: &ProviderDescriptor,
        credentials: &CredentialSet,
    ) -> ProbeResult {
        let credential = credentials.get(&descriptor.id);
        if descriptor.requires_credential && credential.is_none() {
            let err = LunaError::CredentialMissing {
                provider: descriptor.id.clone(),
            };
            tracing::debug!(provider = %descriptor.id, code = err.error_code(), "Not probing");
            return ProbeResult {
                provider: descriptor.id.clone(),
                available: false,
                reason: Some("no credential".to_string()),
                duration_ms: 0,
            };
        }

        let history = ConversationHistory::default();
        let start = Instant::now();
        let result = self
            .client
            .complete(Call {
                descriptor,
                model: &descriptor.model,
                credential,
                history: &history,
                prompt: PROBE_PROMPT,
                timeout: self.timeout,
            })
            .await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => {
                tracing::debug!(provider = %descriptor.id, duration_ms, "Probe succeeded");
                ProbeResult {
                    provider: descriptor.id.clone(),
                    available: true,
                    reason: None,
                    duration_ms,
                }
            }
            Err(e) => {
                let failure = LunaError::ProbeFailure {
                    provider: descriptor.id.clone(),
                    reason: e.to_string(),
                };
                tracing::debug!(
                    provider = %descriptor.id,
                    duration_ms,
                    code = failure.error_code(),
                    error = %e,
                    "Probe failed"
                );
                ProbeResult {
                    provider: descriptor.id.clone(),
                    available: false,
                    reason: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }
}

// =============================================================================
// Snapshot Cache
// =============================================================================

/// Reuses a snapshot for a while instead of probing on every message.
///
/// A zero TTL disables caching.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    ttl: Duration,
    entry: Option<(tokio::time::Instant, AvailabilitySnapshot)>,
    expired: bool,
}

impl SnapshotCache {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: None,
            expired: false,
        }
    }

    /// A snapshot younger than the TTL, if any.
    #[must_use]
    pub fn fresh(&self) -> Option<&AvailabilitySnapshot> {
        if self.ttl.is_zero() || self.expired {
            return None;
        }
        self.entry
            .as_ref()
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, snapshot)| snapshot)
    }

    /// Most recent snapshot regardless of age.
    #[must_use]
    pub fn last(&self) -> Option<&AvailabilitySnapshot> {
        self.entry.as_ref().map(|(_, snapshot)| snapshot)
    }

    pub fn store(&mut self, snapshot: AvailabilitySnapshot) {
        self.entry = Some((tokio::time::Instant::now(), snapshot));
        self.expired = false;
    }

    /// Make the next message probe again. The snapshot stays available as `last`.
    pub fn expire(&mut self) {
        self.expired = true;
    }
}
