//! Failure classification, candidate planning and the per-message trace.
//!
//! The dispatcher runs one loop; this module decides what that loop does
//! after each failed attempt:
//!
//! | failure        | next step                                               |
//! |----------------|---------------------------------------------------------|
//! | timeout        | nearest higher-rank untried provider, once per message  |
//! | rate limited   | same provider, next reduced model; then like empty      |
//! | empty reply    | simplest lower-rank untried provider, else nearest higher |
//! | anything else  | stop                                                    |
//!
//! "Lower" and "higher" are positions in the registry's fixed preference
//! order, so providers sharing a rank keep their declaration order.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use super::availability::AvailabilitySnapshot;
use super::provider::{ProviderDescriptor, ProviderRegistry};
use crate::error::LunaError;

/// Error-body tokens that mean "quota or rate limit" across providers.
static QUOTA_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)insufficient_quota|rate_limit_exceeded|rate[ _-]?limit|resource_exhausted|quota|too many requests",
    )
    .expect("quota token pattern is valid")
});

/// Whether a non-2xx response signals a rate limit.
#[must_use]
pub fn is_rate_limited(status: u16, body: &str) -> bool {
    status == 429 || QUOTA_TOKENS.is_match(body)
}

// =============================================================================
// Failure Classification
// =============================================================================

/// What the dispatcher does about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    RateLimited,
    /// Soft pass: move on without surfacing anything.
    Empty,
    /// Stop dispatching.
    Fatal,
}

impl FailureClass {
    #[must_use]
    pub const fn of(error: &LunaError) -> Self {
        match error {
            LunaError::Timeout { .. } => Self::Timeout,
            LunaError::RateLimited { .. } => Self::RateLimited,
            LunaError::EmptyResponse { .. } => Self::Empty,
            _ => Self::Fatal,
        }
    }
}

// =============================================================================
// Attempt Trace
// =============================================================================

/// How one attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Timeout,
    RateLimited,
    Transport,
    EmptyResponse,
    Failed,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn of(result: &Result<String, LunaError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(LunaError::Timeout { .. }) => Self::Timeout,
            Err(LunaError::RateLimited { .. }) => Self::RateLimited,
            Err(LunaError::Transport { .. }) => Self::Transport,
            Err(LunaError::EmptyResponse { .. }) => Self::EmptyResponse,
            Err(_) => Self::Failed,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Transport => "transport",
            Self::EmptyResponse => "empty_response",
            Self::Failed => "failed",
        }
    }
}

/// Record of a single dispatch attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchAttempt {
    pub provider: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
}

/// All attempts made for one message, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FallbackTrace {
    pub attempts: Vec<DispatchAttempt>,
}

impl FallbackTrace {
    pub fn push(&mut self, attempt: DispatchAttempt) {
        self.attempts.push(attempt);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Whether any attempt did not succeed.
    #[must_use]
    pub fn had_failures(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome != AttemptOutcome::Success)
    }

    /// `provider/model:outcome` steps, for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{}/{}:{}", a.provider, a.model, a.outcome.as_str()))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

// =============================================================================
// Candidate Plan
// =============================================================================

/// Available providers in preference order, plus what was already tried.
#[derive(Debug)]
pub struct FallbackPlan<'a> {
    candidates: Vec<&'a ProviderDescriptor>,
    tried: HashSet<&'a str>,
    timeout_retry_used: bool,
}

impl<'a> FallbackPlan<'a> {
    /// Plan over the providers available in `snapshot`.
    #[must_use]
    pub fn new(registry: &'a ProviderRegistry, snapshot: &AvailabilitySnapshot) -> Self {
        let candidates = registry
            .ordered()
            .into_iter()
            .filter(|d| snapshot.is_available(&d.id))
            .collect();
        Self {
            candidates,
            tried: HashSet::new(),
            timeout_retry_used: false,
        }
    }

    /// The preferred provider if available, otherwise the simplest available one.
    #[must_use]
    pub fn primary(&self, preferred: Option<&str>) -> Option<&'a ProviderDescriptor> {
        preferred
            .and_then(|id| self.candidates.iter().find(|d| d.id == id))
            .or_else(|| self.candidates.first())
            .copied()
    }

    pub fn mark_tried(&mut self, provider: &'a ProviderDescriptor) {
        self.tried.insert(provider.id.as_str());
    }

    /// Next provider after `current` timed out. At most one per plan.
    pub fn after_timeout(&mut self, current: &ProviderDescriptor) -> Option<&'a ProviderDescriptor> {
        if self.timeout_retry_used {
            return None;
        }
        let next = self.higher_than(current).next();
        if next.is_some() {
            self.timeout_retry_used = true;
        }
        next
    }

    /// Next provider after `current` gave nothing usable.
    #[must_use]
    pub fn after_empty(&self, current: &ProviderDescriptor) -> Option<&'a ProviderDescriptor> {
        self.lower_than(current)
            .next()
            .or_else(|| self.higher_than(current).next())
    }

    #[must_use]
    pub const fn timeout_retry_used(&self) -> bool {
        self.timeout_retry_used
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn position(&self, provider: &ProviderDescriptor) -> Option<usize> {
        self.candidates.iter().position(|d| d.id == provider.id)
    }

    /// Untried candidates before `current`, simplest first.
    fn lower_than(
        &self,
        current: &ProviderDescriptor,
    ) -> impl Iterator<Item = &'a ProviderDescriptor> + '_ {
        let end = self.position(current).unwrap_or(0);
        self.candidates[..end]
            .iter()
            .copied()
            .filter(|d| !self.tried.contains(d.id.as_str()))
    }

    /// Untried candidates after `current`, nearest first.
    fn higher_than(
        &self,
        current: &ProviderDescriptor,
    ) -> impl Iterator<Item = &'a ProviderDescriptor> + '_ {
        let start = self
            .position(current)
            .map_or(self.candidates.len(), |p| p + 1);
        self.candidates[start..]
            .iter()
            .copied()
            .filter(|d| !self.tried.contains(d.id.as_str()))
    }
}
