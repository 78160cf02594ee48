//! Error types for luna.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are grouped into four categories:
//! - **Configuration**: bad registry, bad config file, missing credentials
//! - **Network**: timeouts and non-2xx transport failures
//! - **Provider**: rate limits, empty replies, failed or exhausted dispatch
//! - **Internal**: I/O, JSON and unclassified errors
//!
//! Only two kinds ever reach the person typing: configuration errors (fatal
//! at startup, nothing is dispatched) and [`LunaError::AllProvidersExhausted`]
//! (rendered as the fixed [`NO_AI_AVAILABLE_NOTICE`]). Everything else is
//! either absorbed by the fallback chain or logged.

pub mod suggestions;

use thiserror::Error;

pub use suggestions::FixSuggestion;

/// Fixed notice shown when no provider produced a usable reply.
pub const NO_AI_AVAILABLE_NOTICE: &str = "No AI is available right now. Please try again later.";

/// Notice shown when a provider failed in a way the fallback chain does not cover.
pub const DISPATCH_FAILED_NOTICE: &str = "Luna could not get an answer this time. Please try again.";

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Registry, config file or credential problems.
    Configuration,
    /// Timeouts and transport failures.
    Network,
    /// Provider-side refusals, limits and exhaustion.
    Provider,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Network => "Network error",
            Self::Provider => "Provider error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Network => "N",
            Self::Provider => "P",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `luna` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid configuration or provider registry
    ConfigError = 2,
    /// Every provider was tried and none answered
    Exhausted = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for luna operations.
#[derive(Error, Debug)]
pub enum LunaError {
    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Invalid provider registry or resolved configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Config file exists but could not be parsed.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A provider that needs a credential has none; the provider is disabled.
    #[error("no credential configured for {provider}")]
    CredentialMissing { provider: String },

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// The request did not finish inside its timeout.
    #[error("request to {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// The provider answered with a non-2xx status or the connection failed.
    #[error("transport error from {provider}: {message}")]
    Transport {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    // ==========================================================================
    // Provider errors (Category: Provider)
    // ==========================================================================
    /// Availability probe failed; the provider is excluded from this round.
    #[error("probe failed for {provider}: {reason}")]
    ProbeFailure { provider: String, reason: String },

    /// The provider reported a quota or rate-limit condition.
    #[error("rate limited by {provider} ({model}): {message}")]
    RateLimited {
        provider: String,
        model: String,
        message: String,
    },

    /// 2xx response without usable content (soft pass, never shown).
    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    /// A provider failed in a way the fallback chain does not recover from.
    #[error("dispatch to {provider} failed: {message}")]
    DispatchFailed { provider: String, message: String },

    /// Every candidate was tried without a usable reply.
    #[error("all providers exhausted after {attempts} attempt(s)")]
    AllProvidersExhausted { attempts: usize },

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LunaError {
    /// Shorthand for a [`LunaError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Configuration { .. } | Self::ConfigParse { .. } => ExitCode::ConfigError,

            Self::AllProvidersExhausted { .. } => ExitCode::Exhausted,

            Self::Timeout { .. } => ExitCode::Timeout,

            Self::CredentialMissing { .. }
            | Self::Transport { .. }
            | Self::ProbeFailure { .. }
            | Self::RateLimited { .. }
            | Self::EmptyResponse { .. }
            | Self::DispatchFailed { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. }
            | Self::ConfigParse { .. }
            | Self::CredentialMissing { .. } => ErrorCategory::Configuration,

            Self::Timeout { .. } | Self::Transport { .. } => ErrorCategory::Network,

            Self::ProbeFailure { .. }
            | Self::RateLimited { .. }
            | Self::EmptyResponse { .. }
            | Self::DispatchFailed { .. }
            | Self::AllProvidersExhausted { .. } => ErrorCategory::Provider,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `LUNA-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "LUNA-C001",
            Self::ConfigParse { .. } => "LUNA-C002",
            Self::CredentialMissing { .. } => "LUNA-C003",

            Self::Timeout { .. } => "LUNA-N001",
            Self::Transport { .. } => "LUNA-N002",

            Self::ProbeFailure { .. } => "LUNA-P001",
            Self::RateLimited { .. } => "LUNA-P002",
            Self::EmptyResponse { .. } => "LUNA-P003",
            Self::DispatchFailed { .. } => "LUNA-P010",
            Self::AllProvidersExhausted { .. } => "LUNA-P020",

            Self::Io(_) => "LUNA-X001",
            Self::Json(_) => "LUNA-X002",
            Self::Other(_) => "LUNA-X099",
        }
    }

    /// Whether the fallback chain may recover from this error locally.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::EmptyResponse { .. }
        )
    }

    /// Whether this error may be shown to the person chatting.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::ConfigParse { .. }
                | Self::AllProvidersExhausted { .. }
        )
    }

    /// Whether this error is a dispatch result whose [`Self::user_notice`]
    /// has already been rendered in the transcript. The CLI only turns it
    /// into an exit code.
    #[must_use]
    pub const fn is_rendered_as_notice(&self) -> bool {
        matches!(
            self,
            Self::DispatchFailed { .. } | Self::AllProvidersExhausted { .. }
        )
    }

    /// Text rendered in the chat transcript when a message fails.
    ///
    /// Raw provider errors never reach the transcript.
    #[must_use]
    pub fn user_notice(&self) -> String {
        match self {
            Self::AllProvidersExhausted { .. } => NO_AI_AVAILABLE_NOTICE.to_string(),
            Self::Configuration { .. } | Self::ConfigParse { .. } => self.to_string(),
            _ => DISPATCH_FAILED_NOTICE.to_string(),
        }
    }

    /// Returns the provider id if this error is provider-specific.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::CredentialMissing { provider }
            | Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::ProbeFailure { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::EmptyResponse { provider }
            | Self::DispatchFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::Configuration { message } => suggestions::configuration_suggestions(message),
            Self::ConfigParse { path, message } => {
                suggestions::config_parse_suggestions(path, message)
            }
            Self::CredentialMissing { provider } => {
                suggestions::credential_missing_suggestions(provider)
            }
            Self::Timeout { provider, seconds } => {
                suggestions::timeout_suggestions(provider, *seconds)
            }
            Self::Transport {
                provider,
                status,
                message,
            } => suggestions::transport_suggestions(provider, *status, message),
            Self::ProbeFailure { provider, reason } => {
                suggestions::probe_failure_suggestions(provider, reason)
            }
            Self::RateLimited { provider, .. } => suggestions::rate_limited_suggestions(provider),
            Self::EmptyResponse { provider } => vec![FixSuggestion::new(
                vec![format!("luna say --provider {provider} \"hello\"")],
                format!("{provider} answered without any text. Luna moves on to another provider."),
            )],
            Self::DispatchFailed { provider, message } => vec![FixSuggestion::new(
                vec!["luna probe".to_string()],
                format!("{provider} failed: {message}"),
            )],
            Self::AllProvidersExhausted { attempts } => {
                suggestions::exhausted_suggestions(*attempts)
            }
            Self::Io(err) => vec![FixSuggestion::new(
                vec!["# Check file permissions and disk space".to_string()],
                format!("I/O error: {err}."),
            )],
            Self::Json(err) => vec![FixSuggestion::new(
                vec!["luna probe".to_string()],
                format!("JSON error: {err}. A provider may have changed its response format."),
            )],
            Self::Other(err) => vec![FixSuggestion::new(
                vec!["luna probe".to_string()],
                format!("Unexpected error: {err}. Please report this issue."),
            )],
        }
    }
}

/// Result type alias for luna operations.
pub type Result<T> = std::result::Result<T, LunaError>;

// =============================================================================
// Tests
// =============================================================================
