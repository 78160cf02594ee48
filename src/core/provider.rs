//! Provider descriptors and registry.
//!
//! A descriptor carries everything the dispatcher needs to talk to one
//! backend: endpoint, auth scheme, request shape, where the reply text lives
//! in the response, and how "simple" the backend is relative to the others.
//! The registry is built once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{LunaError, Result};
use crate::storage::config::{CustomProvider, ProviderOverride, ProvidersConfig};

/// Reduced model variants beyond this count are ignored by the dispatcher.
pub const MAX_REDUCED_MODELS: usize = 2;

/// Placeholder in endpoints that is replaced with the model name.
pub const MODEL_PLACEHOLDER: &str = "{model}";

// =============================================================================
// Auth / Wire Format
// =============================================================================

/// How the credential is attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <secret>`
    Bearer,
    /// `<header>: <secret>`
    Header(String),
    /// No credential is sent.
    None,
}

impl AuthScheme {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Bearer => "bearer".to_string(),
            Self::Header(name) => format!("header {name}"),
            Self::None => "none".to_string(),
        }
    }
}

/// Request body template a provider understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// OpenAI-style `{"model", "messages": [...]}`.
    ChatCompletions,
    /// Gemini-style `{"contents": [{"role", "parts": [...]}]}`.
    GenerateContent,
}

impl WireFormat {
    /// Reply location used when a descriptor does not set one.
    #[must_use]
    pub const fn default_extraction(self) -> &'static str {
        match self {
            Self::ChatCompletions => "/choices/0/message/content",
            Self::GenerateContent => "/candidates/0/content/parts/0/text",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat-completions",
            Self::GenerateContent => "generate-content",
        }
    }
}

// =============================================================================
// Provider Descriptor
// =============================================================================

/// Immutable description of one LLM backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    /// Stable identifier, also the credentials-file key.
    pub id: String,
    pub display_name: String,
    /// Request URL. May contain `{model}`.
    pub endpoint: String,
    pub auth: AuthScheme,
    pub format: WireFormat,
    /// JSON pointer to the reply text in a successful response.
    pub extraction: String,
    /// Lower is simpler. Drives primary choice and fallback direction.
    pub complexity_rank: u8,
    pub requires_credential: bool,
    /// Primary model.
    pub model: String,
    /// Cheaper variants tried after a rate limit, in order.
    pub reduced_models: Vec<String>,
}

impl ProviderDescriptor {
    /// Request URL for `model`.
    #[must_use]
    pub fn endpoint_for(&self, model: &str) -> String {
        self.endpoint.replace(MODEL_PLACEHOLDER, model)
    }

    /// Primary model followed by at most [`MAX_REDUCED_MODELS`] reduced variants.
    pub fn model_variants(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.model.as_str()).chain(
            self.reduced_models
                .iter()
                .take(MAX_REDUCED_MODELS)
                .map(String::as_str),
        )
    }

    /// Upper bound on attempts against this provider in one dispatch.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        1 + self.reduced_models.len().min(MAX_REDUCED_MODELS)
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LunaError::config("provider id must not be empty"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(LunaError::config(format!(
                "provider '{}' has an empty endpoint",
                self.id
            )));
        }
        if self.model.trim().is_empty() {
            return Err(LunaError::config(format!(
                "provider '{}' has no model",
                self.id
            )));
        }
        validate_pointer(&self.extraction).map_err(|reason| {
            LunaError::config(format!(
                "provider '{}' has an invalid extraction rule '{}': {reason}",
                self.id, self.extraction
            ))
        })
    }
}

/// Checks that `pointer` is a non-empty RFC 6901 JSON pointer.
fn validate_pointer(pointer: &str) -> std::result::Result<(), &'static str> {
    if pointer.is_empty() {
        return Err("empty");
    }
    if !pointer.starts_with('/') {
        return Err("must start with '/'");
    }
    let mut chars = pointer.chars();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0' | '1')) {
            return Err("'~' must be followed by '0' or '1'");
        }
    }
    Ok(())
}

// =============================================================================
// Built-in Providers
// =============================================================================

/// Built-in backends in their fixed preference order.
#[must_use]
pub fn builtin_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor {
            id: "ollama".to_string(),
            display_name: "Ollama (local)".to_string(),
            endpoint: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            auth: AuthScheme::None,
            format: WireFormat::ChatCompletions,
            extraction: WireFormat::ChatCompletions.default_extraction().to_string(),
            complexity_rank: 1,
            requires_credential: false,
            model: "llama3.2".to_string(),
            reduced_models: Vec::new(),
        },
        ProviderDescriptor {
            id: "groq".to_string(),
            display_name: "Groq".to_string(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            auth: AuthScheme::Bearer,
            format: WireFormat::ChatCompletions,
            extraction: WireFormat::ChatCompletions.default_extraction().to_string(),
            complexity_rank: 2,
            requires_credential: true,
            model: "llama-3.1-8b-instant".to_string(),
            reduced_models: Vec::new(),
        },
        ProviderDescriptor {
            id: "gemini".to_string(),
            display_name: "Gemini".to_string(),
            endpoint:
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
                    .to_string(),
            auth: AuthScheme::Header("x-goog-api-key".to_string()),
            format: WireFormat::GenerateContent,
            extraction: WireFormat::GenerateContent.default_extraction().to_string(),
            complexity_rank: 3,
            requires_credential: true,
            model: "gemini-1.5-flash".to_string(),
            reduced_models: vec!["gemini-1.5-flash-8b".to_string()],
        },
        ProviderDescriptor {
            id: "openai".to_string(),
            display_name: "OpenAI".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            auth: AuthScheme::Bearer,
            format: WireFormat::ChatCompletions,
            extraction: WireFormat::ChatCompletions.default_extraction().to_string(),
            complexity_rank: 4,
            requires_credential: true,
            model: "gpt-4o".to_string(),
            reduced_models: vec!["gpt-4o-mini".to_string(), "gpt-3.5-turbo".to_string()],
        },
    ]
}

impl CustomProvider {
    fn into_descriptor(self) -> ProviderDescriptor {
        let auth = self.auth.unwrap_or(AuthScheme::Bearer);
        let requires_credential = self
            .requires_credential
            .unwrap_or(auth != AuthScheme::None);
        ProviderDescriptor {
            display_name: self.display_name.unwrap_or_else(|| self.id.clone()),
            extraction: self
                .extraction
                .unwrap_or_else(|| self.format.default_extraction().to_string()),
            id: self.id,
            endpoint: self.endpoint,
            auth,
            format: self.format,
            complexity_rank: self.complexity_rank,
            requires_credential,
            model: self.model,
            reduced_models: self.reduced_models,
        }
    }
}

impl ProviderOverride {
    fn apply(&self, descriptor: &mut ProviderDescriptor) {
        if let Some(endpoint) = &self.endpoint {
            descriptor.endpoint.clone_from(endpoint);
        }
        if let Some(model) = &self.model {
            descriptor.model.clone_from(model);
        }
        if let Some(reduced) = &self.reduced_models {
            descriptor.reduced_models.clone_from(reduced);
        }
        if let Some(rank) = self.complexity_rank {
            descriptor.complexity_rank = rank;
        }
    }
}

// =============================================================================
// Provider Registry
// =============================================================================

/// Validated, immutable set of provider descriptors.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    /// Declaration order; `ordered()` sorts a view of this.
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Validate `descriptors` and build the registry.
    ///
    /// # Errors
    /// Returns [`LunaError::Configuration`] on duplicate ids, empty endpoints
    /// or malformed extraction rules.
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            descriptor.validate()?;
            if !seen.insert(descriptor.id.as_str()) {
                return Err(LunaError::config(format!(
                    "duplicate provider id '{}'",
                    descriptor.id
                )));
            }
        }
        Ok(Self { descriptors })
    }

    /// Registry with only the built-in providers.
    ///
    /// # Errors
    /// Never fails for the shipped table; the signature matches [`Self::new`].
    pub fn builtin() -> Result<Self> {
        Self::new(builtin_descriptors())
    }

    /// Built-in providers with config overrides applied, followed by custom ones.
    ///
    /// # Errors
    /// Returns [`LunaError::Configuration`] when an override names an unknown
    /// provider or the combined set fails validation.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut descriptors = builtin_descriptors();

        for (id, over) in &config.overrides {
            let descriptor = descriptors
                .iter_mut()
                .find(|d| &d.id == id)
                .ok_or_else(|| {
                    LunaError::config(format!("override for unknown provider '{id}'"))
                })?;
            over.apply(descriptor);
        }

        descriptors.extend(
            config
                .custom
                .iter()
                .cloned()
                .map(CustomProvider::into_descriptor),
        );

        Self::new(descriptors)
    }

    /// Get descriptor by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Iterate descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptors by complexity rank, ties in declaration order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&ProviderDescriptor> {
        let mut ordered: Vec<_> = self.descriptors.iter().collect();
        ordered.sort_by_key(|d| d.complexity_rank);
        ordered
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
