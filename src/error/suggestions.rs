//! Fix suggestions for luna errors.
//!
//! Maps error kinds to copy-paste commands, a short explanation and, where it
//! helps, a prevention tip. Shown by `luna` on fatal errors and in verbose logs.

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FixSuggestion {
    /// Fix commands in order of preference.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention: Option<String>,

    /// Link to documentation for more information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
            doc_url: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }

    /// Builder: adds documentation URL.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }
}

/// Where a provider's API keys are issued.
#[must_use]
pub fn credential_doc_for_provider(id: &str) -> Option<&'static str> {
    match id {
        "openai" => Some("https://platform.openai.com/api-keys"),
        "groq" => Some("https://console.groq.com/keys"),
        "gemini" => Some("https://aistudio.google.com/app/apikey"),
        "ollama" => Some("https://ollama.com/download"),
        _ => None,
    }
}

// =============================================================================
// Suggestion Generators
// =============================================================================

#[must_use]
pub fn configuration_suggestions(message: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["luna providers".to_string()],
            format!("The provider registry or configuration is invalid: {message}. Nothing is sent until it is fixed."),
        )
        .with_prevention("Give every custom provider a unique id, a non-empty endpoint and a reply path starting with '/'."),
    ]
}

#[must_use]
pub fn config_parse_suggestions(path: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("$EDITOR {path}"), format!("mv {path} {path}.bak")],
        format!("The config file at {path} is not valid TOML: {message}."),
    )]
}

/// Suggestions for a provider that is disabled for lack of a credential.
#[must_use]
pub fn credential_missing_suggestions(provider: &str) -> Vec<FixSuggestion> {
    let mut suggestion = FixSuggestion::new(
        vec!["luna providers".to_string()],
        format!(
            "{provider} needs an API key and none is configured, so it is never probed or contacted. \
             Add \"{provider}\": \"<key>\" to the credentials file."
        ),
    );
    if let Some(url) = credential_doc_for_provider(provider) {
        suggestion = suggestion.with_doc_url(url);
    }
    vec![suggestion]
}

#[must_use]
pub fn timeout_suggestions(provider: &str, seconds: u64) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("luna --timeout {} say \"hello\"", seconds * 2), "luna probe".to_string()],
            format!("{provider} did not answer within {seconds}s."),
        )
        .with_prevention("Raise `dispatch.timeout_seconds` in the config file for slow local models."),
    ]
}

#[must_use]
pub fn transport_suggestions(provider: &str, status: Option<u16>, message: &str) -> Vec<FixSuggestion> {
    let context = match status {
        Some(401 | 403) => format!("{provider} rejected the credential (HTTP {}). Check the key in the credentials file.", status.unwrap_or_default()),
        Some(code) => format!("{provider} answered HTTP {code}: {message}."),
        None => format!("Could not reach {provider}: {message}."),
    };
    vec![FixSuggestion::new(vec!["luna probe".to_string()], context)]
}

#[must_use]
pub fn probe_failure_suggestions(provider: &str, reason: &str) -> Vec<FixSuggestion> {
    let mut commands = vec!["luna probe".to_string()];
    if provider == "ollama" {
        commands.insert(0, "ollama serve".to_string());
    }
    vec![FixSuggestion::new(
        commands,
        format!("{provider} did not pass its availability check ({reason}) and is skipped for this round."),
    )]
}

#[must_use]
pub fn rate_limited_suggestions(provider: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["luna probe".to_string()],
            format!("{provider} reported a quota or rate limit. Luna retries with its smaller models first."),
        )
        .with_prevention("Check the billing page of the provider, or lower usage of the largest model."),
    ]
}

#[must_use]
pub fn exhausted_suggestions(attempts: usize) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec!["luna probe".to_string(), "luna -v say \"hello\"".to_string()],
            format!("No provider produced a reply after {attempts} attempt(s)."),
        )
        .with_prevention("Keep a local model running (`ollama serve`) so at least one provider is always reachable."),
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_suggestion_builder() {
        let suggestion = FixSuggestion::new(vec!["cmd1".to_string()], "Test context")
            .with_prevention("Prevent tip")
            .with_doc_url("https://example.com");

        assert_eq!(suggestion.commands, vec!["cmd1"]);
        assert_eq!(suggestion.context, "Test context");
        assert_eq!(suggestion.prevention, Some("Prevent tip".to_string()));
        assert_eq!(suggestion.doc_url, Some("https://example.com".to_string()));
    }

    #[test]
    fn credential_suggestions_link_key_pages() {
        let suggestions = credential_missing_suggestions("groq");
        assert!(suggestions[0].context.contains("groq"));
        assert_eq!(
            suggestions[0].doc_url.as_deref(),
            Some("https://console.groq.com/keys")
        );
        assert!(credential_missing_suggestions("custom")[0].doc_url.is_none());
    }

    #[test]
    fn timeout_suggestions_double_the_timeout() {
        let suggestions = timeout_suggestions("groq", 30);
        assert!(suggestions[0].context.contains("30s"));
        assert!(suggestions[0].commands[0].contains("--timeout 60"));
    }

    #[test]
    fn unauthorized_transport_mentions_credential() {
        let suggestions = transport_suggestions("openai", Some(401), "unauthorized");
        assert!(suggestions[0].context.contains("credential"));
        let suggestions = transport_suggestions("openai", None, "connection refused");
        assert!(suggestions[0].context.contains("Could not reach"));
    }

    #[test]
    fn ollama_probe_failure_suggests_serve() {
        let suggestions = probe_failure_suggestions("ollama", "connection refused");
        assert_eq!(suggestions[0].commands[0], "ollama serve");
    }
}
