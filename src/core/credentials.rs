//! Provider credentials.
//!
//! Credentials come from a small JSON document mapping provider ids to
//! secrets:
//!
//! ```json
//! { "openai": "sk-...", "groq": "gsk_..." }
//! ```
//!
//! Loading never fails. A missing or broken file simply means no credentialed
//! provider is usable, which the prober handles by never contacting them.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::error::LunaError;

/// An API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Read-only map of provider id to secret.
#[derive(Clone, Default)]
pub struct CredentialSet {
    secrets: HashMap<String, Secret>,
}

impl CredentialSet {
    /// Load credentials from `path`, falling back to an empty set.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No credentials file");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read credentials file");
                return Self::default();
            }
        };
        match Self::from_json(&content) {
            Ok(set) => {
                tracing::debug!(path = %path.display(), count = set.len(), "Loaded credentials");
                set
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Malformed credentials file");
                Self::default()
            }
        }
    }

    /// Parse a credentials document.
    ///
    /// # Errors
    /// Returns an error when `content` is not a JSON object.
    pub fn from_json(content: &str) -> crate::error::Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(map) = value else {
            return Err(LunaError::config("credentials document must be a JSON object"));
        };

        let mut secrets = HashMap::new();
        for (id, value) in map {
            match value {
                Value::String(secret) if !secret.trim().is_empty() => {
                    secrets.insert(id, Secret(secret.trim().to_string()));
                }
                Value::String(_) => {}
                _ => {
                    let err = LunaError::CredentialMissing { provider: id };
                    tracing::warn!(
                        provider = err.provider().unwrap_or_default(),
                        code = err.error_code(),
                        "Ignoring non-string credential"
                    );
                }
            }
        }
        Ok(Self { secrets })
    }

    /// Build a set from `(id, secret)` pairs. Blank secrets are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let secrets = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k, Secret(v)))
            .collect();
        Self { secrets }
    }

    #[must_use]
    pub fn get(&self, provider: &str) -> Option<&Secret> {
        self.secrets.get(provider)
    }

    #[must_use]
    pub fn has(&self, provider: &str) -> bool {
        self.secrets.contains_key(provider)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<_> = self.secrets.keys().collect();
        providers.sort();
        f.debug_struct("CredentialSet")
            .field("providers", &providers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_string_secrets_and_skips_blank_or_invalid() {
        let set = CredentialSet::from_json(
            r#"{ "openai": "sk-test", "groq": "   ", "gemini": 42 }"#,
        )
        .unwrap();
        assert!(set.has("openai"));
        assert!(!set.has("groq"));
        assert!(!set.has("gemini"));
        assert_eq!(set.get("openai").unwrap().expose(), "sk-test");
    }

    #[test]
    fn missing_file_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let set = CredentialSet::load(&dir.path().join("nope.json"));
        assert!(set.is_empty());
    }

    #[test]
    fn malformed_file_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(CredentialSet::load(&path).is_empty());

        std::fs::write(&path, r#"["sk-test"]"#).unwrap();
        assert!(CredentialSet::load(&path).is_empty());
    }

    #[test]
    fn loads_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{ "groq": "gsk_123" }"#).unwrap();
        let set = CredentialSet::load(&path);
        assert_eq!(set.len(), 1);
        assert!(set.has("groq"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let set = CredentialSet::from_pairs([("openai", "sk-very-secret")]);
        let debug = format!("{set:?} {:?}", set.get("openai").unwrap());
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("openai"));
    }
}
