//! Test utilities for luna.
//!
//! Factories for provider descriptors, registries pointed at a mock server,
//! fast configurations, plus a temp-dir helper and assertion macros.
//!
//! # Usage
//!
//! ```rust,ignore
//! use luna::test_utils::*;
//!
//! let registry = make_mock_registry(&server.uri(), &[("alpha", 1), ("beta", 2)]);
//! let config = make_fast_config();
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::core::provider::{AuthScheme, ProviderDescriptor, ProviderRegistry, WireFormat};
use crate::core::wire;
use crate::storage::config::{Config, ResolvedConfig};

/// Model name every test descriptor uses.
pub const TEST_MODEL: &str = "test-model";

// =============================================================================
// Provider Factories
// =============================================================================

/// Chat-completions descriptor with no auth.
#[must_use]
pub fn make_test_descriptor(id: &str, rank: u8, endpoint: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        endpoint: endpoint.to_string(),
        auth: AuthScheme::None,
        format: WireFormat::ChatCompletions,
        extraction: WireFormat::ChatCompletions.default_extraction().to_string(),
        complexity_rank: rank,
        requires_credential: false,
        model: TEST_MODEL.to_string(),
        reduced_models: Vec::new(),
    }
}

/// Request path a mock provider answers on.
#[must_use]
pub fn mock_path(id: &str) -> String {
    format!("/{id}/v1/chat/completions")
}

/// Registry of `(id, rank)` providers, all served by `base_uri`.
///
/// # Panics
///
/// Panics on duplicate ids.
#[must_use]
pub fn make_mock_registry(base_uri: &str, providers: &[(&str, u8)]) -> ProviderRegistry {
    let descriptors = providers
        .iter()
        .map(|(id, rank)| make_test_descriptor(id, *rank, &format!("{base_uri}{}", mock_path(id))))
        .collect();
    ProviderRegistry::new(descriptors).expect("test registry is valid")
}

/// Successful chat-completions body carrying `text`.
#[must_use]
pub fn chat_reply(text: &str) -> Value {
    wire::sample_response(WireFormat::ChatCompletions, text)
}

/// Defaults with short timeouts and a 1 ms cadence.
///
/// # Panics
///
/// Panics if the default configuration fails validation.
#[must_use]
pub fn make_fast_config() -> ResolvedConfig {
    let mut config =
        ResolvedConfig::from_config(&Config::default()).expect("default config is valid");
    config.request_timeout = Duration::from_secs(2);
    config.probe_timeout = Duration::from_secs(2);
    config.cadence = Duration::from_millis(1);
    config
}

/// A config file registering `providers` as custom providers at `base_uri`
/// and pointing the built-in local provider at a path nothing answers.
#[must_use]
pub fn make_test_config_toml(base_uri: &str, providers: &[(&str, u8)]) -> String {
    let mut toml = format!(
        "[dispatch]\ntimeout_seconds = 5\n\n[probe]\ntimeout_seconds = 5\n\n[render]\ncadence_ms = 1\ncolor = false\n\n\
         [providers.overrides.ollama]\nendpoint = \"{base_uri}/offline/v1/chat/completions\"\n"
    );
    for (id, rank) in providers {
        toml.push_str(&format!(
            "\n[[providers.custom]]\nid = \"{id}\"\nendpoint = \"{base_uri}{}\"\nformat = \"chat_completions\"\n\
             auth = {{ type = \"none\" }}\ncomplexity_rank = {rank}\nmodel = \"{TEST_MODEL}\"\n",
            mock_path(id)
        ));
    }
    toml
}

// =============================================================================
// Temporary Directory
// =============================================================================

/// Temporary directory removed on drop.
///
/// ```rust,ignore
/// let dir = TestDir::new();
/// dir.create_file("credentials.json", r#"{"groq": "gsk"}"#);
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file with `content`, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
        path
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Strip ANSI escape codes from a string.
#[must_use]
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
