//! Configuration file loading and layered resolution.
//!
//! Loads configuration from:
//! - Linux: `~/.config/luna/config.toml`
//! - macOS: `~/Library/Application Support/chat.luna.luna/config.toml`
//! - Windows: `%APPDATA%/luna/luna/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `LUNA_PROVIDER`: Preferred provider id
//! - `LUNA_TIMEOUT`: Per-request timeout in seconds
//! - `LUNA_PROBE_TIMEOUT`: Availability probe timeout in seconds
//! - `LUNA_CADENCE_MS`: Delay between revealed characters
//! - `LUNA_CONFIG`: Override config file path
//! - `LUNA_CREDENTIALS`: Override credentials file path
//! - `NO_COLOR`: Disable colors

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::Cli;
use crate::core::provider::{AuthScheme, WireFormat, builtin_descriptors};
use crate::error::{LunaError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

pub const ENV_PROVIDER: &str = "LUNA_PROVIDER";
pub const ENV_TIMEOUT: &str = "LUNA_TIMEOUT";
pub const ENV_PROBE_TIMEOUT: &str = "LUNA_PROBE_TIMEOUT";
pub const ENV_CADENCE_MS: &str = "LUNA_CADENCE_MS";
pub const ENV_CONFIG: &str = "LUNA_CONFIG";
pub const ENV_CREDENTIALS: &str = "LUNA_CREDENTIALS";
/// Standard environment variable to disable colors.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";

const TIMEOUT_BOUNDS: (u64, u64) = (1, 300);
const CADENCE_BOUNDS: (u64, u64) = (1, 1000);
const HISTORY_BOUNDS: (u64, u64) = (1, 50);

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Provider tried first when it is available.
    pub default_provider: Option<String>,
    /// Timeout for each dispatch attempt.
    pub request_timeout: Duration,
    /// Timeout for each availability probe.
    pub probe_timeout: Duration,
    /// How long a probe snapshot is reused. Zero re-probes every message.
    pub probe_cache_ttl: Duration,
    /// Exchanges sent with each request.
    pub history_limit: usize,
    /// Delay before each revealed character.
    pub cadence: Duration,
    /// Appended to a render that was cut short.
    pub truncation_marker: String,
    /// Registry additions and overrides.
    pub providers: ProvidersConfig,
    pub credentials_path: PathBuf,
    pub no_color: bool,
    pub verbose: bool,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub default_provider: ConfigSource,
    pub request_timeout: ConfigSource,
    pub probe_timeout: ConfigSource,
    pub cadence: ConfigSource,
    pub credentials_path: ConfigSource,
    pub no_color: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is out of bounds or names an unknown provider
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = Self::load_config(cli)?;
        config.validate()?;

        let mut sources = ConfigSources::default();

        let default_provider =
            Self::resolve_default_provider(cli, &config, &mut sources.default_provider);
        let request_timeout = Self::resolve_seconds(
            cli.timeout,
            ENV_TIMEOUT,
            config.dispatch.timeout_seconds,
            &mut sources.request_timeout,
        );
        let probe_timeout = Self::resolve_seconds(
            None,
            ENV_PROBE_TIMEOUT,
            config.probe.timeout_seconds,
            &mut sources.probe_timeout,
        );
        let cadence = Self::resolve_cadence(&config, &mut sources.cadence);
        let credentials_path =
            Self::resolve_credentials_path(cli, &config, &mut sources.credentials_path);
        let no_color = Self::resolve_no_color(cli, &config, &mut sources.no_color);

        let resolved = Self {
            default_provider,
            request_timeout,
            probe_timeout,
            probe_cache_ttl: Duration::from_secs(config.probe.cache_seconds),
            history_limit: config.dispatch.history_limit,
            cadence,
            truncation_marker: config.render.truncation_marker.clone(),
            providers: config.providers.clone(),
            credentials_path,
            no_color,
            verbose: cli.verbose,
            sources,
        };
        resolved.validate(&config)?;

        tracing::debug!(
            default_provider = ?resolved.default_provider,
            timeout_source = %resolved.sources.request_timeout,
            credentials = %resolved.credentials_path.display(),
            "Resolved configuration"
        );
        Ok(resolved)
    }

    /// Resolution from a config value alone, ignoring CLI and environment.
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let file_or_default = |is_set: bool| {
            if is_set {
                ConfigSource::ConfigFile
            } else {
                ConfigSource::Default
            }
        };
        Ok(Self {
            default_provider: config.general.default_provider.clone(),
            request_timeout: Duration::from_secs(config.dispatch.timeout_seconds),
            probe_timeout: Duration::from_secs(config.probe.timeout_seconds),
            probe_cache_ttl: Duration::from_secs(config.probe.cache_seconds),
            history_limit: config.dispatch.history_limit,
            cadence: Duration::from_millis(config.render.cadence_ms),
            truncation_marker: config.render.truncation_marker.clone(),
            providers: config.providers.clone(),
            credentials_path: config
                .general
                .credentials_file
                .clone()
                .unwrap_or_else(|| AppPaths::new().credentials_file()),
            no_color: !config.render.color,
            verbose: false,
            sources: ConfigSources {
                default_provider: file_or_default(config.general.default_provider.is_some()),
                credentials_path: file_or_default(config.general.credentials_file.is_some()),
                request_timeout: ConfigSource::ConfigFile,
                probe_timeout: ConfigSource::ConfigFile,
                cadence: ConfigSource::ConfigFile,
                no_color: ConfigSource::ConfigFile,
            },
        })
    }

    /// Load config file, respecting `--config` and `LUNA_CONFIG`.
    fn load_config(cli: &Cli) -> Result<Config> {
        if let Some(path) = &cli.config {
            return Config::load_from(path);
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return Config::load_from(Path::new(&path));
        }
        Config::load()
    }

    fn resolve_default_provider(
        cli: &Cli,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Option<String> {
        // 1. CLI flag
        if let Some(provider) = &cli.provider {
            *source = ConfigSource::Cli;
            return Some(provider.trim().to_lowercase());
        }

        // 2. Environment variable
        if let Some(provider) = Self::env_non_empty(ENV_PROVIDER) {
            *source = ConfigSource::Env;
            return Some(provider.to_lowercase());
        }

        // 3. Config file
        if let Some(provider) = &config.general.default_provider {
            *source = ConfigSource::ConfigFile;
            return Some(provider.clone());
        }

        // 4. Default: first available by rank
        *source = ConfigSource::Default;
        None
    }

    fn resolve_seconds(
        cli_value: Option<u64>,
        env_var: &str,
        file_value: u64,
        source: &mut ConfigSource,
    ) -> Duration {
        if let Some(seconds) = cli_value {
            *source = ConfigSource::Cli;
            return Duration::from_secs(seconds);
        }

        if let Some(value) = Self::env_non_empty(env_var) {
            match value.parse::<u64>() {
                Ok(seconds) => {
                    *source = ConfigSource::Env;
                    return Duration::from_secs(seconds);
                }
                Err(_) => tracing::warn!(var = env_var, %value, "Ignoring non-numeric value"),
            }
        }

        *source = ConfigSource::ConfigFile;
        Duration::from_secs(file_value)
    }

    fn resolve_cadence(config: &Config, source: &mut ConfigSource) -> Duration {
        if let Some(value) = Self::env_non_empty(ENV_CADENCE_MS) {
            match value.parse::<u64>() {
                Ok(ms) => {
                    *source = ConfigSource::Env;
                    return Duration::from_millis(ms);
                }
                Err(_) => tracing::warn!(var = ENV_CADENCE_MS, %value, "Ignoring non-numeric value"),
            }
        }
        *source = ConfigSource::ConfigFile;
        Duration::from_millis(config.render.cadence_ms)
    }

    fn resolve_credentials_path(cli: &Cli, config: &Config, source: &mut ConfigSource) -> PathBuf {
        if let Some(path) = &cli.credentials {
            *source = ConfigSource::Cli;
            return path.clone();
        }
        if let Some(path) = Self::env_non_empty(ENV_CREDENTIALS) {
            *source = ConfigSource::Env;
            return PathBuf::from(path);
        }
        if let Some(path) = &config.general.credentials_file {
            *source = ConfigSource::ConfigFile;
            return path.clone();
        }
        *source = ConfigSource::Default;
        AppPaths::new().credentials_file()
    }

    fn resolve_no_color(cli: &Cli, config: &Config, source: &mut ConfigSource) -> bool {
        if cli.no_color {
            *source = ConfigSource::Cli;
            return true;
        }
        if std::env::var_os(ENV_NO_COLOR_STD).is_some() {
            *source = ConfigSource::Env;
            return true;
        }
        if !config.render.color {
            *source = ConfigSource::ConfigFile;
            return true;
        }
        *source = ConfigSource::Default;
        false
    }

    fn env_non_empty(var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Re-check bounds after CLI and env overrides were applied.
    fn validate(&self, config: &Config) -> Result<()> {
        check_range(
            "Timeout",
            self.request_timeout.as_secs(),
            TIMEOUT_BOUNDS,
            "seconds",
        )?;
        check_range(
            "Probe timeout",
            self.probe_timeout.as_secs(),
            TIMEOUT_BOUNDS,
            "seconds",
        )?;
        check_range(
            "Cadence",
            u64::try_from(self.cadence.as_millis()).unwrap_or(u64::MAX),
            CADENCE_BOUNDS,
            "milliseconds",
        )?;
        if let Some(id) = &self.default_provider {
            config.check_known_provider(id)?;
        }
        Ok(())
    }
}

fn check_range(name: &str, value: u64, (min, max): (u64, u64), unit: &str) -> Result<()> {
    if value < min || value > max {
        return Err(LunaError::config(format!(
            "{name} must be between {min} and {max} {unit} (got {value})"
        )));
    }
    Ok(())
}

// =============================================================================
// Config File Model
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub dispatch: DispatchConfig,
    pub probe: ProbeConfig,
    pub render: RenderConfig,
    pub providers: ProvidersConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Provider tried first when available.
    pub default_provider: Option<String>,
    /// Credentials document location.
    pub credentials_file: Option<PathBuf>,
}

/// Dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Timeout for each attempt in seconds.
    pub timeout_seconds: u64,
    /// Number of previous exchanges sent along.
    pub history_limit: usize,
}

/// Availability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_seconds: u64,
    /// Reuse a snapshot this many seconds. 0 re-probes every message.
    pub cache_seconds: u64,
}

/// Typing renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub cadence_ms: u64,
    pub truncation_marker: String,
    pub color: bool,
}

/// Registry additions and overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Extra providers, appended after the built-in ones.
    pub custom: Vec<CustomProvider>,
    /// Field overrides for built-in providers, keyed by id.
    pub overrides: BTreeMap<String, ProviderOverride>,
}

/// A provider declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProvider {
    pub id: String,
    pub display_name: Option<String>,
    pub endpoint: String,
    /// Defaults to bearer.
    pub auth: Option<AuthScheme>,
    pub format: WireFormat,
    /// Defaults to the format's usual reply location.
    pub extraction: Option<String>,
    pub complexity_rank: u8,
    /// Defaults to `true` unless `auth` is none.
    pub requires_credential: Option<bool>,
    pub model: String,
    #[serde(default)]
    pub reduced_models: Vec<String>,
}

/// Fields of a built-in provider that may be changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub reduced_models: Option<Vec<String>>,
    pub complexity_rank: Option<u8>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            history_limit: crate::core::history::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            cache_seconds: 0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 15,
            truncation_marker: "…".to_string(),
            color: true,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    ///
    /// # Errors
    /// See [`Self::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    /// Returns [`LunaError::ConfigParse`] when the file is not valid TOML, or
    /// an I/O error when it exists but cannot be read.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LunaError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| LunaError::config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - Timeouts are within 1-300 seconds
    /// - Cadence is within 1-1000 milliseconds
    /// - History limit is within 1-50
    /// - The truncation marker is not empty
    /// - The default provider, if set, is built in or declared here
    ///
    /// # Errors
    /// Returns [`LunaError::Configuration`] describing the first failed check.
    pub fn validate(&self) -> Result<()> {
        check_range("Timeout", self.dispatch.timeout_seconds, TIMEOUT_BOUNDS, "seconds")?;
        check_range("Probe timeout", self.probe.timeout_seconds, TIMEOUT_BOUNDS, "seconds")?;
        check_range("Cadence", self.render.cadence_ms, CADENCE_BOUNDS, "milliseconds")?;
        check_range(
            "History limit",
            self.dispatch.history_limit as u64,
            HISTORY_BOUNDS,
            "exchanges",
        )?;

        if self.render.truncation_marker.is_empty() {
            return Err(LunaError::config("Truncation marker must not be empty"));
        }

        if let Some(id) = &self.general.default_provider {
            self.check_known_provider(id)?;
        }

        Ok(())
    }

    /// All provider ids this config can produce.
    #[must_use]
    pub fn known_provider_ids(&self) -> Vec<String> {
        builtin_descriptors()
            .into_iter()
            .map(|d| d.id)
            .chain(self.providers.custom.iter().map(|c| c.id.clone()))
            .collect()
    }

    fn check_known_provider(&self, id: &str) -> Result<()> {
        let known = self.known_provider_ids();
        if known.iter().any(|k| k == id) {
            Ok(())
        } else {
            Err(LunaError::config(format!(
                "Unknown provider \"{id}\". Known providers: {}",
                known.join(", ")
            )))
        }
    }
}
