//! Configuration and on-disk locations.

pub mod config;
pub mod paths;

pub use config::{
    Config, ConfigSource, ConfigSources, ResolvedConfig, ENV_CADENCE_MS, ENV_CONFIG,
    ENV_CREDENTIALS, ENV_NO_COLOR_STD, ENV_PROBE_TIMEOUT, ENV_PROVIDER, ENV_TIMEOUT,
};
pub use paths::AppPaths;
