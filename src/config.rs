use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::DEFAULT_MAX_ATTEMPTS;

/// `database.url` value selecting the in-process store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub collections: CollectionSettings,
    #[serde(default)]
    pub sequence: SequenceSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

impl DatabaseSettings {
    pub fn is_memory(&self) -> bool {
        self.url.trim().eq_ignore_ascii_case(MEMORY_DATABASE_URL)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_requests_collection")]
    pub requests: String,
    #[serde(default = "default_providers_collection")]
    pub providers: String,
    #[serde(default = "default_matches_collection")]
    pub matches: String,
    #[serde(default = "default_counters_collection")]
    pub counters: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            requests: default_requests_collection(),
            providers: default_providers_collection(),
            matches: default_matches_collection(),
            counters: default_counters_collection(),
        }
    }
}

fn default_requests_collection() -> String { "care_requests".to_string() }
fn default_providers_collection() -> String { "caregivers".to_string() }
fn default_matches_collection() -> String { "matches".to_string() }
fn default_counters_collection() -> String { "counters".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 { DEFAULT_MAX_ATTEMPTS }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. config/default.toml
    /// 2. config/local.toml (development overrides)
    /// 3. Environment variables prefixed with CAREMATCH
    /// 4. DATABASE_URL for `database.url`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CAREMATCH__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        apply_overrides(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        apply_overrides(settings)?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CAREMATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Well-known variables that take precedence over the prefixed ones
fn apply_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        builder = builder.set_override("auth.jwt_secret", secret)?;
    }

    builder.build()
}
