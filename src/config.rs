use crate::models::MatchThresholds;
use crate::services::embeddings::{DEFAULT_EMBEDDING_ENDPOINT, DEFAULT_EMBEDDING_MODEL};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "BENEFIT_MATCH";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

/// External embedding provider; no api_key means semantic matching is unavailable
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, if it is not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            api_key: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_endpoint() -> String { DEFAULT_EMBEDDING_ENDPOINT.to_string() }
fn default_embedding_model() -> String { DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_timeout() -> u64 { 15 }

/// Sizes and lifetimes of the in-process caches; 0 entries disables a cache
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_embedding_max_entries")]
    pub embedding_max_entries: usize,
    #[serde(default = "default_embedding_ttl")]
    pub embedding_ttl_secs: u64,
    #[serde(default = "default_match_max_entries")]
    pub match_max_entries: usize,
    #[serde(default = "default_match_ttl")]
    pub match_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            embedding_max_entries: default_embedding_max_entries(),
            embedding_ttl_secs: default_embedding_ttl(),
            match_max_entries: default_match_max_entries(),
            match_ttl_secs: default_match_ttl(),
        }
    }
}

fn default_embedding_max_entries() -> usize { 1000 }
fn default_embedding_ttl() -> u64 { 3600 }
fn default_match_max_entries() -> usize { 500 }
fn default_match_ttl() -> u64 { 600 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_page_check_threshold")]
    pub page_check_threshold: f64,
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_savings_ceiling")]
    pub savings_ceiling_minor: u64,
    /// Optional TOML file extending the built-in tier tables
    pub tiers_file: Option<String>,
}

impl MatchingSettings {
    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            page_check_similarity: self.page_check_threshold,
            search_similarity: self.search_threshold,
            top_k: self.top_k,
            fuzzy_score: self.fuzzy_threshold,
            savings_ceiling_minor: self.savings_ceiling_minor,
        }
    }
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            page_check_threshold: default_page_check_threshold(),
            search_threshold: default_search_threshold(),
            top_k: default_top_k(),
            fuzzy_threshold: default_fuzzy_threshold(),
            savings_ceiling_minor: default_savings_ceiling(),
            tiers_file: None,
        }
    }
}

fn default_page_check_threshold() -> f64 { 0.7 }
fn default_search_threshold() -> f64 { 0.5 }
fn default_top_k() -> usize { 5 }
fn default_fuzzy_threshold() -> f64 { 80.0 }
fn default_savings_ceiling() -> u64 { 500_000 }

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
    /// 1. Defaults on the structs
    /// 2. config/default.toml, then config/local.toml
    /// 3. Environment variables, e.g. BENEFIT_MATCH__MATCHING__TOP_K -> matching.top_k
    /// 4. OPENAI_API_KEY, when no embedding key is set
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        let settings = substitute_env_vars(settings)?;
        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        let settings = substitute_env_vars(settings)?;
        settings.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Fill the embedding key from the provider's conventional variable
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    let has_key = settings
        .get_string("embedding.api_key")
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);

    let fallback = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());

    match fallback {
        Some(key) if !has_key => Config::builder()
            .add_source(settings)
            .set_override("embedding.api_key", key)?
            .build(),
        _ => Ok(settings),
    }
}
