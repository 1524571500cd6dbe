//! Layered configuration loader and typed settings.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RERANK__API_KEY`). Every section
//! has defaults, so an absent file yields a usable [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Defaults overlaid with a TOML document; no files or env involved.
    pub fn from_toml_str(toml: &str) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub storage: StorageSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be positive".into()));
        }
        if r.lexical_pool_size == 0 {
            return Err(Error::InvalidConfig("retrieval.lexical_pool_size must be positive".into()));
        }
        if r.embed_timeout_ms == 0 || r.vector_timeout_ms == 0 || self.rerank.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be finite and non-zero".into()));
        }
        if self.embedding.text.dim == 0 || self.embedding.image.dim == 0 {
            return Err(Error::InvalidConfig("embedding dimensions must be positive".into()));
        }
        if self.cache.backend == CacheBackendKind::Sqlite && self.cache.path.trim().is_empty() {
            return Err(Error::InvalidConfig("cache.path is required for the sqlite backend".into()));
        }
        if self.storage.text_collection == self.storage.image_collection {
            return Err(Error::InvalidConfig("text and image collections must differ".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub rrf_k: u32,
    pub lexical_pool_size: usize,
    pub rerank_top_n: usize,
    pub embed_timeout_ms: u64,
    pub vector_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            rrf_k: 60,
            lexical_pool_size: 100,
            rerank_top_n: 10,
            embed_timeout_ms: 30_000,
            vector_timeout_ms: 10_000,
        }
    }
}

impl RetrievalSettings {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn vector_timeout(&self) -> Duration {
        Duration::from_millis(self.vector_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "rerank-v3.5".to_string(),
            endpoint: "https://api.cohere.com/v2/rerank".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RerankSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where cached results live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process-local map; entries vanish on exit.
    Memory,
    /// SQLite file at `cache.path`, shared across processes.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub backend: CacheBackendKind,
    pub path: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            backend: CacheBackendKind::Sqlite,
            path: "./storage/cache.db".to_string(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub use_fake: bool,
    pub text: EmbeddingEndpoint,
    pub image: EmbeddingEndpoint,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            use_fake: false,
            text: EmbeddingEndpoint {
                endpoint: "https://api.openai.com/v1/embeddings".to_string(),
                model: "text-embedding-3-small".to_string(),
                dim: 1536,
                api_key: String::new(),
            },
            image: EmbeddingEndpoint {
                endpoint: "https://api.jina.ai/v1/embeddings".to_string(),
                model: "jina-clip-v1".to_string(),
                dim: 768,
                api_key: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingEndpoint {
    pub endpoint: String,
    pub model: String,
    pub dim: usize,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub text_collection: String,
    pub image_collection: String,
    pub documents_dir: String,
    pub file_url_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            lancedb_dir: "./storage/lancedb".to_string(),
            text_collection: "text_chunks".to_string(),
            image_collection: "image_chunks".to_string(),
            documents_dir: "./storage/documents".to_string(),
            file_url_prefix: "/api/kb/documents".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
