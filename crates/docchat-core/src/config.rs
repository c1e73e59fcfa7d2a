//! Settings loader, credentials and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_STORE__BACKEND`).
//! Credentials are read separately from the plain provider variables and are
//! validated before anything touches the network.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const CHROMADB_API_KEY: &str = "CHROMADB_API_KEY";
pub const TENANT_ID: &str = "TENANT_ID";
pub const DATABASE_ID: &str = "DATABASE_ID";
pub const FAKE_EMBEDDINGS_VAR: &str = "APP_USE_FAKE_EMBEDDINGS";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a helpful AI assistant. Use the following context to help you answer the question. \
If the context is not relevant to the question, answer from your own knowledge.

Context:
{context}

Question: {query}

Answer:";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub collection: CollectionSettings,
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub dir: String,
    pub pattern: String,
}

impl Default for CorpusSettings {
    fn default() -> Self { Self { dir: "./data".to_string(), pattern: "**/*.txt".to_string() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub name: String,
}

impl Default for CollectionSettings {
    fn default() -> Self { Self { name: "my-rag-collection".to_string() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Chroma,
    Lance,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub chroma_url: String,
    pub lance_uri: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Chroma,
            chroma_url: "https://api.trychroma.com".to_string(),
            lance_uri: "./data/lancedb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub base_url: String,
    pub batch_size: usize,
    pub dimension: Option<usize>,
    /// Use the deterministic offline embedder instead of Gemini.
    pub fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "models/gemini-embedding-001".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            batch_size: 100,
            dimension: None,
            fake: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub prompt_template: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { k: 3, fetch_k: 20, lambda: 0.5 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self { Self { timeout_secs: 60 } }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl Settings {
    /// Load settings for the environment named by `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let settings: Settings = figment.extract().map_err(|e| {
            let field = e.path.join(".");
            Error::config(if field.is_empty() { "settings".to_string() } else { field }, e.to_string())
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.name.trim().is_empty() {
            return Err(Error::config("collection.name", "must not be empty"));
        }
        if self.corpus.pattern.trim().is_empty() {
            return Err(Error::config("corpus.pattern", "must not be empty"));
        }
        if self.retrieval.k == 0 {
            return Err(Error::config("retrieval.k", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.lambda) {
            return Err(Error::config("retrieval.lambda", format!("{} is outside 0.0..=1.0", self.retrieval.lambda)));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding.batch_size", "must be at least 1"));
        }
        if self.remote.timeout_secs == 0 {
            return Err(Error::config("remote.timeout_secs", "must be at least 1"));
        }
        for placeholder in ["{context}", "{query}"] {
            if !self.generation.prompt_template.contains(placeholder) {
                return Err(Error::config("generation.prompt_template", format!("missing {placeholder} placeholder")));
            }
        }
        Ok(())
    }
}

/// Whether `lookup` sets `APP_USE_FAKE_EMBEDDINGS` to `1` or `true`.
pub fn fake_embeddings_requested<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(FAKE_EMBEDDINGS_VAR).map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[derive(Clone)]
pub struct ChromaCredentials {
    pub api_key: String,
    pub tenant: String,
    pub database: String,
}

/// Secrets read from the process environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub chroma: Option<ChromaCredentials>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "***"))
            .field("chroma", &self.chroma.as_ref().map(|c| (&c.tenant, &c.database)))
            .finish()
    }
}

/// Which credentials a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub google: bool,
    pub chroma: bool,
}

impl Requirements {
    pub fn for_settings(settings: &Settings, needs_generation: bool) -> Self {
        Self {
            google: needs_generation || !settings.embedding.fake,
            chroma: settings.store.backend == StoreBackend::Chroma,
        }
    }
}

impl Credentials {
    pub fn from_env(required: Requirements) -> Result<Self> {
        Self::from_lookup(required, |key| env::var(key).ok())
    }

    /// Resolve credentials through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(required: Requirements, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(key, "required environment variable is not set"))
        };

        let google_api_key = if required.google { Some(fetch(GOOGLE_API_KEY)?) } else { None };
        let chroma = if required.chroma {
            Some(ChromaCredentials { api_key: fetch(CHROMADB_API_KEY)?, tenant: fetch(TENANT_ID)?, database: fetch(DATABASE_ID)? })
        } else {
            None
        };
        Ok(Self { google_api_key, chroma })
    }

    pub fn google(&self) -> Result<&str> {
        self.google_api_key.as_deref().ok_or_else(|| Error::config(GOOGLE_API_KEY, "required environment variable is not set"))
    }

    pub fn chroma(&self) -> Result<&ChromaCredentials> {
        self.chroma.as_ref().ok_or_else(|| Error::config(CHROMADB_API_KEY, "required environment variable is not set"))
    }
}

/// Load `.env` from the working directory or a parent into the process
/// environment. Variables already set win. Returns the file used, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
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
