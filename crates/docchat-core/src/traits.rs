use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CollectionRecord, Embedding};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:models/gemini-embedding-001`).
    fn embedder_id(&self) -> &str;
    /// Expected dimensionality, if the provider fixes one up front.
    fn dim(&self) -> Option<usize>;
    /// Embed a query.
    async fn embed(&self, text: &str) -> Result<Embedding>;
    /// Embed documents, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;
    /// Append one new record per entry. No conflict detection.
    async fn add_records(&self, records: Vec<CollectionRecord>) -> Result<()>;
    async fn count(&self) -> Result<usize>;
    /// Up to `n` records by decreasing cosine similarity to `query`, embeddings included.
    async fn nearest(&self, query: &[f32], n: usize) -> Result<Vec<CollectionRecord>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &str;
    /// Idempotent: the same name always resolves to the same store-side collection.
    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>>;
    async fn close(&self) -> Result<()> { Ok(()) }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    /// One request, one response, deterministic decoding.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Turns the bytes of one file into text.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<String>;
}
