use std::sync::Arc;
use tracing::debug;

use docchat_core::config::RetrievalSettings;
use docchat_core::error::{Error, Result};
use docchat_core::remote::CallGuard;
use docchat_core::traits::{Collection, Embedder};
use docchat_core::types::RetrievalResult;

use crate::mmr::mmr_select;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverConfig {
    pub k: usize,
    /// Candidates fetched before MMR; never fewer than `k`.
    pub fetch_k: usize,
    pub lambda: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self { Self { k: 3, fetch_k: 20, lambda: 0.5 } }
}

impl From<&RetrievalSettings> for RetrieverConfig {
    fn from(s: &RetrievalSettings) -> Self { Self { k: s.k, fetch_k: s.fetch_k, lambda: s.lambda } }
}

/// Diversity-aware similarity search over one collection. Read-only.
pub struct Retriever {
    collection: Arc<dyn Collection>,
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
    guard: CallGuard,
}

impl Retriever {
    pub fn new(collection: Arc<dyn Collection>, embedder: Arc<dyn Embedder>, config: RetrieverConfig, guard: CallGuard) -> Self {
        Self { collection, embedder, config, guard }
    }

    pub fn collection_name(&self) -> &str { self.collection.name() }
    pub fn config(&self) -> RetrieverConfig { self.config }

    /// Up to `k` documents; fewer only when the collection holds fewer.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Ok(RetrievalResult::default());
        }
        let query_vec = self.guard.run("embed query", self.embedder.embed(query)).await?;
        let fetch = self.config.fetch_k.max(k);
        let candidates = self
            .guard
            .run("search collection", self.collection.nearest(&query_vec, fetch))
            .await
            .map_err(|e| self.wrap(e))?;
        if let Some(c) = candidates.iter().find(|c| c.embedding.len() != query_vec.len()) {
            return Err(Error::DimensionMismatch { expected: c.embedding.len(), actual: query_vec.len() });
        }

        let vectors: Vec<&[f32]> = candidates.iter().map(|c| c.embedding.as_slice()).collect();
        let picked = mmr_select(&query_vec, &vectors, k, self.config.lambda);
        debug!(collection = %self.collection.name(), candidates = candidates.len(), selected = picked.len(), "mmr retrieval");
        Ok(RetrievalResult::from_documents(picked.into_iter().map(|i| candidates[i].to_document()).collect()))
    }

    /// Store-side failures become retrieval errors; everything else keeps its kind.
    fn wrap(&self, e: Error) -> Error {
        match e {
            Error::Store { message, .. } | Error::Connection { message, .. } => Error::Retrieval { collection: self.collection.name().to_string(), message },
            other => other,
        }
    }
}
