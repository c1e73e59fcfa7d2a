//! docchat-embed
//!
//! Embedding providers: the remote Gemini embedder used in production and a
//! deterministic hashing embedder for tests and offline development.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use docchat_core::config::{Credentials, EmbeddingSettings};
use docchat_core::error::Result;
use docchat_core::traits::Embedder;

pub mod fake;
pub mod gemini;

pub use fake::FakeEmbedder;
pub use gemini::{GeminiClient, GeminiEmbedder};

pub const FAKE_EMBEDDING_DIM: usize = 1024;

/// Gemini embedder, or [`FakeEmbedder`] when `embedding.fake` is set
/// (`APP_USE_FAKE_EMBEDDINGS=1` turns it on at startup).
pub fn get_default_embedder(settings: &EmbeddingSettings, credentials: &Credentials, timeout: Duration) -> Result<Arc<dyn Embedder>> {
    if settings.fake {
        let dim = settings.dimension.unwrap_or(FAKE_EMBEDDING_DIM);
        info!(dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    let embedder = GeminiEmbedder::new(settings, credentials.google()?, timeout)?;
    info!(model = %settings.model, "using Gemini embeddings");
    Ok(Arc::new(embedder))
}
