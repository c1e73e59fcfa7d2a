use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

use docchat_core::error::Result;
use docchat_core::traits::Embedder;
use docchat_core::types::Embedding;

/// Deterministic bag-of-words embedder for tests and offline runs.
///
/// Tokens are lowercased alphanumeric runs, each hashed into one of `dim`
/// buckets; the vector is L2-normalized. Empty text gives the zero vector.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self { Self::new(crate::FAKE_EMBEDDING_DIM) }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> Option<usize> { Some(self.dim) }

    async fn embed(&self, text: &str) -> Result<Embedding> { Ok(self.embed_sync(text)) }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}
