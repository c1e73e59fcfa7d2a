//! Vector similarity shared by the in-memory store and MMR selection.

use crate::error::{Error, Result};
use crate::types::Embedding;

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero-magnitude vectors are similar to nothing.
///
/// Lengths are not checked here; callers compare dimensions first.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let (ma, mb) = (magnitude(a), magnitude(b));
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    dot / (ma * mb)
}

/// Every vector must have the same length, and the configured one if set.
pub fn check_dimensions(vectors: &[Embedding], expected: Option<usize>) -> Result<()> {
    let Some(expected) = expected.or_else(|| vectors.first().map(Vec::len)) else { return Ok(()) };
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(Error::DimensionMismatch { expected, actual: v.len() }),
        None => Ok(()),
    }
}
