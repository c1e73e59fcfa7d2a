//! Maximal Marginal Relevance selection.
//!
//! score(c) = λ × sim(c, query) − (1 − λ) × max(sim(c, s) for s in selected)
//!
//! λ = 1.0 is pure relevance, λ = 0.0 pure diversity.

use docchat_core::similarity::cosine_similarity;

/// Indices into `candidates`, in selection order, at most `k` of them.
///
/// Candidates are expected in decreasing relevance; on an exact tie the
/// earlier candidate wins.
pub fn mmr_select<V: AsRef<[f32]>>(query: &[f32], candidates: &[V], k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(candidates.len());
    let relevance: Vec<f32> = candidates.iter().map(|c| cosine_similarity(query, c.as_ref())).collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(candidates[idx].as_ref(), candidates[s].as_ref()))
                .fold(None, |acc: Option<f32>, x| Some(acc.map_or(x, |a| a.max(x))))
                .unwrap_or(0.0);
            let score = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        selected.push(remaining.remove(best_pos));
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_relevance_keeps_similarity_order() {
        let q: [f32; 2] = [1.0, 0.0];
        let c: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];
        assert_eq!(mmr_select(&q, &c, 3, 1.0), vec![0, 1, 2]);
    }

    #[test]
    fn diversity_skips_near_duplicates() {
        let q: [f32; 2] = [1.0, 1.0];
        let c: Vec<Vec<f32>> = vec![vec![1.0, 0.9], vec![1.0, 0.85], vec![0.2, 1.0]];
        assert_eq!(mmr_select(&q, &c, 2, 0.5), vec![0, 2]);
    }

    #[test]
    fn ties_keep_candidate_order() {
        let q: [f32; 2] = [1.0, 0.0];
        let c: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(mmr_select(&q, &c, 2, 0.5), vec![0, 1]);
        assert_eq!(mmr_select(&q, &c, 3, 0.0), vec![0, 1, 2]);
    }

    #[test]
    fn k_bounds() {
        let q: [f32; 2] = [1.0, 0.0];
        let c: Vec<Vec<f32>> = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(mmr_select(&q, &c, 5, 0.5).len(), 2);
        assert!(mmr_select(&q, &c, 0, 0.5).is_empty());
        assert!(mmr_select::<Vec<f32>>(&q, &[], 3, 0.5).is_empty());
    }
}
