//! Vector similarity used by the embedding-based strategies.

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 for mismatched lengths, empty vectors or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Mean cosine similarity of `v` against every vector in `others`.
pub fn mean_similarity(v: &[f32], others: &[Vec<f32>]) -> f64 {
    if others.is_empty() {
        return 0.0;
    }
    let total: f64 = others.iter().map(|o| cosine_similarity(v, o)).sum();
    total / others.len() as f64
}
