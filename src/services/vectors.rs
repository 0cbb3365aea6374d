//! Vector math used across the matching pipeline.

use crate::models::Embedding;

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// True for the empty vector and for the all-zero sentinel
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Scales `v` to unit length in place. A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Element-wise arithmetic mean. Returns `None` for an empty input.
///
/// All vectors must share the dimension of the first one.
pub fn mean<'a, I>(vectors: I) -> Option<Embedding>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter.next()?;
    let mut sum: Vec<f64> = first.iter().map(|x| *x as f64).collect();
    let mut count = 1usize;

    for v in iter {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x as f64;
        }
        count += 1;
    }

    Some(sum.into_iter().map(|x| (x / count as f64) as f32).collect())
}

/// `weight * a + (1 - weight) * b`, normalized to unit length unless zero
pub fn weighted_blend(a: &[f32], b: &[f32], weight: f32) -> Embedding {
    let mut blended: Embedding = a
        .iter()
        .zip(b)
        .map(|(x, y)| weight * x + (1.0 - weight) * y)
        .collect();
    normalize(&mut blended);
    blended
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Maps a cosine similarity from [-1, 1] onto the user-facing [0, 100] scale
///
/// Orthogonal vectors score 50.
pub fn similarity_to_score(similarity: f64) -> f64 {
    round2((similarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0)
}

/// Similarity Scorer: the [0, 100] score between two vectors
pub fn score(a: &[f32], b: &[f32]) -> f64 {
    similarity_to_score(cosine_similarity(a, b))
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_self_similarity_is_maximal() {
        let v = vec![0.3, -1.2, 4.0, 0.01];
        assert!((score(&v, &v) - 100.0).abs() < EPS);
    }

    #[test]
    fn test_opposite_vectors_score_zero() {
        let v = vec![0.3, -1.2, 4.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!(score(&v, &neg).abs() < EPS);
    }

    #[test]
    fn test_zero_vector_scores_fifty() {
        let v = vec![1.0, 2.0, 3.0];
        let zero = vec![0.0; 3];
        assert_eq!(score(&v, &zero), 50.0);
        assert_eq!(score(&zero, &v), 50.0);
        assert_eq!(score(&zero, &zero), 50.0);
    }

    #[test]
    fn test_orthogonal_vectors_score_fifty() {
        assert_eq!(score(&[1.0, 0.0], &[0.0, 1.0]), 50.0);
    }

    #[test]
    fn test_score_is_rounded_to_two_decimals() {
        let s = similarity_to_score(0.123456);
        assert_eq!(s, 56.17);
    }

    #[test]
    fn test_mean_and_normalize() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let mut m = mean([a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(m, vec![0.5, 0.5]);

        normalize(&mut m);
        assert!((l2_norm(&m) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_of_nothing() {
        let empty: Vec<&[f32]> = Vec::new();
        assert!(mean(empty).is_none());
    }

    #[test]
    fn test_normalize_leaves_zero_vector() {
        let mut zero = vec![0.0; 4];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 4]);
    }

    #[test]
    fn test_weighted_blend_ratio() {
        let movie = vec![1.0, 0.0];
        let text = vec![0.0, 1.0];
        let blended = weighted_blend(&movie, &text, 0.7);

        // direction is (0.7, 0.3) scaled to unit length
        let expected_norm = (0.7f32 * 0.7 + 0.3 * 0.3).sqrt();
        assert!((blended[0] - 0.7 / expected_norm).abs() < 1e-6);
        assert!((blended[1] - 0.3 / expected_norm).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_blend_of_cancelling_vectors_stays_zero() {
        let blended = weighted_blend(&[0.3, 0.3], &[-0.7, -0.7], 0.7);
        assert!(is_zero(&blended));
    }

    #[test]
    fn test_mismatched_dimensions_are_dissimilar() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(is_finite(&[1.0, -2.0]));
        assert!(!is_finite(&[1.0, f32::NAN]));
        assert!(!is_finite(&[f32::INFINITY]));
    }
}
