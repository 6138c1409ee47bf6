//! Rating and vector math
//!
//! Pairwise rating updates (learner vs. lesson treated as a two-player match)
//! and the similarity primitives used by the ranker.

use crate::error::{EngineError, Result};

/// Probability that `rating_a` beats `rating_b`
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    let exponent = (f64::from(rating_b) - f64::from(rating_a)) / 400.0;
    1.0 / (1.0 + 10f64.powf(exponent))
}

/// New rating after a match with `actual_score` in [0, 1]; never negative
pub fn update_rating(rating: i32, opponent_rating: i32, actual_score: f64, k_factor: f64) -> i32 {
    let expected = expected_score(rating, opponent_rating);
    let updated = f64::from(rating) + k_factor * (actual_score - expected);
    // f64 -> i32 saturates, so absurd K-factors cannot wrap
    (updated.round() as i32).max(0)
}

fn norm(vec: &[f64]) -> f64 {
    vec.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine of the angle between two vectors
///
/// Zero-norm inputs yield exactly 0.0. The result is clamped to [-1, 1].
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch { left: a.len(), right: b.len() });
    }

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Scale to unit length; the zero vector maps to itself
pub fn normalize(vec: &[f64]) -> Vec<f64> {
    let n = norm(vec);
    if n == 0.0 {
        return vec.to_vec();
    }
    vec.iter().map(|x| x / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expected_score_equal_ratings() {
        assert!((expected_score(1500, 1500) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_underdog_win() {
        let expected = expected_score(1000, 1500);
        assert!((expected - 0.0532).abs() < 1e-3);
        assert_eq!(update_rating(1000, 1500, 1.0, 32.0), 1030);
    }

    #[test]
    fn test_favorite_loss_drops_rating() {
        assert_eq!(update_rating(1500, 1000, 0.0, 32.0), 1470);
    }

    #[test]
    fn test_rating_floor() {
        assert_eq!(update_rating(10, 10, 0.0, 32.0), 0);
        assert_eq!(update_rating(0, 0, 0.0, 32.0), 0);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = [0.2, 0.4, 0.9];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0; 3], &[0.3, 0.3, 0.4]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[0.3, 0.3, 0.4], &[0.0; 3]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn test_normalize() {
        let unit = normalize(&[3.0, 4.0]);
        assert!((unit[0] - 0.6).abs() < 1e-12);
        assert!((unit[1] - 0.8).abs() < 1e-12);
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn prop_expected_scores_sum_to_one(a in 0i32..4000, b in 0i32..4000) {
            let sum = expected_score(a, b) + expected_score(b, a);
            prop_assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
        }

        #[test]
        fn prop_update_rating_never_negative(
            rating in 0i32..4000,
            opponent in 0i32..4000,
            actual in 0.0f64..=1.0,
        ) {
            prop_assert!(update_rating(rating, opponent, actual, 32.0) >= 0);
        }

        #[test]
        fn prop_cosine_self_is_one(v in prop::collection::vec(0.01f64..10.0, 3)) {
            let sim = cosine_similarity(&v, &v).unwrap();
            prop_assert!((sim - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_cosine_symmetric(
            a in prop::collection::vec(-5.0f64..5.0, 3),
            b in prop::collection::vec(-5.0f64..5.0, 3),
        ) {
            let ab = cosine_similarity(&a, &b).unwrap();
            let ba = cosine_similarity(&b, &a).unwrap();
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((-1.0..=1.0).contains(&ab));
        }

        #[test]
        fn prop_normalize_unit_length(v in prop::collection::vec(-10.0f64..10.0, 1..8)) {
            prop_assume!(v.iter().any(|x| x.abs() > 1e-6));
            let unit = normalize(&v);
            let len = unit.iter().map(|x| x * x).sum::<f64>().sqrt();
            prop_assert!((len - 1.0).abs() < 1e-9);
        }
    }
}
