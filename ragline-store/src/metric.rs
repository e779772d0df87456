//! Similarity scoring.

use ragline_core::SimilarityMetric;

/// Score `candidate` against `query` under `metric`.
///
/// Both vectors must have the same dimension; callers validate before
/// scoring. Higher scores are more relevant for every metric: cosine is
/// the normalized dot product, dot-product the raw one, and Euclidean
/// distance is mapped through `1 / (1 + d)`.
pub fn score(metric: SimilarityMetric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine(query, candidate),
        SimilarityMetric::DotProduct => dot(query, candidate),
        SimilarityMetric::Euclidean => {
            let distance = query
                .iter()
                .zip(candidate.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + distance)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_reflexive_at_one() {
        let v = [0.6, 0.8, 0.0];
        let s = score(SimilarityMetric::Cosine, &v, &v);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let s = score(SimilarityMetric::Cosine, &[1.0, 0.0], &[0.0, 1.0]);
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let s = score(SimilarityMetric::Cosine, &[0.0, 0.0], &[1.0, 1.0]);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn euclidean_is_reflexive_at_one_and_decreases_with_distance() {
        let v = [1.0, 2.0, 3.0];
        assert!((score(SimilarityMetric::Euclidean, &v, &v) - 1.0).abs() < 1e-6);
        let near = score(SimilarityMetric::Euclidean, &v, &[1.0, 2.0, 3.5]);
        let far = score(SimilarityMetric::Euclidean, &v, &[4.0, 5.0, 6.0]);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn dot_product_is_the_raw_inner_product() {
        let s = score(SimilarityMetric::DotProduct, &[1.0, 2.0], &[3.0, 4.0]);
        assert!((s - 11.0).abs() < 1e-6);
    }
}
