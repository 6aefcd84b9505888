// Utility functions for recommendation-service

use ndarray::Array1;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, defaults to `info`. Calling it more than once is a no-op,
/// so tests and embedding processes can both call it.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,redis=warn"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .try_init();
}

/// Cosine similarity of two dense vectors, 0.0 when either has zero norm.
pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a < f64::EPSILON || norm_b < f64::EPSILON {
        return 0.0;
    }

    a.dot(b) / (norm_a * norm_b)
}

/// Map a cosine in [-1, 1] to a score in [0, 1].
pub fn cosine_to_score(cosine: f64) -> f64 {
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 1.0];
        let opposite = -&a;
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&a, &b).abs() < 1e-12);
        assert!((cosine_similarity(&a, &opposite) + 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&a, &array![0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_to_score() {
        assert_eq!(cosine_to_score(1.0), 1.0);
        assert_eq!(cosine_to_score(-1.0), 0.0);
        assert!((cosine_to_score(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
