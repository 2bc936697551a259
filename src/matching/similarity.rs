use anyhow::Result;
use ndarray::Array2;
use tracing::{error, info};

use crate::embedding::LabeledVectors;
use crate::error::ConfigError;
use crate::TARGET_MATCH;

/// Full `n × m` cosine similarity matrix between unit-length vector sets.
///
/// The whole matrix is held in memory, which bounds how large `n` and `m` can
/// get. Inputs in the hundreds of thousands on both sides need a row-chunked
/// variant of this function.
pub fn similarity_matrix(
    internal: &LabeledVectors,
    external: &LabeledVectors,
) -> Result<Array2<f32>> {
    if internal.dim() != external.dim() {
        error!(
            target: TARGET_MATCH,
            "Vector dimension mismatch: internal={}, external={}",
            internal.dim(),
            external.dim()
        );
        return Err(ConfigError::DimensionMismatch {
            internal: internal.dim(),
            external: external.dim(),
        }
        .into());
    }

    info!(
        target: TARGET_MATCH,
        "Computing {}x{} similarity matrix ({} dimensions)",
        internal.len(),
        external.len(),
        internal.dim()
    );
    Ok(internal.vectors().dot(&external.vectors().t()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[&str], rows: Vec<Vec<f32>>) -> LabeledVectors {
        LabeledVectors::from_rows(labels.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_matrix_shape_and_values() {
        let internal = set(&["a", "b"], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let external = set(
            &["x", "y", "z"],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]],
        );
        let sim = similarity_matrix(&internal, &external).unwrap();
        assert_eq!(sim.dim(), (2, 3));
        assert_eq!(sim[[0, 0]], 1.0);
        assert_eq!(sim[[1, 0]], 0.0);
        assert!((sim[[1, 2]] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let internal = set(&["a"], vec![vec![1.0, 0.0]]);
        let external = set(&["x"], vec![vec![1.0, 0.0, 0.0]]);
        let err = similarity_matrix(&internal, &external).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DimensionMismatch {
                internal: 2,
                external: 3
            })
        ));
    }
}
