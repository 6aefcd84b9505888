// ============================================
// Dimensionality Reduction
// ============================================
//
// Deterministic helpers that map feature matrices to fixed-width embeddings:
// - standardize: zero mean, unit population variance per column
// - zero_pad: widen a matrix with zero columns
// - truncated_svd: top-k right singular directions by power iteration with
//   deflation on XᵀX, projected back onto X (equivalent to U·Σ)

use ndarray::{Array1, Array2, Axis};

const MAX_ITERATIONS: usize = 300;
const TOLERANCE: f64 = 1e-10;
const MIN_EIGENVALUE: f64 = 1e-12;

/// Center every column and scale it to unit variance.
///
/// Zero-variance columns are only centered.
pub fn standardize(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    if x.nrows() == 0 {
        return out;
    }

    for mut column in out.axis_iter_mut(Axis(1)) {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        column.mapv_inplace(|v| {
            if std > f64::EPSILON {
                (v - mean) / std
            } else {
                v - mean
            }
        });
    }
    out
}

pub fn zero_pad(x: &Array2<f64>, width: usize) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), width.max(x.ncols())));
    out.slice_mut(ndarray::s![.., ..x.ncols()]).assign(x);
    out
}

/// Project `x` onto its top `k` right singular vectors.
///
/// Components beyond the numerical rank of `x` are left as zero columns,
/// so the result is always `nrows × k`.
pub fn truncated_svd(x: &Array2<f64>, k: usize) -> Array2<f64> {
    let n_features = x.ncols();
    let mut projected = Array2::zeros((x.nrows(), k));
    if n_features == 0 || x.nrows() == 0 {
        return projected;
    }

    let mut gram = x.t().dot(x);

    for component in 0..k.min(n_features) {
        let Some(direction) = dominant_eigenvector(&gram) else {
            break;
        };

        let eigenvalue = direction.dot(&gram.dot(&direction));
        if eigenvalue < MIN_EIGENVALUE {
            break;
        }

        projected.column_mut(component).assign(&x.dot(&direction));

        // Deflate: remove the found direction from the Gram matrix
        let outer = outer_product(&direction, &direction);
        gram.scaled_add(-eigenvalue, &outer);
    }

    projected
}

/// Reduce to exactly `dim` columns: zero-pad narrow inputs, SVD wide ones.
pub fn reduce_to(x: &Array2<f64>, dim: usize) -> Array2<f64> {
    if x.ncols() < dim {
        zero_pad(x, dim)
    } else {
        truncated_svd(x, dim)
    }
}

fn dominant_eigenvector(matrix: &Array2<f64>) -> Option<Array1<f64>> {
    // Start from the column with the largest diagonal entry
    let start = matrix
        .diag()
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (idx, value)| {
            if *value > best.1 {
                (idx, *value)
            } else {
                best
            }
        })
        .0;

    let mut vector = normalized(matrix.column(start).to_owned())?;

    for _ in 0..MAX_ITERATIONS {
        let next = normalized(matrix.dot(&vector))?;
        let delta = (&next - &vector).mapv(f64::abs).sum();
        vector = next;
        if delta < TOLERANCE {
            break;
        }
    }

    Some(sign_fixed(vector))
}

fn normalized(vector: Array1<f64>) -> Option<Array1<f64>> {
    let norm = vector.dot(&vector).sqrt();
    if norm < MIN_EIGENVALUE {
        None
    } else {
        Some(vector / norm)
    }
}

/// Flip the vector so its largest-magnitude loading is positive.
fn sign_fixed(vector: Array1<f64>) -> Array1<f64> {
    let pivot = vector
        .iter()
        .fold(0.0_f64, |best, v| if v.abs() > best.abs() { *v } else { best });

    if pivot < 0.0 {
        -vector
    } else {
        vector
    }
}

fn outer_product(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let column = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    column.dot(&row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardize() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let z = standardize(&x);

        assert!((z[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((z[[1, 0]] - 1.0).abs() < 1e-12);
        // constant column is centered, not scaled
        assert_eq!(z[[0, 1]], 0.0);
        assert_eq!(z[[1, 1]], 0.0);
    }

    #[test]
    fn test_zero_pad() {
        let x = array![[1.0, 2.0]];
        let padded = zero_pad(&x, 4);
        assert_eq!(padded, array![[1.0, 2.0, 0.0, 0.0]]);
        assert_eq!(reduce_to(&x, 4).shape(), &[1, 4]);
    }

    #[test]
    fn test_svd_recovers_dominant_axis() {
        // Points spread along the first axis, little spread along the second
        let x = array![[3.0, 0.1], [-3.0, -0.1], [2.0, -0.1], [-2.0, 0.1]];
        let reduced = truncated_svd(&x, 1);

        assert_eq!(reduced.shape(), &[4, 1]);
        assert!((reduced[[0, 0]] - 3.0).abs() < 0.05);
        assert!((reduced[[1, 0]] + 3.0).abs() < 0.05);
    }

    #[test]
    fn test_svd_preserves_pairwise_geometry_at_full_rank() {
        let x = array![[1.0, 0.0, 2.0], [0.0, 1.0, 1.0], [1.0, 1.0, 0.0]];
        let reduced = truncated_svd(&x, 3);

        for i in 0..3 {
            for j in 0..3 {
                let original = x.row(i).dot(&x.row(j));
                let projected = reduced.row(i).dot(&reduced.row(j));
                assert!((original - projected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_svd_pads_beyond_rank() {
        let x = array![[1.0, 1.0, 0.0], [2.0, 2.0, 0.0]];
        let reduced = truncated_svd(&x, 3);

        assert_eq!(reduced.shape(), &[2, 3]);
        assert!(reduced.column(1).iter().all(|v| v.abs() < 1e-9));
        assert!(reduced.column(2).iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_svd_is_deterministic() {
        let x = array![[0.2, 0.7, 0.1], [0.9, 0.0, 0.3], [0.4, 0.4, 0.4]];
        assert_eq!(truncated_svd(&x, 2), truncated_svd(&x, 2));
    }
}
