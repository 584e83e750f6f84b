use ndarray::Array2;

/// Relative pivot floor below which the weighted normal-equations matrix is
/// treated as singular (collinear covariates, too few effective neighbors).
const PIVOT_TOL: f64 = 1e-10;

/// In-place Cholesky factorization A = L·Lᵀ on the lower triangle.
/// Returns `false` when A is not (numerically) positive definite.
pub(crate) fn cholesky(a: &mut Array2<f64>) -> bool {
    let n = a.nrows();
    let scale = (0..n).map(|j| a[(j, j)]).fold(1.0, f64::max);
    for j in 0..n {
        let mut d = a[(j, j)];
        for k in 0..j {
            d -= a[(j, k)] * a[(j, k)];
        }
        if d <= PIVOT_TOL * scale {
            return false;
        }
        let d = d.sqrt();
        a[(j, j)] = d;
        for i in j + 1..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= a[(i, k)] * a[(j, k)];
            }
            a[(i, j)] = s / d;
        }
    }
    true
}

/// Solve A·x = b given the Cholesky factor produced by [`cholesky`].
pub(crate) fn solve(chol: &Array2<f64>, b: &[f64]) -> Vec<f64> {
    let n = chol.nrows();
    let mut x = vec![0.0; n];

    // Forward: L v = b
    for i in 0..n {
        let mut s = b[i];
        for k in 0..i {
            s -= chol[(i, k)] * x[k];
        }
        x[i] = s / chol[(i, i)];
    }

    // Backward: Lᵀ x = v
    for i in (0..n).rev() {
        let mut s = x[i];
        for k in i + 1..n {
            s -= chol[(k, i)] * x[k];
        }
        x[i] = s / chol[(i, i)];
    }

    x
}
