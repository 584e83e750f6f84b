mod bivariate;
mod moran;
mod permutation;

pub use bivariate::{BivariateMoranResult, bivariate_moran};
pub use moran::{MoranResult, global_moran};

/// Dot product of two aligned slices.
#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Subtract the mean from every element.
pub(crate) fn center(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| v - mean).collect()
}

/// Z-score with the population standard deviation.
/// `None` when the input has zero variance.
pub(crate) fn standardize(values: &[f64]) -> Option<Vec<f64>> {
    let z = center(values);
    let sd = (dot(&z, &z) / z.len() as f64).sqrt();
    if sd < f64::EPSILON {
        return None;
    }
    Some(z.into_iter().map(|v| v / sd).collect())
}
