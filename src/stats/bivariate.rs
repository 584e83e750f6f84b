use log::debug;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::MoranConfig;
use crate::error::{Result, SpatialError};
use crate::stats::permutation::{run_trials, summarize};
use crate::stats::{dot, standardize};
use crate::units::DenseColumn;
use crate::weights::WeightMatrix;

/// Bivariate Moran's I: correlation of one attribute with the spatial lag of
/// another. Asymmetric: `I(x, y)` generally differs from `I(y, x)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BivariateMoranResult {
    /// Observed statistic.
    pub i: f64,
    /// Mean of the simulated null distribution.
    pub expected: f64,
    /// Variance of the simulated null distribution.
    pub variance: f64,
    /// Observed statistic standardized against the null distribution.
    pub z_score: f64,
    /// Empirical p-value, (extreme + 1) / (permutations + 1).
    pub p_value: f64,
    /// Permutation count used.
    pub permutations: usize,
    /// Plain (aspatial) Pearson correlation of the two attributes.
    pub pearson: f64,
}

impl BivariateMoranResult {
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.p_value < threshold
    }

    pub fn conclusion(&self, threshold: f64) -> &'static str {
        if self.is_significant(threshold) {
            "significant spatial cross-correlation"
        } else {
            "no significant pattern"
        }
    }
}

/// Compute bivariate Moran's I between `x` and the spatial lag of `y`.
///
/// Both attributes are z-scored (population standard deviation), then
/// I = (1/S0) * Σ_ij w_ij x̂_i ŷ_j. With identical inputs this reduces
/// exactly to the univariate statistic. Significance permutes the lagged
/// variable only, holding `x` and the weights fixed.
pub fn bivariate_moran(
    x: &DenseColumn,
    y: &DenseColumn,
    weights: &WeightMatrix,
    config: &MoranConfig,
    cancel: &CancelToken,
) -> Result<BivariateMoranResult> {
    weights.require_min_sample()?;
    for column in [x, y] {
        if column.len() != weights.n() {
            return Err(SpatialError::DimensionMismatch {
                expected: weights.n(),
                got: column.len(),
            });
        }
    }

    let s0 = weights.s0();
    if s0 <= 0.0 {
        return Err(SpatialError::NumericalError(
            "weight matrix has no links; bivariate Moran's I is undefined".into(),
        ));
    }

    let zx = standardize(&x.values)
        .ok_or_else(|| SpatialError::DegenerateInput(x.name.to_string()))?;
    let zy = standardize(&y.values)
        .ok_or_else(|| SpatialError::DegenerateInput(y.name.to_string()))?;

    let observed = dot(&zx, &weights.lag(&zy)) / s0;
    let pearson = dot(&zx, &zy) / zx.len() as f64;

    let sims = run_trials(config.permutations, config.seed, cancel, |rng| {
        let mut shuffled = zy.clone();
        shuffled.shuffle(rng);
        dot(&zx, &weights.lag(&shuffled)) / s0
    })?;
    let null = summarize(observed, &sims);

    debug!(
        "bivariate moran '{}' ~ lag '{}': I={observed:.4} r={pearson:.4} p={:.4}",
        x.name, y.name, null.p_value
    );

    Ok(BivariateMoranResult {
        i: observed,
        expected: null.mean,
        variance: null.variance,
        z_score: null.z_score,
        p_value: null.p_value,
        permutations: config.permutations,
        pearson,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::global_moran;

    fn ring(n: usize) -> WeightMatrix {
        let rows: Vec<Vec<u32>> = (0..n)
            .map(|i| vec![((i + n - 1) % n) as u32, ((i + 1) % n) as u32])
            .collect();
        WeightMatrix::from_neighbor_lists(&rows)
    }

    fn config(seed: u64) -> MoranConfig {
        MoranConfig { permutations: 199, significance: 0.05, seed: Some(seed) }
    }

    #[test]
    fn self_correlation_reduces_to_univariate() {
        let n = 20;
        let values: Vec<f64> = (0..n).map(|i| ((i * 31) % 11) as f64).collect();
        let attr = DenseColumn::new("v", values);
        let w = ring(n);
        let cancel = CancelToken::new();

        let uni = global_moran(&attr, &w, &config(3), &cancel).unwrap();
        let biv = bivariate_moran(&attr, &attr, &w, &config(3), &cancel).unwrap();

        assert!(
            (uni.i - biv.i).abs() < 1e-12,
            "univariate {} vs bivariate {}",
            uni.i,
            biv.i
        );
        assert!((biv.pearson - 1.0).abs() < 1e-12);
    }

    #[test]
    fn statistic_is_asymmetric_in_general() {
        let n = 16;
        let x: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
        let y: Vec<f64> = (0..n).map(|i| ((i * i) as f64 % 7.0) - 3.0).collect();
        let cx = DenseColumn::new("x", x);
        let cy = DenseColumn::new("y", y);
        let w = ring(n);
        let cancel = CancelToken::new();

        let xy = bivariate_moran(&cx, &cy, &w, &config(5), &cancel).unwrap();
        let yx = bivariate_moran(&cy, &cx, &w, &config(5), &cancel).unwrap();
        assert!((xy.i - yx.i).abs() > 1e-9, "expected asymmetry, both {}", xy.i);
    }

    #[test]
    fn degenerate_pair_names_the_offending_column() {
        let n = 12;
        let varying = DenseColumn::new("ok", (0..n).map(|i| i as f64).collect());
        let flat = DenseColumn::new("flat", vec![2.5; n]);
        let w = ring(n);
        let cancel = CancelToken::new();

        match bivariate_moran(&varying, &flat, &w, &config(1), &cancel) {
            Err(SpatialError::DegenerateInput(name)) => assert_eq!(name, "flat"),
            other => panic!("expected DegenerateInput, got {other:?}"),
        }
        match bivariate_moran(&flat, &varying, &w, &config(1), &cancel) {
            Err(SpatialError::DegenerateInput(name)) => assert_eq!(name, "flat"),
            other => panic!("expected DegenerateInput, got {other:?}"),
        }
    }

    #[test]
    fn pearson_matches_hand_computation() {
        let n = 10;
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 2.0 * v).collect(); // perfectly anti-correlated
        let result = bivariate_moran(
            &DenseColumn::new("x", x),
            &DenseColumn::new("y", y),
            &ring(n),
            &config(1),
            &CancelToken::new(),
        )
        .unwrap();
        assert!((result.pearson + 1.0).abs() < 1e-12);
    }

    #[test]
    fn p_value_bounds_hold() {
        let n = 18;
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).cos()).collect();
        let y: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin()).collect();
        let result = bivariate_moran(
            &DenseColumn::new("x", x),
            &DenseColumn::new("y", y),
            &ring(n),
            &config(11),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(result.p_value >= 1.0 / 200.0 && result.p_value <= 1.0);
    }
}
