use log::debug;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::MoranConfig;
use crate::error::{Result, SpatialError};
use crate::stats::permutation::{run_trials, summarize};
use crate::stats::{center, dot};
use crate::units::DenseColumn;
use crate::weights::WeightMatrix;

/// Global Moran's I with permutation-based significance.
///
/// Produced once per (attribute, weight) pair; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoranResult {
    /// Observed statistic.
    pub i: f64,
    /// Expected value under spatial randomness, -1/(n-1).
    pub expected: f64,
    /// Variance of the simulated null distribution.
    pub variance: f64,
    /// Observed statistic standardized against the null distribution.
    pub z_score: f64,
    /// Empirical p-value, (extreme + 1) / (permutations + 1).
    pub p_value: f64,
    /// Permutation count used.
    pub permutations: usize,
}

impl MoranResult {
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.p_value < threshold
    }

    pub fn conclusion(&self, threshold: f64) -> &'static str {
        if self.is_significant(threshold) {
            "significant spatial autocorrelation"
        } else {
            "no significant pattern"
        }
    }
}

/// Compute Moran's I for one attribute over a shared weight structure.
///
/// I = (n / S0) * (Σ_ij w_ij z_i z_j) / (Σ_i z_i²) with z the mean-centered
/// attribute. Significance comes from `config.permutations` random
/// relabelings of the attribute across units, weights held fixed.
pub fn global_moran(
    attr: &DenseColumn,
    weights: &WeightMatrix,
    config: &MoranConfig,
    cancel: &CancelToken,
) -> Result<MoranResult> {
    weights.require_min_sample()?;
    if attr.len() != weights.n() {
        return Err(SpatialError::DimensionMismatch { expected: weights.n(), got: attr.len() });
    }

    let n = weights.n() as f64;
    let s0 = weights.s0();
    if s0 <= 0.0 {
        return Err(SpatialError::NumericalError(
            "weight matrix has no links; Moran's I is undefined".into(),
        ));
    }

    let z = center(&attr.values);
    let ss = dot(&z, &z);
    if ss < f64::EPSILON {
        return Err(SpatialError::DegenerateInput(attr.name.to_string()));
    }

    let scale = n / (s0 * ss);
    let observed = scale * dot(&z, &weights.lag(&z));

    let sims = run_trials(config.permutations, config.seed, cancel, |rng| {
        let mut shuffled = z.clone();
        shuffled.shuffle(rng);
        scale * dot(&shuffled, &weights.lag(&shuffled))
    })?;
    let null = summarize(observed, &sims);

    debug!(
        "moran '{}': I={observed:.4} p={:.4} ({} permutations)",
        attr.name, null.p_value, config.permutations
    );

    Ok(MoranResult {
        i: observed,
        expected: -1.0 / (n - 1.0),
        variance: null.variance,
        z_score: null.z_score,
        p_value: null.p_value,
        permutations: config.permutations,
    })
}
