use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::Result;

/// Mixing constant for deriving per-permutation seeds from the base seed.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Statistics of the simulated null distribution relative to an observed
/// value.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NullDistribution {
    pub mean: f64,
    pub variance: f64,
    pub z_score: f64,
    pub p_value: f64,
}

/// Empirical two-sided p-value: count permuted statistics at least as
/// extreme as the observed one on the lighter tail, then
/// (count + 1) / (permutations + 1). Always in [1/(m+1), 1].
pub(crate) fn summarize(observed: f64, sims: &[f64]) -> NullDistribution {
    debug_assert!(!sims.is_empty(), "permutation count must be at least 1");
    let m = sims.len() as f64;
    let mean = sims.iter().sum::<f64>() / m;
    let variance = sims.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / m;
    let sd = variance.sqrt();
    let z_score = if sd > 0.0 { (observed - mean) / sd } else { 0.0 };

    let above = sims.iter().filter(|&&s| s >= observed).count();
    let extreme = above.min(sims.len() - above);
    let p_value = (extreme + 1) as f64 / (m + 1.0);

    NullDistribution { mean, variance, z_score, p_value }
}

/// Run `count` independent permutation trials in parallel.
///
/// Each trial owns an RNG seeded from `seed` (or an OS draw), so a fixed
/// seed reproduces the exact same null distribution regardless of thread
/// scheduling. The cancellation token is checked per trial; a cancelled run
/// yields `Cancelled` and no partial distribution.
pub(crate) fn run_trials<F>(
    count: usize,
    seed: Option<u64>,
    cancel: &CancelToken,
    trial: F,
) -> Result<Vec<f64>>
where
    F: Fn(&mut StdRng) -> f64 + Sync,
{
    let base = seed.unwrap_or_else(|| rand::rng().random());

    (0..count)
        .into_par_iter()
        .map(|k| {
            cancel.bail_if_cancelled()?;
            let mut rng =
                StdRng::seed_from_u64(base.wrapping_add((k as u64).wrapping_mul(SEED_STRIDE)));
            Ok(trial(&mut rng))
        })
        .collect()
}
