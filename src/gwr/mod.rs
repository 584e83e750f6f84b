mod bandwidth;
mod kernel;
mod solve;

use std::sync::Arc;

use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::{BandwidthSearch, GwrConfig, Kernel};
use crate::error::{Result, SpatialError};
use crate::gwr::bandwidth::golden_section;
use crate::gwr::solve::{cholesky, solve};
use crate::stats::{center, dot, standardize};
use crate::units::{DenseColumn, MIN_SAMPLE};

/// Local weighted-variance floor under which local R² is reported as 0
/// instead of dividing by (near) zero.
const LOCAL_VARIANCE_TOL: f64 = 1e-12;

/// A fitted geographically weighted regression.
///
/// One row of `coefficients` per unit: local intercept in column 0, then one
/// column per covariate in input order. Produced once per (dependent
/// variable, covariate set, geometry set).
#[derive(Debug, Clone)]
pub struct GwrModel {
    pub kernel: Kernel,
    /// Calibrated kernel bandwidth, in coordinate units.
    pub bandwidth: f64,
    /// Corrected AIC of the fit at the chosen bandwidth.
    pub aicc: f64,
    pub covariate_names: Vec<Arc<str>>,
    /// n × (covariates + 1) local coefficients.
    pub coefficients: Array2<f64>,
    /// Per-unit goodness of fit, always in [0, 1].
    pub local_r2: Vec<f64>,
    /// Fitted value at each unit under its own local model.
    pub fitted: Vec<f64>,
}

impl GwrModel {
    pub fn n(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn summary(&self) -> GwrSummary {
        GwrSummary { kernel: self.kernel, bandwidth: self.bandwidth, aicc: self.aicc }
    }
}

/// Scalar diagnostics of a GWR fit, for batch reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GwrSummary {
    pub kernel: Kernel,
    pub bandwidth: f64,
    pub aicc: f64,
}

struct LocalFit {
    coefficients: Vec<f64>,
    fitted: f64,
    hat: f64,
    r2: f64,
}

/// Fit a GWR of `y` on `covariates` at the given unit coordinates.
///
/// Calibrates the bandwidth by golden-section search over the configured
/// range (derived from the point set when unset), minimizing AICc, then fits
/// one weighted least-squares model per unit. Covariates are z-standardized
/// first when `config.standardize` is set.
pub fn fit_gwr(
    y: &DenseColumn,
    covariates: &[DenseColumn],
    coords: &[(f64, f64)],
    config: &GwrConfig,
    cancel: &CancelToken,
) -> Result<GwrModel> {
    let n = y.len();
    let p = covariates.len() + 1;

    if coords.len() != n {
        return Err(SpatialError::DimensionMismatch { expected: n, got: coords.len() });
    }
    for column in covariates {
        if column.len() != n {
            return Err(SpatialError::DimensionMismatch { expected: n, got: column.len() });
        }
    }
    // AICc needs residual degrees of freedom beyond the local parameters.
    let needed = MIN_SAMPLE.max(p + 3);
    if n < needed {
        return Err(SpatialError::InsufficientData { needed, got: n });
    }

    let yc = center(&y.values);
    if dot(&yc, &yc) < f64::EPSILON {
        return Err(SpatialError::DegenerateInput(y.name.to_string()));
    }

    let design = build_design(covariates, n, config.standardize)?;
    let dist = pairwise_distances(coords);
    let (lower, upper) = resolve_range(&config.bandwidth, &dist, p)?;
    info!(
        "gwr '{}' ~ {} covariates, n={n}: searching bandwidth in [{lower:.4}, {upper:.4}]",
        y.name,
        covariates.len()
    );

    let search = golden_section(
        lower,
        upper,
        config.bandwidth.tolerance,
        config.bandwidth.max_iter,
        cancel,
        |bw| {
            let fits = fit_all_units(bw, &design, &y.values, &dist, config.kernel, cancel)?;
            aicc_from(&fits, &y.values)
        },
    )?;

    let fits = fit_all_units(search.bandwidth, &design, &y.values, &dist, config.kernel, cancel)?;
    let aicc = aicc_from(&fits, &y.values)?;

    let mut coefficients = Array2::zeros((n, p));
    let mut local_r2 = Vec::with_capacity(n);
    let mut fitted = Vec::with_capacity(n);
    for (i, fit) in fits.into_iter().enumerate() {
        for (j, b) in fit.coefficients.into_iter().enumerate() {
            coefficients[(i, j)] = b;
        }
        local_r2.push(fit.r2);
        fitted.push(fit.fitted);
    }

    debug!("gwr '{}': bandwidth {:.4}, AICc {aicc:.4}", y.name, search.bandwidth);

    Ok(GwrModel {
        kernel: config.kernel,
        bandwidth: search.bandwidth,
        aicc,
        covariate_names: covariates.iter().map(|c| c.name.clone()).collect(),
        coefficients,
        local_r2,
        fitted,
    })
}

/// Design matrix with an implicit leading intercept column.
fn build_design(covariates: &[DenseColumn], n: usize, standardized: bool) -> Result<Array2<f64>> {
    let mut design = Array2::ones((n, covariates.len() + 1));
    for (j, column) in covariates.iter().enumerate() {
        let values = if standardized {
            standardize(&column.values)
                .ok_or_else(|| SpatialError::DegenerateInput(column.name.to_string()))?
        } else {
            // A constant covariate is collinear with the intercept either way.
            let centered = center(&column.values);
            if dot(&centered, &centered) < f64::EPSILON {
                return Err(SpatialError::DegenerateInput(column.name.to_string()));
            }
            column.values.clone()
        };
        for i in 0..n {
            design[(i, j + 1)] = values[i];
        }
    }
    Ok(design)
}

fn pairwise_distances(coords: &[(f64, f64)]) -> Array2<f64> {
    let n = coords.len();
    let mut dist = Array2::zeros((n, n));
    for i in 0..n {
        for j in i + 1..n {
            let dx = coords[i].0 - coords[j].0;
            let dy = coords[i].1 - coords[j].1;
            let d = (dx * dx + dy * dy).sqrt();
            dist[(i, j)] = d;
            dist[(j, i)] = d;
        }
    }
    dist
}

/// Bandwidth bracket: configured values, or derived so that the smallest
/// candidate still reaches enough neighbors for a determined local system
/// and the largest spans the whole point cloud (the global model).
fn resolve_range(search: &BandwidthSearch, dist: &Array2<f64>, p: usize) -> Result<(f64, f64)> {
    let n = dist.nrows();
    let max_d = dist.iter().copied().fold(0.0, f64::max);
    if max_d <= 0.0 {
        return Err(SpatialError::NumericalError("all unit centroids coincide".into()));
    }

    let upper = search.max.unwrap_or(max_d);
    let lower = search.min.unwrap_or_else(|| {
        let need = (p + 2).min(n - 1);
        let mut worst = 0.0f64;
        for i in 0..n {
            let mut row: Vec<f64> = (0..n).map(|j| dist[(i, j)]).collect();
            row.sort_unstable_by(f64::total_cmp);
            worst = worst.max(row[need]);
        }
        (worst * 1.05).min(upper)
    });

    if lower <= 0.0 || upper < lower {
        return Err(SpatialError::NumericalError(format!(
            "invalid bandwidth range [{lower}, {upper}]"
        )));
    }
    Ok((lower, upper))
}

fn fit_all_units(
    bw: f64,
    design: &Array2<f64>,
    y: &[f64],
    dist: &Array2<f64>,
    kernel: Kernel,
    cancel: &CancelToken,
) -> Result<Vec<LocalFit>> {
    (0..y.len())
        .into_par_iter()
        .map(|i| {
            cancel.bail_if_cancelled()?;
            local_fit(i, bw, design, y, dist, kernel)
        })
        .collect()
}

/// Weighted least squares centered on unit `i`: kernel weights from the
/// distance row, normal equations solved by Cholesky factorization.
fn local_fit(
    i: usize,
    bw: f64,
    design: &Array2<f64>,
    y: &[f64],
    dist: &Array2<f64>,
    kernel: Kernel,
) -> Result<LocalFit> {
    let n = y.len();
    let p = design.ncols();

    let weights: Vec<f64> = (0..n).map(|j| kernel.weight(dist[(i, j)], bw)).collect();

    let mut xtwx = Array2::<f64>::zeros((p, p));
    let mut xtwy = vec![0.0; p];
    for j in 0..n {
        let w = weights[j];
        if w <= 0.0 {
            continue;
        }
        let xj = design.row(j);
        for a in 0..p {
            let wxa = w * xj[a];
            xtwy[a] += wxa * y[j];
            for b in a..p {
                xtwx[(a, b)] += wxa * xj[b];
            }
        }
    }
    for a in 0..p {
        for b in 0..a {
            xtwx[(a, b)] = xtwx[(b, a)];
        }
    }

    if !cholesky(&mut xtwx) {
        return Err(SpatialError::NumericalError(format!(
            "singular weighted design at unit {i} (bandwidth {bw:.6})"
        )));
    }

    let beta = solve(&xtwx, &xtwy);
    let xi: Vec<f64> = design.row(i).to_vec();
    let fitted = dot(&xi, &beta);

    // Leverage of unit i on its own fit: s_ii = w_ii · xᵢᵀ (XᵀWX)⁻¹ xᵢ.
    let hat = weights[i] * dot(&xi, &solve(&xtwx, &xi));

    // Kernel-weighted local goodness of fit.
    let wsum: f64 = weights.iter().sum();
    let ybar = weights.iter().zip(y).map(|(w, v)| w * v).sum::<f64>() / wsum;
    let mut tss = 0.0;
    let mut rss = 0.0;
    for j in 0..n {
        let w = weights[j];
        if w <= 0.0 {
            continue;
        }
        let xj = design.row(j);
        let pred: f64 = (0..p).map(|a| xj[a] * beta[a]).sum();
        tss += w * (y[j] - ybar) * (y[j] - ybar);
        rss += w * (y[j] - pred) * (y[j] - pred);
    }
    let r2 = if tss <= LOCAL_VARIANCE_TOL { 0.0 } else { (1.0 - rss / tss).clamp(0.0, 1.0) };

    Ok(LocalFit { coefficients: beta, fitted, hat, r2 })
}

/// Corrected AIC over the per-unit fits:
/// n·ln(σ̂²) + n·ln(2π) + n·(n + tr(S)) / (n − 2 − tr(S)).
fn aicc_from(fits: &[LocalFit], y: &[f64]) -> Result<f64> {
    let n = y.len() as f64;
    let rss: f64 = fits.iter().zip(y).map(|(f, v)| (v - f.fitted) * (v - f.fitted)).sum();
    let tr_s: f64 = fits.iter().map(|f| f.hat).sum();

    let dof = n - 2.0 - tr_s;
    if dof <= 0.0 {
        return Err(SpatialError::NumericalError(format!(
            "effective degrees of freedom exhausted (tr(S) = {tr_s:.2}, n = {n})"
        )));
    }

    let sigma2 = (rss / n).max(f64::MIN_POSITIVE);
    Ok(n * sigma2.ln() + n * (2.0 * std::f64::consts::PI).ln() + n * (n + tr_s) / dof)
}
