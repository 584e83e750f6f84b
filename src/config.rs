use serde::{Deserialize, Serialize};

/// Kernel family for geographically weighted regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// Compact support: (1 - (d/bw)^2)^2 for d < bw, else 0.
    Bisquare,
    /// Infinite support: exp(-0.5 (d/bw)^2).
    Gaussian,
}

/// Settings for the permutation-based Moran significance tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoranConfig {
    /// Number of random relabelings (default 999).
    pub permutations: usize,
    /// Two-sided significance threshold (default 0.05).
    pub significance: f64,
    /// Seed for reproducible permutation draws; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for MoranConfig {
    fn default() -> Self {
        Self { permutations: 999, significance: 0.05, seed: None }
    }
}

/// Bandwidth search range and stopping rules for GWR calibration.
///
/// When `min`/`max` are `None` the range is derived from the point set:
/// the lower end is the largest distance any unit needs to reach enough
/// neighbors for a determined local system, the upper end is the diameter
/// of the point cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthSearch {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Relative convergence tolerance on the bracket width.
    pub tolerance: f64,
    /// Iteration cap for the golden-section search.
    pub max_iter: usize,
}

impl Default for BandwidthSearch {
    fn default() -> Self {
        Self { min: None, max: None, tolerance: 1e-4, max_iter: 60 }
    }
}

/// Settings for the GWR engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GwrConfig {
    pub kernel: Kernel,
    pub bandwidth: BandwidthSearch,
    /// Z-standardize covariates before fitting (intercept unaffected).
    pub standardize: bool,
}

impl Default for GwrConfig {
    fn default() -> Self {
        Self { kernel: Kernel::Bisquare, bandwidth: BandwidthSearch::default(), standardize: true }
    }
}

/// Configuration handed to the orchestrator at construction.
///
/// This replaces any notion of process-wide settings: two orchestrators with
/// different configs can run side by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub moran: MoranConfig,
    pub gwr: GwrConfig,
}
