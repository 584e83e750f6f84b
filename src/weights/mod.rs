mod build;

pub use build::queen_weights;

use crate::error::{Result, SpatialError};
use crate::units::{GeoUnit, MIN_SAMPLE};

/// Tolerance for the row-sum invariant checks.
pub const ROW_SUM_TOL: f64 = 1e-9;

/// Row-standardized spatial weights in compressed sparse row format.
///
/// `offsets[i]..offsets[i+1]` indexes into `neighbors`/`weights` to give the
/// sorted neighbor list of unit `i` and the standardized weight of each link.
/// The raw adjacency is symmetric 0/1; standardization assigns 1/degree to
/// every link, so each row sums to 1.0, or to 0.0 for isolated units.
/// Isolated units keep their (empty) row: downstream statistics rely on a
/// consistent unit count.
///
/// Built once per geometry set and read-only thereafter.
#[derive(Debug, Clone)]
pub struct WeightMatrix {
    offsets: Vec<u32>,
    neighbors: Vec<u32>,
    weights: Vec<f64>,
    s0: f64,
}

impl WeightMatrix {
    /// Build queen-contiguity weights over the given units.
    ///
    /// Fails with `InsufficientData` below the minimum viable sample.
    pub fn build(units: &[GeoUnit]) -> Result<Self> {
        queen_weights(units)
    }

    /// Construct from explicit neighbor lists (0/1 adjacency), standardizing
    /// each row. Rows are sorted here, so equal inputs in any order produce
    /// identical matrices.
    pub fn from_neighbor_lists(rows: &[Vec<u32>]) -> Self {
        let mut sorted: Vec<Vec<u32>> = rows.to_vec();
        for row in &mut sorted {
            row.sort_unstable();
            row.dedup();
        }
        Self::standardize(&sorted)
    }

    /// CSR assembly from sorted, deduplicated neighbor lists.
    pub(crate) fn standardize<R: AsRef<[u32]>>(rows: &[R]) -> Self {
        let nnz: usize = rows.iter().map(|r| r.as_ref().len()).sum();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut neighbors = Vec::with_capacity(nnz);
        let mut weights = Vec::with_capacity(nnz);

        offsets.push(0u32);
        for row in rows {
            let row = row.as_ref();
            let w = if row.is_empty() { 0.0 } else { 1.0 / row.len() as f64 };
            neighbors.extend_from_slice(row);
            weights.extend(std::iter::repeat(w).take(row.len()));
            offsets.push(neighbors.len() as u32);
        }

        let s0 = weights.iter().sum();
        Self { offsets, neighbors, weights, s0 }
    }

    /// Number of units covered by this matrix (isolated units included).
    #[inline]
    pub fn n(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Sum of all standardized weights (the `S0` term of Moran's I).
    #[inline]
    pub fn s0(&self) -> f64 {
        self.s0
    }

    /// Total number of directed links.
    #[inline]
    pub fn num_links(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    fn range(&self, unit: usize) -> std::ops::Range<usize> {
        self.offsets[unit] as usize..self.offsets[unit + 1] as usize
    }

    /// Neighbor count of `unit` in the raw adjacency.
    #[inline]
    pub fn degree(&self, unit: usize) -> usize {
        self.range(unit).len()
    }

    #[inline]
    pub fn is_isolated(&self, unit: usize) -> bool {
        self.degree(unit) == 0
    }

    /// Sorted slice of units adjacent to `unit`.
    #[inline]
    pub fn neighbors(&self, unit: usize) -> &[u32] {
        &self.neighbors[self.range(unit)]
    }

    /// Iterator over `(neighbor, standardized weight)` pairs of one row.
    #[inline]
    pub fn row(&self, unit: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.range(unit).map(move |k| (self.neighbors[k] as usize, self.weights[k]))
    }

    /// Standardized row sum: 1.0 for connected units, 0.0 for isolated ones.
    pub fn row_sum(&self, unit: usize) -> f64 {
        self.range(unit).map(|k| self.weights[k]).sum()
    }

    /// Spatial lag of an aligned value vector: `lag_i = Σ_j w_ij x_j`.
    pub fn lag(&self, values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(values.len(), self.n());
        (0..self.n())
            .map(|i| self.row(i).map(|(j, w)| w * values[j]).sum())
            .collect()
    }

    /// Raw-adjacency symmetry: `adjacency[i][j] == adjacency[j][i]`.
    /// Holds by construction for built matrices; exposed for validation.
    pub fn is_symmetric(&self) -> bool {
        (0..self.n()).all(|i| {
            self.neighbors(i)
                .iter()
                .all(|&j| self.neighbors(j as usize).binary_search(&(i as u32)).is_ok())
        })
    }

    /// Check the standardization invariant on every row.
    pub fn check_row_sums(&self) -> Result<()> {
        for i in 0..self.n() {
            let sum = self.row_sum(i);
            let target = if self.is_isolated(i) { 0.0 } else { 1.0 };
            if (sum - target).abs() > ROW_SUM_TOL || sum < -ROW_SUM_TOL || sum > 1.0 + ROW_SUM_TOL {
                return Err(SpatialError::NumericalError(format!(
                    "weight row {i} sums to {sum}, expected {target}"
                )));
            }
        }
        Ok(())
    }

    /// Defensive sample-size re-check used by the estimators.
    pub(crate) fn require_min_sample(&self) -> Result<()> {
        if self.n() < MIN_SAMPLE {
            return Err(SpatialError::InsufficientData { needed: MIN_SAMPLE, got: self.n() });
        }
        Ok(())
    }
}
