use thiserror::Error;

/// Error taxonomy for the spatial-statistics core.
///
/// Everything except `MissingColumn` and `DimensionMismatch` is a soft
/// failure: the orchestrator records it against the originating request and
/// moves on to the next one.
#[derive(Error, Debug)]
pub enum SpatialError {
    #[error("insufficient data: need at least {needed} valid units, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate input: attribute '{0}' has zero variance")]
    DegenerateInput(String),

    #[error("numerical error: {0}")]
    NumericalError(String),

    #[error("bandwidth selection failed: no candidate produced a finite criterion")]
    BandwidthSelectionFailed,

    #[error("cancelled")]
    Cancelled,

    #[error("missing column '{0}' required by the requested analysis")]
    MissingColumn(String),

    #[error("dimension mismatch: expected {expected} rows, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl SpatialError {
    /// Soft errors are request-local: the batch keeps going.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            SpatialError::InsufficientData { .. }
                | SpatialError::DegenerateInput(_)
                | SpatialError::NumericalError(_)
                | SpatialError::BandwidthSelectionFailed
                | SpatialError::Cancelled
        )
    }

    /// Stable label used in serialized batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SpatialError::InsufficientData { .. } => "insufficient_data",
            SpatialError::DegenerateInput(_) => "degenerate_input",
            SpatialError::NumericalError(_) => "numerical_error",
            SpatialError::BandwidthSelectionFailed => "bandwidth_selection_failed",
            SpatialError::Cancelled => "cancelled",
            SpatialError::MissingColumn(_) => "missing_column",
            SpatialError::DimensionMismatch { .. } => "dimension_mismatch",
            SpatialError::Upstream(_) => "upstream",
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
