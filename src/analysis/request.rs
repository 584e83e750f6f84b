use std::sync::Arc;

use crate::error::{Result, SpatialError};
use crate::units::{AttributeVector, GeoUnit};

/// Which statistic a request computes, and over which columns.
///
/// Column requirements are explicit per variant; a missing column is a
/// construction-time error on [`AnalysisRequest::new`], never a silent
/// runtime skip.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Global Moran's I of one attribute.
    GlobalMoran { attribute: String },
    /// Bivariate Moran's I of `x` against the spatial lag of `y`.
    BivariateMoran { x: String, y: String },
    /// GWR of `dependent` on `covariates`.
    Gwr { dependent: String, covariates: Vec<String> },
}

impl Operation {
    /// Column names the operation consumes, dependent/x first.
    pub fn required_columns(&self) -> Vec<&str> {
        match self {
            Operation::GlobalMoran { attribute } => vec![attribute.as_str()],
            Operation::BivariateMoran { x, y } => vec![x.as_str(), y.as_str()],
            Operation::Gwr { dependent, covariates } => {
                let mut names = Vec::with_capacity(covariates.len() + 1);
                names.push(dependent.as_str());
                names.extend(covariates.iter().map(String::as_str));
                names
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::GlobalMoran { .. } => "global moran",
            Operation::BivariateMoran { .. } => "bivariate moran",
            Operation::Gwr { .. } => "gwr",
        }
    }
}

/// Region-key column for dissolving units to a coarser aggregation level,
/// aligned positionally with the unit list.
#[derive(Debug, Clone)]
pub struct RegionKeys {
    pub name: Arc<str>,
    pub keys: Vec<Option<Arc<str>>>,
}

impl RegionKeys {
    pub fn new(name: impl Into<Arc<str>>, keys: Vec<Option<Arc<str>>>) -> Self {
        Self { name: name.into(), keys }
    }
}

/// Optional dissolve step applied before validation and analysis.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub keys: RegionKeys,
    /// Name of a provided column whose values weight the aggregation
    /// (e.g. total valid votes when averaging percentages). `None` averages
    /// members uniformly.
    pub weight: Option<String>,
}

/// One entry of the orchestrator catalog: a geometry scope, its attribute
/// columns, and the operation to run over them.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: Arc<str>,
    pub(crate) units: Vec<GeoUnit>,
    pub(crate) columns: Vec<AttributeVector>,
    pub(crate) aggregation: Option<Aggregation>,
    pub(crate) operation: Operation,
}

impl AnalysisRequest {
    pub fn new(
        id: impl Into<Arc<str>>,
        units: Vec<GeoUnit>,
        columns: Vec<AttributeVector>,
        operation: Operation,
    ) -> Result<Self> {
        Self::with_aggregation(id, units, columns, operation, None)
    }

    pub fn with_aggregation(
        id: impl Into<Arc<str>>,
        units: Vec<GeoUnit>,
        columns: Vec<AttributeVector>,
        operation: Operation,
        aggregation: Option<Aggregation>,
    ) -> Result<Self> {
        for column in &columns {
            if column.len() != units.len() {
                return Err(SpatialError::DimensionMismatch {
                    expected: units.len(),
                    got: column.len(),
                });
            }
        }

        let request = Self { id: id.into(), units, columns, aggregation, operation };

        for name in request.operation.required_columns() {
            if request.column(name).is_none() {
                return Err(SpatialError::MissingColumn(name.to_string()));
            }
        }
        if let Some(agg) = &request.aggregation {
            if agg.keys.keys.len() != request.units.len() {
                return Err(SpatialError::DimensionMismatch {
                    expected: request.units.len(),
                    got: agg.keys.keys.len(),
                });
            }
            if let Some(weight) = &agg.weight {
                if request.column(weight).is_none() {
                    return Err(SpatialError::MissingColumn(weight.clone()));
                }
            }
        }

        Ok(request)
    }

    pub(crate) fn column(&self, name: &str) -> Option<&AttributeVector> {
        self.columns.iter().find(|c| c.name.as_ref() == name)
    }
}
