use std::sync::Arc;

use geo::{BoundingRect, Centroid, MultiPolygon, Point};
use log::debug;

use crate::error::{Result, SpatialError};

/// Minimum sample the downstream statistics tolerate.
pub const MIN_SAMPLE: usize = 5;

/// A single geographic unit: stable identifier plus areal geometry.
///
/// Ids keep the original text (with leading zeros) but avoid repeated owned
/// Strings. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct GeoUnit {
    pub id: Arc<str>,
    pub geometry: MultiPolygon<f64>,
}

impl GeoUnit {
    pub fn new(id: impl Into<Arc<str>>, geometry: MultiPolygon<f64>) -> Self {
        Self { id: id.into(), geometry }
    }

    /// Derived centroid; `None` for empty/degenerate geometry.
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.centroid()
    }

    /// A unit is usable when it has at least one ring with real extent.
    pub fn has_geometry(&self) -> bool {
        !self.geometry.0.is_empty() && self.geometry.bounding_rect().is_some()
    }
}

/// A named column of optional numeric values, aligned positionally with the
/// unit list it was loaded alongside. One per variable under analysis.
#[derive(Debug, Clone)]
pub struct AttributeVector {
    pub name: Arc<str>,
    pub values: Vec<Option<f64>>,
}

impl AttributeVector {
    pub fn new(name: impl Into<Arc<str>>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), values }
    }

    /// Convenience constructor for fully-populated columns.
    pub fn dense(name: impl Into<Arc<str>>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values: values.into_iter().map(Some).collect() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully-populated column produced by the validator: same name as its
/// source [`AttributeVector`], no gaps.
#[derive(Debug, Clone)]
pub struct DenseColumn {
    pub name: Arc<str>,
    pub values: Vec<f64>,
}

impl DenseColumn {
    pub fn new(name: impl Into<Arc<str>>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of the geometry validator: a densely-aligned sample where every
/// unit has usable geometry and a value in every required column.
#[derive(Debug, Clone)]
pub struct ValidSample {
    pub units: Vec<GeoUnit>,
    /// Cleaned columns, in the order they were requested.
    pub columns: Vec<DenseColumn>,
    /// Rows removed by the filter, for diagnostics.
    pub dropped: usize,
}

impl ValidSample {
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit centroids as planar coordinates, in row order.
    ///
    /// Geometry validity is established by the filter, so every unit here
    /// has a centroid.
    pub fn centroids(&self) -> Vec<(f64, f64)> {
        self.units
            .iter()
            .map(|u| {
                let c = u.centroid().unwrap_or(Point::new(f64::NAN, f64::NAN));
                (c.x(), c.y())
            })
            .collect()
    }
}

/// Drop rows with null/empty geometry or a null in any required column.
///
/// Pure filter: inputs are untouched, the cleaned sample plus a dropped-row
/// count comes back. Fails with `InsufficientData` when fewer than
/// [`MIN_SAMPLE`] valid rows remain.
pub fn validate(units: &[GeoUnit], required: &[&AttributeVector]) -> Result<ValidSample> {
    for column in required {
        if column.len() != units.len() {
            return Err(SpatialError::DimensionMismatch {
                expected: units.len(),
                got: column.len(),
            });
        }
    }

    let mut kept_units = Vec::with_capacity(units.len());
    let mut kept_values: Vec<Vec<f64>> = vec![Vec::with_capacity(units.len()); required.len()];

    for (row, unit) in units.iter().enumerate() {
        if !unit.has_geometry() {
            continue;
        }
        let values: Option<Vec<f64>> = required
            .iter()
            .map(|c| c.values[row].filter(|v| v.is_finite()))
            .collect();
        let Some(values) = values else { continue };

        kept_units.push(unit.clone());
        for (column, value) in kept_values.iter_mut().zip(values) {
            column.push(value);
        }
    }

    let dropped = units.len() - kept_units.len();
    if dropped > 0 {
        debug!("validator dropped {dropped} of {} rows", units.len());
    }

    if kept_units.len() < MIN_SAMPLE {
        return Err(SpatialError::InsufficientData { needed: MIN_SAMPLE, got: kept_units.len() });
    }

    let columns = required
        .iter()
        .zip(kept_values)
        .map(|(src, values)| DenseColumn { name: src.name.clone(), values })
        .collect();

    Ok(ValidSample { units: kept_units, columns, dropped })
}
