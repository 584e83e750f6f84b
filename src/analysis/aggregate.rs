use ahash::AHashMap;
use geo::{BooleanOps, MultiPolygon};
use log::debug;

use crate::analysis::request::RegionKeys;
use crate::error::{Result, SpatialError};
use crate::units::{AttributeVector, GeoUnit};

/// Result of dissolving units into a coarser aggregation level.
#[derive(Debug, Clone)]
pub struct Aggregated {
    /// One unit per distinct region key, in sorted key order.
    pub units: Vec<GeoUnit>,
    /// Aggregated columns, same order as the input columns.
    pub columns: Vec<AttributeVector>,
    /// Rows excluded for lacking a key, geometry, or weight.
    pub dropped: usize,
}

/// Dissolve `units` into regions: geometries are unioned per key, attribute
/// values become the weighted mean Σ(v·w)/Σ(w) of the member values.
///
/// With `weight` pointing at the denominator of a percentage (total valid
/// votes, say), the weighted mean reproduces the ratio-of-sums that a SQL
/// GROUP BY would have computed. Without it, members count equally. Members
/// missing a value are left out of that column's mean only; a region where
/// no member carries a value gets a null.
pub fn aggregate_regions(
    units: &[GeoUnit],
    keys: &RegionKeys,
    columns: &[&AttributeVector],
    weight: Option<&AttributeVector>,
) -> Result<Aggregated> {
    if keys.keys.len() != units.len() {
        return Err(SpatialError::DimensionMismatch {
            expected: units.len(),
            got: keys.keys.len(),
        });
    }
    for column in columns {
        if column.len() != units.len() {
            return Err(SpatialError::DimensionMismatch {
                expected: units.len(),
                got: column.len(),
            });
        }
    }
    if let Some(w) = weight {
        if w.len() != units.len() {
            return Err(SpatialError::DimensionMismatch { expected: units.len(), got: w.len() });
        }
    }

    let mut members: AHashMap<&str, Vec<usize>> = AHashMap::new();
    let mut dropped = 0usize;
    for (row, unit) in units.iter().enumerate() {
        let key = keys.keys[row].as_deref();
        let row_weight = match weight {
            Some(w) => w.values[row].filter(|v| v.is_finite()),
            None => Some(1.0),
        };
        match (key, row_weight) {
            (Some(key), Some(_)) if unit.has_geometry() => {
                members.entry(key).or_default().push(row);
            }
            _ => dropped += 1,
        }
    }

    let mut region_ids: Vec<&str> = members.keys().copied().collect();
    region_ids.sort_unstable();

    let mut out_units = Vec::with_capacity(region_ids.len());
    let mut out_values: Vec<Vec<Option<f64>>> =
        vec![Vec::with_capacity(region_ids.len()); columns.len()];

    for region in &region_ids {
        let rows = &members[region];

        let geometry = rows
            .iter()
            .map(|&row| units[row].geometry.clone())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| MultiPolygon(vec![]));
        out_units.push(GeoUnit::new(*region, geometry));

        for (c, column) in columns.iter().enumerate() {
            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for &row in rows {
                let Some(value) = column.values[row].filter(|v| v.is_finite()) else { continue };
                let w = match weight {
                    Some(wcol) => wcol.values[row].unwrap_or(0.0),
                    None => 1.0,
                };
                weighted_sum += value * w;
                weight_sum += w;
            }
            out_values[c].push((weight_sum > 0.0).then(|| weighted_sum / weight_sum));
        }
    }

    debug!(
        "aggregated {} units into {} '{}' regions ({dropped} dropped)",
        units.len(),
        out_units.len(),
        keys.name
    );

    let columns = columns
        .iter()
        .zip(out_values)
        .map(|(src, values)| AttributeVector { name: src.name.clone(), values })
        .collect();

    Ok(Aggregated { units: out_units, columns, dropped })
}
