use geo::{BoundingRect, Rect, Relate};
use log::debug;
use rstar::{AABB, RTree, RTreeObject};
use smallvec::SmallVec;

use crate::error::{Result, SpatialError};
use crate::units::{GeoUnit, MIN_SAMPLE};
use crate::weights::WeightMatrix;

#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize, // Index of the corresponding unit
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Build row-standardized queen-contiguity weights over `units`.
///
/// Two units are neighbors iff their boundaries share at least one point
/// (edge or vertex touch). Candidate pairs come from an R-tree over bounding
/// boxes; true adjacency is confirmed with a DE-9IM `relate` call, where
/// `touches` means the boundaries intersect while the interiors stay
/// disjoint. Neighbor lists are sorted, so the result does not depend on
/// R-tree iteration order.
///
/// Units whose geometry yields no bounding box participate as isolated rows.
pub fn queen_weights(units: &[GeoUnit]) -> Result<WeightMatrix> {
    if units.len() < MIN_SAMPLE {
        return Err(SpatialError::InsufficientData { needed: MIN_SAMPLE, got: units.len() });
    }

    let rtree = RTree::bulk_load(
        units
            .iter()
            .enumerate()
            .filter_map(|(i, unit)| {
                unit.geometry.bounding_rect().map(|bbox| BoundingBox { idx: i, bbox })
            })
            .collect(),
    );

    let mut adj: Vec<SmallVec<[u32; 8]>> = vec![SmallVec::new(); units.len()];

    for i in 0..units.len() {
        let Some(rect) = units[i].geometry.bounding_rect() else { continue };
        let search = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        for cand in rtree.locate_in_envelope_intersecting(&search) {
            let j = cand.idx;
            if j <= i {
                continue; // check each unordered pair once
            }

            let im = units[i].geometry.relate(&units[j].geometry);

            // Queen predicate: any boundary contact counts, including a
            // single shared vertex. Interior overlap is not contiguity.
            if im.is_touches() {
                adj[i].push(j as u32);
                adj[j].push(i as u32);
            }
        }
    }

    for row in &mut adj {
        row.sort_unstable();
    }

    let links: usize = adj.iter().map(|r| r.len()).sum();
    let isolated = adj.iter().filter(|r| r.is_empty()).count();
    debug!(
        "queen contiguity over {} units: {} links, {} isolated",
        units.len(),
        links / 2,
        isolated
    );

    let rows: Vec<&[u32]> = adj.iter().map(|r| r.as_slice()).collect();
    Ok(WeightMatrix::standardize(&rows))
}
