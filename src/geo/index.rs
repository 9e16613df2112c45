//! Spatial index contract and the linear-scan implementation

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use super::distance::distance;
use super::grid::GridIndex;
use super::position::Position;
use crate::registry::VendorId;

/// A vendor matched by a radius query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proximity {
    /// Matched vendor
    pub vendor_id: VendorId,
    /// Unrounded great-circle distance from the query center
    pub distance_km: f64,
}

impl Proximity {
    /// Ordering used by every index: distance ascending, then vendor id
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.distance_km
            .total_cmp(&other.distance_km)
            .then_with(|| self.vendor_id.cmp(&other.vendor_id))
    }
}

/// Which index implementation backs the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexKind {
    /// Scan every entry on each query
    Linear,
    /// Bucket entries into cells of `cell_degrees` on each side
    Grid { cell_degrees: f64 },
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Linear
    }
}

impl IndexKind {
    /// Build an empty index of this kind
    pub fn build(self) -> Box<dyn SpatialIndex> {
        match self {
            IndexKind::Linear => Box::new(LinearIndex::new()),
            IndexKind::Grid { cell_degrees } => Box::new(GridIndex::new(cell_degrees)),
        }
    }
}

/// Map of vendor id to current position, queryable by radius
///
/// Implementations hold no history: `upsert` on an existing id replaces its
/// position. `query` includes vendors exactly on the radius and sorts with
/// [`Proximity::cmp_by_distance`].
pub trait SpatialIndex: Send + Sync {
    /// Insert or replace a vendor's position
    fn upsert(&mut self, vendor_id: &VendorId, position: Position);

    /// Remove a vendor, returning its last indexed position
    fn remove(&mut self, vendor_id: &VendorId) -> Option<Position>;

    /// Current position of a vendor, if indexed
    fn position(&self, vendor_id: &VendorId) -> Option<Position>;

    /// All vendors within `radius_km` of `center`, nearest first
    fn query(&self, center: Position, radius_km: f64) -> Vec<Proximity>;

    /// Number of indexed vendors
    fn len(&self) -> usize;

    /// Whether the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a vendor is indexed
    fn contains(&self, vendor_id: &VendorId) -> bool {
        self.position(vendor_id).is_some()
    }
}

/// Linear-scan index
#[derive(Debug, Default)]
pub struct LinearIndex {
    entries: HashMap<VendorId, Position>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for LinearIndex {
    fn upsert(&mut self, vendor_id: &VendorId, position: Position) {
        self.entries.insert(vendor_id.clone(), position);
    }

    fn remove(&mut self, vendor_id: &VendorId) -> Option<Position> {
        self.entries.remove(vendor_id)
    }

    fn position(&self, vendor_id: &VendorId) -> Option<Position> {
        self.entries.get(vendor_id).copied()
    }

    fn query(&self, center: Position, radius_km: f64) -> Vec<Proximity> {
        let mut hits: Vec<Proximity> = self
            .entries
            .iter()
            .filter_map(|(id, pos)| {
                let d = distance(center, *pos);
                (d <= radius_km).then(|| Proximity {
                    vendor_id: id.clone(),
                    distance_km: d,
                })
            })
            .collect();

        hits.sort_by(Proximity::cmp_by_distance);
        hits
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> VendorId {
        VendorId::parse(s).unwrap()
    }

    fn pos(lat: f64, lng: f64) -> Position {
        Position::new(lat, lng).unwrap()
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = LinearIndex::new();
        index.upsert(&id("T1"), pos(0.0, 0.0));
        index.upsert(&id("T1"), pos(1.0, 1.0));

        assert_eq!(index.len(), 1);
        assert_eq!(index.position(&id("T1")), Some(pos(1.0, 1.0)));
    }

    #[test]
    fn test_remove_returns_last_position() {
        let mut index = LinearIndex::new();
        index.upsert(&id("T1"), pos(2.0, 3.0));

        assert_eq!(index.remove(&id("T1")), Some(pos(2.0, 3.0)));
        assert_eq!(index.remove(&id("T1")), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_sorted_and_filtered() {
        let mut index = LinearIndex::new();
        index.upsert(&id("far"), pos(1.0, 0.0));
        index.upsert(&id("mid"), pos(0.02, 0.0));
        index.upsert(&id("near"), pos(0.01, 0.0));

        let hits = index.query(pos(0.0, 0.0), 5.0);
        let ids: Vec<&str> = hits.iter().map(|p| p.vendor_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].distance_km < hits[1].distance_km);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut index = LinearIndex::new();
        index.upsert(&id("b"), pos(0.01, 0.0));
        index.upsert(&id("a"), pos(0.01, 0.0));
        index.upsert(&id("c"), pos(-0.01, 0.0));

        let hits = index.query(pos(0.0, 0.0), 5.0);
        let ids: Vec<&str> = hits.iter().map(|p| p.vendor_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_radius_boundary_inclusive() {
        let mut index = LinearIndex::new();
        let edge = pos(0.03, 0.04);
        index.upsert(&id("edge"), edge);

        let exact = distance(pos(0.0, 0.0), edge);
        let hits = index.query(pos(0.0, 0.0), exact);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].distance_km, exact);

        let just_short = index.query(pos(0.0, 0.0), exact - 1e-9);
        assert!(just_short.is_empty());
    }

    #[test]
    fn test_index_kind_build() {
        let mut grid = IndexKind::Grid { cell_degrees: 0.5 }.build();
        grid.upsert(&id("T1"), pos(10.0, 10.0));
        assert!(grid.contains(&id("T1")));

        let linear = IndexKind::default().build();
        assert!(linear.is_empty());
    }
}
