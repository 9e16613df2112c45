//! Fixed-cell grid index
//!
//! Entries are bucketed by `(row, col)` where each cell spans `cell_degrees`
//! of latitude and longitude. A query converts the search circle into its
//! exact spherical bounding box, visits only the overlapping cells and then
//! applies the same haversine filter as [`LinearIndex`](super::LinearIndex),
//! so results are identical to a linear scan.
//!
//! Near the poles the bounding box spans every longitude. A box crossing the
//! antimeridian is split at ±180° in degrees before it is mapped to columns,
//! so cell sizes that do not divide 360 still cover both sides exactly.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::f64::consts::FRAC_PI_2;

use super::distance::{distance, EARTH_RADIUS_KM};
use super::index::{Proximity, SpatialIndex};
use super::position::Position;
use crate::registry::VendorId;

const MIN_CELL_DEGREES: f64 = 0.001;
const MAX_CELL_DEGREES: f64 = 45.0;
const DEFAULT_CELL_DEGREES: f64 = 0.25;

/// Slack added to the bounding box so points on the circle edge are never
/// lost to rounding when computing their cell
const BBOX_MARGIN_DEG: f64 = 1e-7;

type CellKey = (i64, i64);

/// Grid-bucketed spatial index
#[derive(Debug)]
pub struct GridIndex {
    cell_degrees: f64,
    rows: i64,
    cols: i64,
    cells: HashMap<CellKey, HashSet<VendorId>>,
    positions: HashMap<VendorId, Position>,
}

impl GridIndex {
    /// Create a grid with the given cell size in degrees
    ///
    /// Non-finite or non-positive sizes fall back to 0.25°; others are
    /// clamped to `[0.001, 45]`.
    pub fn new(cell_degrees: f64) -> Self {
        let cell_degrees = if cell_degrees.is_finite() && cell_degrees > 0.0 {
            cell_degrees.clamp(MIN_CELL_DEGREES, MAX_CELL_DEGREES)
        } else {
            DEFAULT_CELL_DEGREES
        };

        Self {
            cell_degrees,
            rows: (180.0 / cell_degrees).ceil() as i64,
            cols: (360.0 / cell_degrees).ceil() as i64,
            cells: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Cell size in degrees
    pub fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    /// Number of non-empty cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    fn row_of(&self, lat: f64) -> i64 {
        (((lat + 90.0) / self.cell_degrees).floor() as i64).clamp(0, self.rows - 1)
    }

    fn col_of(&self, lng: f64) -> i64 {
        (((lng + 180.0) / self.cell_degrees).floor() as i64).clamp(0, self.cols - 1)
    }

    fn cell_of(&self, position: Position) -> CellKey {
        (self.row_of(position.lat()), self.col_of(position.lng()))
    }

    /// Columns covering the longitude range `[lo, hi]`, which may run past ±180
    fn cols_between(&self, lo: f64, hi: f64) -> Vec<i64> {
        if hi - lo >= 360.0 {
            return (0..self.cols).collect();
        }

        let segments = if lo < -180.0 {
            [(lo + 360.0, 180.0), (-180.0, hi)]
        } else if hi > 180.0 {
            [(lo, 180.0), (-180.0, hi - 360.0)]
        } else {
            [(lo, hi), (lo, hi)]
        };

        let cols: BTreeSet<i64> = segments
            .iter()
            .flat_map(|&(a, b)| self.col_of(a)..=self.col_of(b))
            .collect();
        cols.into_iter().collect()
    }

    fn detach(&mut self, vendor_id: &VendorId, cell: CellKey) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            bucket.remove(vendor_id);
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Row range and column list covering every point within `radius_km`
    ///
    /// Returns `None` when the circle is big enough that scanning all
    /// entries is simpler.
    fn candidate_cells(&self, center: Position, radius_km: f64) -> Option<Vec<CellKey>> {
        let angular = radius_km / EARTH_RADIUS_KM;
        if angular >= std::f64::consts::PI {
            return None;
        }

        let lat_c = center.lat().to_radians();
        let lat_min = lat_c - angular;
        let lat_max = lat_c + angular;

        let (lat_min, lat_max, lng_span) = if lat_min <= -FRAC_PI_2 || lat_max >= FRAC_PI_2 {
            // Circle touches a pole: every longitude is in play
            (lat_min.max(-FRAC_PI_2), lat_max.min(FRAC_PI_2), None)
        } else {
            let ratio = (angular.sin() / lat_c.cos()).min(1.0);
            (lat_min, lat_max, Some(ratio.asin().to_degrees()))
        };

        let row_lo = self.row_of(lat_min.to_degrees() - BBOX_MARGIN_DEG);
        let row_hi = self.row_of(lat_max.to_degrees() + BBOX_MARGIN_DEG);

        let cols: Vec<i64> = match lng_span {
            Some(span) => self.cols_between(
                center.lng() - span - BBOX_MARGIN_DEG,
                center.lng() + span + BBOX_MARGIN_DEG,
            ),
            None => (0..self.cols).collect(),
        };

        let visits = (row_hi - row_lo + 1) as usize * cols.len();
        if visits > self.cells.len() {
            return None;
        }

        let mut keys = Vec::with_capacity(visits);
        for row in row_lo..=row_hi {
            for &col in &cols {
                keys.push((row, col));
            }
        }
        Some(keys)
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_DEGREES)
    }
}

impl SpatialIndex for GridIndex {
    fn upsert(&mut self, vendor_id: &VendorId, position: Position) {
        let cell = self.cell_of(position);

        if let Some(previous) = self.positions.insert(vendor_id.clone(), position) {
            let old_cell = self.cell_of(previous);
            if old_cell == cell {
                return;
            }
            self.detach(vendor_id, old_cell);
        }

        self.cells.entry(cell).or_default().insert(vendor_id.clone());
    }

    fn remove(&mut self, vendor_id: &VendorId) -> Option<Position> {
        let position = self.positions.remove(vendor_id)?;
        let cell = self.cell_of(position);
        self.detach(vendor_id, cell);
        Some(position)
    }

    fn position(&self, vendor_id: &VendorId) -> Option<Position> {
        self.positions.get(vendor_id).copied()
    }

    fn query(&self, center: Position, radius_km: f64) -> Vec<Proximity> {
        let within = |id: &VendorId, pos: &Position| {
            let d = distance(center, *pos);
            (d <= radius_km).then(|| Proximity {
                vendor_id: id.clone(),
                distance_km: d,
            })
        };

        let mut hits: Vec<Proximity> = match self.candidate_cells(center, radius_km) {
            Some(keys) => keys
                .iter()
                .filter_map(|key| self.cells.get(key))
                .flatten()
                .filter_map(|id| self.positions.get(id).and_then(|pos| within(id, pos)))
                .collect(),
            None => self
                .positions
                .iter()
                .filter_map(|(id, pos)| within(id, pos))
                .collect(),
        };

        hits.sort_by(Proximity::cmp_by_distance);
        hits
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}
