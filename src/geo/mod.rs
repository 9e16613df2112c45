//! Geographic primitives and the spatial index
//!
//! Positions are WGS84 degrees. Distances are great-circle kilometres on a
//! spherical Earth (radius 6371 km), which is plenty for "trucks near me".
//!
//! The index answers radius queries over the set of online vendors. Two
//! implementations share the [`SpatialIndex`] contract and must return
//! identical results for identical contents:
//!
//! - [`LinearIndex`]: scans every entry; fine up to the low thousands
//! - [`GridIndex`]: buckets entries into fixed-size lat/lng cells and only
//!   scans cells overlapping the query's bounding box

pub mod distance;
pub mod grid;
pub mod index;
pub mod position;

pub use distance::{distance, haversine, round_km, EARTH_RADIUS_KM};
pub use grid::GridIndex;
pub use index::{IndexKind, LinearIndex, Proximity, SpatialIndex};
pub use position::Position;
