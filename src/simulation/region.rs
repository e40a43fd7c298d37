//! Geocast region membership.

use super::types::{Destination, Position};

/// Fixed-point scale applied before comparing coordinates.
pub const REGION_PRECISION: f64 = 100_000.0;

/// Half-width of the square region along x and y, in world units.
pub const REGION_HALF_WIDTH: f64 = 1.0;

/// Square region of side `2 * REGION_HALF_WIDTH` centered on the target's
/// position. The z axis is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocastRegion {
    target: Destination,
}

impl GeocastRegion {
    pub fn new(target: Destination) -> Self {
        Self { target }
    }

    /// True when `candidate` lies inside the region, bounds included.
    ///
    /// Both sides are scaled by `REGION_PRECISION` and truncated toward zero
    /// before comparing, which keeps points sitting exactly on the boundary
    /// stable against float noise.
    pub fn contains(&self, candidate: &Destination) -> bool {
        self.contains_position(&candidate.position)
    }

    pub fn contains_position(&self, position: &Position) -> bool {
        within_window(self.target.position.x, position.x) && within_window(self.target.position.y, position.y)
    }
}

fn fixed(value: f64) -> i64 {
    (value * REGION_PRECISION) as i64
}

fn within_window(center: f64, value: f64) -> bool {
    let v = fixed(value);
    v >= fixed(center - REGION_HALF_WIDTH) && v <= fixed(center + REGION_HALF_WIDTH)
}

/// Shorthand for `GeocastRegion::new(*target).contains(candidate)`.
pub fn in_region(target: &Destination, candidate: &Destination) -> bool {
    GeocastRegion::new(*target).contains(candidate)
}
