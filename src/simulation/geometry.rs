//! Geometric predicates used by planarization and radio reachability.
//!
//! Contains helper functions for:
//! - 3-D Euclidean distance
//! - Midpoint computation for the Gabriel circle
//! - The Gabriel witness test over a node's known neighbors

use super::types::{Destination, Position};

/// Euclidean distance in world units over all three axes.
///
/// No special casing: NaN coordinates propagate into the result.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Midpoint of the segment a–b.
pub fn midpoint(a: &Position, b: &Position) -> Position {
    Position {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
        z: (a.z + b.z) / 2.0,
    }
}

/// Search for a witness against the prospective edge self–`sender`.
///
/// The Gabriel circle has the edge as its diameter: its center is the midpoint
/// of `self_position` and `sender.position`, its radius the distance from that
/// center to `self_position`. Any known neighbor other than the sender lying
/// at or inside the circle (`distance <= radius`) witnesses a shorter path and
/// invalidates the edge.
///
/// The check runs against whatever `neighbors` holds at call time, so the
/// outcome depends on discovery order.
///
/// # Returns
///
/// The first witnessing neighbor in `neighbors` order, or `None` when the edge
/// is accepted.
pub fn gabriel_witness<'a>(neighbors: &'a [Destination], self_position: &Position, sender: &Destination) -> Option<&'a Destination> {
    let center = midpoint(&sender.position, self_position);
    let radius = distance(&center, self_position);

    neighbors
        .iter()
        .find(|known| known.id != sender.id && distance(&known.position, &center) <= radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y, 0.0)
    }

    fn d(id: i32, x: f64, y: f64) -> Destination {
        Destination::new(id, p(x, y))
    }

    #[test]
    fn distance_covers_all_axes() {
        assert_eq!(distance(&p(0.0, 0.0), &p(3.0, 4.0)), 5.0);
        assert_eq!(distance(&Position::new(1.0, 2.0, 2.0), &Position::new(1.0, 2.0, 0.0)), 2.0);
        assert!(distance(&Position::new(f64::NAN, 0.0, 0.0), &p(0.0, 0.0)).is_nan());
    }

    #[test]
    fn colinear_point_between_endpoints_witnesses_edge() {
        // self at A, sender at B, M strictly between them
        let sender = d(2, 2.0, 0.0);
        let neighbors = [d(1, 1.0, 0.0), sender];
        let witness = gabriel_witness(&neighbors, &p(0.0, 0.0), &sender);
        assert_eq!(witness.map(|w| w.id), Some(1));
    }

    #[test]
    fn point_on_the_circle_still_witnesses() {
        // center (1,0), radius 1: (1,1) lies exactly on the boundary
        let sender = d(2, 2.0, 0.0);
        let neighbors = [d(5, 1.0, 1.0)];
        assert!(gabriel_witness(&neighbors, &p(0.0, 0.0), &sender).is_some());
    }

    #[test]
    fn outside_points_and_the_sender_itself_do_not_witness() {
        let sender = d(2, 2.0, 0.0);
        let neighbors = [sender, d(7, 1.0, 1.5), d(8, -1.0, 0.0)];
        assert!(gabriel_witness(&neighbors, &p(0.0, 0.0), &sender).is_none());
    }

    #[test]
    fn witness_uses_stored_positions() {
        // Same id as the sender but a stale position inside the circle is ignored by id.
        let sender = d(2, 2.0, 0.0);
        let stale_sender = d(2, 1.0, 0.0);
        assert!(gabriel_witness(&[stale_sender], &p(0.0, 0.0), &sender).is_none());
    }
}
