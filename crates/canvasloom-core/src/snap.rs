//! Angle snapping for connector endpoints.

use kurbo::Point;

/// Angle snap increment in degrees.
pub const ANGLE_SNAP_INCREMENT: f64 = 45.0;

/// Below this length a segment has no meaningful angle.
const MIN_SNAP_DISTANCE: f64 = 0.001;

/// Result of an angle snap.
#[derive(Debug, Clone, Copy)]
pub struct AngleSnapResult {
    /// The snapped endpoint.
    pub point: Point,
    /// The angle of `point` about the fixed end, in degrees (0-360).
    pub angle_degrees: f64,
    pub snapped: bool,
}

/// Snap an angle to the nearest increment, normalized to [0, 360).
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    snapped.rem_euclid(360.0)
}

fn angle_of(start: Point, end: Point) -> f64 {
    let d = end - start;
    d.y.atan2(d.x).to_degrees().rem_euclid(360.0)
}

/// Rotate `end` about `start` onto the nearest 45° ray, keeping its
/// distance from `start`.
pub fn snap_line_endpoint(start: Point, end: Point, enabled: bool) -> AngleSnapResult {
    let distance = start.distance(end);
    if distance < MIN_SNAP_DISTANCE {
        return AngleSnapResult {
            point: end,
            angle_degrees: 0.0,
            snapped: false,
        };
    }

    let original = angle_of(start, end);
    if !enabled {
        return AngleSnapResult {
            point: end,
            angle_degrees: original,
            snapped: false,
        };
    }

    let snapped = snap_angle(original, ANGLE_SNAP_INCREMENT);
    let radians = snapped.to_radians();
    AngleSnapResult {
        point: Point::new(
            start.x + distance * radians.cos(),
            start.y + distance * radians.sin(),
        ),
        angle_degrees: snapped,
        snapped: true,
    }
}
