//! Connector path geometry.
//!
//! Every route is a pure function of the connector style and the two ends,
//! each given as a point plus an outward unit direction. Alongside the
//! drawable [`BezPath`] a plain collision polyline is produced for hit
//! testing and bounds.

use crate::geometry::{self, EPSILON};
use crate::model::{CanvasEdge, ConnectorStyle, EntityStore, Endpoint, Side};
use kurbo::{BezPath, CubicBez, ParamCurve, Point, Rect, Vec2};

/// Distance stepped routes extend straight out of each endpoint.
pub const STEP_OFFSET: f64 = 20.0;

/// Consecutive polyline points closer than this are merged.
pub const DEDUP_DISTANCE: f64 = 0.5;

/// Upper bound for the rounding radius of stepped corners.
pub const CORNER_RADIUS: f64 = 10.0;

/// Number of segments used to sample a smooth route for collisions.
pub const SMOOTH_SAMPLES: usize = 10;

const MIN_SMOOTH_STRENGTH: f64 = 1.0;
const MAX_SMOOTH_STRENGTH: f64 = 200.0;

/// Cubic handle length of a quarter circle, relative to its radius.
const KAPPA: f64 = 0.552_284_749_8;

/// One end of a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEnd {
    pub point: Point,
    /// Outward unit direction.
    pub direction: Vec2,
}

impl RouteEnd {
    pub fn new(point: Point, direction: Vec2) -> Self {
        Self { point, direction }
    }

    fn extended(&self) -> Point {
        self.point + self.direction * STEP_OFFSET
    }
}

/// Fixed outward normal of a node side.
pub fn side_normal(side: Side) -> Vec2 {
    side.normal()
}

/// Outward direction of a free endpoint: the dominant axis of `delta`,
/// where `delta` points from this endpoint towards the other one.
pub fn free_direction(delta: Vec2) -> Vec2 {
    geometry::dominant_axis(delta)
}

/// A computed route.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: BezPath,
    pub collision: Vec<Point>,
}

/// Route between two ends in the given style.
pub fn route(style: ConnectorStyle, from: RouteEnd, to: RouteEnd) -> Route {
    match style {
        ConnectorStyle::Straight => Route {
            path: straight_path(from.point, to.point),
            collision: vec![from.point, to.point],
        },
        ConnectorStyle::Stepped => {
            let points = stepped_points(from, to);
            Route {
                path: rounded_path(&points, CORNER_RADIUS),
                collision: points,
            }
        }
        ConnectorStyle::Smooth => {
            let curve = smooth_curve(from, to);
            let mut path = BezPath::new();
            path.move_to(curve.p0);
            path.curve_to(curve.p1, curve.p2, curve.p3);
            Route {
                path,
                collision: sample_curve(curve, SMOOTH_SAMPLES),
            }
        }
    }
}

/// Collision polyline only.
pub fn collision_polyline(style: ConnectorStyle, from: RouteEnd, to: RouteEnd) -> Vec<Point> {
    match style {
        ConnectorStyle::Straight => vec![from.point, to.point],
        ConnectorStyle::Stepped => stepped_points(from, to),
        ConnectorStyle::Smooth => sample_curve(smooth_curve(from, to), SMOOTH_SAMPLES),
    }
}

pub fn straight_path(from: Point, to: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(from);
    path.line_to(to);
    path
}

/// Outward directions of a straight connector: along the delta at the
/// start, against it at the end.
pub fn straight_directions(from: Point, to: Point) -> (Vec2, Vec2) {
    let d = geometry::normalize_or(to - from, Vec2::new(1.0, 0.0));
    (d, -d)
}

/// Orthogonal elbow points between two ends, deduplicated.
pub fn stepped_points(from: RouteEnd, to: RouteEnd) -> Vec<Point> {
    let fd = from.direction;
    let td = to.direction;
    let fe = from.extended();
    let te = to.extended();
    let horizontal = fd.x.abs() > fd.y.abs();
    let alignment = fd.dot(td);

    let raw = if alignment.abs() < 0.5 {
        // Perpendicular
        match geometry::ray_intersection(from.point, fd, to.point, td) {
            Some(corner) => vec![from.point, corner, to.point],
            None => {
                let corner = if horizontal {
                    Point::new(fe.x, te.y)
                } else {
                    Point::new(te.x, fe.y)
                };
                vec![from.point, fe, corner, te, to.point]
            }
        }
    } else if alignment < 0.0 {
        // Parallel, facing each other or facing away
        let facing = (to.point - from.point).dot(fd) > 0.0;
        if facing {
            if horizontal {
                let mx = (from.point.x + to.point.x) / 2.0;
                vec![
                    from.point,
                    Point::new(mx, from.point.y),
                    Point::new(mx, to.point.y),
                    to.point,
                ]
            } else {
                let my = (from.point.y + to.point.y) / 2.0;
                vec![
                    from.point,
                    Point::new(from.point.x, my),
                    Point::new(to.point.x, my),
                    to.point,
                ]
            }
        } else if horizontal {
            let my = (fe.y + te.y) / 2.0;
            vec![
                from.point,
                fe,
                Point::new(fe.x, my),
                Point::new(te.x, my),
                te,
                to.point,
            ]
        } else {
            let mx = (fe.x + te.x) / 2.0;
            vec![
                from.point,
                fe,
                Point::new(mx, fe.y),
                Point::new(mx, te.y),
                te,
                to.point,
            ]
        }
    } else if horizontal {
        // Parallel, same direction
        if (from.point.y - to.point.y).abs() < EPSILON {
            vec![from.point, to.point]
        } else {
            let level = if fd.x > 0.0 { fe.x.max(te.x) } else { fe.x.min(te.x) };
            vec![
                from.point,
                Point::new(level, from.point.y),
                Point::new(level, to.point.y),
                to.point,
            ]
        }
    } else if (from.point.x - to.point.x).abs() < EPSILON {
        vec![from.point, to.point]
    } else {
        let level = if fd.y > 0.0 { fe.y.max(te.y) } else { fe.y.min(te.y) };
        vec![
            from.point,
            Point::new(from.point.x, level),
            Point::new(to.point.x, level),
            to.point,
        ]
    };

    dedup_points(&raw, DEDUP_DISTANCE)
}

/// Merge consecutive points closer than `threshold`. The last input point
/// is always kept exactly.
pub fn dedup_points(points: &[Point], threshold: f64) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        match out.last() {
            Some(last) if last.distance(*p) < threshold => {}
            _ => out.push(*p),
        }
    }
    if let (Some(kept), Some(last)) = (out.last_mut(), points.last()) {
        *kept = *last;
    }
    out
}

/// Polyline with each interior corner replaced by a cubic arc.
///
/// The radius at a corner is capped at half the shorter adjacent segment.
/// Collinear vertices stay sharp.
pub fn rounded_path(points: &[Point], radius: f64) -> BezPath {
    let mut path = BezPath::new();
    let Some((first, rest)) = points.split_first() else {
        return path;
    };
    path.move_to(*first);
    if rest.is_empty() {
        return path;
    }

    for w in points.windows(3) {
        let (prev, corner, next) = (w[0], w[1], w[2]);
        let a = corner - prev;
        let b = next - corner;
        let r = radius.min(a.hypot() / 2.0).min(b.hypot() / 2.0);
        if a.cross(b).abs() < EPSILON || r < EPSILON {
            path.line_to(corner);
            continue;
        }
        let start = corner - geometry::normalize_or(a, Vec2::ZERO) * r;
        let end = corner + geometry::normalize_or(b, Vec2::ZERO) * r;
        path.line_to(start);
        path.curve_to(
            start + (corner - start) * KAPPA,
            end + (corner - end) * KAPPA,
            end,
        );
    }

    if let Some(last) = rest.last() {
        path.line_to(*last);
    }
    path
}

/// Control strength of a smooth connector.
pub fn smooth_strength(from: Point, to: Point) -> f64 {
    (from.distance(to) / 2.0).clamp(MIN_SMOOTH_STRENGTH, MAX_SMOOTH_STRENGTH)
}

pub fn smooth_curve(from: RouteEnd, to: RouteEnd) -> CubicBez {
    let strength = smooth_strength(from.point, to.point);
    CubicBez::new(
        from.point,
        from.point + from.direction * strength,
        to.point + to.direction * strength,
        to.point,
    )
}

/// `segments + 1` evenly spaced samples of a curve.
pub fn sample_curve(curve: CubicBez, segments: usize) -> Vec<Point> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| curve.eval(i as f64 / segments as f64))
        .collect()
}

/// A connector resolved against the document.
#[derive(Debug, Clone)]
pub struct EdgeGeometry {
    pub style: ConnectorStyle,
    pub from: RouteEnd,
    pub to: RouteEnd,
    pub path: BezPath,
    pub collision: Vec<Point>,
}

impl EdgeGeometry {
    /// Resolve endpoint positions and directions, then route.
    ///
    /// Returns `None` when a connected endpoint references a missing node.
    pub fn resolve(edge: &CanvasEdge, store: &EntityStore) -> Option<Self> {
        let style = edge.style.connector_style();
        let from_point = store.endpoint_position(&edge.from)?;
        let to_point = store.endpoint_position(&edge.to)?;

        let (from_dir, to_dir) = if style == ConnectorStyle::Straight {
            straight_directions(from_point, to_point)
        } else {
            (
                end_direction(&edge.from, to_point - from_point),
                end_direction(&edge.to, from_point - to_point),
            )
        };

        let from = RouteEnd::new(from_point, from_dir);
        let to = RouteEnd::new(to_point, to_dir);
        let Route { path, collision } = route(style, from, to);
        Some(Self {
            style,
            from,
            to,
            path,
            collision,
        })
    }

    pub fn bounds(&self) -> Rect {
        geometry::polyline_bounds(&self.collision)
            .unwrap_or_else(|| Rect::from_points(self.from.point, self.from.point))
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        geometry::point_to_polyline_dist(point, &self.collision) <= tolerance
    }

    /// Whether the route touches `rect`, or either end lies inside it.
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        rect.contains(self.from.point)
            || rect.contains(self.to.point)
            || geometry::polyline_intersects_rect(&self.collision, rect)
    }
}

fn end_direction(endpoint: &Endpoint, towards_other: Vec2) -> Vec2 {
    match endpoint {
        Endpoint::Connected { side, .. } => side_normal(*side),
        Endpoint::Free { .. } => free_direction(towards_other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanvasNode, NodeKind, ShapeNode, Style};
    use kurbo::PathEl;

    fn right(p: Point) -> RouteEnd {
        RouteEnd::new(p, Vec2::new(1.0, 0.0))
    }

    fn left(p: Point) -> RouteEnd {
        RouteEnd::new(p, Vec2::new(-1.0, 0.0))
    }

    fn up(p: Point) -> RouteEnd {
        RouteEnd::new(p, Vec2::new(0.0, -1.0))
    }

    fn is_orthogonal(points: &[Point]) -> bool {
        points
            .windows(2)
            .all(|w| (w[0].x - w[1].x).abs() < 1e-9 || (w[0].y - w[1].y).abs() < 1e-9)
    }

    #[test]
    fn test_stepped_opposed_sides_run_horizontally() {
        let mut store = EntityStore::new();
        store.insert_node(CanvasNode::new(
            "a",
            Rect::new(0.0, 0.0, 100.0, 100.0),
            NodeKind::Shape(ShapeNode::default()),
        ));
        store.insert_node(CanvasNode::new(
            "b",
            Rect::new(300.0, 0.0, 400.0, 100.0),
            NodeKind::Shape(ShapeNode::default()),
        ));
        let mut edge = CanvasEdge::new(
            "e",
            Endpoint::connected("a", Side::Right),
            Endpoint::connected("b", Side::Left),
        );
        edge.style = Style {
            connector: Some(ConnectorStyle::Stepped),
            ..Default::default()
        };

        let geometry = EdgeGeometry::resolve(&edge, &store).unwrap();
        let points = &geometry.collision;
        assert_eq!(points.first(), Some(&Point::new(100.0, 50.0)));
        assert_eq!(points.last(), Some(&Point::new(300.0, 50.0)));
        for p in &points[1..points.len() - 1] {
            assert!(p.x > 100.0 + STEP_OFFSET && p.x < 300.0 - STEP_OFFSET);
        }
        assert!(points.iter().all(|p| (p.y - 50.0).abs() < 1e-9));
    }

    #[test]
    fn test_stepped_perpendicular_uses_ray_intersection() {
        let points = stepped_points(
            right(Point::new(100.0, 50.0)),
            up(Point::new(350.0, 200.0)),
        );
        assert_eq!(
            points,
            vec![
                Point::new(100.0, 50.0),
                Point::new(350.0, 50.0),
                Point::new(350.0, 200.0)
            ]
        );
    }

    #[test]
    fn test_stepped_perpendicular_diverging_falls_back_to_elbow() {
        let points = stepped_points(right(Point::new(100.0, 50.0)), up(Point::new(350.0, 0.0)));
        assert_eq!(points.len(), 5);
        assert_eq!(points[1], Point::new(120.0, 50.0));
        assert_eq!(points[2], Point::new(120.0, -20.0));
        assert_eq!(points[3], Point::new(350.0, -20.0));
        assert!(is_orthogonal(&points));
    }

    #[test]
    fn test_stepped_facing_away_goes_through_extensions() {
        let points = stepped_points(right(Point::new(300.0, 0.0)), left(Point::new(0.0, 100.0)));
        assert_eq!(points[1], Point::new(320.0, 0.0));
        assert_eq!(points[points.len() - 2], Point::new(-20.0, 100.0));
        assert!(is_orthogonal(&points));
    }

    #[test]
    fn test_stepped_same_direction_makes_u_turn() {
        let points = stepped_points(right(Point::new(0.0, 0.0)), right(Point::new(50.0, 100.0)));
        assert_eq!(points[1], Point::new(70.0, 0.0));
        assert_eq!(points[2], Point::new(70.0, 100.0));
        assert!(is_orthogonal(&points));
    }

    #[test]
    fn test_dedup_merges_close_points_and_keeps_last() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(0.2, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.3, 0.0),
        ];
        let out = dedup_points(&points, DEDUP_DISTANCE);
        assert_eq!(out, vec![Point::new(0.0, 0.0), Point::new(10.3, 0.0)]);
    }

    #[test]
    fn test_corner_radius_capped_by_short_segment() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(6.0, 0.0),
            Point::new(6.0, 100.0),
        ];
        let path = rounded_path(&points, CORNER_RADIUS);
        let elements: Vec<PathEl> = path.elements().to_vec();
        // move, line to arc start, arc, final line
        assert_eq!(elements.len(), 4);
        match elements[1] {
            PathEl::LineTo(p) => assert!((p.x - 3.0).abs() < 1e-9),
            other => panic!("unexpected element {other:?}"),
        }
        match elements[2] {
            PathEl::CurveTo(_, _, end) => {
                assert!((end.x - 6.0).abs() < 1e-9);
                assert!((end.y - 3.0).abs() < 1e-9);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn test_smooth_strength_is_clamped() {
        assert_eq!(smooth_strength(Point::ZERO, Point::new(1.0, 0.0)), 1.0);
        assert_eq!(smooth_strength(Point::ZERO, Point::new(100.0, 0.0)), 50.0);
        assert_eq!(smooth_strength(Point::ZERO, Point::new(1000.0, 0.0)), 200.0);
    }

    #[test]
    fn test_smooth_collision_sampling() {
        let samples = collision_polyline(
            ConnectorStyle::Smooth,
            right(Point::ZERO),
            left(Point::new(100.0, 100.0)),
        );
        assert_eq!(samples.len(), SMOOTH_SAMPLES + 1);
        assert_eq!(samples[0], Point::ZERO);
        assert!(samples[SMOOTH_SAMPLES].distance(Point::new(100.0, 100.0)) < 1e-9);
    }

    #[test]
    fn test_straight_directions_are_opposite() {
        let (a, b) = straight_directions(Point::ZERO, Point::new(0.0, 10.0));
        assert_eq!(a, Vec2::new(0.0, 1.0));
        assert_eq!(b, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_free_endpoint_uses_dominant_axis() {
        let store = EntityStore::new();
        let mut edge = CanvasEdge::new(
            "e",
            Endpoint::free(Point::ZERO),
            Endpoint::free(Point::new(10.0, 40.0)),
        );
        edge.style.connector = Some(ConnectorStyle::Smooth);
        let geometry = EdgeGeometry::resolve(&edge, &store).unwrap();
        assert_eq!(geometry.from.direction, Vec2::new(0.0, 1.0));
        assert_eq!(geometry.to.direction, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_missing_node_does_not_resolve() {
        let store = EntityStore::new();
        let edge = CanvasEdge::new(
            "e",
            Endpoint::connected("gone", Side::Top),
            Endpoint::free(Point::ZERO),
        );
        assert!(EdgeGeometry::resolve(&edge, &store).is_none());
    }
}
