//! Free-hand strokes.

use super::{DragTracker, EditorState, Operator, ToolEvent};
use crate::document::Lifecycle;
use crate::geometry::{self, point_to_segment_dist};
use crate::model::{CanvasNode, EntityId, NodeKind, PencilNode};
use kurbo::{Point, Rect};

/// Simplification tolerance in world units.
pub const SIMPLIFY_TOLERANCE: f64 = 0.25;

/// Drop points closer than `tolerance` to the previously kept one, then run
/// Ramer-Douglas-Peucker. The first and last points always survive.
pub fn simplify_stroke(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let radial = radial_distance(points, tolerance);
    rdp(&radial, tolerance)
}

fn radial_distance(points: &[Point], tolerance: f64) -> Vec<Point> {
    let Some((&first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut kept = vec![first];
    let mut last = first;
    for &p in rest {
        if p.distance(last) > tolerance {
            kept.push(p);
            last = p;
        }
    }
    if let Some(&end) = points.last() {
        if last != end {
            kept.push(end);
        }
    }
    kept
}

fn rdp(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;
    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp(&points[..=max_index], tolerance);
        let right = rdp(&points[max_index..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Distance from `point` to the infinite line through `a` and `b`.
fn perpendicular_distance(point: Point, a: Point, b: Point) -> f64 {
    let d = b - a;
    let len = d.hypot();
    if len < geometry::EPSILON {
        return point_to_segment_dist(point, a, b);
    }
    (point - a).cross(d).abs() / len
}

/// Records pointer samples into a preview pencil node and simplifies them
/// into a persisted stroke on release.
#[derive(Debug, Default)]
pub struct PencilOperator {
    node_id: Option<EntityId>,
    tracker: Option<DragTracker>,
    points: Vec<Point>,
}

impl PencilOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `points` (world space) as the stroke of `id`, rebased so that the
    /// node position is the top-left of the stroke.
    fn write_stroke(state: &mut EditorState, id: &str, points: &[Point], autosave: bool) {
        let bounds = geometry::polyline_bounds(points)
            .unwrap_or_else(|| Rect::from_points(Point::ZERO, Point::ZERO));
        let origin = bounds.origin();
        let coords: Vec<Point> = points
            .iter()
            .map(|p| (*p - origin).to_point())
            .collect();
        state.document.update_node(
            id,
            |node| {
                node.set_rect(bounds);
                node.kind = NodeKind::Pencil(PencilNode::new(coords));
            },
            autosave,
        );
    }
}

impl Operator for PencilOperator {
    fn name(&self) -> &'static str {
        "pencil"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        state.begin_edit();
        let mut node = CanvasNode::new(
            "",
            Rect::from_points(event.world, event.world),
            NodeKind::Pencil(PencilNode::new(vec![Point::ZERO])),
        );
        node.style = state.config.default_style.clone();
        self.node_id = Some(state.document.create_node(node, Lifecycle::Preview));
        self.tracker = Some(DragTracker::new(event));
        self.points = vec![event.world];
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let (Some(id), Some(tracker)) = (&self.node_id, self.tracker.as_mut()) else {
            return;
        };
        tracker.update(event, threshold);
        if self.points.last() != Some(&event.world) {
            self.points.push(event.world);
        }
        Self::write_stroke(state, id, &self.points, false);
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let (Some(id), Some(tracker)) = (self.node_id.clone(), self.tracker.as_mut()) else {
            return;
        };
        if !tracker.update(event, threshold) {
            self.abort(state);
            return;
        }
        if self.points.last() != Some(&event.world) {
            self.points.push(event.world);
        }
        let simplified = simplify_stroke(&self.points, SIMPLIFY_TOLERANCE);
        log::debug!(
            "Pencil stroke simplified from {} to {} points",
            self.points.len(),
            simplified.len()
        );
        Self::write_stroke(state, &id, &simplified, false);
        state.document.promote(&id);
        state.history.close();
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(id) = &self.node_id {
            state.document.discard_preview(id);
        }
        state.history.discard();
    }

    fn reset(&mut self) {
        self.node_id = None;
        self.tracker = None;
        self.points.clear();
    }

    fn active(&self) -> bool {
        self.node_id.is_some()
    }
}
