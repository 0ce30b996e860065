//! Resize the selection by one of its eight handles.

use super::{DragTracker, EditorState, Operator, ToolEvent};
use crate::geometry::{EPSILON, RatioRect, SignedRect};
use crate::input::HitTarget;
use crate::model::{CanvasNode, EntityId, Endpoint, NodeKind};
use crate::selection::Anchor;
use kurbo::{Point, Rect};

#[derive(Debug, Clone)]
struct Member {
    ratio: RatioRect,
    original: CanvasNode,
}

#[derive(Debug, Clone)]
struct EdgeMember {
    id: EntityId,
    from: Option<(Point, RatioRect)>,
    to: Option<(Point, RatioRect)>,
}

#[derive(Debug, Clone)]
struct Gesture {
    anchor: Anchor,
    frame: Rect,
    tracker: DragTracker,
    media_only: bool,
    nodes: Vec<Member>,
    edges: Vec<EdgeMember>,
}

/// Maps every selected node and free edge endpoint from the original
/// selection frame onto the dragged frame.
///
/// The frame is signed: dragging a handle across the opposite side mirrors
/// instead of clamping. Alt scales about the center; proportional scaling
/// is the default for media-only selections and shift toggles it.
#[derive(Debug, Default)]
pub struct RescaleOperator {
    gesture: Option<Gesture>,
}

impl RescaleOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dragged frame for the pointer in `event`.
    fn outer_frame(gesture: &Gesture, event: &ToolEvent) -> SignedRect {
        let frame = gesture.frame;
        let (hx, hy) = gesture.anchor.signs();
        let delta = event.world - gesture.tracker.origin_world;
        let centered = event.modifiers.alt;
        let factor = if centered { 2.0 } else { 1.0 };

        let mut width = frame.width() + delta.x * hx * factor;
        let mut height = frame.height() + delta.y * hy * factor;

        let proportional = gesture.media_only != event.modifiers.shift;
        if proportional && frame.width() > EPSILON && frame.height() > EPSILON {
            let sx = width / frame.width();
            let sy = height / frame.height();
            let scale = if hy == 0.0 {
                sx
            } else if hx == 0.0 {
                sy
            } else if sx.abs() >= sy.abs() {
                sx
            } else {
                sy
            };
            width = frame.width() * scale;
            height = frame.height() * scale;
        }

        let center = frame.center();
        let place = |sign: f64, lo: f64, hi: f64, mid: f64, size: f64| {
            if centered || sign == 0.0 {
                mid - size / 2.0
            } else if sign > 0.0 {
                lo
            } else {
                hi - size
            }
        };
        // An axis the handle leaves alone stays put unless proportional
        // scaling changed its size.
        let x = if hx == 0.0 && (width - frame.width()).abs() < EPSILON && !centered {
            frame.x0
        } else {
            place(hx, frame.x0, frame.x1, center.x, width)
        };
        let y = if hy == 0.0 && (height - frame.height()).abs() < EPSILON && !centered {
            frame.y0
        } else {
            place(hy, frame.y0, frame.y1, center.y, height)
        };
        SignedRect::new(x, y, width, height)
    }

    fn apply(gesture: &Gesture, state: &mut EditorState, outer: SignedRect, finish: bool) {
        for member in &gesture.nodes {
            let target = member.ratio.resolve(outer);
            let original = &member.original;
            state.document.update_node(
                &original.id,
                |node| rescale_node(node, original, target, finish),
                finish,
            );
        }
        for edge in &gesture.edges {
            let map = |ratio: &RatioRect| {
                let r = ratio.resolve(outer);
                Point::new(r.x, r.y)
            };
            state.document.update_edge(
                &edge.id,
                |e| {
                    if let Some((_, ratio)) = &edge.from {
                        e.from = Endpoint::free(map(ratio));
                    }
                    if let Some((_, ratio)) = &edge.to {
                        e.to = Endpoint::free(map(ratio));
                    }
                },
                finish,
            );
        }
    }

    fn restore(gesture: &Gesture, state: &mut EditorState) {
        for member in &gesture.nodes {
            let original = member.original.clone();
            state
                .document
                .update_node(&member.original.id, |node| *node = original, false);
        }
        for edge in &gesture.edges {
            state.document.update_edge(
                &edge.id,
                |e| {
                    if let Some((p, _)) = &edge.from {
                        e.from = Endpoint::free(*p);
                    }
                    if let Some((p, _)) = &edge.to {
                        e.to = Endpoint::free(*p);
                    }
                },
                false,
            );
        }
    }
}

/// Fit one node into `target`, a signed rect in world space.
fn rescale_node(node: &mut CanvasNode, original: &CanvasNode, target: SignedRect, finish: bool) {
    let rect = target.normalized();
    if matches!(node.kind, NodeKind::Text(_)) {
        node.x = rect.x0;
        node.y = rect.y0;
        node.width = rect.width();
        return;
    }
    if matches!(node.kind, NodeKind::File(_)) {
        let height = if original.width > EPSILON {
            rect.width() * original.height / original.width
        } else {
            rect.height()
        };
        node.set_rect(Rect::from_origin_size(rect.origin(), (rect.width(), height)));
        return;
    }
    node.set_rect(rect);

    if let Some(pencil) = node.as_pencil_mut() {
        let (bx, by) = original
            .as_pencil()
            .map(|p| (p.scale_x, p.scale_y))
            .unwrap_or((1.0, 1.0));
        let (w, h) = (original.width, original.height);
        pencil.scale_x = if w > EPSILON { bx * rect.width() / w } else { bx };
        pencil.scale_y = if h > EPSILON { by * rect.height() / h } else { by };
        if finish {
            pencil.bake_scale();
        }
    }
    if let Some(media) = node.as_media_mut() {
        let (fx, fy) = match &original.kind {
            NodeKind::Image(m) | NodeKind::Video(m) => (m.flip_x, m.flip_y),
            _ => (false, false),
        };
        media.flip_x = fx != target.flipped_x();
        media.flip_y = fy != target.flipped_y();
    }
}

impl Operator for RescaleOperator {
    fn name(&self) -> &'static str {
        "rescale"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        let HitTarget::ResizeHandle(anchor) = &event.target else {
            return false;
        };
        let anchor = *anchor;
        let Some(frame) = state.selection.bounds(&state.document) else {
            return false;
        };
        let store = state.document.store();
        let nodes = state
            .selection
            .nodes()
            .filter_map(|id| store.node(id))
            .filter(|n| !n.is_auto_fit())
            .map(|n| Member {
                ratio: RatioRect::of(n.bounds(), frame),
                original: n.clone(),
            })
            .collect();
        let edges = state
            .selection
            .edges()
            .filter_map(|id| store.edge(id))
            .filter(|e| e.from.is_free() || e.to.is_free())
            .map(|e| EdgeMember {
                id: e.id.clone(),
                from: e.from.free_point().map(|p| (p, RatioRect::of_point(p, frame))),
                to: e.to.free_point().map(|p| (p, RatioRect::of_point(p, frame))),
            })
            .collect();
        let media_only = state.selection.is_media_only(store);

        state.begin_edit();
        log::debug!("Rescale from {:?} of {:?}", anchor, frame);
        self.gesture = Some(Gesture {
            anchor,
            frame,
            tracker: DragTracker::new(event),
            media_only,
            nodes,
            edges,
        });
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if gesture.tracker.update(event, threshold) {
            let outer = Self::outer_frame(gesture, event);
            Self::apply(gesture, state, outer, false);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if gesture.tracker.update(event, threshold) {
            let outer = Self::outer_frame(gesture, event);
            Self::apply(gesture, state, outer, true);
            state.history.close();
        } else {
            Self::restore(gesture, state);
            state.history.discard();
        }
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(gesture) = &self.gesture {
            Self::restore(gesture, state);
        }
        state.history.discard();
    }

    fn reset(&mut self) {
        self.gesture = None;
    }

    fn active(&self) -> bool {
        self.gesture.as_ref().is_some_and(|g| g.tracker.dragging)
    }
}
