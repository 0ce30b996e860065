//! Draw a new connector or re-attach an end of an existing one.

use super::{DragTracker, EditorState, Operator, ToolEvent};
use crate::document::Lifecycle;
use crate::input::HitTarget;
use crate::model::{CanvasEdge, EdgeEnd, EntityId, Endpoint};
use crate::snap::snap_line_endpoint;
use kurbo::Point;

#[derive(Debug, Clone)]
struct Gesture {
    edge_id: EntityId,
    /// End following the pointer.
    end: EdgeEnd,
    tracker: DragTracker,
    /// The edge as it was before a re-attach; `None` for a new preview edge.
    original: Option<CanvasEdge>,
}

/// Drags one endpoint of an edge and binds it to the node under the
/// pointer on release.
///
/// New edges live as previews until the gesture commits. A click that
/// never becomes a drag discards the preview. Shift snaps the free end to
/// 45 degree increments around the fixed end.
#[derive(Debug, Default)]
pub struct ConnectOperator {
    /// Start from any point (the connector tool) rather than only from a
    /// node's connector anchors.
    anywhere: bool,
    gesture: Option<Gesture>,
}

impl ConnectOperator {
    /// Only reacts to connector anchors and edge endpoint handles.
    pub fn anchors_only() -> Self {
        Self::default()
    }

    /// Starts a connector wherever the pointer goes down.
    pub fn anywhere() -> Self {
        Self {
            anywhere: true,
            gesture: None,
        }
    }

    /// Where the moving end should go: bound to a node when one is under
    /// the pointer, free at the (possibly snapped) pointer otherwise.
    fn target_endpoint(
        state: &EditorState,
        gesture: &Gesture,
        event: &ToolEvent,
    ) -> Endpoint {
        let store = state.document.store();
        let fixed = store
            .edge(&gesture.edge_id)
            .map(|e| e.endpoint(gesture.end.other()).clone());
        let fixed_node = fixed.as_ref().and_then(|f| f.node_id()).map(String::from);

        if let HitTarget::ConnectAnchor { node_id, side } = &event.target {
            if fixed_node.as_deref() != Some(node_id.as_str()) && store.node(node_id).is_some() {
                return Endpoint::connected(node_id.clone(), *side);
            }
        }
        if let Some(node_id) = state.document.node_at(event.world, fixed_node.as_deref()) {
            if let Some(node) = store.node(&node_id) {
                let side = node.nearest_side(event.world);
                return Endpoint::connected(node_id, side);
            }
        }

        let fixed_point = fixed.as_ref().and_then(|f| store.endpoint_position(f));
        let point = match fixed_point {
            Some(anchor) => snapped_end(anchor, event.world, event.modifiers.shift),
            None => event.world,
        };
        Endpoint::free(point)
    }

    fn set_end(state: &mut EditorState, gesture: &Gesture, endpoint: Endpoint, autosave: bool) {
        state.document.update_edge(
            &gesture.edge_id,
            |e| *e.endpoint_mut(gesture.end) = endpoint,
            autosave,
        );
    }

    /// Free end at the pointer, for previews.
    fn follow_pointer(state: &EditorState, gesture: &Gesture, event: &ToolEvent) -> Endpoint {
        let store = state.document.store();
        let anchor = store
            .edge(&gesture.edge_id)
            .and_then(|e| store.endpoint_position(e.endpoint(gesture.end.other())));
        match anchor {
            Some(anchor) => {
                Endpoint::free(snapped_end(anchor, event.world, event.modifiers.shift))
            }
            None => Endpoint::free(event.world),
        }
    }
}

/// Pointer position, rotated onto the nearest 45° ray about `anchor` when
/// `enabled`.
fn snapped_end(anchor: Point, pointer: Point, enabled: bool) -> Point {
    let snap = snap_line_endpoint(anchor, pointer, enabled);
    if snap.snapped {
        log::trace!("Connector end snapped to {:.0}°", snap.angle_degrees);
    }
    snap.point
}

impl Operator for ConnectOperator {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        if let HitTarget::EdgeEndpoint { edge_id, end } = &event.target {
            let Some(original) = state.document.edge(edge_id).cloned() else {
                return false;
            };
            state.begin_edit();
            self.gesture = Some(Gesture {
                edge_id: edge_id.clone(),
                end: *end,
                tracker: DragTracker::new(event),
                original: Some(original),
            });
            return true;
        }

        let from = match &event.target {
            HitTarget::ConnectAnchor { node_id, side } => {
                Endpoint::connected(node_id.clone(), *side)
            }
            HitTarget::Node(node_id) if self.anywhere => {
                let Some(node) = state.document.node(node_id) else {
                    return false;
                };
                Endpoint::connected(node_id.clone(), node.nearest_side(event.world))
            }
            _ if self.anywhere => Endpoint::free(event.world),
            _ => return false,
        };

        state.begin_edit();
        let mut edge = CanvasEdge::new("", from, Endpoint::free(event.world));
        edge.style = state.config.default_style.clone();
        let edge_id = state.document.create_edge(edge, Lifecycle::Preview);
        self.gesture = Some(Gesture {
            edge_id,
            end: EdgeEnd::To,
            tracker: DragTracker::new(event),
            original: None,
        });
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if gesture.tracker.update(event, threshold) {
            let endpoint = Self::follow_pointer(state, gesture, event);
            Self::set_end(state, gesture, endpoint, false);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if !gesture.tracker.update(event, threshold) {
            self.abort(state);
            return;
        }

        let endpoint = Self::target_endpoint(state, gesture, event);
        Self::set_end(state, gesture, endpoint, true);
        if gesture.original.is_none() {
            state.document.promote(&gesture.edge_id);
        }
        let store = state.document.store();
        state.selection.replace([gesture.edge_id.as_str()], store);
        state.history.close();
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(gesture) = &self.gesture {
            match &gesture.original {
                Some(original) => {
                    let original = original.clone();
                    state
                        .document
                        .update_edge(&gesture.edge_id, |e| *e = original, false);
                }
                None => {
                    state.document.discard_preview(&gesture.edge_id);
                }
            }
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
