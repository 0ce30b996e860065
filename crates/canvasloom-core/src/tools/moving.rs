//! Drag selected entities.

use super::{DragTracker, EditorState, Operator, ToolEvent};
use crate::input::HitTarget;
use crate::model::{EntityId, Endpoint};
use crate::selection::SelectionSet;
use kurbo::{Point, Vec2};

/// Translates the selected nodes and the free endpoints of selected edges.
///
/// Connected edges follow their nodes through routing. Holding shift locks
/// the motion to the axis with the larger delta.
#[derive(Debug, Default)]
pub struct MoveOperator {
    tracker: Option<DragTracker>,
    nodes: Vec<(EntityId, Point)>,
    /// Edge id, original `from` and `to` free points.
    edges: Vec<(EntityId, Option<Point>, Option<Point>)>,
    selection_before: SelectionSet,
}

impl MoveOperator {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, state: &mut EditorState, delta: Vec2, autosave: bool) {
        for (id, origin) in &self.nodes {
            state
                .document
                .update_node(id, |n| n.set_position(*origin + delta), autosave);
        }
        for (id, from, to) in &self.edges {
            state.document.update_edge(
                id,
                |e| {
                    if let Some(p) = from {
                        e.from = Endpoint::free(*p + delta);
                    }
                    if let Some(p) = to {
                        e.to = Endpoint::free(*p + delta);
                    }
                },
                autosave,
            );
        }
    }

    fn delta(&self, event: &ToolEvent) -> Vec2 {
        let Some(tracker) = &self.tracker else {
            return Vec2::ZERO;
        };
        let mut delta = event.world - tracker.origin_world;
        if event.modifiers.shift {
            if delta.x.abs() < delta.y.abs() {
                delta.x = 0.0;
            } else {
                delta.y = 0.0;
            }
        }
        delta
    }
}

impl Operator for MoveOperator {
    fn name(&self) -> &'static str {
        "move"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        let id = match &event.target {
            HitTarget::Node(id) | HitTarget::Edge(id) => id.clone(),
            _ => return false,
        };
        if !state.document.store().has_id(&id) {
            return false;
        }
        state.begin_edit();
        self.selection_before = state.selection.set().clone();
        let store = state.document.store();
        if event.modifiers.shift {
            state.selection.toggle(&id, store);
        } else if !state.selection.is_selected(&id) {
            state.selection.replace([id.as_str()], store);
        }

        self.nodes = state
            .selection
            .nodes()
            .filter_map(|n| store.node(n))
            .map(|n| (n.id.clone(), n.position()))
            .collect();
        self.edges = state
            .selection
            .edges()
            .filter_map(|e| store.edge(e))
            .map(|e| (e.id.clone(), e.from.free_point(), e.to.free_point()))
            .filter(|(_, from, to)| from.is_some() || to.is_some())
            .collect();
        self.tracker = Some(DragTracker::new(event));
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        if tracker.update(event, threshold) {
            let delta = self.delta(event);
            self.apply(state, delta, false);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let threshold = state.config.drag_threshold;
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        if tracker.update(event, threshold) {
            let delta = self.delta(event);
            self.apply(state, delta, true);
            state.history.close();
        } else if state.selection.set() != &self.selection_before {
            state.history.close();
        } else {
            state.history.discard();
        }
    }

    fn abort(&mut self, state: &mut EditorState) {
        if self.tracker.is_some() {
            self.apply(state, Vec2::ZERO, false);
        }
        state.history.discard();
    }

    fn reset(&mut self) {
        self.tracker = None;
        self.nodes.clear();
        self.edges.clear();
        self.selection_before = SelectionSet::default();
    }

    fn active(&self) -> bool {
        self.tracker.is_some_and(|t| t.dragging)
    }
}
