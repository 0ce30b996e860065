//! Rubber-band selection.

use super::{EditorState, Operator, ToolEvent};
use crate::input::{HitTarget, exceeds_threshold};
use crate::selection::SelectionSet;
use kurbo::{Point, Rect};

/// Selects everything touched by the rectangle dragged from empty canvas.
///
/// Without shift the previous selection is cleared on pointer-down; with
/// shift it is stashed and merged back into every rubber-band result.
#[derive(Debug, Default)]
pub struct SelectOperator {
    origin: Option<(Point, Point)>,
    rubber_band: Option<Rect>,
    selection_before: SelectionSet,
}

impl SelectOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current rubber-band rectangle in world space.
    pub fn rubber_band(&self) -> Option<Rect> {
        self.rubber_band
    }
}

impl Operator for SelectOperator {
    fn name(&self) -> &'static str {
        "select"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        if event.target != HitTarget::Empty {
            return false;
        }
        state.begin_edit();
        self.selection_before = state.selection.set().clone();
        if event.modifiers.shift {
            state.selection.stash();
        } else {
            state.selection.clear();
            state.selection.clear_stash();
        }
        self.origin = Some((event.page, event.world));
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let Some((page, world)) = self.origin else {
            return;
        };
        if self.rubber_band.is_none()
            && !exceeds_threshold(page, event.page, state.config.select_activation_distance)
        {
            return;
        }
        let rect = Rect::from_points(world, event.world);
        self.rubber_band = Some(rect);

        let (nodes, edges) = state.document.query_rect(rect);
        let store = state.document.store();
        state
            .selection
            .replace(nodes.iter().chain(&edges).map(String::as_str), store);
        if event.modifiers.shift {
            state.selection.merge_stash();
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        self.preview(state, event);
        state.selection.clear_stash();
        if state.selection.set() != &self.selection_before {
            state.history.close();
        } else {
            state.history.discard();
        }
    }

    fn abort(&mut self, state: &mut EditorState) {
        state.selection.restore(std::mem::take(&mut self.selection_before));
        state.selection.clear_stash();
        state.history.discard();
    }

    fn reset(&mut self) {
        self.origin = None;
        self.rubber_band = None;
        self.selection_before = SelectionSet::default();
    }

    fn active(&self) -> bool {
        self.rubber_band.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Lifecycle;
    use crate::input::Modifiers;
    use crate::model::{CanvasNode, EntityId, NodeKind, ShapeNode};

    fn node(state: &mut EditorState, rect: Rect) -> EntityId {
        state.document.create_node(
            CanvasNode::new("", rect, NodeKind::Shape(ShapeNode::default())),
            Lifecycle::Persisted,
        )
    }

    #[test]
    fn test_rubber_band_selects_intersecting_nodes() {
        let mut state = EditorState::default();
        let a = node(&mut state, Rect::new(0.0, 0.0, 50.0, 50.0));
        let b = node(&mut state, Rect::new(200.0, 200.0, 250.0, 250.0));

        let mut op = SelectOperator::new();
        assert!(op.start(&mut state, &ToolEvent::at(Point::new(-10.0, -10.0), HitTarget::Empty)));
        let ev = ToolEvent::at(Point::new(20.0, 20.0), HitTarget::Empty);
        op.preview(&mut state, &ev);
        assert!(op.active());
        op.commit(&mut state, &ev);

        assert!(state.selection.is_selected(&a));
        assert!(!state.selection.is_selected(&b));
        assert!(state.history.can_undo());
    }

    #[test]
    fn test_activation_distance() {
        let mut state = EditorState::default();
        let mut op = SelectOperator::new();
        op.start(&mut state, &ToolEvent::at(Point::ZERO, HitTarget::Empty));
        op.preview(&mut state, &ToolEvent::at(Point::new(3.0, 3.0), HitTarget::Empty));
        assert!(!op.active());
        op.preview(&mut state, &ToolEvent::at(Point::new(6.0, 0.0), HitTarget::Empty));
        assert!(op.active());
    }

    #[test]
    fn test_shift_adds_to_stashed_selection() {
        let mut state = EditorState::default();
        let a = node(&mut state, Rect::new(0.0, 0.0, 50.0, 50.0));
        let b = node(&mut state, Rect::new(200.0, 200.0, 250.0, 250.0));
        state.selection.select(&a, state.document.store());

        let mut op = SelectOperator::new();
        let shift = Modifiers::SHIFT;
        op.start(
            &mut state,
            &ToolEvent::at(Point::new(190.0, 190.0), HitTarget::Empty).with_modifiers(shift),
        );
        let ev = ToolEvent::at(Point::new(260.0, 260.0), HitTarget::Empty).with_modifiers(shift);
        op.preview(&mut state, &ev);
        op.commit(&mut state, &ev);

        assert!(state.selection.is_selected(&a));
        assert!(state.selection.is_selected(&b));
    }

    #[test]
    fn test_click_on_empty_clears_selection() {
        let mut state = EditorState::default();
        let a = node(&mut state, Rect::new(0.0, 0.0, 50.0, 50.0));
        state.selection.select(&a, state.document.store());
        let mut op = SelectOperator::new();
        let ev = ToolEvent::at(Point::new(500.0, 500.0), HitTarget::Empty);
        op.start(&mut state, &ev);
        op.commit(&mut state, &ev);
        assert!(state.selection.is_empty());
        assert!(!op.active());
    }
}
