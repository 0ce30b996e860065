//! Viewport panning.

use super::{EditorState, Operator, ToolEvent};
use kurbo::Point;

/// Pans the camera by the page-space pointer motion. Never touches the
/// document or history.
#[derive(Debug, Default)]
pub struct GrabOperator {
    last: Option<Point>,
    moved: bool,
}

impl GrabOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for GrabOperator {
    fn name(&self) -> &'static str {
        "grab"
    }

    fn start(&mut self, _state: &mut EditorState, event: &ToolEvent) -> bool {
        self.last = Some(event.page);
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let Some(last) = self.last else {
            return;
        };
        let delta = event.page - last;
        if delta.hypot2() > 0.0 {
            state.camera.pan(delta);
            self.moved = true;
        }
        self.last = Some(event.page);
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        self.preview(state, event);
    }

    fn abort(&mut self, _state: &mut EditorState) {}

    fn reset(&mut self) {
        self.last = None;
        self.moved = false;
    }

    fn active(&self) -> bool {
        self.moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::HitTarget;
    use kurbo::Vec2;

    #[test]
    fn test_grab_pans_camera() {
        let mut state = EditorState::default();
        let mut op = GrabOperator::new();
        op.start(&mut state, &ToolEvent::at(Point::new(10.0, 10.0), HitTarget::Empty));
        op.preview(&mut state, &ToolEvent::at(Point::new(30.0, 15.0), HitTarget::Empty));
        op.commit(&mut state, &ToolEvent::at(Point::new(40.0, 20.0), HitTarget::Empty));
        assert_eq!(state.camera.offset, Vec2::new(30.0, 10.0));
        assert!(op.active());
        assert!(state.history.is_empty());
    }
}
