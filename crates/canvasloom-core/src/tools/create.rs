//! Operators that drag out a new node.

use super::{DragTracker, EditorState, Operator, ToolEvent};
use crate::document::Lifecycle;
use crate::geometry::SignedRect;
use crate::model::{
    AUTO_FIT_SIZE, CanvasNode, EntityId, FileNode, LoadStatus, MediaNode, NodeKind, ShapeKind,
    ShapeNode, TextNode,
};
use kurbo::{Point, Rect, Size};

/// An in-flight creation: the preview node and where the drag began.
#[derive(Debug, Clone)]
struct Draft {
    node_id: EntityId,
    tracker: DragTracker,
}

impl Draft {
    fn begin(state: &mut EditorState, event: &ToolEvent, kind: NodeKind) -> Self {
        state.begin_edit();
        let mut node = CanvasNode::new("", Rect::from_points(event.world, event.world), kind);
        node.style = state.config.default_style.clone();
        let node_id = state.document.create_node(node, Lifecycle::Preview);
        Self {
            node_id,
            tracker: DragTracker::new(event),
        }
    }

    /// Stretch the preview to the pointer; extents stay signed.
    fn follow(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        if !self.tracker.update(event, state.config.drag_threshold) {
            return false;
        }
        let drag = SignedRect::from_drag(self.tracker.origin_world, event.world);
        state.document.update_node(
            &self.node_id,
            |n| {
                n.width = drag.width;
                n.height = drag.height;
            },
            false,
        );
        true
    }

    fn dragged_rect(&self, event: &ToolEvent) -> Rect {
        SignedRect::from_drag(self.tracker.origin_world, event.world).normalized()
    }

    /// Persist the preview with `rect` and select it.
    fn finish(&self, state: &mut EditorState, rect: Rect) {
        state
            .document
            .update_node(&self.node_id, |n| n.set_rect(rect), false);
        state.document.promote(&self.node_id);
        let store = state.document.store();
        state.selection.replace([self.node_id.as_str()], store);
        state.history.close();
    }

    fn cancel(&self, state: &mut EditorState) {
        state.document.discard_preview(&self.node_id);
        state.history.discard();
    }
}

/// Rectangles and ellipses. Shapes below the minimum size are dropped.
#[derive(Debug)]
pub struct ShapeCreateOperator {
    shape: ShapeKind,
    draft: Option<Draft>,
}

impl ShapeCreateOperator {
    pub fn new(shape: ShapeKind) -> Self {
        Self { shape, draft: None }
    }
}

impl Operator for ShapeCreateOperator {
    fn name(&self) -> &'static str {
        "create-shape"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        let kind = NodeKind::Shape(ShapeNode { shape: self.shape });
        self.draft = Some(Draft::begin(state, event, kind));
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if let Some(draft) = self.draft.as_mut() {
            draft.follow(state, event);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        draft.follow(state, event);
        let rect = draft.dragged_rect(event);
        let min = state.config.min_shape_size;
        if rect.width() < min || rect.height() < min {
            log::debug!("Discarding {:?} smaller than {}", rect.size(), min);
            draft.cancel(state);
        } else {
            draft.finish(state, rect);
        }
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(draft) = &self.draft {
            draft.cancel(state);
        }
    }

    fn reset(&mut self) {
        self.draft = None;
    }

    fn active(&self) -> bool {
        self.draft.is_some()
    }
}

/// Text boxes. A click (or a drag shorter than `min_text_drag`) creates a
/// box whose width follows its content; editing starts right away.
#[derive(Debug, Default)]
pub struct TextCreateOperator {
    draft: Option<Draft>,
}

impl TextCreateOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for TextCreateOperator {
    fn name(&self) -> &'static str {
        "create-text"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        self.draft = Some(Draft::begin(
            state,
            event,
            NodeKind::Text(TextNode::default()),
        ));
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if let Some(draft) = self.draft.as_mut() {
            draft.follow(state, event);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        draft.follow(state, event);
        let text_size = state.config.default_text_size;
        let min = state.config.min_text_drag;
        let dragged = draft.dragged_rect(event);
        let follow_width = dragged.width() < min && dragged.height() < min;
        let rect = if follow_width {
            Rect::from_origin_size(draft.tracker.origin_world, Size::new(0.0, text_size))
        } else {
            let height = dragged.height().max(text_size);
            Rect::from_origin_size(dragged.origin(), Size::new(dragged.width(), height))
        };
        state.document.update_node(
            &draft.node_id,
            |n| {
                if n.style.text_size.is_none() {
                    n.style.text_size = Some(text_size);
                }
                if let Some(text) = n.as_text_mut() {
                    text.follow_text_width = follow_width;
                }
            },
            false,
        );
        draft.finish(state, rect);
        state.editing = Some(draft.node_id.clone());
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(draft) = &self.draft {
            draft.cancel(state);
        }
    }

    fn reset(&mut self) {
        self.draft = None;
    }

    fn active(&self) -> bool {
        self.draft.is_some()
    }
}

/// Media waiting to be placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingMedia {
    Image { src: String, status: LoadStatus },
    Video { src: String, status: LoadStatus },
    File(FileNode),
}

impl PendingMedia {
    fn node_kind(&self) -> NodeKind {
        match self {
            PendingMedia::Image { src, status } => NodeKind::Image(MediaNode {
                src: src.clone(),
                status: *status,
                ..MediaNode::default()
            }),
            PendingMedia::Video { src, status } => NodeKind::Video(MediaNode {
                src: src.clone(),
                status: *status,
                ..MediaNode::default()
            }),
            PendingMedia::File(file) => NodeKind::File(file.clone()),
        }
    }
}

/// Places the pending media. A click drops images and videos at their
/// natural size (resolved once loaded) and files at the default file size.
#[derive(Debug, Default)]
pub struct MediaCreateOperator {
    draft: Option<Draft>,
}

impl MediaCreateOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Operator for MediaCreateOperator {
    fn name(&self) -> &'static str {
        "create-media"
    }

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool {
        let Some(kind) = state.pending_media.as_ref().map(PendingMedia::node_kind) else {
            return false;
        };
        self.draft = Some(Draft::begin(state, event, kind));
        true
    }

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if let Some(draft) = self.draft.as_mut() {
            draft.follow(state, event);
        }
    }

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        let dragged = draft.follow(state, event);
        let rect = draft.dragged_rect(event);
        let min = state.config.min_shape_size;
        let origin = draft.tracker.origin_world;
        let is_file = matches!(state.pending_media, Some(PendingMedia::File(_)));

        if dragged && rect.width() >= min && rect.height() >= min {
            draft.finish(state, rect);
        } else if is_file {
            let size = Size::new(state.config.default_file_width, state.config.default_file_height);
            draft.finish(state, Rect::from_origin_size(origin, size));
        } else {
            draft.finish(state, Rect::from_origin_size(origin, Size::ZERO));
            state.document.update_node(
                &draft.node_id,
                |n| {
                    n.width = AUTO_FIT_SIZE;
                    n.height = AUTO_FIT_SIZE;
                },
                true,
            );
        }
        state.pending_media = None;
    }

    fn abort(&mut self, state: &mut EditorState) {
        if let Some(draft) = &self.draft {
            draft.cancel(state);
        }
    }

    fn reset(&mut self) {
        self.draft = None;
    }

    fn active(&self) -> bool {
        self.draft.is_some()
    }
}
