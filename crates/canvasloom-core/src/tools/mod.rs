//! Tools and the gesture operators they are made of.
//!
//! A tool is an ordered list of operators. On pointer-down the manager
//! offers the gesture to each operator of the active tool in turn; the first
//! one that claims it receives every following move and the final up.

mod connect;
mod create;
mod grab;
mod moving;
mod pencil;
mod rescale;
mod select;

pub use connect::ConnectOperator;
pub use create::{MediaCreateOperator, PendingMedia, ShapeCreateOperator, TextCreateOperator};
pub use grab::GrabOperator;
pub use moving::MoveOperator;
pub use pencil::{PencilOperator, SIMPLIFY_TOLERANCE, simplify_stroke};
pub use rescale::RescaleOperator;
pub use select::SelectOperator;

use crate::camera::Camera;
use crate::config::EditorConfig;
use crate::document::CanvasDocument;
use crate::history::History;
use crate::input::{HitTarget, Modifiers, MouseButton, PointerEvent, exceeds_threshold};
use crate::model::{EntityId, ShapeKind};
use crate::selection::Selection;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    /// Pan the viewport.
    Grab,
    /// A text node is being edited; pointer gestures are inert.
    Typing,
    Shape(ShapeKind),
    Text,
    Pencil,
    Connector,
    /// Place the pending image, video or file.
    Media,
}

/// Everything an operator may read or mutate.
#[derive(Debug)]
pub struct EditorState {
    pub document: CanvasDocument,
    pub selection: Selection,
    pub history: History,
    pub camera: Camera,
    pub config: EditorConfig,
    /// Text node currently being edited.
    pub editing: Option<EntityId>,
    /// Media waiting to be placed by the media tool.
    pub pending_media: Option<PendingMedia>,
}

impl EditorState {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            document: CanvasDocument::new(),
            selection: Selection::new(),
            history: History::new(config.history_limit),
            camera: Camera::new(),
            config,
            editing: None,
            pending_media: None,
        }
    }

    /// Open a history bracket on the current state.
    pub fn begin_edit(&mut self) {
        self.history.open(&self.document, &self.selection);
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

/// A pointer event with both coordinate spaces and a resolved target.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEvent {
    /// Page (screen) position; thresholds are measured here.
    pub page: Point,
    /// World position; geometry is edited here.
    pub world: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub target: HitTarget,
}

impl ToolEvent {
    pub fn from_pointer(event: &PointerEvent, camera: &Camera, target: HitTarget) -> Self {
        Self {
            page: event.position,
            world: camera.screen_to_world(event.position),
            button: event.button,
            modifiers: event.modifiers,
            target,
        }
    }

    /// An event whose page and world positions coincide.
    pub fn at(world: Point, target: HitTarget) -> Self {
        Self {
            page: world,
            world,
            button: MouseButton::Left,
            modifiers: Modifiers::default(),
            target,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// One gesture behaviour (move, rescale, connect, ...).
///
/// `start` returns whether the operator claims the gesture. Only a claiming
/// operator sees `preview`, `commit` and `abort` for that gesture; `reset`
/// runs on every operator of the tool when the gesture ends.
pub trait Operator: fmt::Debug {
    fn name(&self) -> &'static str;

    fn start(&mut self, state: &mut EditorState, event: &ToolEvent) -> bool;

    fn preview(&mut self, state: &mut EditorState, event: &ToolEvent);

    fn commit(&mut self, state: &mut EditorState, event: &ToolEvent);

    /// Roll back any preview mutation and discard the history bracket.
    fn abort(&mut self, state: &mut EditorState);

    /// Drop per-gesture state.
    fn reset(&mut self);

    /// Whether the gesture has progressed far enough to be visible.
    fn active(&self) -> bool;
}

/// Click-versus-drag bookkeeping shared by the operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DragTracker {
    pub origin_page: Point,
    pub origin_world: Point,
    pub dragging: bool,
}

impl DragTracker {
    pub fn new(event: &ToolEvent) -> Self {
        Self {
            origin_page: event.page,
            origin_world: event.world,
            dragging: false,
        }
    }

    /// Latch `dragging` once the pointer leaves the threshold radius.
    pub fn update(&mut self, event: &ToolEvent, threshold: f64) -> bool {
        if !self.dragging && exceeds_threshold(self.origin_page, event.page, threshold) {
            self.dragging = true;
        }
        self.dragging
    }
}

/// Owns the operators of every tool and routes pointer events to them.
#[derive(Debug)]
pub struct ToolManager {
    current_tool: ToolKind,
    tools: HashMap<ToolKind, Vec<Box<dyn Operator>>>,
    /// Tool that received the current pointer-down.
    engaged: Option<ToolKind>,
    /// Index of the operator that claimed the current gesture.
    claimed: Option<usize>,
    middle_button: bool,
}

impl Default for ToolManager {
    fn default() -> Self {
        let mut manager = Self {
            current_tool: ToolKind::default(),
            tools: HashMap::new(),
            engaged: None,
            claimed: None,
            middle_button: false,
        };
        manager.register(
            ToolKind::Select,
            vec![
                Box::new(RescaleOperator::new()),
                Box::new(ConnectOperator::anchors_only()),
                Box::new(SelectOperator::new()),
                Box::new(MoveOperator::new()),
            ],
        );
        manager.register(ToolKind::Grab, vec![Box::new(GrabOperator::new())]);
        manager.register(ToolKind::Typing, Vec::new());
        for shape in [ShapeKind::Rectangle, ShapeKind::Ellipse] {
            manager.register(
                ToolKind::Shape(shape),
                vec![Box::new(ShapeCreateOperator::new(shape))],
            );
        }
        manager.register(ToolKind::Text, vec![Box::new(TextCreateOperator::new())]);
        manager.register(ToolKind::Pencil, vec![Box::new(PencilOperator::new())]);
        manager.register(
            ToolKind::Connector,
            vec![Box::new(ConnectOperator::anywhere())],
        );
        manager.register(ToolKind::Media, vec![Box::new(MediaCreateOperator::new())]);
        manager
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the operators of a tool, replacing any previous list.
    pub fn register(&mut self, tool: ToolKind, operators: Vec<Box<dyn Operator>>) {
        self.tools.insert(tool, operators);
    }

    pub fn current_tool(&self) -> ToolKind {
        self.current_tool
    }

    /// Select the tool used when no override applies.
    pub fn set_tool(&mut self, state: &mut EditorState, tool: ToolKind) {
        self.abort(state);
        self.current_tool = tool;
    }

    /// Tool that would receive the next gesture: the middle button forces
    /// grab, an open text edit forces typing.
    pub fn active_tool(&self, state: &EditorState) -> ToolKind {
        if self.middle_button {
            ToolKind::Grab
        } else if state.editing.is_some() {
            ToolKind::Typing
        } else {
            self.current_tool
        }
    }

    /// Whether some operator has claimed the current gesture.
    pub fn is_busy(&self) -> bool {
        self.claimed.is_some()
    }

    /// Whether the claiming operator reports visible progress.
    pub fn is_active(&self) -> bool {
        self.claimed_operator().is_some_and(|op| op.active())
    }

    /// Name of the operator handling the current gesture.
    pub fn active_operator(&self) -> Option<&'static str> {
        self.claimed_operator().map(|op| op.name())
    }

    fn claimed_operator(&self) -> Option<&dyn Operator> {
        let ops = self.tools.get(&self.engaged?)?;
        ops.get(self.claimed?).map(|op| op.as_ref())
    }

    pub fn pointer_down(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if self.claimed.is_some() {
            log::debug!("Pointer down during a gesture, aborting it");
            self.abort(state);
        }
        if event.target.is_ignored() {
            return;
        }
        self.middle_button = event.button == MouseButton::Middle;
        let tool = self.active_tool(state);
        self.engaged = Some(tool);
        let Some(ops) = self.tools.get_mut(&tool) else {
            return;
        };
        for (index, op) in ops.iter_mut().enumerate() {
            if op.start(state, event) {
                log::debug!("{:?} gesture claimed by {}", tool, op.name());
                self.claimed = Some(index);
                return;
            }
        }
    }

    pub fn pointer_move(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if let Some(op) = self.claimed_operator_mut() {
            op.preview(state, event);
        }
    }

    /// Commit the gesture, or abort it when released over ignored chrome.
    pub fn pointer_up(&mut self, state: &mut EditorState, event: &ToolEvent) {
        if let Some(op) = self.claimed_operator_mut() {
            if event.target.is_ignored() {
                log::debug!("{} released over ignored target, aborting", op.name());
                op.abort(state);
            } else {
                op.commit(state, event);
            }
        }
        self.finish();
    }

    /// Abort whatever gesture is in progress.
    pub fn abort(&mut self, state: &mut EditorState) {
        if let Some(op) = self.claimed_operator_mut() {
            op.abort(state);
        }
        self.finish();
    }

    fn claimed_operator_mut(&mut self) -> Option<&mut Box<dyn Operator>> {
        let ops = self.tools.get_mut(&self.engaged?)?;
        ops.get_mut(self.claimed?)
    }

    fn finish(&mut self) {
        if let Some(ops) = self.engaged.and_then(|tool| self.tools.get_mut(&tool)) {
            for op in ops.iter_mut() {
                op.reset();
            }
        }
        self.engaged = None;
        self.claimed = None;
        self.middle_button = false;
    }
}
