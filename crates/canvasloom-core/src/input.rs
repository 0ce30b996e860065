//! Pointer events as delivered by the host.

use crate::model::{EdgeEnd, EntityId, Side};
use crate::selection::Anchor;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const ALT: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: true,
        meta: false,
    };
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    /// Empty canvas.
    Empty,
    Node(EntityId),
    Edge(EntityId),
    /// A resize handle of the selection box.
    ResizeHandle(Anchor),
    /// The connector anchor on one side of a node.
    ConnectAnchor { node_id: EntityId, side: Side },
    /// The drag handle at one end of a selected edge.
    EdgeEndpoint { edge_id: EntityId, end: EdgeEnd },
    /// Host chrome (toolbars, menus) that gestures must not react to.
    Ignored,
}

impl HitTarget {
    pub fn is_ignored(&self) -> bool {
        matches!(self, HitTarget::Ignored)
    }

    /// The node this target is on, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            HitTarget::Node(id) | HitTarget::ConnectAnchor { node_id: id, .. } => Some(id),
            _ => None,
        }
    }
}

/// A pointer event in page coordinates.
///
/// `target` is normally resolved by the canvas from geometry; hosts set it
/// to override, typically with [`HitTarget::Ignored`] for chrome.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub target: Option<HitTarget>,
}

impl PointerEvent {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::default(),
            target: None,
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_target(mut self, target: HitTarget) -> Self {
        self.target = Some(target);
        self
    }
}

/// Whether the pointer moved far enough from `origin` to count as a drag.
pub fn exceeds_threshold(origin: Point, current: Point, threshold: f64) -> bool {
    origin.distance(current) > threshold
}
