//! Group-aware selection and resize handles.

use crate::document::CanvasDocument;
use crate::geometry;
use crate::model::{EntityId, EntityKind, EntityStore, Style};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// The handle a rescale is dragged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    Corner(Corner),
    Edge(Edge),
}

impl Anchor {
    pub const ALL: [Anchor; 8] = [
        Anchor::Corner(Corner::TopLeft),
        Anchor::Edge(Edge::Top),
        Anchor::Corner(Corner::TopRight),
        Anchor::Edge(Edge::Right),
        Anchor::Corner(Corner::BottomRight),
        Anchor::Edge(Edge::Bottom),
        Anchor::Corner(Corner::BottomLeft),
        Anchor::Edge(Edge::Left),
    ];

    /// Which sides of the box this handle moves: -1 for left/top, 1 for
    /// right/bottom, 0 for an axis the handle leaves alone.
    pub fn signs(self) -> (f64, f64) {
        match self {
            Anchor::Corner(Corner::TopLeft) => (-1.0, -1.0),
            Anchor::Corner(Corner::TopRight) => (1.0, -1.0),
            Anchor::Corner(Corner::BottomLeft) => (-1.0, 1.0),
            Anchor::Corner(Corner::BottomRight) => (1.0, 1.0),
            Anchor::Edge(Edge::Top) => (0.0, -1.0),
            Anchor::Edge(Edge::Right) => (1.0, 0.0),
            Anchor::Edge(Edge::Bottom) => (0.0, 1.0),
            Anchor::Edge(Edge::Left) => (-1.0, 0.0),
        }
    }

    pub fn is_corner(self) -> bool {
        matches!(self, Anchor::Corner(_))
    }

    /// Position of this handle on `bounds`.
    pub fn position(self, bounds: Rect) -> Point {
        let (hx, hy) = self.signs();
        let c = bounds.center();
        Point::new(
            c.x + hx * bounds.width() / 2.0,
            c.y + hy * bounds.height() / 2.0,
        )
    }
}

/// A resize handle with its world position.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    pub position: Point,
    pub anchor: Anchor,
}

impl Handle {
    /// Check if a point hits this handle. `tolerance` is in world units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.position.distance(point) <= tolerance
    }
}

/// The eight resize handles of a selection box.
pub fn resize_handles(bounds: Rect) -> Vec<Handle> {
    Anchor::ALL
        .into_iter()
        .map(|anchor| Handle {
            position: anchor.position(bounds),
            anchor,
        })
        .collect()
}

/// The handle under `point`, corners first.
pub fn hit_test_handles(bounds: Rect, point: Point, tolerance: f64) -> Option<Anchor> {
    let handles = resize_handles(bounds);
    handles
        .iter()
        .filter(|h| h.anchor.is_corner())
        .chain(handles.iter().filter(|h| !h.anchor.is_corner()))
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.anchor)
}

/// Plain id-sets, the value stored in history snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    pub nodes: BTreeSet<EntityId>,
    pub edges: BTreeSet<EntityId>,
    pub groups: BTreeSet<EntityId>,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.groups.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id) || self.edges.contains(id) || self.groups.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len() + self.groups.len()
    }

    fn merge(&mut self, other: &SelectionSet) {
        self.nodes.extend(other.nodes.iter().cloned());
        self.edges.extend(other.edges.iter().cloned());
        self.groups.extend(other.groups.iter().cloned());
    }
}

/// Current selection plus the stash used by additive rubber-band selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    current: SelectionSet,
    stash: SelectionSet,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) -> &SelectionSet {
        &self.current
    }

    pub fn nodes(&self) -> impl Iterator<Item = &EntityId> {
        self.current.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &EntityId> {
        self.current.edges.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &EntityId> {
        self.current.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.current.contains(id)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Select an entity of any kind. Members of a group pull in the whole
    /// group. Unknown ids are ignored.
    pub fn select(&mut self, id: &str, store: &EntityStore) {
        let group = match store.kind_of(id) {
            Some(EntityKind::Node) => {
                self.current.nodes.insert(id.to_string());
                store.node(id).and_then(|n| n.group_id.clone())
            }
            Some(EntityKind::Edge) => {
                self.current.edges.insert(id.to_string());
                store.edge(id).and_then(|e| e.group_id.clone())
            }
            Some(EntityKind::Group) => Some(id.to_string()),
            None => None,
        };
        if let Some(gid) = group {
            self.select_group(&gid, store);
        }
    }

    fn select_group(&mut self, gid: &str, store: &EntityStore) {
        let Some(group) = store.group(gid) else {
            return;
        };
        self.current.groups.insert(gid.to_string());
        self.current.nodes.extend(group.nodes.iter().cloned());
        self.current.edges.extend(group.edges.iter().cloned());
    }

    /// Select several ids at once.
    pub fn select_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, store: &EntityStore) {
        for id in ids {
            self.select(id, store);
        }
    }

    /// Deselect one id. Deselecting a member leaves its group selected.
    pub fn deselect(&mut self, id: &str) {
        self.current.nodes.remove(id);
        self.current.edges.remove(id);
        self.current.groups.remove(id);
    }

    pub fn toggle(&mut self, id: &str, store: &EntityStore) {
        if self.is_selected(id) {
            self.deselect(id);
        } else {
            self.select(id, store);
        }
    }

    pub fn clear(&mut self) {
        self.current = SelectionSet::default();
    }

    /// Replace the selection with exactly `ids` (with group cascade).
    pub fn replace<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, store: &EntityStore) {
        self.clear();
        self.select_many(ids, store);
    }

    /// Select every persisted entity.
    pub fn select_all(&mut self, doc: &CanvasDocument) {
        self.clear();
        let ids: Vec<EntityId> = doc.queue().ids().map(String::from).collect();
        for id in &ids {
            self.select(id, doc.store());
        }
    }

    /// Restore a previously captured set verbatim.
    pub fn restore(&mut self, set: SelectionSet) {
        self.current = set;
    }

    /// Remember the current selection for additive selection.
    pub fn stash(&mut self) {
        self.stash = self.current.clone();
    }

    pub fn stashed(&self) -> &SelectionSet {
        &self.stash
    }

    /// Add the stashed ids back into the current selection.
    pub fn merge_stash(&mut self) {
        let stash = std::mem::take(&mut self.stash);
        self.current.merge(&stash);
        self.stash = stash;
    }

    pub fn clear_stash(&mut self) {
        self.stash = SelectionSet::default();
    }

    /// Drop ids that no longer exist.
    pub fn retain_existing(&mut self, store: &EntityStore) {
        self.current.nodes.retain(|id| store.node(id).is_some());
        self.current.edges.retain(|id| store.edge(id).is_some());
        self.current.groups.retain(|id| store.group(id).is_some());
        self.stash.nodes.retain(|id| store.node(id).is_some());
        self.stash.edges.retain(|id| store.edge(id).is_some());
        self.stash.groups.retain(|id| store.group(id).is_some());
    }

    /// Combined bounds of every selected node, edge and group.
    pub fn bounds(&self, doc: &CanvasDocument) -> Option<Rect> {
        geometry::union_all(
            self.current
                .nodes
                .iter()
                .chain(&self.current.edges)
                .chain(&self.current.groups)
                .filter_map(|id| doc.entity_bounds(id)),
        )
    }

    /// True when every selected node is an image or video and no edge is
    /// selected.
    pub fn is_media_only(&self, store: &EntityStore) -> bool {
        !self.current.nodes.is_empty()
            && self.current.edges.is_empty()
            && self
                .current
                .nodes
                .iter()
                .all(|id| store.node(id).is_some_and(|n| n.is_media()))
    }

    /// Style fields shared by every selected node and edge; fields on
    /// which they disagree are `None`.
    pub fn extract_shared_styles(&self, store: &EntityStore) -> Style {
        let mut styles = self
            .current
            .nodes
            .iter()
            .filter_map(|id| store.node(id).map(|n| &n.style))
            .chain(
                self.current
                    .edges
                    .iter()
                    .filter_map(|id| store.edge(id).map(|e| &e.style)),
            );
        let Some(first) = styles.next() else {
            return Style::default();
        };
        styles.fold(first.clone(), |acc, s| acc.intersect(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Lifecycle;
    use crate::model::{CanvasEdge, CanvasNode, Endpoint, MediaNode, NodeKind, ShapeNode, Side};

    fn shape(doc: &mut CanvasDocument, rect: Rect, fill: &str) -> EntityId {
        let mut node = CanvasNode::new("", rect, NodeKind::Shape(ShapeNode::default()));
        node.style.fill = Some(fill.to_string());
        node.style.stroke = Some("#000000".to_string());
        doc.create_node(node, Lifecycle::Persisted)
    }

    #[test]
    fn test_handles_positions() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 50.0);
        let handles = resize_handles(bounds);
        assert_eq!(handles.len(), 8);
        assert_eq!(
            Anchor::Corner(Corner::BottomRight).position(bounds),
            Point::new(100.0, 50.0)
        );
        assert_eq!(Anchor::Edge(Edge::Left).position(bounds), Point::new(0.0, 25.0));
    }

    #[test]
    fn test_hit_test_handles() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            hit_test_handles(bounds, Point::new(98.0, 101.0), 5.0),
            Some(Anchor::Corner(Corner::BottomRight))
        );
        assert_eq!(
            hit_test_handles(bounds, Point::new(50.0, -2.0), 5.0),
            Some(Anchor::Edge(Edge::Top))
        );
        assert_eq!(hit_test_handles(bounds, Point::new(50.0, 50.0), 5.0), None);
    }

    #[test]
    fn test_selecting_member_cascades_to_group() {
        let mut doc = CanvasDocument::new();
        let a = shape(&mut doc, Rect::new(0.0, 0.0, 10.0, 10.0), "#ff0000");
        let b = shape(&mut doc, Rect::new(20.0, 0.0, 30.0, 10.0), "#ff0000");
        let c = shape(&mut doc, Rect::new(50.0, 0.0, 60.0, 10.0), "#ff0000");
        let e = doc.create_edge(
            CanvasEdge::new(
                "",
                Endpoint::connected(&a, Side::Right),
                Endpoint::connected(&b, Side::Left),
            ),
            Lifecycle::Persisted,
        );
        let g = doc.group_entities(&[a.clone(), b.clone(), e.clone()]).unwrap();

        let mut selection = Selection::new();
        selection.select(&b, doc.store());
        let group = doc.group(&g).unwrap();
        assert!(group.nodes.iter().all(|n| selection.set().nodes.contains(n)));
        assert!(group.edges.iter().all(|n| selection.set().edges.contains(n)));
        assert!(selection.set().groups.contains(&g));
        assert!(!selection.is_selected(&c));

        selection.deselect(&a);
        assert!(selection.set().groups.contains(&g));
    }

    #[test]
    fn test_shared_styles() {
        let mut doc = CanvasDocument::new();
        let a = shape(&mut doc, Rect::new(0.0, 0.0, 10.0, 10.0), "#ff0000");
        let b = shape(&mut doc, Rect::new(20.0, 0.0, 30.0, 10.0), "#00ff00");
        let mut selection = Selection::new();
        selection.replace([a.as_str(), b.as_str()], doc.store());
        let shared = selection.extract_shared_styles(doc.store());
        assert_eq!(shared.fill, None);
        assert_eq!(shared.stroke.as_deref(), Some("#000000"));

        selection.clear();
        assert_eq!(selection.extract_shared_styles(doc.store()), Style::default());
    }

    #[test]
    fn test_bounds_and_retain_existing() {
        let mut doc = CanvasDocument::new();
        let a = shape(&mut doc, Rect::new(0.0, 0.0, 10.0, 10.0), "#ff0000");
        let b = shape(&mut doc, Rect::new(20.0, 5.0, 30.0, 40.0), "#ff0000");
        let mut selection = Selection::new();
        selection.replace([a.as_str(), b.as_str()], doc.store());
        assert_eq!(selection.bounds(&doc), Some(Rect::new(0.0, 0.0, 30.0, 40.0)));

        doc.delete(&b);
        selection.retain_existing(doc.store());
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.bounds(&doc), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_stash_merge() {
        let mut doc = CanvasDocument::new();
        let a = shape(&mut doc, Rect::new(0.0, 0.0, 10.0, 10.0), "#ff0000");
        let b = shape(&mut doc, Rect::new(20.0, 0.0, 30.0, 10.0), "#ff0000");
        let mut selection = Selection::new();
        selection.select(&a, doc.store());
        selection.stash();
        selection.replace([b.as_str()], doc.store());
        selection.merge_stash();
        assert!(selection.is_selected(&a));
        assert!(selection.is_selected(&b));
    }

    #[test]
    fn test_media_only() {
        let mut doc = CanvasDocument::new();
        let img = doc.create_node(
            CanvasNode::new(
                "",
                Rect::new(0.0, 0.0, 10.0, 10.0),
                NodeKind::Image(MediaNode::default()),
            ),
            Lifecycle::Persisted,
        );
        let a = shape(&mut doc, Rect::new(0.0, 0.0, 10.0, 10.0), "#ff0000");
        let mut selection = Selection::new();
        selection.select(&img, doc.store());
        assert!(selection.is_media_only(doc.store()));
        selection.select(&a, doc.store());
        assert!(!selection.is_media_only(doc.store()));
    }
}
