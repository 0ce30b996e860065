//! Id-keyed entity maps: the single source of truth for the canvas graph.

use super::{CanvasEdge, CanvasGroup, CanvasNode, EntityId, EntityKind, Endpoint};
use kurbo::Point;
use std::collections::HashMap;

/// Owning maps for every entity of a document.
///
/// All reads go through one lookup function per entity kind; a missing id is
/// always `None`, never a panic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    nodes: HashMap<EntityId, CanvasNode>,
    edges: HashMap<EntityId, CanvasEdge>,
    groups: HashMap<EntityId, CanvasGroup>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut CanvasNode> {
        self.nodes.get_mut(id)
    }

    pub fn edge(&self, id: &str) -> Option<&CanvasEdge> {
        self.edges.get(id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut CanvasEdge> {
        self.edges.get_mut(id)
    }

    pub fn group(&self, id: &str) -> Option<&CanvasGroup> {
        self.groups.get(id)
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut CanvasGroup> {
        self.groups.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CanvasNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CanvasEdge> {
        self.edges.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &CanvasGroup> {
        self.groups.values()
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Node => self.nodes.contains_key(id),
            EntityKind::Edge => self.edges.contains_key(id),
            EntityKind::Group => self.groups.contains_key(id),
        }
    }

    /// Kind of the entity with this id, if any.
    pub fn kind_of(&self, id: &str) -> Option<EntityKind> {
        if self.nodes.contains_key(id) {
            Some(EntityKind::Node)
        } else if self.edges.contains_key(id) {
            Some(EntityKind::Edge)
        } else if self.groups.contains_key(id) {
            Some(EntityKind::Group)
        } else {
            None
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.kind_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert_node(&mut self, node: CanvasNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn insert_edge(&mut self, edge: CanvasEdge) {
        self.edges.insert(edge.id.clone(), edge);
    }

    pub(crate) fn insert_group(&mut self, group: CanvasGroup) {
        self.groups.insert(group.id.clone(), group);
    }

    pub(crate) fn remove_node(&mut self, id: &str) -> Option<CanvasNode> {
        self.nodes.remove(id)
    }

    pub(crate) fn remove_edge(&mut self, id: &str) -> Option<CanvasEdge> {
        self.edges.remove(id)
    }

    pub(crate) fn remove_group(&mut self, id: &str) -> Option<CanvasGroup> {
        self.groups.remove(id)
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.groups.clear();
    }

    /// Overwrite the stored sort order of any entity kind.
    pub(crate) fn set_sort_order(&mut self, kind: EntityKind, id: &str, sort_order: f64) {
        match kind {
            EntityKind::Node => {
                if let Some(n) = self.nodes.get_mut(id) {
                    n.sort_order = sort_order;
                }
            }
            EntityKind::Edge => {
                if let Some(e) = self.edges.get_mut(id) {
                    e.sort_order = sort_order;
                }
            }
            EntityKind::Group => {
                if let Some(g) = self.groups.get_mut(id) {
                    g.sort_order = sort_order;
                }
            }
        }
    }

    /// World position of an endpoint, `None` if its node is gone.
    pub fn endpoint_position(&self, endpoint: &Endpoint) -> Option<Point> {
        match endpoint {
            Endpoint::Free { x, y } => Some(Point::new(*x, *y)),
            Endpoint::Connected { node_id, side } => {
                self.node(node_id).map(|n| n.side_point(*side))
            }
        }
    }

    /// Highest stored sort order across all entities.
    pub fn max_sort_order(&self) -> f64 {
        self.nodes
            .values()
            .map(|n| n.sort_order)
            .chain(self.edges.values().map(|e| e.sort_order))
            .chain(self.groups.values().map(|g| g.sort_order))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, ShapeNode, Side};
    use kurbo::Rect;

    #[test]
    fn test_lookup_and_kind() {
        let mut store = EntityStore::new();
        store.insert_node(CanvasNode::new(
            "a",
            Rect::new(0.0, 0.0, 10.0, 10.0),
            NodeKind::Shape(ShapeNode::default()),
        ));
        assert!(store.node("a").is_some());
        assert!(store.node("missing").is_none());
        assert_eq!(store.kind_of("a"), Some(EntityKind::Node));
        assert_eq!(store.kind_of("missing"), None);
    }

    #[test]
    fn test_endpoint_position() {
        let mut store = EntityStore::new();
        store.insert_node(CanvasNode::new(
            "a",
            Rect::new(0.0, 0.0, 10.0, 20.0),
            NodeKind::Shape(ShapeNode::default()),
        ));
        let p = store.endpoint_position(&Endpoint::connected("a", Side::Right));
        assert_eq!(p, Some(Point::new(10.0, 10.0)));
        assert_eq!(store.endpoint_position(&Endpoint::connected("zzz", Side::Right)), None);
    }
}
