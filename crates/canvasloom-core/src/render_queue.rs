//! Paint and hit-test order for nodes, edges and groups.
//!
//! The queue stores only [`Renderable`] projections. Effective layer and sort
//! order are recomputed from the entity maps every time the queue is read, so
//! the queue itself is never a source of truth.

use crate::model::{CanvasEdge, CanvasNode, EntityId, EntityKind, EntityStore};
use serde::{Deserialize, Serialize};

/// Sort-order offset that places a connected edge just above its anchor node.
pub const CONNECTED_EDGE_OFFSET: f64 = 0.5;

/// Divisor applied to a member's own sort order inside its group.
pub const GROUP_MEMBER_DIVISOR: f64 = 1000.0;

/// Minimal ordering projection of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Renderable {
    pub id: EntityId,
    pub kind: EntityKind,
    pub layer: i32,
    pub sort_order: f64,
}

/// Ordered set of renderables, in insertion order until sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderQueue {
    items: Vec<Renderable>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an existing node. Unknown or already queued ids are ignored.
    pub fn add_node(&mut self, id: &str, store: &EntityStore) -> bool {
        self.add(id, EntityKind::Node, store)
    }

    /// Queue an existing edge. Unknown or already queued ids are ignored.
    pub fn add_edge(&mut self, id: &str, store: &EntityStore) -> bool {
        self.add(id, EntityKind::Edge, store)
    }

    /// Queue an existing group. Unknown or already queued ids are ignored.
    pub fn add_group(&mut self, id: &str, store: &EntityStore) -> bool {
        self.add(id, EntityKind::Group, store)
    }

    fn add(&mut self, id: &str, kind: EntityKind, store: &EntityStore) -> bool {
        if self.contains(id) {
            return false;
        }
        let Some((layer, sort_order)) = effective_order(id, kind, store) else {
            log::debug!("Ignoring render queue insert for missing {:?} {}", kind, id);
            return false;
        };
        self.items.push(Renderable {
            id: id.to_string(),
            kind,
            layer,
            sort_order,
        });
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r.id != id);
        self.items.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Raw entries in insertion order, with the values last computed.
    pub fn items(&self) -> &[Renderable] {
        &self.items
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|r| r.id.as_str())
    }

    /// Index of `id` in the sorted order.
    pub fn position(&self, id: &str, store: &EntityStore) -> Option<usize> {
        self.sorted(store).iter().position(|r| r.id == id)
    }

    /// All entries ascending by effective (layer, sort order).
    ///
    /// Ties keep insertion order. Entries whose entity has disappeared from
    /// the store are skipped.
    pub fn sorted(&self, store: &EntityStore) -> Vec<Renderable> {
        let mut out: Vec<Renderable> = self
            .items
            .iter()
            .filter_map(|r| {
                effective_order(&r.id, r.kind, store).map(|(layer, sort_order)| Renderable {
                    id: r.id.clone(),
                    kind: r.kind,
                    layer,
                    sort_order,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            a.layer
                .cmp(&b.layer)
                .then_with(|| a.sort_order.total_cmp(&b.sort_order))
        });
        out
    }

    /// Refresh the cached values of every entry and drop stale ones.
    pub fn refresh(&mut self, store: &EntityStore) {
        self.items = self
            .items
            .drain(..)
            .filter_map(|r| {
                effective_order(&r.id, r.kind, store).map(|(layer, sort_order)| Renderable {
                    layer,
                    sort_order,
                    ..r
                })
            })
            .collect();
    }

    /// Rewrite stored sort orders to 1, 2, 3, ... per contiguous layer run of
    /// the sorted list, for every entry including group members and
    /// connected edges.
    ///
    /// Derived entries (members, connected edges) can land elsewhere once
    /// their parents are renumbered, so the pass repeats until the sorted
    /// order it numbered is the order it produces.
    pub fn normalize(&self, store: &mut EntityStore) {
        let mut order = self.sorted(store);
        for _ in 0..NORMALIZE_ROUNDS {
            number_layers(&order, store);
            let next = self.sorted(store);
            if next.iter().map(|r| &r.id).eq(order.iter().map(|r| &r.id)) {
                return;
            }
            order = next;
        }
        log::debug!("Render order still settling after {} normalize rounds", NORMALIZE_ROUNDS);
    }
}

const NORMALIZE_ROUNDS: usize = 4;

fn number_layers(order: &[Renderable], store: &mut EntityStore) {
    let mut current_layer = None;
    let mut next = 0u32;
    for item in order {
        if current_layer != Some(item.layer) {
            current_layer = Some(item.layer);
            next = 0;
        }
        next += 1;
        store.set_sort_order(item.kind, &item.id, f64::from(next));
    }
}

/// Effective (layer, sort order) of any entity, `None` if it does not exist.
pub fn effective_order(id: &str, kind: EntityKind, store: &EntityStore) -> Option<(i32, f64)> {
    match kind {
        EntityKind::Node => store.node(id).map(|n| node_order(n, store)),
        EntityKind::Edge => store.edge(id).map(|e| edge_order(e, store)),
        EntityKind::Group => store.group(id).map(|g| (g.layer, g.sort_order)),
    }
}

fn grouped_order(group_id: Option<&str>, own: f64, store: &EntityStore) -> Option<(i32, f64)> {
    let group = store.group(group_id?)?;
    Some((group.layer, group.sort_order + own / GROUP_MEMBER_DIVISOR))
}

fn node_order(node: &CanvasNode, store: &EntityStore) -> (i32, f64) {
    grouped_order(node.group_id.as_deref(), node.sort_order, store)
        .unwrap_or((node.layer, node.sort_order))
}

fn edge_order(edge: &CanvasEdge, store: &EntityStore) -> (i32, f64) {
    if let Some(order) = grouped_order(edge.group_id.as_deref(), edge.sort_order, store) {
        return order;
    }
    let anchors: Vec<(i32, f64)> = edge
        .connected_nodes()
        .filter_map(|id| store.node(id))
        .map(|n| node_order(n, store))
        .collect();
    if anchors.is_empty() {
        return (edge.layer, edge.sort_order);
    }
    let layer = anchors.iter().map(|(l, _)| *l).max().unwrap_or(edge.layer);
    let sort = anchors
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    (layer, sort + CONNECTED_EDGE_OFFSET)
}
