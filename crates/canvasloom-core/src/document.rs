//! The entity graph of one open canvas.
//!
//! All mutation goes through the create, update and delete entry points
//! here so that the render queues and the node/edge/group back-references
//! stay consistent with the entity maps.

use crate::error::DocumentError;
use crate::geometry;
use crate::model::{
    CanvasEdge, CanvasGroup, CanvasNode, EdgeEnd, EntityId, EntityKind, EntityStore, Endpoint,
    LoadReport, LoadStatus, NodeKind, validate_document,
};
use crate::render_queue::RenderQueue;
use crate::routing::EdgeGeometry;
use kurbo::{Point, Rect};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Whether a newly created entity is persisted or lives in the preview queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Persisted,
    /// Excluded from export and history until promoted.
    Preview,
}

/// The canvas entity graph plus its paint-order indexes.
#[derive(Debug, Clone, Default)]
pub struct CanvasDocument {
    store: EntityStore,
    queue: RenderQueue,
    preview_queue: RenderQueue,
    /// Last handed out sort order; creations go on top.
    order_counter: f64,
    save_requested: bool,
}

/// Serialized form of a document.
#[derive(Serialize)]
struct ExportedDocument<'a> {
    nodes: Vec<&'a CanvasNode>,
    edges: Vec<&'a CanvasEdge>,
    groups: Vec<&'a CanvasGroup>,
}

impl CanvasDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    pub fn preview_queue(&self) -> &RenderQueue {
        &self.preview_queue
    }

    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.store.node(id)
    }

    pub fn edge(&self, id: &str) -> Option<&CanvasEdge> {
        self.store.edge(id)
    }

    pub fn group(&self, id: &str) -> Option<&CanvasGroup> {
        self.store.group(id)
    }

    pub fn is_preview(&self, id: &str) -> bool {
        self.preview_queue.contains(id)
    }

    /// Number of persisted entities.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// A fresh id that no entity currently uses.
    pub fn allocate_id(&self) -> EntityId {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.store.has_id(&id) {
                return id;
            }
            log::warn!("Id collision on {}, retrying", id);
        }
    }

    /// The next sort order above everything handed out so far.
    pub fn next_order(&mut self) -> f64 {
        self.order_counter = self.order_counter.floor() + 1.0;
        self.order_counter
    }

    /// Ask the persistence layer to schedule a write.
    pub fn request_save(&mut self) {
        self.save_requested = true;
    }

    /// Consume a pending save request.
    pub fn take_save_request(&mut self) -> bool {
        std::mem::take(&mut self.save_requested)
    }

    pub fn save_requested(&self) -> bool {
        self.save_requested
    }

    fn fresh_id(&self, requested: &str) -> EntityId {
        if requested.is_empty() || self.store.has_id(requested) {
            self.allocate_id()
        } else {
            requested.to_string()
        }
    }

    /// Insert a node on top of the paint order and return its id.
    ///
    /// The requested id is kept unless it is empty or already taken. Edge
    /// back-references are reset; a `group_id` naming an existing group
    /// joins that group.
    pub fn create_node(&mut self, mut node: CanvasNode, lifecycle: Lifecycle) -> EntityId {
        node.id = self.fresh_id(&node.id);
        node.sort_order = self.next_order();
        node.edges.clear();
        self.attach_to_group(&node.id, &mut node.group_id, EntityKind::Node);

        let id = node.id.clone();
        log::debug!("Creating {:?} {} node {}", lifecycle, node.kind.name(), id);
        self.store.insert_node(node);
        let store = &self.store;
        match lifecycle {
            Lifecycle::Persisted => self.queue.add_node(&id, store),
            Lifecycle::Preview => self.preview_queue.add_node(&id, store),
        };
        if lifecycle == Lifecycle::Persisted {
            self.request_save();
        }
        id
    }

    /// Insert an edge and register it with the nodes it connects to.
    pub fn create_edge(&mut self, mut edge: CanvasEdge, lifecycle: Lifecycle) -> EntityId {
        edge.id = self.fresh_id(&edge.id);
        edge.sort_order = self.next_order();
        for end in [EdgeEnd::From, EdgeEnd::To] {
            self.repair_dangling(&mut edge, end);
        }
        self.attach_to_group(&edge.id, &mut edge.group_id, EntityKind::Edge);

        let id = edge.id.clone();
        let anchors: Vec<EntityId> = edge.connected_nodes().map(String::from).collect();
        for node_id in anchors {
            self.link_edge(&node_id, &id);
        }
        log::debug!("Creating {:?} edge {}", lifecycle, id);
        self.store.insert_edge(edge);
        let store = &self.store;
        match lifecycle {
            Lifecycle::Persisted => self.queue.add_edge(&id, store),
            Lifecycle::Preview => self.preview_queue.add_edge(&id, store),
        };
        if lifecycle == Lifecycle::Persisted {
            self.request_save();
        }
        id
    }

    fn attach_to_group(&mut self, id: &str, group_id: &mut Option<EntityId>, kind: EntityKind) {
        let Some(gid) = group_id.clone() else {
            return;
        };
        match self.store.group_mut(&gid) {
            Some(group) => {
                let list = if kind == EntityKind::Node {
                    &mut group.nodes
                } else {
                    &mut group.edges
                };
                if !list.iter().any(|m| m == id) {
                    list.push(id.to_string());
                }
            }
            None => *group_id = None,
        }
    }

    fn link_edge(&mut self, node_id: &str, edge_id: &str) {
        if let Some(node) = self.store.node_mut(node_id) {
            if !node.edges.iter().any(|e| e == edge_id) {
                node.edges.push(edge_id.to_string());
            }
        }
    }

    fn unlink_edge(&mut self, node_id: &str, edge_id: &str) {
        if let Some(node) = self.store.node_mut(node_id) {
            node.edges.retain(|e| e != edge_id);
        }
    }

    /// Turn an endpoint connected to a missing node into a free one, placed
    /// at the other endpoint (or the origin if that cannot be resolved).
    fn repair_dangling(&self, edge: &mut CanvasEdge, end: EdgeEnd) -> bool {
        let dangling = edge
            .endpoint(end)
            .node_id()
            .is_some_and(|n| self.store.node(n).is_none());
        if !dangling {
            return false;
        }
        let fallback = self
            .store
            .endpoint_position(edge.endpoint(end.other()))
            .unwrap_or(Point::ZERO);
        log::warn!(
            "Edge {} referenced a missing node, freeing its {:?} endpoint",
            edge.id,
            end
        );
        *edge.endpoint_mut(end) = Endpoint::free(fallback);
        true
    }

    /// Patch a node in place.
    ///
    /// Identity and the managed back-references (`id`, `group_id`, `edges`)
    /// survive the patch unchanged. Returns `false` for unknown ids.
    pub fn update_node<F>(&mut self, id: &str, patch: F, autosave: bool) -> bool
    where
        F: FnOnce(&mut CanvasNode),
    {
        let Some(node) = self.store.node_mut(id) else {
            return false;
        };
        let group_id = node.group_id.clone();
        let edges = std::mem::take(&mut node.edges);
        patch(node);
        node.id = id.to_string();
        node.group_id = group_id;
        node.edges = edges;
        if autosave && !self.is_preview(id) {
            self.request_save();
        }
        true
    }

    /// Patch an edge in place, keeping node back-references in sync with
    /// endpoint changes.
    pub fn update_edge<F>(&mut self, id: &str, patch: F, autosave: bool) -> bool
    where
        F: FnOnce(&mut CanvasEdge),
    {
        let Some(before) = self.store.edge(id).cloned() else {
            return false;
        };
        let old_points = [
            self.store.endpoint_position(&before.from),
            self.store.endpoint_position(&before.to),
        ];

        let mut edge = before.clone();
        patch(&mut edge);
        edge.id = id.to_string();
        edge.group_id = before.group_id.clone();
        for (end, old) in [EdgeEnd::From, EdgeEnd::To].into_iter().zip(old_points) {
            let dangling = edge
                .endpoint(end)
                .node_id()
                .is_some_and(|n| self.store.node(n).is_none());
            if dangling {
                log::warn!("Ignoring connection of edge {} to a missing node", id);
                *edge.endpoint_mut(end) = Endpoint::free(old.unwrap_or(Point::ZERO));
            }
        }

        let old_nodes: HashSet<EntityId> = before.connected_nodes().map(String::from).collect();
        let new_nodes: HashSet<EntityId> = edge.connected_nodes().map(String::from).collect();
        for gone in old_nodes.difference(&new_nodes) {
            self.unlink_edge(gone, id);
        }
        for added in new_nodes.difference(&old_nodes) {
            self.link_edge(added, id);
        }
        self.store.insert_edge(edge);
        if autosave && !self.is_preview(id) {
            self.request_save();
        }
        true
    }

    /// Move a preview entity into the persisted queue.
    pub fn promote(&mut self, id: &str) -> bool {
        let Some(kind) = self.store.kind_of(id) else {
            return false;
        };
        if !self.preview_queue.remove(id) {
            return false;
        }
        match kind {
            EntityKind::Node => self.queue.add_node(id, &self.store),
            EntityKind::Edge => self.queue.add_edge(id, &self.store),
            EntityKind::Group => self.queue.add_group(id, &self.store),
        };
        log::debug!("Promoted preview {:?} {}", kind, id);
        self.request_save();
        true
    }

    /// Delete every preview entity.
    pub fn clear_preview(&mut self) {
        let ids: Vec<EntityId> = self.preview_queue.ids().map(String::from).collect();
        for id in ids {
            self.remove_entity(&id);
        }
        self.preview_queue.clear();
    }

    /// Delete one preview entity. Persisted entities are left alone.
    pub fn discard_preview(&mut self, id: &str) -> bool {
        if !self.is_preview(id) {
            return false;
        }
        self.remove_entity(id)
    }

    /// Delete any entity with referential cleanup.
    ///
    /// Edges connected to a deleted node keep existing with that endpoint
    /// freed at the node's side midpoint. Groups left without members are
    /// deleted too.
    pub fn delete(&mut self, id: &str) -> bool {
        let persisted = self.queue.contains(id);
        let removed = self.remove_entity(id);
        if removed && persisted {
            self.request_save();
        }
        removed
    }

    fn remove_entity(&mut self, id: &str) -> bool {
        let removed = match self.store.kind_of(id) {
            Some(EntityKind::Node) => self.remove_node(id),
            Some(EntityKind::Edge) => self.remove_edge(id),
            Some(EntityKind::Group) => self.remove_group(id),
            None => false,
        };
        self.queue.remove(id);
        self.preview_queue.remove(id);
        removed
    }

    fn remove_node(&mut self, id: &str) -> bool {
        let Some(node) = self.store.node(id).cloned() else {
            return false;
        };
        let referencing: Vec<EntityId> = self
            .store
            .edges()
            .filter(|e| e.references(id))
            .map(|e| e.id.clone())
            .collect();
        for edge_id in referencing {
            if let Some(edge) = self.store.edge_mut(&edge_id) {
                for end in [EdgeEnd::From, EdgeEnd::To] {
                    let side = match edge.endpoint(end) {
                        Endpoint::Connected { node_id, side } if node_id == id => Some(*side),
                        _ => None,
                    };
                    if let Some(side) = side {
                        *edge.endpoint_mut(end) = Endpoint::free(node.side_point(side));
                    }
                }
            }
        }
        if let Some(gid) = &node.group_id {
            self.leave_group(gid, id);
        }
        self.store.remove_node(id);
        log::debug!("Deleted node {}", id);
        true
    }

    fn remove_edge(&mut self, id: &str) -> bool {
        let Some(edge) = self.store.remove_edge(id) else {
            return false;
        };
        for node_id in edge.connected_nodes() {
            self.unlink_edge(node_id, id);
        }
        if let Some(gid) = &edge.group_id {
            self.leave_group(gid, id);
        }
        log::debug!("Deleted edge {}", id);
        true
    }

    fn remove_group(&mut self, id: &str) -> bool {
        let Some(group) = self.store.remove_group(id) else {
            return false;
        };
        for member in group.nodes.iter() {
            if let Some(n) = self.store.node_mut(member) {
                n.group_id = None;
            }
        }
        for member in group.edges.iter() {
            if let Some(e) = self.store.edge_mut(member) {
                e.group_id = None;
            }
        }
        self.queue.remove(id);
        self.preview_queue.remove(id);
        log::debug!("Deleted group {}", id);
        true
    }

    fn leave_group(&mut self, group_id: &str, member: &str) {
        let now_empty = match self.store.group_mut(group_id) {
            Some(group) => {
                group.remove_member(member);
                group.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.remove_group(group_id);
        }
    }

    /// Group persisted nodes and edges. Members are pulled out of any group
    /// they belonged to. Needs at least two members.
    pub fn group_entities(&mut self, ids: &[EntityId]) -> Option<EntityId> {
        let members: Vec<(EntityId, EntityKind)> = ids
            .iter()
            .filter(|id| self.queue.contains(id))
            .filter_map(|id| match self.store.kind_of(id) {
                Some(k @ (EntityKind::Node | EntityKind::Edge)) => Some((id.clone(), k)),
                _ => None,
            })
            .collect();
        if members.len() < 2 {
            return None;
        }

        for (id, kind) in &members {
            let old = match kind {
                EntityKind::Node => self.store.node(id).and_then(|n| n.group_id.clone()),
                _ => self.store.edge(id).and_then(|e| e.group_id.clone()),
            };
            if let Some(old) = old {
                self.leave_group(&old, id);
            }
        }

        let group_id = self.allocate_id();
        let mut group = CanvasGroup::new(group_id.clone());
        group.sort_order = self.next_order();
        let mut layer = i32::MIN;
        for (id, kind) in &members {
            match kind {
                EntityKind::Node => {
                    if let Some(n) = self.store.node_mut(id) {
                        n.group_id = Some(group_id.clone());
                        layer = layer.max(n.layer);
                        group.nodes.push(id.clone());
                    }
                }
                _ => {
                    if let Some(e) = self.store.edge_mut(id) {
                        e.group_id = Some(group_id.clone());
                        layer = layer.max(e.layer);
                        group.edges.push(id.clone());
                    }
                }
            }
        }
        group.layer = layer;
        self.store.insert_group(group);
        self.queue.add_group(&group_id, &self.store);
        self.normalize();
        self.request_save();
        log::debug!("Grouped {} entities into {}", members.len(), group_id);
        Some(group_id)
    }

    /// Dissolve a group, keeping its members.
    pub fn ungroup(&mut self, group_id: &str) -> bool {
        if !self.remove_group(group_id) {
            return false;
        }
        self.normalize();
        self.request_save();
        true
    }

    /// Raise entities above everything else in their layer.
    pub fn bring_to_front(&mut self, ids: &[EntityId]) {
        for id in self.order_targets(ids) {
            let top = self.next_order();
            if let Some(kind) = self.store.kind_of(&id) {
                self.store.set_sort_order(kind, &id, top);
            }
        }
        self.normalize();
        self.request_save();
    }

    /// Lower entities below everything else in their layer.
    pub fn send_to_back(&mut self, ids: &[EntityId]) {
        let bottom = self
            .queue
            .sorted(&self.store)
            .iter()
            .map(|r| r.sort_order)
            .fold(0.0, f64::min);
        let targets = self.order_targets(ids);
        let count = targets.len() as f64;
        for (i, id) in targets.into_iter().enumerate() {
            if let Some(kind) = self.store.kind_of(&id) {
                self.store
                    .set_sort_order(kind, &id, bottom - count + i as f64);
            }
        }
        self.normalize();
        self.request_save();
    }

    /// Grouped members reorder as their group; duplicates collapse. Keeps
    /// current relative order.
    fn order_targets(&self, ids: &[EntityId]) -> Vec<EntityId> {
        let wanted: HashSet<EntityId> = ids
            .iter()
            .filter_map(|id| {
                let group = match self.store.kind_of(id)? {
                    EntityKind::Node => self.store.node(id)?.group_id.clone(),
                    EntityKind::Edge => self.store.edge(id)?.group_id.clone(),
                    EntityKind::Group => None,
                };
                Some(group.unwrap_or_else(|| id.clone()))
            })
            .collect();
        self.queue
            .sorted(&self.store)
            .into_iter()
            .filter(|r| wanted.contains(&r.id))
            .map(|r| r.id)
            .collect()
    }

    /// Rewrite sort orders to contiguous integers and reseed the counter.
    pub fn normalize(&mut self) {
        self.queue.normalize(&mut self.store);
        self.queue.refresh(&self.store);
        self.order_counter = self.store.max_sort_order();
    }

    /// Record the natural size of a media node once its resource loaded.
    ///
    /// Auto-fit nodes take the natural size; the status is updated either way.
    pub fn resolve_media(&mut self, id: &str, width: f64, height: f64, status: LoadStatus) -> bool {
        let Some(node) = self.store.node_mut(id) else {
            return false;
        };
        if !node.is_media() {
            return false;
        }
        if node.is_auto_fit() && width > 0.0 && height > 0.0 {
            node.width = width;
            node.height = height;
        }
        if let Some(media) = node.as_media_mut() {
            media.status = status;
        }
        if !self.is_preview(id) {
            self.request_save();
        }
        true
    }

    /// Route an edge against the current node positions.
    pub fn edge_geometry(&self, id: &str) -> Option<EdgeGeometry> {
        EdgeGeometry::resolve(self.store.edge(id)?, &self.store)
    }

    /// Bounds of any entity; groups span their members.
    pub fn entity_bounds(&self, id: &str) -> Option<Rect> {
        match self.store.kind_of(id)? {
            EntityKind::Node => self.store.node(id).map(|n| n.bounds()),
            EntityKind::Edge => self.edge_geometry(id).map(|g| g.bounds()),
            EntityKind::Group => {
                let group = self.store.group(id)?;
                geometry::union_all(
                    group
                        .nodes
                        .iter()
                        .chain(&group.edges)
                        .filter_map(|m| self.entity_bounds(m)),
                )
            }
        }
    }

    fn node_hit(node: &CanvasNode, point: Point, tolerance: f64) -> bool {
        match &node.kind {
            NodeKind::Pencil(_) => {
                geometry::point_to_polyline_dist(point, &node.stroke_points()) <= tolerance
            }
            _ => node.bounds().inflate(tolerance, tolerance).contains(point),
        }
    }

    /// Topmost persisted node or edge under `point`.
    ///
    /// Previews are skipped so that a gesture never hits its own ghost.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<(EntityId, EntityKind)> {
        let items = self.queue.sorted(&self.store);
        items.into_iter().rev().find_map(|r| {
            let hit = match r.kind {
                EntityKind::Node => self
                    .store
                    .node(&r.id)
                    .is_some_and(|n| Self::node_hit(n, point, tolerance)),
                EntityKind::Edge => self
                    .edge_geometry(&r.id)
                    .is_some_and(|g| g.hit_test(point, tolerance)),
                EntityKind::Group => false,
            };
            hit.then_some((r.id, r.kind))
        })
    }

    /// Topmost persisted node under `point`, ignoring edges and `exclude`.
    pub fn node_at(&self, point: Point, exclude: Option<&str>) -> Option<EntityId> {
        self.queue
            .sorted(&self.store)
            .into_iter()
            .rev()
            .filter(|r| r.kind == EntityKind::Node && Some(r.id.as_str()) != exclude)
            .find_map(|r| {
                self.store
                    .node(&r.id)
                    .filter(|n| Self::node_hit(n, point, 0.0))
                    .map(|n| n.id.clone())
            })
    }

    /// Persisted nodes and edges touched by a rubber-band rectangle.
    ///
    /// Boxes count by bounding-box intersection, pencil strokes by segment
    /// intersection, edges when an endpoint lies inside or the route
    /// crosses the rectangle.
    pub fn query_rect(&self, rect: Rect) -> (Vec<EntityId>, Vec<EntityId>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for r in self.queue.sorted(&self.store) {
            match r.kind {
                EntityKind::Node => {
                    let Some(node) = self.store.node(&r.id) else {
                        continue;
                    };
                    let hit = match &node.kind {
                        NodeKind::Pencil(_) => {
                            geometry::polyline_intersects_rect(&node.stroke_points(), rect)
                        }
                        _ => rect.intersect(node.bounds()).area() > 0.0
                            || rect.contains(node.position()),
                    };
                    if hit {
                        nodes.push(r.id);
                    }
                }
                EntityKind::Edge => {
                    if self
                        .edge_geometry(&r.id)
                        .is_some_and(|g| g.intersects_rect(rect))
                    {
                        edges.push(r.id);
                    }
                }
                EntityKind::Group => {}
            }
        }
        (nodes, edges)
    }

    /// Persisted queue and maps, without preview entities.
    pub fn persisted_state(&self) -> (RenderQueue, EntityStore) {
        let mut store = self.store.clone();
        for id in self.preview_queue.ids() {
            match store.kind_of(id) {
                Some(EntityKind::Node) => {
                    store.remove_node(id);
                }
                Some(EntityKind::Edge) => {
                    store.remove_edge(id);
                }
                Some(EntityKind::Group) => {
                    store.remove_group(id);
                }
                None => {}
            }
        }
        // Drop back-references to preview edges.
        let preview: HashSet<&str> = self.preview_queue.ids().collect();
        let node_ids: Vec<EntityId> = store.nodes().map(|n| n.id.clone()).collect();
        for id in node_ids {
            if let Some(n) = store.node_mut(&id) {
                n.edges.retain(|e| !preview.contains(e.as_str()));
            }
        }
        let mut queue = self.queue.clone();
        queue.refresh(&store);
        (queue, store)
    }

    /// Replace the whole graph, dropping previews, and request a save.
    pub fn restore_state(&mut self, queue: RenderQueue, store: EntityStore) {
        self.store = store;
        self.queue = queue;
        self.preview_queue.clear();
        self.queue.refresh(&self.store);
        self.order_counter = self.order_counter.max(self.store.max_sort_order());
        self.request_save();
    }

    /// Replace the document with a raw `{nodes?, edges?, groups?}` value.
    ///
    /// Invalid entities are dropped; dangling references are repaired.
    pub fn load(&mut self, raw: &Value) -> Result<LoadReport, DocumentError> {
        let validated = validate_document(raw)?;
        let mut report = validated.report;

        self.store.clear();
        self.queue.clear();
        self.preview_queue.clear();
        self.save_requested = false;

        let mut order: Vec<(EntityId, EntityKind)> = Vec::new();
        for node in validated.nodes {
            if self.store.has_id(&node.id) {
                log::warn!("Dropping node with duplicate id {}", node.id);
                report.dropped_nodes += 1;
                continue;
            }
            order.push((node.id.clone(), EntityKind::Node));
            self.store.insert_node(node);
        }
        for edge in validated.edges {
            if self.store.has_id(&edge.id) {
                log::warn!("Dropping edge with duplicate id {}", edge.id);
                report.dropped_edges += 1;
                continue;
            }
            order.push((edge.id.clone(), EntityKind::Edge));
            self.store.insert_edge(edge);
        }
        for group in validated.groups {
            if self.store.has_id(&group.id) {
                log::warn!("Dropping group with duplicate id {}", group.id);
                report.dropped_groups += 1;
                continue;
            }
            order.push((group.id.clone(), EntityKind::Group));
            self.store.insert_group(group);
        }

        report.repaired = self.repair_references();
        for (id, kind) in &order {
            match kind {
                EntityKind::Node => self.queue.add_node(id, &self.store),
                EntityKind::Edge => self.queue.add_edge(id, &self.store),
                EntityKind::Group => self.queue.add_group(id, &self.store),
            };
        }
        report.nodes = self.store.nodes().count();
        report.edges = self.store.edges().count();
        report.groups = self.store.groups().count();
        self.order_counter = self.store.max_sort_order();
        if report.repaired > 0 {
            self.request_save();
        }
        log::debug!(
            "Loaded {} nodes, {} edges, {} groups ({} dropped, {} repaired)",
            report.nodes,
            report.edges,
            report.groups,
            report.dropped(),
            report.repaired
        );
        Ok(report)
    }

    /// Parse and load a serialized document.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<LoadReport, DocumentError> {
        let raw: Value = serde_json::from_slice(bytes)?;
        self.load(&raw)
    }

    /// Restore referential integrity after a load. Returns the number of
    /// repairs.
    fn repair_references(&mut self) -> usize {
        let mut repaired = 0;

        let edge_ids: Vec<EntityId> = self.store.edges().map(|e| e.id.clone()).collect();
        for id in &edge_ids {
            let Some(mut edge) = self.store.edge(id).cloned() else {
                continue;
            };
            let mut changed = false;
            for end in [EdgeEnd::From, EdgeEnd::To] {
                changed |= self.repair_dangling(&mut edge, end);
            }
            if changed {
                repaired += 1;
                self.store.insert_edge(edge);
            }
        }

        // Member back-references must name an existing group that lists them.
        let node_ids: Vec<EntityId> = self.store.nodes().map(|n| n.id.clone()).collect();
        for id in &node_ids {
            let claimed = self.store.node(id).and_then(|n| n.group_id.clone());
            if let Some(gid) = claimed {
                repaired += self.claim_membership(id, &gid, EntityKind::Node);
            }
        }
        for id in &edge_ids {
            let claimed = self.store.edge(id).and_then(|e| e.group_id.clone());
            if let Some(gid) = claimed {
                repaired += self.claim_membership(id, &gid, EntityKind::Edge);
            }
        }

        // Group lists must only name existing members that point back.
        let group_ids: Vec<EntityId> = self.store.groups().map(|g| g.id.clone()).collect();
        for gid in &group_ids {
            let Some(mut group) = self.store.group(gid).cloned() else {
                continue;
            };
            let before = group.nodes.len() + group.edges.len();
            group.nodes.retain(|m| match self.store.node(m) {
                Some(n) => n.group_id.is_none() || n.group_id.as_deref() == Some(gid),
                None => false,
            });
            group.edges.retain(|m| match self.store.edge(m) {
                Some(e) => e.group_id.is_none() || e.group_id.as_deref() == Some(gid),
                None => false,
            });
            dedup_in_place(&mut group.nodes);
            dedup_in_place(&mut group.edges);
            if group.nodes.len() + group.edges.len() != before {
                repaired += 1;
            }
            for m in &group.nodes {
                if let Some(n) = self.store.node_mut(m) {
                    if n.group_id.is_none() {
                        n.group_id = Some(gid.clone());
                        repaired += 1;
                    }
                }
            }
            for m in &group.edges {
                if let Some(e) = self.store.edge_mut(m) {
                    if e.group_id.is_none() {
                        e.group_id = Some(gid.clone());
                        repaired += 1;
                    }
                }
            }
            if group.is_empty() {
                log::warn!("Dropping empty group {}", gid);
                self.store.remove_group(gid);
                repaired += 1;
            } else {
                self.store.insert_group(group);
            }
        }

        // Node edge lists are derived from the edges.
        let mut links: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for edge in self.store.edges() {
            for node_id in edge.connected_nodes() {
                let list = links.entry(node_id.to_string()).or_default();
                if !list.contains(&edge.id) {
                    list.push(edge.id.clone());
                }
            }
        }
        for id in &node_ids {
            let rebuilt = links.remove(id).unwrap_or_default();
            if let Some(node) = self.store.node_mut(id) {
                let mut current = node.edges.clone();
                let mut expected = rebuilt.clone();
                current.sort();
                expected.sort();
                if current != expected {
                    node.edges = rebuilt;
                    repaired += 1;
                }
            }
        }

        if repaired > 0 {
            log::warn!("Repaired {} dangling references on load", repaired);
        }
        repaired
    }

    /// Make the group named by a member's `group_id` list it, or clear the
    /// back-reference if the group is missing.
    fn claim_membership(&mut self, id: &str, gid: &str, kind: EntityKind) -> usize {
        match self.store.group_mut(gid) {
            Some(group) => {
                let list = if kind == EntityKind::Node {
                    &mut group.nodes
                } else {
                    &mut group.edges
                };
                if list.iter().any(|m| m == id) {
                    0
                } else {
                    list.push(id.to_string());
                    1
                }
            }
            None => {
                match kind {
                    EntityKind::Node => {
                        if let Some(n) = self.store.node_mut(id) {
                            n.group_id = None;
                        }
                    }
                    _ => {
                        if let Some(e) = self.store.edge_mut(id) {
                            e.group_id = None;
                        }
                    }
                }
                1
            }
        }
    }

    /// Serialize persisted entities, in paint order.
    ///
    /// Preview entities and media still uploading are left out; a group is
    /// written only if an exported member still points at it.
    pub fn export_value(&self) -> Result<Value, DocumentError> {
        let sorted = self.queue.sorted(&self.store);
        let nodes: Vec<&CanvasNode> = sorted
            .iter()
            .filter(|r| r.kind == EntityKind::Node)
            .filter_map(|r| self.store.node(&r.id))
            .filter(|n| !n.is_pending_load())
            .collect();
        let edges: Vec<&CanvasEdge> = sorted
            .iter()
            .filter(|r| r.kind == EntityKind::Edge)
            .filter_map(|r| self.store.edge(&r.id))
            .collect();
        let referenced: HashSet<&str> = nodes
            .iter()
            .filter_map(|n| n.group_id.as_deref())
            .chain(edges.iter().filter_map(|e| e.group_id.as_deref()))
            .collect();
        let groups: Vec<&CanvasGroup> = sorted
            .iter()
            .filter(|r| r.kind == EntityKind::Group && referenced.contains(r.id.as_str()))
            .filter_map(|r| self.store.group(&r.id))
            .collect();
        let doc = ExportedDocument {
            nodes,
            edges,
            groups,
        };
        Ok(serde_json::to_value(&doc)?)
    }

    /// The exported document as JSON bytes.
    pub fn export(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec(&self.export_value()?)?)
    }
}

fn dedup_in_place(ids: &mut Vec<EntityId>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaNode, ShapeNode, Side};
    use serde_json::json;

    fn shape(rect: Rect) -> CanvasNode {
        CanvasNode::new("", rect, NodeKind::Shape(ShapeNode::default()))
    }

    fn two_nodes(doc: &mut CanvasDocument) -> (EntityId, EntityId) {
        let a = doc.create_node(shape(Rect::new(0.0, 0.0, 100.0, 100.0)), Lifecycle::Persisted);
        let b = doc.create_node(
            shape(Rect::new(300.0, 0.0, 400.0, 100.0)),
            Lifecycle::Persisted,
        );
        (a, b)
    }

    #[test]
    fn test_create_allocates_unique_ids_and_orders() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        assert_ne!(a, b);
        assert!(doc.node(&a).unwrap().sort_order < doc.node(&b).unwrap().sort_order);
        assert_eq!(doc.len(), 2);
        assert!(doc.take_save_request());
        assert!(!doc.take_save_request());
    }

    #[test]
    fn test_requested_id_collision_is_replaced() {
        let mut doc = CanvasDocument::new();
        let mut node = shape(Rect::new(0.0, 0.0, 1.0, 1.0));
        node.id = "fixed".into();
        let first = doc.create_node(node.clone(), Lifecycle::Persisted);
        let second = doc.create_node(node, Lifecycle::Persisted);
        assert_eq!(first, "fixed");
        assert_ne!(second, "fixed");
    }

    #[test]
    fn test_edge_registers_with_nodes() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let e = doc.create_edge(
            CanvasEdge::new(
                "",
                Endpoint::connected(&a, Side::Right),
                Endpoint::connected(&b, Side::Left),
            ),
            Lifecycle::Persisted,
        );
        assert_eq!(doc.node(&a).unwrap().edges, vec![e.clone()]);
        assert_eq!(doc.node(&b).unwrap().edges, vec![e]);
    }

    #[test]
    fn test_deleting_node_frees_endpoint_at_side_midpoint() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let e = doc.create_edge(
            CanvasEdge::new(
                "",
                Endpoint::connected(&a, Side::Right),
                Endpoint::connected(&b, Side::Left),
            ),
            Lifecycle::Persisted,
        );
        assert!(doc.delete(&b));
        let edge = doc.edge(&e).expect("edge survives node deletion");
        assert_eq!(edge.to, Endpoint::free(Point::new(300.0, 50.0)));
        assert_eq!(edge.from, Endpoint::connected(&a, Side::Right));
        assert!(doc.queue().contains(&e));
        assert!(!doc.queue().contains(&b));
    }

    #[test]
    fn test_update_keeps_managed_fields() {
        let mut doc = CanvasDocument::new();
        let (a, _) = two_nodes(&mut doc);
        doc.update_node(
            &a,
            |n| {
                n.id = "hijack".into();
                n.x = 42.0;
            },
            false,
        );
        let node = doc.node(&a).unwrap();
        assert_eq!(node.x, 42.0);
        assert!(doc.node("hijack").is_none());
        assert!(!doc.update_node("missing", |n| n.x = 1.0, true));
    }

    #[test]
    fn test_update_edge_relinks_nodes() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let e = doc.create_edge(
            CanvasEdge::new("", Endpoint::connected(&a, Side::Right), Endpoint::free(Point::ZERO)),
            Lifecycle::Persisted,
        );
        doc.update_edge(&e, |edge| edge.from = Endpoint::connected(&b, Side::Top), true);
        assert!(doc.node(&a).unwrap().edges.is_empty());
        assert_eq!(doc.node(&b).unwrap().edges, vec![e]);
    }

    #[test]
    fn test_preview_lifecycle() {
        let mut doc = CanvasDocument::new();
        let p = doc.create_node(shape(Rect::new(0.0, 0.0, 5.0, 5.0)), Lifecycle::Preview);
        assert!(!doc.save_requested());
        assert!(doc.is_preview(&p));
        let exported = doc.export_value().unwrap();
        assert_eq!(exported["nodes"].as_array().unwrap().len(), 0);

        assert!(doc.promote(&p));
        assert!(!doc.is_preview(&p));
        assert!(doc.queue().contains(&p));

        let q = doc.create_node(shape(Rect::new(0.0, 0.0, 5.0, 5.0)), Lifecycle::Preview);
        doc.clear_preview();
        assert!(doc.node(&q).is_none());
        assert!(doc.preview_queue().is_empty());
    }

    #[test]
    fn test_group_and_ungroup() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let g = doc.group_entities(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(doc.node(&a).unwrap().group_id.as_deref(), Some(g.as_str()));
        assert_eq!(doc.group(&g).unwrap().nodes.len(), 2);

        assert!(doc.ungroup(&g));
        assert!(doc.group(&g).is_none());
        assert!(doc.node(&a).unwrap().group_id.is_none());
        assert!(!doc.queue().contains(&g));
    }

    #[test]
    fn test_group_deleted_with_last_member() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let g = doc.group_entities(&[a.clone(), b.clone()]).unwrap();
        doc.delete(&a);
        assert!(doc.group(&g).is_some());
        doc.delete(&b);
        assert!(doc.group(&g).is_none());
    }

    #[test]
    fn test_bring_to_front_and_send_to_back() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let c = doc.create_node(shape(Rect::new(0.0, 0.0, 1.0, 1.0)), Lifecycle::Persisted);
        doc.bring_to_front(&[a.clone()]);
        let order: Vec<EntityId> = doc
            .queue()
            .sorted(doc.store())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![b.clone(), c.clone(), a.clone()]);

        doc.send_to_back(&[c.clone()]);
        let order: Vec<EntityId> = doc
            .queue()
            .sorted(doc.store())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_load_repairs_references_and_seeds_order() {
        let mut doc = CanvasDocument::new();
        let report = doc
            .load(&json!({
                "nodes": [
                    { "id": "a", "type": "shape", "x": 0, "y": 0, "width": 10, "height": 10,
                      "groupId": "g", "sortOrder": 12 },
                    { "id": "b", "type": "shape", "x": 0, "y": 0, "width": 10, "height": 10,
                      "groupId": "missing" }
                ],
                "edges": [
                    { "id": "e",
                      "from": { "kind": "connected", "nodeId": "a", "side": "right" },
                      "to": { "kind": "connected", "nodeId": "ghost", "side": "left" } }
                ],
                "groups": [ { "id": "g", "nodes": ["ghost"] } ]
            }))
            .unwrap();
        assert!(report.repaired > 0);
        assert_eq!(doc.edge("e").unwrap().to, Endpoint::free(Point::new(10.0, 5.0)));
        assert_eq!(doc.group("g").unwrap().nodes, vec!["a".to_string()]);
        assert!(doc.node("b").unwrap().group_id.is_none());
        assert_eq!(doc.node("a").unwrap().edges, vec!["e".to_string()]);
        assert!(doc.next_order() > 12.0);
    }

    #[test]
    fn test_export_skips_pending_media_and_unreferenced_groups() {
        let mut doc = CanvasDocument::new();
        let mut media = CanvasNode::new(
            "",
            Rect::new(0.0, 0.0, 10.0, 10.0),
            NodeKind::Image(MediaNode {
                src: "blob:1".into(),
                status: LoadStatus::Loading,
                ..Default::default()
            }),
        );
        media.style.fill = Some("#ffffff".into());
        doc.create_node(media, Lifecycle::Persisted);
        let (a, b) = two_nodes(&mut doc);
        doc.group_entities(&[a, b]).unwrap();

        let exported = doc.export_value().unwrap();
        assert_eq!(exported["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(exported["groups"].as_array().unwrap().len(), 1);

        let bytes = doc.export().unwrap();
        let mut reloaded = CanvasDocument::new();
        let report = reloaded.load_bytes(&bytes).unwrap();
        assert_eq!(report.nodes, 2);
        assert_eq!(report.groups, 1);
        assert_eq!(report.repaired, 0);
    }

    #[test]
    fn test_resolve_auto_fit_media() {
        let mut doc = CanvasDocument::new();
        let mut media = CanvasNode::new(
            "",
            Rect::new(5.0, 5.0, 5.0, 5.0),
            NodeKind::Video(MediaNode::default()),
        );
        media.width = crate::model::AUTO_FIT_SIZE;
        media.height = crate::model::AUTO_FIT_SIZE;
        let id = doc.create_node(media, Lifecycle::Persisted);
        assert!(doc.resolve_media(&id, 640.0, 360.0, LoadStatus::Remote));
        let node = doc.node(&id).unwrap();
        assert_eq!((node.width, node.height), (640.0, 360.0));
    }

    #[test]
    fn test_query_rect_and_hit_test() {
        let mut doc = CanvasDocument::new();
        let (a, b) = two_nodes(&mut doc);
        let e = doc.create_edge(
            CanvasEdge::new(
                "",
                Endpoint::connected(&a, Side::Right),
                Endpoint::connected(&b, Side::Left),
            ),
            Lifecycle::Persisted,
        );
        let (nodes, edges) = doc.query_rect(Rect::new(150.0, 40.0, 250.0, 60.0));
        assert!(nodes.is_empty());
        assert_eq!(edges, vec![e.clone()]);

        assert_eq!(doc.hit_test(Point::new(200.0, 51.0), 4.0), Some((e, EntityKind::Edge)));
        assert_eq!(doc.hit_test(Point::new(50.0, 50.0), 4.0), Some((a, EntityKind::Node)));
        assert_eq!(doc.hit_test(Point::new(200.0, 300.0), 4.0), None);
    }

    #[test]
    fn test_node_at_skips_excluded_and_previews() {
        let mut doc = CanvasDocument::new();
        let (a, _) = two_nodes(&mut doc);
        let ghost = doc.create_node(shape(Rect::new(0.0, 0.0, 100.0, 100.0)), Lifecycle::Preview);
        assert_eq!(doc.node_at(Point::new(50.0, 50.0), None), Some(a.clone()));
        assert_eq!(doc.node_at(Point::new(50.0, 50.0), Some(&a)), None);
        assert_eq!(doc.hit_test(Point::new(50.0, 50.0), 0.0), Some((a, EntityKind::Node)));
        assert!(doc.is_preview(&ghost));
    }
}
