//! The editing context a host drives: pointer input, commands, autosave.

use crate::config::EditorConfig;
use crate::document::CanvasDocument;
use crate::error::CanvasResult;
use crate::history::{History, Snapshot};
use crate::input::{HitTarget, PointerEvent};
use crate::model::{EdgeEnd, EntityId, EntityKind, LoadReport, LoadStatus, NodeKind, Side, Style};
use crate::selection::{HANDLE_HIT_TOLERANCE, Selection, hit_test_handles};
use crate::storage::{AutoSaveManager, Storage};
use crate::tools::{EditorState, PendingMedia, ToolEvent, ToolKind, ToolManager};
use kurbo::{Point, Size};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Distance in screen pixels between a node side and its connector anchor.
pub const CONNECT_ANCHOR_OFFSET: f64 = 12.0;

/// Runtime canvas: the editor state, the tools acting on it and the
/// autosave pipeline behind it.
pub struct Canvas<S: Storage> {
    state: EditorState,
    tools: ToolManager,
    autosave: AutoSaveManager<S>,
    /// State before the current text edit, recorded on end if it changed.
    text_checkpoint: Option<Snapshot>,
    /// Viewport size in page pixels.
    pub viewport_size: Size,
}

impl<S: Storage> Canvas<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_config(storage, EditorConfig::default())
    }

    pub fn with_config(storage: Arc<S>, config: EditorConfig) -> Self {
        let mut autosave = AutoSaveManager::new(storage);
        autosave.set_debounce(std::time::Duration::from_millis(config.autosave_debounce_ms));
        Self {
            state: EditorState::new(config),
            tools: ToolManager::new(),
            autosave,
            text_checkpoint: None,
            viewport_size: Size::new(800.0, 600.0),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.state.document
    }

    /// Direct document access for imports and host-driven edits. Changes
    /// made here bypass history.
    pub fn document_mut(&mut self) -> &mut CanvasDocument {
        &mut self.state.document
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    pub fn camera(&self) -> &crate::camera::Camera {
        &self.state.camera
    }

    pub fn camera_mut(&mut self) -> &mut crate::camera::Camera {
        &mut self.state.camera
    }

    pub fn config(&self) -> &EditorConfig {
        &self.state.config
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn autosave(&self) -> &AutoSaveManager<S> {
        &self.autosave
    }

    pub fn autosave_mut(&mut self) -> &mut AutoSaveManager<S> {
        &mut self.autosave
    }

    /// Text node currently being edited.
    pub fn editing(&self) -> Option<&str> {
        self.state.editing.as_deref()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(&mut self.state, tool);
    }

    pub fn active_tool(&self) -> ToolKind {
        self.tools.active_tool(&self.state)
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport_size = Size::new(width, height);
    }

    /// Fit the view to show every persisted entity.
    pub fn fit_to_content(&mut self) {
        let doc = &self.state.document;
        let bounds =
            crate::geometry::union_all(doc.queue().ids().filter_map(|id| doc.entity_bounds(id)));
        if let Some(bounds) = bounds {
            self.state
                .camera
                .fit_to_bounds(bounds, self.viewport_size, 50.0);
        }
    }

    // --- Pointer input ---

    /// What lies under a page position, in the order gestures prefer:
    /// resize handles, edge endpoint handles, connector anchors, entities.
    pub fn resolve_target(&self, page: Point) -> HitTarget {
        let state = &self.state;
        let camera = &state.camera;
        let doc = &state.document;
        let world = camera.screen_to_world(page);
        let tolerance = camera.screen_to_world_len(HANDLE_HIT_TOLERANCE);

        if state.selection.nodes().next().is_some() {
            if let Some(bounds) = state.selection.bounds(doc) {
                if let Some(anchor) = hit_test_handles(bounds, world, tolerance) {
                    return HitTarget::ResizeHandle(anchor);
                }
            }
        }

        for edge_id in state.selection.edges() {
            let Some(edge) = doc.edge(edge_id) else {
                continue;
            };
            for end in [EdgeEnd::From, EdgeEnd::To] {
                let hit = doc
                    .store()
                    .endpoint_position(edge.endpoint(end))
                    .is_some_and(|p| p.distance(world) <= tolerance);
                if hit {
                    return HitTarget::EdgeEndpoint {
                        edge_id: edge_id.clone(),
                        end,
                    };
                }
            }
        }

        let offset = camera.screen_to_world_len(CONNECT_ANCHOR_OFFSET);
        for node_id in state.selection.nodes() {
            let Some(node) = doc.node(node_id) else {
                continue;
            };
            if matches!(node.kind, NodeKind::Pencil(_)) {
                continue;
            }
            for side in Side::ALL {
                let anchor = node.side_point(side) + side.normal() * offset;
                if anchor.distance(world) <= tolerance {
                    return HitTarget::ConnectAnchor {
                        node_id: node_id.clone(),
                        side,
                    };
                }
            }
        }

        match doc.hit_test(world, state.config.edge_hit_tolerance) {
            Some((id, EntityKind::Node)) => HitTarget::Node(id),
            Some((id, EntityKind::Edge)) => HitTarget::Edge(id),
            _ => HitTarget::Empty,
        }
    }

    fn tool_event(&self, event: &PointerEvent) -> ToolEvent {
        let target = event
            .target
            .clone()
            .unwrap_or_else(|| self.resolve_target(event.position));
        ToolEvent::from_pointer(event, &self.state.camera, target)
    }

    /// A press outside the text being edited only ends the edit.
    pub fn pointer_down(&mut self, event: &PointerEvent) {
        let event = self.tool_event(event);
        if let Some(editing) = self.state.editing.clone() {
            let inside = event.target == HitTarget::Node(editing);
            if !inside && !event.target.is_ignored() {
                self.tools.abort(&mut self.state);
                self.end_text_edit();
                return;
            }
        }
        self.tools.pointer_down(&mut self.state, &event);
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) {
        if !self.tools.is_busy() {
            return;
        }
        let event = self.tool_event(event);
        self.tools.pointer_move(&mut self.state, &event);
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) {
        let event = self.tool_event(event);
        self.tools.pointer_up(&mut self.state, &event);
        if self.tools.current_tool() == ToolKind::Media && self.state.pending_media.is_none() {
            self.tools.set_tool(&mut self.state, ToolKind::Select);
        }
    }

    /// Abort the gesture in progress, if any.
    pub fn cancel_gesture(&mut self) {
        self.tools.abort(&mut self.state);
    }

    // --- Commands ---

    pub fn undo(&mut self) -> bool {
        self.prepare_command();
        let state = &mut self.state;
        let done = state.history.undo(&mut state.document, &mut state.selection);
        state.selection.retain_existing(state.document.store());
        done
    }

    pub fn redo(&mut self) -> bool {
        self.prepare_command();
        let state = &mut self.state;
        let done = state.history.redo(&mut state.document, &mut state.selection);
        state.selection.retain_existing(state.document.store());
        done
    }

    /// Abort any gesture and finish text editing before a command.
    fn prepare_command(&mut self) {
        self.tools.abort(&mut self.state);
        if self.state.editing.is_some() {
            self.end_text_edit();
        }
    }

    /// Run `edit` inside one history bracket. The bracket is dropped when
    /// `edit` reports that nothing changed.
    fn with_history<T>(&mut self, edit: impl FnOnce(&mut EditorState) -> Option<T>) -> Option<T> {
        self.prepare_command();
        self.state.begin_edit();
        let result = edit(&mut self.state);
        if result.is_some() {
            self.state.history.close();
        } else {
            self.state.history.discard();
        }
        result
    }

    pub fn select_all(&mut self) {
        self.prepare_command();
        self.state.selection.select_all(&self.state.document);
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
    }

    fn selected_members(state: &EditorState) -> Vec<EntityId> {
        state
            .selection
            .nodes()
            .chain(state.selection.edges())
            .cloned()
            .collect()
    }

    /// Delete every selected entity. Returns how many were removed.
    pub fn delete_selection(&mut self) -> usize {
        self.with_history(|state| {
            let ids = Self::selected_members(state);
            let removed = ids.iter().filter(|id| state.document.delete(id)).count();
            state.selection.clear();
            (removed > 0).then_some(removed)
        })
        .unwrap_or(0)
    }

    /// Group the selected nodes and edges; the new group becomes the
    /// selection.
    pub fn group_selection(&mut self) -> Option<EntityId> {
        self.with_history(|state| {
            let ids = Self::selected_members(state);
            let group_id = state.document.group_entities(&ids)?;
            state.selection.replace([group_id.as_str()], state.document.store());
            Some(group_id)
        })
    }

    /// Dissolve every selected group, keeping the members selected.
    pub fn ungroup_selection(&mut self) -> usize {
        self.with_history(|state| {
            let groups: Vec<EntityId> = state.selection.groups().cloned().collect();
            let count = groups
                .iter()
                .filter(|gid| state.document.ungroup(gid))
                .count();
            for gid in &groups {
                state.selection.deselect(gid);
            }
            (count > 0).then_some(count)
        })
        .unwrap_or(0)
    }

    pub fn bring_selection_to_front(&mut self) {
        self.with_history(|state| {
            let ids = Self::selected_members(state);
            (!ids.is_empty()).then(|| state.document.bring_to_front(&ids))
        });
    }

    pub fn send_selection_to_back(&mut self) {
        self.with_history(|state| {
            let ids = Self::selected_members(state);
            (!ids.is_empty()).then(|| state.document.send_to_back(&ids))
        });
    }

    /// Style fields shared by the whole selection.
    pub fn selection_style(&self) -> Style {
        self.state
            .selection
            .extract_shared_styles(self.state.document.store())
    }

    /// Patch the style of every selected node and edge.
    pub fn update_selection_style(&mut self, patch: impl Fn(&mut Style)) {
        self.with_history(|state| {
            let nodes: Vec<EntityId> = state.selection.nodes().cloned().collect();
            let edges: Vec<EntityId> = state.selection.edges().cloned().collect();
            if nodes.is_empty() && edges.is_empty() {
                return None;
            }
            for id in &nodes {
                state.document.update_node(
                    id,
                    |n| {
                        patch(&mut n.style);
                        n.style.sanitize();
                    },
                    true,
                );
            }
            for id in &edges {
                state.document.update_edge(
                    id,
                    |e| {
                        patch(&mut e.style);
                        e.style.sanitize();
                    },
                    true,
                );
            }
            Some(())
        });
    }

    // --- Media ---

    /// Arm the media tool with something to place.
    pub fn place_media(&mut self, media: PendingMedia) {
        self.prepare_command();
        self.state.pending_media = Some(media);
        self.tools.set_tool(&mut self.state, ToolKind::Media);
    }

    /// Record that a media resource finished loading.
    pub fn resolve_media(&mut self, id: &str, width: f64, height: f64, status: LoadStatus) -> bool {
        self.state.document.resolve_media(id, width, height, status)
    }

    // --- Text editing ---

    /// Start editing a text node.
    pub fn begin_text_edit(&mut self, id: &str) -> bool {
        let is_text = self
            .state
            .document
            .node(id)
            .is_some_and(|n| matches!(n.kind, NodeKind::Text(_)));
        if !is_text {
            return false;
        }
        self.tools.abort(&mut self.state);
        if self.state.editing.is_some() {
            self.end_text_edit();
        }
        let before = Snapshot::capture(&self.state.document, &self.state.selection);
        self.text_checkpoint = Some(before);
        self.state.editing = Some(id.to_string());
        true
    }

    /// Replace the content of the edited text node. `content_size` is the
    /// measured layout size; a content-width node adopts it.
    pub fn set_text(&mut self, text: impl Into<String>, content_size: Size) -> bool {
        let Some(id) = self.state.editing.clone() else {
            return false;
        };
        let text = text.into();
        self.state.document.update_node(
            &id,
            |n| {
                let follow = match n.as_text_mut() {
                    Some(t) => {
                        t.text = text;
                        t.follow_text_width
                    }
                    None => return,
                };
                if follow {
                    n.width = content_size.width;
                }
                n.height = n.height.max(content_size.height);
            },
            true,
        )
    }

    /// Finish editing. The node stops following its content width, and is
    /// deleted when left empty.
    pub fn end_text_edit(&mut self) {
        let Some(id) = self.state.editing.take() else {
            return;
        };
        let empty = self.state.document.node(&id).is_some_and(|n| match &n.kind {
            NodeKind::Text(t) => t.text.trim().is_empty(),
            _ => false,
        });
        if empty {
            log::debug!("Removing empty text node {}", id);
            self.state.document.delete(&id);
            self.state.selection.deselect(&id);
        } else {
            self.state.document.update_node(
                &id,
                |n| {
                    if let Some(t) = n.as_text_mut() {
                        t.follow_text_width = false;
                    }
                },
                true,
            );
        }
        if let Some(before) = self.text_checkpoint.take() {
            let after = Snapshot::capture(&self.state.document, &self.state.selection);
            if after.store != before.store || after.queue != before.queue {
                self.state.history.record(before);
            }
        }
    }

    // --- Persistence ---

    /// Load the stored document, replacing the current one.
    pub async fn load(&mut self) -> CanvasResult<LoadReport> {
        self.tools.abort(&mut self.state);
        self.state.editing = None;
        self.text_checkpoint = None;
        let report = self.autosave.load(&mut self.state.document).await?;
        self.state.history.clear();
        self.state.selection.clear();
        self.state.selection.clear_stash();
        if self.state.document.take_save_request() {
            self.autosave.mark_dirty(Instant::now());
        }
        Ok(report)
    }

    fn drain_save_request(&mut self, now: Instant) {
        if self.state.document.take_save_request() {
            self.autosave.mark_dirty(now);
        }
    }

    /// Advance the autosave clock. Returns whether a write happened.
    pub async fn tick(&mut self, now: Instant) -> CanvasResult<bool> {
        self.drain_save_request(now);
        self.autosave.maybe_save(&self.state.document, now).await
    }

    /// Write pending changes immediately.
    pub async fn flush(&mut self) -> CanvasResult<bool> {
        self.drain_save_request(Instant::now());
        if !self.autosave.is_unsaved() {
            return Ok(false);
        }
        self.autosave.save(&self.state.document).await
    }

    /// Changes not yet written, including ones not yet seen by the
    /// autosave clock.
    pub fn is_unsaved(&self) -> bool {
        self.autosave.is_unsaved() || self.state.document.save_requested()
    }
}
