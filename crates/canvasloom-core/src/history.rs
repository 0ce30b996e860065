//! Bracketed snapshot history.
//!
//! Each bracket stores a full checkpoint of the graph and selection as it
//! was when the bracket opened. Undo and redo swap whole checkpoints in and
//! out; nothing is replayed.

use crate::document::CanvasDocument;
use crate::model::EntityStore;
use crate::render_queue::RenderQueue;
use crate::selection::{Selection, SelectionSet};

/// Default number of checkpoints kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 40;

/// A deep copy of the persisted graph and the selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub queue: RenderQueue,
    pub store: EntityStore,
    pub selection: SelectionSet,
}

impl Snapshot {
    pub fn capture(doc: &CanvasDocument, selection: &Selection) -> Self {
        let (queue, store) = doc.persisted_state();
        Self {
            queue,
            store,
            selection: selection.set().clone(),
        }
    }

    fn apply(self, doc: &mut CanvasDocument, selection: &mut Selection) {
        doc.restore_state(self.queue, self.store);
        selection.restore(self.selection);
        selection.clear_stash();
    }
}

/// Bounded undo/redo stack of checkpoints.
#[derive(Debug, Clone)]
pub struct History {
    stack: Vec<Snapshot>,
    /// Index of the checkpoint the next undo restores, plus one.
    pointer: usize,
    pending: Option<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            stack: Vec::new(),
            pointer: 0,
            pending: None,
            limit,
        }
    }

    /// Capture the pre-edit state. Ignored while a bracket is already open.
    pub fn open(&mut self, doc: &CanvasDocument, selection: &Selection) {
        if self.pending.is_some() {
            log::debug!("History bracket already open");
            return;
        }
        self.pending = Some(Snapshot::capture(doc, selection));
    }

    /// Push the captured state, discarding the redo branch.
    pub fn close(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.record(snapshot);
        }
    }

    /// Push a checkpoint captured outside a bracket, discarding the redo
    /// branch.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.stack.truncate(self.pointer);
        self.push(snapshot);
        self.pointer = self.stack.len();
        log::debug!("History checkpoint {} of {}", self.pointer, self.stack.len());
    }

    /// Drop an open bracket without recording it.
    pub fn discard(&mut self) {
        self.pending = None;
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    fn push(&mut self, snapshot: Snapshot) {
        self.stack.push(snapshot);
        while self.stack.len() > self.limit.max(1) {
            self.stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.stack.len()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.pointer = 0;
        self.pending = None;
    }

    /// Restore the state before the latest bracket.
    ///
    /// At the top of the stack the live state is pushed first so that redo
    /// can return to it.
    pub fn undo(&mut self, doc: &mut CanvasDocument, selection: &mut Selection) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.pending = None;
        if self.pointer == self.stack.len() {
            self.push(Snapshot::capture(doc, selection));
            self.pointer = self.stack.len() - 1;
        }
        self.pointer -= 1;
        self.stack[self.pointer].clone().apply(doc, selection);
        log::debug!("Undo to checkpoint {}", self.pointer);
        true
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, doc: &mut CanvasDocument, selection: &mut Selection) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.pending = None;
        self.stack[self.pointer] = Snapshot::capture(doc, selection);
        self.pointer += 1;
        self.stack[self.pointer].clone().apply(doc, selection);
        log::debug!("Redo to checkpoint {}", self.pointer);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Lifecycle;
    use crate::model::{CanvasNode, NodeKind, ShapeNode};
    use kurbo::Rect;

    fn add_shape(doc: &mut CanvasDocument, x: f64) -> String {
        doc.create_node(
            CanvasNode::new(
                "",
                Rect::new(x, 0.0, x + 10.0, 10.0),
                NodeKind::Shape(ShapeNode::default()),
            ),
            Lifecycle::Persisted,
        )
    }

    #[test]
    fn test_undo_redo_restores_exact_state() {
        let mut doc = CanvasDocument::new();
        let mut selection = Selection::new();
        let mut history = History::default();
        let a = add_shape(&mut doc, 0.0);
        selection.select(&a, doc.store());
        let before = Snapshot::capture(&doc, &selection);

        history.open(&doc, &selection);
        doc.update_node(&a, |n| n.x = 500.0, true);
        let b = add_shape(&mut doc, 100.0);
        selection.replace([b.as_str()], doc.store());
        history.close();
        let after = Snapshot::capture(&doc, &selection);

        assert!(history.undo(&mut doc, &mut selection));
        assert_eq!(Snapshot::capture(&doc, &selection), before);
        assert!(doc.take_save_request());

        assert!(history.redo(&mut doc, &mut selection));
        assert_eq!(Snapshot::capture(&doc, &selection), after);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_at_bottom_is_noop() {
        let mut doc = CanvasDocument::new();
        let mut selection = Selection::new();
        let mut history = History::default();
        assert!(!history.undo(&mut doc, &mut selection));
        assert!(!history.redo(&mut doc, &mut selection));
    }

    #[test]
    fn test_new_edit_discards_redo_branch() {
        let mut doc = CanvasDocument::new();
        let mut selection = Selection::new();
        let mut history = History::default();
        for x in [0.0, 50.0] {
            history.open(&doc, &selection);
            add_shape(&mut doc, x);
            history.close();
        }
        history.undo(&mut doc, &mut selection);
        assert!(history.can_redo());
        history.open(&doc, &selection);
        add_shape(&mut doc, 200.0);
        history.close();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_stack_is_bounded() {
        let mut doc = CanvasDocument::new();
        let selection = Selection::new();
        let mut history = History::default();
        for i in 0..41 {
            history.open(&doc, &selection);
            add_shape(&mut doc, i as f64 * 20.0);
            history.close();
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_nested_open_keeps_first_capture() {
        let mut doc = CanvasDocument::new();
        let mut selection = Selection::new();
        let mut history = History::default();
        history.open(&doc, &selection);
        add_shape(&mut doc, 0.0);
        history.open(&doc, &selection);
        add_shape(&mut doc, 30.0);
        history.close();
        history.undo(&mut doc, &mut selection);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_discard_records_nothing() {
        let doc = CanvasDocument::new();
        let selection = Selection::new();
        let mut history = History::default();
        history.open(&doc, &selection);
        history.discard();
        history.close();
        assert!(history.is_empty());
        assert!(!history.is_open());
    }
}
