//! Canvasloom Core Library
//!
//! Interaction and data-consistency engine of the canvasloom editor: the
//! entity graph, paint order, connector routing, selection, gesture
//! operators, undo history and debounced persistence.

pub mod camera;
pub mod canvas;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod model;
pub mod render_queue;
pub mod routing;
pub mod selection;
pub mod snap;
pub mod storage;
pub mod tools;

pub use camera::Camera;
pub use canvas::Canvas;
pub use config::EditorConfig;
pub use document::{CanvasDocument, Lifecycle};
pub use error::{CanvasError, CanvasResult, DocumentError};
pub use history::History;
pub use input::{HitTarget, Modifiers, MouseButton, PointerEvent};
pub use model::{
    CanvasEdge, CanvasGroup, CanvasNode, EntityId, EntityKind, EntityStore, LoadReport, NodeKind,
};
pub use render_queue::RenderQueue;
pub use routing::EdgeGeometry;
pub use selection::{Anchor, Selection};
pub use snap::{ANGLE_SNAP_INCREMENT, snap_line_endpoint};
pub use storage::{AutoSaveManager, MemoryStorage, Storage, StorageError};
pub use tools::{EditorState, Operator, PendingMedia, ToolKind, ToolManager};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
