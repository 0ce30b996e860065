//! Entity data model: nodes, edges, groups and their shared style.

mod edge;
mod group;
mod load;
mod node;
mod store;
mod style;

pub use edge::{CanvasEdge, EdgeEnd, Endpoint};
pub use group::CanvasGroup;
pub use load::{LoadReport, ValidatedEntities, validate_document};
pub use node::{
    AUTO_FIT_SIZE, CanvasNode, FileNode, LoadStatus, MediaNode, NodeKind, PencilNode, ShapeKind,
    ShapeNode, Side, TextNode,
};
pub use store::EntityStore;
pub use style::{ConnectorStyle, MarkerStyle, Style, is_valid_color};

use serde::{Deserialize, Serialize};

/// Unique identifier for entities.
pub type EntityId = String;

/// Kind of entity an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge,
    Group,
}
