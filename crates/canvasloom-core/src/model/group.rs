//! Groups: selection and ordering envelopes around nodes and edges.

use super::EntityId;
use serde::{Deserialize, Serialize};

/// A group of nodes and edges.
///
/// Unlike a container, a group stores no geometry: its bounds are always
/// derived from its members.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasGroup {
    pub id: EntityId,
    #[serde(default)]
    pub nodes: Vec<EntityId>,
    #[serde(default)]
    pub edges: Vec<EntityId>,
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub sort_order: f64,
}

impl CanvasGroup {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().chain(&self.edges).any(|m| m == id)
    }

    /// Remove a member id from either list.
    pub fn remove_member(&mut self, id: &str) {
        self.nodes.retain(|n| n != id);
        self.edges.retain(|e| e != id);
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".to_string());
        }
        if !self.sort_order.is_finite() {
            return Err(format!("group {} has non-finite sortOrder", self.id));
        }
        Ok(())
    }
}
