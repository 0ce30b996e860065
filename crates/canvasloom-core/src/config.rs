//! Editor tuning knobs.

use crate::error::DocumentError;
use crate::model::Style;
use serde::{Deserialize, Serialize};

/// Thresholds, limits and defaults used by the editing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Page-space movement separating a click from a drag.
    pub drag_threshold: f64,
    /// Rubber-band selection stays invisible until the pointer moved this far.
    pub select_activation_distance: f64,
    /// Maximum number of history checkpoints.
    pub history_limit: usize,
    /// Debounce between the last mutation and the write.
    pub autosave_debounce_ms: u64,
    /// Shapes smaller than this on either axis are discarded on creation.
    pub min_shape_size: f64,
    /// Text drags below this create a content-width text node.
    pub min_text_drag: f64,
    pub default_text_size: f64,
    pub default_file_width: f64,
    pub default_file_height: f64,
    /// Hit tolerance for edges, in world units.
    pub edge_hit_tolerance: f64,
    /// Style applied to newly created nodes and edges.
    pub default_style: Style,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
            select_activation_distance: 5.0,
            history_limit: 40,
            autosave_debounce_ms: 1500,
            min_shape_size: 10.0,
            min_text_drag: 4.0,
            default_text_size: 16.0,
            default_file_width: 240.0,
            default_file_height: 180.0,
            edge_hit_tolerance: 6.0,
            default_style: Style::default(),
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.default_style.sanitize();
        if config.history_limit == 0 {
            log::warn!("history_limit of 0 disables undo");
        }
        Ok(config)
    }
}
