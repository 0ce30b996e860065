//! Schema validation and defaulting of raw documents.

use super::{CanvasEdge, CanvasGroup, CanvasNode};
use crate::error::DocumentError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome counters of a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub nodes: usize,
    pub edges: usize,
    pub groups: usize,
    pub dropped_nodes: usize,
    pub dropped_edges: usize,
    pub dropped_groups: usize,
    /// Referential repairs applied after validation.
    pub repaired: usize,
}

impl LoadReport {
    pub fn dropped(&self) -> usize {
        self.dropped_nodes + self.dropped_edges + self.dropped_groups
    }
}

/// Entities that passed validation, in document order.
#[derive(Debug, Default)]
pub struct ValidatedEntities {
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
    pub groups: Vec<CanvasGroup>,
    pub report: LoadReport,
}

/// Validate a raw `{nodes?, edges?, groups?}` document.
///
/// Each collection may be an array or an object keyed by id. Invalid
/// entities are logged and skipped; only a non-object top level is fatal.
pub fn validate_document(raw: &Value) -> Result<ValidatedEntities, DocumentError> {
    let object = raw
        .as_object()
        .ok_or_else(|| DocumentError::InvalidDocument("expected a JSON object".to_string()))?;

    let mut out = ValidatedEntities::default();

    let (nodes, dropped) = validate_collection(object.get("nodes"), "node", |n: &mut CanvasNode| {
        n.style.sanitize();
        n.validate()
    });
    out.nodes = nodes;
    out.report.dropped_nodes = dropped;

    let (edges, dropped) = validate_collection(object.get("edges"), "edge", |e: &mut CanvasEdge| {
        e.style.sanitize();
        e.validate()
    });
    out.edges = edges;
    out.report.dropped_edges = dropped;

    let (groups, dropped) =
        validate_collection(object.get("groups"), "group", |g: &mut CanvasGroup| g.validate());
    out.groups = groups;
    out.report.dropped_groups = dropped;

    out.report.nodes = out.nodes.len();
    out.report.edges = out.edges.len();
    out.report.groups = out.groups.len();
    Ok(out)
}

fn validate_collection<T, F>(value: Option<&Value>, what: &str, check: F) -> (Vec<T>, usize)
where
    T: DeserializeOwned,
    F: Fn(&mut T) -> Result<(), String>,
{
    let items: Vec<&Value> = match value {
        None | Some(Value::Null) => return (Vec::new(), 0),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        Some(other) => {
            log::warn!("Ignoring {} collection of unexpected shape: {}", what, other);
            return (Vec::new(), 0);
        }
    };

    let mut valid = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in items {
        let parsed = serde_json::from_value::<T>(item.clone())
            .map_err(|e| e.to_string())
            .and_then(|mut entity| check(&mut entity).map(|_| entity));
        match parsed {
            Ok(entity) => valid.push(entity),
            Err(reason) => {
                log::warn!("Dropping invalid {}: {}", what, reason);
                dropped += 1;
            }
        }
    }
    (valid, dropped)
}
