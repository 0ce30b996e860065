//! Connectors between nodes or free points.

use super::{EntityId, Side, Style};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// One end of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    /// Anchored at explicit world coordinates.
    Free { x: f64, y: f64 },
    /// Anchored to the midpoint of a node side.
    #[serde(rename_all = "camelCase")]
    Connected { node_id: EntityId, side: Side },
}

impl Endpoint {
    pub fn free(p: Point) -> Self {
        Endpoint::Free { x: p.x, y: p.y }
    }

    pub fn connected(node_id: impl Into<EntityId>, side: Side) -> Self {
        Endpoint::Connected {
            node_id: node_id.into(),
            side,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Endpoint::Connected { node_id, .. } => Some(node_id),
            Endpoint::Free { .. } => None,
        }
    }

    pub fn free_point(&self) -> Option<Point> {
        match self {
            Endpoint::Free { x, y } => Some(Point::new(*x, *y)),
            Endpoint::Connected { .. } => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Endpoint::Free { .. })
    }
}

/// Which end of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeEnd {
    From,
    To,
}

impl EdgeEnd {
    pub fn other(self) -> EdgeEnd {
        match self {
            EdgeEnd::From => EdgeEnd::To,
            EdgeEnd::To => EdgeEnd::From,
        }
    }
}

/// A connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasEdge {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<EntityId>,
    pub from: Endpoint,
    pub to: Endpoint,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub sort_order: f64,
}

impl CanvasEdge {
    pub fn new(id: impl Into<EntityId>, from: Endpoint, to: Endpoint) -> Self {
        Self {
            id: id.into(),
            group_id: None,
            from,
            to,
            style: Style::default(),
            layer: 0,
            sort_order: 0.0,
        }
    }

    pub fn endpoint(&self, end: EdgeEnd) -> &Endpoint {
        match end {
            EdgeEnd::From => &self.from,
            EdgeEnd::To => &self.to,
        }
    }

    pub fn endpoint_mut(&mut self, end: EdgeEnd) -> &mut Endpoint {
        match end {
            EdgeEnd::From => &mut self.from,
            EdgeEnd::To => &mut self.to,
        }
    }

    /// Ids of the nodes this edge is connected to (0, 1 or 2, may repeat).
    pub fn connected_nodes(&self) -> impl Iterator<Item = &str> {
        [&self.from, &self.to].into_iter().filter_map(|e| e.node_id())
    }

    pub fn references(&self, node_id: &str) -> bool {
        self.connected_nodes().any(|n| n == node_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".to_string());
        }
        if !self.sort_order.is_finite() {
            return Err(format!("edge {} has non-finite sortOrder", self.id));
        }
        for end in [&self.from, &self.to] {
            match end {
                Endpoint::Free { x, y } if !(x.is_finite() && y.is_finite()) => {
                    return Err(format!("edge {} has a non-finite endpoint", self.id));
                }
                Endpoint::Connected { node_id, .. } if node_id.is_empty() => {
                    return Err(format!("edge {} references an empty node id", self.id));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_wire_format() {
        let edge: CanvasEdge = serde_json::from_value(json!({
            "id": "e1",
            "from": { "kind": "connected", "nodeId": "a", "side": "right" },
            "to": { "kind": "free", "x": 10.0, "y": 20.0 }
        }))
        .unwrap();
        assert_eq!(edge.from, Endpoint::connected("a", Side::Right));
        assert_eq!(edge.to.free_point(), Some(Point::new(10.0, 20.0)));
        assert_eq!(edge.layer, 0);

        let back = serde_json::to_value(&edge).unwrap();
        assert_eq!(back["from"]["nodeId"], "a");
        assert_eq!(back["to"]["kind"], "free");
    }

    #[test]
    fn test_connected_nodes() {
        let edge = CanvasEdge::new(
            "e",
            Endpoint::connected("a", Side::Left),
            Endpoint::connected("b", Side::Top),
        );
        let nodes: Vec<&str> = edge.connected_nodes().collect();
        assert_eq!(nodes, vec!["a", "b"]);
        assert!(edge.references("b"));
        assert!(!edge.references("c"));
    }

    #[test]
    fn test_validate_rejects_nan_endpoint() {
        let edge = CanvasEdge::new(
            "e",
            Endpoint::Free { x: f64::NAN, y: 0.0 },
            Endpoint::free(Point::ZERO),
        );
        assert!(edge.validate().is_err());
    }
}
