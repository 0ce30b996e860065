//! Canvas nodes: a common record plus a per-variant payload.

use super::{EntityId, Style};
use crate::geometry::{self, SignedRect};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Width/height sentinel on media nodes meaning "auto-fit once the resource
/// has loaded". Only ever assigned to both dimensions at once.
pub const AUTO_FIT_SIZE: f64 = -1.0;

/// A side of a node's bounding box, used as a connector anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    /// Outward unit normal of this side.
    pub fn normal(self) -> Vec2 {
        match self {
            Side::Top => Vec2::new(0.0, -1.0),
            Side::Right => Vec2::new(1.0, 0.0),
            Side::Bottom => Vec2::new(0.0, 1.0),
            Side::Left => Vec2::new(-1.0, 0.0),
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }
}

/// Primitive outline of a shape node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
}

/// Load status of an image/video resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadStatus {
    /// Served from the remote document store.
    #[default]
    #[serde(rename = "dss", alias = "remote")]
    Remote,
    /// Bundled static asset.
    #[serde(rename = "static")]
    Static,
    /// Local upload still in flight; excluded from export.
    #[serde(rename = "loading", alias = "local")]
    Loading,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeNode {
    #[serde(default)]
    pub shape: ShapeKind,
}

/// Free-hand stroke. Coordinates are local to the node position and are
/// drawn scaled by `scale_x`/`scale_y` until a rescale is baked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PencilNode {
    #[serde(with = "point_pairs")]
    pub coords: Vec<Point>,
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl PencilNode {
    pub fn new(coords: Vec<Point>) -> Self {
        Self {
            coords,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Unscaled extent of the raw coordinates.
    pub fn natural_size(&self) -> (f64, f64) {
        geometry::polyline_bounds(&self.coords)
            .map(|b| (b.width(), b.height()))
            .unwrap_or((0.0, 0.0))
    }

    /// Fold the scale factors into the raw coordinates.
    pub fn bake_scale(&mut self) {
        let (sx, sy) = (self.scale_x, self.scale_y);
        for c in &mut self.coords {
            c.x *= sx;
            c.y *= sy;
        }
        self.scale_x = 1.0;
        self.scale_y = 1.0;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    #[serde(default)]
    pub text: String,
    /// Width follows the content until the first blur.
    #[serde(default)]
    pub follow_text_width: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub file_id: String,
    #[serde(default)]
    pub is_chat: bool,
    #[serde(default)]
    pub is_rss: bool,
    #[serde(default)]
    pub is_project: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaNode {
    /// Resource id or uri.
    pub src: String,
    #[serde(default)]
    pub status: LoadStatus,
    #[serde(default)]
    pub flip_x: bool,
    #[serde(default)]
    pub flip_y: bool,
}

/// Variant payload, tagged by `"type"` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Shape(ShapeNode),
    Pencil(PencilNode),
    Text(TextNode),
    File(FileNode),
    Image(MediaNode),
    Video(MediaNode),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Shape(_) => "shape",
            NodeKind::Pencil(_) => "pencil",
            NodeKind::Text(_) => "text",
            NodeKind::File(_) => "file",
            NodeKind::Image(_) => "image",
            NodeKind::Video(_) => "video",
        }
    }
}

/// A node on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNode {
    pub id: EntityId,
    /// Back-reference to the owning group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<EntityId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub style: Style,
    /// Ids of edges with a connected endpoint on this node.
    #[serde(default)]
    pub edges: Vec<EntityId>,
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub sort_order: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl CanvasNode {
    pub fn new(id: impl Into<EntityId>, rect: Rect, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            group_id: None,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            style: Style::default(),
            edges: Vec::new(),
            layer: 0,
            sort_order: 0.0,
            label: None,
            kind,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_position(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }

    /// Normalized bounding box in world coordinates.
    ///
    /// Auto-fit media report an empty box at their position; in-flight
    /// creation previews with negative extents are normalized.
    pub fn bounds(&self) -> Rect {
        if self.is_auto_fit() {
            return Rect::from_points(self.position(), self.position());
        }
        SignedRect::new(self.x, self.y, self.width, self.height).normalized()
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }

    /// Midpoint of the given side of the bounding box.
    pub fn side_point(&self, side: Side) -> Point {
        let b = self.bounds();
        let c = b.center();
        match side {
            Side::Top => Point::new(c.x, b.y0),
            Side::Right => Point::new(b.x1, c.y),
            Side::Bottom => Point::new(c.x, b.y1),
            Side::Left => Point::new(b.x0, c.y),
        }
    }

    /// The side whose midpoint is closest to `point`.
    pub fn nearest_side(&self, point: Point) -> Side {
        Side::ALL
            .into_iter()
            .min_by(|a, b| {
                let da = self.side_point(*a).distance(point);
                let db = self.side_point(*b).distance(point);
                da.total_cmp(&db)
            })
            .unwrap_or(Side::Right)
    }

    pub fn is_media(&self) -> bool {
        matches!(self.kind, NodeKind::Image(_) | NodeKind::Video(_))
    }

    pub fn is_auto_fit(&self) -> bool {
        self.is_media() && self.width == AUTO_FIT_SIZE && self.height == AUTO_FIT_SIZE
    }

    /// Whether an upload for this node is still pending.
    pub fn is_pending_load(&self) -> bool {
        match &self.kind {
            NodeKind::Image(m) | NodeKind::Video(m) => m.status == LoadStatus::Loading,
            _ => false,
        }
    }

    pub fn as_pencil(&self) -> Option<&PencilNode> {
        match &self.kind {
            NodeKind::Pencil(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pencil_mut(&mut self) -> Option<&mut PencilNode> {
        match &mut self.kind {
            NodeKind::Pencil(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextNode> {
        match &mut self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_media_mut(&mut self) -> Option<&mut MediaNode> {
        match &mut self.kind {
            NodeKind::Image(m) | NodeKind::Video(m) => Some(m),
            _ => None,
        }
    }

    /// Pencil stroke in world coordinates (empty for other variants).
    pub fn stroke_points(&self) -> Vec<Point> {
        match &self.kind {
            NodeKind::Pencil(p) => p
                .coords
                .iter()
                .map(|c| Point::new(self.x + c.x * p.scale_x, self.y + c.y * p.scale_y))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".to_string());
        }
        let numbers = [self.x, self.y, self.width, self.height, self.sort_order];
        if numbers.iter().any(|n| !n.is_finite()) {
            return Err(format!("node {} has non-finite geometry", self.id));
        }
        let negative = self.width < 0.0 || self.height < 0.0;
        if negative && !self.is_auto_fit() {
            return Err(format!("node {} has negative size", self.id));
        }
        if let NodeKind::Pencil(p) = &self.kind {
            if p.coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                return Err(format!("pencil {} has non-finite coordinates", self.id));
            }
            if !(p.scale_x.is_finite() && p.scale_y.is_finite()) {
                return Err(format!("pencil {} has non-finite scale", self.id));
            }
        }
        Ok(())
    }
}

/// Serializes `Vec<Point>` as `[[x, y], ...]`.
mod point_pairs {
    use kurbo::Point;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(points: &[Point], serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
        let pairs = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape(x: f64, y: f64, w: f64, h: f64) -> CanvasNode {
        CanvasNode::new(
            "n1",
            Rect::new(x, y, x + w, y + h),
            NodeKind::Shape(ShapeNode::default()),
        )
    }

    #[test]
    fn test_side_points() {
        let node = shape(0.0, 0.0, 100.0, 50.0);
        assert_eq!(node.side_point(Side::Top), Point::new(50.0, 0.0));
        assert_eq!(node.side_point(Side::Right), Point::new(100.0, 25.0));
        assert_eq!(node.side_point(Side::Bottom), Point::new(50.0, 50.0));
        assert_eq!(node.side_point(Side::Left), Point::new(0.0, 25.0));
    }

    #[test]
    fn test_nearest_side() {
        let node = shape(0.0, 0.0, 100.0, 100.0);
        assert_eq!(node.nearest_side(Point::new(140.0, 60.0)), Side::Right);
        assert_eq!(node.nearest_side(Point::new(50.0, -20.0)), Side::Top);
    }

    #[test]
    fn test_negative_preview_bounds_are_normalized() {
        let mut node = shape(100.0, 100.0, 0.0, 0.0);
        node.width = -40.0;
        node.height = -10.0;
        let b = node.bounds();
        assert_eq!(b, Rect::new(60.0, 90.0, 100.0, 100.0));
    }

    #[test]
    fn test_auto_fit_media() {
        let mut node = CanvasNode::new(
            "m",
            Rect::new(10.0, 10.0, 10.0, 10.0),
            NodeKind::Image(MediaNode::default()),
        );
        node.width = AUTO_FIT_SIZE;
        node.height = AUTO_FIT_SIZE;
        assert!(node.is_auto_fit());
        assert!(node.validate().is_ok());
        assert!(node.bounds().area() == 0.0);
    }

    #[test]
    fn test_pencil_bake_scale() {
        let mut pencil = PencilNode::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)]);
        pencil.scale_x = 2.0;
        pencil.scale_y = 3.0;
        pencil.bake_scale();
        assert_eq!(pencil.coords[1], Point::new(20.0, 15.0));
        assert_eq!(pencil.scale_x, 1.0);
        assert_eq!(pencil.natural_size(), (20.0, 15.0));
    }

    #[test]
    fn test_node_wire_format() {
        let value = json!({
            "id": "p1",
            "type": "pencil",
            "x": 5.0, "y": 6.0, "width": 10.0, "height": 10.0,
            "coords": [[0.0, 0.0], [10.0, 10.0]],
            "groupId": "g1",
            "sortOrder": 2.5
        });
        let node: CanvasNode = serde_json::from_value(value).unwrap();
        assert_eq!(node.group_id.as_deref(), Some("g1"));
        assert_eq!(node.layer, 0);
        assert!((node.sort_order - 2.5).abs() < f64::EPSILON);
        let pencil = node.as_pencil().unwrap();
        assert_eq!(pencil.coords.len(), 2);
        assert_eq!(pencil.scale_x, 1.0);

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "pencil");
        assert_eq!(back["coords"][1][0], 10.0);
    }

    #[test]
    fn test_media_status_aliases() {
        let value = json!({
            "id": "v", "type": "video", "x": 0.0, "y": 0.0, "width": 1.0, "height": 1.0,
            "src": "blob:1", "status": "local"
        });
        let node: CanvasNode = serde_json::from_value(value).unwrap();
        assert!(node.is_pending_load());
    }

    #[test]
    fn test_validate_rejects_negative_shape() {
        let mut node = shape(0.0, 0.0, 10.0, 10.0);
        node.width = -5.0;
        assert!(node.validate().is_err());
    }
}
