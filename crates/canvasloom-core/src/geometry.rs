//! Vector and rectangle helpers layered on top of kurbo.
//!
//! kurbo already covers the basic algebra (`Point`, `Vec2`, `Rect`). This
//! module adds what the editor needs on top: signed (mirrorable) rectangles,
//! ratio mapping between a member and its selection frame, and the segment
//! tests used by rubber-band selection and connector routing.

use kurbo::{Point, Rect, Vec2};

/// Tolerance used for degenerate-length checks.
pub const EPSILON: f64 = 1e-9;

/// A rectangle whose width and height may be negative.
///
/// Negative extents mean the content is mirrored along that axis. Resize
/// gestures work in this space so that dragging a handle across the
/// opposite edge flips instead of clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SignedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A signed rect spanning from `origin` to `current`.
    pub fn from_drag(origin: Point, current: Point) -> Self {
        Self::new(origin.x, origin.y, current.x - origin.x, current.y - origin.y)
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    /// The axis-aligned rectangle covering the same area, with positive size.
    pub fn normalized(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }

    pub fn flipped_x(&self) -> bool {
        self.width < 0.0
    }

    pub fn flipped_y(&self) -> bool {
        self.height < 0.0
    }
}

/// A rectangle expressed as fractions of a reference frame.
///
/// `x`/`y` are offsets from the frame origin divided by the frame size;
/// `width`/`height` are the member size divided by the frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RatioRect {
    /// Express `rect` relative to `frame`.
    pub fn of(rect: Rect, frame: Rect) -> Self {
        let fw = frame.width();
        let fh = frame.height();
        Self {
            x: safe_div(rect.x0 - frame.x0, fw),
            y: safe_div(rect.y0 - frame.y0, fh),
            width: safe_div(rect.width(), fw),
            height: safe_div(rect.height(), fh),
        }
    }

    /// Express a single point relative to `frame`.
    pub fn of_point(point: Point, frame: Rect) -> Self {
        Self::of(Rect::from_points(point, point), frame)
    }

    /// Map back into a (possibly mirrored) frame.
    pub fn resolve(&self, frame: SignedRect) -> SignedRect {
        SignedRect {
            x: frame.x + self.x * frame.width,
            y: frame.y + self.y * frame.height,
            width: self.width * frame.width,
            height: self.height * frame.height,
        }
    }
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() < EPSILON { 0.0 } else { num / den }
}

/// Normalize `v`, falling back to `fallback` for zero-length vectors.
pub fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let len = v.hypot();
    if len < EPSILON { fallback } else { v / len }
}

/// Unit vector along the dominant axis of `v` (x wins ties).
pub fn dominant_axis(v: Vec2) -> Vec2 {
    if v.x.abs() >= v.y.abs() {
        Vec2::new(if v.x < 0.0 { -1.0 } else { 1.0 }, 0.0)
    } else {
        Vec2::new(0.0, if v.y < 0.0 { -1.0 } else { 1.0 })
    }
}

/// Scale `point` about `anchor` by independent factors.
pub fn scale_about(point: Point, anchor: Point, sx: f64, sy: f64) -> Point {
    Point::new(
        anchor.x + (point.x - anchor.x) * sx,
        anchor.y + (point.y - anchor.y) * sy,
    )
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance(*only),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Test if two line segments (a-b) and (c-d) intersect.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let cross = |o: Point, p: Point, q: Point| -> f64 {
        (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x)
    };
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    let on_segment = |p: Point, q: Point, r: Point| -> bool {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };
    (d1.abs() < 1e-10 && on_segment(c, d, a))
        || (d2.abs() < 1e-10 && on_segment(c, d, b))
        || (d3.abs() < 1e-10 && on_segment(a, b, c))
        || (d4.abs() < 1e-10 && on_segment(a, b, d))
}

/// Test if a segment touches a rectangle (inside or crossing an edge).
pub fn segment_intersects_rect(a: Point, b: Point, rect: Rect) -> bool {
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

/// Test if any segment of a polyline touches a rectangle.
pub fn polyline_intersects_rect(points: &[Point], rect: Rect) -> bool {
    match points {
        [] => false,
        [only] => rect.contains(*only),
        _ => points
            .windows(2)
            .any(|w| segment_intersects_rect(w[0], w[1], rect)),
    }
}

/// Intersection of two rays `p + t*d` and `q + s*e` with `t, s >= 0`.
///
/// Returns `None` for parallel rays or rays that diverge.
pub fn ray_intersection(p: Point, d: Vec2, q: Point, e: Vec2) -> Option<Point> {
    let denom = d.cross(e);
    if denom.abs() < EPSILON {
        return None;
    }
    let w = q - p;
    let t = w.cross(e) / denom;
    let s = w.cross(d) / denom;
    if t < -EPSILON || s < -EPSILON {
        return None;
    }
    Some(p + d * t)
}

/// Bounding box of a point list.
pub fn polyline_bounds(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(
        rest.iter()
            .fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p)),
    )
}

/// Union of a sequence of rectangles.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}
