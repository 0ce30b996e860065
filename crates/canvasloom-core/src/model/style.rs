//! Visual attributes shared by nodes and edges.

use serde::{Deserialize, Serialize};

/// Marker drawn at an edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStyle {
    #[default]
    None,
    Arrow,
    Triangle,
    Circle,
    Diamond,
}

/// How a connector is routed between its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStyle {
    /// Direct segment.
    #[default]
    Straight,
    /// Orthogonal elbows with rounded corners.
    Stepped,
    /// Single cubic bezier.
    Smooth,
}

impl ConnectorStyle {
    /// Cycle to the next connector style.
    pub fn next(self) -> Self {
        match self {
            ConnectorStyle::Straight => ConnectorStyle::Stepped,
            ConnectorStyle::Stepped => ConnectorStyle::Smooth,
            ConnectorStyle::Smooth => ConnectorStyle::Straight,
        }
    }
}

/// Optional bag of visual attributes.
///
/// Every field is optional: an unset field means "renderer default". The same
/// type doubles as the result of shared-style extraction over a selection,
/// where an unset field means the selected entities disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Style {
    /// Fill color, hex (`#rrggbb`) or `"transparent"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Stroke color, hex or `"transparent"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    /// Opacity in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<MarkerStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<MarkerStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<ConnectorStyle>,
    /// Provenance marker for colors that came from an import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_color: Option<bool>,
}

impl Style {
    /// The connector style, defaulting to straight.
    pub fn connector_style(&self) -> ConnectorStyle {
        self.connector.unwrap_or_default()
    }

    /// Opacity clamped into [0, 1], defaulting to fully opaque.
    pub fn opacity(&self) -> f64 {
        self.opacity.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Clamp out-of-range values in place. Called on load.
    pub fn sanitize(&mut self) {
        if let Some(o) = self.opacity.as_mut() {
            *o = o.clamp(0.0, 1.0);
        }
        if let Some(w) = self.stroke_width.as_mut() {
            *w = w.max(0.0);
        }
        if let Some(r) = self.corner_radius.as_mut() {
            *r = r.max(0.0);
        }
        for color in [&mut self.fill, &mut self.stroke] {
            if color.as_deref().is_some_and(|c| !is_valid_color(c)) {
                log::warn!("Dropping invalid color {:?}", color);
                *color = None;
            }
        }
    }

    /// Keep only the fields on which `self` and `other` agree.
    pub fn intersect(&self, other: &Style) -> Style {
        fn keep<T: Clone + PartialEq>(a: &Option<T>, b: &Option<T>) -> Option<T> {
            if a == b { a.clone() } else { None }
        }
        Style {
            fill: keep(&self.fill, &other.fill),
            stroke: keep(&self.stroke, &other.stroke),
            stroke_width: keep(&self.stroke_width, &other.stroke_width),
            corner_radius: keep(&self.corner_radius, &other.corner_radius),
            opacity: keep(&self.opacity, &other.opacity),
            text_size: keep(&self.text_size, &other.text_size),
            start_marker: keep(&self.start_marker, &other.start_marker),
            end_marker: keep(&self.end_marker, &other.end_marker),
            connector: keep(&self.connector, &other.connector),
            imported_color: keep(&self.imported_color, &other.imported_color),
        }
    }
}

/// Accepts `transparent`, `#rgb`, `#rrggbb` and `#rrggbbaa`.
pub fn is_valid_color(color: &str) -> bool {
    if color == "transparent" {
        return true;
    }
    match color.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_validation() {
        assert!(is_valid_color("transparent"));
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#12ab9F"));
        assert!(is_valid_color("#12ab9F80"));
        assert!(!is_valid_color("red"));
        assert!(!is_valid_color("#12345"));
        assert!(!is_valid_color("#ggg"));
    }

    #[test]
    fn test_sanitize_clamps_and_drops() {
        let mut style = Style {
            opacity: Some(1.7),
            stroke_width: Some(-2.0),
            fill: Some("blue".to_string()),
            stroke: Some("#000".to_string()),
            ..Default::default()
        };
        style.sanitize();
        assert_eq!(style.opacity, Some(1.0));
        assert_eq!(style.stroke_width, Some(0.0));
        assert_eq!(style.fill, None);
        assert_eq!(style.stroke.as_deref(), Some("#000"));
    }

    #[test]
    fn test_intersect_keeps_agreeing_fields() {
        let a = Style {
            fill: Some("#ff0000".into()),
            stroke_width: Some(2.0),
            ..Default::default()
        };
        let b = Style {
            fill: Some("#ff0000".into()),
            stroke_width: Some(4.0),
            ..Default::default()
        };
        let shared = a.intersect(&b);
        assert_eq!(shared.fill.as_deref(), Some("#ff0000"));
        assert_eq!(shared.stroke_width, None);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let style = Style {
            stroke_width: Some(3.0),
            connector: Some(ConnectorStyle::Stepped),
            ..Default::default()
        };
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["strokeWidth"], 3.0);
        assert_eq!(json["connector"], "stepped");
        assert!(json.get("fill").is_none());
    }
}
