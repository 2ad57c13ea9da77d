//! Drawing elements stored in a view.
//!
//! Only [`Instance`], [`NetSegment`] and [`SolderDot`] take part in the
//! hierarchy and net consolidation; the remaining kinds are carried so that
//! scenes can be populated with the full content of a view.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};
use crate::geometry::{BoundingBox, Layers, Point, Span};

/// A placement of another cell inside a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Local name, unique within the containing view.
    pub name: String,
    /// Library of the instantiated cell.
    pub library: String,
    /// Name of the instantiated cell.
    pub cell: String,
    #[serde(default)]
    pub origin: Point,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Instance {
    pub fn new(
        name: impl Into<String>,
        library: impl Into<String>,
        cell: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            library: library.into(),
            cell: cell.into(),
            origin: Point::default(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style placement.
    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.origin = Point::new(x, y);
        self
    }

    /// Builder-style attribute insertion that consumes `self` and returns it.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A straight wire run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetSegment {
    pub layers: Layers,
    #[serde(flatten)]
    pub span: Span,
}

impl NetSegment {
    pub fn new(layers: Layers, start: impl Into<Point>, end: impl Into<Point>) -> Self {
        Self {
            layers,
            span: Span::new(start, end),
        }
    }

    pub fn x1(&self) -> i64 {
        self.span.start.x
    }

    pub fn y1(&self) -> i64 {
        self.span.start.y
    }

    pub fn x2(&self) -> i64 {
        self.span.end.x
    }

    pub fn y2(&self) -> i64 {
        self.span.end.y
    }

    pub fn contains_inside(&self, p: Point) -> bool {
        self.span.contains_inside(p)
    }

    /// Exact duplicate: same layers and same endpoints in either direction.
    pub fn same_as(&self, other: &NetSegment) -> bool {
        self.layers == other.layers && self.span.same_extent(&other.span)
    }

    /// Cut the segment at `points`, returning the chain of pieces ordered
    /// along the dominant axis.
    ///
    /// Every point must lie strictly inside the segment.
    pub fn split_at(&self, points: impl IntoIterator<Item = Point>) -> Result<Vec<NetSegment>> {
        let mut cuts = vec![self.span.start, self.span.end];
        for p in points {
            if !self.span.contains_inside(p) {
                return Err(DatabaseError::SplitPointOutside {
                    point: p,
                    segment: self.span.to_string(),
                });
            }
            cuts.push(p);
        }
        cuts.sort_by_key(|p| self.span.axis_key(*p));
        cuts.dedup();

        Ok(cuts
            .windows(2)
            .map(|pair| NetSegment::new(self.layers.clone(), pair[0], pair[1]))
            .collect())
    }
}

/// Junction marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolderDot {
    pub layers: Layers,
    pub at: Point,
}

impl SolderDot {
    pub fn new(layers: Layers, at: impl Into<Point>) -> Self {
        Self {
            layers,
            at: at.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub layers: Layers,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub layers: Layers,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub layers: Layers,
    pub at: Point,
    pub text: String,
}

/// Label that displays the value of a named attribute of the cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeLabel {
    pub layers: Layers,
    pub at: Point,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    pub layers: Layers,
    pub at: Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Instance(Instance),
    NetSegment(NetSegment),
    SolderDot(SolderDot),
    Line(Line),
    Rect(Rect),
    Label(Label),
    AttributeLabel(AttributeLabel),
    Pin(Pin),
}

impl Element {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Instance(_) => "instance",
            Element::NetSegment(_) => "net_segment",
            Element::SolderDot(_) => "solder_dot",
            Element::Line(_) => "line",
            Element::Rect(_) => "rect",
            Element::Label(_) => "label",
            Element::AttributeLabel(_) => "attribute_label",
            Element::Pin(_) => "pin",
        }
    }

    /// Name used to order elements when a view is listed or exported.
    pub fn name(&self) -> String {
        let detail = match self {
            Element::Instance(i) => i.name.clone(),
            Element::NetSegment(n) => n.span.to_string(),
            Element::SolderDot(d) => d.at.to_string(),
            Element::Line(l) => l.span.to_string(),
            Element::Rect(r) => format!("{}-{}", r.bounds.min, r.bounds.max),
            Element::Label(l) => l.text.clone(),
            Element::AttributeLabel(a) => a.name.clone(),
            Element::Pin(p) => p.name.clone(),
        };
        format!("{} {}", self.kind_name(), detail)
    }

    pub fn layers(&self) -> Option<&Layers> {
        match self {
            Element::Instance(_) => None,
            Element::NetSegment(n) => Some(&n.layers),
            Element::SolderDot(d) => Some(&d.layers),
            Element::Line(l) => Some(&l.layers),
            Element::Rect(r) => Some(&r.layers),
            Element::Label(l) => Some(&l.layers),
            Element::AttributeLabel(a) => Some(&a.layers),
            Element::Pin(p) => Some(&p.layers),
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Element::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_net_segment(&self) -> Option<&NetSegment> {
        match self {
            Element::NetSegment(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_solder_dot(&self) -> Option<&SolderDot> {
        match self {
            Element::SolderDot(d) => Some(d),
            _ => None,
        }
    }
}

impl From<Instance> for Element {
    fn from(i: Instance) -> Self {
        Element::Instance(i)
    }
}

impl From<NetSegment> for Element {
    fn from(n: NetSegment) -> Self {
        Element::NetSegment(n)
    }
}

impl From<SolderDot> for Element {
    fn from(d: SolderDot) -> Self {
        Element::SolderDot(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> Layers {
        Layers::single("net")
    }

    #[test]
    fn split_orders_pieces_along_x() {
        let seg = NetSegment::new(net(), (10, 0), (0, 0));
        let pieces = seg
            .split_at([Point::new(7, 0), Point::new(4, 0), Point::new(7, 0)])
            .unwrap();
        let spans: Vec<String> = pieces.iter().map(|p| p.span.to_string()).collect();
        assert_eq!(spans, ["(0, 0)-(4, 0)", "(4, 0)-(7, 0)", "(7, 0)-(10, 0)"]);
        assert!(pieces.iter().all(|p| p.layers == net()));
    }

    #[test]
    fn split_vertical_orders_along_y() {
        let seg = NetSegment::new(net(), (3, 9), (3, 0));
        let pieces = seg.split_at([Point::new(3, 5)]).unwrap();
        assert_eq!(pieces[0].span, Span::new((3, 0), (3, 5)));
        assert_eq!(pieces[1].span, Span::new((3, 5), (3, 9)));
    }

    #[test]
    fn split_rejects_point_off_the_segment() {
        let seg = NetSegment::new(net(), (0, 0), (10, 0));
        let err = seg.split_at([Point::new(5, 1)]).unwrap_err();
        assert!(matches!(err, DatabaseError::SplitPointOutside { .. }));
        let err = seg.split_at([Point::new(0, 0)]).unwrap_err();
        assert!(matches!(err, DatabaseError::SplitPointOutside { .. }));
    }

    #[test]
    fn element_json_is_tagged() {
        let e = Element::from(Instance::new("U1", "work", "INV").at(10, 20));
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(
            json,
            r#"{"type":"instance","name":"U1","library":"work","cell":"INV","origin":{"x":10,"y":20}}"#
        );
        let seg: Element = serde_json::from_str(
            r#"{"type":"net_segment","layers":["net"],"start":{"x":0,"y":0},"end":{"x":5,"y":0}}"#,
        )
        .unwrap();
        assert_eq!(seg, Element::from(NetSegment::new(net(), (0, 0), (5, 0))));
    }

    #[test]
    fn element_names_sort_by_kind_then_detail() {
        let mut names = vec![
            Element::from(SolderDot::new(net(), (1, 1))).name(),
            Element::from(Instance::new("U2", "work", "INV")).name(),
            Element::from(Instance::new("U1", "work", "INV")).name(),
        ];
        names.sort();
        assert_eq!(names, ["instance U1", "instance U2", "solder_dot (1, 1)"]);
    }
}
