//! Integer geometry shared by the drawing elements.
//!
//! Coordinates are database units (see [`crate::DatabaseConfig::user_units`]),
//! so coincidence tests are exact.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in schematic space.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<(i64, i64)> for Point {
    fn from((x, y): (i64, i64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The set of layers an element is drawn on.
///
/// Two elements only interact (split, join at a junction) when their layer
/// sets are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layers(BTreeSet<String>);

impl Layers {
    pub fn new<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(layers.into_iter().map(Into::into).collect())
    }

    /// Convenience constructor for the common single-layer case.
    pub fn single(layer: impl Into<String>) -> Self {
        Self::new([layer])
    }

    pub fn contains(&self, layer: &str) -> bool {
        self.0.contains(layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Layers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", names.join(","))
    }
}

/// A straight run between two points, the geometric part of a net segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Point,
    pub end: Point,
}

impl Span {
    pub fn new(start: impl Into<Point>, end: impl Into<Point>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x
    }

    /// Zero-length span (both endpoints coincide).
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    pub fn endpoints(&self) -> [Point; 2] {
        [self.start, self.end]
    }

    pub fn has_endpoint(&self, p: Point) -> bool {
        self.start == p || self.end == p
    }

    /// Same endpoints, in either direction.
    pub fn same_extent(&self, other: &Span) -> bool {
        (self.start == other.start && self.end == other.end)
            || (self.start == other.end && self.end == other.start)
    }

    /// Point lies on the span's line, between its endpoints (inclusive).
    pub fn contains(&self, p: Point) -> bool {
        let (a, b) = (self.start, self.end);
        // (b - a) x (p - a) == 0, compared as sign and magnitude so the
        // full i64 range never overflows.
        let lhs = signed_product(delta(a.x, b.x), delta(a.y, p.y));
        let rhs = signed_product(delta(a.y, b.y), delta(a.x, p.x));
        lhs == rhs
            && a.x.min(b.x) <= p.x
            && p.x <= a.x.max(b.x)
            && a.y.min(b.y) <= p.y
            && p.y <= a.y.max(b.y)
    }

    /// Point lies on the span strictly between its endpoints.
    pub fn contains_inside(&self, p: Point) -> bool {
        !self.is_degenerate() && !self.has_endpoint(p) && self.contains(p)
    }

    /// Sort key along the dominant axis: x unless the span is vertical.
    pub fn axis_key(&self, p: Point) -> i64 {
        if self.is_vertical() {
            p.y
        } else {
            p.x
        }
    }
}

/// `to - from`, exact for any pair of i64 values.
fn delta(from: i64, to: i64) -> i128 {
    i128::from(to) - i128::from(from)
}

/// Product of two deltas as (is negative, magnitude).
///
/// Each magnitude is below 2^64, so the product fits in a u128.
fn signed_product(a: i128, b: i128) -> (bool, u128) {
    let magnitude = a.unsigned_abs() * b.unsigned_abs();
    (magnitude != 0 && (a < 0) != (b < 0), magnitude)
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Axis-aligned rectangle given by two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(a: impl Into<Point>, b: impl Into<Point>) -> Self {
        let (a, b) = (a.into(), b.into());
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    pub fn width(&self) -> u64 {
        self.max.x.abs_diff(self.min.x)
    }

    pub fn height(&self) -> u64 {
        self.max.y.abs_diff(self.min.y)
    }
}
