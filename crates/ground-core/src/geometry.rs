//! Geometric overlap tests for collision detection.
//!
//! All tests are stateless and operate on airport-local ENU coordinates
//! in meters. Used both for static containment checks (footprint vs
//! restricted zone) and as building blocks for conflict geometry.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// 2D vector / point in airport-local coordinates (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (self - other).length()
    }

    /// Perpendicular (rotated 90 degrees counter-clockwise).
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Rotate by `angle_rad` counter-clockwise.
    pub fn rotated(self, angle_rad: f64) -> Vec2 {
        let (sin, cos) = angle_rad.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Unit vector pointing along a compass heading (0 = north, clockwise).
    pub fn from_heading_deg(heading_deg: f64) -> Vec2 {
        let rad = heading_deg.to_radians();
        Vec2::new(rad.sin(), rad.cos())
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Aircraft footprint used for overlap tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Footprint {
    Circle { radius_m: f64 },
    /// Convex polygon, vertices relative to the aircraft position.
    Polygon { vertices: Vec<Vec2> },
}

impl Footprint {
    /// Test whether two positioned footprints overlap.
    pub fn overlaps(&self, pos: Vec2, other: &Footprint, other_pos: Vec2) -> bool {
        match (self, other) {
            (Footprint::Circle { radius_m: r1 }, Footprint::Circle { radius_m: r2 }) => {
                circles_overlap(pos, *r1, other_pos, *r2)
            }
            (Footprint::Circle { radius_m }, Footprint::Polygon { vertices }) => {
                circle_polygon_overlap(pos, *radius_m, &translate(vertices, other_pos))
            }
            (Footprint::Polygon { vertices }, Footprint::Circle { radius_m }) => {
                circle_polygon_overlap(other_pos, *radius_m, &translate(vertices, pos))
            }
            (Footprint::Polygon { vertices: a }, Footprint::Polygon { vertices: b }) => {
                polygons_overlap(&translate(a, pos), &translate(b, other_pos))
            }
        }
    }
}

fn translate(vertices: &[Vec2], offset: Vec2) -> Vec<Vec2> {
    vertices.iter().map(|v| *v + offset).collect()
}

/// Two circles overlap when center distance is below the radius sum.
pub fn circles_overlap(c1: Vec2, r1: f64, c2: Vec2, r2: f64) -> bool {
    c1.distance(c2) < r1 + r2
}

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(point: Vec2, polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from a point to a line segment.
pub fn segment_point_distance(a: Vec2, b: Vec2, point: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Circle vs convex polygon overlap: center inside, or any edge closer
/// than the radius.
pub fn circle_polygon_overlap(center: Vec2, radius_m: f64, polygon: &[Vec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    if point_in_polygon(center, polygon) {
        return true;
    }
    let n = polygon.len();
    (0..n).any(|i| segment_point_distance(polygon[i], polygon[(i + 1) % n], center) < radius_m)
}

/// Project a polygon onto an axis; returns the (min, max) interval.
pub fn project_polygon(axis: Vec2, polygon: &[Vec2]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for vertex in polygon {
        let projection = vertex.dot(axis);
        min = min.min(projection);
        max = max.max(projection);
    }
    (min, max)
}

/// Separating-axis test for two convex polygons.
///
/// The polygons do not overlap if and only if some axis perpendicular to
/// an edge of either polygon separates their projected intervals.
pub fn polygons_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    for polygon in [a, b] {
        let n = polygon.len();
        for i in 0..n {
            let edge = polygon[(i + 1) % n] - polygon[i];
            let axis = edge.perp();
            let (min_a, max_a) = project_polygon(axis, a);
            let (min_b, max_b) = project_polygon(axis, b);
            if max_a < min_b || max_b < min_a {
                return false;
            }
        }
    }
    true
}
