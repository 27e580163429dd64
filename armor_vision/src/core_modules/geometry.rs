// THEORY:
// The `geometry` module holds the small set of planar primitives every other
// stage speaks in: points, axis-aligned integer rectangles, oriented rectangles
// and the normalized "geometry feature" view of an oriented rectangle.
//
// Key architectural principles:
// 1.  **Raw vs. Normalized**: A raw `OrientedRect` (as produced by the
//     minimum-area fit) has an inherent ±90° ambiguity: the same physical box can
//     be reported as (w, h, a) or (h, w, a + 90). Comparing raw angles or sizes
//     across rectangles is meaningless. `normalize` collapses both spellings into
//     one `GeometryFeature` whose `length` is the long side, whose `width` is the
//     short side, and whose `angle` describes the long axis within [0, 180).
// 2.  **Total Functions**: Nothing here can fail. Degenerate input (no points,
//     one point, collinear points) produces a zero-sized rectangle instead of an
//     error, which the later stages reject through their own thresholds. The
//     minimum-area fit itself is OpenCV's `minAreaRect`; an OpenCV error is logged
//     and treated like degenerate input.
// 3.  **Image Coordinates**: +x points right and +y points down. Angles are in
//     degrees, measured from +x toward +y, so a vertical light bar normalizes to 90.

use log::warn;
use opencv::core::{self, Vector};
use opencv::imgproc;
use serde::{Deserialize, Serialize};

/// A sub-pixel point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2f) -> f32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt() as f32
    }

    pub fn midpoint(&self, other: &Point2f) -> Point2f {
        Point2f::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// An integer pixel position, also used for crop offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point2i {
    pub x: i32,
    pub y: i32,
}

impl Point2i {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned integer rectangle: origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RectI {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RectI {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in pixels. Rectangles with a non-positive side have zero area.
    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    pub fn origin(&self) -> Point2i {
        Point2i::new(self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// The overlapping region of two rectangles, or an empty rectangle when
    /// they do not overlap.
    pub fn intersection(&self, other: &RectI) -> RectI {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
        let y2 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);
        if x2 <= x1 as i64 || y2 <= y1 as i64 {
            return RectI::default();
        }
        RectI::new(x1, y1, (x2 - x1 as i64) as i32, (y2 - y1 as i64) as i32)
    }
}

/// A rotated rectangle as reported by a minimum-area fit.
///
/// `width` is the side running along `angle`, `height` the perpendicular side.
/// No relation between the two is guaranteed; see [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientedRect {
    pub center: Point2f,
    pub width: f32,
    pub height: f32,
    /// Direction of the `width` side in degrees.
    pub angle: f32,
}

impl OrientedRect {
    pub fn new(center: Point2f, width: f32, height: f32, angle: f32) -> Self {
        Self {
            center,
            width,
            height,
            angle,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// The four corner points.
    pub fn points(&self) -> [Point2f; 4] {
        let radians = (self.angle as f64).to_radians();
        let (sin, cos) = radians.sin_cos();
        let half_w = self.width as f64 / 2.0;
        let half_h = self.height as f64 / 2.0;
        let cx = self.center.x as f64;
        let cy = self.center.y as f64;

        // u runs along the width side, v along the height side.
        let (ux, uy) = (cos * half_w, sin * half_w);
        let (vx, vy) = (-sin * half_h, cos * half_h);

        [
            Point2f::new((cx - ux - vx) as f32, (cy - uy - vy) as f32),
            Point2f::new((cx + ux - vx) as f32, (cy + uy - vy) as f32),
            Point2f::new((cx + ux + vx) as f32, (cy + uy + vy) as f32),
            Point2f::new((cx - ux + vx) as f32, (cy - uy + vy) as f32),
        ]
    }

    /// The smallest integer rectangle containing all four corners, with
    /// inclusive pixel bounds.
    pub fn bounding_rect(&self) -> RectI {
        let corners = self.points();
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for corner in &corners {
            min_x = min_x.min(corner.x);
            min_y = min_y.min(corner.y);
            max_x = max_x.max(corner.x);
            max_y = max_y.max(corner.y);
        }

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        RectI::new(
            x,
            y,
            max_x.ceil() as i32 - x + 1,
            max_y.ceil() as i32 - y + 1,
        )
    }
}

/// Canonical description of an oriented rectangle.
///
/// Always `length >= width` and `angle` in `[0, 180)`, describing the long axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryFeature {
    pub center: Point2f,
    /// The long side.
    pub length: f32,
    /// The short side.
    pub width: f32,
    /// Direction of the long side in degrees, within `[0, 180)`.
    pub angle: f32,
}

impl GeometryFeature {
    /// Re-expresses the feature as an oriented rectangle whose `width` side is
    /// the long axis.
    pub fn to_oriented_rect(&self) -> OrientedRect {
        OrientedRect::new(self.center, self.length, self.width, self.angle)
    }
}

impl From<&OrientedRect> for GeometryFeature {
    fn from(rect: &OrientedRect) -> Self {
        normalize(rect)
    }
}

/// Resolves the ±90° ambiguity of a raw oriented rectangle.
pub fn normalize(rect: &OrientedRect) -> GeometryFeature {
    let (length, width, angle) = if rect.width >= rect.height {
        (rect.width, rect.height, rect.angle)
    } else {
        (rect.height, rect.width, rect.angle + 90.0)
    };

    GeometryFeature {
        center: rect.center,
        length,
        width,
        angle: wrap_half_turn(angle),
    }
}

/// Maps any angle onto `[0, 180)`.
fn wrap_half_turn(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(180.0);
    // rem_euclid rounds tiny negative inputs up to exactly 180, and keeps -0.0.
    if wrapped >= 180.0 || wrapped == 0.0 { 0.0 } else { wrapped }
}

/// Minimum-area oriented rectangle enclosing a point set, as fitted by OpenCV.
///
/// An empty set yields the default rectangle, a single point a zero-sized one,
/// and collinear points a zero-height one. Non-finite points are ignored.
pub fn min_area_rect(points: &[Point2f]) -> OrientedRect {
    let finite: Vector<core::Point2f> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .map(|p| core::Point2f::new(p.x, p.y))
        .collect();
    if finite.is_empty() {
        return OrientedRect::default();
    }

    match imgproc::min_area_rect(&finite) {
        Ok(fitted) => OrientedRect::new(
            Point2f::new(fitted.center.x, fitted.center.y),
            fitted.size.width,
            fitted.size.height,
            fitted.angle,
        ),
        Err(error) => {
            warn!("min_area_rect failed on {} points: {}", finite.len(), error);
            OrientedRect::default()
        }
    }
}
