//! Core geometry types and viewport transform mathematics.
//!
//! Label geometry is stored in [0,1] normalized space and converted to image
//! pixel space only at draw or hit-test time, which keeps overlays
//! resolution-independent and makes zoom a pure scale-factor change.

use crate::constants::{MAX_SCALE, MIN_SCALE};

/// A 2D point. Units depend on context: normalized, image-pixel, or canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance to the segment `a`-`b`, measured perpendicular where
    /// possible and to the nearest endpoint otherwise.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let vx = b.x - a.x;
        let vy = b.y - a.y;
        let len_sq = vx * vx + vy * vy;
        if len_sq == 0.0 {
            return self.distance_to(a);
        }
        let t = (((self.x - a.x) * vx + (self.y - a.y) * vy) / len_sq).clamp(0.0, 1.0);
        let proj = Point::new(a.x + t * vx, a.y + t * vy);
        self.distance_to(&proj)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Top-left corner X coordinate
    pub x: f64,
    /// Top-left corner Y coordinate
    pub y: f64,
    /// Width of the box
    pub width: f64,
    /// Height of the box
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box covering all the given points. `None` for an empty set.
    pub fn around(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Get the center point of the box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside the box.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Box grown by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// The four corners, clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }

    /// Minimum distance from `point` to the box edges (0 on an edge).
    pub fn edge_distance(&self, point: &Point) -> f64 {
        let c = self.corners();
        let mut best = f64::INFINITY;
        for i in 0..4 {
            let d = point.distance_to_segment(&c[i], &c[(i + 1) % 4]);
            best = best.min(d);
        }
        best
    }
}

/// Viewport transform mapping image pixel space to canvas space.
///
/// The image center lands on the canvas center at `pan = (0, 0)`. Rotation is
/// applied about the canvas center, before scale and pan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    /// Rotation in radians, counter-clockwise.
    pub rotation: f64,
}

impl Transform {
    pub fn new(scale: f64, pan_x: f64, pan_y: f64) -> Self {
        Self {
            scale,
            pan_x,
            pan_y,
            rotation: 0.0,
        }
    }

    /// Identity transform (scale 1, no pan, no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Map an image-pixel point into canvas space.
    pub fn apply(&self, p: Point, canvas: (f64, f64), image: (f64, f64)) -> Point {
        let dx = p.x - image.0 / 2.0;
        let dy = p.y - image.1 / 2.0;
        let (sin, cos) = self.rotation.sin_cos();
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;
        Point::new(
            canvas.0 / 2.0 + rx * self.scale + self.pan_x,
            canvas.1 / 2.0 + ry * self.scale + self.pan_y,
        )
    }

    /// Map a canvas point back into image pixel space.
    pub fn invert(&self, p: Point, canvas: (f64, f64), image: (f64, f64)) -> Point {
        let rx = (p.x - canvas.0 / 2.0 - self.pan_x) / self.scale;
        let ry = (p.y - canvas.1 / 2.0 - self.pan_y) / self.scale;
        let (sin, cos) = self.rotation.sin_cos();
        let dx = rx * cos + ry * sin;
        let dy = -rx * sin + ry * cos;
        Point::new(dx + image.0 / 2.0, dy + image.1 / 2.0)
    }

    /// Rescale while keeping the point under the cursor fixed.
    ///
    /// The rotated image offset under the cursor is recovered, then pan is
    /// recomputed so the same offset lands under the cursor at the new scale.
    pub fn zoom_to_cursor(&self, new_scale: f64, cursor: Point, canvas: (f64, f64)) -> Transform {
        let new_scale = new_scale.clamp(MIN_SCALE, MAX_SCALE);
        let rel_x = cursor.x - canvas.0 / 2.0;
        let rel_y = cursor.y - canvas.1 / 2.0;

        let off_x = (rel_x - self.pan_x) / self.scale;
        let off_y = (rel_y - self.pan_y) / self.scale;

        Transform {
            scale: new_scale,
            pan_x: rel_x - off_x * new_scale,
            pan_y: rel_y - off_y * new_scale,
            rotation: self.rotation,
        }
    }

    /// Apply a pan delta.
    pub fn pan_by(&self, dx: f64, dy: f64) -> Transform {
        Transform {
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
            ..*self
        }
    }

    /// Zoom in by a factor, clamped to the scale ceiling.
    pub fn zoom_in(&self, factor: f64) -> Transform {
        Transform {
            scale: (self.scale * factor).min(MAX_SCALE),
            ..*self
        }
    }

    /// Zoom out by a factor, clamped to the scale floor.
    pub fn zoom_out(&self, factor: f64) -> Transform {
        Transform {
            scale: (self.scale / factor).max(MIN_SCALE),
            ..*self
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
