//! Color types and the externally supplied color assignment map.
//!
//! The engine never invents colors for labels: every overlay asks the
//! session's [`ColorMap`] for the color of its key. A golden-angle fallback
//! map is provided for hosts that do not carry their own palette.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// RGBA color, channels in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// The same color with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Pack to RGBA8 bytes.
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0) as u8,
            (self.g.clamp(0.0, 1.0) * 255.0) as u8,
            (self.b.clamp(0.0, 1.0) * 255.0) as u8,
            (self.a.clamp(0.0, 1.0) * 255.0) as u8,
        ]
    }
}

/// Convert HSV to RGB (h in degrees, s and v in 0-1).
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

/// Color for the nth slot of the golden-angle palette.
pub fn golden_angle_color(index: usize) -> Color {
    let hue = (index as f32 * 137.5) % 360.0;
    let (r, g, b) = hsv_to_rgb(hue, 0.7, 0.9);
    Color::rgb(r, g, b)
}

static NEXT_COLOR_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Externally supplied color assignment: key string to color, deterministic
/// for a given key within one session.
///
/// The `id` identifies the assignment function itself. Overlays key their
/// pre-tinted mask caches on it, so swapping in a new map invalidates every
/// cached tint.
#[derive(Clone)]
pub struct ColorMap {
    id: u64,
    assign: Arc<dyn Fn(&str) -> Color + Send + Sync>,
}

impl ColorMap {
    pub fn new(assign: impl Fn(&str) -> Color + Send + Sync + 'static) -> Self {
        Self {
            id: NEXT_COLOR_MAP_ID.fetch_add(1, Ordering::Relaxed),
            assign: Arc::new(assign),
        }
    }

    /// Fallback map hashing each key onto the golden-angle palette.
    pub fn golden_angle() -> Self {
        Self::new(|key| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            golden_angle_color(hasher.finish() as usize)
        })
    }

    /// Identity of the underlying assignment function.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Color assigned to a key.
    pub fn color_for(&self, key: &str) -> Color {
        (self.assign)(key)
    }
}

impl fmt::Debug for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorMap").field("id", &self.id).finish()
    }
}

impl PartialEq for ColorMap {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::golden_angle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_alpha() {
        let c = Color::rgb(0.2, 0.4, 0.6).with_alpha(0.5);
        assert_eq!(c.a, 0.5);
        assert_eq!(c.r, 0.2);
    }

    #[test]
    fn test_to_rgba8() {
        assert_eq!(Color::WHITE.to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(Color::BLACK.to_rgba8(), [0, 0, 0, 255]);
    }

    #[test]
    fn test_golden_angle_colors_differ() {
        assert_ne!(golden_angle_color(1), golden_angle_color(2));
    }

    #[test]
    fn test_color_map_deterministic() {
        let map = ColorMap::golden_angle();
        assert_eq!(map.color_for("cat"), map.color_for("cat"));
        assert_ne!(map.color_for("cat"), map.color_for("dog"));
    }

    #[test]
    fn test_color_map_identity() {
        let a = ColorMap::golden_angle();
        let b = ColorMap::golden_angle();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
    }
}
