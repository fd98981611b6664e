//! Draw command recording.
//!
//! The engine does not own a GPU surface. Each redraw records a flat list of
//! [`DrawCommand`]s in canvas coordinates; the host's presentation layer
//! replays them against whatever backend it drives. This keeps overlay
//! rendering deterministic and testable without a window.

use std::sync::Arc;

use crate::color::Color;
use crate::geometry::Point;
use crate::media::Bitmap;

/// An axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// A draw command to be executed by the host's presentation layer.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        width: f64,
        dashed: bool,
    },
    /// An open or closed point chain.
    Path {
        points: Vec<Point>,
        closed: bool,
        color: Color,
        width: f64,
        dashed: bool,
    },
    /// A filled polygon.
    FillPath {
        points: Vec<Point>,
        color: Color,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Color,
        filled: bool,
    },
    Text {
        text: String,
        position: Point,
        color: Color,
        size: f64,
    },
    /// Base media pixels.
    Image {
        pixels: Arc<Bitmap>,
        rect: Rect,
    },
    /// Pre-tinted label mask pixels, composited over the media.
    Mask {
        pixels: Arc<Bitmap>,
        rect: Rect,
    },
}

/// Records draw commands for one frame.
#[derive(Debug, Default)]
pub struct DrawContext {
    commands: Vec<DrawCommand>,
}

impl DrawContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64, dashed: bool) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color,
            width,
            dashed,
        });
    }

    pub fn path(&mut self, points: Vec<Point>, closed: bool, color: Color, width: f64) {
        self.commands.push(DrawCommand::Path {
            points,
            closed,
            color,
            width,
            dashed: false,
        });
    }

    pub fn dashed_path(&mut self, points: Vec<Point>, closed: bool, color: Color, width: f64) {
        self.commands.push(DrawCommand::Path {
            points,
            closed,
            color,
            width,
            dashed: true,
        });
    }

    pub fn fill_path(&mut self, points: Vec<Point>, color: Color) {
        self.commands.push(DrawCommand::FillPath { points, color });
    }

    pub fn circle(&mut self, center: Point, radius: f64, color: Color, filled: bool) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
            filled,
        });
    }

    pub fn text(&mut self, text: impl Into<String>, position: Point, color: Color, size: f64) {
        self.commands.push(DrawCommand::Text {
            text: text.into(),
            position,
            color,
            size,
        });
    }

    pub fn image(&mut self, pixels: Arc<Bitmap>, rect: Rect) {
        self.commands.push(DrawCommand::Image { pixels, rect });
    }

    pub fn mask(&mut self, pixels: Arc<Bitmap>, rect: Rect) {
        self.commands.push(DrawCommand::Mask { pixels, rect });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consume the context, yielding the recorded frame.
    pub fn finish(self) -> Vec<DrawCommand> {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(rect.contains(&Point::new(15.0, 15.0)));
        assert!(rect.contains(&Point::new(10.0, 10.0)));
        assert!(!rect.contains(&Point::new(31.0, 15.0)));
    }

    #[test]
    fn test_context_records_in_order() {
        let mut ctx = DrawContext::new();
        ctx.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::BLACK);
        ctx.text("hi", Point::new(0.0, 0.0), Color::WHITE, 12.0);

        let commands = ctx.finish();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], DrawCommand::FillRect { .. }));
        assert!(matches!(commands[1], DrawCommand::Text { .. }));
    }
}
