//! Renderable label overlays.
//!
//! Each overlay wraps one label (or, for classifications, every
//! classification across the active fields) and implements a uniform
//! contract: draw itself, report whether the cursor hits it, report its
//! distance to the cursor, expose its bounding points, and estimate its
//! resident size. The variant set is closed; dispatch is an exhaustive
//! `match`, so adding a family extends every operation at compile time.

mod classification;
mod detection;
mod keypoint;
mod polyline;
mod segmentation;

pub use classification::ClassificationsOverlay;
pub use detection::DetectionOverlay;
pub use keypoint::KeypointOverlay;
pub use polyline::PolylineOverlay;
pub use segmentation::SegmentationOverlay;

use thiserror::Error;

use crate::color::Color;
use crate::constants::{CHIP_PADDING, CHIP_TEXT_SIZE, HEADER_HEIGHT, HEADER_WIDTH, STROKE_WIDTH};
use crate::draw::{DrawContext, Rect};
use crate::geometry::Point;
use crate::label::Label;
use crate::mask::MaskBuffer;
use crate::media::Bitmap;
use crate::render::{Options, RenderState};
use crate::sample::Sample;

/// Where a cursor position falls relative to an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    /// Not on the overlay.
    None,
    /// Inside the shape.
    Content,
    /// On the label header/title region anchored to the shape.
    Border,
}

/// Which label a hover or click resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectData {
    pub id: String,
    pub field: String,
}

/// Errors raised while drawing a single overlay. Callers catch these
/// per-overlay so one malformed label cannot blank the whole sample.
#[derive(Error, Debug)]
pub enum DrawError {
    #[error("label {id} has non-finite geometry")]
    NonFiniteGeometry { id: String },
}

/// The closed set of renderable overlay variants.
#[derive(Debug)]
pub enum Overlay {
    Detection(DetectionOverlay),
    Classifications(ClassificationsOverlay),
    Keypoint(KeypointOverlay),
    Polyline(PolylineOverlay),
    Segmentation(SegmentationOverlay),
}

impl Overlay {
    /// Render onto the frame's command list using the current viewport
    /// transform. Labels rejected by the active filters draw nothing.
    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        match self {
            Overlay::Detection(o) => o.draw(ctx, state),
            Overlay::Classifications(o) => o.draw(ctx, state),
            Overlay::Keypoint(o) => o.draw(ctx, state),
            Overlay::Polyline(o) => o.draw(ctx, state),
            Overlay::Segmentation(o) => o.draw(ctx, state),
        }
    }

    /// Where the current cursor falls relative to this overlay.
    pub fn contains(&self, state: &RenderState) -> PointLocation {
        match self {
            Overlay::Detection(o) => o.contains(state),
            Overlay::Classifications(o) => o.contains(state),
            Overlay::Keypoint(o) => o.contains(state),
            Overlay::Polyline(o) => o.contains(state),
            Overlay::Segmentation(o) => o.contains(state),
        }
    }

    /// Minimum canvas-pixel distance from the cursor to the nearest edge.
    /// Infinity when there is no cursor or nothing visible to measure.
    pub fn mouse_distance(&self, state: &RenderState) -> f64 {
        match self {
            Overlay::Detection(o) => o.mouse_distance(state),
            Overlay::Classifications(o) => o.mouse_distance(state),
            Overlay::Keypoint(o) => o.mouse_distance(state),
            Overlay::Polyline(o) => o.mouse_distance(state),
            Overlay::Segmentation(o) => o.mouse_distance(state),
        }
    }

    /// Corners of the bounding geometry in normalized space. Recomputed per
    /// call, never cached across overlay instances.
    pub fn points(&self) -> Vec<Point> {
        match self {
            Overlay::Detection(o) => o.points(),
            Overlay::Classifications(o) => o.points(),
            Overlay::Keypoint(o) => o.points(),
            Overlay::Polyline(o) => o.points(),
            Overlay::Segmentation(o) => o.points(),
        }
    }

    /// The label the current cursor position resolves to.
    pub fn select_data(&self, state: &RenderState) -> Option<SelectData> {
        match self {
            Overlay::Detection(o) => o.select_data(state),
            Overlay::Classifications(o) => o.select_data(state),
            Overlay::Keypoint(o) => o.select_data(state),
            Overlay::Polyline(o) => o.select_data(state),
            Overlay::Segmentation(o) => o.select_data(state),
        }
    }

    /// Approximate resident footprint, for cache accounting.
    pub fn size_bytes(&self) -> usize {
        match self {
            Overlay::Detection(o) => o.size_bytes(),
            Overlay::Classifications(o) => o.size_bytes(),
            Overlay::Keypoint(o) => o.size_bytes(),
            Overlay::Polyline(o) => o.size_bytes(),
            Overlay::Segmentation(o) => o.size_bytes(),
        }
    }
}

/// Build the overlay list for a sample under the given options.
///
/// Segmentations land at the bottom of the stack, geometric overlays follow
/// in field declaration order, and the batched classification chips draw on
/// top. Later entries are most-recently-drawn for selection tie-breaking.
pub fn build_overlays(sample: &Sample, options: &Options) -> Vec<Overlay> {
    let mut segmentations = Vec::new();
    let mut shapes = Vec::new();
    let mut chips = Vec::new();

    for (field_index, field) in options.active_fields.iter().enumerate() {
        for label in sample.labels_for(field) {
            match label {
                Label::Classification(c) => {
                    chips.push((field_index, field.clone(), c.clone()));
                }
                Label::Detection(d) => {
                    shapes.push(Overlay::Detection(DetectionOverlay::new(
                        field.clone(),
                        d.clone(),
                    )));
                }
                Label::Keypoint(k) => {
                    shapes.push(Overlay::Keypoint(KeypointOverlay::new(
                        field.clone(),
                        k.clone(),
                    )));
                }
                Label::Polyline(p) => {
                    shapes.push(Overlay::Polyline(PolylineOverlay::new(
                        field.clone(),
                        p.clone(),
                    )));
                }
                Label::Segmentation(s) => {
                    segmentations.push(Overlay::Segmentation(SegmentationOverlay::new(
                        field.clone(),
                        s.clone(),
                    )));
                }
            }
        }
    }

    let mut overlays = segmentations;
    overlays.append(&mut shapes);
    if !chips.is_empty() {
        overlays.push(Overlay::Classifications(ClassificationsOverlay::new(chips)));
    }
    overlays
}

/// The four corners of the full normalized frame.
pub(crate) fn full_frame_points() -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(0.0, 1.0),
    ]
}

/// The fixed-size header chip region anchored above a shape's top-left
/// corner, in canvas space.
pub(crate) fn header_rect(anchor: Point) -> Rect {
    Rect::new(anchor.x, anchor.y - HEADER_HEIGHT, HEADER_WIDTH, HEADER_HEIGHT)
}

/// Header/chip text under the active display toggles. Confidence is
/// formatted to two decimal places.
pub(crate) fn header_text(
    class: Option<&str>,
    confidence: Option<f64>,
    options: &Options,
) -> Option<String> {
    let label_part = if options.show_label { class } else { None };
    let conf_part = if options.show_confidence {
        confidence
    } else {
        None
    };

    match (label_part, conf_part) {
        (Some(l), Some(c)) => Some(format!("{} ({:.2})", l, c)),
        (Some(l), None) => Some(l.to_string()),
        (None, Some(c)) => Some(format!("({:.2})", c)),
        (None, None) => None,
    }
}

/// Draw one text chip: filled background, optional dashed selection border,
/// text inset by the chip padding.
pub(crate) fn draw_chip(
    ctx: &mut DrawContext,
    rect: Rect,
    fill: Color,
    text: &str,
    selected: bool,
) {
    ctx.fill_rect(rect, fill);
    if selected {
        ctx.stroke_rect(rect, Color::WHITE, STROKE_WIDTH / 2.0, true);
    }
    ctx.text(
        text,
        Point::new(rect.x + CHIP_PADDING, rect.y + rect.height - CHIP_PADDING / 2.0),
        Color::WHITE,
        CHIP_TEXT_SIZE,
    );
}

/// Tint a mask's foreground pixels with one color at the given alpha;
/// background pixels stay fully transparent.
pub(crate) fn tint_mask(mask: &MaskBuffer, color: Color, alpha: f32) -> Bitmap {
    let [height, width] = mask.shape();
    let rgba = color.with_alpha(alpha).to_rgba8();
    let mut data = vec![0u8; height * width * 4];

    for row in 0..height {
        for col in 0..width {
            if mask.is_foreground(row, col) {
                let i = (row * width + col) * 4;
                data[i..i + 4].copy_from_slice(&rgba);
            }
        }
    }

    Bitmap::from_rgba8(data, width as u32, height as u32)
}
