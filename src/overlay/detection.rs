//! Detection overlay: stroked bounding box, optional header chip, optional
//! tinted instance mask.

use std::sync::Arc;

use crate::color::Color;
use crate::constants::{MASK_ALPHA, MASK_ALPHA_SELECTED, STROKE_WIDTH};
use crate::draw::{DrawContext, Rect};
use crate::geometry::{BoundingBox, Point};
use crate::label::{Detection, Label};
use crate::mask::{self, MaskBuffer};
use crate::media::Bitmap;
use crate::overlay::{draw_chip, header_rect, header_text, tint_mask, DrawError, PointLocation, SelectData};
use crate::render::RenderState;

/// Pre-tinted mask pixels, keyed by the inputs that produced them.
#[derive(Debug)]
struct TintCache {
    color: Color,
    selected: bool,
    pixels: Arc<Bitmap>,
}

#[derive(Debug)]
pub struct DetectionOverlay {
    field: String,
    id: String,
    class: Option<String>,
    confidence: Option<f64>,
    bbox: BoundingBox,
    mask: Option<MaskBuffer>,
    tint: Option<TintCache>,
    /// Kept for the external filter predicate; the raw mask payload is
    /// stripped after decoding.
    label: Label,
}

impl DetectionOverlay {
    pub fn new(field: String, mut detection: Detection) -> Self {
        let mask = detection.mask.take().and_then(|bytes| {
            match mask::decode(&bytes) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    // Geometry still renders without the mask
                    log::warn!("Skipping undecodable mask for label {}: {}", detection.id, e);
                    None
                }
            }
        });

        Self {
            field,
            id: detection.id.clone(),
            class: detection.label.clone(),
            confidence: detection.confidence,
            bbox: detection.bbox(),
            mask,
            tint: None,
            label: Label::Detection(detection),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn visible(&self, state: &RenderState) -> bool {
        state.options.passes(&self.field, &self.label)
    }

    fn color(&self, state: &RenderState) -> Color {
        let key = state.options.color_key(&self.field, &self.label);
        state.options.color_map.color_for(key)
    }

    /// Canvas-space corners of the box, clockwise from top-left.
    fn canvas_corners(&self, state: &RenderState) -> [Point; 4] {
        self.bbox.corners().map(|c| state.to_canvas(c))
    }

    /// Cached tinted mask pixels; recomputed when color or selection change.
    fn tinted(&mut self, color: Color, selected: bool) -> Option<Arc<Bitmap>> {
        let mask = self.mask.as_ref()?;

        if let Some(cache) = &self.tint {
            if cache.color == color && cache.selected == selected {
                return Some(Arc::clone(&cache.pixels));
            }
        }

        let alpha = if selected { MASK_ALPHA_SELECTED } else { MASK_ALPHA };
        let pixels = Arc::new(tint_mask(mask, color, alpha));
        self.tint = Some(TintCache {
            color,
            selected,
            pixels: Arc::clone(&pixels),
        });
        Some(pixels)
    }

    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        if !self.visible(state) {
            return Ok(());
        }

        let finite = [self.bbox.x, self.bbox.y, self.bbox.width, self.bbox.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(DrawError::NonFiniteGeometry {
                id: self.id.clone(),
            });
        }

        let selected = state.options.is_selected(&self.id);
        let color = self.color(state);
        let corners = self.canvas_corners(state);

        if state.options.show_mask {
            if let Some(pixels) = self.tinted(color, selected) {
                let bounds = BoundingBox::around(&corners).expect("four corners");
                ctx.mask(pixels, Rect::new(bounds.x, bounds.y, bounds.width, bounds.height));
            }
        }

        let outline = corners.to_vec();
        if selected {
            ctx.dashed_path(outline, true, color, STROKE_WIDTH);
        } else {
            ctx.path(outline, true, color, STROKE_WIDTH);
        }

        if let Some(text) = header_text(self.class.as_deref(), self.confidence, &state.options) {
            let rect = header_rect(corners[0]);
            draw_chip(ctx, rect, color.with_alpha(0.9), &text, false);
        }

        Ok(())
    }

    pub fn contains(&self, state: &RenderState) -> PointLocation {
        let Some(cursor) = state.cursor else {
            return PointLocation::None;
        };
        if !self.visible(state) {
            return PointLocation::None;
        }

        let anchor = state.to_canvas(Point::new(self.bbox.x, self.bbox.y));
        if header_rect(anchor).contains(&cursor) {
            return PointLocation::Border;
        }

        if self.bbox.contains(&state.to_normalized(cursor)) {
            return PointLocation::Content;
        }

        PointLocation::None
    }

    pub fn mouse_distance(&self, state: &RenderState) -> f64 {
        let Some(cursor) = state.cursor else {
            return f64::INFINITY;
        };
        if !self.visible(state) {
            return f64::INFINITY;
        }

        let corners = self.canvas_corners(state);
        let mut best = f64::INFINITY;
        for i in 0..4 {
            best = best.min(cursor.distance_to_segment(&corners[i], &corners[(i + 1) % 4]));
        }
        best
    }

    pub fn points(&self) -> Vec<Point> {
        self.bbox.corners().to_vec()
    }

    pub fn select_data(&self, state: &RenderState) -> Option<SelectData> {
        if self.contains(state) == PointLocation::None {
            return None;
        }
        Some(SelectData {
            id: self.id.clone(),
            field: self.field.clone(),
        })
    }

    pub fn size_bytes(&self) -> usize {
        let mask = self.mask.as_ref().map_or(0, MaskBuffer::size_bytes);
        let tint = self.tint.as_ref().map_or(0, |t| t.pixels.size_bytes());
        mask + tint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::DrawCommand;
    use crate::mask::MaskData;
    use crate::render::Options;
    use ndarray::array;
    use std::sync::Arc as StdArc;

    fn detection(bbox: [f64; 4]) -> Detection {
        Detection {
            id: "d1".into(),
            label: Some("cat".into()),
            confidence: Some(0.87),
            bounding_box: bbox,
            mask: None,
        }
    }

    fn state_1000x500() -> RenderState {
        let mut state = RenderState::new((1000, 500), Options::default());
        state.canvas_size = (1000, 500);
        state
    }

    fn stroke_points(commands: &[DrawCommand]) -> Vec<Point> {
        commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Path { points, .. } => Some(points.clone()),
                _ => None,
            })
            .expect("a stroked path")
    }

    #[test]
    fn test_draw_pixel_space_rectangle() {
        // [0.1, 0.1, 0.2, 0.3] on a 1000x500 image lands at [100, 50, 200, 150]
        let mut overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let state = state_1000x500();

        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &state).expect("draw");

        let points = stroke_points(ctx.commands());
        let bounds = BoundingBox::around(&points).unwrap();
        assert!((bounds.x - 100.0).abs() < 1e-9);
        assert!((bounds.y - 50.0).abs() < 1e-9);
        assert!((bounds.width - 200.0).abs() < 1e-9);
        assert!((bounds.height - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains_centroid_and_outside() {
        let overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();

        // Centroid of the box in canvas space
        state.cursor = Some(Point::new(200.0, 125.0));
        assert_eq!(overlay.contains(&state), PointLocation::Content);

        // Just outside the left edge
        state.cursor = Some(Point::new(99.0, 125.0));
        assert_eq!(overlay.contains(&state), PointLocation::None);

        // Well outside
        state.cursor = Some(Point::new(600.0, 400.0));
        assert_eq!(overlay.contains(&state), PointLocation::None);
    }

    #[test]
    fn test_contains_header_border() {
        let overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();

        // Just above the top-left corner, inside the header chip
        state.cursor = Some(Point::new(110.0, 42.0));
        assert_eq!(overlay.contains(&state), PointLocation::Border);
    }

    #[test]
    fn test_filtered_label_is_invisible() {
        let overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();
        state.options.filters = crate::render::FilterSet::new().with(
            "objects",
            StdArc::new(|label: &Label| label.label() == Some("dog")),
        );
        state.cursor = Some(Point::new(200.0, 125.0));

        assert_eq!(overlay.contains(&state), PointLocation::None);
        assert_eq!(overlay.mouse_distance(&state), f64::INFINITY);
    }

    #[test]
    fn test_filtered_label_draws_nothing() {
        let mut overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();
        state.options.confidence_range = (0.9, 1.0);

        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &state).expect("draw");
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_selected_draws_dashed() {
        let mut overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();
        state.options.selected_labels.insert("d1".into());

        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &state).expect("draw");

        let dashed = ctx.commands().iter().any(|c| {
            matches!(c, DrawCommand::Path { dashed: true, .. })
        });
        assert!(dashed);
    }

    #[test]
    fn test_non_finite_geometry_errors() {
        let mut overlay =
            DetectionOverlay::new("objects".into(), detection([f64::NAN, 0.1, 0.2, 0.3]));
        let state = state_1000x500();

        let mut ctx = DrawContext::new();
        assert!(matches!(
            overlay.draw(&mut ctx, &state),
            Err(DrawError::NonFiniteGeometry { .. })
        ));
    }

    #[test]
    fn test_mouse_distance_at_edge() {
        let overlay = DetectionOverlay::new("objects".into(), detection([0.1, 0.1, 0.2, 0.3]));
        let mut state = state_1000x500();

        // On the left edge of the pixel-space box
        state.cursor = Some(Point::new(100.0, 100.0));
        assert!(overlay.mouse_distance(&state) < 1e-9);

        // 50px left of the box
        state.cursor = Some(Point::new(50.0, 100.0));
        assert!((overlay.mouse_distance(&state) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_tint_cache_invalidation() {
        let mask_bytes = mask::encode(&MaskBuffer::new(MaskData::U8(array![[1u8, 0], [0, 1]])));
        let mut det = detection([0.1, 0.1, 0.2, 0.3]);
        det.mask = Some(mask_bytes);

        let mut overlay = DetectionOverlay::new("objects".into(), det);

        let red = Color::rgb(1.0, 0.0, 0.0);
        let first = overlay.tinted(red, false).expect("tinted");
        let second = overlay.tinted(red, false).expect("tinted");
        // Same key reuses the cached pixels
        assert!(StdArc::ptr_eq(&first, &second));

        // Selection change re-tints
        let selected = overlay.tinted(red, true).expect("tinted");
        assert!(!StdArc::ptr_eq(&first, &selected));

        // Color change re-tints
        let blue = overlay.tinted(Color::rgb(0.0, 0.0, 1.0), true).expect("tinted");
        assert!(!StdArc::ptr_eq(&selected, &blue));
    }

    #[test]
    fn test_undecodable_mask_recovers() {
        let mut det = detection([0.1, 0.1, 0.2, 0.3]);
        det.mask = Some(vec![1, 2, 3]);

        let mut overlay = DetectionOverlay::new("objects".into(), det);
        assert_eq!(overlay.size_bytes(), 0);

        // Geometry still draws
        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &state_1000x500()).expect("draw");
        assert!(!ctx.is_empty());
    }
}
