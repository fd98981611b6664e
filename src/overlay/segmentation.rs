//! Segmentation overlay: a full-frame per-pixel label buffer rendered as a
//! tinted image, one color per class value.

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::{MASK_ALPHA, MASK_ALPHA_SELECTED};
use crate::draw::DrawContext;
use crate::geometry::Point;
use crate::label::{Label, Segmentation};
use crate::mask::{self, MaskBuffer};
use crate::media::Bitmap;
use crate::overlay::{full_frame_points, DrawError, PointLocation, SelectData};
use crate::render::RenderState;

/// Pre-tinted pixels keyed by the color map identity and selection flag
/// that produced them.
#[derive(Debug)]
struct TintCache {
    color_map_id: u64,
    selected: bool,
    pixels: Arc<Bitmap>,
}

#[derive(Debug)]
pub struct SegmentationOverlay {
    field: String,
    id: String,
    mask: Option<MaskBuffer>,
    tint: Option<TintCache>,
    label: Label,
}

impl SegmentationOverlay {
    pub fn new(field: String, mut segmentation: Segmentation) -> Self {
        let mask = segmentation.mask.take().and_then(|bytes| {
            match mask::decode(&bytes) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    log::warn!(
                        "Skipping undecodable mask for label {}: {}",
                        segmentation.id,
                        e
                    );
                    None
                }
            }
        });

        Self {
            field,
            id: segmentation.id.clone(),
            mask,
            tint: None,
            label: Label::Segmentation(segmentation),
        }
    }

    fn visible(&self, state: &RenderState) -> bool {
        state.options.passes(&self.field, &self.label)
    }

    /// Cursor position as mask `(row, col)`, when over the frame.
    fn cursor_cell(&self, state: &RenderState) -> Option<(usize, usize)> {
        let mask = self.mask.as_ref()?;
        let normalized = state.cursor_normalized()?;
        if !(0.0..1.0).contains(&normalized.x) || !(0.0..1.0).contains(&normalized.y) {
            return None;
        }
        let col = (normalized.x * mask.width() as f64) as usize;
        let row = (normalized.y * mask.height() as f64) as usize;
        Some((row, col))
    }

    /// Cached per-value tinted pixels; recomputed when the color map or the
    /// selection flag change.
    fn tinted(&mut self, state: &RenderState, selected: bool) -> Option<Arc<Bitmap>> {
        let mask = self.mask.as_ref()?;
        let color_map = &state.options.color_map;

        if let Some(cache) = &self.tint {
            if cache.color_map_id == color_map.id() && cache.selected == selected {
                return Some(Arc::clone(&cache.pixels));
            }
        }

        let alpha = if selected { MASK_ALPHA_SELECTED } else { MASK_ALPHA };
        let [height, width] = mask.shape();
        let mut data = vec![0u8; height * width * 4];
        let mut value_colors: HashMap<i64, [u8; 4]> = HashMap::new();

        for row in 0..height {
            for col in 0..width {
                let value = mask.value_at(row, col);
                if value == 0.0 {
                    continue;
                }
                let rgba = *value_colors.entry(value as i64).or_insert_with(|| {
                    color_map
                        .color_for(&format!("{}", value as i64))
                        .with_alpha(alpha)
                        .to_rgba8()
                });
                let i = (row * width + col) * 4;
                data[i..i + 4].copy_from_slice(&rgba);
            }
        }

        let pixels = Arc::new(Bitmap::from_rgba8(data, width as u32, height as u32));
        self.tint = Some(TintCache {
            color_map_id: color_map.id(),
            selected,
            pixels: Arc::clone(&pixels),
        });
        Some(pixels)
    }

    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        if !self.visible(state) || !state.options.show_mask {
            return Ok(());
        }

        let selected = state.options.is_selected(&self.id);
        if let Some(pixels) = self.tinted(state, selected) {
            ctx.mask(pixels, state.image_rect());
        }
        Ok(())
    }

    pub fn contains(&self, state: &RenderState) -> PointLocation {
        if !self.visible(state) {
            return PointLocation::None;
        }

        match (self.mask.as_ref(), self.cursor_cell(state)) {
            (Some(mask), Some((row, col))) if mask.is_foreground(row, col) => {
                PointLocation::Content
            }
            _ => PointLocation::None,
        }
    }

    pub fn mouse_distance(&self, state: &RenderState) -> f64 {
        // A per-pixel buffer has no meaningful edge distance; it competes
        // for selection only when the cursor is on a foreground pixel.
        if self.contains(state) == PointLocation::Content {
            0.0
        } else {
            f64::INFINITY
        }
    }

    pub fn points(&self) -> Vec<Point> {
        full_frame_points()
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
    use crate::color::{Color, ColorMap};
    use crate::draw::DrawCommand;
    use crate::mask::MaskData;
    use crate::render::Options;
    use ndarray::array;

    fn segmentation() -> Segmentation {
        let mask = MaskBuffer::new(MaskData::U8(array![[0u8, 1], [2, 0]]));
        Segmentation {
            id: "s1".into(),
            mask: Some(mask::encode(&mask)),
        }
    }

    fn state() -> RenderState {
        let mut state = RenderState::new((2, 2), Options::default());
        state.canvas_size = (2, 2);
        state
    }

    #[test]
    fn test_contains_foreground_pixel_only() {
        let overlay = SegmentationOverlay::new("segments".into(), segmentation());
        let mut st = state();

        // Over the (0, 1) cell, value 1
        st.cursor = Some(Point::new(1.5, 0.5));
        assert_eq!(overlay.contains(&st), PointLocation::Content);
        assert_eq!(overlay.mouse_distance(&st), 0.0);

        // Over the (0, 0) cell, value 0
        st.cursor = Some(Point::new(0.5, 0.5));
        assert_eq!(overlay.contains(&st), PointLocation::None);
        assert_eq!(overlay.mouse_distance(&st), f64::INFINITY);
    }

    #[test]
    fn test_distinct_values_get_distinct_colors() {
        let mut overlay = SegmentationOverlay::new("segments".into(), segmentation());
        let mut st = state();
        st.options.color_map = ColorMap::new(|key| {
            if key == "1" {
                Color::rgb(1.0, 0.0, 0.0)
            } else {
                Color::rgb(0.0, 0.0, 1.0)
            }
        });

        let pixels = overlay.tinted(&st, false).expect("tinted");
        let data = pixels.data();

        let value_one = &data[4..8];
        let value_two = &data[8..12];
        assert_ne!(value_one, value_two);
        // Background stays transparent
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_tint_cache_keyed_on_color_map() {
        let mut overlay = SegmentationOverlay::new("segments".into(), segmentation());
        let mut st = state();

        let first = overlay.tinted(&st, false).expect("tinted");
        let second = overlay.tinted(&st, false).expect("tinted");
        assert!(Arc::ptr_eq(&first, &second));

        // A different color map invalidates the cache
        st.options.color_map = ColorMap::new(|_| Color::rgb(1.0, 0.0, 0.0));
        let third = overlay.tinted(&st, false).expect("tinted");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_show_mask_toggle() {
        let mut overlay = SegmentationOverlay::new("segments".into(), segmentation());
        let mut st = state();
        st.options.show_mask = false;

        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &st).expect("draw");
        assert!(ctx.is_empty());

        st.options.show_mask = true;
        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &st).expect("draw");
        assert!(matches!(ctx.commands()[0], DrawCommand::Mask { .. }));
    }
}
