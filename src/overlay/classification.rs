//! Batched classification overlay: one stacked chip list covering every
//! classification label across the active fields.

use std::cmp::Ordering;

use crate::constants::{CHIP_GAP, CHIP_HEIGHT, CHIP_PADDING, CHIP_TEXT_SIZE};
use crate::draw::{DrawContext, Rect};
use crate::geometry::{BoundingBox, Point};
use crate::label::{Classification, Label};
use crate::overlay::{draw_chip, full_frame_points, header_text, DrawError, PointLocation, SelectData};
use crate::render::RenderState;

#[derive(Debug)]
struct ChipEntry {
    field_index: usize,
    field: String,
    id: String,
    class: Option<String>,
    confidence: Option<f64>,
    label: Label,
}

/// One laid-out chip of the stacked list.
struct Chip {
    entry_index: usize,
    rect: Rect,
    text: String,
}

#[derive(Debug)]
pub struct ClassificationsOverlay {
    entries: Vec<ChipEntry>,
}

impl ClassificationsOverlay {
    /// Build from `(field declaration index, field name, label)` triples.
    ///
    /// Stacking order is declaration order of the active fields, then
    /// alphabetical by label value. Entries with equal or missing label
    /// values keep their relative order (stable sort).
    pub fn new(raw: Vec<(usize, String, Classification)>) -> Self {
        let mut entries: Vec<ChipEntry> = raw
            .into_iter()
            .map(|(field_index, field, c)| ChipEntry {
                field_index,
                field,
                id: c.id.clone(),
                class: c.label.clone(),
                confidence: c.confidence,
                label: Label::Classification(c),
            })
            .collect();

        entries.sort_by(|a, b| {
            a.field_index.cmp(&b.field_index).then_with(|| {
                match (a.class.as_deref(), b.class.as_deref()) {
                    (Some(x), Some(y)) => x.cmp(y),
                    _ => Ordering::Equal,
                }
            })
        });

        Self { entries }
    }

    /// Chips that survive filtering and the display toggles, laid out top
    /// to bottom in canvas space.
    fn visible_chips(&self, state: &RenderState) -> Vec<Chip> {
        let mut chips = Vec::new();
        let mut y = CHIP_GAP;

        for (entry_index, entry) in self.entries.iter().enumerate() {
            if !state.options.passes(&entry.field, &entry.label) {
                continue;
            }
            let Some(text) = header_text(entry.class.as_deref(), entry.confidence, &state.options)
            else {
                continue;
            };

            let width = text.len() as f64 * CHIP_TEXT_SIZE * 0.6 + 2.0 * CHIP_PADDING;
            chips.push(Chip {
                entry_index,
                rect: Rect::new(CHIP_GAP, y, width, CHIP_HEIGHT),
                text,
            });
            y += CHIP_HEIGHT + CHIP_GAP;
        }

        chips
    }

    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        for chip in self.visible_chips(state) {
            let entry = &self.entries[chip.entry_index];
            let key = state.options.color_key(&entry.field, &entry.label);
            let color = state.options.color_map.color_for(key);
            let selected = state.options.is_selected(&entry.id);

            draw_chip(ctx, chip.rect, color.with_alpha(0.85), &chip.text, selected);
        }
        Ok(())
    }

    pub fn contains(&self, state: &RenderState) -> PointLocation {
        let Some(cursor) = state.cursor else {
            return PointLocation::None;
        };

        for chip in self.visible_chips(state) {
            if chip.rect.contains(&cursor) {
                return PointLocation::Border;
            }
        }
        PointLocation::None
    }

    pub fn mouse_distance(&self, state: &RenderState) -> f64 {
        let Some(cursor) = state.cursor else {
            return f64::INFINITY;
        };

        let mut best = f64::INFINITY;
        for chip in self.visible_chips(state) {
            if chip.rect.contains(&cursor) {
                return 0.0;
            }
            let bbox = BoundingBox::new(chip.rect.x, chip.rect.y, chip.rect.width, chip.rect.height);
            best = best.min(bbox.edge_distance(&cursor));
        }
        best
    }

    pub fn points(&self) -> Vec<Point> {
        full_frame_points()
    }

    pub fn select_data(&self, state: &RenderState) -> Option<SelectData> {
        let cursor = state.cursor?;

        for chip in self.visible_chips(state) {
            if chip.rect.contains(&cursor) {
                let entry = &self.entries[chip.entry_index];
                return Some(SelectData {
                    id: entry.id.clone(),
                    field: entry.field.clone(),
                });
            }
        }
        None
    }

    pub fn size_bytes(&self) -> usize {
        self.entries.len() * std::mem::size_of::<ChipEntry>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Options;

    fn classification(id: &str, label: Option<&str>) -> Classification {
        Classification {
            id: id.into(),
            label: label.map(Into::into),
            confidence: None,
        }
    }

    fn state() -> RenderState {
        let mut state = RenderState::new((100, 100), Options::default());
        state.canvas_size = (100, 100);
        state
    }

    fn chip_order(overlay: &ClassificationsOverlay, state: &RenderState) -> Vec<String> {
        overlay
            .visible_chips(state)
            .iter()
            .map(|c| overlay.entries[c.entry_index].id.clone())
            .collect()
    }

    #[test]
    fn test_stacking_order_field_then_alphabetical() {
        let overlay = ClassificationsOverlay::new(vec![
            (1, "b_field".into(), classification("b2", Some("zebra"))),
            (1, "b_field".into(), classification("b1", Some("apple"))),
            (0, "a_field".into(), classification("a1", Some("sunny"))),
        ]);

        // a_field declared first, then b_field sorted by label value
        assert_eq!(chip_order(&overlay, &state()), vec!["a1", "b1", "b2"]);
    }

    #[test]
    fn test_missing_labels_keep_order() {
        let overlay = ClassificationsOverlay::new(vec![
            (0, "f".into(), classification("x", None)),
            (0, "f".into(), classification("y", Some("apple"))),
            (0, "f".into(), classification("z", None)),
        ]);

        // No total order is invented for missing labels; input order holds
        assert_eq!(chip_order(&overlay, &state()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_chips_stack_downward() {
        let overlay = ClassificationsOverlay::new(vec![
            (0, "f".into(), classification("a", Some("one"))),
            (0, "f".into(), classification("b", Some("two"))),
        ]);

        let chips = overlay.visible_chips(&state());
        assert_eq!(chips.len(), 2);
        assert!(chips[1].rect.y > chips[0].rect.y);
    }

    #[test]
    fn test_contains_and_select() {
        let overlay = ClassificationsOverlay::new(vec![
            (0, "f".into(), classification("a", Some("one"))),
            (0, "f".into(), classification("b", Some("two"))),
        ]);

        let mut st = state();
        let chips = overlay.visible_chips(&st);
        let second = chips[1].rect;
        st.cursor = Some(Point::new(second.x + 2.0, second.y + 2.0));

        assert_eq!(overlay.contains(&st), PointLocation::Border);
        assert_eq!(overlay.mouse_distance(&st), 0.0);
        let select = overlay.select_data(&st).expect("select data");
        assert_eq!(select.id, "b");
        assert_eq!(select.field, "f");
    }

    #[test]
    fn test_no_chips_when_toggles_off() {
        let overlay =
            ClassificationsOverlay::new(vec![(0, "f".into(), classification("a", Some("one")))]);

        let mut st = state();
        st.options.show_label = false;
        st.options.show_confidence = false;

        assert!(overlay.visible_chips(&st).is_empty());
        assert_eq!(overlay.contains(&st), PointLocation::None);
    }
}
