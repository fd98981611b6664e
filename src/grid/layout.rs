//! Aspect-ratio row packing.
//!
//! Rows accumulate items until their summed aspect ratios reach a per-row
//! budget; the row height is then `viewport_width / sum(aspect ratios)`, so
//! each item scaled to the shared height fills the available width exactly.
//! The budget shrinks as the zoom level rises (fewer, larger items per row)
//! and grows with the viewport width.

use crate::constants::{MAX_ZOOM, REFERENCE_WIDTH};
use crate::draw::Rect;

/// One laid-out grid item.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub id: String,
    /// Position in the flattened item sequence.
    pub index: usize,
    pub aspect_ratio: f64,
    /// Layout rectangle in grid coordinates.
    pub rect: Rect,
}

/// One packed row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub top: f64,
    pub height: f64,
    pub items: Vec<LayoutItem>,
}

impl Row {
    /// Whether the row intersects the vertical range `[top, bottom)`.
    pub fn intersects(&self, top: f64, bottom: f64) -> bool {
        self.top < bottom && self.top + self.height > top
    }
}

/// Per-row aspect-ratio budget for a viewport width and zoom level.
pub fn aspect_budget(viewport_width: f64, zoom: u32) -> f64 {
    let base = f64::from(MAX_ZOOM - zoom.min(MAX_ZOOM) + 1);
    (base * (viewport_width / REFERENCE_WIDTH)).max(1.0)
}

/// Pack `(id, aspect_ratio)` items into rows.
///
/// Full rows fill the viewport width exactly; a trailing short row keeps
/// the height a full row at the same budget would have, so its items do not
/// balloon.
pub fn pack_rows(items: &[(String, f64)], viewport_width: f64, zoom: u32) -> Vec<Row> {
    let budget = aspect_budget(viewport_width, zoom);
    let mut rows = Vec::new();
    let mut pending: Vec<(usize, String, f64)> = Vec::new();
    let mut pending_sum = 0.0;
    let mut top = 0.0;

    let mut close_row = |pending: &mut Vec<(usize, String, f64)>, sum: f64, top: &mut f64| {
        if pending.is_empty() {
            return;
        }
        let height = viewport_width / sum;
        let mut x = 0.0;
        let items = pending
            .drain(..)
            .map(|(index, id, aspect_ratio)| {
                let width = aspect_ratio * height;
                let rect = Rect::new(x, *top, width, height);
                x += width;
                LayoutItem {
                    id,
                    index,
                    aspect_ratio,
                    rect,
                }
            })
            .collect();
        rows.push(Row {
            top: *top,
            height,
            items,
        });
        *top += height;
    };

    for (index, (id, aspect_ratio)) in items.iter().enumerate() {
        // Degenerate ratios fall back to square
        let aspect_ratio = if aspect_ratio.is_finite() && *aspect_ratio > 0.0 {
            *aspect_ratio
        } else {
            1.0
        };

        pending.push((index, id.clone(), aspect_ratio));
        pending_sum += aspect_ratio;

        if pending_sum >= budget {
            close_row(&mut pending, pending_sum, &mut top);
            pending_sum = 0.0;
        }
    }

    // Trailing short row at full-row height
    close_row(&mut pending, budget.max(pending_sum), &mut top);

    rows
}

/// Total grid height of a packed layout.
pub fn total_height(rows: &[Row]) -> f64 {
    rows.last().map_or(0.0, |r| r.top + r.height)
}
