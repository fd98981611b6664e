//! Polyline overlay: open or closed point chains, optionally filled.

use crate::color::Color;
use crate::constants::{MASK_ALPHA, STROKE_WIDTH};
use crate::draw::DrawContext;
use crate::geometry::{BoundingBox, Point};
use crate::label::{Label, Polyline};
use crate::overlay::{draw_chip, header_rect, header_text, DrawError, PointLocation, SelectData};
use crate::render::RenderState;

/// Ray-casting point-in-polygon test.
fn polygon_contains(vertices: &[Point], point: &Point) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let vi = &vertices[i];
        let vj = &vertices[j];
        if ((vi.y > point.y) != (vj.y > point.y))
            && (point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug)]
pub struct PolylineOverlay {
    field: String,
    id: String,
    class: Option<String>,
    confidence: Option<f64>,
    chains: Vec<Vec<Point>>,
    closed: bool,
    filled: bool,
    label: Label,
}

impl PolylineOverlay {
    pub fn new(field: String, polyline: Polyline) -> Self {
        let chains = polyline
            .points
            .iter()
            .map(|chain| chain.iter().map(|[x, y]| Point::new(*x, *y)).collect())
            .collect();

        Self {
            field,
            id: polyline.id.clone(),
            class: polyline.label.clone(),
            confidence: polyline.confidence,
            chains,
            closed: polyline.closed,
            filled: polyline.filled,
            label: Label::Polyline(polyline),
        }
    }

    fn visible(&self, state: &RenderState) -> bool {
        state.options.passes(&self.field, &self.label)
    }

    fn color(&self, state: &RenderState) -> Color {
        let key = state.options.color_key(&self.field, &self.label);
        state.options.color_map.color_for(key)
    }

    fn all_points(&self) -> Vec<Point> {
        self.chains.iter().flatten().copied().collect()
    }

    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        if !self.visible(state) {
            return Ok(());
        }
        let non_finite = self
            .chains
            .iter()
            .flatten()
            .any(|p| !p.x.is_finite() || !p.y.is_finite());
        if non_finite {
            return Err(DrawError::NonFiniteGeometry {
                id: self.id.clone(),
            });
        }

        let color = self.color(state);
        let selected = state.options.is_selected(&self.id);

        for chain in &self.chains {
            if chain.is_empty() {
                continue;
            }
            let canvas: Vec<Point> = chain.iter().map(|p| state.to_canvas(*p)).collect();

            if self.closed && self.filled {
                ctx.fill_path(canvas.clone(), color.with_alpha(MASK_ALPHA));
            }
            if selected {
                ctx.dashed_path(canvas, self.closed, color, STROKE_WIDTH);
            } else {
                ctx.path(canvas, self.closed, color, STROKE_WIDTH);
            }
        }

        if let Some(text) = header_text(self.class.as_deref(), self.confidence, &state.options) {
            if let Some(bounds) = BoundingBox::around(&self.all_points()) {
                let anchor = state.to_canvas(Point::new(bounds.x, bounds.y));
                draw_chip(ctx, header_rect(anchor), color.with_alpha(0.9), &text, false);
            }
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

        if let Some(bounds) = BoundingBox::around(&self.all_points()) {
            let anchor = state.to_canvas(Point::new(bounds.x, bounds.y));
            if header_rect(anchor).contains(&cursor) {
                return PointLocation::Border;
            }
        }

        if self.closed {
            let normalized = state.to_normalized(cursor);
            for chain in &self.chains {
                if polygon_contains(chain, &normalized) {
                    return PointLocation::Content;
                }
            }
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

        let mut best = f64::INFINITY;
        for chain in &self.chains {
            if chain.len() < 2 {
                if let Some(p) = chain.first() {
                    best = best.min(state.to_canvas(*p).distance_to(&cursor));
                }
                continue;
            }

            let canvas: Vec<Point> = chain.iter().map(|p| state.to_canvas(*p)).collect();
            for pair in canvas.windows(2) {
                best = best.min(cursor.distance_to_segment(&pair[0], &pair[1]));
            }
            if self.closed {
                let last = canvas[canvas.len() - 1];
                best = best.min(cursor.distance_to_segment(&last, &canvas[0]));
            }
        }
        best
    }

    pub fn points(&self) -> Vec<Point> {
        BoundingBox::around(&self.all_points())
            .map(|b| b.corners().to_vec())
            .unwrap_or_default()
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
        self.all_points().len() * std::mem::size_of::<Point>()
    }
}
