//! Keypoint overlay: one marker per skeleton point.

use crate::color::Color;
use crate::constants::{KEYPOINT_DRAW_RADIUS, KEYPOINT_HIT_RADIUS};
use crate::draw::DrawContext;
use crate::geometry::{BoundingBox, Point};
use crate::label::{Keypoint, Label};
use crate::overlay::{DrawError, PointLocation, SelectData};
use crate::render::RenderState;

#[derive(Debug)]
pub struct KeypointOverlay {
    field: String,
    id: String,
    points: Vec<Point>,
    label: Label,
}

impl KeypointOverlay {
    pub fn new(field: String, keypoint: Keypoint) -> Self {
        let points = keypoint
            .points
            .iter()
            .map(|[x, y]| Point::new(*x, *y))
            .collect();

        Self {
            field,
            id: keypoint.id.clone(),
            points,
            label: Label::Keypoint(keypoint),
        }
    }

    fn visible(&self, state: &RenderState) -> bool {
        state.options.passes(&self.field, &self.label)
    }

    fn color(&self, state: &RenderState) -> Color {
        let key = state.options.color_key(&self.field, &self.label);
        state.options.color_map.color_for(key)
    }

    pub fn draw(&mut self, ctx: &mut DrawContext, state: &RenderState) -> Result<(), DrawError> {
        if !self.visible(state) {
            return Ok(());
        }
        if self.points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(DrawError::NonFiniteGeometry {
                id: self.id.clone(),
            });
        }

        let color = self.color(state);
        let selected = state.options.is_selected(&self.id);

        for point in &self.points {
            let center = state.to_canvas(*point);
            ctx.circle(center, KEYPOINT_DRAW_RADIUS, color, true);
            if selected {
                ctx.circle(center, KEYPOINT_DRAW_RADIUS + 2.0, Color::WHITE, false);
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

        let hit = self
            .points
            .iter()
            .any(|p| state.to_canvas(*p).distance_to(&cursor) <= KEYPOINT_HIT_RADIUS);
        if hit {
            PointLocation::Content
        } else {
            PointLocation::None
        }
    }

    pub fn mouse_distance(&self, state: &RenderState) -> f64 {
        let Some(cursor) = state.cursor else {
            return f64::INFINITY;
        };
        if !self.visible(state) {
            return f64::INFINITY;
        }

        self.points
            .iter()
            .map(|p| state.to_canvas(*p).distance_to(&cursor))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn points(&self) -> Vec<Point> {
        BoundingBox::around(&self.points)
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
        self.points.len() * std::mem::size_of::<Point>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Options;

    fn keypoint() -> Keypoint {
        Keypoint {
            id: "k1".into(),
            label: Some("nose".into()),
            confidence: None,
            points: vec![[0.5, 0.5], [0.25, 0.25]],
        }
    }

    fn state() -> RenderState {
        let mut state = RenderState::new((100, 100), Options::default());
        state.canvas_size = (100, 100);
        state
    }

    #[test]
    fn test_contains_within_hit_radius() {
        let overlay = KeypointOverlay::new("keypoints".into(), keypoint());
        let mut st = state();

        // 5px from the (50, 50) canvas point, inside the hit radius
        st.cursor = Some(Point::new(55.0, 50.0));
        assert_eq!(overlay.contains(&st), PointLocation::Content);

        st.cursor = Some(Point::new(70.0, 50.0));
        assert_eq!(overlay.contains(&st), PointLocation::None);
    }

    #[test]
    fn test_mouse_distance_nearest_point() {
        let overlay = KeypointOverlay::new("keypoints".into(), keypoint());
        let mut st = state();
        st.cursor = Some(Point::new(28.0, 25.0));

        assert!((overlay.mouse_distance(&st) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_draw_one_marker_per_point() {
        let mut overlay = KeypointOverlay::new("keypoints".into(), keypoint());
        let mut ctx = DrawContext::new();
        overlay.draw(&mut ctx, &state()).expect("draw");
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_bounding_points() {
        let overlay = KeypointOverlay::new("keypoints".into(), keypoint());
        let corners = overlay.points();
        let bounds = BoundingBox::around(&corners).unwrap();
        assert_eq!(bounds.x, 0.25);
        assert_eq!(bounds.y, 0.25);
        assert_eq!(bounds.width, 0.25);
        assert_eq!(bounds.height, 0.25);
    }
}
