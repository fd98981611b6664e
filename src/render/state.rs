//! Per-renderer viewport and display state.
//!
//! One [`RenderState`] is owned exclusively by one renderer. Overlays read it
//! during draw and hit-test calls and never write it; all mutation funnels
//! through the renderer's queued [`StateUpdate`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::color::ColorMap;
use crate::draw::Rect;
use crate::geometry::{BoundingBox, Point, Transform};
use crate::label::Label;

/// How overlay colors are keyed into the color map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorBy {
    /// One color per field name.
    #[default]
    Field,
    /// One color per class label value.
    Label,
}

/// Externally supplied visibility predicate for one field's labels.
pub type FilterFn = Arc<dyn Fn(&Label) -> bool + Send + Sync>;

/// Per-field label filter predicates. Fields without a predicate pass.
#[derive(Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<String, FilterFn>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the predicate for a field, replacing any existing one.
    pub fn set(&mut self, field: impl Into<String>, filter: FilterFn) {
        self.filters.insert(field.into(), filter);
    }

    /// Builder-style variant of [`FilterSet::set`].
    pub fn with(mut self, field: impl Into<String>, filter: FilterFn) -> Self {
        self.set(field, filter);
        self
    }

    /// Whether `label` passes the predicate registered for `field`.
    pub fn passes(&self, field: &str, label: &Label) -> bool {
        self.filters.get(field).map_or(true, |f| f(label))
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("fields", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Display options consumed by overlays.
///
/// Replaced wholesale by state updates, never merged field-by-field.
#[derive(Debug, Clone)]
pub struct Options {
    /// Label fields to render, in declaration order. Declaration order is
    /// also the primary stacking key for classification chips.
    pub active_fields: Vec<String>,
    pub color_by: ColorBy,
    pub color_map: ColorMap,
    pub filters: FilterSet,
    /// Inclusive confidence range. Labels without a confidence pass.
    pub confidence_range: (f64, f64),
    pub show_label: bool,
    pub show_confidence: bool,
    pub show_mask: bool,
    /// Ids of currently selected labels.
    pub selected_labels: BTreeSet<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            active_fields: Vec::new(),
            color_by: ColorBy::default(),
            color_map: ColorMap::golden_angle(),
            filters: FilterSet::default(),
            confidence_range: (f64::NEG_INFINITY, f64::INFINITY),
            show_label: true,
            show_confidence: true,
            show_mask: true,
            selected_labels: BTreeSet::new(),
        }
    }
}

impl Options {
    pub fn is_selected(&self, label_id: &str) -> bool {
        self.selected_labels.contains(label_id)
    }

    /// Whether a label is visible under the active filter predicate and
    /// confidence range.
    pub fn passes(&self, field: &str, label: &Label) -> bool {
        if !self.filters.passes(field, label) {
            return false;
        }
        match label.confidence() {
            Some(c) => c >= self.confidence_range.0 && c <= self.confidence_range.1,
            None => true,
        }
    }

    /// The color-map key for a label, per the active color-by mode.
    pub fn color_key<'a>(&self, field: &'a str, label: &'a Label) -> &'a str {
        match self.color_by {
            ColorBy::Field => field,
            ColorBy::Label => label.label().unwrap_or(field),
        }
    }
}

/// Mutable per-renderer state read by every draw and hit-test call.
#[derive(Debug, Clone)]
pub struct RenderState {
    /// Cursor position in canvas pixels, when over this renderer's canvas.
    pub cursor: Option<Point>,
    pub hovering: bool,
    pub panning: bool,
    pub transform: Transform,
    /// Canvas size in pixels. Zero until a surface is attached.
    pub canvas_size: (u32, u32),
    /// Media size in pixels.
    pub image_size: (u32, u32),
    pub options: Options,
}

impl RenderState {
    pub fn new(image_size: (u32, u32), options: Options) -> Self {
        Self {
            cursor: None,
            hovering: false,
            panning: false,
            transform: Transform::identity(),
            canvas_size: (0, 0),
            image_size,
            options,
        }
    }

    pub fn canvas(&self) -> (f64, f64) {
        (f64::from(self.canvas_size.0), f64::from(self.canvas_size.1))
    }

    pub fn image(&self) -> (f64, f64) {
        (f64::from(self.image_size.0), f64::from(self.image_size.1))
    }

    /// Map a normalized point into canvas space.
    pub fn to_canvas(&self, normalized: Point) -> Point {
        let image = self.image();
        let px = Point::new(normalized.x * image.0, normalized.y * image.1);
        self.transform.apply(px, self.canvas(), image)
    }

    /// Map a canvas point into normalized space.
    pub fn to_normalized(&self, canvas: Point) -> Point {
        let image = self.image();
        let px = self.transform.invert(canvas, self.canvas(), image);
        if image.0 == 0.0 || image.1 == 0.0 {
            return Point::new(0.0, 0.0);
        }
        Point::new(px.x / image.0, px.y / image.1)
    }

    /// The cursor mapped into normalized space, when present.
    pub fn cursor_normalized(&self) -> Option<Point> {
        self.cursor.map(|c| self.to_normalized(c))
    }

    /// Canvas-space bounding rectangle of the whole image region.
    pub fn image_rect(&self) -> Rect {
        let corners = [
            self.to_canvas(Point::new(0.0, 0.0)),
            self.to_canvas(Point::new(1.0, 0.0)),
            self.to_canvas(Point::new(1.0, 1.0)),
            self.to_canvas(Point::new(0.0, 1.0)),
        ];
        let bbox = BoundingBox::around(&corners).expect("four corners");
        Rect::new(bbox.x, bbox.y, bbox.width, bbox.height)
    }
}

/// A partial state delta, merged shallowly per top-level key.
///
/// `None` keys are untouched; the nested `options` bag is replaced wholesale
/// when present, never merged.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub cursor: Option<Option<Point>>,
    pub hovering: Option<bool>,
    pub panning: Option<bool>,
    pub transform: Option<Transform>,
    pub canvas_size: Option<(u32, u32)>,
    pub options: Option<Options>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(mut self, cursor: Option<Point>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn hovering(mut self, hovering: bool) -> Self {
        self.hovering = Some(hovering);
        self
    }

    pub fn panning(mut self, panning: bool) -> Self {
        self.panning = Some(panning);
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Merge this delta into `state`.
    pub fn apply(self, state: &mut RenderState) {
        if let Some(cursor) = self.cursor {
            state.cursor = cursor;
        }
        if let Some(hovering) = self.hovering {
            state.hovering = hovering;
        }
        if let Some(panning) = self.panning {
            state.panning = panning;
        }
        if let Some(transform) = self.transform {
            state.transform = transform;
        }
        if let Some(canvas_size) = self.canvas_size {
            state.canvas_size = canvas_size;
        }
        if let Some(options) = self.options {
            state.options = options;
        }
    }

    /// Whether this delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none()
            && self.hovering.is_none()
            && self.panning.is_none()
            && self.transform.is_none()
            && self.canvas_size.is_none()
            && self.options.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Classification, Label};

    fn classification(confidence: Option<f64>) -> Label {
        Label::Classification(Classification {
            id: "c1".into(),
            label: Some("cat".into()),
            confidence,
        })
    }

    #[test]
    fn test_filter_set_defaults_to_pass() {
        let filters = FilterSet::new();
        assert!(filters.passes("any", &classification(None)));
    }

    #[test]
    fn test_filter_set_predicate() {
        let filters = FilterSet::new().with(
            "ground_truth",
            Arc::new(|label: &Label| label.label() == Some("dog")),
        );
        assert!(!filters.passes("ground_truth", &classification(None)));
        assert!(filters.passes("other_field", &classification(None)));
    }

    #[test]
    fn test_confidence_range() {
        let options = Options {
            confidence_range: (0.5, 1.0),
            ..Options::default()
        };
        assert!(options.passes("f", &classification(Some(0.7))));
        assert!(!options.passes("f", &classification(Some(0.3))));
        // Labels without a confidence always pass the range
        assert!(options.passes("f", &classification(None)));
    }

    #[test]
    fn test_color_key_modes() {
        let label = classification(None);
        let mut options = Options::default();

        assert_eq!(options.color_key("field", &label), "field");
        options.color_by = ColorBy::Label;
        assert_eq!(options.color_key("field", &label), "cat");
    }

    #[test]
    fn test_to_canvas_identity() {
        let mut state = RenderState::new((1000, 500), Options::default());
        state.canvas_size = (1000, 500);

        let p = state.to_canvas(Point::new(0.1, 0.1));
        assert_eq!(p, Point::new(100.0, 50.0));

        let back = state.to_normalized(p);
        assert!((back.x - 0.1).abs() < 1e-9);
        assert!((back.y - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_update_merges_shallowly() {
        let mut state = RenderState::new((100, 100), Options::default());
        state.hovering = true;

        StateUpdate::new()
            .panning(true)
            .cursor(Some(Point::new(5.0, 5.0)))
            .apply(&mut state);

        // Untouched keys keep their values
        assert!(state.hovering);
        assert!(state.panning);
        assert_eq!(state.cursor, Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_options_replaced_wholesale() {
        let mut state = RenderState::new((100, 100), Options::default());
        state.options.active_fields = vec!["a".into(), "b".into()];

        let next = Options {
            active_fields: vec!["c".into()],
            ..Options::default()
        };
        StateUpdate::new().options(next).apply(&mut state);

        assert_eq!(state.options.active_fields, vec!["c".to_string()]);
    }

    #[test]
    fn test_is_empty() {
        assert!(StateUpdate::new().is_empty());
        assert!(!StateUpdate::new().hovering(true).is_empty());
    }
}
