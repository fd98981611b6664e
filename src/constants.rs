//! Global rendering, layout, and cache tunables.

/// Hit radius around a keypoint, in canvas pixels.
pub const KEYPOINT_HIT_RADIUS: f64 = 8.0;

/// Radius used when drawing keypoint markers, in canvas pixels.
pub const KEYPOINT_DRAW_RADIUS: f64 = 4.0;

/// Width of the label header chip anchored to a shape, in canvas pixels.
pub const HEADER_WIDTH: f64 = 96.0;

/// Height of the label header chip, in canvas pixels.
pub const HEADER_HEIGHT: f64 = 18.0;

/// Height of one stacked classification chip, in canvas pixels.
pub const CHIP_HEIGHT: f64 = 20.0;

/// Vertical gap between stacked classification chips.
pub const CHIP_GAP: f64 = 4.0;

/// Padding between chip edge and chip text.
pub const CHIP_PADDING: f64 = 6.0;

/// Font size for chip and header text.
pub const CHIP_TEXT_SIZE: f64 = 12.0;

/// Stroke width for shape outlines.
pub const STROKE_WIDTH: f64 = 2.0;

/// Mask tint alpha for unselected labels.
pub const MASK_ALPHA: f32 = 0.45;

/// Mask tint alpha for selected labels.
pub const MASK_ALPHA_SELECTED: f32 = 0.7;

/// Minimum viewport scale factor.
pub const MIN_SCALE: f64 = 0.05;

/// Maximum viewport scale factor.
pub const MAX_SCALE: f64 = 40.0;

/// Margin factor applied when framing labeled content.
pub const FIT_MARGIN: f64 = 0.95;

/// Highest grid zoom level. Zoom 0 is the widest view (most items per row).
pub const MAX_ZOOM: u32 = 10;

/// Viewport width at which the row aspect budget equals its base value.
pub const REFERENCE_WIDTH: f64 = 1200.0;

/// Ticks of quiet time before a resize triggers a full reflow.
pub const RESIZE_DEBOUNCE_TICKS: u64 = 12;

/// Default byte ceiling for resident renderers and their decoded buffers.
pub const DEFAULT_CACHE_BUDGET: usize = 256 * 1024 * 1024;

/// Default number of fetched pages kept resident.
pub const DEFAULT_RESIDENT_PAGES: usize = 8;
