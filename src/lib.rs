//! Gallerist - dataset sample rendering engine
//!
//! A windowed-grid visualizer for large collections of labeled media samples.
//! The engine decodes per-label masks, builds renderable overlays (detections,
//! classifications, keypoints, polylines, segmentations), maintains per-sample
//! viewport state, and virtualizes rendering so only samples intersecting the
//! scroll viewport hold live resources.
//!
//! The engine does not own a window or GPU surface. Each draw produces a list
//! of [`draw::DrawCommand`]s for the host's presentation layer to execute, and
//! page data arrives through the [`grid::DataSource`] collaborator.

pub mod color;
pub mod constants;
pub mod draw;
pub mod geometry;
pub mod grid;
pub mod label;
pub mod mask;
pub mod media;
pub mod overlay;
pub mod render;
pub mod sample;

pub use color::{Color, ColorMap};
pub use draw::{DrawCommand, DrawContext, Rect};
pub use geometry::{BoundingBox, Point, Transform};
pub use grid::{DataSource, FetchError, GridConfig, GridEngine, Page, PageItem, PageToken};
pub use label::Label;
pub use mask::{DecodeError, MaskBuffer};
pub use overlay::{Overlay, PointLocation, SelectData};
pub use render::{AttachError, Options, RenderState, SampleRenderer, StateUpdate, Surface};
pub use sample::{MediaType, Sample};
