//! Windowed grid: aspect-ratio row layout, renderer pooling with a byte
//! budget, and the virtualization engine.

mod cache;
mod engine;
mod layout;

pub use cache::{PoolEntry, RendererPool};
pub use engine::{
    DataSource, FetchError, GridConfig, GridEngine, Page, PageItem, PageToken, RenderError,
    RequestId,
};
pub use layout::{aspect_budget, pack_rows, total_height, LayoutItem, Row};
