//! Per-sample rendering: viewport state and the renderer state machine.

mod renderer;
mod state;

pub use renderer::{AttachError, Lifecycle, Playback, PostDrawFn, SampleRenderer, Surface};
pub use state::{ColorBy, FilterFn, FilterSet, Options, RenderState, StateUpdate};
