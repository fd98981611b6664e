//! Per-sample renderer: lifecycle state machine, queued update protocol,
//! and the draw loop composing overlays into a frame.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use web_time::Instant;

use crate::constants::{FIT_MARGIN, MAX_SCALE, MIN_SCALE};
use crate::draw::{DrawCommand, DrawContext};
use crate::geometry::{BoundingBox, Transform};
use crate::media::Bitmap;
use crate::overlay::{build_overlays, Overlay, PointLocation, SelectData};
use crate::render::state::{Options, RenderState, StateUpdate};
use crate::sample::{MediaType, Sample};

/// An opaque handle to the host's canvas element for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Errors raised by [`SampleRenderer::attach`].
#[derive(Error, Debug)]
pub enum AttachError {
    /// The target surface is missing or zero-size; the renderer keeps its
    /// prior state.
    #[error("cannot attach a zero-size surface")]
    EmptySurface,

    /// The renderer was destroyed; attach never silently succeeds.
    #[error("renderer has been destroyed")]
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Loading,
    Loaded,
    Destroyed,
}

/// Playback axis for video-capable renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    #[default]
    Paused,
    Playing,
    Seeking,
}

/// A queued state mutation, applied in call order at the next flush.
enum QueuedUpdate {
    Delta(StateUpdate),
    With(Box<dyn FnOnce(&RenderState) -> StateUpdate>),
}

/// Post-draw callback: runs once, after the draw that reflects the merged
/// state, receiving the frame, the resulting state, and the overlay list.
/// The only sanctioned place for state-dependent side effects outside of
/// overlay draws.
pub type PostDrawFn = Box<dyn FnOnce(&[DrawCommand], &RenderState, &[Overlay])>;

/// Stateful visualizer for one sample.
///
/// Lifecycle: `Loading -> Loaded` with an orthogonal `disabled` flag, and
/// `Destroyed` as the terminal state. A disabled renderer keeps its decoded
/// buffers so a scroll-back re-attach is cheap; destroying releases
/// everything.
pub struct SampleRenderer {
    sample: Sample,
    state: RenderState,
    overlays: Vec<Overlay>,
    lifecycle: Lifecycle,
    disabled: bool,
    surface: Option<Surface>,
    media: Option<Arc<Bitmap>>,
    playback: Playback,
    play_epoch: Option<Instant>,
    play_start_frame: f64,
    current_frame: u64,
    queue: Vec<QueuedUpdate>,
    callbacks: Vec<PostDrawFn>,
    needs_draw: bool,
    frame: Vec<DrawCommand>,
    draw_count: u64,
}

impl SampleRenderer {
    pub fn new(sample: Sample, options: Options) -> Self {
        let image_size = sample.dimensions().unwrap_or((0, 0));
        let overlays = build_overlays(&sample, &options);
        log::debug!(
            "Created renderer for sample {} with {} overlays",
            sample.id,
            overlays.len()
        );

        Self {
            sample,
            state: RenderState::new(image_size, options),
            overlays,
            lifecycle: Lifecycle::Loading,
            disabled: false,
            surface: None,
            media: None,
            playback: Playback::default(),
            play_epoch: None,
            play_start_frame: 0.0,
            current_frame: 0,
            queue: Vec::new(),
            callbacks: Vec::new(),
            needs_draw: false,
            frame: Vec::new(),
            draw_count: 0,
        }
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Number of frames drawn over this renderer's lifetime.
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// The last drawn frame's command list.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.frame
    }

    /// Bind to a concrete surface. Legal from any non-destroyed state;
    /// re-parents if already attached.
    pub fn attach(&mut self, surface: Surface) -> Result<(), AttachError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(AttachError::Destroyed);
        }
        if surface.is_empty() {
            // State-preserving no-op
            return Err(AttachError::EmptySurface);
        }

        log::debug!(
            "Attaching renderer for sample {} to surface {}",
            self.sample.id,
            surface.id
        );
        self.surface = Some(surface);
        self.state.canvas_size = (surface.width, surface.height);
        self.disabled = false;
        self.lifecycle = Lifecycle::Loaded;
        self.needs_draw = true;
        Ok(())
    }

    /// Suspend the draw loop and detach from the surface without
    /// discarding decoded state. Idempotent.
    pub fn disable(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed || self.disabled {
            return;
        }
        log::debug!("Disabling renderer for sample {}", self.sample.id);
        self.disabled = true;
        self.surface = None;
    }

    /// Terminal: releases overlays, decoded buffers, and pending work.
    pub fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        log::debug!("Destroying renderer for sample {}", self.sample.id);
        self.lifecycle = Lifecycle::Destroyed;
        self.disabled = true;
        self.surface = None;
        self.overlays.clear();
        self.media = None;
        self.queue.clear();
        self.callbacks.clear();
        self.frame.clear();
    }

    /// Provide the decoded media bitmap for the base layer.
    pub fn set_media(&mut self, media: Arc<Bitmap>) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.state.image_size = (media.width(), media.height());
        self.media = Some(media);
        self.needs_draw = true;
    }

    /// Queue a state delta. Applied, in call order, at the next flush.
    pub fn update(&mut self, delta: StateUpdate) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.queue.push(QueuedUpdate::Delta(delta));
    }

    /// Queue an updater function evaluated against the state as of its turn
    /// in the queue.
    pub fn update_with(&mut self, f: impl FnOnce(&RenderState) -> StateUpdate + 'static) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.queue.push(QueuedUpdate::With(Box::new(f)));
    }

    /// Queue a state delta plus a callback to run once after the draw that
    /// reflects it.
    pub fn update_with_callback(&mut self, delta: StateUpdate, callback: PostDrawFn) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        self.queue.push(QueuedUpdate::Delta(delta));
        self.callbacks.push(callback);
    }

    /// Drain the update queue and redraw at most once.
    ///
    /// All queued updates within one flush coalesce into a single draw.
    /// Returns whether a draw happened. While disabled or unattached, state
    /// still merges but drawing stays suspended.
    pub fn flush(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Destroyed {
            self.queue.clear();
            return false;
        }

        let had_updates = !self.queue.is_empty();
        for queued in std::mem::take(&mut self.queue) {
            match queued {
                QueuedUpdate::Delta(delta) => delta.apply(&mut self.state),
                QueuedUpdate::With(f) => f(&self.state).apply(&mut self.state),
            }
        }

        if had_updates {
            self.needs_draw = true;
        }
        if !self.needs_draw || self.disabled || self.surface.is_none() {
            return false;
        }

        self.draw_frame();
        self.needs_draw = false;

        for callback in std::mem::take(&mut self.callbacks) {
            callback(&self.frame, &self.state, &self.overlays);
        }
        true
    }

    /// Compose the frame: media base layer, then overlays in stack order.
    /// A failing overlay is logged and skipped; the rest of the frame
    /// still renders.
    fn draw_frame(&mut self) {
        let mut ctx = DrawContext::new();

        if let Some(media) = &self.media {
            ctx.image(Arc::clone(media), self.state.image_rect());
        }

        for overlay in &mut self.overlays {
            if let Err(e) = overlay.draw(&mut ctx, &self.state) {
                log::error!(
                    "Overlay draw failed for sample {}: {}",
                    self.sample.id,
                    e
                );
            }
        }

        self.frame = ctx.finish();
        self.draw_count += 1;
    }

    /// Resolve the overlay under the cursor: lowest mouse distance wins,
    /// ties go to the most-recently-drawn overlay.
    pub fn resolve_select(&self) -> Option<SelectData> {
        let mut best: Option<(f64, SelectData)> = None;

        for overlay in &self.overlays {
            if overlay.contains(&self.state) == PointLocation::None {
                continue;
            }
            let distance = overlay.mouse_distance(&self.state);
            if let Some(data) = overlay.select_data(&self.state) {
                match &best {
                    Some((existing, _)) if *existing < distance => {}
                    _ => best = Some((distance, data)),
                }
            }
        }

        best.map(|(_, data)| data)
    }

    /// Queue a transform that frames the union of overlay bounding points.
    pub fn fit_to_content(&mut self) {
        let (canvas_w, canvas_h) = self.state.canvas();
        let (image_w, image_h) = self.state.image();
        if canvas_w == 0.0 || canvas_h == 0.0 || image_w == 0.0 || image_h == 0.0 {
            return;
        }

        let points: Vec<_> = self.overlays.iter().flat_map(|o| o.points()).collect();
        let Some(bounds) = BoundingBox::around(&points) else {
            return;
        };

        let content_w = bounds.width * image_w;
        let content_h = bounds.height * image_h;
        if content_w <= 0.0 || content_h <= 0.0 {
            return;
        }

        let scale =
            ((canvas_w / content_w).min(canvas_h / content_h) * FIT_MARGIN).clamp(MIN_SCALE, MAX_SCALE);

        // Pan the content centroid onto the canvas center
        let center = bounds.center();
        let offset_x = center.x * image_w - image_w / 2.0;
        let offset_y = center.y * image_h - image_h / 2.0;

        let transform = Transform::new(scale, -offset_x * scale, -offset_y * scale);
        self.update(StateUpdate::new().transform(transform));
    }

    /// Start playback. Only meaningful for video samples with a frame rate.
    pub fn play(&mut self) {
        if self.sample.media_type != MediaType::Video {
            return;
        }
        self.playback = Playback::Playing;
        self.play_epoch = Some(Instant::now());
        self.play_start_frame = self.current_frame as f64;
    }

    /// Pause playback at the current frame.
    pub fn pause(&mut self) {
        self.advance_playback();
        self.playback = Playback::Paused;
        self.play_epoch = None;
    }

    /// Jump to a frame. Leaves the renderer seeking until the host resumes
    /// or pauses.
    pub fn seek(&mut self, frame: u64) {
        if self.sample.media_type != MediaType::Video {
            return;
        }
        self.playback = Playback::Seeking;
        self.play_epoch = None;
        self.current_frame = frame;
        self.needs_draw = true;
    }

    /// Advance the playback clock; called once per scheduling tick.
    pub fn tick_playback(&mut self) {
        if self.playback == Playback::Playing {
            self.advance_playback();
        }
    }

    fn advance_playback(&mut self) {
        let Some(epoch) = self.play_epoch else {
            return;
        };
        let Some(frame_rate) = self.sample.metadata.frame_rate else {
            return;
        };

        let frame = self.play_start_frame + epoch.elapsed().as_secs_f64() * frame_rate;
        let frame = frame as u64;
        if frame != self.current_frame {
            self.current_frame = frame;
            self.needs_draw = true;
        }
    }

    /// Approximate resident footprint: decoded overlays plus the media
    /// bitmap.
    pub fn size_bytes(&self) -> usize {
        let overlays: usize = self.overlays.iter().map(Overlay::size_bytes).sum();
        let media = self.media.as_ref().map_or(0, |m| m.size_bytes());
        overlays + media
    }
}

impl fmt::Debug for SampleRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRenderer")
            .field("sample", &self.sample.id)
            .field("lifecycle", &self.lifecycle)
            .field("disabled", &self.disabled)
            .field("overlays", &self.overlays.len())
            .finish()
    }
}
