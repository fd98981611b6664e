//! Grid virtualization engine.
//!
//! Renders only the subset of a potentially unbounded sample collection
//! that intersects the scroll viewport. Pages of sample metadata arrive
//! from an external [`DataSource`]; for each visible cell the engine
//! constructs or reuses a [`SampleRenderer`], and cells scrolling out are
//! disabled rather than destroyed so scroll-back is instantaneous. The
//! renderer pool and its byte budget live on the engine itself and are torn
//! down with it.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::constants::{
    DEFAULT_CACHE_BUDGET, DEFAULT_RESIDENT_PAGES, MAX_ZOOM, RESIZE_DEBOUNCE_TICKS,
};
use crate::grid::cache::RendererPool;
use crate::grid::layout::{pack_rows, total_height, Row};
use crate::render::{AttachError, Options, SampleRenderer, Surface};
use crate::sample::Sample;

/// Correlates an in-flight fetch with its eventual result.
pub type RequestId = u64;

/// Opaque pagination continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(pub String);

/// One fetched grid item.
#[derive(Debug, Clone)]
pub struct PageItem {
    pub id: String,
    pub aspect_ratio: f64,
    pub sample: Sample,
}

/// One fetched page of items plus continuation tokens.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub next: Option<PageToken>,
    pub previous: Option<PageToken>,
}

/// A page fetch failure. Previously loaded pages stay visible.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page fetch failed: {0}")]
    Failed(String),
}

/// Errors surfaced by [`GridEngine::render`].
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown grid item: {0}")]
    UnknownItem(String),

    #[error(transparent)]
    Attach(#[from] AttachError),
}

/// External paginated data-fetch collaborator.
///
/// Fetches are a request/poll pair: `request` starts a fetch and returns an
/// id, `poll` yields whatever has completed since the last call. The engine
/// matches results against its pending table and silently discards results
/// whose request is no longer expected.
pub trait DataSource {
    /// Begin fetching the page at `token` (`None` means the first page).
    fn request(&mut self, token: Option<&PageToken>) -> RequestId;

    /// Drain completed fetches.
    fn poll(&mut self) -> Vec<(RequestId, Result<Page, FetchError>)>;
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// 0 (widest) to [`MAX_ZOOM`] (largest items).
    pub zoom: u32,
    /// Byte ceiling for resident renderers and their decoded buffers.
    pub cache_budget_bytes: usize,
    /// How many fetched pages stay resident.
    pub resident_pages: usize,
    /// Display options handed to every renderer.
    pub options: Options,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1200.0,
            viewport_height: 800.0,
            zoom: 5,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET,
            resident_pages: DEFAULT_RESIDENT_PAGES,
            options: Options::default(),
        }
    }
}

/// Layout inputs of one resident page.
#[derive(Debug)]
struct LoadedPage {
    items: Vec<(String, f64)>,
}

/// Windowed grid over a paginated sample collection.
pub struct GridEngine<S: DataSource> {
    source: S,
    config: GridConfig,
    pages: VecDeque<LoadedPage>,
    samples: HashMap<String, Sample>,
    rows: Vec<Row>,
    pool: RendererPool,
    pending: HashMap<RequestId, Option<PageToken>>,
    next_token: Option<PageToken>,
    reached_end: bool,
    scroll_top: f64,
    tick: u64,
    resize_deadline: Option<u64>,
    last_fetch_error: Option<FetchError>,
}

impl<S: DataSource> GridEngine<S> {
    /// Construct the engine and start fetching the first page.
    pub fn new(mut source: S, config: GridConfig) -> Self {
        let mut pending = HashMap::new();
        let request_id = source.request(None);
        pending.insert(request_id, None);

        let pool = RendererPool::new(config.cache_budget_bytes);

        Self {
            source,
            config,
            pages: VecDeque::new(),
            samples: HashMap::new(),
            rows: Vec::new(),
            pool,
            pending,
            next_token: None,
            reached_end: false,
            scroll_top: 0.0,
            tick: 0,
            resize_deadline: None,
            last_fetch_error: None,
        }
    }

    /// One scheduling tick: drain fetch results, settle a pending resize,
    /// flush every visible renderer (one coalesced redraw each), and
    /// enforce the byte budget.
    pub fn tick(&mut self) {
        self.tick += 1;

        for (request_id, result) in self.source.poll() {
            if self.pending.remove(&request_id).is_none() {
                // The requesting window moved on; drop without side effects
                log::debug!("Discarding stale fetch result {}", request_id);
                continue;
            }
            match result {
                Ok(page) => self.ingest_page(page),
                Err(e) => {
                    // Previously loaded pages stay visible
                    log::warn!("Page fetch failed: {}", e);
                    self.last_fetch_error = Some(e);
                }
            }
        }

        if let Some(deadline) = self.resize_deadline {
            if self.tick >= deadline {
                self.resize_deadline = None;
                self.reflow();
                log::debug!("Resize settled; reflowed {} rows", self.rows.len());
            }
        }

        let tick = self.tick;
        for (_, entry) in self.pool.iter_mut() {
            if entry.renderer.is_attached() && !entry.renderer.is_disabled() {
                entry.last_visible = tick;
                entry.renderer.tick_playback();
                entry.renderer.flush();
            }
        }

        self.pool.evict_over_budget();
    }

    fn ingest_page(&mut self, page: Page) {
        log::debug!("Loaded page with {} items", page.items.len());

        let mut items = Vec::with_capacity(page.items.len());
        for item in page.items {
            items.push((item.id.clone(), item.aspect_ratio));
            self.samples.insert(item.id, item.sample);
        }
        self.pages.push_back(LoadedPage { items });
        self.reached_end = page.next.is_none();
        self.next_token = page.next;

        // Bounded page window: evict whole pages from the far end
        while self.pages.len() > self.config.resident_pages {
            let dropped = self.pages.pop_front().expect("window is non-empty");
            for (id, _) in &dropped.items {
                self.samples.remove(id);
            }
            let keep: HashSet<String> = self.samples.keys().cloned().collect();
            self.pool.retain_ids(&keep);
        }

        self.reflow();
    }

    fn reflow(&mut self) {
        let items: Vec<(String, f64)> = self
            .pages
            .iter()
            .flat_map(|p| p.items.iter().cloned())
            .collect();
        self.rows = pack_rows(&items, self.config.viewport_width, self.config.zoom);
    }

    /// Request the next page unless it is already in flight or the
    /// collection is exhausted.
    pub fn fetch_next(&mut self) {
        if self.reached_end && self.next_token.is_none() && !self.pages.is_empty() {
            return;
        }

        let token = self.next_token.clone();
        if self.pending.values().any(|pending| *pending == token) {
            return;
        }
        // The first page is only fetched once
        if token.is_none() && !self.pages.is_empty() {
            return;
        }

        let request_id = self.source.request(token.as_ref());
        self.pending.insert(request_id, token);
    }

    /// Handle a cell scrolling into or out of view.
    ///
    /// `disable` suspends the cell's renderer without destroying it.
    /// Scroll-in reuses a pooled renderer when one exists; otherwise a new
    /// renderer is constructed and attached, unless `soft` (the lightweight
    /// placeholder pass used during fast scrolling).
    pub fn render(
        &mut self,
        id: &str,
        surface: Surface,
        soft: bool,
        disable: bool,
    ) -> Result<(), RenderError> {
        if disable {
            if let Some(renderer) = self.pool.get_mut(id) {
                renderer.disable();
            }
            return Ok(());
        }

        // Rendering is suspended until a pending resize settles
        if self.is_resizing() {
            return Ok(());
        }

        let tick = self.tick;
        if let Some(renderer) = self.pool.get_mut(id) {
            renderer.attach(surface)?;
            self.pool.touch(id, tick);
            return Ok(());
        }

        if soft {
            return Ok(());
        }

        let sample = self
            .samples
            .get(id)
            .ok_or_else(|| RenderError::UnknownItem(id.to_string()))?
            .clone();
        let mut renderer = SampleRenderer::new(sample, self.config.options.clone());
        renderer.attach(surface)?;
        self.pool.insert(id, renderer, tick);
        Ok(())
    }

    /// Record a container resize. Rendering suspends and the layout is
    /// rebuilt from scratch once the debounce window passes with no further
    /// resizes.
    pub fn handle_resize(&mut self, width: f64, height: f64) {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.resize_deadline = Some(self.tick + RESIZE_DEBOUNCE_TICKS);
        log::debug!("Resize to {}x{}; rendering suspended", width, height);
    }

    pub fn is_resizing(&self) -> bool {
        self.resize_deadline.is_some()
    }

    pub fn set_zoom(&mut self, zoom: u32) {
        self.config.zoom = zoom.min(MAX_ZOOM);
        self.reflow();
    }

    pub fn zoom(&self) -> u32 {
        self.config.zoom
    }

    pub fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top.max(0.0);
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn grid_height(&self) -> f64 {
        total_height(&self.rows)
    }

    /// Rows intersecting the current scroll viewport.
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        let top = self.scroll_top;
        let bottom = top + self.config.viewport_height;
        self.rows.iter().filter(move |r| r.intersects(top, bottom))
    }

    /// Ids of the items currently intersecting the scroll viewport.
    pub fn visible_ids(&self) -> Vec<String> {
        self.visible_rows()
            .flat_map(|r| r.items.iter().map(|i| i.id.clone()))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.samples.len()
    }

    pub fn sample(&self, id: &str) -> Option<&Sample> {
        self.samples.get(id)
    }

    pub fn renderer(&self, id: &str) -> Option<&SampleRenderer> {
        self.pool.get(id)
    }

    pub fn renderer_mut(&mut self, id: &str) -> Option<&mut SampleRenderer> {
        self.pool.get_mut(id)
    }

    /// Number of renderers currently resident in the pool.
    pub fn resident_count(&self) -> usize {
        self.pool.len()
    }

    pub fn last_fetch_error(&self) -> Option<&FetchError> {
        self.last_fetch_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Label, Segmentation};
    use crate::mask::{self, MaskBuffer, MaskData};
    use crate::sample::{FieldValue, MediaType, SampleMetadata};
    use ndarray::Array2;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct SourceInner {
        next_id: RequestId,
        requests: Vec<(RequestId, Option<PageToken>)>,
        results: Vec<(RequestId, Result<Page, FetchError>)>,
    }

    /// Test double with an externally controlled completion queue.
    #[derive(Clone, Default)]
    struct SharedSource {
        inner: Rc<RefCell<SourceInner>>,
    }

    impl SharedSource {
        fn complete(&self, request_id: RequestId, result: Result<Page, FetchError>) {
            self.inner.borrow_mut().results.push((request_id, result));
        }

        fn request_count(&self) -> usize {
            self.inner.borrow().requests.len()
        }
    }

    impl DataSource for SharedSource {
        fn request(&mut self, token: Option<&PageToken>) -> RequestId {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.requests.push((id, token.cloned()));
            id
        }

        fn poll(&mut self) -> Vec<(RequestId, Result<Page, FetchError>)> {
            self.inner.borrow_mut().results.drain(..).collect()
        }
    }

    fn plain_sample(id: &str) -> Sample {
        Sample {
            id: id.into(),
            filepath: format!("/data/{id}.jpg"),
            media_type: MediaType::Image,
            metadata: SampleMetadata {
                width: Some(100),
                height: Some(100),
                frame_rate: None,
            },
            fields: BTreeMap::new(),
        }
    }

    /// A sample whose decoded segmentation mask occupies `side * side`
    /// bytes.
    fn mask_sample(id: &str, side: usize) -> Sample {
        let mask = MaskBuffer::new(MaskData::U8(Array2::ones((side, side))));
        let mut sample = plain_sample(id);
        sample.fields.insert(
            "segments".to_string(),
            FieldValue::Label(Box::new(Label::Segmentation(Segmentation {
                id: format!("{id}-seg"),
                mask: Some(mask::encode(&mask)),
            }))),
        );
        sample
    }

    fn page_of(samples: Vec<Sample>, next: Option<&str>) -> Page {
        Page {
            items: samples
                .into_iter()
                .map(|sample| PageItem {
                    id: sample.id.clone(),
                    aspect_ratio: 1.0,
                    sample,
                })
                .collect(),
            next: next.map(|t| PageToken(t.into())),
            previous: None,
        }
    }

    fn config() -> GridConfig {
        GridConfig {
            viewport_width: 1200.0,
            viewport_height: 400.0,
            zoom: 6,
            ..GridConfig::default()
        }
    }

    fn engine_with_page(ids: &[&str]) -> (GridEngine<SharedSource>, SharedSource) {
        let source = SharedSource::default();
        let handle = source.clone();
        let mut engine = GridEngine::new(source, config());

        let samples = ids.iter().map(|id| plain_sample(id)).collect();
        handle.complete(0, Ok(page_of(samples, None)));
        engine.tick();
        (engine, handle)
    }

    #[test]
    fn test_first_page_requested_on_construction() {
        let source = SharedSource::default();
        let handle = source.clone();
        let _engine = GridEngine::new(source, config());
        assert_eq!(handle.request_count(), 1);
    }

    #[test]
    fn test_page_ingest_builds_rows() {
        let (engine, _) = engine_with_page(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(engine.item_count(), 6);
        assert!(!engine.rows().is_empty());
        assert!(engine.grid_height() > 0.0);
    }

    #[test]
    fn test_stale_result_discarded() {
        let (mut engine, handle) = engine_with_page(&["a"]);
        let before = engine.item_count();

        // A result nobody is waiting for
        handle.complete(999, Ok(page_of(vec![plain_sample("ghost")], None)));
        engine.tick();

        assert_eq!(engine.item_count(), before);
        assert!(engine.sample("ghost").is_none());
    }

    #[test]
    fn test_fetch_error_keeps_loaded_pages() {
        let source = SharedSource::default();
        let handle = source.clone();
        let mut engine = GridEngine::new(source, config());

        handle.complete(0, Ok(page_of(vec![plain_sample("a")], Some("page2"))));
        engine.tick();
        let rows_before = engine.rows().len();

        engine.fetch_next();
        handle.complete(1, Err(FetchError::Failed("backend down".into())));
        engine.tick();

        // The partial window stays visible
        assert_eq!(engine.rows().len(), rows_before);
        assert!(engine.sample("a").is_some());
        assert!(engine.last_fetch_error().is_some());
    }

    #[test]
    fn test_fetch_next_deduplicates() {
        let source = SharedSource::default();
        let handle = source.clone();
        let mut engine = GridEngine::new(source, config());

        handle.complete(0, Ok(page_of(vec![plain_sample("a")], Some("page2"))));
        engine.tick();

        engine.fetch_next();
        engine.fetch_next();
        // Construction fetch plus exactly one next-page fetch
        assert_eq!(handle.request_count(), 2);
    }

    #[test]
    fn test_render_constructs_and_attaches() {
        let (mut engine, _) = engine_with_page(&["a"]);

        engine
            .render("a", Surface::new(1, 240, 240), false, false)
            .expect("render");
        assert_eq!(engine.resident_count(), 1);

        engine.tick();
        assert_eq!(engine.renderer("a").unwrap().draw_count(), 1);
    }

    #[test]
    fn test_scroll_back_reuses_renderer() {
        let (mut engine, _) = engine_with_page(&["a"]);
        let surface = Surface::new(1, 240, 240);

        engine.render("a", surface, false, false).expect("render");
        engine.tick();
        assert_eq!(engine.renderer("a").unwrap().draw_count(), 1);

        // Scroll out: disabled, not destroyed
        engine.render("a", surface, false, true).expect("disable");
        assert!(engine.renderer("a").unwrap().is_disabled());
        assert_eq!(engine.resident_count(), 1);

        // Scroll back: same instance, no fresh construction or decode
        engine.render("a", surface, false, false).expect("render");
        assert_eq!(engine.resident_count(), 1);
        assert_eq!(engine.renderer("a").unwrap().draw_count(), 1);
        assert!(!engine.renderer("a").unwrap().is_disabled());
    }

    #[test]
    fn test_soft_render_skips_construction() {
        let (mut engine, _) = engine_with_page(&["a"]);

        engine
            .render("a", Surface::new(1, 240, 240), true, false)
            .expect("soft render");
        assert_eq!(engine.resident_count(), 0);

        // A soft pass still re-attaches an existing renderer
        engine
            .render("a", Surface::new(1, 240, 240), false, false)
            .expect("render");
        engine.render("a", Surface::new(1, 240, 240), false, true).expect("disable");
        engine
            .render("a", Surface::new(2, 240, 240), true, false)
            .expect("soft render");
        assert!(!engine.renderer("a").unwrap().is_disabled());
    }

    #[test]
    fn test_render_unknown_item() {
        let (mut engine, _) = engine_with_page(&["a"]);
        let result = engine.render("missing", Surface::new(1, 240, 240), false, false);
        assert!(matches!(result, Err(RenderError::UnknownItem(_))));
    }

    #[test]
    fn test_resize_debounces_then_reflows() {
        let (mut engine, _) = engine_with_page(&["a", "b", "c", "d", "e", "f"]);
        let height_before = engine.grid_height();

        engine.handle_resize(600.0, 400.0);
        assert!(engine.is_resizing());

        // Rendering is suspended while resizing
        engine
            .render("a", Surface::new(1, 240, 240), false, false)
            .expect("render during resize");
        assert_eq!(engine.resident_count(), 0);

        // Stale layout persists until the debounce settles
        assert_eq!(engine.grid_height(), height_before);
        for _ in 0..crate::constants::RESIZE_DEBOUNCE_TICKS {
            engine.tick();
        }
        assert!(!engine.is_resizing());
        assert_ne!(engine.grid_height(), height_before);
    }

    #[test]
    fn test_page_window_drops_old_pages() {
        let source = SharedSource::default();
        let handle = source.clone();
        let mut engine = GridEngine::new(
            source,
            GridConfig {
                resident_pages: 1,
                ..config()
            },
        );

        handle.complete(0, Ok(page_of(vec![plain_sample("a")], Some("page2"))));
        engine.tick();
        engine
            .render("a", Surface::new(1, 240, 240), false, false)
            .expect("render");

        engine.fetch_next();
        handle.complete(1, Ok(page_of(vec![plain_sample("b")], None)));
        engine.tick();

        // Page one fell out of the window: sample and renderer both gone
        assert!(engine.sample("a").is_none());
        assert!(engine.renderer("a").is_none());
        assert!(engine.sample("b").is_some());
    }

    #[test]
    fn test_byte_budget_evicts_disabled_renderers() {
        let source = SharedSource::default();
        let handle = source.clone();
        let mut engine = GridEngine::new(
            source,
            GridConfig {
                cache_budget_bytes: 150,
                options: Options {
                    active_fields: vec!["segments".into()],
                    ..Options::default()
                },
                ..config()
            },
        );

        // Each mask is 100 bytes; two renderers exceed the 150-byte budget
        handle.complete(
            0,
            Ok(page_of(vec![mask_sample("a", 10), mask_sample("b", 10)], None)),
        );
        engine.tick();

        let surface = Surface::new(1, 240, 240);
        engine.render("a", surface, false, false).expect("render");
        engine.render("b", surface, false, false).expect("render");

        // Scroll "a" out, then let the budget pass run
        engine.render("a", surface, false, true).expect("disable");
        engine.tick();

        assert!(engine.renderer("a").is_none());
        assert!(engine.renderer("b").is_some());
    }

    #[test]
    fn test_visible_rows_follow_scroll() {
        let (mut engine, _) = engine_with_page(&[
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o",
        ]);

        // Rows are 240 high; a 400-high viewport at the top sees two rows
        let ids_at_top = engine.visible_ids();
        assert!(ids_at_top.contains(&"a".to_string()));
        assert!(!ids_at_top.contains(&"m".to_string()));

        engine.scroll_to(engine.grid_height() - 400.0);
        let ids_at_bottom = engine.visible_ids();
        assert!(ids_at_bottom.contains(&"o".to_string()));
        assert!(!ids_at_bottom.contains(&"a".to_string()));
    }
}
