//! Top-level viewer: load -> ready -> error lifecycle and the host control
//! surface.
//!
//! Everything is driven cooperatively from [`ViewerShell::tick`]: finished
//! loads and renders are picked up, a debounced query starts its scan, and
//! running scans advance a few pages at a time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::MouseEvent;
use log::{debug, info, warn};
use ratatui::layout::Rect;

use super::debounce::Debouncer;
use super::generation::GenerationCounter;
use super::geometry::Rotation;
use super::listeners::{ListenerGuard, ListenerKind, ListenerRegistry};
use super::loader::{DocumentLoader, LoadOutcome};
use super::navigation::PanelRequest;
use super::overlay::{HighlightOverlay, OverlayInput};
use super::render::{PageRenderController, RenderEvent, RenderedPage};
use super::search::{DocumentIndex, ScanProgress, SearchScan};
use super::split::{PaneSplit, ResizeOutcome, SplitPaneResizer};
use super::state::{Command, Effect, ViewerState};
use super::zoom::{FitViewport, compute_fit};
use crate::document::{DocumentDecoder, DocumentHandle, DocumentStore};
use crate::error::ViewerError;
use crate::settings::ViewerSettings;

/// What the host should show in place of the document
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerStatus {
    NoDocument,
    Loading { doc_id: String },
    Ready { doc_id: String },
    NotFound { doc_id: String },
    LoadFailed { doc_id: String, error: ViewerError },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoomRequest {
    Level(f32),
    Fit,
}

/// One line of the results panel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
    pub page: usize,
    pub snippet: String,
    pub ordinal: usize,
    pub total_for_page: usize,
}

struct ActiveDocument {
    handle: DocumentHandle,
    renderer: PageRenderController,
    index: DocumentIndex,
    state: ViewerState,
    overlay: HighlightOverlay,
    _resize_listener: ListenerGuard,
}

pub struct ViewerShell {
    settings: ViewerSettings,
    loader: DocumentLoader,
    registry: Arc<dyn ListenerRegistry>,
    status: ViewerStatus,
    initial_page: usize,
    document: Option<ActiveDocument>,
    resizer: SplitPaneResizer,
    /// Size of the area split between the two panes
    container: (f32, f32),
    search_debounce: Debouncer<String>,
    search_generations: GenerationCounter,
    scan: Option<SearchScan>,
    search_failures: Vec<ViewerError>,
}

impl ViewerShell {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        decoder: Arc<dyn DocumentDecoder>,
        registry: Arc<dyn ListenerRegistry>,
        settings: ViewerSettings,
    ) -> Self {
        let resizer = SplitPaneResizer::new(settings.pane_split(), Arc::clone(&registry));
        Self {
            search_debounce: Debouncer::new(settings.search_debounce()),
            settings,
            loader: DocumentLoader::new(store, decoder),
            registry,
            status: ViewerStatus::NoDocument,
            initial_page: 1,
            document: None,
            resizer,
            container: (0.0, 0.0),
            search_generations: GenerationCounter::new(),
            scan: None,
            search_failures: Vec::new(),
        }
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    /// Starts loading `doc_id`, replacing whatever is open
    pub fn load(&mut self, doc_id: &str, initial_page: usize) {
        self.teardown_document();
        self.initial_page = initial_page;
        self.status = ViewerStatus::Loading {
            doc_id: doc_id.to_string(),
        };
        self.loader.start(doc_id);
    }

    /// Blocks until the pending load finishes or `timeout` elapses
    pub fn wait_for_load(&mut self, timeout: Duration) -> &ViewerStatus {
        if let Some(outcome) = self.loader.wait(timeout) {
            self.finish_load(outcome);
        }
        &self.status
    }

    fn finish_load(&mut self, outcome: LoadOutcome) {
        let LoadOutcome { doc_id, result, .. } = outcome;
        match result {
            Ok(handle) => {
                info!("Document {doc_id} ready ({} pages)", handle.page_count());
                let state = ViewerState::new(
                    handle.page_count(),
                    self.initial_page,
                    self.resizer.committed(),
                );
                self.document = Some(ActiveDocument {
                    renderer: PageRenderController::new(
                        handle.clone(),
                        self.settings.render_cache_pages,
                    ),
                    index: DocumentIndex::new(handle.clone(), self.settings.text_cache_pages),
                    handle,
                    state,
                    overlay: HighlightOverlay::new(),
                    _resize_listener: ListenerGuard::attach(
                        &self.registry,
                        &[ListenerKind::WindowResize],
                    ),
                });
                self.status = ViewerStatus::Ready { doc_id };
                self.run_effects(
                    vec![Effect::RecomputeFit, Effect::RenderCurrentPage],
                    Instant::now(),
                );
            }
            Err(ViewerError::NotFound { doc_id }) => {
                warn!("Document {doc_id} not found");
                self.status = ViewerStatus::NotFound { doc_id };
            }
            Err(error) => {
                warn!("Document {doc_id} failed to load: {error}");
                self.status = ViewerStatus::LoadFailed { doc_id, error };
            }
        }
    }

    /// Advances all background work. Returns true if anything the host
    /// displays changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Some(outcome) = self.loader.poll() {
            self.finish_load(outcome);
            changed = true;
        }

        if let Some(query) = self.search_debounce.take_ready(now) {
            self.start_search(&query);
        }
        changed |= self.step_search(now);

        let events = match &mut self.document {
            Some(doc) => doc.renderer.poll(),
            None => Vec::new(),
        };
        changed |= self.handle_render_events(events);

        changed
    }

    /// True while a load, search or render is outstanding
    pub fn is_busy(&self) -> bool {
        self.loader.is_loading()
            || self.search_debounce.is_pending()
            || self.scan.is_some()
            || self.document.as_ref().is_some_and(|d| d.renderer.is_busy())
    }

    /// Ticks until nothing is outstanding or `timeout` elapses. Returns
    /// false on timeout.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick(Instant::now());
            if !self.is_busy() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let pause = (deadline - now).min(Duration::from_millis(5));
            let render_busy = self.document.as_ref().is_some_and(|d| d.renderer.is_busy());
            if render_busy {
                let events = match &mut self.document {
                    Some(doc) => doc.renderer.wait(pause),
                    None => Vec::new(),
                };
                self.handle_render_events(events);
            } else if self.scan.is_none() {
                std::thread::sleep(pause);
            }
        }
    }

    fn handle_render_events(&mut self, events: Vec<RenderEvent>) -> bool {
        let mut changed = false;
        for event in events {
            match event {
                RenderEvent::Rendered { page, generation } => {
                    debug!("Page {page} on screen (generation {})", generation.value());
                    self.rebuild_overlay();
                    changed = true;
                }
                RenderEvent::Failed { page, error } => {
                    warn!("Page {page}: {error}");
                    changed = true;
                }
            }
        }
        changed
    }

    fn start_search(&mut self, query: &str) {
        let Some(doc) = &self.document else {
            return;
        };
        let generation = self.search_generations.advance();
        debug!("Starting search for {query:?} (generation {})", generation.value());
        self.search_failures.clear();
        self.scan = Some(doc.index.begin(query, generation));
    }

    fn step_search(&mut self, now: Instant) -> bool {
        let (Some(doc), Some(scan)) = (&mut self.document, &mut self.scan) else {
            return false;
        };

        let progress = scan.step(&mut doc.index, self.settings.scan_pages_per_tick);
        if progress != ScanProgress::Complete {
            return false;
        }

        let Some(scan) = self.scan.take() else {
            return false;
        };
        let current = self.search_generations.is_current(scan.generation())
            && scan.query() == Some(doc.state.query.trim());
        if !current {
            debug!("Dropping results of superseded search");
            return false;
        }

        self.search_failures = scan.failures().to_vec();
        let effects = doc.state.apply(Command::SetMatches(scan.into_matches()));
        self.run_effects(effects, now);
        true
    }

    fn cancel_search(&mut self) {
        self.search_debounce.cancel();
        self.search_generations.advance();
        self.scan = None;
        self.search_failures.clear();
    }

    fn apply(&mut self, command: Command) -> bool {
        self.apply_at(command, Instant::now())
    }

    fn apply_at(&mut self, command: Command, now: Instant) -> bool {
        let Some(doc) = &mut self.document else {
            debug!("Ignoring {command:?}: no document");
            return false;
        };
        let effects = doc.state.apply(command);
        let changed = !effects.is_empty();
        self.run_effects(effects, now);
        changed
    }

    fn run_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut render = false;
        let mut overlay = false;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::RecomputeFit => {
                    if let Some(level) = self.fit_level() {
                        if let Some(doc) = &mut self.document {
                            queue.extend(doc.state.apply(Command::ApplyFit(level)));
                        }
                    }
                }
                Effect::RenderCurrentPage => render = true,
                Effect::RebuildOverlay => overlay = true,
                Effect::ScheduleSearch => {
                    // The running scan belongs to the previous query.
                    self.search_generations.advance();
                    self.scan = None;
                    if let Some(doc) = &self.document {
                        let query = doc.state.query.trim().to_string();
                        self.search_debounce.schedule(query, now);
                    }
                }
                Effect::ClearSearch => self.cancel_search(),
            }
        }

        if render {
            if let Some(doc) = &mut self.document {
                let state = &doc.state;
                doc.renderer
                    .render(state.current_page, state.zoom.level(), state.rotation);
            }
        }
        if overlay {
            self.rebuild_overlay();
        }
    }

    /// Fit level for the current page, if the container size is known
    fn fit_level(&self) -> Option<f32> {
        let doc = self.document.as_ref()?;
        let (width, height) = self.container;
        if !(width > 0.0 && height > 0.0) {
            return None;
        }

        let state = &doc.state;
        let page = doc.handle.page_size(state.current_page)?.rotated(state.rotation);
        let viewport = FitViewport {
            width: width * state.pane.right_fraction(),
            height,
            reserved_width: if state.results_panel.visible {
                self.settings.results_panel_width
            } else {
                0.0
            },
        };
        Some(compute_fit(page, viewport, self.settings.fit_params()))
    }

    /// Rebuilds the overlay for the raster currently on screen
    fn rebuild_overlay(&mut self) {
        let Some(doc) = &mut self.document else {
            return;
        };
        let Some(shown) = doc.renderer.current() else {
            doc.overlay.clear();
            return;
        };

        match doc.index.page_items(shown.page) {
            Ok(items) => {
                doc.overlay.render(OverlayInput {
                    page: shown.page,
                    items: &items,
                    viewport: &shown.viewport,
                    query: &doc.state.query,
                    matches: &doc.state.matches,
                    active_ordinal: doc.state.current_match,
                });
            }
            Err(e) => {
                warn!("No overlay for page {}: {e}", shown.page);
                doc.overlay.clear();
            }
        }
    }

    fn teardown_document(&mut self) {
        self.loader.cancel();
        self.cancel_search();
        self.resizer.cancel();
        if let Some(doc) = self.document.take() {
            debug!("Closing document {}", doc.handle.doc_id());
        }
    }

    // Host control surface

    /// Shows `page`. Asking again for the page already selected retries
    /// its render when nothing for it is on screen or in flight, which is
    /// the case after that render failed.
    pub fn request_page(&mut self, page: usize) -> bool {
        let retry = self.document.as_ref().is_some_and(|doc| {
            doc.state.current_page == page
                && doc.renderer.pending_page() != Some(page)
                && doc.renderer.current().map(|shown| shown.page) != Some(page)
        });
        let changed = self.apply(Command::GoToPage(page));
        if retry {
            debug!("Retrying render of page {page}");
            self.run_effects(vec![Effect::RenderCurrentPage], Instant::now());
        }
        changed || retry
    }

    pub fn set_zoom(&mut self, request: ZoomRequest) -> bool {
        match request {
            ZoomRequest::Level(level) => self.apply(Command::SetZoom(level)),
            ZoomRequest::Fit => self.apply(Command::EnableFit),
        }
    }

    pub fn zoom_in(&mut self) -> bool {
        self.apply(Command::ZoomIn(self.settings.zoom_step))
    }

    pub fn zoom_out(&mut self) -> bool {
        self.apply(Command::ZoomOut(self.settings.zoom_step))
    }

    pub fn set_rotation(&mut self, degrees: i32) -> Result<bool, ViewerError> {
        let rotation = Rotation::from_degrees(degrees)?;
        Ok(self.apply(Command::SetRotation(rotation)))
    }

    /// Updates the query; the search itself starts once typing pauses
    pub fn set_query(&mut self, text: &str, now: Instant) -> bool {
        self.apply_at(Command::SetQuery(text.to_string()), now)
    }

    pub fn next_match(&mut self) -> bool {
        self.apply(Command::NextMatch)
    }

    pub fn prev_match(&mut self) -> bool {
        self.apply(Command::PrevMatch)
    }

    pub fn goto_match(&mut self, ordinal: usize, panel: PanelRequest) -> bool {
        self.apply(Command::GotoMatch { ordinal, panel })
    }

    pub fn toggle_results_panel(&mut self) -> bool {
        self.apply(Command::ToggleResultsPanel)
    }

    pub fn set_pane_fraction(&mut self, fraction: f32) -> PaneSplit {
        let split = self.resizer.set_fraction(fraction);
        self.apply(Command::SetPaneFraction(split.left_fraction()));
        split
    }

    /// Container size in the same unit as pointer positions
    pub fn resize_viewport(&mut self, width: f32, height: f32) {
        if self.container == (width, height) {
            return;
        }
        self.container = (width, height);
        self.apply(Command::ViewportResized);
    }

    pub fn pointer_down(&mut self, x: f32) -> bool {
        self.resizer.pointer_down(x)
    }

    /// Live split while dragging
    pub fn pointer_move(&mut self, x: f32) -> Option<PaneSplit> {
        self.resizer.pointer_move(x, self.container.0)
    }

    pub fn pointer_up(&mut self) -> Option<PaneSplit> {
        let split = self.resizer.pointer_up()?;
        self.apply(Command::SetPaneFraction(split.left_fraction()));
        Some(split)
    }

    /// Terminal mouse input for the divider between `container`'s panes
    pub fn handle_mouse(
        &mut self,
        mouse: MouseEvent,
        divider: Rect,
        container: Rect,
    ) -> ResizeOutcome {
        let outcome = self.resizer.handle_mouse(mouse, divider, container);
        if let ResizeOutcome::Committed(split) = outcome {
            self.apply(Command::SetPaneFraction(split.left_fraction()));
        }
        outcome
    }

    /// Split to lay out now; follows the pointer mid-drag
    pub fn layout(&self) -> PaneSplit {
        self.resizer.split()
    }

    pub fn close(&mut self) {
        self.teardown_document();
        self.status = ViewerStatus::NoDocument;
    }

    // Host outputs

    pub fn state(&self) -> Option<&ViewerState> {
        self.document.as_ref().map(|d| &d.state)
    }

    pub fn results(&self) -> Vec<ResultRow> {
        self.state()
            .map(|state| {
                state
                    .matches
                    .iter()
                    .map(|m| ResultRow {
                        page: m.page,
                        snippet: m.snippet.clone(),
                        ordinal: m.global_ordinal,
                        total_for_page: m.page_match_count,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn zoom_percent(&self) -> Option<u16> {
        self.state().map(|s| s.zoom.percent())
    }

    pub fn raster(&self) -> Option<&RenderedPage> {
        self.document.as_ref().and_then(|d| d.renderer.current())
    }

    pub fn overlay(&self) -> Option<&HighlightOverlay> {
        self.document.as_ref().map(|d| &d.overlay)
    }

    pub fn page_error(&self, page: usize) -> Option<&ViewerError> {
        self.document
            .as_ref()
            .and_then(|d| d.renderer.page_error(page))
    }

    /// Pages the last completed search could not read
    pub fn search_failures(&self) -> &[ViewerError] {
        &self.search_failures
    }

    pub fn is_searching(&self) -> bool {
        self.search_debounce.is_pending() || self.scan.is_some()
    }
}

impl Drop for ViewerShell {
    fn drop(&mut self) {
        self.teardown_document();
    }
}
