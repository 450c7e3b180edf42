//! Page render controller - owns the worker thread and the generation guard

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

use super::cache::PageCache;
use super::generation::{CancellationToken, Generation, GenerationCounter};
use super::geometry::{PageViewport, Rotation};
use super::request::{RenderRequest, RenderResponse};
use super::worker::render_worker;
use crate::document::{DocumentHandle, RasterSurface};
use crate::error::ViewerError;

/// The raster currently on screen and the viewport it was drawn with
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub page: usize,
    pub generation: Generation,
    pub viewport: PageViewport,
    pub surface: Arc<RasterSurface>,
}

/// Outcome of a render that is still current when it completes
#[derive(Clone, Debug, PartialEq)]
pub enum RenderEvent {
    Rendered { page: usize, generation: Generation },
    Failed { page: usize, error: ViewerError },
}

#[derive(Debug)]
struct InFlight {
    generation: Generation,
    page: usize,
    cancel: CancellationToken,
}

/// Drives cancelable, generation-guarded rendering of one page at a time.
///
/// Every [`render`](Self::render) call supersedes the previous one: its
/// token is cancelled and, should the worker still deliver its result, the
/// stale generation makes [`poll`](Self::poll) drop it without touching
/// the current raster.
pub struct PageRenderController {
    handle: DocumentHandle,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    generations: GenerationCounter,
    in_flight: Option<InFlight>,
    current: Option<RenderedPage>,
    page_errors: HashMap<usize, ViewerError>,
    worker: Option<JoinHandle<()>>,
}

impl PageRenderController {
    #[must_use]
    pub fn new(handle: DocumentHandle, cache_pages: usize) -> Self {
        let cache = Arc::new(Mutex::new(PageCache::new(cache_pages)));
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let document = Arc::clone(handle.document());
        let worker = std::thread::Builder::new()
            .name(format!("render-{}", handle.doc_id()))
            .spawn(move || render_worker(document, request_rx, response_tx, cache));
        let worker = match worker {
            Ok(join) => Some(join),
            Err(e) => {
                // Requests will queue up unanswered; surfaced as a failed render below.
                warn!("Failed to spawn render worker: {e}");
                None
            }
        };

        Self {
            handle,
            request_tx,
            response_rx,
            generations: GenerationCounter::new(),
            in_flight: None,
            current: None,
            page_errors: HashMap::new(),
            worker,
        }
    }

    /// Requests `page` at `zoom`/`rotation`. Pages outside the document are
    /// ignored and return `None`.
    pub fn render(&mut self, page: usize, zoom: f32, rotation: Rotation) -> Option<Generation> {
        let Some(size) = self.handle.page_size(page) else {
            debug!("Ignoring render request for page {page} (out of range)");
            return None;
        };

        let generation = self.generations.advance();
        if let Some(previous) = self.in_flight.take() {
            debug!(
                "Cancelling render of page {} (generation {})",
                previous.page,
                previous.generation.value()
            );
            previous.cancel.cancel();
        }

        let viewport = PageViewport::new(size, zoom, rotation);
        let cancel = CancellationToken::new();

        if self.worker.is_none() {
            self.page_errors.insert(
                page,
                ViewerError::Render {
                    page,
                    detail: "render worker unavailable".to_string(),
                },
            );
            return Some(generation);
        }

        let sent = self.request_tx.send(RenderRequest::Page {
            generation,
            page,
            viewport,
            cancel: cancel.clone(),
        });
        if sent.is_err() {
            warn!("Render worker stopped; page {page} not rendered");
            return Some(generation);
        }

        self.in_flight = Some(InFlight {
            generation,
            page,
            cancel,
        });
        Some(generation)
    }

    /// Drains finished renders without blocking
    pub fn poll(&mut self) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(event) = self.accept(response) {
                events.push(event);
            }
        }
        events
    }

    /// Blocks up to `timeout` for the next response, then drains the rest
    pub fn wait(&mut self, timeout: Duration) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                if let Some(event) = self.accept(response) {
                    events.push(event);
                }
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return events,
        }
        events.extend(self.poll());
        events
    }

    fn accept(&mut self, response: RenderResponse) -> Option<RenderEvent> {
        let generation = response.generation();
        if !self.generations.is_current(generation) {
            debug!(
                "Discarding stale render of page {} (generation {}, current {})",
                response.page(),
                generation.value(),
                self.generations.current().value()
            );
            return None;
        }
        self.in_flight = None;

        match response {
            RenderResponse::Rendered {
                generation,
                page,
                viewport,
                surface,
            } => {
                self.page_errors.remove(&page);
                self.current = Some(RenderedPage {
                    page,
                    generation,
                    viewport,
                    surface,
                });
                Some(RenderEvent::Rendered { page, generation })
            }
            RenderResponse::Cancelled { page, .. } => {
                debug!("Render of page {page} cancelled");
                None
            }
            RenderResponse::Failed { page, fault, .. } => {
                let error = ViewerError::from_render(page, &fault);
                self.page_errors.insert(page, error.clone());
                Some(RenderEvent::Failed { page, error })
            }
        }
    }

    pub fn current(&self) -> Option<&RenderedPage> {
        self.current.as_ref()
    }

    pub fn current_generation(&self) -> Generation {
        self.generations.current()
    }

    /// Page of the render still in flight
    #[must_use]
    pub fn pending_page(&self) -> Option<usize> {
        self.in_flight.as_ref().map(|f| f.page)
    }

    /// True while the latest request has not completed
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Last render error for `page`, cleared once it renders successfully
    pub fn page_error(&self, page: usize) -> Option<&ViewerError> {
        self.page_errors.get(&page)
    }

    /// Cancels outstanding work and stops the worker
    pub fn shutdown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
        let _ = self.request_tx.send(RenderRequest::Shutdown);
        // Detach: the worker may be blocked inside the collaborator.
        self.worker = None;
    }
}

impl Drop for PageRenderController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentDecoder, FixtureDecoder};

    const WAIT: Duration = Duration::from_secs(5);

    fn handle(pages: usize) -> DocumentHandle {
        let pages: Vec<_> = (0..pages)
            .map(|_| serde_json::json!({ "width": 100, "height": 200 }))
            .collect();
        let bytes = serde_json::to_vec(&serde_json::json!({ "pages": pages })).unwrap();
        DocumentHandle::new("doc", FixtureDecoder.decode(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn renders_requested_page() {
        let mut controller = PageRenderController::new(handle(3), 4);
        let generation = controller.render(2, 1.5, Rotation::Deg0).unwrap();

        let events = controller.wait(WAIT);
        assert_eq!(events, vec![RenderEvent::Rendered { page: 2, generation }]);

        let current = controller.current().unwrap();
        assert_eq!(current.page, 2);
        assert_eq!((current.surface.width, current.surface.height), (150, 300));
        assert!(!controller.is_busy());
    }

    #[test]
    fn out_of_range_page_is_a_no_op() {
        let mut controller = PageRenderController::new(handle(2), 4);
        assert_eq!(controller.render(0, 1.0, Rotation::Deg0), None);
        assert_eq!(controller.render(3, 1.0, Rotation::Deg0), None);
        assert!(!controller.is_busy());
        assert_eq!(controller.current_generation(), Generation::new(0));
    }

    #[test]
    fn rotation_swaps_raster_dimensions() {
        let mut controller = PageRenderController::new(handle(1), 4);
        controller.render(1, 1.0, Rotation::Deg90).unwrap();
        controller.wait(WAIT);
        let current = controller.current().unwrap();
        assert_eq!((current.surface.width, current.surface.height), (200, 100));
    }
}
