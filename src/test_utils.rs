//! Scriptable decode collaborator for tests
//!
//! [`TestDocument`] lets a test hold a page's render open until it says so,
//! make individual pages fail, and count how often the viewer reached into
//! the collaborator.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::document::{
    DecodeFault, DecodedDocument, DocumentDecoder, DocumentHandle, PageFault, PageSize,
    RasterSurface, TextItem,
};
use crate::viewer::{CancellationToken, Matrix, PageViewport};

const GATE_POLL: Duration = Duration::from_millis(5);
const FONT_SIZE: f32 = 12.0;
const LINE_GAP: f32 = 16.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

struct TestPage {
    size: PageSize,
    lines: Vec<String>,
}

/// Event log shared with the test body
#[derive(Default)]
struct Activity {
    started: Mutex<Vec<usize>>,
    started_changed: Condvar,
    saw_cancel: Mutex<HashSet<usize>>,
}

#[derive(Default)]
pub struct TestDocument {
    pages: Vec<TestPage>,
    gates: Mutex<HashMap<usize, Arc<Gate>>>,
    failing_renders: Mutex<HashSet<usize>>,
    failing_text: Mutex<HashSet<usize>>,
    ignore_cancel: AtomicBool,
    render_calls: AtomicUsize,
    text_calls: AtomicUsize,
    activity: Activity,
}

impl TestDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page whose text runs are laid out one per line from the top
    #[must_use]
    pub fn page(mut self, width: f32, height: f32, lines: &[&str]) -> Self {
        self.pages.push(TestPage {
            size: PageSize::new(width, height),
            lines: lines.iter().map(|s| (*s).to_string()).collect(),
        });
        self
    }

    /// `count` blank US-letter pages
    #[must_use]
    pub fn blank_pages(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.page(612.0, 792.0, &[]);
        }
        self
    }

    /// Renders of `page` block until [`open_gate`](Self::open_gate)
    pub fn gate(&self, page: usize) {
        lock(&self.gates).insert(page, Arc::new(Gate::default()));
    }

    pub fn open_gate(&self, page: usize) {
        if let Some(gate) = lock(&self.gates).get(&page) {
            *lock(&gate.open) = true;
            gate.changed.notify_all();
        }
    }

    /// Gated renders keep going after cancellation and deliver a raster
    pub fn ignore_cancellation(&self) {
        self.ignore_cancel.store(true, Ordering::SeqCst);
    }

    pub fn fail_render(&self, page: usize, fail: bool) {
        let mut failing = lock(&self.failing_renders);
        if fail {
            failing.insert(page);
        } else {
            failing.remove(&page);
        }
    }

    pub fn fail_text(&self, page: usize) {
        lock(&self.failing_text).insert(page);
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    /// Blocks until a render of `page` has started, up to `timeout`
    pub fn wait_started(&self, page: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = lock(&self.activity.started);
        while !started.contains(&page) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            started = self
                .activity
                .started_changed
                .wait_timeout(started, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Whether a render of `page` observed its cancellation token set
    pub fn saw_cancel(&self, page: usize) -> bool {
        lock(&self.activity.saw_cancel).contains(&page)
    }

    pub fn handle(self: &Arc<Self>, doc_id: &str) -> DocumentHandle {
        let document: Arc<dyn DecodedDocument> = Arc::clone(self) as Arc<dyn DecodedDocument>;
        match DocumentHandle::new(doc_id, document) {
            Ok(handle) => handle,
            Err(e) => panic!("test document rejected: {e}"),
        }
    }

    fn get(&self, page: usize) -> Result<&TestPage, PageFault> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(PageFault::OutOfRange(page))
    }

    /// Waits on the gate for `page`, if any. Returns false when the render
    /// should bail out as cancelled.
    fn pass_gate(&self, page: usize, cancel: &CancellationToken) -> bool {
        let Some(gate) = lock(&self.gates).get(&page).cloned() else {
            return true;
        };
        let mut open = lock(&gate.open);
        while !*open {
            if cancel.is_cancelled() {
                lock(&self.activity.saw_cancel).insert(page);
                if !self.ignore_cancel.load(Ordering::SeqCst) {
                    return false;
                }
            }
            open = gate
                .changed
                .wait_timeout(open, GATE_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl DecodedDocument for TestDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Option<PageSize> {
        self.get(page).ok().map(|p| p.size)
    }

    fn text_items(&self, page: usize) -> Result<Vec<TextItem>, PageFault> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let test_page = self.get(page)?;
        if lock(&self.failing_text).contains(&page) {
            return Err(PageFault::Backend(format!("no text layer on page {page}")));
        }

        Ok(test_page
            .lines
            .iter()
            .enumerate()
            .map(|(item_index, text)| {
                let baseline = test_page.size.height - LINE_GAP * (item_index as f32 + 1.0);
                TextItem {
                    text: text.clone(),
                    transform: Matrix::new(FONT_SIZE, 0.0, 0.0, FONT_SIZE, 36.0, baseline),
                    width: Some(text.chars().count() as f32 * FONT_SIZE * 0.5),
                    page_number: page,
                    item_index,
                }
            })
            .collect())
    }

    fn render_page(
        &self,
        page: usize,
        viewport: &PageViewport,
        cancel: &CancellationToken,
    ) -> Result<RasterSurface, PageFault> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        self.get(page)?;
        lock(&self.activity.started).push(page);
        self.activity.started_changed.notify_all();

        if !self.pass_gate(page, cancel) {
            return Err(PageFault::Cancelled);
        }
        if lock(&self.failing_renders).contains(&page) {
            return Err(PageFault::Backend(format!("page {page} is damaged")));
        }

        let width = viewport.width.ceil().max(1.0) as u32;
        let height = viewport.height.ceil().max(1.0) as u32;
        // Shade encodes the page number so tests can tell rasters apart.
        let shade = (page % 256) as u8;
        Ok(RasterSurface::filled(width, height, [shade, shade, shade, 0xFF]))
    }
}

/// Hands out the same [`TestDocument`] for any bytes
pub struct TestDecoder {
    document: Arc<TestDocument>,
}

impl TestDecoder {
    pub fn new(document: Arc<TestDocument>) -> Self {
        Self { document }
    }
}

impl DocumentDecoder for TestDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn DecodedDocument>, DecodeFault> {
        if bytes.is_empty() {
            return Err(DecodeFault::Malformed("empty payload".to_string()));
        }
        Ok(Arc::clone(&self.document) as Arc<dyn DecodedDocument>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::Rotation;

    #[test]
    fn lines_become_ordered_text_items() {
        let doc = TestDocument::new().page(200.0, 100.0, &["first", "second"]);
        let items = doc.text_items(1).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].item_index, 1);
        assert!(items[0].transform.f > items[1].transform.f);
        assert_eq!(doc.text_calls(), 1);
    }

    #[test]
    fn gate_holds_render_until_cancelled() {
        let doc = Arc::new(TestDocument::new().blank_pages(2));
        doc.gate(1);
        let token = CancellationToken::new();

        let worker_doc = Arc::clone(&doc);
        let worker_token = token.clone();
        let join = std::thread::spawn(move || {
            let viewport = PageViewport::new(PageSize::new(612.0, 792.0), 1.0, Rotation::Deg0);
            worker_doc.render_page(1, &viewport, &worker_token)
        });

        assert!(doc.wait_started(1, Duration::from_secs(5)));
        token.cancel();
        assert_eq!(join.join().unwrap(), Err(PageFault::Cancelled));
        assert!(doc.saw_cancel(1));
    }
}
