//! JSON fixture backend for the decode collaborator
//!
//! Used by the CLI and the test-suite. A fixture is a JSON object with a list
//! of pages, each carrying its size and positioned text runs:
//!
//! ```json
//! { "pages": [ { "width": 612, "height": 792,
//!                "items": [ { "text": "Revenue", "transform": [12,0,0,12,72,700], "width": 48 } ] } ] }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    DecodeFault, DecodedDocument, DocumentDecoder, DocumentStore, PageFault, PageSize,
    RasterSurface, StoreFault, TextItem,
};
use crate::viewer::{CancellationToken, Matrix, PageViewport, project};

const PAPER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const INK: [u8; 4] = [0x30, 0x30, 0x30, 0xFF];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureItem {
    pub text: String,
    pub transform: [f32; 6],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixturePage {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub items: Vec<FixtureItem>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FixtureDocument {
    pub pages: Vec<FixturePage>,
}

impl FixtureDocument {
    fn page(&self, page: usize) -> Result<&FixturePage, PageFault> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(PageFault::OutOfRange(page))
    }
}

impl DecodedDocument for FixtureDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Option<PageSize> {
        self.page(page)
            .ok()
            .map(|p| PageSize::new(p.width, p.height))
    }

    fn text_items(&self, page: usize) -> Result<Vec<TextItem>, PageFault> {
        let fixture = self.page(page)?;
        Ok(fixture
            .items
            .iter()
            .enumerate()
            .map(|(item_index, item)| TextItem {
                text: item.text.clone(),
                transform: Matrix::from(item.transform),
                width: item.width,
                page_number: page,
                item_index,
            })
            .collect())
    }

    fn render_page(
        &self,
        page: usize,
        viewport: &PageViewport,
        cancel: &CancellationToken,
    ) -> Result<RasterSurface, PageFault> {
        let width = viewport.width.ceil().max(1.0) as u32;
        let height = viewport.height.ceil().max(1.0) as u32;
        let mut surface = RasterSurface::filled(width, height, PAPER);

        for item in self.text_items(page)? {
            if cancel.is_cancelled() {
                return Err(PageFault::Cancelled);
            }
            let bbox = project(&item, viewport);
            let Some(run) = bbox.width else { continue };
            // Only axis-aligned runs are shaded; rotated ones stay blank.
            if bbox.angle.abs() > f32::EPSILON {
                continue;
            }
            shade(&mut surface, bbox.left, bbox.top, run, bbox.font_height);
        }

        Ok(surface)
    }
}

fn shade(surface: &mut RasterSurface, left: f32, top: f32, width: f32, height: f32) {
    let x0 = left.max(0.0) as u32;
    let y0 = top.max(0.0) as u32;
    let x1 = ((left + width).max(0.0) as u32).min(surface.width);
    let y1 = ((top + height).max(0.0) as u32).min(surface.height);

    for y in y0..y1 {
        for x in x0..x1 {
            let at = (y as usize * surface.width as usize + x as usize) * 4;
            surface.pixels[at..at + 4].copy_from_slice(&INK);
        }
    }
}

/// Decodes JSON fixtures into [`FixtureDocument`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct FixtureDecoder;

impl DocumentDecoder for FixtureDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn DecodedDocument>, DecodeFault> {
        let doc: FixtureDocument =
            serde_json::from_slice(bytes).map_err(|e| DecodeFault::Malformed(e.to_string()))?;
        if doc.pages.is_empty() {
            return Err(DecodeFault::Empty);
        }
        if let Some(bad) = doc
            .pages
            .iter()
            .position(|p| !(p.width > 0.0 && p.height > 0.0))
        {
            return Err(DecodeFault::Malformed(format!(
                "page {} has a non-positive size",
                bad + 1
            )));
        }
        debug!("Decoded fixture with {} pages", doc.pages.len());
        Ok(Arc::new(doc))
    }
}

/// Reads `<root>/<doc_id>.json`
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, doc_id: &str) -> Option<PathBuf> {
        let valid = !doc_id.is_empty()
            && !doc_id.contains(['/', '\\'])
            && !doc_id.contains("..");
        valid.then(|| self.root.join(format!("{doc_id}.json")))
    }
}

impl DocumentStore for DirectoryStore {
    fn fetch(&self, doc_id: &str) -> Result<Vec<u8>, StoreFault> {
        let path = self
            .path_for(doc_id)
            .ok_or_else(|| StoreFault::NotFound(doc_id.to_string()))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreFault::NotFound(doc_id.to_string()))
            }
            Err(e) => Err(StoreFault::Io(e)),
        }
    }
}

/// In-memory byte store
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc_id: impl Into<String>, bytes: Vec<u8>) {
        self.docs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(doc_id.into(), bytes);
    }
}

impl DocumentStore for MemoryStore {
    fn fetch(&self, doc_id: &str) -> Result<Vec<u8>, StoreFault> {
        self.docs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(doc_id)
            .cloned()
            .ok_or_else(|| StoreFault::NotFound(doc_id.to_string()))
    }
}
