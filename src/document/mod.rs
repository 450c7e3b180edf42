//! Decode collaborator contract
//!
//! The viewer never parses document bytes itself. A [`DocumentStore`] hands
//! over raw bytes for an id, a [`DocumentDecoder`] turns them into a
//! [`DecodedDocument`], and everything downstream talks to that trait.

mod fixture;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::viewer::{CancellationToken, Matrix, PageViewport, Rotation};

pub use fixture::{
    DirectoryStore, FixtureDecoder, FixtureDocument, FixtureItem, FixturePage, MemoryStore,
};

/// Intrinsic page size at scale 1, in document units
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size as seen after rotating the page
    #[must_use]
    pub fn rotated(self, rotation: Rotation) -> Self {
        if rotation.is_quarter_turn() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }
}

/// A run of text reported by the decode collaborator.
///
/// `transform` places the run's baseline origin in document space; its
/// linear part carries the font size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub transform: Matrix,
    /// Advance width in document units, when the collaborator knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// 1-based page number
    pub page_number: usize,
    /// Position of this item within its page, in reading order
    pub item_index: usize,
}

/// RGBA raster produced by rendering a page
#[derive(Clone, PartialEq, Eq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    /// 4 bytes per pixel, row-major
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 4);
        for _ in 0..len {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(at..at + 4)
            .and_then(|px| px.try_into().ok())
    }
}

impl fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreFault {
    #[error("document {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFault {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("document has no pages")]
    Empty,
}

/// Page-scoped failure from the decode collaborator
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PageFault {
    #[error("operation cancelled")]
    Cancelled,

    #[error("page {0} is out of range")]
    OutOfRange(usize),

    #[error("{0}")]
    Backend(String),
}

/// Source of raw document bytes, keyed by document id
pub trait DocumentStore: Send + Sync {
    fn fetch(&self, doc_id: &str) -> Result<Vec<u8>, StoreFault>;
}

pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn DecodedDocument>, DecodeFault>;
}

/// A decoded multi-page document. Page numbers are 1-based.
pub trait DecodedDocument: Send + Sync {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Option<PageSize>;

    /// Materialises the text items of one page, in reading order
    fn text_items(&self, page: usize) -> Result<Vec<TextItem>, PageFault>;

    /// Draws one page at `viewport`. Implementations should check `cancel`
    /// at convenient points and bail out with [`PageFault::Cancelled`].
    fn render_page(
        &self,
        page: usize,
        viewport: &PageViewport,
        cancel: &CancellationToken,
    ) -> Result<RasterSurface, PageFault>;
}

/// A successfully decoded document owned by one viewer
#[derive(Clone)]
pub struct DocumentHandle {
    doc_id: String,
    page_sizes: Vec<PageSize>,
    document: Arc<dyn DecodedDocument>,
}

impl DocumentHandle {
    /// Captures page count and sizes once; a document without pages is
    /// rejected here.
    pub fn new(doc_id: &str, document: Arc<dyn DecodedDocument>) -> Result<Self, DecodeFault> {
        let count = document.page_count();
        if count == 0 {
            return Err(DecodeFault::Empty);
        }

        let mut page_sizes = Vec::with_capacity(count);
        for page in 1..=count {
            let size = document.page_size(page).ok_or_else(|| {
                DecodeFault::Malformed(format!("page {page} has no size"))
            })?;
            page_sizes.push(size);
        }

        Ok(Self {
            doc_id: doc_id.to_string(),
            page_sizes,
            document,
        })
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    pub fn page_size(&self, page: usize) -> Option<PageSize> {
        page.checked_sub(1).and_then(|i| self.page_sizes.get(i)).copied()
    }

    pub fn document(&self) -> &Arc<dyn DecodedDocument> {
        &self.document
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("doc_id", &self.doc_id)
            .field("page_count", &self.page_sizes.len())
            .finish_non_exhaustive()
    }
}
