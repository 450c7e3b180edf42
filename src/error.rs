//! Error taxonomy surfaced by the viewer

use crate::document::{DecodeFault, PageFault, StoreFault};

/// Errors the viewer reports to its host.
///
/// `RenderCancelled` exists so the render pipeline can name what it swallows;
/// it is never handed to the host.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error("document {doc_id} could not be decoded: {detail}")]
    Decode { doc_id: String, detail: String },

    #[error("document {doc_id} was not found")]
    NotFound { doc_id: String },

    #[error("render cancelled")]
    RenderCancelled,

    #[error("page {page} failed to render: {detail}")]
    Render { page: usize, detail: String },

    #[error("text extraction failed on page {page}: {detail}")]
    SearchFailure { page: usize, detail: String },

    #[error("unsupported rotation {0} (expected 0, 90, 180 or 270)")]
    InvalidRotation(i32),
}

impl ViewerError {
    pub fn from_store(doc_id: &str, fault: StoreFault) -> Self {
        match fault {
            StoreFault::NotFound(_) => Self::NotFound {
                doc_id: doc_id.to_string(),
            },
            StoreFault::Io(e) => Self::Decode {
                doc_id: doc_id.to_string(),
                detail: format!("unreadable: {e}"),
            },
        }
    }

    pub fn from_decode(doc_id: &str, fault: &DecodeFault) -> Self {
        Self::Decode {
            doc_id: doc_id.to_string(),
            detail: fault.to_string(),
        }
    }

    /// Maps a render fault for `page`; a cancellation stays internal.
    pub fn from_render(page: usize, fault: &PageFault) -> Self {
        match fault {
            PageFault::Cancelled => Self::RenderCancelled,
            other => Self::Render {
                page,
                detail: other.to_string(),
            },
        }
    }

    pub fn from_extraction(page: usize, fault: &PageFault) -> Self {
        Self::SearchFailure {
            page,
            detail: fault.to_string(),
        }
    }

    /// True for errors that leave the viewer without a usable document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::NotFound { .. })
    }
}
