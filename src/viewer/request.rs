//! Render request and response types

use std::sync::Arc;

use super::generation::{CancellationToken, Generation};
use super::geometry::PageViewport;
use crate::document::{PageFault, RasterSurface};

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Render one page
    Page {
        generation: Generation,
        page: usize,
        viewport: PageViewport,
        cancel: CancellationToken,
    },

    /// Stop the worker
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    Rendered {
        generation: Generation,
        page: usize,
        viewport: PageViewport,
        surface: Arc<RasterSurface>,
    },

    /// The request was cancelled before or while drawing
    Cancelled { generation: Generation, page: usize },

    Failed {
        generation: Generation,
        page: usize,
        fault: PageFault,
    },
}

impl RenderResponse {
    pub fn generation(&self) -> Generation {
        match self {
            Self::Rendered { generation, .. }
            | Self::Cancelled { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }

    pub fn page(&self) -> usize {
        match self {
            Self::Rendered { page, .. }
            | Self::Cancelled { page, .. }
            | Self::Failed { page, .. } => *page,
        }
    }
}
