//! Render worker - runs in a dedicated thread

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::cache::{CacheKey, PageCache};
use super::generation::{CancellationToken, Generation};
use super::geometry::PageViewport;
use super::request::{RenderRequest, RenderResponse};
use crate::document::{DecodedDocument, PageFault};

/// Worker loop. Exits on [`RenderRequest::Shutdown`] or when every sender
/// has been dropped.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    document: Arc<dyn DecodedDocument>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    for request in requests {
        match request {
            RenderRequest::Page {
                generation,
                page,
                viewport,
                cancel,
            } => {
                let response = handle_page_request(
                    document.as_ref(),
                    generation,
                    page,
                    viewport,
                    &cancel,
                    &cache,
                );
                if responses.send(response).is_err() {
                    debug!("Render controller gone, stopping worker");
                    break;
                }
            }
            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    document: &dyn DecodedDocument,
    generation: Generation,
    page: usize,
    viewport: PageViewport,
    cancel: &CancellationToken,
    cache: &Arc<Mutex<PageCache>>,
) -> RenderResponse {
    if cancel.is_cancelled() {
        return RenderResponse::Cancelled { generation, page };
    }

    let key = CacheKey::new(page, &viewport);
    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(surface) = cached {
        return RenderResponse::Rendered {
            generation,
            page,
            viewport,
            surface,
        };
    }

    match document.render_page(page, &viewport, cancel) {
        Ok(surface) => {
            let surface = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, surface);
            RenderResponse::Rendered {
                generation,
                page,
                viewport,
                surface,
            }
        }
        Err(PageFault::Cancelled) => RenderResponse::Cancelled { generation, page },
        Err(fault) => {
            warn!("Page {page} render failed: {fault}");
            RenderResponse::Failed {
                generation,
                page,
                fault,
            }
        }
    }
}
