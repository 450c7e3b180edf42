//! Viewport engine: rendering, search, highlighting and layout for one
//! decoded document

mod cache;
mod debounce;
mod generation;
mod geometry;
mod listeners;
mod loader;
mod navigation;
mod overlay;
mod render;
mod request;
mod search;
mod shell;
mod split;
mod state;
mod worker;
mod zoom;

pub use cache::{CacheKey, PageCache};
pub use debounce::Debouncer;
pub use generation::{CancellationToken, Generation, GenerationCounter};
pub use geometry::{Matrix, PageViewport, Rotation};
pub use listeners::{ListenerGuard, ListenerId, ListenerKind, ListenerRegistry, ListenerTable};
pub use loader::{DocumentLoader, LoadOutcome, load_document};
pub use navigation::{NavigationController, PanelRequest};
pub use overlay::{
    Highlight, HighlightMark, HighlightOverlay, OverlayInput, OverlayLayer, OverlaySpan,
    ProjectedBox, project,
};
pub use render::{PageRenderController, RenderEvent, RenderedPage};
pub use request::{RenderRequest, RenderResponse};
pub use search::{
    DocumentIndex, QueryMatcher, SNIPPET_MAX_CHARS, ScanProgress, SearchMatch, SearchScan,
};
pub use shell::{ResultRow, ViewerShell, ViewerStatus, ZoomRequest};
pub use split::{PaneSplit, ResizeOutcome, SplitPaneResizer};
pub use state::{Command, Effect, ResultsPanel, ViewerState};
pub use zoom::{FitParams, FitViewport, Zoom, compute_fit};
