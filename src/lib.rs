// Export modules for use in tests and by host applications
pub mod document;
pub mod error;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the host-facing surface
pub use document::{DocumentDecoder, DocumentHandle, DocumentStore};
pub use error::ViewerError;
pub use viewer::{PanelRequest, ViewerShell, ViewerStatus, ZoomRequest};
