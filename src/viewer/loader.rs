//! Background document loading
//!
//! Fetch and decode run on a short-lived thread per load. Only the result of
//! the most recent load is ever delivered; results of loads superseded by a
//! newer [`DocumentLoader::start`] are dropped.

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::generation::{Generation, GenerationCounter};
use crate::document::{DocumentDecoder, DocumentHandle, DocumentStore};
use crate::error::ViewerError;

#[derive(Debug)]
pub struct LoadOutcome {
    pub generation: Generation,
    pub doc_id: String,
    pub result: Result<DocumentHandle, ViewerError>,
}

/// Fetches and decodes one document
pub fn load_document(
    store: &dyn DocumentStore,
    decoder: &dyn DocumentDecoder,
    doc_id: &str,
) -> Result<DocumentHandle, ViewerError> {
    let bytes = store
        .fetch(doc_id)
        .map_err(|fault| ViewerError::from_store(doc_id, fault))?;
    let document = decoder
        .decode(&bytes)
        .map_err(|fault| ViewerError::from_decode(doc_id, &fault))?;
    DocumentHandle::new(doc_id, document).map_err(|fault| ViewerError::from_decode(doc_id, &fault))
}

pub struct DocumentLoader {
    store: Arc<dyn DocumentStore>,
    decoder: Arc<dyn DocumentDecoder>,
    generations: GenerationCounter,
    outcome_tx: Sender<LoadOutcome>,
    outcome_rx: Receiver<LoadOutcome>,
    pending: Option<Generation>,
}

impl DocumentLoader {
    pub fn new(store: Arc<dyn DocumentStore>, decoder: Arc<dyn DocumentDecoder>) -> Self {
        let (outcome_tx, outcome_rx) = flume::unbounded();
        Self {
            store,
            decoder,
            generations: GenerationCounter::new(),
            outcome_tx,
            outcome_rx,
            pending: None,
        }
    }

    /// Starts loading `doc_id`, superseding any load in progress
    pub fn start(&mut self, doc_id: &str) -> Generation {
        let generation = self.generations.advance();
        self.pending = Some(generation);
        info!("Loading document {doc_id}");

        let store = Arc::clone(&self.store);
        let decoder = Arc::clone(&self.decoder);
        let tx = self.outcome_tx.clone();
        let id = doc_id.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("load-{doc_id}"))
            .spawn(move || {
                let result = load_document(store.as_ref(), decoder.as_ref(), &id);
                let _ = tx.send(LoadOutcome {
                    generation,
                    doc_id: id,
                    result,
                });
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn loader thread: {e}");
            let _ = self.outcome_tx.send(LoadOutcome {
                generation,
                doc_id: doc_id.to_string(),
                result: Err(ViewerError::Decode {
                    doc_id: doc_id.to_string(),
                    detail: format!("loader unavailable: {e}"),
                }),
            });
        }
        generation
    }

    /// Abandons the pending load; its result will be dropped
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.generations.advance();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Result of the pending load, if it has finished
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if let Some(outcome) = self.accept(outcome) {
                return Some(outcome);
            }
        }
        None
    }

    /// Blocks up to `timeout` for the pending load to finish
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let deadline = std::time::Instant::now() + timeout;
        while self.pending.is_some() {
            let outcome = self.outcome_rx.recv_deadline(deadline).ok()?;
            if let Some(outcome) = self.accept(outcome) {
                return Some(outcome);
            }
        }
        None
    }

    fn accept(&mut self, outcome: LoadOutcome) -> Option<LoadOutcome> {
        if self.pending != Some(outcome.generation) {
            debug!(
                "Discarding stale load of {} (generation {})",
                outcome.doc_id,
                outcome.generation.value()
            );
            return None;
        }
        self.pending = None;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FixtureDecoder, MemoryStore};

    const WAIT: Duration = Duration::from_secs(5);

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert(
            "one",
            br#"{ "pages": [ { "width": 100, "height": 100 } ] }"#.to_vec(),
        );
        store.insert(
            "two",
            br#"{ "pages": [ { "width": 100, "height": 100 }, { "width": 50, "height": 50 } ] }"#
                .to_vec(),
        );
        store.insert("broken", b"not json".to_vec());
        Arc::new(store)
    }

    fn loader() -> DocumentLoader {
        DocumentLoader::new(store(), Arc::new(FixtureDecoder))
    }

    #[test]
    fn loads_document() {
        let mut loader = loader();
        let generation = loader.start("two");
        let outcome = loader.wait(WAIT).unwrap();
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.result.unwrap().page_count(), 2);
        assert!(!loader.is_loading());
    }

    #[test]
    fn distinguishes_missing_from_undecodable() {
        let mut loader = loader();
        loader.start("absent");
        assert!(matches!(
            loader.wait(WAIT).unwrap().result,
            Err(ViewerError::NotFound { .. })
        ));

        loader.start("broken");
        assert!(matches!(
            loader.wait(WAIT).unwrap().result,
            Err(ViewerError::Decode { .. })
        ));
    }

    #[test]
    fn newer_load_supersedes_older() {
        let mut loader = loader();
        loader.start("one");
        loader.start("two");
        let outcome = loader.wait(WAIT).unwrap();
        assert_eq!(outcome.doc_id, "two");
        assert!(loader.wait(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn cancelled_load_is_never_delivered() {
        let mut loader = loader();
        loader.start("one");
        loader.cancel();
        assert!(loader.wait(Duration::from_millis(100)).is_none());
        std::thread::sleep(Duration::from_millis(100));
        assert!(loader.poll().is_none());
    }
}
