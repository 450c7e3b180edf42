//! Scoped global listeners
//!
//! The host owns the real event sources (window resize, pointer capture).
//! The viewer asks for them through a [`ListenerRegistry`] and holds a
//! [`ListenerGuard`] for as long as it needs them; dropping the guard
//! detaches everything it attached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerMove,
    PointerUp,
    WindowResize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub trait ListenerRegistry: Send + Sync {
    fn attach(&self, kind: ListenerKind) -> ListenerId;
    fn detach(&self, id: ListenerId);
}

/// Detaches its listeners on drop
pub struct ListenerGuard {
    registry: Arc<dyn ListenerRegistry>,
    attached: Vec<(ListenerId, ListenerKind)>,
}

impl ListenerGuard {
    #[must_use]
    pub fn attach(registry: &Arc<dyn ListenerRegistry>, kinds: &[ListenerKind]) -> Self {
        let attached = kinds
            .iter()
            .map(|&kind| (registry.attach(kind), kind))
            .collect();
        Self {
            registry: Arc::clone(registry),
            attached,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = ListenerKind> + '_ {
        self.attached.iter().map(|(_, kind)| *kind)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for (id, kind) in self.attached.drain(..) {
            debug!("Detaching {kind:?} listener");
            self.registry.detach(id);
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

/// In-process registry that only keeps track of what is attached.
///
/// Headless hosts use it as-is; interactive hosts can poll
/// [`is_attached`](Self::is_attached) to decide whether to forward events.
#[derive(Debug, Default)]
pub struct ListenerTable {
    next_id: AtomicU64,
    active: Mutex<HashMap<ListenerId, ListenerKind>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: ListenerKind) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn is_attached(&self, kind: ListenerKind) -> bool {
        self.count(kind) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl ListenerRegistry for ListenerTable {
    fn attach(&self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, kind);
        id
    }

    fn detach(&self, id: ListenerId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_detaches_on_drop() {
        let table = Arc::new(ListenerTable::new());
        let registry: Arc<dyn ListenerRegistry> = table.clone();

        let guard = ListenerGuard::attach(
            &registry,
            &[ListenerKind::PointerMove, ListenerKind::PointerUp],
        );
        assert!(table.is_attached(ListenerKind::PointerMove));
        assert!(table.is_attached(ListenerKind::PointerUp));
        assert!(!table.is_attached(ListenerKind::WindowResize));
        assert_eq!(guard.kinds().count(), 2);

        drop(guard);
        assert!(table.is_empty());
    }

    #[test]
    fn guards_are_independent() {
        let table = Arc::new(ListenerTable::new());
        let registry: Arc<dyn ListenerRegistry> = table.clone();

        let first = ListenerGuard::attach(&registry, &[ListenerKind::WindowResize]);
        let second = ListenerGuard::attach(&registry, &[ListenerKind::WindowResize]);
        assert_eq!(table.count(ListenerKind::WindowResize), 2);

        drop(first);
        assert_eq!(table.count(ListenerKind::WindowResize), 1);
        drop(second);
        assert!(table.is_empty());
    }
}
