//! Observable collection wrapping.
//!
//! The host keeps its listening channels in an ordered collection the
//! interceptor does not own. To observe new listeners as they are bound, the
//! interceptor swaps the host's collection handle for a wrapper that behaves
//! identically for every read and write, and additionally reports each
//! append to a callback, including one replay at wrap time per element
//! already present. Unwrapping recovers the exact collection that was
//! wrapped, so uninjection can restore the host to its pre-inject state.
//!
//! The wrapper holds no element state of its own; it forwards everything to
//! the collection beneath it, so concurrent mutation is exactly as safe (or
//! unsafe) as it was before wrapping.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// The read/write contract shared by the host's channel storage and any
/// wrapper around it.
pub trait ChannelCollection<T>: Send + Sync {
    /// Append an element at the end.
    fn push(&self, item: T);

    /// Clone out the current contents, in order.
    fn snapshot(&self) -> Vec<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// For wrappers: the collection directly beneath. Base collections
    /// return `None`.
    fn unwrapped(&self) -> Option<SharedCollection<T>> {
        None
    }
}

/// Shared handle to a channel collection.
pub type SharedCollection<T> = Arc<dyn ChannelCollection<T>>;

/// Callback invoked once per appended element, on the appending thread.
pub type AppendCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Plain mutex-guarded vec storage; what a host typically holds before any
/// wrapping happens.
pub struct VecCollection<T> {
    items: Mutex<Vec<T>>,
}

impl<T> VecCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }
}

impl<T> Default for VecCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> ChannelCollection<T> for VecCollection<T> {
    fn push(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A collection wrapper that reports every append to a callback.
///
/// Created with [`ObservableCollection::wrap`], which replays all
/// pre-existing elements through the callback before returning. Wrapping may
/// be stacked; [`unwrap_original`](ObservableCollection::unwrap_original)
/// always recovers the innermost non-wrapper collection.
pub struct ObservableCollection<T> {
    original: SharedCollection<T>,
    on_append: AppendCallback<T>,
}

impl<T: Clone + Send + Sync + 'static> ObservableCollection<T> {
    /// Wrap `collection`, invoking `on_append` synchronously for every
    /// element already present (in order, exactly once each) and for every
    /// element appended afterwards.
    pub fn wrap<F>(collection: SharedCollection<T>, on_append: F) -> Arc<Self>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let on_append: AppendCallback<T> = Arc::new(on_append);

        // Elements appended before wrapping get the same notification a
        // live append would.
        let existing = collection.snapshot();
        debug!(existing = existing.len(), "Wrapping collection, replaying contents");
        for item in &existing {
            on_append(item);
        }

        Arc::new(Self {
            original: collection,
            on_append,
        })
    }

    /// The collection directly beneath this wrapper (possibly itself a
    /// wrapper).
    pub fn original(&self) -> SharedCollection<T> {
        self.original.clone()
    }

    /// Walk down to the innermost non-wrapper collection.
    pub fn unwrap_original(&self) -> SharedCollection<T> {
        unwrap_collection(self.original.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> ChannelCollection<T> for ObservableCollection<T> {
    fn push(&self, item: T) {
        // Forward first so observers see the element already present, same
        // as during replay.
        self.original.push(item.clone());
        (self.on_append)(&item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.original.snapshot()
    }

    fn len(&self) -> usize {
        self.original.len()
    }

    fn unwrapped(&self) -> Option<SharedCollection<T>> {
        Some(self.original.clone())
    }
}

/// Strip every wrapper layer off `collection`, returning the innermost
/// original. A non-wrapper collection is returned as-is.
pub fn unwrap_collection<T>(collection: SharedCollection<T>) -> SharedCollection<T> {
    let mut current = collection;
    while let Some(inner) = current.unwrapped() {
        current = inner;
    }
    current
}
