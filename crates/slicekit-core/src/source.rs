//! The source contract and the dirty-region signal consumers subscribe to.

use crate::error::SourceError;
use crate::request::Request;
use crate::slicing::Slicing;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A lazily evaluated spatial data provider.
///
/// Consumers ask for regions with [`request`](Self::request) and learn about
/// stale regions through [`dirty_signal`](Self::dirty_signal). Equality is
/// structural: two sources compare equal when they would produce identical
/// data for identical slicings.
///
/// Every operation is part of the contract. A type that cannot hand out
/// requests is not a source, even when it has equality and clean-up:
///
/// ```compile_fail,E0046
/// use ndarray::ArrayD;
/// use slicekit_core::{DirtySignal, ReadyRequest, Source};
///
/// struct Snapshot {
///     signal: DirtySignal,
/// }
///
/// impl PartialEq for Snapshot {
///     fn eq(&self, _: &Self) -> bool {
///         true
///     }
/// }
///
/// impl Source for Snapshot {
///     type Request = ReadyRequest<ArrayD<f32>>;
///
///     fn dirty_signal(&self) -> &DirtySignal {
///         &self.signal
///     }
///
///     fn clean_up(&self) {}
/// }
/// ```
///
/// Nor is one that cannot be marked dirty, since
/// [`set_dirty`](Self::set_dirty) emits on its [`DirtySignal`]:
///
/// ```compile_fail,E0046
/// use ndarray::ArrayD;
/// use slicekit_core::{ReadyRequest, Slicing, Source, SourceError};
///
/// #[derive(PartialEq)]
/// struct Zeros;
///
/// impl Source for Zeros {
///     type Request = ReadyRequest<ArrayD<f32>>;
///
///     fn request(&self, slicing: &Slicing) -> Result<Self::Request, SourceError> {
///         Ok(ReadyRequest::new(ArrayD::zeros(slicing.shape())))
///     }
///
///     fn clean_up(&self) {}
/// }
/// ```
///
/// Generic consumers only accept conforming types:
///
/// ```compile_fail,E0277
/// use slicekit_core::Source;
///
/// fn takes_source<S: Source>(_: &S) {}
///
/// #[derive(PartialEq)]
/// struct Volume;
///
/// impl Volume {
///     fn clean_up(&self) {}
/// }
///
/// takes_source(&Volume);
/// ```
pub trait Source: PartialEq + Send + Sync {
    /// Request type handed out for each region.
    type Request: Request;

    /// Ask for the data covered by `slicing`.
    fn request(&self, slicing: &Slicing) -> Result<Self::Request, SourceError>;

    /// Channel on which stale regions are announced.
    fn dirty_signal(&self) -> &DirtySignal;

    /// Mark `slicing` as stale so consumers drop anything cached for it.
    fn set_dirty(&self, slicing: &Slicing) {
        debug!(%slicing, listeners = self.dirty_signal().len(), "region dirty");
        self.dirty_signal().emit(slicing);
    }

    /// Release held resources. Later requests fail with
    /// [`SourceError::Closed`].
    fn clean_up(&self);
}

/// Listener invoked with each dirty region.
pub type DirtyListener = Arc<dyn Fn(&Slicing) + Send + Sync>;

/// Handle returned by [`DirtySignal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, DirtyListener)>,
}

/// Registry of dirty-region listeners.
///
/// Listeners are snapshotted before each emission, so a listener may
/// subscribe or unsubscribe while being called.
#[derive(Default)]
pub struct DirtySignal {
    listeners: Mutex<Listeners>,
}

impl DirtySignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Slicing) + Send + Sync + 'static,
    {
        let mut listeners = self.lock();
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry, _)| *entry != id);
        listeners.entries.len() != before
    }

    /// Call every listener with `slicing`.
    pub fn emit(&self, slicing: &Slicing) {
        let snapshot: Vec<DirtyListener> = self
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(slicing);
        }
    }

    /// Drop all listeners.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DirtySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtySignal")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_listeners() {
        let signal = DirtySignal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            signal.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        signal.emit(&Slicing::from_shape(&[2]));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listener_receives_region() {
        let signal = DirtySignal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        signal.subscribe(move |s| seen_cb.lock().expect("lock").push(s.clone()));
        let region: Slicing = [1..2, 3..4].into_iter().collect();
        signal.emit(&region);
        assert_eq!(*seen.lock().expect("lock"), vec![region]);
    }

    #[test]
    fn test_unsubscribe() {
        let signal = DirtySignal::new();
        let a = signal.subscribe(|_| {});
        let b = signal.subscribe(|_| {});
        assert_ne!(a, b);
        assert_eq!(signal.len(), 2);
        assert!(signal.unsubscribe(a));
        assert!(!signal.unsubscribe(a));
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let signal = Arc::new(DirtySignal::new());
        let id = Arc::new(Mutex::new(None));
        let (signal_cb, id_cb) = (Arc::clone(&signal), Arc::clone(&id));
        let sub = signal.subscribe(move |_| {
            if let Some(id) = *id_cb.lock().expect("lock") {
                signal_cb.unsubscribe(id);
            }
        });
        *id.lock().expect("lock") = Some(sub);
        signal.emit(&Slicing::default());
        assert!(signal.is_empty());
    }

    #[test]
    fn test_clear() {
        let signal = DirtySignal::new();
        signal.subscribe(|_| {});
        signal.clear();
        assert!(signal.is_empty());
        assert!(format!("{signal:?}").contains("listeners: 0"));
    }
}
