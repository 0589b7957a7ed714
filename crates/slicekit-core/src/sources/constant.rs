//! Synthetic source that fills every request with one value.

use super::Lifecycle;
use crate::error::SourceError;
use crate::request::ReadyRequest;
use crate::slicing::Slicing;
use crate::source::{DirtySignal, Source};
use ndarray::{ArrayD, IxDyn};
use std::sync::{PoisonError, RwLock};

/// Produces constant-valued arrays over a volume of fixed shape.
#[derive(Debug)]
pub struct ConstantSource {
    value: RwLock<f32>,
    shape: Vec<usize>,
    signal: DirtySignal,
    lifecycle: Lifecycle,
}

impl ConstantSource {
    #[must_use]
    pub fn new(value: f32, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            value: RwLock::new(value),
            shape: shape.into(),
            signal: DirtySignal::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn constant(&self) -> f32 {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the fill value; the whole volume becomes dirty.
    pub fn set_constant(&self, value: f32) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        self.set_dirty(&Slicing::from_shape(&self.shape));
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl PartialEq for ConstantSource {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.constant() == other.constant()
    }
}

impl Source for ConstantSource {
    type Request = ReadyRequest<ArrayD<f32>>;

    fn request(&self, slicing: &Slicing) -> Result<Self::Request, SourceError> {
        self.lifecycle.ensure_open()?;
        slicing.check_fits(&self.shape)?;
        Ok(ReadyRequest::new(ArrayD::from_elem(
            IxDyn(&slicing.shape()),
            self.constant(),
        )))
    }

    fn dirty_signal(&self) -> &DirtySignal {
        &self.signal
    }

    fn clean_up(&self) {
        self.lifecycle.close();
        self.signal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_request_fills_shape() {
        let source = ConstantSource::new(2.5, [10, 10, 3]);
        let tile = source
            .request(&[0..4, 5..6, 0..3].into_iter().collect())
            .expect("in bounds")
            .wait()
            .expect("ready");
        assert_eq!(tile.shape(), &[4, 1, 3]);
        assert!(tile.iter().all(|&v| v == 2.5));
    }

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(ConstantSource::new(1.0, [4]), ConstantSource::new(1.0, [4]));
        assert_ne!(ConstantSource::new(1.0, [4]), ConstantSource::new(2.0, [4]));
        assert_ne!(ConstantSource::new(1.0, [4]), ConstantSource::new(1.0, [5]));
    }

    #[test]
    fn test_set_constant_dirties_everything() {
        let source = ConstantSource::new(0.0, [2, 2]);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        source.dirty_signal().subscribe(move |s| {
            assert_eq!(*s, Slicing::from_shape(&[2, 2]));
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });
        source.set_constant(4.0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(source.constant(), 4.0);
    }

    #[test]
    fn test_closed_source_rejects() {
        let source = ConstantSource::new(0.0, [2]);
        source.clean_up();
        assert_eq!(
            source.request(&Slicing::from_shape(&[2])).expect_err("closed"),
            SourceError::Closed
        );
    }
}
