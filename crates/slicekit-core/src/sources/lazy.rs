//! Source whose tiles are computed on demand by a worker pool.

use super::Lifecycle;
use crate::error::{RequestError, SourceError};
use crate::request::{PendingRequest, RequestPool};
use crate::slicing::Slicing;
use crate::source::{DirtySignal, Source};
use ndarray::ArrayD;
use std::fmt;
use std::sync::Arc;

/// Computes the data for one region.
pub type Producer = Arc<dyn Fn(&Slicing) -> Result<ArrayD<f32>, SourceError> + Send + Sync>;

/// Evaluates a [`Producer`] per request.
///
/// Producers run on the source's own [`RequestPool`], so at most
/// [`workers`](Self::workers) tiles are computed at once and further requests
/// queue. Two lazy sources are equal when they share the same producer and
/// shape.
pub struct LazySource {
    producer: Producer,
    shape: Vec<usize>,
    pool: RequestPool,
    signal: DirtySignal,
    lifecycle: Lifecycle,
}

impl LazySource {
    pub fn new<F>(shape: impl Into<Vec<usize>>, producer: F) -> Self
    where
        F: Fn(&Slicing) -> Result<ArrayD<f32>, SourceError> + Send + Sync + 'static,
    {
        Self::from_producer(shape, Arc::new(producer))
    }

    #[must_use]
    pub fn from_producer(shape: impl Into<Vec<usize>>, producer: Producer) -> Self {
        Self {
            producer,
            shape: shape.into(),
            pool: RequestPool::default(),
            signal: DirtySignal::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Replace the worker pool with one of at most `workers` threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = RequestPool::new(workers);
        self
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.pool.max_threads()
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl fmt::Debug for LazySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySource")
            .field("shape", &self.shape)
            .field("workers", &self.workers())
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

impl PartialEq for LazySource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.producer, &other.producer) && self.shape == other.shape
    }
}

impl Source for LazySource {
    type Request = PendingRequest<ArrayD<f32>>;

    fn request(&self, slicing: &Slicing) -> Result<Self::Request, SourceError> {
        self.lifecycle.ensure_open()?;
        slicing.check_fits(&self.shape)?;
        let producer = Arc::clone(&self.producer);
        let slicing = slicing.clone();
        Ok(self.pool.spawn(move || {
            let tile = producer(&slicing)?;
            let expected = slicing.shape();
            if tile.shape() == expected.as_slice() {
                Ok(tile)
            } else {
                Err(RequestError::Source(SourceError::ShapeMismatch {
                    expected,
                    actual: tile.shape().to_vec(),
                }))
            }
        }))
    }

    fn dirty_signal(&self) -> &DirtySignal {
        &self.signal
    }

    fn clean_up(&self) {
        self.lifecycle.close();
        self.signal.clear();
    }
}
