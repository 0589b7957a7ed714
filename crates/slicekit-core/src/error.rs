//! Error types for slicekit-core.

use thiserror::Error;

/// Errors raised by a [`Source`](crate::Source) when asked for a region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The slicing has a different number of axes than the source.
    #[error("Rank mismatch: expected {expected} axes, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// The slicing extends past the end of an axis.
    #[error("Out of bounds: axis {axis} stops at {stop} but extent is {extent}")]
    OutOfBounds {
        axis: usize,
        stop: usize,
        extent: usize,
    },

    /// Data written to (or produced for) a region has the wrong shape.
    #[error("Shape mismatch: region is {expected:?}, data is {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The source was cleaned up and no longer serves requests.
    #[error("Source has been cleaned up")]
    Closed,

    /// A producer callback reported a failure.
    #[error("Producer failed: {0}")]
    Producer(String),
}

/// Errors observed when waiting on a [`Request`](crate::Request).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The computation failed (including panics on a worker thread).
    #[error("Request failed: {0}")]
    Failed(String),

    /// The producing side went away without resolving the request.
    #[error("Request abandoned before completion")]
    Abandoned,

    /// `wait_timeout` expired before the request completed.
    #[error("Timed out waiting for request")]
    Timeout,

    /// The source rejected the region.
    #[error(transparent)]
    Source(#[from] SourceError),
}
