//! Request and data-source contracts for slicekit volume viewers.
//!
//! Tile renderers and caches never talk to a concrete data provider. They
//! program against two traits:
//!
//! - [`Request`]: a pending or completed computation that can be waited on
//!   or observed through completion callbacks.
//! - [`Source`]: a lazily evaluated provider that hands out requests for a
//!   [`Slicing`] and announces stale regions through its [`DirtySignal`].
//!
//! Stock implementations cover the common providers: [`ArraySource`]
//! (in-memory volume), [`ConstantSource`] (synthetic fill) and
//! [`LazySource`] (computed on a worker thread). [`TileCache`] is the
//! reference consumer.
//!
//! # Example
//!
//! ```
//! use ndarray::ArrayD;
//! use slicekit_core::{ArraySource, Request, Slicing, Source};
//!
//! let source = ArraySource::new(ArrayD::zeros(vec![4, 4]));
//! let request = source.request(&Slicing::from_iter([0..2, 1..3]))?;
//! let tile = request.wait().expect("array requests are always ready");
//! assert_eq!(tile.shape(), &[2, 2]);
//! # Ok::<(), slicekit_core::SourceError>(())
//! ```

mod error;
mod request;
mod slicing;
mod source;
pub mod sources;
mod tile_cache;

pub use error::{RequestError, SourceError};
pub use request::{
    spawn_request, Callback, Metadata, PendingRequest, Promise, ReadyRequest, Request,
    RequestPool,
};
pub use slicing::{AxisRange, Slicing};
pub use source::{DirtyListener, DirtySignal, Source, SubscriptionId};
pub use sources::{ArraySource, ConstantSource, LazySource, Producer};
pub use tile_cache::{CacheStats, TileCache, TileCacheConfig, TileOf};
