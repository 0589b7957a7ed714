//! Stock [`Source`](crate::Source) implementations.

mod array;
mod constant;
mod lazy;

pub use array::ArraySource;
pub use constant::ConstantSource;
pub use lazy::{LazySource, Producer};

use crate::error::SourceError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Open/closed flag shared by the stock sources.
#[derive(Debug, Default)]
struct Lifecycle {
    closed: AtomicBool,
}

impl Lifecycle {
    fn ensure_open(&self) -> Result<(), SourceError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SourceError::Closed)
        } else {
            Ok(())
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
