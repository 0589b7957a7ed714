//! In-memory volume source.

use super::Lifecycle;
use crate::error::SourceError;
use crate::request::ReadyRequest;
use crate::slicing::Slicing;
use crate::source::{DirtySignal, Source};
use ndarray::{ArrayD, ArrayViewD, Slice};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
struct Inner {
    data: RwLock<ArrayD<f32>>,
    signal: DirtySignal,
    lifecycle: Lifecycle,
}

/// A source backed by an `ndarray` volume held in memory.
///
/// Clones share the same storage and compare equal; two separately
/// constructed sources never do, even with identical contents, because
/// writes to one are not visible through the other.
#[derive(Debug, Clone)]
pub struct ArraySource {
    inner: Arc<Inner>,
}

impl ArraySource {
    #[must_use]
    pub fn new(data: ArrayD<f32>) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(data),
                signal: DirtySignal::new(),
                lifecycle: Lifecycle::default(),
            }),
        }
    }

    /// Shape of the whole volume.
    pub fn shape(&self) -> Vec<usize> {
        self.inner
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .shape()
            .to_vec()
    }

    /// Overwrite `slicing` with `values` and mark the region dirty.
    pub fn write(&self, slicing: &Slicing, values: ArrayViewD<'_, f32>) -> Result<(), SourceError> {
        self.inner.lifecycle.ensure_open()?;
        {
            let mut data = self
                .inner
                .data
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            slicing.check_fits(data.shape())?;
            if values.shape() != slicing.shape().as_slice() {
                return Err(SourceError::ShapeMismatch {
                    expected: slicing.shape(),
                    actual: values.shape().to_vec(),
                });
            }
            let axes = slicing.axes();
            data.slice_each_axis_mut(|ax| Slice::from(axes[ax.axis.index()].as_range()))
                .assign(&values);
        }
        self.set_dirty(slicing);
        Ok(())
    }
}

impl PartialEq for ArraySource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Source for ArraySource {
    type Request = ReadyRequest<ArrayD<f32>>;

    fn request(&self, slicing: &Slicing) -> Result<Self::Request, SourceError> {
        self.inner.lifecycle.ensure_open()?;
        let data = self
            .inner
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        slicing.check_fits(data.shape())?;
        let axes = slicing.axes();
        let tile = data
            .slice_each_axis(|ax| Slice::from(axes[ax.axis.index()].as_range()))
            .to_owned();
        Ok(ReadyRequest::new(tile))
    }

    fn dirty_signal(&self) -> &DirtySignal {
        &self.inner.signal
    }

    fn clean_up(&self) {
        self.inner.lifecycle.close();
        self.inner.signal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use ndarray::{Array, IxDyn};
    use std::sync::Mutex;

    fn ramp(shape: &[usize]) -> ArrayD<f32> {
        let n: usize = shape.iter().product();
        Array::from_iter((0..n).map(|v| v as f32))
            .into_shape(IxDyn(shape))
            .expect("shape matches length")
    }

    #[test]
    fn test_request_returns_sub_array() {
        let source = ArraySource::new(ramp(&[3, 4]));
        let tile = source
            .request(&[1..3, 2..4].into_iter().collect())
            .expect("in bounds")
            .wait()
            .expect("ready");
        assert_eq!(tile.shape(), &[2, 2]);
        assert_eq!(tile.iter().copied().collect::<Vec<_>>(), vec![6.0, 7.0, 10.0, 11.0]);
    }

    #[test]
    fn test_request_out_of_bounds() {
        let source = ArraySource::new(ramp(&[3, 4]));
        let err = source
            .request(&[0..3, 0..5].into_iter().collect())
            .expect_err("axis 1 too long");
        assert_eq!(
            err,
            SourceError::OutOfBounds {
                axis: 1,
                stop: 5,
                extent: 4
            }
        );
    }

    #[test]
    fn test_request_rank_mismatch() {
        let source = ArraySource::new(ramp(&[3, 4]));
        let err = source
            .request(&Slicing::from_shape(&[3]))
            .expect_err("wrong rank");
        assert!(matches!(err, SourceError::RankMismatch { .. }));
    }

    #[test]
    fn test_write_updates_data_and_emits_dirty() {
        let source = ArraySource::new(ArrayD::zeros(IxDyn(&[4, 4])));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        source
            .dirty_signal()
            .subscribe(move |s| seen_cb.lock().expect("lock").push(s.clone()));

        let region: Slicing = [0..2, 0..2].into_iter().collect();
        source
            .write(&region, ArrayD::from_elem(IxDyn(&[2, 2]), 9.0).view())
            .expect("write fits");

        let whole = source
            .request(&Slicing::from_shape(&[4, 4]))
            .expect("in bounds")
            .wait()
            .expect("ready");
        assert_eq!(whole.sum(), 36.0);
        assert_eq!(*seen.lock().expect("lock"), vec![region]);
    }

    #[test]
    fn test_write_shape_mismatch() {
        let source = ArraySource::new(ArrayD::zeros(IxDyn(&[4, 4])));
        let err = source
            .write(
                &[0..2, 0..2].into_iter().collect(),
                ArrayD::zeros(IxDyn(&[3, 2])).view(),
            )
            .expect_err("shape differs");
        assert!(matches!(err, SourceError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_equality_is_shared_storage() {
        let a = ArraySource::new(ramp(&[2]));
        let b = a.clone();
        let c = ArraySource::new(ramp(&[2]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_clean_up_closes_source() {
        let source = ArraySource::new(ramp(&[2]));
        source.dirty_signal().subscribe(|_| {});
        source.clean_up();
        assert!(source.dirty_signal().is_empty());
        assert_eq!(
            source.request(&Slicing::from_shape(&[2])).expect_err("closed"),
            SourceError::Closed
        );
    }
}
