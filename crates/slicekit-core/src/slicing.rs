//! Multi-dimensional regions: one half-open range per axis.

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Half-open range `start..stop` along a single axis.
///
/// Always satisfies `start <= stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawAxisRange")]
pub struct AxisRange {
    start: usize,
    stop: usize,
}

/// Unchecked wire form of [`AxisRange`].
#[derive(Deserialize)]
struct RawAxisRange {
    start: usize,
    stop: usize,
}

impl TryFrom<RawAxisRange> for AxisRange {
    type Error = String;

    fn try_from(raw: RawAxisRange) -> Result<Self, Self::Error> {
        if raw.stop < raw.start {
            return Err(format!(
                "axis range start {} is after stop {}",
                raw.start, raw.stop
            ));
        }
        Ok(Self::new(raw.start, raw.stop))
    }
}

impl AxisRange {
    /// Create a range. A `stop` before `start` yields an empty range at `start`.
    #[must_use]
    pub const fn new(start: usize, stop: usize) -> Self {
        let stop = if stop < start { start } else { stop };
        Self { start, stop }
    }

    /// The whole axis `0..extent`.
    #[must_use]
    pub const fn full(extent: usize) -> Self {
        Self {
            start: 0,
            stop: extent,
        }
    }

    /// First index in the range.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last index in the range.
    #[must_use]
    pub const fn stop(&self) -> usize {
        self.stop
    }

    /// Number of indices covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.stop - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Whether the two ranges share at least one index. An empty range
    /// intersects nothing.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.stop
            && other.start < self.stop
    }

    /// Overlapping part of the two ranges.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        (stop > start).then_some(Self { start, stop })
    }

    /// Whether `other` lies entirely inside this range.
    #[must_use]
    pub const fn contains_range(&self, other: &Self) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    #[must_use]
    pub const fn as_range(&self) -> Range<usize> {
        self.start..self.stop
    }
}

impl From<Range<usize>> for AxisRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.stop)
    }
}

/// A rectangular region of an n-dimensional volume.
///
/// Slicings of different rank never intersect and never contain each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Slicing {
    axes: Vec<AxisRange>,
}

impl Slicing {
    #[must_use]
    pub fn new(axes: impl IntoIterator<Item = AxisRange>) -> Self {
        Self {
            axes: axes.into_iter().collect(),
        }
    }

    /// The full extent of a volume with the given shape.
    #[must_use]
    pub fn from_shape(shape: &[usize]) -> Self {
        Self::new(shape.iter().map(|&extent| AxisRange::full(extent)))
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    #[must_use]
    pub fn axes(&self) -> &[AxisRange] {
        &self.axes
    }

    /// Per-axis lengths.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(AxisRange::len).collect()
    }

    /// Number of cells covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.iter().map(AxisRange::len).product()
    }

    /// True when any axis is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.iter().any(AxisRange::is_empty)
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.ndim() == other.ndim()
            && self
                .axes
                .iter()
                .zip(&other.axes)
                .all(|(a, b)| a.intersects(b))
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.ndim() != other.ndim() {
            return None;
        }
        self.axes
            .iter()
            .zip(&other.axes)
            .map(|(a, b)| a.intersection(b))
            .collect::<Option<Vec<_>>>()
            .map(|axes| Self { axes })
    }

    /// Whether `other` lies entirely inside this slicing.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.ndim() == other.ndim()
            && self
                .axes
                .iter()
                .zip(&other.axes)
                .all(|(a, b)| a.contains_range(b))
    }

    /// Bounding hull of both slicings, or `None` if the ranks differ.
    #[must_use]
    pub fn union(&self, other: &Self) -> Option<Self> {
        (self.ndim() == other.ndim()).then(|| Self {
            axes: self
                .axes
                .iter()
                .zip(&other.axes)
                .map(|(a, b)| a.hull(b))
                .collect(),
        })
    }

    /// Check that this slicing addresses cells of a volume with `shape`.
    pub fn check_fits(&self, shape: &[usize]) -> Result<(), SourceError> {
        if self.ndim() != shape.len() {
            return Err(SourceError::RankMismatch {
                expected: shape.len(),
                actual: self.ndim(),
            });
        }
        for (axis, (range, &extent)) in self.axes.iter().zip(shape).enumerate() {
            if range.stop > extent {
                return Err(SourceError::OutOfBounds {
                    axis,
                    stop: range.stop,
                    extent,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<Range<usize>> for Slicing {
    fn from_iter<I: IntoIterator<Item = Range<usize>>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(AxisRange::from))
    }
}

impl FromIterator<AxisRange> for Slicing {
    fn from_iter<I: IntoIterator<Item = AxisRange>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Slicing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, axis) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{axis}")?;
        }
        write!(f, "]")
    }
}
