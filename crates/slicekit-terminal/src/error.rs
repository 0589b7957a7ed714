//! Error types for slicekit-terminal.
//!
//! Console operations return `std::io::Result` untouched; these errors only
//! cover converting raw numbers into attribute types.

use thiserror::Error;

/// A raw value does not name a valid attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// Colour index outside `0..=7`.
    #[error("Invalid colour index: {0} (expected 0-7)")]
    InvalidColor(u8),

    /// Brightness bits other than `0x00` or `0x08`.
    #[error("Invalid brightness bits: {0:#04x}")]
    InvalidBrightness(u16),
}
