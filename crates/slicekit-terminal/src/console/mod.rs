//! The platform console surface the attribute cache drives.
//!
//! [`ConsoleApi`] mirrors the handful of Win32 console calls the cache needs.
//! Backends:
//!
//! - [`CrosstermConsole`]: emulates the calls with crossterm commands on any
//!   writer, so it works on every terminal.
//! - [`Win32Console`] (Windows only): the real console API.
//! - [`RecordingConsole`]: records calls instead of performing them.

mod crossterm_backend;
mod recording;
#[cfg(windows)]
mod win32;

pub use crossterm_backend::CrosstermConsole;
pub use recording::{ConsoleCall, RecordingConsole};
#[cfg(windows)]
pub use win32::Win32Console;

use std::io;

/// Output stream a console call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

impl Stream {
    /// `Stderr` when `on_stderr` is set, otherwise `Stdout`.
    #[must_use]
    pub const fn select(on_stderr: bool) -> Self {
        if on_stderr {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Stdout => 0,
            Self::Stderr => 1,
        }
    }
}

/// A character cell position or a buffer size, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
}

impl Coord {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Number of cells in a buffer of this size.
    #[must_use]
    pub const fn area(self) -> u32 {
        self.x as u32 * self.y as u32
    }
}

/// Screen buffer state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    /// Buffer dimensions (columns, rows).
    pub size: Coord,
    /// Cursor position.
    pub cursor: Coord,
    /// Current attribute word.
    pub attributes: u16,
}

/// Console operations used by [`WinTerm`](crate::WinTerm).
///
/// Errors are passed through to callers unchanged.
pub trait ConsoleApi {
    /// Read the buffer size, cursor and attribute word of `stream`.
    fn screen_buffer_info(&mut self, stream: Stream) -> io::Result<BufferInfo>;

    /// Set the attribute word used for subsequent output.
    fn set_text_attribute(&mut self, stream: Stream, attributes: u16) -> io::Result<()>;

    /// Write `ch` into `len` consecutive cells starting at `origin`.
    /// Returns the number of cells written.
    fn fill_output_character(
        &mut self,
        stream: Stream,
        ch: char,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32>;

    /// Set the attribute of `len` consecutive cells starting at `origin`.
    /// Returns the number of cells written.
    fn fill_output_attribute(
        &mut self,
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32>;

    /// Move the cursor.
    fn set_cursor_position(&mut self, stream: Stream, position: Coord) -> io::Result<()>;
}

impl<C: ConsoleApi + ?Sized> ConsoleApi for &mut C {
    fn screen_buffer_info(&mut self, stream: Stream) -> io::Result<BufferInfo> {
        (**self).screen_buffer_info(stream)
    }

    fn set_text_attribute(&mut self, stream: Stream, attributes: u16) -> io::Result<()> {
        (**self).set_text_attribute(stream, attributes)
    }

    fn fill_output_character(
        &mut self,
        stream: Stream,
        ch: char,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        (**self).fill_output_character(stream, ch, len, origin)
    }

    fn fill_output_attribute(
        &mut self,
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        (**self).fill_output_attribute(stream, attributes, len, origin)
    }

    fn set_cursor_position(&mut self, stream: Stream, position: Coord) -> io::Result<()> {
        (**self).set_cursor_position(stream, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_select() {
        assert_eq!(Stream::select(false), Stream::Stdout);
        assert_eq!(Stream::select(true), Stream::Stderr);
        assert_eq!(Stream::default(), Stream::Stdout);
    }

    #[test]
    fn test_coord_area() {
        assert_eq!(Coord::new(80, 25).area(), 2000);
        assert_eq!(Coord::ORIGIN.area(), 0);
        // No overflow at the largest console buffers.
        assert_eq!(Coord::new(u16::MAX, u16::MAX).area(), 65535 * 65535);
    }

    fn paint<C: ConsoleApi>(mut console: C) -> io::Result<()> {
        console.set_text_attribute(Stream::Stdout, 0x1F)
    }

    #[test]
    fn test_console_api_through_mut_ref() {
        let mut console = RecordingConsole::default();
        paint(&mut console).expect("recording never fails");
        assert_eq!(console.attributes(Stream::Stdout), 0x1F);
    }
}
