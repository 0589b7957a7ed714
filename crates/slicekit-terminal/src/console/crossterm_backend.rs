//! Portable console backend built on crossterm commands.

use super::{BufferInfo, ConsoleApi, Coord, Stream};
use crate::attrs::Attributes;
use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    queue,
    style::{Print, SetBackgroundColor, SetForegroundColor},
};
use std::io::{self, Stderr, Stdout, Write};

/// Emulates the console API by writing crossterm commands.
///
/// ANSI terminals cannot be queried for the current colours, so the
/// attribute word of each stream is tracked here, starting from grey on
/// black. They also cannot recolour a cell without rewriting it:
/// [`fill_output_attribute`](ConsoleApi::fill_output_attribute) rewrites the
/// cells as blanks in the requested colours.
#[derive(Debug)]
pub struct CrosstermConsole<O: Write, E: Write> {
    out: O,
    err: E,
    attributes: [u16; 2],
    size: Option<Coord>,
}

impl CrosstermConsole<Stdout, Stderr> {
    /// Console on the process's standard output and error.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> CrosstermConsole<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            attributes: [Attributes::default().compose(); 2],
            size: None,
        }
    }

    /// Report a fixed buffer size instead of asking the terminal.
    #[must_use]
    pub fn with_size(mut self, size: Coord) -> Self {
        self.size = Some(size);
        self
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn writer(&mut self, stream: Stream) -> &mut dyn Write {
        match stream {
            Stream::Stdout => &mut self.out,
            Stream::Stderr => &mut self.err,
        }
    }

    fn queue_colors(mut w: &mut dyn Write, attributes: u16) -> io::Result<()> {
        let attrs = Attributes::decompose(attributes);
        queue!(
            &mut w,
            SetForegroundColor(attrs.fore.to_crossterm(attrs.style.is_bright())),
            SetBackgroundColor(attrs.back.to_crossterm(false))
        )
    }
}

impl<O: Write, E: Write> ConsoleApi for CrosstermConsole<O, E> {
    fn screen_buffer_info(&mut self, stream: Stream) -> io::Result<BufferInfo> {
        let size = match self.size {
            Some(size) => size,
            None => {
                let (columns, rows) = crossterm::terminal::size()?;
                Coord::new(columns, rows)
            }
        };
        Ok(BufferInfo {
            size,
            cursor: Coord::ORIGIN,
            attributes: self.attributes[stream.index()],
        })
    }

    fn set_text_attribute(&mut self, stream: Stream, attributes: u16) -> io::Result<()> {
        let w = self.writer(stream);
        Self::queue_colors(w, attributes)?;
        w.flush()?;
        self.attributes[stream.index()] = attributes;
        Ok(())
    }

    fn fill_output_character(
        &mut self,
        stream: Stream,
        ch: char,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        let mut w = self.writer(stream);
        let run: String = std::iter::repeat(ch).take(len as usize).collect();
        queue!(
            &mut w,
            SavePosition,
            MoveTo(origin.x, origin.y),
            Print(run),
            RestorePosition
        )?;
        w.flush()?;
        Ok(len)
    }

    fn fill_output_attribute(
        &mut self,
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        let current = self.attributes[stream.index()];
        let mut w = self.writer(stream);
        queue!(&mut w, SavePosition, MoveTo(origin.x, origin.y))?;
        Self::queue_colors(w, attributes)?;
        queue!(&mut w, Print(" ".repeat(len as usize)))?;
        Self::queue_colors(w, current)?;
        queue!(&mut w, RestorePosition)?;
        w.flush()?;
        Ok(len)
    }

    fn set_cursor_position(&mut self, stream: Stream, position: Coord) -> io::Result<()> {
        let mut w = self.writer(stream);
        queue!(&mut w, MoveTo(position.x, position.y))?;
        w.flush()
    }
}
