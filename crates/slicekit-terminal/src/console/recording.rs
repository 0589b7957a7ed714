//! A console that records calls instead of performing them.

use super::{BufferInfo, ConsoleApi, Coord, Stream};
use std::io;

/// One call made against a [`RecordingConsole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCall {
    ScreenBufferInfo {
        stream: Stream,
    },
    SetTextAttribute {
        stream: Stream,
        attributes: u16,
    },
    FillOutputCharacter {
        stream: Stream,
        ch: char,
        len: u32,
        origin: Coord,
    },
    FillOutputAttribute {
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    },
    SetCursorPosition {
        stream: Stream,
        position: Coord,
    },
}

/// In-memory console for tests and dry runs.
///
/// Keeps per-stream attribute and cursor state so the effects of a call
/// sequence can be inspected, and optionally fails every call.
#[derive(Debug, Clone)]
pub struct RecordingConsole {
    calls: Vec<ConsoleCall>,
    size: Coord,
    attributes: [u16; 2],
    cursor: [Coord; 2],
    failure: Option<io::ErrorKind>,
}

impl Default for RecordingConsole {
    /// An 80x25 grey-on-black console.
    fn default() -> Self {
        Self::new(0x07, Coord::new(80, 25))
    }
}

impl RecordingConsole {
    /// Console whose streams start with `attributes` and a buffer of `size`.
    #[must_use]
    pub const fn new(attributes: u16, size: Coord) -> Self {
        Self {
            calls: Vec::new(),
            size,
            attributes: [attributes; 2],
            cursor: [Coord::ORIGIN; 2],
            failure: None,
        }
    }

    /// Make every subsequent call fail with `kind` (after being recorded).
    #[must_use]
    pub fn failing_with(mut self, kind: io::ErrorKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn calls(&self) -> &[ConsoleCall] {
        &self.calls
    }

    /// Return and forget the recorded calls.
    pub fn take_calls(&mut self) -> Vec<ConsoleCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn attributes(&self, stream: Stream) -> u16 {
        self.attributes[stream.index()]
    }

    pub fn cursor(&self, stream: Stream) -> Coord {
        self.cursor[stream.index()]
    }

    fn record(&mut self, call: ConsoleCall) -> io::Result<()> {
        self.calls.push(call);
        match self.failure {
            Some(kind) => Err(io::Error::new(kind, "injected console failure")),
            None => Ok(()),
        }
    }
}

impl ConsoleApi for RecordingConsole {
    fn screen_buffer_info(&mut self, stream: Stream) -> io::Result<BufferInfo> {
        self.record(ConsoleCall::ScreenBufferInfo { stream })?;
        Ok(BufferInfo {
            size: self.size,
            cursor: self.cursor(stream),
            attributes: self.attributes(stream),
        })
    }

    fn set_text_attribute(&mut self, stream: Stream, attributes: u16) -> io::Result<()> {
        self.record(ConsoleCall::SetTextAttribute { stream, attributes })?;
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
        self.record(ConsoleCall::FillOutputCharacter {
            stream,
            ch,
            len,
            origin,
        })?;
        Ok(len)
    }

    fn fill_output_attribute(
        &mut self,
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        self.record(ConsoleCall::FillOutputAttribute {
            stream,
            attributes,
            len,
            origin,
        })?;
        Ok(len)
    }

    fn set_cursor_position(&mut self, stream: Stream, position: Coord) -> io::Result<()> {
        self.record(ConsoleCall::SetCursorPosition { stream, position })?;
        self.cursor[stream.index()] = position;
        Ok(())
    }
}
