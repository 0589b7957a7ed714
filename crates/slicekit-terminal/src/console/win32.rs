//! The Win32 console API.
#![allow(unsafe_code)]

use super::{BufferInfo, ConsoleApi, Coord, Stream};
use std::io;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::Console::{
    FillConsoleOutputAttribute, FillConsoleOutputCharacterW, GetConsoleScreenBufferInfo,
    GetStdHandle, SetConsoleCursorPosition, SetConsoleTextAttribute, CONSOLE_CHARACTER_ATTRIBUTES,
    CONSOLE_SCREEN_BUFFER_INFO, COORD, STD_ERROR_HANDLE, STD_OUTPUT_HANDLE,
};

/// Console backed by the process's standard handles.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Console;

impl Win32Console {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn handle(stream: Stream) -> io::Result<HANDLE> {
        let id = match stream {
            Stream::Stdout => STD_OUTPUT_HANDLE,
            Stream::Stderr => STD_ERROR_HANDLE,
        };
        // SAFETY: GetStdHandle has no preconditions.
        Ok(unsafe { GetStdHandle(id) }?)
    }
}

fn to_coord(c: Coord) -> COORD {
    COORD {
        X: i16::try_from(c.x).unwrap_or(i16::MAX),
        Y: i16::try_from(c.y).unwrap_or(i16::MAX),
    }
}

fn from_coord(c: COORD) -> Coord {
    Coord::new(
        u16::try_from(c.X).unwrap_or(0),
        u16::try_from(c.Y).unwrap_or(0),
    )
}

impl ConsoleApi for Win32Console {
    fn screen_buffer_info(&mut self, stream: Stream) -> io::Result<BufferInfo> {
        let handle = Self::handle(stream)?;
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        // SAFETY: `info` is a valid, writable CONSOLE_SCREEN_BUFFER_INFO.
        unsafe { GetConsoleScreenBufferInfo(handle, &mut info) }?;
        Ok(BufferInfo {
            size: from_coord(info.dwSize),
            cursor: from_coord(info.dwCursorPosition),
            attributes: info.wAttributes.0,
        })
    }

    fn set_text_attribute(&mut self, stream: Stream, attributes: u16) -> io::Result<()> {
        let handle = Self::handle(stream)?;
        // SAFETY: plain value arguments.
        unsafe { SetConsoleTextAttribute(handle, CONSOLE_CHARACTER_ATTRIBUTES(attributes)) }?;
        Ok(())
    }

    fn fill_output_character(
        &mut self,
        stream: Stream,
        ch: char,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        let handle = Self::handle(stream)?;
        let mut units = [0_u16; 2];
        let unit = ch.encode_utf16(&mut units)[0];
        let mut written = 0_u32;
        // SAFETY: `written` outlives the call.
        unsafe { FillConsoleOutputCharacterW(handle, unit, len, to_coord(origin), &mut written) }?;
        Ok(written)
    }

    fn fill_output_attribute(
        &mut self,
        stream: Stream,
        attributes: u16,
        len: u32,
        origin: Coord,
    ) -> io::Result<u32> {
        let handle = Self::handle(stream)?;
        let mut written = 0_u32;
        // SAFETY: `written` outlives the call.
        unsafe {
            FillConsoleOutputAttribute(handle, attributes, len, to_coord(origin), &mut written)
        }?;
        Ok(written)
    }

    fn set_cursor_position(&mut self, stream: Stream, position: Coord) -> io::Result<()> {
        let handle = Self::handle(stream)?;
        // SAFETY: plain value arguments.
        unsafe { SetConsoleCursorPosition(handle, to_coord(position)) }?;
        Ok(())
    }
}
