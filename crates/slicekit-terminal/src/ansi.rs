//! ANSI escape sequences to console calls.
//!
//! [`AnsiToConsole`] sits between a producer of ANSI-coloured text and a
//! console that only understands attribute words. Plain bytes go to the
//! inner writer; recognised CSI sequences become [`WinTerm`] calls.

use crate::attrs::{Attributes, Brightness, WinColor};
use crate::console::{ConsoleApi, Coord, Stream};
use crate::winterm::{EraseMode, WinTerm};
use std::io::{self, Write};
use tracing::trace;

const ESC: u8 = 0x1B;

/// Longest parameter string kept for one sequence. Longer ones are dropped.
const MAX_PARAMS: usize = 64;

/// ANSI colour order (SGR 30-37 / 40-47) in the console palette.
const ANSI_COLORS: [WinColor; 8] = [
    WinColor::Black,
    WinColor::Red,
    WinColor::Green,
    WinColor::Yellow,
    WinColor::Blue,
    WinColor::Magenta,
    WinColor::Cyan,
    WinColor::Grey,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
}

/// `io::Write` adapter translating ANSI colour, erase and cursor sequences.
///
/// Handled sequences:
///
/// | sequence | effect |
/// |---|---|
/// | `ESC[0m` | reset all attributes |
/// | `ESC[1m` / `ESC[2m`, `ESC[22m` | bright / normal |
/// | `ESC[30m`..`ESC[37m`, `ESC[39m` | foreground, default foreground |
/// | `ESC[40m`..`ESC[47m`, `ESC[49m` | background, default background |
/// | `ESC[90m`..`ESC[97m` | bright foreground |
/// | `ESC[nJ` | clear (only `n = 2` does anything) |
/// | `ESC[r;cH`, `ESC[r;cf` | move cursor (1-based) |
///
/// Every other CSI sequence is swallowed. Other escapes pass through.
#[derive(Debug)]
pub struct AnsiToConsole<W: Write, C: ConsoleApi> {
    inner: W,
    term: WinTerm<C>,
    stream: Stream,
    state: State,
    params: Vec<u8>,
}

impl<W: Write, C: ConsoleApi> AnsiToConsole<W, C> {
    /// Translate text written to `inner`, applying colours to `stream`.
    pub fn new(inner: W, term: WinTerm<C>, stream: Stream) -> Self {
        Self {
            inner,
            term,
            stream,
            state: State::Ground,
            params: Vec::new(),
        }
    }

    pub const fn term(&self) -> &WinTerm<C> {
        &self.term
    }

    pub fn term_mut(&mut self) -> &mut WinTerm<C> {
        &mut self.term
    }

    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer and the attribute cache. A partial escape sequence
    /// still buffered is discarded.
    pub fn into_inner(self) -> (W, WinTerm<C>) {
        (self.inner, self.term)
    }

    fn dispatch(&mut self, final_byte: u8, raw: &[u8]) -> io::Result<()> {
        let Some(params) = parse_params(raw) else {
            trace!(final_byte, "dropping malformed CSI sequence");
            return Ok(());
        };
        match final_byte {
            b'm' | b'J' | b'H' | b'f' => self.inner.flush()?,
            _ => {
                trace!(final_byte, "ignoring CSI sequence");
                return Ok(());
            }
        }
        match final_byte {
            b'm' if params.is_empty() => self.select_graphic(0),
            b'm' => params.iter().try_for_each(|&code| self.select_graphic(code)),
            b'J' => match EraseMode::from_code(params.first().copied().unwrap_or(0)) {
                Some(mode) => self.term.clear_region(mode, self.stream),
                None => Ok(()),
            },
            _ => {
                let row = params.first().copied().unwrap_or(1).saturating_sub(1);
                let col = params.get(1).copied().unwrap_or(1).saturating_sub(1);
                self.term
                    .set_cursor_position(Some(Coord::new(col, row)), self.stream)
            }
        }
    }

    fn select_graphic(&mut self, code: u16) -> io::Result<()> {
        let stream = self.stream;
        match code {
            0 => self.term.reset_all(stream),
            1 => self.term.set_brightness(Some(Brightness::Bright), stream),
            2 | 22 => self.term.set_brightness(Some(Brightness::Normal), stream),
            30..=37 => self.term.set_foreground(Some(ansi_color(code - 30)), stream),
            39 => self.term.set_foreground(None, stream),
            40..=47 => self.term.set_background(Some(ansi_color(code - 40)), stream),
            49 => self.term.set_background(None, stream),
            90..=97 => {
                let attrs = Attributes {
                    fore: ansi_color(code - 90),
                    style: Brightness::Bright,
                    ..self.term.attributes()
                };
                self.term.set_attrs(attrs.compose());
                self.term.set_console(None, stream)
            }
            _ => Ok(()),
        }
    }
}

fn ansi_color(offset: u16) -> WinColor {
    ANSI_COLORS[usize::from(offset & 0x07)]
}

/// Split `a;b;c` into numbers. Empty fields are 0. `None` if any field is
/// not a decimal `u16`.
fn parse_params(raw: &[u8]) -> Option<Vec<u16>> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            if field.is_empty() {
                Some(0)
            } else {
                std::str::from_utf8(field).ok()?.parse().ok()
            }
        })
        .collect()
}

impl<W: Write, C: ConsoleApi> AnsiToConsole<W, C> {
    /// Process `buf`. On failure, also returns how many leading bytes were
    /// fully handled; the parser state matches that prefix.
    fn translate(&mut self, buf: &[u8]) -> Result<(), (usize, io::Error)> {
        let mut text_start = 0;
        for (i, &byte) in buf.iter().enumerate() {
            match self.state {
                State::Ground => {
                    if byte == ESC {
                        self.inner
                            .write_all(&buf[text_start..i])
                            .map_err(|err| (text_start, err))?;
                        self.state = State::Escape;
                        text_start = i + 1;
                    }
                }
                State::Escape => {
                    if byte == b'[' {
                        self.params.clear();
                        self.state = State::Csi;
                    } else {
                        self.inner
                            .write_all(&[ESC, byte])
                            .map_err(|err| (i, err))?;
                        self.state = State::Ground;
                    }
                    text_start = i + 1;
                }
                State::Csi => {
                    if (0x40..=0x7E).contains(&byte) {
                        let params = std::mem::take(&mut self.params);
                        self.state = State::Ground;
                        if let Err(err) = self.dispatch(byte, &params) {
                            // Leave the sequence pending so a retry replays it.
                            self.state = State::Csi;
                            self.params = params;
                            return Err((i, err));
                        }
                    } else if self.params.len() < MAX_PARAMS {
                        self.params.push(byte);
                    } else {
                        trace!("dropping overlong CSI sequence");
                        self.params.clear();
                        self.state = State::Ground;
                    }
                    text_start = i + 1;
                }
            }
        }
        if self.state == State::Ground {
            self.inner
                .write_all(&buf[text_start..])
                .map_err(|err| (text_start, err))?;
        }
        Ok(())
    }
}

impl<W: Write, C: ConsoleApi> Write for AnsiToConsole<W, C> {
    /// A failure after some bytes were handled reports that count; the
    /// error comes back on the next call.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.translate(buf) {
            Ok(()) => Ok(buf.len()),
            Err((0, err)) => Err(err),
            Err((consumed, err)) => {
                trace!(consumed, error = %err, "short write");
                Ok(consumed)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
