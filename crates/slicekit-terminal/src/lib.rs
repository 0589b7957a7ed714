//! Console colour attribute cache for slicekit.
//!
//! Windows consoles colour text through a packed attribute word rather than
//! escape sequences. [`WinTerm`] keeps the foreground, background and
//! brightness fields of that word in memory and pushes the composed word to a
//! [`ConsoleApi`] backend on every change.
//!
//! [`AnsiToConsole`] feeds ANSI-coloured text through the cache, so programs
//! that emit SGR sequences render correctly on consoles that only understand
//! attribute words.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use slicekit_terminal::{AnsiToConsole, RecordingConsole, Stream, WinColor, WinTerm};
//!
//! let term = WinTerm::new(RecordingConsole::default())?;
//! let mut out = AnsiToConsole::new(Vec::new(), term, Stream::Stdout);
//! write!(out, "\x1b[31mred\x1b[0m")?;
//!
//! let (text, term) = out.into_inner();
//! assert_eq!(text, b"red");
//! assert_eq!(term.attributes().fore, WinColor::Grey);
//! # Ok::<(), std::io::Error>(())
//! ```

mod ansi;
mod attrs;
pub mod console;
mod error;
mod winterm;

pub use ansi::AnsiToConsole;
pub use attrs::{Attributes, Brightness, WinColor};
pub use console::{
    BufferInfo, ConsoleApi, ConsoleCall, Coord, CrosstermConsole, RecordingConsole, Stream,
};
#[cfg(windows)]
pub use console::Win32Console;
pub use error::AttributeError;
pub use winterm::{AttributeDefaults, EraseMode, WinTerm};
