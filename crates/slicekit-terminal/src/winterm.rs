//! In-memory mirror of the console attribute word.

use crate::attrs::{Attributes, Brightness, WinColor};
use crate::console::{ConsoleApi, Coord, Stream};
use std::io;
use tracing::trace;

/// Attribute values restored by the `None` forms of the setters and by
/// [`WinTerm::reset_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDefaults {
    /// The raw word the fields were decomposed from.
    pub word: u16,
    pub fore: WinColor,
    pub back: WinColor,
    pub style: Brightness,
}

impl Default for AttributeDefaults {
    fn default() -> Self {
        Self::from_word(0x07)
    }
}

impl AttributeDefaults {
    #[must_use]
    pub const fn from_word(word: u16) -> Self {
        let attrs = Attributes::decompose(word);
        Self {
            word,
            fore: attrs.fore,
            back: attrs.back,
            style: attrs.style,
        }
    }

    /// Read the current attributes of standard output.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn capture<C: ConsoleApi + ?Sized>(console: &mut C) -> io::Result<Self> {
        let info = console.screen_buffer_info(Stream::Stdout)?;
        Ok(Self::from_word(info.attributes))
    }

    #[must_use]
    pub const fn attributes(&self) -> Attributes {
        Attributes {
            fore: self.fore,
            back: self.back,
            style: self.style,
        }
    }
}

/// Erase mode of `ESC [ n J`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EraseMode {
    /// Cursor to end of screen.
    #[default]
    ToEnd,
    /// Start of screen to cursor.
    ToStart,
    /// Entire screen.
    All,
}

impl EraseMode {
    /// Mode for an ANSI erase parameter. Unknown codes have no mode.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::ToEnd),
            1 => Some(Self::ToStart),
            2 => Some(Self::All),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::ToEnd => 0,
            Self::ToStart => 1,
            Self::All => 2,
        }
    }
}

/// Console colour state cache.
///
/// Holds the foreground, background and brightness fields of the attribute
/// word. Every setter updates the cache and then applies the full composed
/// word with a single [`ConsoleApi::set_text_attribute`] call.
///
/// # Example
///
/// ```
/// use slicekit_terminal::{RecordingConsole, Stream, WinColor, WinTerm};
///
/// let mut term = WinTerm::new(RecordingConsole::default())?;
/// term.set_foreground(Some(WinColor::Red), Stream::Stdout)?;
/// assert_eq!(term.attrs(), 0x04);
/// term.set_foreground(None, Stream::Stdout)?;
/// assert_eq!(term.attrs(), 0x07);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct WinTerm<C: ConsoleApi> {
    console: C,
    defaults: AttributeDefaults,
    current: Attributes,
}

impl<C: ConsoleApi> WinTerm<C> {
    /// Capture the console's current standard-output attributes as defaults.
    ///
    /// Reads buffer info once; writes nothing.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn new(mut console: C) -> io::Result<Self> {
        let defaults = AttributeDefaults::capture(&mut console)?;
        trace!(word = defaults.word, "captured console defaults");
        Ok(Self::with_defaults(console, defaults))
    }

    /// Use explicit defaults instead of querying the console.
    pub fn with_defaults(console: C, defaults: AttributeDefaults) -> Self {
        Self {
            console,
            current: defaults.attributes(),
            defaults,
        }
    }

    pub const fn defaults(&self) -> &AttributeDefaults {
        &self.defaults
    }

    pub const fn attributes(&self) -> Attributes {
        self.current
    }

    /// The composed attribute word.
    pub const fn attrs(&self) -> u16 {
        self.current.compose()
    }

    /// Replace all fields from `word`. No platform call.
    pub fn set_attrs(&mut self, word: u16) {
        self.current = Attributes::decompose(word);
    }

    pub const fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Restore every field to its default and apply the default word.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn reset_all(&mut self, stream: Stream) -> io::Result<()> {
        self.current = self.defaults.attributes();
        self.set_console(Some(self.defaults.word), stream)
    }

    /// Set the foreground colour, or restore the default for `None`.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn set_foreground(&mut self, color: Option<WinColor>, stream: Stream) -> io::Result<()> {
        self.current.fore = color.unwrap_or(self.defaults.fore);
        self.set_console(None, stream)
    }

    /// Set the background colour, or restore the default for `None`.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn set_background(&mut self, color: Option<WinColor>, stream: Stream) -> io::Result<()> {
        self.current.back = color.unwrap_or(self.defaults.back);
        self.set_console(None, stream)
    }

    /// Set the brightness, or restore the default for `None`.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn set_brightness(&mut self, style: Option<Brightness>, stream: Stream) -> io::Result<()> {
        self.current.style = style.unwrap_or(self.defaults.style);
        self.set_console(None, stream)
    }

    /// Apply `word`, or the composed word for `None`, to `stream`.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn set_console(&mut self, word: Option<u16>, stream: Stream) -> io::Result<()> {
        let word = word.unwrap_or_else(|| self.attrs());
        trace!(word, ?stream, "set text attribute");
        self.console.set_text_attribute(stream, word)
    }

    /// Move the cursor. `None` leaves it where it is.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn set_cursor_position(
        &mut self,
        position: Option<Coord>,
        stream: Stream,
    ) -> io::Result<()> {
        match position {
            Some(position) => {
                trace!(x = position.x, y = position.y, ?stream, "set cursor position");
                self.console.set_cursor_position(stream, position)
            }
            None => Ok(()),
        }
    }

    /// Clear the screen.
    ///
    /// Only [`EraseMode::All`] is supported: the whole buffer is filled with
    /// blanks in the current attributes and the cursor moves home. Other
    /// modes do nothing.
    ///
    /// # Errors
    ///
    /// Returns the console's error unchanged.
    pub fn clear_region(&mut self, mode: EraseMode, stream: Stream) -> io::Result<()> {
        if mode != EraseMode::All {
            trace!(mode = mode.code(), "ignoring unsupported erase mode");
            return Ok(());
        }
        let info = self.console.screen_buffer_info(stream)?;
        let cells = info.size.area();
        trace!(cells, ?stream, "clear screen");
        self.console
            .fill_output_character(stream, ' ', cells, Coord::ORIGIN)?;
        self.console
            .fill_output_attribute(stream, self.attrs(), cells, Coord::ORIGIN)?;
        self.console.set_cursor_position(stream, Coord::ORIGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{ConsoleCall, RecordingConsole};

    fn term(word: u16) -> WinTerm<RecordingConsole> {
        WinTerm::new(RecordingConsole::new(word, Coord::new(80, 25))).expect("recording")
    }

    #[test]
    fn test_new_only_reads() {
        let term = term(0x1E);
        assert_eq!(
            term.console().calls(),
            &[ConsoleCall::ScreenBufferInfo {
                stream: Stream::Stdout
            }]
        );
        assert_eq!(term.attrs(), 0x1E);
        assert_eq!(term.defaults().word, 0x1E);
    }

    #[test]
    fn test_new_propagates_failure() {
        let console = RecordingConsole::default().failing_with(io::ErrorKind::Other);
        let err = WinTerm::new(console).expect_err("injected");
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_setter_applies_composed_word() {
        let mut term = term(0x07);
        term.console_mut().take_calls();
        term.set_background(Some(WinColor::Blue), Stream::Stderr)
            .expect("ok");
        assert_eq!(
            term.console().calls(),
            &[ConsoleCall::SetTextAttribute {
                stream: Stream::Stderr,
                attributes: 0x17
            }]
        );
    }

    #[test]
    fn test_brightness_none_restores_default() {
        let mut term = term(0x0F);
        term.set_brightness(Some(Brightness::Normal), Stream::Stdout)
            .expect("ok");
        assert_eq!(term.attrs(), 0x07);
        term.set_brightness(None, Stream::Stdout).expect("ok");
        assert_eq!(term.attrs(), 0x0F);
    }

    #[test]
    fn test_set_attrs_makes_no_call() {
        let mut term = term(0x07);
        term.console_mut().take_calls();
        term.set_attrs(0x5A);
        assert_eq!(term.attrs(), 0x5A);
        assert!(term.console().calls().is_empty());
    }

    #[test]
    fn test_set_console_explicit_word() {
        let mut term = term(0x07);
        term.set_console(Some(0x70), Stream::Stdout).expect("ok");
        // Cache is untouched by an explicit word.
        assert_eq!(term.attrs(), 0x07);
        assert_eq!(term.console().attributes(Stream::Stdout), 0x70);
    }

    #[test]
    fn test_reset_all_uses_raw_default_word() {
        // Bit 7 survives a reset even though the cache drops it.
        let mut term = term(0x8C);
        term.set_foreground(Some(WinColor::Green), Stream::Stdout)
            .expect("ok");
        term.reset_all(Stream::Stdout).expect("ok");
        assert_eq!(term.console().attributes(Stream::Stdout), 0x8C);
        assert_eq!(term.attrs(), 0x0C);
    }

    #[test]
    fn test_cursor_none_is_noop() {
        let mut term = term(0x07);
        term.console_mut().take_calls();
        term.set_cursor_position(None, Stream::Stdout).expect("ok");
        assert!(term.console().calls().is_empty());
        term.set_cursor_position(Some(Coord::new(5, 2)), Stream::Stdout)
            .expect("ok");
        assert_eq!(term.console().cursor(Stream::Stdout), Coord::new(5, 2));
    }

    #[test]
    fn test_erase_mode_codes() {
        assert_eq!(EraseMode::from_code(2), Some(EraseMode::All));
        assert_eq!(EraseMode::from_code(3), None);
        assert_eq!(EraseMode::ToStart.code(), 1);
        assert_eq!(EraseMode::default(), EraseMode::ToEnd);
    }

    #[test]
    fn test_defaults_config() {
        let defaults = AttributeDefaults::default();
        assert_eq!(defaults.fore, WinColor::Grey);
        assert_eq!(defaults.attributes(), Attributes::default());
        let term = WinTerm::with_defaults(RecordingConsole::default(), defaults);
        assert!(term.console().calls().is_empty());
    }
}
