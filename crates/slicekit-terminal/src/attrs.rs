//! The packed console attribute word.
//!
//! Layout (from wincon.h):
//!
//! ```text
//!  bit  7   6 5 4   3   2 1 0
//!      [-] [back ] [B] [fore ]
//! ```
//!
//! `B` is the foreground intensity bit. Bit 7 (background intensity) and
//! everything above it are not modelled and are dropped by [`Attributes`].

use crate::error::AttributeError;
use crossterm::style::Color as CrosstermColor;

/// The eight base console colours, in wincon.h order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum WinColor {
    #[default]
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Yellow = 6,
    Grey = 7,
}

impl WinColor {
    /// All colours by index.
    pub const ALL: [Self; 8] = [
        Self::Black,
        Self::Blue,
        Self::Green,
        Self::Cyan,
        Self::Red,
        Self::Magenta,
        Self::Yellow,
        Self::Grey,
    ];

    /// Colour for the low three bits of `bits`.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0x07) as usize]
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Equivalent crossterm colour. `bright` selects the intense variant.
    #[must_use]
    pub const fn to_crossterm(self, bright: bool) -> CrosstermColor {
        match (self, bright) {
            (Self::Black, false) => CrosstermColor::Black,
            (Self::Black, true) => CrosstermColor::DarkGrey,
            (Self::Blue, false) => CrosstermColor::DarkBlue,
            (Self::Blue, true) => CrosstermColor::Blue,
            (Self::Green, false) => CrosstermColor::DarkGreen,
            (Self::Green, true) => CrosstermColor::Green,
            (Self::Cyan, false) => CrosstermColor::DarkCyan,
            (Self::Cyan, true) => CrosstermColor::Cyan,
            (Self::Red, false) => CrosstermColor::DarkRed,
            (Self::Red, true) => CrosstermColor::Red,
            (Self::Magenta, false) => CrosstermColor::DarkMagenta,
            (Self::Magenta, true) => CrosstermColor::Magenta,
            (Self::Yellow, false) => CrosstermColor::DarkYellow,
            (Self::Yellow, true) => CrosstermColor::Yellow,
            (Self::Grey, false) => CrosstermColor::Grey,
            (Self::Grey, true) => CrosstermColor::White,
        }
    }
}

impl TryFrom<u8> for WinColor {
    type Error = AttributeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(AttributeError::InvalidColor(value))
    }
}

/// Foreground intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Brightness {
    /// Dim text, dim background.
    #[default]
    Normal,
    /// Bright text, dim background.
    Bright,
}

impl Brightness {
    /// The intensity bit.
    pub const BIT: u16 = 0x08;

    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        if bits & Self::BIT == 0 {
            Self::Normal
        } else {
            Self::Bright
        }
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        match self {
            Self::Normal => 0x00,
            Self::Bright => Self::BIT,
        }
    }

    #[must_use]
    pub const fn is_bright(self) -> bool {
        matches!(self, Self::Bright)
    }
}

impl TryFrom<u16> for Brightness {
    type Error = AttributeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Normal),
            Self::BIT => Ok(Self::Bright),
            other => Err(AttributeError::InvalidBrightness(other)),
        }
    }
}

/// A decomposed attribute word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub fore: WinColor,
    pub back: WinColor,
    pub style: Brightness,
}

impl Default for Attributes {
    /// Grey on black, the stock console colours.
    fn default() -> Self {
        Self::decompose(0x07)
    }
}

impl Attributes {
    /// Split a word into its fields. Bits 7 and up are discarded.
    #[must_use]
    pub const fn decompose(word: u16) -> Self {
        Self {
            fore: WinColor::from_bits(word),
            back: WinColor::from_bits(word >> 4),
            style: Brightness::from_bits(word),
        }
    }

    /// Pack the fields back into a word.
    #[must_use]
    pub const fn compose(self) -> u16 {
        self.fore.index() as u16 + self.back.index() as u16 * 16 + self.style.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decompose_fields() {
        let attrs = Attributes::decompose(0x4E);
        assert_eq!(attrs.fore, WinColor::Yellow);
        assert_eq!(attrs.back, WinColor::Red);
        assert_eq!(attrs.style, Brightness::Bright);
    }

    #[test]
    fn test_compose_fields() {
        let attrs = Attributes {
            fore: WinColor::Cyan,
            back: WinColor::Blue,
            style: Brightness::Normal,
        };
        assert_eq!(attrs.compose(), 0x13);
    }

    #[test]
    fn test_default_is_grey_on_black() {
        let attrs = Attributes::default();
        assert_eq!(attrs.fore, WinColor::Grey);
        assert_eq!(attrs.back, WinColor::Black);
        assert_eq!(attrs.compose(), 0x07);
    }

    #[test]
    fn test_high_bits_are_dropped() {
        // Background intensity and the LVB grid bits are not modelled.
        assert_eq!(Attributes::decompose(0x01CF).compose(), 0x4F);
    }

    #[test]
    fn test_color_try_from() {
        assert_eq!(WinColor::try_from(4_u8), Ok(WinColor::Red));
        assert_eq!(WinColor::try_from(8_u8), Err(AttributeError::InvalidColor(8)));
    }

    #[test]
    fn test_brightness_try_from() {
        assert_eq!(Brightness::try_from(0x08_u16), Ok(Brightness::Bright));
        assert_eq!(
            Brightness::try_from(0x01_u16),
            Err(AttributeError::InvalidBrightness(0x01))
        );
    }

    #[test]
    fn test_color_indices_match_palette_order() {
        for (i, color) in WinColor::ALL.iter().enumerate() {
            assert_eq!(usize::from(color.index()), i);
        }
    }

    #[test]
    fn test_crossterm_mapping() {
        assert_eq!(WinColor::Red.to_crossterm(false), CrosstermColor::DarkRed);
        assert_eq!(WinColor::Red.to_crossterm(true), CrosstermColor::Red);
        assert_eq!(WinColor::Grey.to_crossterm(true), CrosstermColor::White);
        assert_eq!(WinColor::Black.to_crossterm(true), CrosstermColor::DarkGrey);
    }

    proptest! {
        #[test]
        fn prop_compose_inverts_decompose(word in 0u16..128) {
            prop_assert_eq!(Attributes::decompose(word).compose(), word);
        }

        #[test]
        fn prop_decompose_masks(word in any::<u16>()) {
            let attrs = Attributes::decompose(word);
            prop_assert_eq!(u16::from(attrs.fore.index()), word & 7);
            prop_assert_eq!(u16::from(attrs.back.index()), (word >> 4) & 7);
            prop_assert_eq!(attrs.style.bits(), word & Brightness::BIT);
        }
    }
}
