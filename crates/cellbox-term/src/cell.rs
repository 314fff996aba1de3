// SPDX-License-Identifier: MIT
//
// Cell: one character position on screen.
//
// A cell is a character plus two attribute words, one for the foreground
// and one for the background. Attributes are opaque to the buffer and the
// diff renderer: they only compare them. Backends give them meaning.
//
// Attribute layout (u16):
//
//   ┌─────────────┬──────────────────────────┐
//   │ 0x00FF      │ color: 0 = default,      │
//   │             │ 1..=8 = black..white     │
//   ├─────────────┼──────────────────────────┤
//   │ 0xFF00      │ style flags (bold,       │
//   │             │ underline, reverse)      │
//   └─────────────┴──────────────────────────┘
//
// Bold on the background word means blink on terminals that support it.

use std::ops::BitOr;

// ─── Style Flags ─────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Style bits of an [`Attribute`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Style: u16 {
        const BOLD      = 0x0100;
        const UNDERLINE = 0x0200;
        const REVERSE   = 0x0400;
    }
}

// ─── Attribute ───────────────────────────────────────────────────────────────

/// Foreground or background attribute: a color plus style flags.
///
/// Combine with `|`:
///
/// ```
/// use cellbox_term::cell::{Attribute, Style};
///
/// let attr = Attribute::RED | Attribute::BOLD;
/// assert_eq!(attr.color(), 2);
/// assert!(attr.style().contains(Style::BOLD));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Attribute(u16);

impl Attribute {
    pub const DEFAULT: Self = Self(0);
    pub const BLACK: Self = Self(1);
    pub const RED: Self = Self(2);
    pub const GREEN: Self = Self(3);
    pub const YELLOW: Self = Self(4);
    pub const BLUE: Self = Self(5);
    pub const MAGENTA: Self = Self(6);
    pub const CYAN: Self = Self(7);
    pub const WHITE: Self = Self(8);

    pub const BOLD: Self = Self(Style::BOLD.bits());
    pub const UNDERLINE: Self = Self(Style::UNDERLINE.bits());
    pub const REVERSE: Self = Self(Style::REVERSE.bits());

    /// Wrap a raw attribute word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Color index: 0 for the terminal default, 1..=8 for the ANSI colors.
    #[inline]
    #[must_use]
    pub const fn color(self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    #[inline]
    #[must_use]
    pub const fn style(self) -> Style {
        Style::from_bits_truncate(self.0)
    }
}

impl BitOr for Attribute {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Attribute(color={}, {:?})", self.color(), self.style())
    }
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A character with its foreground and background attributes.
///
/// Position is implicit: a cell's coordinates are its place in the
/// [`CellBuffer`](crate::buffer::CellBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub ch: char,
    pub fg: Attribute,
    pub bg: Attribute,
}

impl Cell {
    /// Space in default colors. Fresh and cleared buffers hold this.
    pub const EMPTY: Self = Self {
        ch: ' ',
        fg: Attribute::DEFAULT,
        bg: Attribute::DEFAULT,
    };

    #[inline]
    #[must_use]
    pub const fn new(ch: char, fg: Attribute, bg: Attribute) -> Self {
        Self { ch, fg, bg }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Attribute ─────────────────────────────────────────────────────

    #[test]
    fn default_attribute_is_zero() {
        assert_eq!(Attribute::default().bits(), 0);
        assert_eq!(Attribute::DEFAULT.color(), 0);
        assert!(Attribute::DEFAULT.style().is_empty());
    }

    #[test]
    fn colors_are_one_based() {
        assert_eq!(Attribute::BLACK.color(), 1);
        assert_eq!(Attribute::WHITE.color(), 8);
    }

    #[test]
    fn color_and_style_combine() {
        let attr = Attribute::CYAN | Attribute::UNDERLINE | Attribute::REVERSE;
        assert_eq!(attr.color(), 7);
        assert_eq!(attr.style(), Style::UNDERLINE | Style::REVERSE);
    }

    #[test]
    fn style_ignores_unknown_bits() {
        let attr = Attribute::from_bits(0x8000 | 0x0100 | 3);
        assert_eq!(attr.style(), Style::BOLD);
        assert_eq!(attr.color(), 3);
    }

    // ── Cell ──────────────────────────────────────────────────────────

    #[test]
    fn empty_cell_is_default_space() {
        assert_eq!(Cell::default(), Cell::EMPTY);
        assert_eq!(Cell::EMPTY.ch, ' ');
    }

    #[test]
    fn cells_compare_all_fields() {
        let a = Cell::new('x', Attribute::RED, Attribute::DEFAULT);
        assert_eq!(a, Cell::new('x', Attribute::RED, Attribute::DEFAULT));
        assert_ne!(a, Cell::new('y', Attribute::RED, Attribute::DEFAULT));
        assert_ne!(a, Cell::new('x', Attribute::GREEN, Attribute::DEFAULT));
        assert_ne!(a, Cell::new('x', Attribute::RED, Attribute::BLUE));
    }
}
