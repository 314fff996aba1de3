// SPDX-License-Identifier: MIT
//
// Input events and input modes.

use std::io;
use std::sync::Arc;

pub use cellbox_caps::Key;

// ─── Modifiers ───────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Modifier flags on a key or rune event.
    ///
    /// Only Alt can be observed on a byte stream, and only as an ESC prefix
    /// in [`InputMode::Alt`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const ALT = 1 << 0;
    }
}

// ─── InputMode ───────────────────────────────────────────────────────────────

/// How an ESC byte that starts no known key sequence is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// The ESC is the Escape key.
    #[default]
    Esc,
    /// The ESC marks the next event as Alt-modified.
    Alt,
    /// Leave the mode unchanged; only query it.
    Current,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// One input event, delivered once by [`Session::poll`](crate::Session::poll).
#[derive(Debug, Clone)]
pub enum Event {
    /// A functional or control key.
    Key { key: Key, mods: Modifiers },
    /// A printable character.
    Rune { ch: char, mods: Modifiers },
    /// The terminal now measures `width` × `height` cells.
    Resize { width: u16, height: u16 },
    /// Reading the terminal failed. The caller decides whether to go on.
    Error(Arc<io::Error>),
}

impl Event {
    /// A key event without modifiers.
    #[inline]
    #[must_use]
    pub const fn key(key: Key) -> Self {
        Self::Key {
            key,
            mods: Modifiers::empty(),
        }
    }

    /// A rune event without modifiers.
    #[inline]
    #[must_use]
    pub const fn rune(ch: char) -> Self {
        Self::Rune {
            ch,
            mods: Modifiers::empty(),
        }
    }

    /// The same event with `mods` added (no-op for resize and error).
    #[must_use]
    pub fn with_mods(self, extra: Modifiers) -> Self {
        match self {
            Self::Key { key, mods } => Self::Key {
                key,
                mods: mods | extra,
            },
            Self::Rune { ch, mods } => Self::Rune {
                ch,
                mods: mods | extra,
            },
            other => other,
        }
    }
}

impl From<io::Error> for Event {
    fn from(err: io::Error) -> Self {
        Self::Error(Arc::new(err))
    }
}

// Errors compare by kind; io::Error itself has no equality.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Key { key: a, mods: am }, Self::Key { key: b, mods: bm }) => a == b && am == bm,
            (Self::Rune { ch: a, mods: am }, Self::Rune { ch: b, mods: bm }) => a == b && am == bm,
            (
                Self::Resize {
                    width: aw,
                    height: ah,
                },
                Self::Resize {
                    width: bw,
                    height: bh,
                },
            ) => aw == bw && ah == bh,
            (Self::Error(a), Self::Error(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl Eq for Event {}

// ─── Tests ───────────────────────────────────────────────────────────────────
