// SPDX-License-Identifier: MIT

//! Symbolic key codes.
//!
//! Two ranges share one `u16` space:
//!
//! - `0x00..=0x20` and `0x7F`: control keys, numerically equal to the
//!   byte the terminal sends (`Ctrl-A` is `0x01`, Enter is `0x0D`).
//! - `0xFFFF` downwards: functional keys that arrive as escape sequences
//!   and are only recognizable through a [`CapabilityTable`].
//!
//! [`CapabilityTable`]: crate::CapabilityTable

use std::fmt;

/// A key code, either a control byte or a functional key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub u16);

impl Key {
    // ── Functional keys (escape sequences) ──────────────────────────

    pub const F1: Self = Self(0xFFFF);
    pub const F2: Self = Self(0xFFFF - 1);
    pub const F3: Self = Self(0xFFFF - 2);
    pub const F4: Self = Self(0xFFFF - 3);
    pub const F5: Self = Self(0xFFFF - 4);
    pub const F6: Self = Self(0xFFFF - 5);
    pub const F7: Self = Self(0xFFFF - 6);
    pub const F8: Self = Self(0xFFFF - 7);
    pub const F9: Self = Self(0xFFFF - 8);
    pub const F10: Self = Self(0xFFFF - 9);
    pub const F11: Self = Self(0xFFFF - 10);
    pub const F12: Self = Self(0xFFFF - 11);
    pub const INSERT: Self = Self(0xFFFF - 12);
    pub const DELETE: Self = Self(0xFFFF - 13);
    pub const HOME: Self = Self(0xFFFF - 14);
    pub const END: Self = Self(0xFFFF - 15);
    pub const PGUP: Self = Self(0xFFFF - 16);
    pub const PGDN: Self = Self(0xFFFF - 17);
    pub const ARROW_UP: Self = Self(0xFFFF - 18);
    pub const ARROW_DOWN: Self = Self(0xFFFF - 19);
    pub const ARROW_LEFT: Self = Self(0xFFFF - 20);
    pub const ARROW_RIGHT: Self = Self(0xFFFF - 21);

    // ── Control keys (single bytes) ─────────────────────────────────

    pub const CTRL_TILDE: Self = Self(0x00);
    pub const CTRL_A: Self = Self(0x01);
    pub const CTRL_B: Self = Self(0x02);
    pub const CTRL_C: Self = Self(0x03);
    pub const CTRL_D: Self = Self(0x04);
    pub const CTRL_E: Self = Self(0x05);
    pub const CTRL_F: Self = Self(0x06);
    pub const CTRL_G: Self = Self(0x07);
    pub const BACKSPACE: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const CTRL_J: Self = Self(0x0A);
    pub const CTRL_K: Self = Self(0x0B);
    pub const CTRL_L: Self = Self(0x0C);
    pub const ENTER: Self = Self(0x0D);
    pub const CTRL_N: Self = Self(0x0E);
    pub const CTRL_O: Self = Self(0x0F);
    pub const CTRL_P: Self = Self(0x10);
    pub const CTRL_Q: Self = Self(0x11);
    pub const CTRL_R: Self = Self(0x12);
    pub const CTRL_S: Self = Self(0x13);
    pub const CTRL_T: Self = Self(0x14);
    pub const CTRL_U: Self = Self(0x15);
    pub const CTRL_V: Self = Self(0x16);
    pub const CTRL_W: Self = Self(0x17);
    pub const CTRL_X: Self = Self(0x18);
    pub const CTRL_Y: Self = Self(0x19);
    pub const CTRL_Z: Self = Self(0x1A);
    pub const ESC: Self = Self(0x1B);
    pub const CTRL_BACKSLASH: Self = Self(0x1C);
    pub const CTRL_RSQ_BRACKET: Self = Self(0x1D);
    pub const CTRL_6: Self = Self(0x1E);
    pub const CTRL_SLASH: Self = Self(0x1F);
    pub const SPACE: Self = Self(0x20);
    pub const BACKSPACE2: Self = Self(0x7F);

    /// Functional keys in the order every built-in table lists them.
    pub const FUNCTIONAL: [Self; 22] = [
        Self::F1,
        Self::F2,
        Self::F3,
        Self::F4,
        Self::F5,
        Self::F6,
        Self::F7,
        Self::F8,
        Self::F9,
        Self::F10,
        Self::F11,
        Self::F12,
        Self::INSERT,
        Self::DELETE,
        Self::HOME,
        Self::END,
        Self::PGUP,
        Self::PGDN,
        Self::ARROW_UP,
        Self::ARROW_DOWN,
        Self::ARROW_LEFT,
        Self::ARROW_RIGHT,
    ];

    /// Whether `byte` is delivered as a key rather than as a character.
    ///
    /// Everything at or below space, plus DEL (the backspace most
    /// terminals actually send).
    #[inline]
    #[must_use]
    pub const fn is_control_byte(byte: u8) -> bool {
        byte <= 0x20 || byte == 0x7F
    }

    /// Whether this is a functional (escape-sequence) key.
    #[inline]
    #[must_use]
    pub const fn is_functional(self) -> bool {
        self.0 >= Self::ARROW_RIGHT.0
    }

    /// Human-readable name, e.g. `"ArrowUp"`, `"Ctrl+C"`, `"Esc"`.
    #[must_use]
    pub fn name(self) -> String {
        const FUNCTIONAL_NAMES: [&str; 22] = [
            "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "Insert",
            "Delete", "Home", "End", "PgUp", "PgDn", "ArrowUp", "ArrowDown", "ArrowLeft",
            "ArrowRight",
        ];

        if self.is_functional() {
            return FUNCTIONAL_NAMES[usize::from(0xFFFF - self.0)].to_owned();
        }
        match self {
            Self::CTRL_TILDE => "Ctrl+~".to_owned(),
            Self::BACKSPACE => "Backspace".to_owned(),
            Self::TAB => "Tab".to_owned(),
            Self::ENTER => "Enter".to_owned(),
            Self::ESC => "Esc".to_owned(),
            Self::CTRL_BACKSLASH => "Ctrl+\\".to_owned(),
            Self::CTRL_RSQ_BRACKET => "Ctrl+]".to_owned(),
            Self::CTRL_6 => "Ctrl+6".to_owned(),
            Self::CTRL_SLASH => "Ctrl+/".to_owned(),
            Self::SPACE => "Space".to_owned(),
            Self::BACKSPACE2 => "Backspace2".to_owned(),
            Self(code @ 0x01..=0x1A) => {
                // 0x01 is Ctrl+A; the letter offset is always ASCII.
                #[allow(clippy::cast_possible_truncation)]
                let letter = char::from(b'A' + code as u8 - 1);
                format!("Ctrl+{letter}")
            }
            Self(code) => format!("Key(0x{code:04X})"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn functional_keys_count_down_from_ffff() {
        for (i, key) in Key::FUNCTIONAL.iter().enumerate() {
            assert_eq!(usize::from(0xFFFF - key.0), i);
        }
    }

    #[test]
    fn functional_range_excludes_control_keys() {
        assert!(Key::F1.is_functional());
        assert!(Key::ARROW_RIGHT.is_functional());
        assert!(!Key::ESC.is_functional());
        assert!(!Key::BACKSPACE2.is_functional());
    }

    #[test]
    fn control_byte_threshold() {
        assert!(Key::is_control_byte(0x00));
        assert!(Key::is_control_byte(b'\r'));
        assert!(Key::is_control_byte(b' '));
        assert!(Key::is_control_byte(0x7F));
        assert!(!Key::is_control_byte(b'!'));
        assert!(!Key::is_control_byte(b'a'));
        assert!(!Key::is_control_byte(0xC3));
    }

    #[test]
    fn names() {
        assert_eq!(Key::ARROW_UP.name(), "ArrowUp");
        assert_eq!(Key::F12.name(), "F12");
        assert_eq!(Key::CTRL_C.name(), "Ctrl+C");
        assert_eq!(Key::CTRL_Z.name(), "Ctrl+Z");
        assert_eq!(Key::ESC.name(), "Esc");
        assert_eq!(Key::ENTER.name(), "Enter");
        assert_eq!(Key(0x4242).name(), "Key(0x4242)");
    }

    #[test]
    fn debug_uses_name() {
        assert_eq!(format!("{:?}", Key::PGDN), "Key(PgDn)");
    }
}
