// SPDX-License-Identifier: MIT

//! The capability table: named control sequences plus the ordered key list.

use crate::key::Key;

// ─── Func ────────────────────────────────────────────────────────────────────

/// Symbolic name of a terminal control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    /// Switch to the alternate screen.
    EnterCa,
    /// Leave the alternate screen.
    ExitCa,
    ShowCursor,
    HideCursor,
    ClearScreen,
    /// Reset all character attributes.
    Sgr0,
    Underline,
    Bold,
    Blink,
    Reverse,
    /// Application keypad mode on (makes arrows send `ESC O x`).
    EnterKeypad,
    ExitKeypad,
}

impl Func {
    /// Number of capabilities a table carries.
    pub const COUNT: usize = 12;

    /// All capabilities, in table storage order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::EnterCa,
        Self::ExitCa,
        Self::ShowCursor,
        Self::HideCursor,
        Self::ClearScreen,
        Self::Sgr0,
        Self::Underline,
        Self::Bold,
        Self::Blink,
        Self::Reverse,
        Self::EnterKeypad,
        Self::ExitKeypad,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

// ─── KeySequence ─────────────────────────────────────────────────────────────

/// One entry of the key list: the bytes a terminal sends for `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySequence {
    pub bytes: Vec<u8>,
    pub key: Key,
}

impl KeySequence {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, key: Key) -> Self {
        Self {
            bytes: bytes.into(),
            key,
        }
    }
}

// ─── CapabilityTable ─────────────────────────────────────────────────────────

/// Control sequences and key sequences for one terminal type.
///
/// Built once (by [`resolve`](crate::resolve) or [`CapabilityTable::new`])
/// and read-only afterwards.
///
/// # Examples
///
/// ```
/// use cellbox_caps::{CapabilityTable, Func, Key, KeySequence};
///
/// let table = CapabilityTable::new(
///     "dumb-ansi",
///     [("\x1b[?25h", Func::ShowCursor), ("\x1b[?25l", Func::HideCursor)],
///     vec![KeySequence::new(*b"\x1b[A", Key::ARROW_UP)],
/// );
/// assert_eq!(table.func(Func::ShowCursor), "\x1b[?25h");
/// assert_eq!(table.func(Func::EnterCa), "");
/// assert_eq!(table.keys()[0].key, Key::ARROW_UP);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    name: String,
    funcs: [String; Func::COUNT],
    keys: Vec<KeySequence>,
}

impl CapabilityTable {
    /// Build a table from `(sequence, capability)` pairs and an ordered key list.
    ///
    /// Capabilities not mentioned are empty strings (the terminal has no
    /// such sequence, so emitting it is a no-op). Key order is kept as given.
    #[must_use]
    pub fn new<'a>(
        name: impl Into<String>,
        funcs: impl IntoIterator<Item = (&'a str, Func)>,
        keys: Vec<KeySequence>,
    ) -> Self {
        let mut table = Self {
            name: name.into(),
            funcs: Default::default(),
            keys,
        };
        for (seq, func) in funcs {
            seq.clone_into(&mut table.funcs[func.index()]);
        }
        table
    }

    /// Build a table from sequences listed in [`Func::ALL`] order and key
    /// sequences listed in [`Key::FUNCTIONAL`] order.
    pub(crate) fn from_ordered(
        name: &str,
        funcs: &[&str; Func::COUNT],
        keys: &[&str; 22],
    ) -> Self {
        Self {
            name: name.to_owned(),
            funcs: funcs.map(str::to_owned),
            keys: keys
                .iter()
                .zip(Key::FUNCTIONAL)
                .map(|(seq, key)| KeySequence::new(seq.as_bytes(), key))
                .collect(),
        }
    }

    /// The same table under another terminal name.
    pub(crate) fn renamed(mut self, name: &str) -> Self {
        name.clone_into(&mut self.name);
        self
    }

    /// Terminal type this table describes.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal sequence for a capability (empty if unsupported).
    #[inline]
    #[must_use]
    pub fn func(&self, func: Func) -> &str {
        &self.funcs[func.index()]
    }

    /// Key sequences in lookup order.
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[KeySequence] {
        &self.keys
    }

    /// First key sequence that is a prefix of `input`.
    ///
    /// Table order decides between overlapping sequences. Empty sequences
    /// never match.
    #[must_use]
    pub fn match_key(&self, input: &[u8]) -> Option<&KeySequence> {
        self.keys
            .iter()
            .find(|seq| !seq.bytes.is_empty() && input.starts_with(&seq.bytes))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
