// SPDX-License-Identifier: MIT

//! Built-in capability tables and terminal-name resolution.
//!
//! Sequences are listed in [`Func::ALL`](crate::Func::ALL) order and keys in
//! [`Key::FUNCTIONAL`](crate::Key::FUNCTIONAL) order (F1..F12, Insert,
//! Delete, Home, End, PgUp, PgDn, Up, Down, Left, Right).

use crate::CapsError;
use crate::table::CapabilityTable;

type Funcs = [&'static str; 12];
type Keys = [&'static str; 22];

const XTERM_FUNCS: Funcs = [
    "\x1b[?1049h",
    "\x1b[?1049l",
    "\x1b[?12l\x1b[?25h",
    "\x1b[?25l",
    "\x1b[H\x1b[2J",
    "\x1b(B\x1b[m",
    "\x1b[4m",
    "\x1b[1m",
    "\x1b[5m",
    "\x1b[7m",
    "\x1b[?1h\x1b=",
    "\x1b[?1l\x1b>",
];

const XTERM_KEYS: Keys = [
    "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
    "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1bOH", "\x1bOF",
    "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
];

const RXVT_UNICODE_FUNCS: Funcs = [
    "\x1b[?1049h",
    "\x1b[r\x1b[?1049l",
    "\x1b[?25h",
    "\x1b[?25l",
    "\x1b[H\x1b[2J",
    "\x1b[m\x1b(B",
    "\x1b[4m",
    "\x1b[1m",
    "\x1b[5m",
    "\x1b[7m",
    "\x1b=",
    "\x1b>",
];

const RXVT_UNICODE_KEYS: Keys = [
    "\x1b[11~", "\x1b[12~", "\x1b[13~", "\x1b[14~", "\x1b[15~", "\x1b[17~", "\x1b[18~",
    "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1b[7~",
    "\x1b[8~", "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
];

// The Linux console has no alternate screen and no keypad toggle.
const LINUX_FUNCS: Funcs = [
    "",
    "",
    "\x1b[?25h\x1b[?0c",
    "\x1b[?25l\x1b[?1c",
    "\x1b[H\x1b[J",
    "\x1b[0;10m",
    "\x1b[4m",
    "\x1b[1m",
    "\x1b[5m",
    "\x1b[7m",
    "",
    "",
];

const LINUX_KEYS: Keys = [
    "\x1b[[A", "\x1b[[B", "\x1b[[C", "\x1b[[D", "\x1b[[E", "\x1b[17~", "\x1b[18~", "\x1b[19~",
    "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1b[1~", "\x1b[4~",
    "\x1b[5~", "\x1b[6~", "\x1b[A", "\x1b[B", "\x1b[D", "\x1b[C",
];

const ETERM_FUNCS: Funcs = [
    "\x1b7\x1b[?47h",
    "\x1b[2J\x1b[?47l\x1b8",
    "\x1b[?25h",
    "\x1b[?25l",
    "\x1b[H\x1b[2J",
    "\x1b[m\x0f",
    "\x1b[4m",
    "\x1b[1m",
    "\x1b[5m",
    "\x1b[7m",
    "",
    "",
];

const ETERM_KEYS: Keys = RXVT_UNICODE_KEYS;

const SCREEN_FUNCS: Funcs = [
    "\x1b[?1049h",
    "\x1b[?1049l",
    "\x1b[34h\x1b[?25h",
    "\x1b[?25l",
    "\x1b[H\x1b[J",
    "\x1b[m\x0f",
    "\x1b[4m",
    "\x1b[1m",
    "\x1b[5m",
    "\x1b[7m",
    "\x1b[?1h\x1b=",
    "\x1b[?1l\x1b>",
];

const SCREEN_KEYS: Keys = [
    "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~",
    "\x1b[20~", "\x1b[21~", "\x1b[23~", "\x1b[24~", "\x1b[2~", "\x1b[3~", "\x1b[1~", "\x1b[4~",
    "\x1b[5~", "\x1b[6~", "\x1bOA", "\x1bOB", "\x1bOD", "\x1bOC",
];

/// Built-in terminal names, each with its own table.
#[must_use]
pub const fn builtin_names() -> &'static [&'static str] {
    &["xterm", "rxvt-unicode", "linux", "Eterm", "screen"]
}

fn builtin(name: &str) -> Option<CapabilityTable> {
    let (funcs, keys) = match name {
        "xterm" => (&XTERM_FUNCS, &XTERM_KEYS),
        "rxvt-unicode" => (&RXVT_UNICODE_FUNCS, &RXVT_UNICODE_KEYS),
        "linux" => (&LINUX_FUNCS, &LINUX_KEYS),
        "Eterm" => (&ETERM_FUNCS, &ETERM_KEYS),
        "screen" => (&SCREEN_FUNCS, &SCREEN_KEYS),
        _ => return None,
    };
    Some(CapabilityTable::from_ordered(name, funcs, keys))
}

/// Resolve the capability table for a terminal name.
///
/// Exact built-in names win. Otherwise well-known families fall back to
/// their closest built-in (`xterm-256color` → `xterm`, `tmux-256color` →
/// `screen`, ...). The returned table keeps the requested name.
///
/// # Errors
///
/// [`CapsError::TermNotSet`] for an empty name, [`CapsError::Unsupported`]
/// when no table fits.
pub fn resolve(term: &str) -> Result<CapabilityTable, CapsError> {
    if term.is_empty() {
        return Err(CapsError::TermNotSet);
    }
    if let Some(table) = builtin(term) {
        return Ok(table);
    }

    let family = if term.contains("xterm") {
        "xterm"
    } else if term.contains("rxvt") {
        "rxvt-unicode"
    } else if term.contains("screen") || term.contains("tmux") {
        "screen"
    } else if term.contains("Eterm") {
        "Eterm"
    } else if term.contains("linux") {
        "linux"
    } else {
        return Err(CapsError::Unsupported(term.to_owned()));
    };

    builtin(family)
        .map(|table| table.renamed(term))
        .ok_or_else(|| CapsError::Unsupported(term.to_owned()))
}

/// Resolve the table for `$TERM`.
///
/// # Errors
///
/// Same as [`resolve`]; an unset variable is [`CapsError::TermNotSet`].
pub fn from_env() -> Result<CapabilityTable, CapsError> {
    let term = std::env::var("TERM").unwrap_or_default();
    resolve(&term)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
