// SPDX-License-Identifier: MIT
//
// cellbox-term: a tiny cell-grid terminal library.
//
// Put the terminal in raw full-screen mode, read keyboard input as
// decoded events, draw into a grid of character cells, and flush only
// what changed. One session per process.
//
//   Session ──┬── Device    (Tty on Unix, Console on Windows)
//             ├── Producer  (SIGIO/SIGWINCH reader thread, console reader)
//             ├── Decoder   bytes → Key / Rune events
//             └── CellBuffer ──► DiffRenderer ──► Frame ──► Device
//
// Unix terminals are driven through a capability table (see the
// cellbox-caps crate) chosen by terminal type. The Windows console takes
// cell writes and hands over key records directly, so it needs none.

pub mod backend;
pub mod buffer;
pub mod cell;
pub mod decode;
pub mod diff;
pub mod error;
pub mod event;
pub mod output;
pub mod session;

#[cfg(unix)]
pub mod reader;
#[cfg(unix)]
pub mod terminal;

#[cfg(windows)]
pub mod console;

pub use buffer::CellBuffer;
pub use cell::{Attribute, Cell, Style};
pub use diff::Cursor;
pub use error::{Error, Result};
pub use event::{Event, InputMode, Key, Modifiers};
pub use session::{Session, SessionConfig, Size};
