// SPDX-License-Identifier: MIT

//! # cellbox-caps: terminal capability tables
//!
//! Everything cellbox needs to know about a particular terminal type,
//! precomputed: the literal control sequences for screen setup and
//! teardown, and the ordered list of byte sequences the terminal sends
//! for functional keys.
//!
//! ```text
//! $TERM ──► resolve() ──► CapabilityTable
//!                           ├── func(Func::EnterCa)   → "\x1b[?1049h"
//!                           └── keys()                → [(ESC O P, F1), ...]
//! ```
//!
//! Tables are read-only once built. Key order matters: the input decoder
//! takes the *first* sequence that prefixes the pending bytes, so a table
//! that lists a sequence before one of its own extensions shadows the
//! longer one on purpose.

pub mod builtin;
pub mod key;
pub mod table;

pub use builtin::{builtin_names, from_env, resolve};
pub use key::Key;
pub use table::{CapabilityTable, Func, KeySequence};

/// Why a capability table could not be produced for a terminal type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapsError {
    /// `$TERM` is unset or empty.
    #[error("TERM environment variable not set")]
    TermNotSet,
    /// No built-in table matches the terminal name.
    #[error("unsupported terminal: {0}")]
    Unsupported(String),
}
