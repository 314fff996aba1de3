// SPDX-License-Identifier: MIT
//
// Error taxonomy for session setup.
//
// Only `init` returns these. Runtime read failures travel through `poll`
// as `Event::Error`, and close-time failures are logged and dropped.

use std::io;

use cellbox_caps::CapsError;

/// Why a session could not be started.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The terminal device could not be opened, configured, or written.
    #[error("terminal I/O failed while {context}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Terminal attributes could not be read or applied.
    #[error("terminal mode change failed while {context}")]
    Mode {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// No capability table for the terminal type.
    #[error("capability lookup failed: {0}")]
    Capability(#[from] CapsError),

    /// Another session is still open in this process.
    #[error("a terminal session is already active")]
    AlreadyActive,
}

impl Error {
    pub(crate) const fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) const fn mode(context: &'static str, source: io::Error) -> Self {
        Self::Mode { context, source }
    }
}

/// Result alias for session setup.
pub type Result<T> = std::result::Result<T, Error>;
