// SPDX-License-Identifier: MIT
//
// Platform seams.
//
// A session talks to the platform through two traits:
//
//   Device     the output side. Size queries, frame writes, and the
//              shutdown sequence that returns the terminal to the user.
//
//   Producer   the input side. A background source that blocks until the
//              next chunk of bytes, native event, resize notification, or
//              read failure is available.
//
// On Unix the producer hands over raw byte chunks for the decoder and
// must get each chunk back through `recycle` before it reads again. On
// Windows the console already delivers structured records, so the
// producer translates them and hands over finished events.

use std::io;

use crate::diff::Frame;
use crate::event::Event;

/// Why [`Producer::next`] returned.
#[derive(Debug)]
pub enum Wake {
    /// Raw bytes to decode. Hand the buffer back with [`Producer::recycle`].
    Bytes(Vec<u8>),
    /// A read failed.
    Failed(io::Error),
    /// The terminal size changed.
    Resize,
    /// A finished event that needs no decoding.
    Event(Event),
    /// The producer has stopped and will deliver nothing more.
    Closed,
}

/// Background input source, one per session.
pub trait Producer {
    /// Block until something happens.
    ///
    /// Pending resize notifications are reported before pending input.
    fn next(&mut self) -> Wake;

    /// Return a buffer received in [`Wake::Bytes`]. The producer does not
    /// read again until it has its buffer back.
    fn recycle(&mut self, buf: Vec<u8>);

    /// Stop the background source and wait for it to exit. Idempotent.
    fn stop(&mut self);
}

/// Terminal output handle.
pub trait Device {
    /// Current size in cells as `(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the size cannot be queried.
    fn size(&mut self) -> io::Result<(u16, u16)>;

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns the OS error if writing fails.
    fn write_frame(&mut self, frame: &Frame) -> io::Result<()>;

    /// Return the terminal to the state it was in before the session.
    ///
    /// Best effort: failures are logged, not reported. Idempotent.
    fn shutdown(&mut self);
}
