// SPDX-License-Identifier: MIT
//
// Output buffering and frame encoding for escape-sequence terminals.
//
// Two components work together to keep terminal I/O small:
//
//   OutputBuffer: accumulates the bytes of one frame so the whole frame
//   goes out in a single write().
//
//   CellWriter: turns a `Frame` into bytes using the capability table. It
//   remembers the cursor position and the last (fg, bg) pair it emitted,
//   and skips cursor moves for sequential cells and attribute sequences
//   when the pair has not changed.
//
// Attribute encoding, for a changed (fg, bg) pair:
//
//   sgr0
//   bold       if fg has BOLD
//   blink      if bg has BOLD
//   underline  if fg has UNDERLINE
//   reverse    if fg or bg has REVERSE
//   ESC[3{n}m  for a non-default fg color (n = color - 1)
//   ESC[4{n}m  for a non-default bg color
//
// Cursor addressing is ESC[{row};{col}H with 1-based coordinates.

use std::io::{self, Write};

use cellbox_caps::{CapabilityTable, Func};

use crate::cell::{Attribute, Cell, Style};
use crate::diff::Frame;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Byte buffer for one frame of terminal output.
#[derive(Debug)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a capability sequence. Empty sequences append nothing.
    #[inline]
    pub fn put_func(&mut self, caps: &CapabilityTable, func: Func) {
        self.buf.extend_from_slice(caps.func(func).as_bytes());
    }

    /// Append a character as UTF-8.
    #[inline]
    pub fn put_char(&mut self, ch: char) {
        let mut enc = [0u8; 4];
        self.buf
            .extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
    }

    /// Append a cursor move to the 0-based cell `(x, y)`.
    pub fn put_cursor(&mut self, x: u16, y: u16) {
        // Writing into a Vec cannot fail.
        let _ = write!(
            self.buf,
            "\x1b[{};{}H",
            u32::from(y) + 1,
            u32::from(x) + 1
        );
    }

    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write everything to `w` and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails; the buffer is kept.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── CellWriter ──────────────────────────────────────────────────────────────

/// Encodes frames, skipping cursor moves and attribute sequences that
/// would not change anything.
#[derive(Debug)]
#[allow(clippy::struct_field_names)] // The `last_` prefix groups the tracked terminal state.
pub struct CellWriter {
    last_x: i32,
    last_y: i32,
    last_style: Option<(Attribute, Attribute)>,
}

impl CellWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_x: -1,
            last_y: -1,
            last_style: None,
        }
    }

    /// Forget all tracked state.
    #[allow(clippy::missing_const_for_fn)]
    pub fn reset_state(&mut self) {
        *self = Self::new();
    }

    /// Append the bytes for `frame`.
    pub fn encode(&mut self, out: &mut OutputBuffer, caps: &CapabilityTable, frame: &Frame) {
        if frame.clear {
            out.put_func(caps, Func::Sgr0);
            out.put_func(caps, Func::ClearScreen);
            self.reset_state();
        }

        match frame.cursor_visible {
            Some(true) => out.put_func(caps, Func::ShowCursor),
            Some(false) => out.put_func(caps, Func::HideCursor),
            None => {}
        }

        for run in &frame.runs {
            for (x, cell) in (run.x..).zip(&run.cells) {
                self.put_cell(out, caps, x, run.y, cell);
            }
        }

        if let Some((x, y)) = frame.cursor {
            out.put_cursor(x, y);
            self.last_x = i32::from(x) - 1;
            self.last_y = i32::from(y);
        }
    }

    fn put_cell(&mut self, out: &mut OutputBuffer, caps: &CapabilityTable, x: u16, y: u16, cell: &Cell) {
        let xi = i32::from(x);
        let yi = i32::from(y);

        if yi != self.last_y || xi != self.last_x + 1 {
            out.put_cursor(x, y);
        }

        if self.last_style != Some((cell.fg, cell.bg)) {
            put_attributes(out, caps, cell.fg, cell.bg);
            self.last_style = Some((cell.fg, cell.bg));
        }

        out.put_char(cell.ch);
        self.last_x = xi;
        self.last_y = yi;
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the full attribute sequence for a (fg, bg) pair.
fn put_attributes(out: &mut OutputBuffer, caps: &CapabilityTable, fg: Attribute, bg: Attribute) {
    out.put_func(caps, Func::Sgr0);

    let (fs, bs) = (fg.style(), bg.style());
    if fs.contains(Style::BOLD) {
        out.put_func(caps, Func::Bold);
    }
    if bs.contains(Style::BOLD) {
        out.put_func(caps, Func::Blink);
    }
    if fs.contains(Style::UNDERLINE) {
        out.put_func(caps, Func::Underline);
    }
    if (fs | bs).contains(Style::REVERSE) {
        out.put_func(caps, Func::Reverse);
    }

    if fg.color() != 0 {
        let _ = write!(out, "\x1b[3{}m", fg.color() - 1);
    }
    if bg.color() != 0 {
        let _ = write!(out, "\x1b[4{}m", bg.color() - 1);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
