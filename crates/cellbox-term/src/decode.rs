// SPDX-License-Identifier: MIT
//
// Input decoder: raw terminal bytes to events.
//
// The producer thread hands over byte chunks exactly as `read()` returned
// them, so a key sequence or a multi-byte character may be split across
// chunks. The decoder keeps the undecoded bytes in a buffer and removes
// bytes from the front only once a whole token has been recognized:
//
//   1. Empty buffer: nothing to extract.
//   2. Leading ESC: the first capability key sequence (in table order)
//      that prefixes the buffer becomes a Key event. If none matches, the
//      input mode decides: Esc mode emits the Escape key, Alt mode drops
//      the ESC, remembers an Alt modifier, and decodes the rest.
//   3. Control byte (<= space, or DEL): a Key event carrying that byte.
//   4. Otherwise one UTF-8 code point becomes a Rune event. An incomplete
//      or invalid code point extracts nothing; more bytes are awaited.
//
// In Alt mode a trailing ESC with nothing decodable behind it is consumed
// and its modifier is lost. Incomplete or invalid UTF-8 stalls until more
// bytes arrive. Both behaviors are long-standing and kept as is.

use cellbox_caps::CapabilityTable;
use tracing::trace;

use crate::event::{Event, InputMode, Key, Modifiers};

const ESC: u8 = 0x1B;

/// Initial capacity of the undecoded byte buffer.
const INITIAL_CAPACITY: usize = 64;

/// Stateful byte-to-event decoder.
///
/// # Examples
///
/// ```
/// use cellbox_term::decode::Decoder;
/// use cellbox_term::event::{Event, InputMode, Key};
///
/// let table = cellbox_caps::resolve("xterm").unwrap();
/// let mut decoder = Decoder::new(table);
///
/// decoder.push(b"\x1bOAx");
/// assert_eq!(decoder.extract(InputMode::Esc), Some(Event::key(Key::ARROW_UP)));
/// assert_eq!(decoder.extract(InputMode::Esc), Some(Event::rune('x')));
/// assert_eq!(decoder.extract(InputMode::Esc), None);
/// ```
#[derive(Debug)]
pub struct Decoder {
    table: CapabilityTable,
    buf: Vec<u8>,
}

impl Decoder {
    /// A decoder recognizing the key sequences of `table`.
    #[must_use]
    pub fn new(table: CapabilityTable) -> Self {
        Self {
            table,
            buf: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes not yet decoded.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop all undecoded bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Take the next complete event off the front of the buffer.
    ///
    /// Returns `None` when the buffer holds no complete token; whatever
    /// partial token remains stays buffered for the next call.
    pub fn extract(&mut self, mode: InputMode) -> Option<Event> {
        let mut mods = Modifiers::empty();

        loop {
            let &first = self.buf.first()?;

            if first == ESC {
                if let Some(seq) = self.table.match_key(&self.buf) {
                    let (key, len) = (seq.key, seq.bytes.len());
                    self.consume(len);
                    trace!(?key, len, "decoded key sequence");
                    return Some(Event::key(key).with_mods(mods));
                }

                match mode {
                    InputMode::Alt => {
                        self.consume(1);
                        mods |= Modifiers::ALT;
                        continue;
                    }
                    InputMode::Esc | InputMode::Current => {
                        self.consume(1);
                        return Some(Event::key(Key::ESC));
                    }
                }
            }

            if Key::is_control_byte(first) {
                self.consume(1);
                return Some(Event::key(Key(u16::from(first))).with_mods(mods));
            }

            let (ch, len) = decode_utf8(&self.buf)?;
            self.consume(len);
            return Some(Event::rune(ch).with_mods(mods));
        }
    }

    /// Remove `n` bytes from the front.
    fn consume(&mut self, n: usize) {
        self.buf.drain(..n);
    }
}

/// Decode the code point at the start of `bytes`.
///
/// Returns the character and its encoded length, or `None` if the bytes
/// are an incomplete prefix or not valid UTF-8.
fn decode_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    let len = match *bytes.first()? {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let encoded = bytes.get(..len)?;
    let ch = std::str::from_utf8(encoded).ok()?.chars().next()?;
    Some((ch, len))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
