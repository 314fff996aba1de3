// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Windows console backend.
//
// The console delivers structured input records instead of a byte stream,
// so there is nothing to decode: the producer thread blocks in
// ReadConsoleInputW, translates each key record into an event, and turns
// window-buffer-size records into resize notifications.
//
// Output goes through WriteConsoleOutputW, one call per changed run, at
// coordinates relative to the visible window. The console has no
// alternate screen, so the session draws over the active buffer and
// clears it on exit.
//
// Shutdown: the producer waits on the input handle and a quit event
// together; setting the event wakes it and it exits.

use std::io;
use std::thread::{self, JoinHandle};

use flume::Receiver;
use tracing::{debug, warn};
use windows::Win32::Foundation::{CloseHandle, FALSE, HANDLE, TRUE, WAIT_OBJECT_0};
use windows::Win32::System::Console::{
    CHAR_INFO, CHAR_INFO_0, COMMON_LVB_UNDERSCORE, CONSOLE_CURSOR_INFO,
    CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFO, COORD, ENABLE_WINDOW_INPUT,
    FOREGROUND_BLUE, FOREGROUND_GREEN, FOREGROUND_INTENSITY, FOREGROUND_RED, FillConsoleOutputAttribute,
    FillConsoleOutputCharacterW, GetConsoleCursorInfo, GetConsoleMode,
    GetConsoleScreenBufferInfo, GetStdHandle, INPUT_RECORD, KEY_EVENT, LEFT_ALT_PRESSED,
    RIGHT_ALT_PRESSED, ReadConsoleInputW, SMALL_RECT, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
    SetConsoleCursorInfo, SetConsoleCursorPosition, SetConsoleMode, WINDOW_BUFFER_SIZE_EVENT,
    WriteConsoleOutputW,
};
use windows::Win32::System::Threading::{CreateEventW, INFINITE, SetEvent, WaitForMultipleObjects};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    VIRTUAL_KEY, VK_DELETE, VK_DOWN, VK_END, VK_F1, VK_F2, VK_F3, VK_F4, VK_F5, VK_F6, VK_F7,
    VK_F8, VK_F9, VK_F10, VK_F11, VK_F12, VK_HOME, VK_INSERT, VK_LEFT, VK_NEXT, VK_PRIOR,
    VK_RIGHT, VK_UP,
};
use windows::core::PCWSTR;

use crate::backend::{Device, Producer, Wake};
use crate::cell::{Attribute, Cell, Style};
use crate::diff::Frame;
use crate::error::{Error, Result};
use crate::event::{Event, Key, Modifiers};

fn os(err: windows::core::Error) -> io::Error {
    io::Error::other(err)
}

/// A console handle that may cross to the producer thread.
#[derive(Debug, Clone, Copy)]
struct SendHandle(HANDLE);

// SAFETY: console and event handles are process-wide kernel handles,
// usable from any thread.
unsafe impl Send for SendHandle {}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Console color bits for color index 1..=8 (black..white).
const fn color_bits(color: u8) -> u16 {
    let (r, g, b) = (FOREGROUND_RED.0, FOREGROUND_GREEN.0, FOREGROUND_BLUE.0);
    match color {
        2 => r,
        3 => g,
        4 => r | g,
        5 => b,
        6 => r | b,
        7 => g | b,
        8 => r | g | b,
        _ => 0,
    }
}

/// Console attribute word for a cell's (fg, bg) pair.
///
/// The default foreground is white and the default background black.
/// Bold brightens, underline maps to the underscore flag, and reverse
/// swaps the two colors.
fn cell_attributes(fg: Attribute, bg: Attribute) -> u16 {
    let white = FOREGROUND_RED.0 | FOREGROUND_GREEN.0 | FOREGROUND_BLUE.0;
    let mut front = match fg.color() {
        0 => white,
        c => color_bits(c),
    };
    let mut back = color_bits(bg.color());

    let (fs, bs) = (fg.style(), bg.style());
    if fs.contains(Style::BOLD) {
        front |= FOREGROUND_INTENSITY.0;
    }
    if bs.contains(Style::BOLD) {
        back |= FOREGROUND_INTENSITY.0;
    }
    if (fs | bs).contains(Style::REVERSE) {
        std::mem::swap(&mut front, &mut back);
    }

    let mut attr = front | (back << 4);
    if fs.contains(Style::UNDERLINE) {
        attr |= COMMON_LVB_UNDERSCORE.0;
    }
    attr
}

/// UTF-16 unit for a cell. Characters outside the BMP show as `?`.
fn cell_unit(ch: char) -> u16 {
    u16::try_from(u32::from(ch)).unwrap_or(u16::from(b'?'))
}

fn char_info(cell: &Cell) -> CHAR_INFO {
    CHAR_INFO {
        Char: CHAR_INFO_0 {
            UnicodeChar: cell_unit(cell.ch),
        },
        Attributes: cell_attributes(cell.fg, cell.bg),
    }
}

fn coord(x: i32, y: i32) -> COORD {
    COORD {
        X: i16::try_from(x).unwrap_or(i16::MAX),
        Y: i16::try_from(y).unwrap_or(i16::MAX),
    }
}

// ─── Console ─────────────────────────────────────────────────────────────────

/// The process console with window input enabled.
pub struct Console {
    input: HANDLE,
    output: HANDLE,
    original_mode: Option<CONSOLE_MODE>,
    original_cursor: CONSOLE_CURSOR_INFO,
}

impl Console {
    /// Take over the standard console handles: window input on, cursor
    /// hidden, window cleared.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if a handle is unavailable or the console cannot be
    /// written, [`Error::Mode`] if its input mode cannot be read or set.
    pub fn open() -> Result<Self> {
        // SAFETY: plain console API calls on the process's own handles.
        unsafe {
            let input = GetStdHandle(STD_INPUT_HANDLE)
                .map_err(|e| Error::io("getting the console input handle", os(e)))?;
            let output = GetStdHandle(STD_OUTPUT_HANDLE)
                .map_err(|e| Error::io("getting the console output handle", os(e)))?;

            let mut mode = CONSOLE_MODE::default();
            GetConsoleMode(input, &raw mut mode)
                .map_err(|e| Error::mode("reading the console mode", os(e)))?;
            SetConsoleMode(input, ENABLE_WINDOW_INPUT)
                .map_err(|e| Error::mode("setting the console mode", os(e)))?;

            let mut cursor = CONSOLE_CURSOR_INFO::default();
            let _ = GetConsoleCursorInfo(output, &raw mut cursor);

            let mut console = Self {
                input,
                output,
                original_mode: Some(mode),
                original_cursor: cursor,
            };
            console
                .set_cursor_visible(false)
                .and_then(|()| console.clear_window())
                .map_err(|e| Error::io("preparing the console", e))?;

            debug!("console opened");
            Ok(console)
        }
    }

    fn input_handle(&self) -> SendHandle {
        SendHandle(self.input)
    }

    fn buffer_info(&self) -> io::Result<CONSOLE_SCREEN_BUFFER_INFO> {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        // SAFETY: info is a valid out-pointer.
        unsafe { GetConsoleScreenBufferInfo(self.output, &raw mut info) }.map_err(os)?;
        Ok(info)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        let info = CONSOLE_CURSOR_INFO {
            dwSize: self.original_cursor.dwSize.max(1),
            bVisible: if visible { TRUE } else { FALSE },
        };
        // SAFETY: info is a valid in-pointer.
        unsafe { SetConsoleCursorInfo(self.output, &raw const info) }.map_err(os)
    }

    /// Fill the visible window with default-colored spaces.
    fn clear_window(&mut self) -> io::Result<()> {
        let info = self.buffer_info()?;
        let window = info.srWindow;
        let width = u32::try_from(window.Right - window.Left + 1).unwrap_or(0);
        let attr = cell_attributes(Attribute::DEFAULT, Attribute::DEFAULT);

        for y in window.Top..=window.Bottom {
            let at = COORD { X: window.Left, Y: y };
            let mut written = 0u32;
            // SAFETY: written is a valid out-pointer.
            unsafe {
                FillConsoleOutputCharacterW(self.output, u16::from(b' '), width, at, &raw mut written)
                    .map_err(os)?;
                FillConsoleOutputAttribute(self.output, attr, width, at, &raw mut written)
                    .map_err(os)?;
            }
        }
        Ok(())
    }
}

impl Device for Console {
    fn size(&mut self) -> io::Result<(u16, u16)> {
        let window = self.buffer_info()?.srWindow;
        let width = u16::try_from(window.Right - window.Left + 1).unwrap_or(0);
        let height = u16::try_from(window.Bottom - window.Top + 1).unwrap_or(0);
        Ok((width, height))
    }

    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if frame.clear {
            self.clear_window()?;
        }
        if let Some(visible) = frame.cursor_visible {
            self.set_cursor_visible(visible)?;
        }

        let origin = self.buffer_info()?.srWindow;
        let (left, top) = (i32::from(origin.Left), i32::from(origin.Top));

        let mut infos = Vec::new();
        for run in &frame.runs {
            infos.clear();
            infos.extend(run.cells.iter().map(char_info));

            let x = left + i32::from(run.x);
            let y = top + i32::from(run.y);
            let len = i32::try_from(infos.len()).unwrap_or(i32::MAX);
            let mut region = SMALL_RECT {
                Left: coord(x, y).X,
                Top: coord(x, y).Y,
                Right: coord(x + len - 1, y).X,
                Bottom: coord(x, y).Y,
            };
            // SAFETY: infos holds `len` initialized cells laid out as a
            // `len` × 1 block; region is a valid in/out pointer.
            unsafe {
                WriteConsoleOutputW(
                    self.output,
                    infos.as_ptr(),
                    coord(len, 1),
                    coord(0, 0),
                    &raw mut region,
                )
            }
            .map_err(os)?;
        }

        if let Some((x, y)) = frame.cursor {
            let at = coord(left + i32::from(x), top + i32::from(y));
            // SAFETY: plain console call.
            unsafe { SetConsoleCursorPosition(self.output, at) }.map_err(os)?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        let Some(mode) = self.original_mode.take() else {
            return;
        };

        if let Err(err) = self.clear_window() {
            warn!(%err, "clearing the console failed");
        }
        let cursor = self.original_cursor;
        // SAFETY: plain console calls on handles still owned by the process.
        unsafe {
            if let Err(err) = SetConsoleCursorInfo(self.output, &raw const cursor) {
                warn!(%err, "restoring the console cursor failed");
            }
            if let Err(err) = SetConsoleMode(self.input, mode) {
                warn!(%err, "restoring the console mode failed");
            }
        }
        debug!("console closed");
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Input Records ───────────────────────────────────────────────────────────

fn alt_mods(state: u32) -> Modifiers {
    if state & (LEFT_ALT_PRESSED | RIGHT_ALT_PRESSED) == 0 {
        Modifiers::empty()
    } else {
        Modifiers::ALT
    }
}

/// Translate one key record. Key-up records and keys without a character
/// or functional meaning (plain Shift, Ctrl, ...) yield nothing.
fn translate_key(down: bool, vk: u16, unit: u16, state: u32) -> Option<Event> {
    if !down {
        return None;
    }

    let mods = alt_mods(state);
    let functional = match VIRTUAL_KEY(vk) {
        VK_F1 => Some(Key::F1),
        VK_F2 => Some(Key::F2),
        VK_F3 => Some(Key::F3),
        VK_F4 => Some(Key::F4),
        VK_F5 => Some(Key::F5),
        VK_F6 => Some(Key::F6),
        VK_F7 => Some(Key::F7),
        VK_F8 => Some(Key::F8),
        VK_F9 => Some(Key::F9),
        VK_F10 => Some(Key::F10),
        VK_F11 => Some(Key::F11),
        VK_F12 => Some(Key::F12),
        VK_INSERT => Some(Key::INSERT),
        VK_DELETE => Some(Key::DELETE),
        VK_HOME => Some(Key::HOME),
        VK_END => Some(Key::END),
        VK_PRIOR => Some(Key::PGUP),
        VK_NEXT => Some(Key::PGDN),
        VK_UP => Some(Key::ARROW_UP),
        VK_DOWN => Some(Key::ARROW_DOWN),
        VK_LEFT => Some(Key::ARROW_LEFT),
        VK_RIGHT => Some(Key::ARROW_RIGHT),
        _ => None,
    };
    if let Some(key) = functional {
        return Some(Event::key(key).with_mods(mods));
    }

    if unit == 0 {
        return None;
    }
    if let Ok(byte) = u8::try_from(unit) {
        if Key::is_control_byte(byte) {
            return Some(Event::key(Key(unit)).with_mods(mods));
        }
    }
    char::from_u32(u32::from(unit)).map(|ch| Event::rune(ch).with_mods(mods))
}

/// Record translation across calls. Characters outside the BMP arrive as
/// two key records, one per UTF-16 surrogate.
#[derive(Debug, Default)]
struct RecordTranslator {
    high_surrogate: Option<u16>,
}

impl RecordTranslator {
    fn key(&mut self, down: bool, vk: u16, unit: u16, state: u32) -> Option<Event> {
        if !down {
            return None;
        }
        match unit {
            0xD800..=0xDBFF => {
                self.high_surrogate = Some(unit);
                None
            }
            0xDC00..=0xDFFF => {
                let high = self.high_surrogate.take()?;
                let ch = char::decode_utf16([high, unit]).next()?.ok()?;
                Some(Event::rune(ch).with_mods(alt_mods(state)))
            }
            0 => translate_key(down, vk, unit, state),
            _ => {
                self.high_surrogate = None;
                translate_key(down, vk, unit, state)
            }
        }
    }

    fn record(&mut self, record: &INPUT_RECORD) -> Option<Wake> {
        match u32::from(record.EventType) {
            KEY_EVENT => {
                // SAFETY: EventType says the union holds a key record.
                let key = unsafe { record.Event.KeyEvent };
                // SAFETY: both union members are plain u16 views.
                let unit = unsafe { key.uChar.UnicodeChar };
                self.key(
                    key.bKeyDown.as_bool(),
                    key.wVirtualKeyCode,
                    unit,
                    key.dwControlKeyState,
                )
                .map(Wake::Event)
            }
            WINDOW_BUFFER_SIZE_EVENT => Some(Wake::Resize),
            _ => None,
        }
    }
}

// ─── ConsoleProducer ─────────────────────────────────────────────────────────

const RECORD_BATCH: usize = 16;

/// Background thread reading console input records.
pub struct ConsoleProducer {
    wakes: Option<Receiver<Wake>>,
    quit: SendHandle,
    thread: Option<JoinHandle<()>>,
}

impl ConsoleProducer {
    /// Start reading input records from `console`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the quit event cannot be created or the
    /// thread cannot be spawned.
    pub fn spawn(console: &Console) -> io::Result<Self> {
        // SAFETY: creates an unnamed manual-reset event owned by this process.
        let quit = unsafe { CreateEventW(None, TRUE, FALSE, PCWSTR::null()) }.map_err(os)?;
        let quit = SendHandle(quit);
        let input = console.input_handle();

        let (tx, rx) = flume::bounded(0);
        let spawned = thread::Builder::new()
            .name("cellbox-input".into())
            .spawn(move || {
                read_loop(input, quit, &tx);
                debug!("input thread exiting");
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                // SAFETY: the handle was created above and is not shared.
                let _ = unsafe { CloseHandle(quit.0) };
                return Err(err);
            }
        };

        debug!("input producer started");
        Ok(Self {
            wakes: Some(rx),
            quit,
            thread: Some(thread),
        })
    }
}

fn read_loop(input: SendHandle, quit: SendHandle, tx: &flume::Sender<Wake>) {
    let handles = [input.0, quit.0];
    let mut records = [INPUT_RECORD::default(); RECORD_BATCH];
    let mut translator = RecordTranslator::default();

    loop {
        // SAFETY: both handles stay open until this thread is joined.
        let woke = unsafe { WaitForMultipleObjects(&handles, FALSE, INFINITE) };
        if woke != WAIT_OBJECT_0 {
            return;
        }

        let mut read = 0u32;
        // SAFETY: records is a valid buffer; read is a valid out-pointer.
        if let Err(err) = unsafe { ReadConsoleInputW(input.0, &mut records, &raw mut read) } {
            warn!(%err, "console read failed");
            if tx.send(Wake::Failed(os(err))).is_err() {
                return;
            }
            continue;
        }

        let count = usize::try_from(read).unwrap_or(0).min(RECORD_BATCH);
        for wake in records[..count].iter().filter_map(|r| translator.record(r)) {
            if tx.send(wake).is_err() {
                return;
            }
        }
    }
}

impl Producer for ConsoleProducer {
    fn next(&mut self) -> Wake {
        self.wakes
            .as_ref()
            .and_then(|rx| rx.recv().ok())
            .unwrap_or(Wake::Closed)
    }

    fn recycle(&mut self, _buf: Vec<u8>) {}

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // SAFETY: the event handle is open until closed below.
        unsafe {
            let _ = SetEvent(self.quit.0);
        }
        self.wakes = None;
        let _ = thread.join();
        // SAFETY: the thread that waited on the handle has exited.
        unsafe {
            let _ = CloseHandle(self.quit.0);
        }
        debug!("input producer stopped");
    }
}

impl Drop for ConsoleProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use windows::Win32::System::Console::{BACKGROUND_BLUE, BACKGROUND_INTENSITY, BACKGROUND_RED};

    // ── Key translation ─────────────────────────────────────────────────

    #[test]
    fn key_up_is_ignored() {
        assert_eq!(translate_key(false, 0x41, u16::from(b'a'), 0), None);
    }

    #[test]
    fn printable_character_is_rune() {
        assert_eq!(
            translate_key(true, 0x41, u16::from(b'a'), 0),
            Some(Event::rune('a'))
        );
    }

    #[test]
    fn virtual_keys_are_functional() {
        assert_eq!(
            translate_key(true, VK_UP.0, 0, 0),
            Some(Event::key(Key::ARROW_UP))
        );
        assert_eq!(
            translate_key(true, VK_F12.0, 0, 0),
            Some(Event::key(Key::F12))
        );
        assert_eq!(
            translate_key(true, VK_PRIOR.0, 0, 0),
            Some(Event::key(Key::PGUP))
        );
    }

    #[test]
    fn control_characters_are_keys() {
        assert_eq!(
            translate_key(true, 0x0D, 0x0D, 0),
            Some(Event::key(Key::ENTER))
        );
        assert_eq!(
            translate_key(true, 0x1B, 0x1B, 0),
            Some(Event::key(Key::ESC))
        );
        assert_eq!(
            translate_key(true, 0x20, 0x20, 0),
            Some(Event::key(Key::SPACE))
        );
    }

    #[test]
    fn alt_state_sets_modifier() {
        assert_eq!(
            translate_key(true, 0x58, u16::from(b'x'), LEFT_ALT_PRESSED),
            Some(Event::rune('x').with_mods(Modifiers::ALT))
        );
    }

    #[test]
    fn modifier_only_key_is_ignored() {
        // Shift down: no character.
        assert_eq!(translate_key(true, 0x10, 0, 0), None);
    }

    #[test]
    fn surrogate_pair_becomes_one_rune() {
        let mut t = RecordTranslator::default();
        assert_eq!(t.key(true, 0, 0xD83D, 0), None);
        assert_eq!(t.key(false, 0, 0xD83D, 0), None);
        assert_eq!(t.key(true, 0, 0xDD25, 0), Some(Event::rune('🔥')));
        assert_eq!(t.key(true, 0x41, u16::from(b'a'), 0), Some(Event::rune('a')));
    }

    #[test]
    fn surrogate_pair_keeps_alt() {
        let mut t = RecordTranslator::default();
        assert_eq!(t.key(true, 0, 0xD83D, LEFT_ALT_PRESSED), None);
        assert_eq!(
            t.key(true, 0, 0xDE00, LEFT_ALT_PRESSED),
            Some(Event::rune('😀').with_mods(Modifiers::ALT))
        );
    }

    #[test]
    fn unpaired_surrogates_are_dropped() {
        let mut t = RecordTranslator::default();
        assert_eq!(t.key(true, 0, 0xDD25, 0), None, "low without high");
        assert_eq!(t.key(true, 0, 0xD83D, 0), None);
        assert_eq!(t.key(true, 0x42, u16::from(b'b'), 0), Some(Event::rune('b')));
        assert_eq!(t.key(true, 0, 0xDD25, 0), None, "high was discarded");
    }

    // ── Attributes ──────────────────────────────────────────────────────

    #[test]
    fn default_colors_are_white_on_black() {
        let white = FOREGROUND_RED.0 | FOREGROUND_GREEN.0 | FOREGROUND_BLUE.0;
        assert_eq!(cell_attributes(Attribute::DEFAULT, Attribute::DEFAULT), white);
    }

    #[test]
    fn background_color_shifts_into_high_nibble() {
        let attr = cell_attributes(Attribute::RED, Attribute::BLUE);
        assert_eq!(attr, FOREGROUND_RED.0 | BACKGROUND_BLUE.0);
    }

    #[test]
    fn bold_and_underline() {
        let attr = cell_attributes(
            Attribute::GREEN | Attribute::BOLD | Attribute::UNDERLINE,
            Attribute::BOLD,
        );
        assert_eq!(
            attr,
            FOREGROUND_GREEN.0
                | FOREGROUND_INTENSITY.0
                | BACKGROUND_INTENSITY.0
                | COMMON_LVB_UNDERSCORE.0
        );
    }

    #[test]
    fn reverse_swaps_colors() {
        let attr = cell_attributes(Attribute::RED | Attribute::REVERSE, Attribute::GREEN);
        assert_eq!(attr, FOREGROUND_GREEN.0 | BACKGROUND_RED.0);
    }

    #[test]
    fn astral_characters_show_as_question_mark() {
        assert_eq!(cell_unit('a'), u16::from(b'a'));
        assert_eq!(cell_unit('中'), 0x4E2D);
        assert_eq!(cell_unit('🔥'), u16::from(b'?'));
    }
}
