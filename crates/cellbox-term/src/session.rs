// SPDX-License-Identifier: MIT
//
// Session: the one object an application holds.
//
// A session owns the device, the input producer, the decoder, the back
// buffer and the renderer. Everything except the producer's background
// thread runs on the caller's thread, so none of it needs locking.
//
// Lifecycle:
//
//   init:    claim the process-wide session slot, resolve capabilities,
//            open the device (raw mode, full-screen state), start the
//            producer. A failure at any step releases what was acquired.
//   poll:    decode buffered bytes first; only when nothing is complete,
//            block on the producer for more bytes, a resize, or an error.
//   flush:   re-query the size, diff the back buffer, write one frame.
//   close:   stop the producer, restore the device, free the slot.
//
// Only one session may be active per process. A second `init` while one
// is open fails with `Error::AlreadyActive`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::path::PathBuf;

use cellbox_caps::CapabilityTable;
use tracing::{debug, trace};

use crate::backend::{Device, Producer, Wake};
use crate::buffer::CellBuffer;
use crate::cell::{Attribute, Cell};
use crate::decode::Decoder;
use crate::diff::{Cursor, DiffRenderer};
use crate::error::{Error, Result};
use crate::event::{Event, InputMode};

// ─── Size ────────────────────────────────────────────────────────────────────

/// Terminal dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    /// Total number of cells.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.width as u32 * self.height as u32
    }
}

// ─── SessionConfig ───────────────────────────────────────────────────────────

/// Settings for [`Session::with_config`].
///
/// ```
/// use cellbox_term::{InputMode, SessionConfig};
///
/// let config = SessionConfig::default()
///     .with_term("xterm-256color")
///     .with_input_mode(InputMode::Alt);
/// assert_eq!(config.input_mode, InputMode::Alt);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Terminal device to open.
    #[cfg(unix)]
    pub tty_path: PathBuf,
    /// Terminal type; `$TERM` when `None`.
    pub term: Option<String>,
    pub input_mode: InputMode,
    /// Use this table instead of resolving one by terminal type.
    pub capabilities: Option<CapabilityTable>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            #[cfg(unix)]
            tty_path: PathBuf::from("/dev/tty"),
            term: None,
            input_mode: InputMode::Esc,
            capabilities: None,
        }
    }
}

impl SessionConfig {
    #[cfg(unix)]
    #[must_use]
    pub fn with_tty_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tty_path = path.into();
        self
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Starting input mode. [`InputMode::Current`] means the default.
    #[must_use]
    pub const fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, table: CapabilityTable) -> Self {
        self.capabilities = Some(table);
        self
    }

    #[cfg(unix)]
    fn resolve_capabilities(&self) -> Result<CapabilityTable> {
        let table = match (&self.capabilities, &self.term) {
            (Some(table), _) => table.clone(),
            (None, Some(term)) => cellbox_caps::resolve(term)?,
            (None, None) => cellbox_caps::from_env()?,
        };
        Ok(table)
    }
}

// ─── Active Session Slot ─────────────────────────────────────────────────────

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Claim on a single-session slot, released on drop.
pub(crate) struct ActiveGuard {
    slot: &'static AtomicBool,
}

impl ActiveGuard {
    pub(crate) fn acquire(slot: &'static AtomicBool) -> Result<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyActive)?;
        Ok(Self { slot })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// An open terminal: raw keyboard input and a cell grid.
///
/// ```no_run
/// use cellbox_term::{Attribute, Event, Key, Session};
///
/// let mut session = Session::init()?;
/// session.set_cell(0, 0, 'h', Attribute::GREEN, Attribute::DEFAULT);
/// session.set_cell(1, 0, 'i', Attribute::GREEN, Attribute::DEFAULT);
/// session.flush()?;
///
/// loop {
///     if let Event::Key { key: Key::ESC, .. } = session.poll() {
///         break;
///     }
/// }
/// session.close();
/// # Ok::<(), cellbox_term::Error>(())
/// ```
pub struct Session {
    device: Box<dyn Device>,
    producer: Box<dyn Producer>,
    decoder: Decoder,
    back: CellBuffer,
    renderer: DiffRenderer,
    cursor: Cursor,
    mode: InputMode,
    closed: bool,
    // Dropped after `Drop::drop` has shut everything down.
    _active: ActiveGuard,
}

impl Session {
    /// Open the controlling terminal with default settings.
    ///
    /// # Errors
    ///
    /// See [`Session::with_config`].
    pub fn init() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Open the terminal described by `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyActive`] if another session is open.
    /// - [`Error::Capability`] if the terminal type has no table.
    /// - [`Error::Io`] if the device cannot be opened, written, or sized,
    ///   or the input producer cannot start.
    /// - [`Error::Mode`] if raw mode cannot be entered.
    #[cfg(unix)]
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        use crate::reader::SignalProducer;
        use crate::terminal::Tty;

        let active = ActiveGuard::acquire(&ACTIVE)?;
        let caps = config.resolve_capabilities()?;
        let tty = Tty::open(&config.tty_path, caps.clone())?;
        let producer = SignalProducer::spawn(tty.input())
            .map_err(|e| Error::io("starting the input producer", e))?;

        Self::from_parts(
            Box::new(tty),
            Box::new(producer),
            caps,
            config.input_mode,
            active,
        )
    }

    /// Open the process console with the settings in `config`.
    ///
    /// The console delivers structured key records, so `term` and
    /// `capabilities` are not consulted.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyActive`] if another session is open.
    /// - [`Error::Io`] if a console handle is unavailable or the input
    ///   producer cannot start.
    /// - [`Error::Mode`] if the console mode cannot be set.
    #[cfg(windows)]
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        use crate::console::{Console, ConsoleProducer};

        let active = ActiveGuard::acquire(&ACTIVE)?;
        let console = Console::open()?;
        let producer = ConsoleProducer::spawn(&console)
            .map_err(|e| Error::io("starting the input producer", e))?;

        Self::from_parts(
            Box::new(console),
            Box::new(producer),
            CapabilityTable::new("console", [], Vec::new()),
            config.input_mode,
            active,
        )
    }

    pub(crate) fn from_parts(
        mut device: Box<dyn Device>,
        producer: Box<dyn Producer>,
        caps: CapabilityTable,
        mode: InputMode,
        active: ActiveGuard,
    ) -> Result<Self> {
        let (width, height) = device
            .size()
            .map_err(|e| Error::io("querying the terminal size", e))?;
        debug!(width, height, term = caps.name(), "session started");

        let mode = match mode {
            InputMode::Current => InputMode::default(),
            other => other,
        };

        Ok(Self {
            device,
            producer,
            decoder: Decoder::new(caps),
            back: CellBuffer::new(width, height),
            renderer: DiffRenderer::new(width, height),
            cursor: Cursor::Hidden,
            mode,
            closed: false,
            _active: active,
        })
    }

    /// Stop input, restore the terminal, and free the session slot.
    ///
    /// Failures while restoring are logged and otherwise ignored.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.producer.stop();
        self.device.shutdown();
        debug!("session closed");
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Block until the next event.
    ///
    /// Events already decodable from buffered input are returned first. A
    /// read failure is returned as [`Event::Error`]; the session stays
    /// usable and the caller decides whether to go on.
    pub fn poll(&mut self) -> Event {
        loop {
            if let Some(event) = self.decoder.extract(self.mode) {
                trace!(?event, "decoded");
                return event;
            }

            match self.producer.next() {
                Wake::Bytes(bytes) => {
                    self.decoder.push(&bytes);
                    self.producer.recycle(bytes);
                }
                Wake::Event(event) => return event,
                Wake::Resize => return self.resized(),
                Wake::Failed(err) => return Event::from(err),
                Wake::Closed => {
                    return Event::from(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "input producer stopped",
                    ));
                }
            }
        }
    }

    fn resized(&mut self) -> Event {
        match self.device.size() {
            Ok((width, height)) => {
                self.apply_size(width, height);
                Event::Resize { width, height }
            }
            Err(err) => Event::from(err),
        }
    }

    /// Switch the input mode and return the mode now in effect.
    /// [`InputMode::Current`] only queries.
    pub fn set_input_mode(&mut self, mode: InputMode) -> InputMode {
        if mode != InputMode::Current {
            debug!(?mode, "input mode");
            self.mode = mode;
        }
        self.mode
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// Size of the back buffer, which follows the terminal size.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size {
            width: self.back.width(),
            height: self.back.height(),
        }
    }

    /// The back buffer, as it will be flushed.
    #[must_use]
    pub const fn buffer(&self) -> &CellBuffer {
        &self.back
    }

    /// Write one cell. Coordinates outside the buffer are ignored.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, fg: Attribute, bg: Attribute) {
        self.back.set(x, y, Cell::new(ch, fg, bg));
    }

    /// Fill the back buffer with spaces in the given attributes.
    pub fn clear(&mut self, fg: Attribute, bg: Attribute) {
        self.back.clear(fg, bg);
    }

    /// Show the cursor at `(x, y)` from the next flush on.
    pub const fn set_cursor(&mut self, x: u16, y: u16) {
        self.cursor = Cursor::At { x, y };
    }

    pub const fn hide_cursor(&mut self) {
        self.cursor = Cursor::Hidden;
    }

    /// Bring the terminal in line with the back buffer.
    ///
    /// If the terminal size changed, the back buffer is reallocated (its
    /// content is lost) and the whole screen is redrawn.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the size query or the write fails. After a failed
    /// write the next flush redraws everything.
    pub fn flush(&mut self) -> Result<()> {
        let (width, height) = self
            .device
            .size()
            .map_err(|e| Error::io("querying the terminal size", e))?;
        self.apply_size(width, height);

        let (frame, stats) = self.renderer.render(&self.back, self.cursor);
        trace!(
            rendered = stats.cells_rendered,
            skipped = stats.cells_skipped,
            runs = stats.runs,
            full = stats.full_redraw,
            "flush"
        );
        if frame.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.device.write_frame(frame) {
            self.renderer.invalidate();
            return Err(Error::io("writing a frame", err));
        }
        Ok(())
    }

    fn apply_size(&mut self, width: u16, height: u16) {
        if width == self.back.width() && height == self.back.height() {
            return;
        }
        debug!(width, height, "terminal resized");
        self.back.resize(width, height);
        self.renderer.invalidate();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
