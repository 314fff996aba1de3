// SPDX-License-Identifier: MIT
//
// Unix terminal device: raw mode, init/close sequences, frame output.
//
// Safety: this module uses `unsafe` for termios (tcgetattr, tcsetattr),
// ioctl (TIOCGWINSZ), and the raw fd write in the panic hook. These are
// the POSIX interfaces for terminal control; each unsafe block is minimal.
#![allow(unsafe_code)]
//
// The device opens the controlling terminal twice: a write handle for
// output and a read handle that the input producer owns. Raw mode is
// applied through the write handle, which refers to the same tty.
//
// Raw mode is held by a guard that restores the captured attributes when
// dropped, so a failure half way through `open()` still returns the
// terminal to the user in the state it was found.
//
// A process-wide backup of the captured attributes and the close sequence
// lets the panic hook restore the terminal without access to the device.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use cellbox_caps::{CapabilityTable, Func};
use tracing::{debug, warn};

use crate::backend::Device;
use crate::diff::Frame;
use crate::error::{Error, Result};
use crate::output::{CellWriter, OutputBuffer};

// ─── Raw Attributes ──────────────────────────────────────────────────────────

/// Turn a captured attribute set into raw mode: no echo, no canonical
/// line editing, no signal keys, no input or output post-processing,
/// 8-bit characters, and reads that return as soon as one byte arrives.
pub(crate) fn make_raw(termios: &mut libc::termios) {
    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;
}

fn get_attr(fd: RawFd) -> io::Result<libc::termios> {
    // SAFETY: termios is plain data; tcgetattr fills it on success.
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &raw mut termios) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(termios)
    }
}

fn set_attr(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    // SAFETY: termios points to a valid, initialized struct.
    if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Query the window size of the terminal behind `fd`.
pub(crate) fn window_size(fd: RawFd) -> io::Result<(u16, u16)> {
    // SAFETY: winsize is plain data; the ioctl fills it on success.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((ws.ws_col, ws.ws_row))
}

// ─── Raw Mode Guard ──────────────────────────────────────────────────────────

/// Raw mode on one fd. Dropping the guard restores the original attributes.
struct RawMode {
    fd: RawFd,
    original: libc::termios,
}

impl RawMode {
    fn enable(fd: RawFd) -> io::Result<Self> {
        let original = get_attr(fd)?;
        let mut raw = original;
        make_raw(&mut raw);
        set_attr(fd, &raw)?;
        debug!(fd, "raw mode on");
        Ok(Self { fd, original })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        match set_attr(self.fd, &self.original) {
            Ok(()) => debug!(fd = self.fd, "raw mode off"),
            Err(err) => warn!(fd = self.fd, %err, "restoring terminal attributes failed"),
        }
    }
}

// ─── Panic-Safe Restore ──────────────────────────────────────────────────────

/// What the panic hook needs to give the terminal back.
struct Backup {
    fd: RawFd,
    termios: libc::termios,
    close_sequence: Vec<u8>,
}

static BACKUP: Mutex<Option<Backup>> = Mutex::new(None);

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn set_backup(backup: Option<Backup>) {
    if let Ok(mut guard) = BACKUP.lock() {
        *guard = backup;
    }
}

/// Install (once per process) a panic hook that writes the close sequence
/// straight to the tty fd, restores the attributes, then runs the previous
/// hook so the message lands on a working terminal.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            original(info);
        }));
    });
}

fn emergency_restore() {
    // try_lock: the panic may have happened while the lock was held.
    let Ok(mut guard) = BACKUP.try_lock() else {
        return;
    };
    let Some(backup) = guard.take() else {
        return;
    };
    // SAFETY: the fd stays open for as long as the backup is set; the
    // buffer is valid for its length.
    unsafe {
        let _ = libc::write(
            backup.fd,
            backup.close_sequence.as_ptr().cast::<libc::c_void>(),
            backup.close_sequence.len(),
        );
        let _ = libc::tcsetattr(backup.fd, libc::TCSAFLUSH, &raw const backup.termios);
    }
}

// ─── Sequences ───────────────────────────────────────────────────────────────

fn init_sequence(caps: &CapabilityTable) -> Vec<u8> {
    [Func::EnterCa, Func::EnterKeypad, Func::HideCursor, Func::ClearScreen]
        .iter()
        .flat_map(|&f| caps.func(f).bytes())
        .collect()
}

fn close_sequence(caps: &CapabilityTable) -> Vec<u8> {
    [
        Func::ShowCursor,
        Func::Sgr0,
        Func::ClearScreen,
        Func::ExitCa,
        Func::ExitKeypad,
    ]
    .iter()
    .flat_map(|&f| caps.func(f).bytes())
    .collect()
}

// ─── Tty ─────────────────────────────────────────────────────────────────────

/// The controlling terminal in raw mode.
pub struct Tty {
    out: File,
    input: Arc<File>,
    caps: CapabilityTable,
    raw: Option<RawMode>,
    buf: OutputBuffer,
    writer: CellWriter,
}

impl Tty {
    /// Open `path`, enter raw mode, and switch to the full-screen state
    /// (alternate screen, keypad mode, hidden cursor, cleared screen).
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the device cannot be opened or
    /// written, [`Error::Mode`](crate::Error::Mode) if its attributes
    /// cannot be read or set. Anything opened before the failure is
    /// released and the attributes are restored.
    pub fn open(path: &Path, caps: CapabilityTable) -> Result<Self> {
        let out = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| Error::io("opening the terminal for output", e))?;
        let input = File::open(path).map_err(|e| Error::io("opening the terminal for input", e))?;

        let fd = out.as_raw_fd();
        let raw = RawMode::enable(fd).map_err(|e| Error::mode("entering raw mode", e))?;

        install_panic_hook();
        set_backup(Some(Backup {
            fd,
            termios: raw.original,
            close_sequence: close_sequence(&caps),
        }));

        let mut tty = Self {
            out,
            input: Arc::new(input),
            caps,
            raw: Some(raw),
            buf: OutputBuffer::new(),
            writer: CellWriter::new(),
        };

        let init = init_sequence(&tty.caps);
        tty.out
            .write_all(&init)
            .and_then(|()| tty.out.flush())
            .map_err(|e| Error::io("writing the init sequence", e))?;

        debug!(path = %path.display(), term = tty.caps.name(), "terminal opened");
        Ok(tty)
    }

    /// The read handle, shared with the input producer.
    #[must_use]
    pub fn input(&self) -> Arc<File> {
        Arc::clone(&self.input)
    }
}

impl Device for Tty {
    fn size(&mut self) -> io::Result<(u16, u16)> {
        window_size(self.out.as_raw_fd())
    }

    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.buf.clear();
        self.writer.encode(&mut self.buf, &self.caps, frame);
        self.buf.flush_to(&mut self.out)
    }

    fn shutdown(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };

        let seq = close_sequence(&self.caps);
        if let Err(err) = self.out.write_all(&seq).and_then(|()| self.out.flush()) {
            warn!(%err, "writing the close sequence failed");
        }

        drop(raw);
        set_backup(None);
        debug!("terminal closed");
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn all_set() -> libc::termios {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        t.c_iflag = !0;
        t.c_oflag = !0;
        t.c_lflag = !0;
        t.c_cflag = !0;
        t.c_cc[libc::VMIN] = 9;
        t.c_cc[libc::VTIME] = 9;
        t
    }

    // ── Raw attributes ──────────────────────────────────────────────────

    #[test]
    fn make_raw_disables_line_processing() {
        let mut t = all_set();
        make_raw(&mut t);
        for flag in [
            libc::IGNBRK,
            libc::BRKINT,
            libc::PARMRK,
            libc::ISTRIP,
            libc::INLCR,
            libc::IGNCR,
            libc::ICRNL,
            libc::IXON,
        ] {
            assert_eq!(t.c_iflag & flag, 0);
        }
        assert_eq!(t.c_oflag & libc::OPOST, 0);
        for flag in [libc::ECHO, libc::ECHONL, libc::ICANON, libc::ISIG, libc::IEXTEN] {
            assert_eq!(t.c_lflag & flag, 0);
        }
        assert_eq!(t.c_cflag & libc::PARENB, 0);
    }

    #[test]
    fn make_raw_selects_eight_bit_chars() {
        let mut t = all_set();
        make_raw(&mut t);
        assert_eq!(t.c_cflag & libc::CSIZE, libc::CS8);
    }

    #[test]
    fn make_raw_reads_return_after_one_byte() {
        let mut t = all_set();
        make_raw(&mut t);
        assert_eq!(t.c_cc[libc::VMIN], 1);
        assert_eq!(t.c_cc[libc::VTIME], 0);
    }

    #[test]
    fn make_raw_keeps_unrelated_flags() {
        let mut t = all_set();
        make_raw(&mut t);
        assert_ne!(t.c_lflag & libc::ECHOE, 0);
        assert_ne!(t.c_cflag & libc::CREAD, 0);
    }

    // ── Sequences ───────────────────────────────────────────────────────

    #[test]
    fn init_sequence_order() {
        let caps = cellbox_caps::resolve("xterm").unwrap();
        assert_eq!(
            init_sequence(&caps),
            b"\x1b[?1049h\x1b[?1h\x1b=\x1b[?25l\x1b[H\x1b[2J".to_vec()
        );
    }

    #[test]
    fn close_sequence_leaves_alternate_screen_before_keypad() {
        let caps = cellbox_caps::resolve("xterm").unwrap();
        assert_eq!(
            close_sequence(&caps),
            b"\x1b[?12l\x1b[?25h\x1b(B\x1b[m\x1b[H\x1b[2J\x1b[?1049l\x1b[?1l\x1b>".to_vec()
        );
    }

    #[test]
    fn sequences_skip_missing_capabilities() {
        let caps = cellbox_caps::resolve("linux").unwrap();
        assert_eq!(
            init_sequence(&caps),
            b"\x1b[?25l\x1b[?1c\x1b[H\x1b[J".to_vec()
        );
    }

    // ── Device ──────────────────────────────────────────────────────────

    #[test]
    fn open_missing_device_is_io_error() {
        let caps = cellbox_caps::resolve("xterm").unwrap();
        let err = Tty::open(Path::new("/nonexistent/cellbox-tty"), caps).err().unwrap();
        assert!(matches!(err, crate::Error::Io { .. }));
    }

    #[test]
    fn open_non_tty_is_mode_error() {
        let caps = cellbox_caps::resolve("xterm").unwrap();
        let err = Tty::open(Path::new("/dev/null"), caps).err().unwrap();
        assert!(matches!(err, crate::Error::Mode { .. }));
    }

    /// A fresh pseudo-terminal: the master side and the slave's path.
    fn pty() -> (File, PathBuf) {
        use std::ffi::CStr;
        use std::os::fd::FromRawFd;

        // SAFETY: standard pty setup; ptsname's result is copied at once.
        unsafe {
            let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            assert!(master >= 0, "posix_openpt: {}", io::Error::last_os_error());
            let master_file = File::from_raw_fd(master);
            assert_eq!(libc::grantpt(master), 0);
            assert_eq!(libc::unlockpt(master), 0);
            let name = libc::ptsname(master);
            assert!(!name.is_null());
            let path = PathBuf::from(CStr::from_ptr(name).to_str().unwrap());
            (master_file, path)
        }
    }

    /// Input, output, control and local flags, then the control characters.
    type Mode = (libc::tcflag_t, libc::tcflag_t, libc::tcflag_t, libc::tcflag_t, Vec<libc::cc_t>);

    fn mode_of(file: &File) -> Mode {
        let t = get_attr(file.as_raw_fd()).unwrap();
        (t.c_iflag, t.c_oflag, t.c_cflag, t.c_lflag, t.c_cc.to_vec())
    }

    #[test]
    fn close_restores_the_mode_captured_before_open() {
        let (_master, path) = pty();
        let slave = File::open(&path).unwrap();
        let before = mode_of(&slave);

        for _ in 0..2 {
            let caps = cellbox_caps::resolve("xterm").unwrap();
            let mut tty = Tty::open(&path, caps).unwrap();

            let (_, oflag, _, lflag, cc) = mode_of(&slave);
            assert_eq!(lflag & (libc::ECHO | libc::ICANON | libc::ISIG), 0);
            assert_eq!(oflag & libc::OPOST, 0);
            assert_eq!(cc[libc::VMIN], 1);

            tty.shutdown();
            assert_eq!(mode_of(&slave), before);
        }
    }

    #[test]
    fn pty_reports_its_window_size() {
        let (master, path) = pty();
        let ws = libc::winsize {
            ws_row: 24,
            ws_col: 80,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: ws is a valid winsize for the duration of the call.
        assert_eq!(unsafe { libc::ioctl(master.as_raw_fd(), libc::TIOCSWINSZ, &raw const ws) }, 0);

        let mut tty = Tty::open(&path, cellbox_caps::resolve("xterm").unwrap()).unwrap();
        assert_eq!(tty.size().unwrap(), (80, 24));
        tty.shutdown();
    }

    #[test]
    fn window_size_of_non_tty_fails() {
        let file = File::open("/dev/null").unwrap();
        assert!(window_size(file.as_raw_fd()).is_err());
    }
}
