// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Signal-driven input producer for Unix terminals.
//
// The terminal's read handle is switched to non-blocking, signal-driven
// mode (O_ASYNC | O_NONBLOCK, owned by this process), so the kernel raises
// SIGIO whenever input is ready. A dedicated thread waits on SIGIO and
// SIGWINCH through signal-hook's `Signals` iterator:
//
//   SIGIO      read until the device reports no more data. Each chunk is
//              handed to the session over a zero-capacity (rendezvous)
//              channel; the thread then waits for the session to hand the
//              buffer back before reading again.
//   SIGWINCH   post a resize notification. The slot holds one pending
//              notification; further signals while it is full coalesce.
//
// A read error goes over the chunk channel as well and ends the current
// drain; the next SIGIO starts a new one.
//
// Shutdown: closing the signal handle ends the iterator, and dropping the
// session side of the channels fails any send or receive the thread is
// blocked in. Either way the thread exits and is joined.

use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use flume::{Receiver, Sender};
use signal_hook::consts::{SIGIO, SIGWINCH};
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, trace, warn};

use crate::backend::{Producer, Wake};

/// Scratch buffer size. Terminal input arrives a keypress at a time;
/// longer bursts are split into several chunks.
const READ_CHUNK: usize = 128;

type Chunk = io::Result<Vec<u8>>;

/// Session side of the channels.
struct Channels {
    chunks: Receiver<Chunk>,
    resizes: Receiver<()>,
    recycled: Sender<Vec<u8>>,
}

/// Background reader woken by SIGIO, with SIGWINCH resize notifications.
pub struct SignalProducer {
    channels: Option<Channels>,
    signals: Handle,
    thread: Option<JoinHandle<()>>,
    fd: RawFd,
    saved_flags: Option<libc::c_int>,
}

impl SignalProducer {
    /// Register the signal handlers, switch `input` to signal-driven
    /// reads, and start the reader thread.
    ///
    /// Bytes already waiting on the device are delivered right away.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the signals cannot be registered, the file
    /// flags cannot be changed, or the thread cannot be spawned.
    pub fn spawn(input: Arc<File>) -> io::Result<Self> {
        // Handlers must be in place before the first SIGIO can fire.
        let mut signals = Signals::new([SIGIO, SIGWINCH])?;
        let handle = signals.handle();

        let fd = input.as_raw_fd();
        let saved_flags = match enable_async(fd) {
            Ok(flags) => flags,
            Err(err) => {
                handle.close();
                return Err(err);
            }
        };

        let (chunk_tx, chunk_rx) = flume::bounded(0);
        let (resize_tx, resize_rx) = flume::bounded(1);
        let (recycle_tx, recycle_rx) = flume::bounded(1);

        let spawned = thread::Builder::new()
            .name("cellbox-input".into())
            .spawn(move || {
                reader_loop(&input, &mut signals, &chunk_tx, &resize_tx, &recycle_rx);
                debug!("input thread exiting");
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                handle.close();
                restore_flags(fd, saved_flags);
                return Err(err);
            }
        };

        debug!(fd, "input producer started");
        Ok(Self {
            channels: Some(Channels {
                chunks: chunk_rx,
                resizes: resize_rx,
                recycled: recycle_tx,
            }),
            signals: handle,
            thread: Some(thread),
            fd,
            saved_flags: Some(saved_flags),
        })
    }
}

impl Producer for SignalProducer {
    fn next(&mut self) -> Wake {
        let Some(ch) = &self.channels else {
            return Wake::Closed;
        };

        if ch.resizes.try_recv().is_ok() {
            return Wake::Resize;
        }

        flume::Selector::new()
            .recv(&ch.resizes, |r| match r {
                Ok(()) => Wake::Resize,
                Err(_) => Wake::Closed,
            })
            .recv(&ch.chunks, |r| match r {
                Ok(Ok(bytes)) => Wake::Bytes(bytes),
                Ok(Err(err)) => Wake::Failed(err),
                Err(_) => Wake::Closed,
            })
            .wait()
    }

    fn recycle(&mut self, buf: Vec<u8>) {
        if let Some(ch) = &self.channels {
            // Fails only when the thread is gone, which `next` reports.
            let _ = ch.recycled.try_send(buf);
        }
    }

    fn stop(&mut self) {
        self.signals.close();
        self.channels = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Some(flags) = self.saved_flags.take() {
            restore_flags(self.fd, flags);
        }
        debug!("input producer stopped");
    }
}

impl Drop for SignalProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Reader Thread ───────────────────────────────────────────────────────────

fn reader_loop(
    input: &File,
    signals: &mut Signals,
    chunks: &Sender<Chunk>,
    resizes: &Sender<()>,
    recycled: &Receiver<Vec<u8>>,
) {
    let mut buf = Vec::with_capacity(READ_CHUNK);

    // Input typed before notifications were enabled raised no SIGIO.
    if !drain(input, &mut buf, chunks, recycled) {
        return;
    }

    for signal in signals.forever() {
        match signal {
            SIGWINCH => {
                trace!("SIGWINCH");
                let _ = resizes.try_send(());
            }
            SIGIO => {
                if !drain(input, &mut buf, chunks, recycled) {
                    return;
                }
            }
            _ => {}
        }
    }
}

/// Read until the device would block, handing over each chunk.
///
/// Returns `false` once the session side is gone.
fn drain(
    mut input: &File,
    buf: &mut Vec<u8>,
    chunks: &Sender<Chunk>,
    recycled: &Receiver<Vec<u8>>,
) -> bool {
    loop {
        buf.resize(READ_CHUNK, 0);
        match input.read(buf) {
            Ok(0) => return true,
            Ok(n) => {
                buf.truncate(n);
                trace!(n, "read chunk");
                if chunks.send(Ok(std::mem::take(buf))).is_err() {
                    return false;
                }
                match recycled.recv() {
                    Ok(returned) => *buf = returned,
                    Err(_) => return false,
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(%err, "terminal read failed");
                return chunks.send(Err(err)).is_ok();
            }
        }
    }
}

// ─── File Flags ──────────────────────────────────────────────────────────────

/// Switch `fd` to non-blocking, signal-driven I/O owned by this process.
/// Returns the previous status flags.
fn enable_async(fd: RawFd) -> io::Result<libc::c_int> {
    // SAFETY: plain fcntl calls on an fd this process holds open.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_ASYNC | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
        // Some platforms refuse F_SETOWN on a tty; the session still gets
        // SIGIO from the foreground process group there.
        if libc::fcntl(fd, libc::F_SETOWN, libc::getpid()) < 0 {
            debug!(err = %io::Error::last_os_error(), "F_SETOWN failed");
        }
        Ok(flags)
    }
}

fn restore_flags(fd: RawFd, flags: libc::c_int) {
    // SAFETY: plain fcntl call on an fd this process holds open.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        warn!(err = %io::Error::last_os_error(), "restoring file flags failed");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    /// A nonblocking socket pair standing in for the terminal.
    fn pair() -> (UnixStream, File) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        theirs.set_nonblocking(true).unwrap();
        let file = File::from(std::os::fd::OwnedFd::from(theirs));
        (ours, file)
    }

    // ── Drain ───────────────────────────────────────────────────────────

    #[test]
    fn read_chunk_is_small() {
        assert!(READ_CHUNK >= 16);
        assert!(READ_CHUNK <= 4096);
    }

    #[test]
    fn drain_hands_over_chunks_and_waits_for_recycle() {
        let (mut writer, file) = pair();
        writer.write_all(b"abc").unwrap();

        let (chunk_tx, chunk_rx) = flume::bounded::<Chunk>(0);
        let (recycle_tx, recycle_rx) = flume::bounded::<Vec<u8>>(1);

        let consumer = thread::spawn(move || {
            let got = chunk_rx.recv().unwrap().unwrap();
            recycle_tx.send(got.clone()).unwrap();
            got
        });

        let mut buf = Vec::new();
        assert!(drain(&file, &mut buf, &chunk_tx, &recycle_rx));
        assert_eq!(consumer.join().unwrap(), b"abc".to_vec());
        assert!(buf.starts_with(b"abc"), "buffer came back");
    }

    #[test]
    fn drain_splits_long_input() {
        let (mut writer, file) = pair();
        let input = vec![b'x'; READ_CHUNK + 10];
        writer.write_all(&input).unwrap();

        let (chunk_tx, chunk_rx) = flume::bounded::<Chunk>(0);
        let (recycle_tx, recycle_rx) = flume::bounded::<Vec<u8>>(1);

        let consumer = thread::spawn(move || {
            let mut total = Vec::new();
            while let Ok(Ok(chunk)) = chunk_rx.recv() {
                total.extend_from_slice(&chunk);
                recycle_tx.send(chunk).unwrap();
            }
            total
        });

        let mut buf = Vec::new();
        assert!(drain(&file, &mut buf, &chunk_tx, &recycle_rx));
        drop(chunk_tx);
        assert_eq!(consumer.join().unwrap(), input);
    }

    #[test]
    fn drain_on_empty_device_returns_immediately() {
        let (_writer, file) = pair();
        let (chunk_tx, _chunk_rx) = flume::bounded::<Chunk>(0);
        let (_recycle_tx, recycle_rx) = flume::bounded::<Vec<u8>>(1);
        let mut buf = Vec::new();
        assert!(drain(&file, &mut buf, &chunk_tx, &recycle_rx));
    }

    #[test]
    fn drain_stops_when_consumer_is_gone() {
        let (mut writer, file) = pair();
        writer.write_all(b"q").unwrap();
        let (chunk_tx, chunk_rx) = flume::bounded::<Chunk>(0);
        let (_recycle_tx, recycle_rx) = flume::bounded::<Vec<u8>>(1);
        drop(chunk_rx);
        let mut buf = Vec::new();
        assert!(!drain(&file, &mut buf, &chunk_tx, &recycle_rx));
    }

    #[test]
    fn drain_ends_at_eof() {
        let (writer, file) = pair();
        drop(writer);
        let (chunk_tx, _chunk_rx) = flume::bounded::<Chunk>(0);
        let (_recycle_tx, recycle_rx) = flume::bounded::<Vec<u8>>(1);
        let mut buf = Vec::new();
        assert!(drain(&file, &mut buf, &chunk_tx, &recycle_rx));
    }

    // ── Producer ────────────────────────────────────────────────────────

    /// Next wake that is not a resize. Signals are process-wide, so a
    /// resize raised by another test may show up here.
    fn next_input(producer: &mut SignalProducer) -> Wake {
        loop {
            match producer.next() {
                Wake::Resize => {}
                other => return other,
            }
        }
    }

    #[test]
    fn producer_delivers_input_until_stopped() {
        let (mut writer, file) = pair();
        let mut producer = SignalProducer::spawn(Arc::new(file)).unwrap();

        writer.write_all(b"hi").unwrap();
        let bytes = match next_input(&mut producer) {
            Wake::Bytes(bytes) => bytes,
            other => panic!("expected bytes, got {other:?}"),
        };
        assert_eq!(bytes, b"hi".to_vec());
        producer.recycle(bytes);

        writer.write_all(b"x").unwrap();
        assert!(matches!(next_input(&mut producer), Wake::Bytes(b) if b == b"x"));

        // Unread input must not keep the thread alive.
        writer.write_all(b"left over").unwrap();
        producer.stop();
        assert!(matches!(producer.next(), Wake::Closed));
        producer.stop();
    }

    #[test]
    fn stop_restores_file_flags() {
        let (_writer, file) = pair();
        let fd = file.as_raw_fd();
        let before = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        let file = Arc::new(file);

        let mut producer = SignalProducer::spawn(Arc::clone(&file)).unwrap();
        assert_ne!(unsafe { libc::fcntl(fd, libc::F_GETFL) } & libc::O_ASYNC, 0);
        producer.stop();
        assert_eq!(unsafe { libc::fcntl(fd, libc::F_GETFL) }, before);
    }

    #[test]
    fn pending_resize_is_reported_before_input() {
        let (mut writer, file) = pair();
        let mut producer = SignalProducer::spawn(Arc::new(file)).unwrap();

        // SAFETY: raising a signal this process handles.
        assert_eq!(unsafe { libc::raise(SIGWINCH) }, 0);
        thread::sleep(Duration::from_millis(100));
        writer.write_all(b"z").unwrap();
        thread::sleep(Duration::from_millis(100));

        assert!(matches!(producer.next(), Wake::Resize));
        assert!(matches!(next_input(&mut producer), Wake::Bytes(b) if b == b"z"));
        producer.stop();
    }

    // ── File flags ──────────────────────────────────────────────────────

    #[test]
    fn enable_async_and_restore_flags() {
        // SIGIO terminates the process unless something handles it.
        let raised = Arc::new(std::sync::atomic::AtomicBool::new(false));
        signal_hook::flag::register(SIGIO, Arc::clone(&raised)).unwrap();

        let (_writer, file) = pair();
        let fd = file.as_raw_fd();
        let before = unsafe { libc::fcntl(fd, libc::F_GETFL) };

        let saved = enable_async(fd).unwrap();
        assert_eq!(saved, before);
        let during = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        assert_ne!(during & libc::O_ASYNC, 0);

        restore_flags(fd, saved);
        assert_eq!(unsafe { libc::fcntl(fd, libc::F_GETFL) }, before);
    }
}
