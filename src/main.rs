// SPDX-License-Identifier: MIT
//
// cellbox: key viewer.
//
// Opens a session, then shows every event poll() returns, newest first.
// Useful for checking what a terminal actually sends and how the decoder
// reads it in each input mode.
//
//   ┌──────────────────────────────────────────┐
//   │ title + help                  (row 0)    │
//   │ mode + size                   (row 1)    │
//   ├──────────────────────────────────────────┤
//   │ event log, newest on top      (row 3..)  │
//   └──────────────────────────────────────────┘
//
// Ctrl-Q quits, Ctrl-T switches between Esc and Alt input mode.
//
// Logs go to $CELLBOX_LOG_FILE (default: cellbox.log in the temp dir),
// filtered by $CELLBOX_LOG (default: info). Pass --alt to start in Alt
// mode.

use std::collections::VecDeque;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use cellbox_term::{Attribute, Event, InputMode, Key, Modifiers, Session, SessionConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Rows above the event log.
const HEADER_ROWS: u16 = 3;

// ─── Logging ────────────────────────────────────────────────────────────────

fn init_logging() {
    let path = env::var_os("CELLBOX_LOG_FILE")
        .map_or_else(|| env::temp_dir().join("cellbox.log"), PathBuf::from);
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_env("CELLBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

// ─── Event description ──────────────────────────────────────────────────────

fn with_mods(mods: Modifiers, name: &str) -> String {
    if mods.contains(Modifiers::ALT) {
        format!("Alt+{name}")
    } else {
        name.to_owned()
    }
}

/// One log line for an event.
fn describe(event: &Event) -> String {
    match event {
        Event::Key { key, mods } => format!("key   {:<14} 0x{:04X}", with_mods(*mods, &key.name()), key.0),
        Event::Rune { ch, mods } => {
            format!("rune  {:<14} U+{:04X}", with_mods(*mods, &format!("'{ch}'")), u32::from(*ch))
        }
        Event::Resize { width, height } => format!("resize {width}x{height}"),
        Event::Error(err) => format!("error {err}"),
    }
}

const fn mode_name(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Esc => "esc",
        InputMode::Alt => "alt",
        InputMode::Current => "current",
    }
}

// ─── Viewer ─────────────────────────────────────────────────────────────────

struct Viewer {
    log: VecDeque<String>,
    mode: InputMode,
}

impl Viewer {
    const fn new(mode: InputMode) -> Self {
        Self {
            log: VecDeque::new(),
            mode,
        }
    }

    fn record(&mut self, event: &Event, capacity: usize) {
        self.log.push_front(describe(event));
        self.log.truncate(capacity);
    }

    /// Handle one event. Returns `false` when the viewer should exit.
    fn handle(&mut self, session: &mut Session, event: &Event) -> bool {
        let capacity = usize::from(session.size().height.saturating_sub(HEADER_ROWS));
        self.record(event, capacity);

        match event {
            Event::Key { key: Key::CTRL_Q, .. } => false,
            Event::Key { key: Key::CTRL_T, .. } => {
                let next = match self.mode {
                    InputMode::Alt => InputMode::Esc,
                    _ => InputMode::Alt,
                };
                self.mode = session.set_input_mode(next);
                info!(mode = mode_name(self.mode), "input mode switched");
                true
            }
            Event::Error(err) => {
                warn!(%err, "input error");
                // A stopped producer will never deliver again.
                err.kind() != io::ErrorKind::BrokenPipe
            }
            _ => true,
        }
    }

    fn draw(&self, session: &mut Session) {
        let size = session.size();
        session.clear(Attribute::DEFAULT, Attribute::DEFAULT);

        put_str(
            session,
            0,
            0,
            "cellbox key viewer   Ctrl-Q quit   Ctrl-T toggle mode",
            Attribute::WHITE | Attribute::BOLD,
            Attribute::BLUE,
        );
        let status = format!("mode: {}   size: {}x{}", mode_name(self.mode), size.width, size.height);
        put_str(session, 0, 1, &status, Attribute::CYAN, Attribute::DEFAULT);

        for (y, line) in (HEADER_ROWS..size.height).zip(&self.log) {
            let fg = if y == HEADER_ROWS {
                Attribute::YELLOW | Attribute::BOLD
            } else {
                Attribute::DEFAULT
            };
            put_str(session, 0, y, line, fg, Attribute::DEFAULT);
        }

        session.set_cursor(0, size.height.saturating_sub(1));
    }

    fn run(&mut self, session: &mut Session) -> cellbox_term::Result<()> {
        loop {
            self.draw(session);
            session.flush()?;
            let event = session.poll();
            if !self.handle(session, &event) {
                return Ok(());
            }
        }
    }
}

/// Write `text` from `(x, y)` rightward. Cells past the edge are dropped.
fn put_str(session: &mut Session, x: u16, y: u16, text: &str, fg: Attribute, bg: Attribute) {
    for (col, ch) in (x..).zip(text.chars()) {
        session.set_cell(col, y, ch, fg, bg);
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn start_mode(args: impl IntoIterator<Item = String>) -> InputMode {
    if args.into_iter().any(|arg| arg == "--alt") {
        InputMode::Alt
    } else {
        InputMode::Esc
    }
}

fn main() {
    init_logging();

    let config = SessionConfig::default().with_input_mode(start_mode(env::args().skip(1)));
    let mut session = Session::with_config(config).unwrap_or_else(|e| {
        eprintln!("cellbox: {e}");
        process::exit(1);
    });
    info!("key viewer started");

    let mut viewer = Viewer::new(session.set_input_mode(InputMode::Current));
    let result = viewer.run(&mut session);
    session.close();

    if let Err(e) = result {
        eprintln!("cellbox: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
