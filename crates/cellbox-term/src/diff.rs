// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// The renderer keeps a snapshot of what the terminal currently shows and,
// on every flush, compares the back buffer against it. Only cells that
// differ are handed to the backend, grouped into horizontal runs so that
// a backend can position once per run and write the cells in sequence.
//
// The pipeline per flush:
//
//   1. The session hands the back buffer and the desired cursor state to
//      `DiffRenderer::render()`.
//   2. The renderer produces a `Frame`: an optional clear, the changed runs
//      in row-major order, a cursor visibility change, a cursor position.
//   3. The device encodes the frame (escape sequences or console cell
//      writes) and issues one write.
//   4. The snapshot is updated to match what was written.
//
// Snapshot lifecycle:
//
//   - At session start the screen has just been cleared, so the snapshot
//     starts out as a blank grid of the initial size.
//   - After a resize the snapshot is dropped. The next render emits a clear
//     and diffs the whole grid against a fresh blank snapshot.
//
// Unchanged rows are skipped with a single slice comparison.

use crate::buffer::CellBuffer;
use crate::cell::Cell;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Where the application wants the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Hidden,
    At { x: u16, y: u16 },
}

impl Cursor {
    #[inline]
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::At { .. })
    }
}

// ─── Frame ───────────────────────────────────────────────────────────────────

/// Horizontally adjacent changed cells starting at `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub x: u16,
    pub y: u16,
    pub cells: Vec<Cell>,
}

/// Everything one flush must send to the terminal, in order:
/// clear, cursor visibility, runs, cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Reset attributes and clear the whole screen first.
    pub clear: bool,
    /// `Some(true)` to show the cursor, `Some(false)` to hide it.
    pub cursor_visible: Option<bool>,
    pub runs: Vec<Run>,
    /// Move the cursor here after writing the runs.
    pub cursor: Option<(u16, u16)>,
}

impl Frame {
    /// Nothing to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.clear && self.cursor_visible.is_none() && self.runs.is_empty() && self.cursor.is_none()
    }

    /// Number of cells across all runs.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.runs.iter().map(|run| run.cells.len()).sum()
    }

    fn reset(&mut self) {
        self.clear = false;
        self.cursor_visible = None;
        self.runs.clear();
        self.cursor = None;
    }
}

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells that differed from the snapshot and were written.
    pub cells_rendered: usize,
    /// Cells that matched the snapshot and were skipped.
    pub cells_skipped: usize,
    pub runs: usize,
    /// The screen was cleared and the whole grid diffed.
    pub full_redraw: bool,
}

impl RenderStats {
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── DiffRenderer ────────────────────────────────────────────────────────────

/// Computes the minimal [`Frame`] that brings the terminal in line with a
/// back buffer.
///
/// ```
/// use cellbox_term::buffer::CellBuffer;
/// use cellbox_term::cell::{Attribute, Cell};
/// use cellbox_term::diff::{Cursor, DiffRenderer};
///
/// let mut back = CellBuffer::new(10, 2);
/// let mut renderer = DiffRenderer::new(10, 2);
///
/// back.set(3, 1, Cell::new('!', Attribute::RED, Attribute::DEFAULT));
/// let (frame, stats) = renderer.render(&back, Cursor::Hidden);
/// assert_eq!(frame.runs.len(), 1);
/// assert_eq!(stats.cells_rendered, 1);
///
/// let (frame, _) = renderer.render(&back, Cursor::Hidden);
/// assert!(frame.is_empty());
/// ```
#[derive(Debug)]
pub struct DiffRenderer {
    snapshot: Option<CellBuffer>,
    frame: Frame,
    /// Cursor visibility last sent to the terminal.
    cursor_shown: bool,
    /// Physical cursor position, when known.
    cursor_at: Option<(u16, u16)>,
}

impl DiffRenderer {
    /// A renderer for a freshly cleared screen of the given size, with the
    /// cursor hidden.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            snapshot: Some(CellBuffer::new(width, height)),
            frame: Frame::default(),
            cursor_shown: false,
            cursor_at: None,
        }
    }

    /// Forget what the terminal shows. The next render clears the screen
    /// and diffs the whole grid.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.cursor_at = None;
    }

    /// The snapshot of the last written content, if any.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&CellBuffer> {
        self.snapshot.as_ref()
    }

    /// Diff `back` against the snapshot and build the frame to send.
    ///
    /// The snapshot is updated as though the frame had been written.
    pub fn render(&mut self, back: &CellBuffer, cursor: Cursor) -> (&Frame, RenderStats) {
        self.frame.reset();
        let mut stats = RenderStats::default();

        let reusable = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.width() == back.width() && s.height() == back.height());
        if !reusable {
            self.snapshot = Some(CellBuffer::new(back.width(), back.height()));
            self.frame.clear = true;
            self.cursor_at = None;
            stats.full_redraw = true;
        }

        if cursor.is_visible() != self.cursor_shown {
            self.frame.cursor_visible = Some(cursor.is_visible());
            self.cursor_shown = cursor.is_visible();
        }

        if let Some(snapshot) = self.snapshot.as_mut() {
            diff_into(back, snapshot, &mut self.frame.runs, &mut stats);
        }
        stats.runs = self.frame.runs.len();

        // Writing cells moves the physical cursor.
        if stats.cells_rendered > 0 {
            self.cursor_at = None;
        }

        if let Cursor::At { x, y } = cursor {
            if back.in_bounds(x, y) && self.cursor_at != Some((x, y)) {
                self.frame.cursor = Some((x, y));
                self.cursor_at = Some((x, y));
            }
        }

        (&self.frame, stats)
    }
}

/// Append the runs where `back` differs from `snapshot` and bring the
/// snapshot up to date.
fn diff_into(back: &CellBuffer, snapshot: &mut CellBuffer, runs: &mut Vec<Run>, stats: &mut RenderStats) {
    let width = usize::from(back.width());

    for y in 0..back.height() {
        let (Some(curr_row), Some(prev_row)) = (back.row(y), snapshot.row(y)) else {
            continue;
        };
        if curr_row == prev_row {
            stats.cells_skipped += width;
            continue;
        }

        let mut open: Option<Run> = None;
        for (x, (curr, prev)) in (0u16..).zip(curr_row.iter().zip(prev_row)) {
            if curr == prev {
                stats.cells_skipped += 1;
                if let Some(run) = open.take() {
                    runs.push(run);
                }
                continue;
            }
            stats.cells_rendered += 1;
            match open.as_mut() {
                Some(run) => run.cells.push(*curr),
                None => {
                    open = Some(Run {
                        x,
                        y,
                        cells: vec![*curr],
                    });
                }
            }
        }
        if let Some(run) = open {
            runs.push(run);
        }
    }

    snapshot.copy_from(back);
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Attribute;
    use pretty_assertions::assert_eq;

    fn red(ch: char) -> Cell {
        Cell::new(ch, Attribute::RED, Attribute::DEFAULT)
    }

    // ── Cell diffing ────────────────────────────────────────────────────

    #[test]
    fn blank_buffer_on_fresh_screen_writes_nothing() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        let (frame, stats) = r.render(&back, Cursor::Hidden);
        assert!(frame.is_empty());
        assert_eq!(stats.cells_rendered, 0);
        assert_eq!(stats.cells_skipped, 24);
    }

    #[test]
    fn changed_cells_form_runs() {
        let mut back = CellBuffer::new(8, 3);
        back.set(1, 0, red('a'));
        back.set(2, 0, red('b'));
        back.set(5, 0, red('c'));
        back.set(0, 2, red('d'));

        let mut r = DiffRenderer::new(8, 3);
        let (frame, stats) = r.render(&back, Cursor::Hidden);
        assert_eq!(
            frame.runs,
            vec![
                Run { x: 1, y: 0, cells: vec![red('a'), red('b')] },
                Run { x: 5, y: 0, cells: vec![red('c')] },
                Run { x: 0, y: 2, cells: vec![red('d')] },
            ]
        );
        assert_eq!(stats.cells_rendered, 4);
        assert_eq!(stats.runs, 3);
        assert_eq!(stats.total_cells(), 24);
        assert!(!frame.clear);
    }

    #[test]
    fn run_reaches_end_of_row() {
        let mut back = CellBuffer::new(3, 1);
        back.set(1, 0, red('x'));
        back.set(2, 0, red('y'));
        let mut r = DiffRenderer::new(3, 1);
        let (frame, _) = r.render(&back, Cursor::Hidden);
        assert_eq!(frame.runs, vec![Run { x: 1, y: 0, cells: vec![red('x'), red('y')] }]);
    }

    #[test]
    fn runs_do_not_wrap_rows() {
        let mut back = CellBuffer::new(2, 2);
        back.set(1, 0, red('x'));
        back.set(0, 1, red('y'));
        let mut r = DiffRenderer::new(2, 2);
        let (frame, _) = r.render(&back, Cursor::Hidden);
        assert_eq!(frame.runs.len(), 2);
    }

    #[test]
    fn second_render_without_changes_is_empty() {
        let mut back = CellBuffer::new(8, 3);
        back.set(4, 1, red('q'));
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::Hidden);

        let (frame, stats) = r.render(&back, Cursor::Hidden);
        assert!(frame.is_empty());
        assert_eq!(stats.cells_rendered, 0);
    }

    #[test]
    fn attribute_change_alone_is_a_change() {
        let mut back = CellBuffer::new(2, 1);
        back.set(0, 0, red('q'));
        let mut r = DiffRenderer::new(2, 1);
        r.render(&back, Cursor::Hidden);

        back.set(0, 0, Cell::new('q', Attribute::GREEN, Attribute::DEFAULT));
        let (_, stats) = r.render(&back, Cursor::Hidden);
        assert_eq!(stats.cells_rendered, 1);
    }

    #[test]
    fn snapshot_tracks_written_content() {
        let mut back = CellBuffer::new(4, 2);
        back.set(2, 1, red('s'));
        let mut r = DiffRenderer::new(4, 2);
        r.render(&back, Cursor::Hidden);
        assert_eq!(r.snapshot(), Some(&back));
    }

    // ── Resize ──────────────────────────────────────────────────────────

    #[test]
    fn size_change_forces_clear_and_full_diff() {
        let mut r = DiffRenderer::new(4, 2);
        let mut back = CellBuffer::new(6, 3);
        back.set(5, 2, red('z'));

        let (frame, stats) = r.render(&back, Cursor::Hidden);
        assert!(frame.clear);
        assert!(stats.full_redraw);
        assert_eq!(stats.total_cells(), 18);
        assert_eq!(frame.runs, vec![Run { x: 5, y: 2, cells: vec![red('z')] }]);
        assert_eq!(r.snapshot().map(CellBuffer::width), Some(6));
    }

    #[test]
    fn invalidate_forces_clear_at_same_size() {
        let mut back = CellBuffer::new(4, 2);
        back.set(0, 0, red('a'));
        let mut r = DiffRenderer::new(4, 2);
        r.render(&back, Cursor::Hidden);

        r.invalidate();
        let (frame, stats) = r.render(&back, Cursor::Hidden);
        assert!(frame.clear);
        assert_eq!(stats.cells_rendered, 1, "diffed against a blank grid");
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn showing_cursor_emits_visibility_and_position() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        let (frame, _) = r.render(&back, Cursor::At { x: 2, y: 1 });
        assert_eq!(frame.cursor_visible, Some(true));
        assert_eq!(frame.cursor, Some((2, 1)));
    }

    #[test]
    fn unchanged_cursor_is_not_repositioned() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::At { x: 2, y: 1 });
        let (frame, _) = r.render(&back, Cursor::At { x: 2, y: 1 });
        assert!(frame.is_empty());
    }

    #[test]
    fn moved_cursor_is_repositioned() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::At { x: 2, y: 1 });
        let (frame, _) = r.render(&back, Cursor::At { x: 3, y: 1 });
        assert_eq!(frame.cursor_visible, None);
        assert_eq!(frame.cursor, Some((3, 1)));
    }

    #[test]
    fn cursor_restored_after_cells_written() {
        let mut back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::At { x: 0, y: 0 });

        back.set(7, 2, red('w'));
        let (frame, _) = r.render(&back, Cursor::At { x: 0, y: 0 });
        assert_eq!(frame.cursor, Some((0, 0)));
    }

    #[test]
    fn hidden_cursor_is_not_positioned() {
        let mut back = CellBuffer::new(8, 3);
        back.set(1, 1, red('h'));
        let mut r = DiffRenderer::new(8, 3);
        let (frame, _) = r.render(&back, Cursor::Hidden);
        assert_eq!(frame.cursor, None);
        assert_eq!(frame.cursor_visible, None);
    }

    #[test]
    fn hiding_emits_visibility_change_once() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::At { x: 1, y: 1 });
        let (frame, _) = r.render(&back, Cursor::Hidden);
        assert_eq!(frame.cursor_visible, Some(false));
        let (frame, _) = r.render(&back, Cursor::Hidden);
        assert!(frame.is_empty());
    }

    #[test]
    fn out_of_bounds_cursor_is_not_positioned() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        let (frame, _) = r.render(&back, Cursor::At { x: 8, y: 0 });
        assert_eq!(frame.cursor_visible, Some(true));
        assert_eq!(frame.cursor, None);
    }

    #[test]
    fn cursor_repositioned_after_clear() {
        let back = CellBuffer::new(8, 3);
        let mut r = DiffRenderer::new(8, 3);
        r.render(&back, Cursor::At { x: 1, y: 1 });
        r.invalidate();
        let (frame, _) = r.render(&back, Cursor::At { x: 1, y: 1 });
        assert!(frame.clear);
        assert_eq!(frame.cursor, Some((1, 1)));
    }

    // ── Frame ───────────────────────────────────────────────────────────

    #[test]
    fn frame_cell_count() {
        let frame = Frame {
            runs: vec![
                Run { x: 0, y: 0, cells: vec![Cell::EMPTY; 3] },
                Run { x: 0, y: 1, cells: vec![Cell::EMPTY; 2] },
            ],
            ..Frame::default()
        };
        assert_eq!(frame.cell_count(), 5);
        assert!(!frame.is_empty());
    }
}
