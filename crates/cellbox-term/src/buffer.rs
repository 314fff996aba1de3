// SPDX-License-Identifier: MIT
//
// CellBuffer: the grid the application draws into.
//
// The session owns one of these as its back buffer and the diff renderer
// owns another as its snapshot of what the terminal currently shows.
//
// Flat `Vec<Cell>` with row-major indexing: a row's cells are contiguous,
// so the renderer's left-to-right scan is linear and a whole unchanged row
// can be skipped with one slice comparison.
//
// Writes are bounds-checked and silently ignored when out of range. During
// a resize the application may still be drawing against the old size for
// a frame; that must never be fatal.

use crate::cell::{Attribute, Cell};

/// A width × height grid of cells.
///
/// # Examples
///
/// ```
/// use cellbox_term::buffer::CellBuffer;
/// use cellbox_term::cell::{Attribute, Cell};
///
/// let mut buf = CellBuffer::new(80, 24);
/// buf.set(5, 3, Cell::new('X', Attribute::RED, Attribute::DEFAULT));
/// assert_eq!(buf.get(5, 3).map(|c| c.ch), Some('X'));
///
/// // Out of range: ignored.
/// assert!(!buf.set(80, 0, Cell::EMPTY));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    // ─── Construction ────────────────────────────────────────────────────

    /// A buffer filled with [`Cell::EMPTY`].
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; usize::from(width) * usize::from(height)],
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// The cell at `(x, y)`, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice, or `None` if `y` is out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    // ─── Mutation ────────────────────────────────────────────────────────

    /// Write a cell. Returns `false` (and writes nothing) when out of bounds.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        true
    }

    /// Fill every cell with a space in the given attributes.
    pub fn clear(&mut self, fg: Attribute, bg: Attribute) {
        self.cells.fill(Cell::new(' ', fg, bg));
    }

    /// Reallocate at a new size. All previous content is discarded.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells
            .resize(usize::from(width) * usize::from(height), Cell::EMPTY);
    }

    /// Overwrite this buffer with `other`, reusing the allocation when the
    /// sizes match.
    pub fn copy_from(&mut self, other: &Self) {
        if self.width == other.width && self.height == other.height {
            self.cells.copy_from_slice(&other.cells);
        } else {
            self.clone_from(other);
        }
    }
}

impl std::fmt::Debug for CellBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CellBuffer {}x{}", self.width, self.height)?;
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                let line: String = row.iter().map(|c| c.ch).collect();
                writeln!(f, "|{line}|")?;
            }
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
