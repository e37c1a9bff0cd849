//! Scrollback storage: lines evicted from the top of the primary screen.
//!
//! Grounded in `HistoryBuffer`/`HistoryScroll` from
//! `examples/original_source/include/TEHistory.h`: two append-only buffers,
//! one holding the concatenated cell data and one holding where each line
//! starts within it. The original backs both buffers with temp files; the
//! backing storage is otherwise invisible above this interface, so this
//! crate keeps both buffers memory-resident (`Vec<Cell>` / `Vec<usize>`) —
//! a `StorageFailure` is therefore not reachable in the in-memory
//! implementation, but the degrade-to-no-op path (the emulation above must
//! fall back to a no-history mode rather than crash) is still modeled via
//! `mark_failed`, so a future file-backed store can report into the same
//! state machine without changing the contract.

use crate::cell::Cell;

/// Append-only scrollback of past lines, optionally bounded to a maximum
/// line count.
pub struct HistoryRing {
    max_lines: Option<usize>,
    cells: Vec<Cell>,
    /// Offset into `cells` where each finalized line begins.
    line_starts: Vec<usize>,
    line_lens: Vec<usize>,
    /// Cells appended via `add_cells` since the last `add_line`.
    pending: Vec<Cell>,
    /// Set once the backing store has failed; all further writes are
    /// silently dropped and reads see an empty history.
    failed: bool,
}

impl HistoryRing {
    /// An unbounded ring: lines accumulate forever.
    pub fn unbounded() -> Self {
        HistoryRing {
            max_lines: None,
            cells: Vec::new(),
            line_starts: Vec::new(),
            line_lens: Vec::new(),
            pending: Vec::new(),
            failed: false,
        }
    }

    /// A ring that discards the oldest line once `max_lines` is exceeded.
    pub fn bounded(max_lines: usize) -> Self {
        HistoryRing {
            max_lines: Some(max_lines),
            ..Self::unbounded()
        }
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.cells.clear();
        self.line_starts.clear();
        self.line_lens.clear();
        self.pending.clear();
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Append cells to the line currently being assembled.
    pub fn add_cells(&mut self, cells: &[Cell]) {
        if self.failed {
            return;
        }
        self.pending.extend_from_slice(cells);
    }

    /// Finalize the pending line: its length is whatever was accumulated
    /// by `add_cells` since the previous call.
    pub fn add_line(&mut self) {
        if self.failed {
            return;
        }
        let start = self.cells.len();
        let len = self.pending.len();
        self.cells.append(&mut self.pending);
        self.line_starts.push(start);
        self.line_lens.push(len);

        if let Some(max) = self.max_lines {
            if self.line_lens.len() > max {
                self.evict_oldest();
            }
        }
    }

    fn evict_oldest(&mut self) {
        let dropped_len = self.line_lens.remove(0);
        self.line_starts.remove(0);
        self.cells.drain(0..dropped_len);
        for start in self.line_starts.iter_mut() {
            *start -= dropped_len;
        }
    }

    pub fn len(&self) -> usize {
        self.line_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length, in cells, of finalized line `i`. A line keeps the width it
    /// had when it was evicted, forever; resizing the live screen
    /// afterward has no effect on this value.
    pub fn line_len(&self, i: usize) -> usize {
        self.line_lens[i]
    }

    /// Copy `count` cells from `(line_index, col)` into `out`.
    /// Precondition: `col + count <= line_len(line_index)`.
    pub fn get_cells(&self, line_index: usize, col: usize, count: usize, out: &mut [Cell]) {
        debug_assert!(col + count <= self.line_lens[line_index]);
        let start = self.line_starts[line_index] + col;
        out[..count].copy_from_slice(&self.cells[start..start + count]);
    }

    pub fn max_lines(&self) -> Option<usize> {
        self.max_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Pen;

    fn line(text: &str) -> Vec<Cell> {
        text.chars().map(|c| Cell::written(c, Pen::default())).collect()
    }

    #[test]
    fn unbounded_accumulates_every_line() {
        let mut h = HistoryRing::unbounded();
        h.add_cells(&line("abc"));
        h.add_line();
        h.add_cells(&line("de"));
        h.add_line();
        assert_eq!(h.len(), 2);
        assert_eq!(h.line_len(0), 3);
        assert_eq!(h.line_len(1), 2);

        let mut out = vec![Cell::default(); 3];
        h.get_cells(0, 0, 3, &mut out);
        let s: String = out.iter().map(|c| c.character).collect();
        assert_eq!(s, "abc");
    }

    #[test]
    fn bounded_evicts_oldest_line() {
        let mut h = HistoryRing::bounded(2);
        for text in ["a", "b", "c"] {
            h.add_cells(&line(text));
            h.add_line();
        }
        assert_eq!(h.len(), 2);
        let mut out = vec![Cell::default(); 1];
        h.get_cells(0, 0, 1, &mut out);
        assert_eq!(out[0].character, 'b');
        h.get_cells(1, 0, 1, &mut out);
        assert_eq!(out[0].character, 'c');
    }

    #[test]
    fn line_len_is_frozen_at_eviction_width() {
        let mut h = HistoryRing::unbounded();
        h.add_cells(&line("abcdefgh"));
        h.add_line();
        h.add_cells(&line("xy"));
        h.add_line();
        assert_eq!(h.line_len(0), 8);
        assert_eq!(h.line_len(1), 2);
    }

    #[test]
    fn mark_failed_degrades_to_noop() {
        let mut h = HistoryRing::unbounded();
        h.add_cells(&line("abc"));
        h.add_line();
        h.mark_failed();
        assert!(h.is_failed());
        assert_eq!(h.len(), 0);
        h.add_cells(&line("ignored"));
        h.add_line();
        assert_eq!(h.len(), 0);
    }
}
