//! The attributed cell grid: cursor, margins, tab stops, scrolling,
//! selection, and resize.
//!
//! Grounded in `TEScreen` (`examples/original_source/include/TEScreen.h`):
//! field names below echo the original (`cu_x`/`cu_y` → `cursor`,
//! `tmargin`/`bmargin`, `tabstops`, `sa_*` saved-cursor fields, the six
//! `MODE_*` screen mode bits, the six clear operations, and
//! `getCookedImage`/`getHistLines`/selection accessors) adapted to own a
//! [`crate::history::HistoryRing`] directly (the original reaches it
//! through the owning `VT102Emulation`) and to a `char`-based `Cell`
//! instead of the original's single-byte `ca`.

use crate::cell::{Cell, Color, Pen, Rendition, WideFlag};
use crate::charset::{Charset, CharsetState};
use crate::history::HistoryRing;

/// One row of the grid.
#[derive(Debug, Clone)]
pub struct Line {
    pub cells: Vec<Cell>,
    /// True if this line logically continues on the next row (the cursor
    /// wrapped here rather than a real line break being written).
    pub wrapped: bool,
}

impl Line {
    fn blank(cols: usize, pen: Pen) -> Self {
        Line {
            cells: vec![Cell::blank(pen); cols],
            wrapped: false,
        }
    }
}

/// The six screen-level mode flags from `TEScreen.h`'s `MODES_SCREEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    Origin,
    AutoWrap,
    Insert,
    /// `MODE_Screen` — reverse video for the whole screen.
    ReverseVideo,
    CursorVisible,
    NewLine,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModeSet(u8);

impl ModeSet {
    fn bit(mode: ScreenMode) -> u8 {
        match mode {
            ScreenMode::Origin => 1 << 0,
            ScreenMode::AutoWrap => 1 << 1,
            ScreenMode::Insert => 1 << 2,
            ScreenMode::ReverseVideo => 1 << 3,
            ScreenMode::CursorVisible => 1 << 4,
            ScreenMode::NewLine => 1 << 5,
        }
    }

    fn get(self, mode: ScreenMode) -> bool {
        self.0 & Self::bit(mode) != 0
    }

    fn set(&mut self, mode: ScreenMode, value: bool) {
        if value {
            self.0 |= Self::bit(mode);
        } else {
            self.0 &= !Self::bit(mode);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SavedCursor {
    x: usize,
    y: usize,
    pen: Pen,
    charset: CharsetState,
}

/// A point in the combined history+screen coordinate space used for
/// selection: `line` indexes `0..history.len()+rows`, history first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AbsPos {
    line: usize,
    col: usize,
}

/// A rectangular-by-line text selection over the displayed image.
#[derive(Debug, Clone, Copy)]
struct Selection {
    anchor: AbsPos,
    tl: AbsPos,
    br: AbsPos,
}

pub struct Screen {
    rows: usize,
    cols: usize,
    cursor_x: usize,
    cursor_y: usize,
    /// Set when the cursor sits at the last column and the *next* printable
    /// character should trigger auto-wrap (delayed wrap) rather than
    /// overwrite in place.
    wrap_pending: bool,
    tmargin: usize,
    bmargin: usize,
    tabstops: Vec<bool>,
    pen: Pen,
    effective_pen: Pen,
    modes: ModeSet,
    saved_modes: ModeSet,
    saved_cursor: Option<SavedCursor>,
    charset: CharsetState,
    grid: Vec<Line>,
    /// `Some` for the primary screen, `None` for the alternate screen —
    /// the alternate screen never writes to history.
    history: Option<HistoryRing>,
    /// Vertical scroll offset into history; 0 means "live view".
    hist_cursor: usize,
    selection: Option<Selection>,
}

impl Screen {
    pub fn new(rows: usize, cols: usize, with_history: Option<HistoryRing>) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut modes = ModeSet::default();
        modes.set(ScreenMode::AutoWrap, true);
        modes.set(ScreenMode::CursorVisible, true);
        Screen {
            rows,
            cols,
            cursor_x: 0,
            cursor_y: 0,
            wrap_pending: false,
            tmargin: 0,
            bmargin: rows - 1,
            tabstops: default_tabstops(cols),
            pen: Pen::default(),
            effective_pen: Pen::default(),
            modes,
            saved_modes: ModeSet::default(),
            saved_cursor: None,
            charset: CharsetState::default(),
            grid: (0..rows).map(|_| Line::blank(cols, Pen::default())).collect(),
            history: with_history,
            hist_cursor: 0,
            selection: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn has_wrap_pending(&self) -> bool {
        self.wrap_pending
    }

    pub fn history(&self) -> Option<&HistoryRing> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut HistoryRing> {
        self.history.as_mut()
    }

    // ---- modes ----

    pub fn get_mode(&self, mode: ScreenMode) -> bool {
        self.modes.get(mode)
    }

    pub fn set_mode(&mut self, mode: ScreenMode) {
        self.modes.set(mode, true);
        if mode == ScreenMode::ReverseVideo {
            self.sync_effective_pen();
        }
    }

    pub fn reset_mode(&mut self, mode: ScreenMode) {
        self.modes.set(mode, false);
        if mode == ScreenMode::ReverseVideo {
            self.sync_effective_pen();
        }
    }

    pub fn save_mode(&mut self, mode: ScreenMode) {
        self.saved_modes.set(mode, self.modes.get(mode));
    }

    pub fn restore_mode(&mut self, mode: ScreenMode) {
        self.modes.set(mode, self.saved_modes.get(mode));
        if mode == ScreenMode::ReverseVideo {
            self.sync_effective_pen();
        }
    }

    fn sync_effective_pen(&mut self) {
        self.effective_pen = if self.modes.get(ScreenMode::ReverseVideo) {
            self.pen.swapped()
        } else {
            self.pen
        };
    }

    fn active_region(&self) -> (usize, usize) {
        if self.modes.get(ScreenMode::Origin) {
            (self.tmargin, self.bmargin)
        } else {
            (0, self.rows - 1)
        }
    }

    // ---- cursor motion ----

    pub fn cursor_up(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let (top, _) = self.active_region();
        self.cursor_y = self.cursor_y.saturating_sub(n).max(top);
        self.wrap_pending = false;
    }

    pub fn cursor_down(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let (_, bottom) = self.active_region();
        self.cursor_y = (self.cursor_y + n).min(bottom);
        self.wrap_pending = false;
    }

    pub fn cursor_left(&mut self, n: usize) {
        self.cursor_x = self.cursor_x.saturating_sub(n);
        self.wrap_pending = false;
    }

    pub fn cursor_right(&mut self, n: usize) {
        self.cursor_x = (self.cursor_x + n).min(self.cols - 1);
        self.wrap_pending = false;
    }

    pub fn set_cursor_x(&mut self, x: usize) {
        self.cursor_x = x.min(self.cols - 1);
        self.wrap_pending = false;
    }

    pub fn set_cursor_y(&mut self, y: usize) {
        let (top, bottom) = self.active_region();
        let target = if self.modes.get(ScreenMode::Origin) {
            top + y
        } else {
            y
        };
        self.cursor_y = target.clamp(top, bottom);
        self.wrap_pending = false;
    }

    pub fn set_cursor_xy(&mut self, x: usize, y: usize) {
        self.set_cursor_x(x);
        self.set_cursor_y(y);
    }

    // ---- motion with scrolling ----

    /// Cursor down; scrolls the region (and, for the primary screen with a
    /// full-screen region, evicts the top line to history) when already at
    /// the bottom margin.
    pub fn index(&mut self) {
        if self.cursor_y == self.bmargin {
            self.scroll_up_region(1);
        } else {
            self.cursor_y = (self.cursor_y + 1).min(self.rows - 1);
        }
        self.wrap_pending = false;
    }

    pub fn reverse_index(&mut self) {
        if self.cursor_y == self.tmargin {
            self.scroll_down_region(1);
        } else {
            self.cursor_y = self.cursor_y.saturating_sub(1);
        }
        self.wrap_pending = false;
    }

    pub fn next_line(&mut self) {
        self.cursor_x = 0;
        self.index();
    }

    pub fn new_line(&mut self) {
        self.index();
        if self.modes.get(ScreenMode::NewLine) {
            self.cursor_x = 0;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor_x = 0;
        self.wrap_pending = false;
    }

    /// `CSI n S`: scroll the region up `n` lines without moving the cursor.
    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_up_region(n);
    }

    /// `CSI n T`: scroll the region down `n` lines without moving the cursor.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_down_region(n);
    }

    fn scroll_up_region(&mut self, n: usize) {
        let full_screen = self.tmargin == 0 && self.bmargin == self.rows - 1;
        for _ in 0..n {
            let removed = self.grid.remove(self.tmargin);
            if full_screen {
                if let Some(history) = self.history.as_mut() {
                    history.add_cells(&removed.cells);
                    history.add_line();
                }
            }
            self.grid.insert(self.bmargin, Line::blank(self.cols, self.pen));
        }
    }

    fn scroll_down_region(&mut self, n: usize) {
        for _ in 0..n {
            self.grid.remove(self.bmargin);
            self.grid.insert(self.tmargin, Line::blank(self.cols, self.pen));
        }
    }

    // ---- editing ----

    pub fn erase_chars(&mut self, n: usize) {
        let row = self.cursor_y;
        let start = self.cursor_x;
        let end = (start + n).min(self.cols);
        let fill = self.erase_cell();
        for cell in &mut self.grid[row].cells[start..end] {
            *cell = fill;
        }
    }

    pub fn delete_chars(&mut self, n: usize) {
        let row = self.cursor_y;
        let start = self.cursor_x;
        let cols = self.cols;
        let fill = self.erase_cell();
        let line = &mut self.grid[row].cells;
        let n = n.min(cols - start);
        line.copy_within(start + n..cols, start);
        for cell in &mut line[cols - n..cols] {
            *cell = fill;
        }
    }

    pub fn insert_chars(&mut self, n: usize) {
        let row = self.cursor_y;
        let start = self.cursor_x;
        let cols = self.cols;
        let fill = self.erase_cell();
        let n = n.min(cols - start);
        let line = &mut self.grid[row].cells;
        line.copy_within(start..cols - n, start + n);
        for cell in &mut line[start..start + n] {
            *cell = fill;
        }
    }

    pub fn delete_lines(&mut self, n: usize) {
        if self.cursor_y < self.tmargin || self.cursor_y > self.bmargin {
            return;
        }
        let n = n.min(self.bmargin - self.cursor_y + 1);
        for _ in 0..n {
            self.grid.remove(self.cursor_y);
            self.grid.insert(self.bmargin, Line::blank(self.cols, self.pen));
        }
    }

    pub fn insert_lines(&mut self, n: usize) {
        if self.cursor_y < self.tmargin || self.cursor_y > self.bmargin {
            return;
        }
        let n = n.min(self.bmargin - self.cursor_y + 1);
        for _ in 0..n {
            self.grid.remove(self.bmargin);
            self.grid.insert(self.cursor_y, Line::blank(self.cols, self.pen));
        }
    }

    // ---- clearing ----

    fn erase_cell(&self) -> Cell {
        Cell::blank(Pen {
            foreground: Color::Default,
            background: self.effective_pen.background,
            rendition: Rendition::NONE,
        })
    }

    pub fn clear_entire_screen(&mut self) {
        let fill = self.erase_cell();
        for line in &mut self.grid {
            line.cells.fill(fill);
            line.wrapped = false;
        }
    }

    pub fn clear_to_end_of_screen(&mut self) {
        self.clear_to_end_of_line();
        let fill = self.erase_cell();
        for line in &mut self.grid[self.cursor_y + 1..] {
            line.cells.fill(fill);
            line.wrapped = false;
        }
    }

    pub fn clear_to_begin_of_screen(&mut self) {
        self.clear_to_begin_of_line();
        let fill = self.erase_cell();
        for line in &mut self.grid[..self.cursor_y] {
            line.cells.fill(fill);
            line.wrapped = false;
        }
    }

    pub fn clear_entire_line(&mut self) {
        let fill = self.erase_cell();
        self.grid[self.cursor_y].cells.fill(fill);
    }

    pub fn clear_to_end_of_line(&mut self) {
        let row = self.cursor_y;
        let start = self.cursor_x;
        let fill = self.erase_cell();
        for cell in &mut self.grid[row].cells[start..] {
            *cell = fill;
        }
    }

    pub fn clear_to_begin_of_line(&mut self) {
        let row = self.cursor_y;
        let end = self.cursor_x + 1;
        let fill = self.erase_cell();
        for cell in &mut self.grid[row].cells[..end.min(self.cols)] {
            *cell = fill;
        }
    }

    // ---- tabs ----

    pub fn tabulate(&mut self) {
        let mut x = self.cursor_x + 1;
        while x < self.cols - 1 && !self.tabstops[x] {
            x += 1;
        }
        self.cursor_x = x.min(self.cols - 1);
        self.wrap_pending = false;
    }

    /// Move backward to the previous tab stop (CSI Z), or column 0.
    pub fn back_tabulate(&mut self) {
        let mut x = self.cursor_x;
        while x > 0 {
            x -= 1;
            if self.tabstops[x] {
                break;
            }
        }
        self.cursor_x = x;
        self.wrap_pending = false;
    }

    pub fn change_tab_stop(&mut self, set: bool) {
        self.tabstops[self.cursor_x] = set;
    }

    pub fn clear_tab_stops(&mut self) {
        self.tabstops.iter_mut().for_each(|t| *t = false);
    }

    // ---- rendition ----

    pub fn set_rendition(&mut self, bits: Rendition) {
        self.pen.rendition.insert(bits);
        self.sync_effective_pen();
    }

    pub fn reset_rendition(&mut self, bits: Rendition) {
        self.pen.rendition.remove(bits);
        self.sync_effective_pen();
    }

    pub fn set_fore_color(&mut self, c: Color) {
        self.pen.foreground = c;
        self.sync_effective_pen();
    }

    pub fn set_back_color(&mut self, c: Color) {
        self.pen.background = c;
        self.sync_effective_pen();
    }

    pub fn set_fore_color_default(&mut self) {
        self.set_fore_color(Color::Default);
    }

    pub fn set_back_color_default(&mut self) {
        self.set_back_color(Color::Default);
    }

    pub fn set_default_rendition(&mut self) {
        self.pen = Pen::default();
        self.sync_effective_pen();
    }

    pub fn pen(&self) -> Pen {
        self.pen
    }

    // ---- charset ----

    pub fn designate_charset(&mut self, slot: usize, charset: Charset) {
        self.charset.designate(slot, charset);
    }

    pub fn shift_in(&mut self) {
        self.charset.shift_in();
    }

    pub fn shift_out(&mut self) {
        self.charset.shift_out();
    }

    // ---- cursor save/restore ----

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            x: self.cursor_x,
            y: self.cursor_y,
            pen: self.pen,
            charset: self.charset,
        });
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor {
            self.cursor_x = saved.x.min(self.cols - 1);
            self.cursor_y = saved.y.min(self.rows - 1);
            self.pen = saved.pen;
            self.charset = saved.charset;
            self.sync_effective_pen();
            self.wrap_pending = false;
        }
    }

    // ---- margins ----

    pub fn set_margins(&mut self, top: usize, bottom: usize) {
        let (top, bottom) = if top < bottom && bottom < self.rows {
            (top, bottom)
        } else {
            (0, self.rows - 1)
        };
        self.tmargin = top;
        self.bmargin = bottom;
        self.cursor_x = 0;
        self.cursor_y = self.active_region().0;
        self.wrap_pending = false;
    }

    pub fn margins(&self) -> (usize, usize) {
        (self.tmargin, self.bmargin)
    }

    // ---- printing ----

    /// Write one already-decoded Unicode scalar at the cursor, applying
    /// this screen's charset mapping, delayed auto-wrap, and Insert mode.
    pub fn print_char(&mut self, raw: char) {
        let ch = self.charset.translate(raw);
        let wide = is_wide(ch);

        if self.wrap_pending {
            if self.get_mode(ScreenMode::AutoWrap) {
                self.grid[self.cursor_y].wrapped = true;
                self.cursor_x = 0;
                self.index();
            }
            self.wrap_pending = false;
        }

        if self.get_mode(ScreenMode::Insert) {
            self.shift_right_for_insert(if wide { 2 } else { 1 });
        }

        let row = self.cursor_y;
        let col = self.cursor_x;
        let cell = Cell::written(ch, self.effective_pen);
        self.grid[row].cells[col] = Cell {
            wide_flag: if wide { WideFlag::LeadingOfDouble } else { WideFlag::Single },
            ..cell
        };
        if wide && col + 1 < self.cols {
            self.grid[row].cells[col + 1] = Cell {
                wide_flag: WideFlag::TrailingOfDouble,
                ..cell
            };
        }
        self.invalidate_wide_neighbours(row, col);

        let advance = if wide { 2 } else { 1 };
        if col + advance >= self.cols {
            self.cursor_x = self.cols - 1;
            self.wrap_pending = true;
        } else {
            self.cursor_x = col + advance;
        }
    }

    fn shift_right_for_insert(&mut self, n: usize) {
        let row = self.cursor_y;
        let start = self.cursor_x;
        let cols = self.cols;
        let fill = Cell::blank(self.effective_pen);
        let n = n.min(cols - start);
        let line = &mut self.grid[row].cells;
        line.copy_within(start..cols - n, start + n);
        for cell in &mut line[start..start + n] {
            *cell = fill;
        }
    }

    /// Invariant I3: writing a cell breaks any double-width pair it was
    /// previously part of; the orphaned neighbour reverts to Single.
    fn invalidate_wide_neighbours(&mut self, row: usize, col: usize) {
        if col > 0 {
            if self.grid[row].cells[col - 1].wide_flag == WideFlag::LeadingOfDouble
                && self.grid[row].cells[col].wide_flag != WideFlag::TrailingOfDouble
            {
                self.grid[row].cells[col - 1].wide_flag = WideFlag::Single;
            }
        }
        if col + 1 < self.cols
            && self.grid[row].cells[col + 1].wide_flag == WideFlag::TrailingOfDouble
            && self.grid[row].cells[col].wide_flag != WideFlag::LeadingOfDouble
        {
            self.grid[row].cells[col + 1] = Cell::blank(self.effective_pen);
        }
    }

    // ---- resize ----

    pub fn resize(&mut self, new_rows: usize, new_cols: usize) {
        let new_rows = new_rows.max(1);
        let new_cols = new_cols.max(1);

        if new_rows < self.rows {
            let drop_count = self.rows - new_rows;
            let drained: Vec<Line> = self.grid.drain(0..drop_count).collect();
            if let Some(history) = self.history.as_mut() {
                for line in drained {
                    if line.cells.iter().any(|c| !c.is_default()) {
                        history.add_cells(&line.cells);
                        history.add_line();
                    }
                }
            }
        } else if new_rows > self.rows {
            for _ in 0..(new_rows - self.rows) {
                self.grid.push(Line::blank(self.cols, Pen::default()));
            }
        }

        for line in &mut self.grid {
            if new_cols > self.cols {
                line.cells.extend(vec![Cell::blank(Pen::default()); new_cols - self.cols]);
            } else if new_cols < self.cols {
                line.cells.truncate(new_cols);
            }
        }

        if new_cols != self.cols {
            self.tabstops = default_tabstops(new_cols);
        }

        self.rows = new_rows;
        self.cols = new_cols;
        self.tmargin = 0;
        self.bmargin = new_rows - 1;
        self.cursor_x = self.cursor_x.min(new_cols - 1);
        self.cursor_y = self.cursor_y.min(new_rows - 1);
        self.wrap_pending = false;
    }

    // ---- snapshot ----

    /// A `rows x cols` self-consistent snapshot: reverse video baked in,
    /// selection marked via `Rendition::SELECTED`, and the history-cursor
    /// scroll offset applied.
    pub fn cooked_image(&self) -> Vec<Cell> {
        let hist_len = self.history.as_ref().map(HistoryRing::len).unwrap_or(0);
        let window_start = hist_len.saturating_sub(self.hist_cursor);

        let mut out = Vec::with_capacity(self.rows * self.cols);
        for r in 0..self.rows {
            let abs_line = window_start + r;
            let mut row_cells = self.display_line(abs_line, hist_len);
            if self.get_mode(ScreenMode::ReverseVideo) {
                for c in &mut row_cells {
                    std::mem::swap(&mut c.foreground, &mut c.background);
                }
            }
            if let Some(sel) = self.selection {
                for (col, c) in row_cells.iter_mut().enumerate() {
                    let pos = AbsPos { line: abs_line, col };
                    if pos >= sel.tl && pos <= sel.br {
                        c.rendition.insert(Rendition::SELECTED);
                    }
                }
            }
            out.extend(row_cells);
        }
        out
    }

    /// Cells of line `abs_line` in the combined history+screen index
    /// space (history first, `0..hist_len`; screen rows `hist_len..`).
    fn display_line(&self, abs_line: usize, hist_len: usize) -> Vec<Cell> {
        if abs_line < hist_len {
            let history = self.history.as_ref().unwrap();
            let len = history.line_len(abs_line).min(self.cols);
            let mut out = vec![Cell::default(); len];
            history.get_cells(abs_line, 0, len, &mut out);
            out.resize(self.cols, Cell::default());
            out
        } else {
            let row = abs_line - hist_len;
            if row < self.grid.len() {
                self.grid[row].cells.clone()
            } else {
                vec![Cell::default(); self.cols]
            }
        }
    }

    pub fn set_hist_cursor(&mut self, offset: usize) {
        let hist_len = self.history.as_ref().map(HistoryRing::len).unwrap_or(0);
        self.hist_cursor = offset.min(hist_len);
    }

    pub fn hist_cursor(&self) -> usize {
        self.hist_cursor
    }

    // ---- selection ----

    fn to_abs(&self, x: usize, y: usize) -> AbsPos {
        let hist_len = self.history.as_ref().map(HistoryRing::len).unwrap_or(0);
        let window_start = hist_len.saturating_sub(self.hist_cursor);
        AbsPos { line: window_start + y, col: x }
    }

    pub fn set_sel_begin_xy(&mut self, x: usize, y: usize) {
        let anchor = self.to_abs(x, y);
        self.selection = Some(Selection { anchor, tl: anchor, br: anchor });
    }

    pub fn set_sel_extent_xy(&mut self, x: usize, y: usize) {
        let extent = self.to_abs(x, y);
        if let Some(sel) = self.selection.as_mut() {
            sel.tl = sel.anchor.min(extent);
            sel.br = sel.anchor.max(extent);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn get_sel_text(&self, preserve_line_breaks: bool) -> String {
        let Some(sel) = self.selection else { return String::new() };
        let hist_len = self.history.as_ref().map(HistoryRing::len).unwrap_or(0);
        let mut out = String::new();
        for line in sel.tl.line..=sel.br.line {
            let cells = self.display_line(line, hist_len);
            let start = if line == sel.tl.line { sel.tl.col } else { 0 };
            let end = if line == sel.br.line { sel.br.col + 1 } else { cells.len() };
            let end = end.min(cells.len());
            for cell in &cells[start.min(cells.len())..end] {
                if cell.wide_flag != WideFlag::TrailingOfDouble {
                    out.push(cell.character);
                }
            }
            if line != sel.br.line {
                out.push(if preserve_line_breaks { '\n' } else { ' ' });
            }
        }
        out
    }

    /// Reset this screen to its constructor defaults, as part of a full
    /// terminal reset applied per-screen.
    pub fn reset(&mut self) {
        let rows = self.rows;
        let cols = self.cols;
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.wrap_pending = false;
        self.tmargin = 0;
        self.bmargin = rows - 1;
        self.tabstops = default_tabstops(cols);
        self.pen = Pen::default();
        self.effective_pen = Pen::default();
        self.modes = ModeSet::default();
        self.modes.set(ScreenMode::AutoWrap, true);
        self.modes.set(ScreenMode::CursorVisible, true);
        self.saved_modes = ModeSet::default();
        self.saved_cursor = None;
        self.charset = CharsetState::default();
        self.grid = (0..rows).map(|_| Line::blank(cols, Pen::default())).collect();
        self.hist_cursor = 0;
        self.selection = None;
    }
}

fn default_tabstops(cols: usize) -> Vec<bool> {
    (0..cols).map(|c| c % 8 == 0).collect()
}

/// A conservative East-Asian-Wide check covering the common ranges; not a
/// full Unicode East Asian Width table, but enough to exercise the
/// double-width cell pairing machinery below.
fn is_wide(ch: char) -> bool {
    let c = ch as u32;
    matches!(c,
        0x1100..=0x115F |
        0x2E80..=0xA4CF |
        0xAC00..=0xD7A3 |
        0xF900..=0xFAFF |
        0xFF00..=0xFF60 |
        0xFFE0..=0xFFE6 |
        0x20000..=0x3FFFD
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(rows: usize, cols: usize) -> Screen {
        Screen::new(rows, cols, Some(HistoryRing::unbounded()))
    }

    #[test]
    fn auto_wrap_moves_to_next_row() {
        let mut s = screen(2, 80);
        for _ in 0..80 {
            s.print_char('A');
        }
        s.print_char('B');
        assert_eq!(s.cursor(), (1, 1));
        assert_eq!(s.grid[0].cells[79].character, 'A');
        assert_eq!(s.grid[1].cells[0].character, 'B');
    }

    #[test]
    fn delayed_wrap_keeps_cursor_at_last_column() {
        let mut s = screen(2, 80);
        for _ in 0..80 {
            s.print_char('A');
        }
        assert_eq!(s.cursor(), (79, 0));
        assert!(s.has_wrap_pending());
        assert!(s.grid[1].cells.iter().all(|c| c.character == ' '));
    }

    #[test]
    fn clear_to_end_of_line() {
        let mut s = screen(3, 10);
        for ch in "0123456789".chars() {
            s.print_char(ch);
        }
        s.set_cursor_xy(4, 1);
        s.clear_to_end_of_line();
        let row = &s.grid[1].cells;
        for c in &row[4..10] {
            assert_eq!(c.character, ' ');
        }
    }

    #[test]
    fn scrolling_region_confines_index() {
        let mut s = screen(5, 10);
        s.set_margins(1, 3);
        for (i, line) in s.grid.iter_mut().enumerate() {
            line.cells[0].character = (b'0' + i as u8) as char;
        }
        s.set_cursor_xy(0, 3);
        s.index();
        assert_eq!(s.grid[1].cells[0].character, '2');
        assert_eq!(s.grid[2].cells[0].character, '3');
        assert_eq!(s.grid[4].cells[0].character, '4');
    }

    #[test]
    fn sgr_256_color_sets_and_resets_foreground() {
        let mut s = screen(1, 10);
        s.set_fore_color(Color::Indexed(201));
        s.print_char('X');
        assert_eq!(s.grid[0].cells[0].foreground, Color::Indexed(201));
        s.set_default_rendition();
        s.print_char('Y');
        assert_eq!(s.grid[0].cells[1].foreground, Color::Default);
    }

    #[test]
    fn history_eviction_on_scroll() {
        let mut s = screen(24, 80);
        for i in 0..100 {
            s.print_char((b'0' + (i % 10) as u8) as char);
            s.next_line();
        }
        let history = s.history().unwrap();
        assert_eq!(history.len(), 76);
        assert_eq!(history.line_len(0), 80);
    }

    #[test]
    fn resize_preserves_overlap_and_pads_new_columns() {
        let mut s = screen(3, 5);
        s.print_char('H');
        s.resize(3, 8);
        assert_eq!(s.grid[0].cells[0].character, 'H');
        assert_eq!(s.grid[0].cells[7].character, ' ');
    }

    #[test]
    fn resize_is_idempotent_up_to_clamping() {
        let mut s1 = screen(10, 20);
        let mut s2 = screen(10, 20);
        s1.resize(6, 15);
        s2.resize(6, 15);
        s2.resize(6, 15);
        assert_eq!(s1.rows(), s2.rows());
        assert_eq!(s1.cols(), s2.cols());
    }

    #[test]
    fn wide_char_pair_invalidated_on_overwrite() {
        let mut s = screen(1, 10);
        s.print_char('\u{4E2D}'); // CJK wide char
        assert_eq!(s.grid[0].cells[0].wide_flag, WideFlag::LeadingOfDouble);
        assert_eq!(s.grid[0].cells[1].wide_flag, WideFlag::TrailingOfDouble);
        s.set_cursor_xy(0, 0);
        s.print_char('x');
        assert_eq!(s.grid[0].cells[0].wide_flag, WideFlag::Single);
        assert_eq!(s.grid[0].cells[1].wide_flag, WideFlag::Single);
    }

    #[test]
    fn reset_restores_constructor_defaults() {
        let mut s = screen(5, 10);
        s.print_char('x');
        s.set_mode(ScreenMode::Origin);
        s.set_margins(1, 3);
        s.reset();
        assert_eq!(s.cursor(), (0, 0));
        assert!(!s.get_mode(ScreenMode::Origin));
        assert_eq!(s.margins(), (0, 4));
        assert_eq!(s.grid[0].cells[0].character, ' ');
    }
}
