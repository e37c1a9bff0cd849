//! The attributed character grid's atomic unit.
//!
//! Grounded in Konsole's `ca` struct (`examples/original_source/include/TECommon.h`):
//! character, foreground, background and a rendition byte. The original
//! packs foreground/background as indices into a fixed palette; this crate
//! widens that to an indexed/RGB/default union, and
//! widens `char` to `char` (a full Unicode scalar) rather than a single
//! byte, since the parser above already demultiplexes UTF-8 before cells
//! are ever constructed.

use std::ops::{BitOr, BitOrAssign};

/// A cell's foreground or background color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// The screen's default foreground/background, subject to reverse video.
    Default,
    /// A palette index: 0..15 are the ordinary ANSI colors, 16..255 the
    /// xterm-256 extended palette.
    Indexed(u8),
    /// A direct 24-bit color (`CSI 38;2;R;G;Bm` / `48;2;R;G;Bm`).
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

/// Bit set over the text attributes a cell (or the current pen) can carry.
///
/// Named after and bit-compatible in spirit with `RE_BOLD`/`RE_BLINK`/
/// `RE_UNDERLINE`/`RE_REVERSE` in `TECommon.h`, extended with a broader
/// attribute set (Faint, Italic, Invisible, Strikeout, the
/// double-height/width markers, Protected) plus one bit private to this
/// crate's `cooked_image()`: `SELECTED`, used to mark selected cells in a
/// snapshot without mutating the underlying pen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rendition(u16);

impl Rendition {
    pub const NONE: Rendition = Rendition(0);
    pub const BOLD: Rendition = Rendition(1 << 0);
    pub const FAINT: Rendition = Rendition(1 << 1);
    pub const ITALIC: Rendition = Rendition(1 << 2);
    pub const UNDERLINE: Rendition = Rendition(1 << 3);
    pub const BLINK: Rendition = Rendition(1 << 4);
    pub const REVERSE: Rendition = Rendition(1 << 5);
    pub const INVISIBLE: Rendition = Rendition(1 << 6);
    pub const STRIKEOUT: Rendition = Rendition(1 << 7);
    pub const DOUBLE_HEIGHT_TOP: Rendition = Rendition(1 << 8);
    pub const DOUBLE_HEIGHT_BOTTOM: Rendition = Rendition(1 << 9);
    pub const DOUBLE_WIDTH: Rendition = Rendition(1 << 10);
    pub const PROTECTED: Rendition = Rendition(1 << 11);
    /// Snapshot-only marker set by `Screen::cooked_image`; never set by a
    /// CSI sequence.
    pub const SELECTED: Rendition = Rendition(1 << 12);

    pub fn contains(self, flag: Rendition) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn insert(&mut self, flag: Rendition) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: Rendition) {
        self.0 &= !flag.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Rendition {
    type Output = Rendition;
    fn bitor(self, rhs: Rendition) -> Rendition {
        Rendition(self.0 | rhs.0)
    }
}

impl BitOrAssign for Rendition {
    fn bitor_assign(&mut self, rhs: Rendition) {
        self.0 |= rhs.0;
    }
}

/// Whether a cell is an ordinary single-width cell or one half of a
/// double-width (East-Asian-Wide) character pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WideFlag {
    #[default]
    Single,
    LeadingOfDouble,
    TrailingOfDouble,
}

/// The "pen": the attribute set applied to newly written cells. Also used
/// verbatim as the per-cell attribute storage (`Cell` is a `Pen` plus a
/// character and a wide-flag).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub foreground: Color,
    pub background: Color,
    pub rendition: Rendition,
}

impl Default for Pen {
    fn default() -> Self {
        Pen {
            foreground: Color::Default,
            background: Color::Default,
            rendition: Rendition::NONE,
        }
    }
}

impl Pen {
    /// The pen with foreground/background swapped, used to compute the
    /// "effective pen" under screen-level reverse video.
    pub fn swapped(&self) -> Pen {
        Pen {
            foreground: self.background,
            background: self.foreground,
            rendition: self.rendition,
        }
    }
}

/// A single screen position: a character plus the pen it was written with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub character: char,
    pub foreground: Color,
    pub background: Color,
    pub rendition: Rendition,
    pub wide_flag: WideFlag,
}

impl Default for Cell {
    fn default() -> Self {
        Cell::blank(Pen::default())
    }
}

impl Cell {
    /// A blank (space) cell carrying the given pen's colors/rendition —
    /// what clear/erase operations fill with.
    pub fn blank(pen: Pen) -> Self {
        Cell {
            character: ' ',
            foreground: pen.foreground,
            background: pen.background,
            rendition: pen.rendition,
            wide_flag: WideFlag::Single,
        }
    }

    pub fn written(character: char, pen: Pen) -> Self {
        Cell {
            character,
            foreground: pen.foreground,
            background: pen.background,
            rendition: pen.rendition,
            wide_flag: WideFlag::Single,
        }
    }

    pub fn pen(&self) -> Pen {
        Pen {
            foreground: self.foreground,
            background: self.background,
            rendition: self.rendition,
        }
    }

    /// True for everything except an untouched default-pen space — the
    /// "non-default content" test `resize()` uses to decide whether a
    /// shrinking row is worth evicting to history.
    pub fn is_default(&self) -> bool {
        self.character == ' '
            && self.foreground == Color::Default
            && self.background == Color::Default
            && self.rendition.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendition_bits_are_independent() {
        let mut r = Rendition::NONE;
        r.insert(Rendition::BOLD);
        r.insert(Rendition::UNDERLINE);
        assert!(r.contains(Rendition::BOLD));
        assert!(r.contains(Rendition::UNDERLINE));
        assert!(!r.contains(Rendition::ITALIC));
        r.remove(Rendition::BOLD);
        assert!(!r.contains(Rendition::BOLD));
        assert!(r.contains(Rendition::UNDERLINE));
    }

    #[test]
    fn swapped_pen_exchanges_colors_only() {
        let pen = Pen {
            foreground: Color::Indexed(1),
            background: Color::Indexed(2),
            rendition: Rendition::BOLD,
        };
        let swapped = pen.swapped();
        assert_eq!(swapped.foreground, Color::Indexed(2));
        assert_eq!(swapped.background, Color::Indexed(1));
        assert_eq!(swapped.rendition, Rendition::BOLD);
    }

    #[test]
    fn default_cell_is_default() {
        assert!(Cell::default().is_default());
        let written = Cell::written('x', Pen::default());
        assert!(!written.is_default());
    }
}
