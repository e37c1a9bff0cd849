//! Four independent character-set slots (G0-G3) and the tables they can be
//! loaded with.
//!
//! Grounded in `CharCodes` from
//! `examples/original_source/include/TEmuVt102.h` (`charset[4]`, `cu_cs`,
//! `graphic`, `pound`, `sa_graphic`, `sa_pound`) — this crate folds
//! `graphic`/`pound` into the `Charset` enum itself rather than keeping
//! separate booleans, since they are mutually exclusive designations for
//! the same slot.

/// A named character set that can be designated into one of G0..G3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    UsAscii,
    UkPound,
    /// DEC Special Graphics — the line-drawing set.
    DecGraphic,
}

impl Charset {
    /// Remap a 7-bit printable byte through this charset. Bytes outside
    /// 0x20..0x7E and all non-ASCII scalars pass through unchanged
    /// (only 7-bit codepoints are remapped).
    pub fn translate(self, ch: char) -> char {
        match self {
            Charset::UsAscii => ch,
            Charset::UkPound => {
                if ch == '#' {
                    '\u{00a3}' // £
                } else {
                    ch
                }
            }
            Charset::DecGraphic => translate_dec_graphic(ch),
        }
    }
}

/// The classic VT100 line-drawing table: characters `0x60..=0x7e` map to
/// box-drawing glyphs; everything else is unaffected.
fn translate_dec_graphic(ch: char) -> char {
    match ch {
        '`' => '\u{25c6}', // diamond
        'a' => '\u{2592}', // checkerboard
        'b' => '\u{2409}', // HT
        'c' => '\u{240c}', // FF
        'd' => '\u{240d}', // CR
        'e' => '\u{240a}', // LF
        'f' => '\u{00b0}', // degree
        'g' => '\u{00b1}', // plus/minus
        'h' => '\u{2424}', // NL
        'i' => '\u{240b}', // VT
        'j' => '\u{2518}', // bottom-right corner
        'k' => '\u{2510}', // top-right corner
        'l' => '\u{250c}', // top-left corner
        'm' => '\u{2514}', // bottom-left corner
        'n' => '\u{253c}', // crossing lines
        'o' => '\u{23ba}', // scan line 1
        'p' => '\u{23bb}', // scan line 3
        'q' => '\u{2500}', // horizontal line
        'r' => '\u{23bc}', // scan line 7
        's' => '\u{23bd}', // scan line 9
        't' => '\u{251c}', // left tee
        'u' => '\u{2524}', // right tee
        'v' => '\u{2534}', // bottom tee
        'w' => '\u{252c}', // top tee
        'x' => '\u{2502}', // vertical line
        'y' => '\u{2264}', // less/equal
        'z' => '\u{2265}', // greater/equal
        '{' => '\u{03c0}', // pi
        '|' => '\u{2260}', // not equal
        '}' => '\u{00a3}', // pound
        '~' => '\u{00b7}', // middle dot
        other => other,
    }
}

/// Which of the four designation slots, and which of G0/G1 is presently
/// selected into GL via SI/SO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetState {
    pub slots: [Charset; 4],
    /// Index (0..3) of the slot currently selected as GL.
    pub active: usize,
}

impl Default for CharsetState {
    fn default() -> Self {
        CharsetState {
            slots: [Charset::UsAscii; 4],
            active: 0,
        }
    }
}

impl CharsetState {
    pub fn designate(&mut self, slot: usize, charset: Charset) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = charset;
        }
    }

    /// SI: select G0 into GL.
    pub fn shift_in(&mut self) {
        self.active = 0;
    }

    /// SO: select G1 into GL.
    pub fn shift_out(&mut self) {
        self.active = 1;
    }

    pub fn current(&self) -> Charset {
        self.slots[self.active]
    }

    pub fn translate(&self, ch: char) -> char {
        self.current().translate(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(Charset::UsAscii.translate('q'), 'q');
    }

    #[test]
    fn dec_graphic_maps_line_drawing() {
        assert_eq!(Charset::DecGraphic.translate('q'), '\u{2500}');
        assert_eq!(Charset::DecGraphic.translate('A'), 'A');
    }

    #[test]
    fn shift_in_out_switches_active_slot() {
        let mut cs = CharsetState::default();
        cs.designate(1, Charset::DecGraphic);
        assert_eq!(cs.translate('q'), 'q');
        cs.shift_out();
        assert_eq!(cs.translate('q'), '\u{2500}');
        cs.shift_in();
        assert_eq!(cs.translate('q'), 'q');
    }
}
