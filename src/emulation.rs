//! Glues the byte-level parser to the two screens, translates keyboard
//! input, and answers the terminal's side of the wire protocol (device
//! attributes, status reports, OSC titles).
//!
//! Grounded in `VT102Emulation`/`TEmulation`
//! (`examples/original_source/include/TEmuVt102.h`): the primary/alternate
//! screen pair, the DEC private-mode table, and the four device-attribute/
//! status reply strings are carried over; `Emulation` here additionally
//! owns a [`crate::keytrans::KeyTranslator`] rather than reaching it
//! through a parent widget, per this crate's handle-not-back-pointer
//! convention.

use crate::cell::{Cell, Color, Rendition};
use crate::charset::Charset;
use crate::history::HistoryRing;
use crate::keytrans::{Command, KeyCode, KeyTranslator, Modifiers, Output, StateFlags};
use crate::parser::{Encoding, Perform, VtParser};
use crate::screen::{Screen, ScreenMode};

/// VT102 primary device attributes reply (`CSI c`/`CSI 0c`).
const PRIMARY_DA: &[u8] = b"\x1b[?1;2c";
/// Secondary device attributes reply (`CSI >c`).
const SECONDARY_DA: &[u8] = b"\x1b[>0;115;0c";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Primary,
    Alternate,
}

/// Which title(s) an `OSC 0/1/2` sequence addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    IconAndWindow,
    Icon,
    Window,
}

/// A mouse action, independent of any input-event crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press(MouseButton),
    Release,
    Drag(MouseButton),
    WheelUp,
    WheelDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

pub struct Emulation {
    primary: Screen,
    alternate: Screen,
    active: Active,
    parser: VtParser,
    keymap: KeyTranslator,
    state: StateFlags,
    mouse1000: bool,
    pending_replies: Vec<u8>,
    pending_titles: Vec<(TitleKind, String)>,
    bell: bool,
}

impl Emulation {
    pub fn new(rows: usize, cols: usize, scrollback_lines: Option<usize>) -> Self {
        let history = match scrollback_lines {
            Some(0) => None,
            Some(n) => Some(HistoryRing::bounded(n)),
            None => Some(HistoryRing::unbounded()),
        };
        let mut state = StateFlags::EMPTY;
        state.insert(StateFlags::ANSI);
        Emulation {
            primary: Screen::new(rows, cols, history),
            alternate: Screen::new(rows, cols, None),
            active: Active::Primary,
            parser: VtParser::new(),
            keymap: KeyTranslator::builtin_minimal(),
            state,
            mouse1000: false,
            pending_replies: Vec::new(),
            pending_titles: Vec::new(),
            bell: false,
        }
    }

    pub fn with_keymap(mut self, keymap: KeyTranslator) -> Self {
        self.keymap = keymap;
        self
    }

    fn active_screen(&self) -> &Screen {
        match self.active {
            Active::Primary => &self.primary,
            Active::Alternate => &self.alternate,
        }
    }

    fn active_screen_mut(&mut self) -> &mut Screen {
        match self.active {
            Active::Primary => &mut self.primary,
            Active::Alternate => &mut self.alternate,
        }
    }

    pub fn rows(&self) -> usize {
        self.active_screen().rows()
    }

    pub fn cols(&self) -> usize {
        self.active_screen().cols()
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.active_screen().cursor()
    }

    pub fn cooked_image(&self) -> Vec<Cell> {
        self.active_screen().cooked_image()
    }

    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    pub fn take_title_changes(&mut self) -> Vec<(TitleKind, String)> {
        std::mem::take(&mut self.pending_titles)
    }

    /// Feed a block of bytes read from the pty through the parser, mutating
    /// the active screen; returns any bytes the emulation wants written back
    /// (device-attribute/status replies).
    pub fn on_receive_block(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.pending_replies.clear();
        // VtParser::feed needs `&mut impl Perform`, and `Self` is that sink;
        // taking the parser out avoids borrowing `self` mutably twice.
        let mut parser = std::mem::take(&mut self.parser);
        parser.feed(bytes, self);
        self.parser = parser;
        std::mem::take(&mut self.pending_replies)
    }

    /// Resolve a key event via the keyboard translator; bytes to write go
    /// out, a `Command` is applied directly against the active screen.
    pub fn send_key(&mut self, key: KeyCode, modifiers: Modifiers) -> Vec<u8> {
        match self.keymap.lookup(key, modifiers, self.state) {
            Output::Bytes(bytes) => bytes,
            Output::Command(cmd) => {
                self.run_command(cmd);
                Vec::new()
            }
            Output::None => Vec::new(),
        }
    }

    fn run_command(&mut self, cmd: Command) {
        let rows = self.active_screen().rows();
        let hist_len = self.active_screen().history().map(HistoryRing::len).unwrap_or(0);
        let cursor = self.active_screen().hist_cursor();
        let screen = self.active_screen_mut();
        match cmd {
            Command::ScrollLineUp => screen.set_hist_cursor(cursor + 1),
            Command::ScrollLineDown => screen.set_hist_cursor(cursor.saturating_sub(1)),
            Command::ScrollPageUp => screen.set_hist_cursor(cursor + rows),
            Command::ScrollPageDown => screen.set_hist_cursor(cursor.saturating_sub(rows)),
            Command::ScrollToTop => screen.set_hist_cursor(hist_len),
            Command::ScrollToBottom => screen.set_hist_cursor(0),
            Command::Erase | Command::None => {}
        }
    }

    /// Format a legacy X10-style mouse report (`CSI M B CX CY`) when
    /// Mouse1000 is enabled; `None` otherwise.
    pub fn send_mouse(&mut self, action: MouseAction, x: usize, y: usize) -> Option<Vec<u8>> {
        if !self.mouse1000 {
            return None;
        }
        let button_bits: u8 = match action {
            MouseAction::Press(MouseButton::Left) => 0,
            MouseAction::Press(MouseButton::Middle) => 1,
            MouseAction::Press(MouseButton::Right) => 2,
            MouseAction::Release => 3,
            MouseAction::Drag(MouseButton::Left) => 32,
            MouseAction::Drag(MouseButton::Middle) => 33,
            MouseAction::Drag(MouseButton::Right) => 34,
            MouseAction::WheelUp => 64,
            MouseAction::WheelDown => 65,
        };
        let cx = (x + 1 + 32).min(255) as u8;
        let cy = (y + 1 + 32).min(255) as u8;
        Some(vec![0x1b, b'[', b'M', button_bits.wrapping_add(32), cx, cy])
    }

    pub fn send_string(&mut self, s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    /// Select the codec incoming bytes are decoded with (`CSI % G`/`CSI % @`
    /// in practice select this on a real terminal; exposed directly here
    /// since this crate has no menu/profile layer of its own to hang it
    /// off).
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.parser.set_encoding(encoding);
    }

    pub fn on_image_size_change(&mut self, rows: usize, cols: usize) {
        self.primary.resize(rows, cols);
        self.alternate.resize(rows, cols);
    }

    pub fn on_selection_begin(&mut self, x: usize, y: usize) {
        self.active_screen_mut().set_sel_begin_xy(x, y);
    }

    pub fn on_selection_extend(&mut self, x: usize, y: usize) {
        self.active_screen_mut().set_sel_extent_xy(x, y);
    }

    pub fn on_selection_set(&mut self, from: (usize, usize), to: (usize, usize)) {
        self.active_screen_mut().set_sel_begin_xy(from.0, from.1);
        self.active_screen_mut().set_sel_extent_xy(to.0, to.1);
    }

    pub fn on_selection_clear(&mut self) {
        self.active_screen_mut().clear_selection();
    }

    pub fn selected_text(&self, preserve_line_breaks: bool) -> String {
        self.active_screen().get_sel_text(preserve_line_breaks)
    }

    /// Full terminal reset: both screens, modes, and charsets back to
    /// their constructor defaults.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.alternate.reset();
        self.active = Active::Primary;
        self.state = StateFlags::EMPTY;
        self.state.insert(StateFlags::ANSI);
        self.mouse1000 = false;
        self.parser.set_encoding(Encoding::Utf8);
    }

    fn set_screen_mode(&mut self, mode: ScreenMode, value: bool) {
        if value {
            self.active_screen_mut().set_mode(mode);
        } else {
            self.active_screen_mut().reset_mode(mode);
        }
    }

    /// DEC private (`?`) and public `h`/`l` mode table. Intentionally
    /// non-exhaustive: unrecognised codes are silently accepted as no-ops,
    /// matching real terminals' tolerance of unknown mode numbers.
    fn apply_mode(&mut self, private: bool, code: u32, value: bool) {
        if private {
            match code {
                1 => self.state.set(StateFlags::APP_CURSOR_KEYS, value),
                6 => self.set_screen_mode(ScreenMode::Origin, value),
                7 => self.set_screen_mode(ScreenMode::AutoWrap, value),
                25 => self.set_screen_mode(ScreenMode::CursorVisible, value),
                66 => self.state.set(StateFlags::APP_KEYPAD, value),
                1000 => self.mouse1000 = value,
                47 | 1047 | 1049 => self.swap_screen(value),
                _ => {}
            }
        } else {
            match code {
                4 => self.set_screen_mode(ScreenMode::Insert, value),
                20 => {
                    // LNM: tracked both on the screen (drives new_line()'s
                    // behavior) and on `state` (so keybinding conditions
                    // written against "+newline" still match).
                    self.state.set(StateFlags::NEW_LINE, value);
                    self.set_screen_mode(ScreenMode::NewLine, value);
                }
                _ => {}
            }
        }
    }

    /// Maps a DEC private mode number to the `ScreenMode` it corresponds
    /// to, for the subset of modes that round-trip through `CSI ? Pm s`/
    /// `CSI ? Pm r`. Modes tracked outside `Screen` (app cursor keys,
    /// mouse reporting, ...) have no private save/restore here.
    fn private_screen_mode(code: u32) -> Option<ScreenMode> {
        match code {
            6 => Some(ScreenMode::Origin),
            7 => Some(ScreenMode::AutoWrap),
            25 => Some(ScreenMode::CursorVisible),
            _ => None,
        }
    }

    /// Switch between primary and alternate screen. The alternate screen
    /// does not inherit the primary's cursor on entry — each screen keeps
    /// its own independent state.
    fn swap_screen(&mut self, enter_alternate: bool) {
        let target = if enter_alternate { Active::Alternate } else { Active::Primary };
        if self.active == target {
            return;
        }
        self.active = target;
        self.state.set(StateFlags::APP_SCREEN, enter_alternate);
    }

    fn apply_sgr(&mut self, params: &[u32]) {
        if params.is_empty() {
            self.active_screen_mut().set_default_rendition();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => self.active_screen_mut().set_default_rendition(),
                1 => self.active_screen_mut().set_rendition(Rendition::BOLD),
                2 => self.active_screen_mut().set_rendition(Rendition::FAINT),
                3 => self.active_screen_mut().set_rendition(Rendition::ITALIC),
                4 => self.active_screen_mut().set_rendition(Rendition::UNDERLINE),
                5 | 6 => self.active_screen_mut().set_rendition(Rendition::BLINK),
                7 => self.active_screen_mut().set_rendition(Rendition::REVERSE),
                8 => self.active_screen_mut().set_rendition(Rendition::INVISIBLE),
                9 => self.active_screen_mut().set_rendition(Rendition::STRIKEOUT),
                22 => self.active_screen_mut().reset_rendition(Rendition::BOLD | Rendition::FAINT),
                23 => self.active_screen_mut().reset_rendition(Rendition::ITALIC),
                24 => self.active_screen_mut().reset_rendition(Rendition::UNDERLINE),
                25 => self.active_screen_mut().reset_rendition(Rendition::BLINK),
                27 => self.active_screen_mut().reset_rendition(Rendition::REVERSE),
                28 => self.active_screen_mut().reset_rendition(Rendition::INVISIBLE),
                29 => self.active_screen_mut().reset_rendition(Rendition::STRIKEOUT),
                code @ 30..=37 => self.active_screen_mut().set_fore_color(Color::Indexed((code - 30) as u8)),
                38 => {
                    let (color, consumed) = parse_extended_color(&params[i + 1..]);
                    if let Some(color) = color {
                        self.active_screen_mut().set_fore_color(color);
                    }
                    i += consumed;
                }
                39 => self.active_screen_mut().set_fore_color_default(),
                code @ 40..=47 => self.active_screen_mut().set_back_color(Color::Indexed((code - 40) as u8)),
                48 => {
                    let (color, consumed) = parse_extended_color(&params[i + 1..]);
                    if let Some(color) = color {
                        self.active_screen_mut().set_back_color(color);
                    }
                    i += consumed;
                }
                49 => self.active_screen_mut().set_back_color_default(),
                code @ 90..=97 => self.active_screen_mut().set_fore_color(Color::Indexed(code as u8 - 90 + 8)),
                code @ 100..=107 => self.active_screen_mut().set_back_color(Color::Indexed(code as u8 - 100 + 8)),
                // Unknown SGR codes are silently ignored to maximize
                // compatibility with real-world applications.
                _ => {}
            }
            i += 1;
        }
    }

    fn device_status_report(&mut self, code: u32) {
        match code {
            5 => self.pending_replies.extend_from_slice(b"\x1b[0n"),
            6 => {
                let (x, y) = self.active_screen().cursor();
                self.pending_replies
                    .extend(format!("\x1b[{};{}R", y + 1, x + 1).into_bytes());
            }
            _ => {}
        }
    }
}

/// `5;N` (indexed 256-color) or `2;R;G;B` (direct color) following a
/// `38`/`48` SGR code. Returns the color, if well-formed, and how many
/// parameters after the `38`/`48` itself were consumed.
fn parse_extended_color(rest: &[u32]) -> (Option<Color>, usize) {
    match rest.first() {
        Some(5) => {
            let idx = rest.get(1).copied().unwrap_or(0).min(255) as u8;
            (Some(Color::Indexed(idx)), 2)
        }
        Some(2) => {
            let r = rest.get(1).copied().unwrap_or(0).min(255) as u8;
            let g = rest.get(2).copied().unwrap_or(0).min(255) as u8;
            let b = rest.get(3).copied().unwrap_or(0).min(255) as u8;
            (Some(Color::Rgb(r, g, b)), 4)
        }
        _ => (None, 0),
    }
}

impl Perform for Emulation {
    fn print(&mut self, ch: char) {
        self.active_screen_mut().print_char(ch);
    }

    fn execute_c0(&mut self, byte: u8) {
        match byte {
            0x07 => self.bell = true,
            0x08 => self.active_screen_mut().cursor_left(1),
            0x09 => self.active_screen_mut().tabulate(),
            0x0A | 0x0B | 0x0C => self.active_screen_mut().new_line(),
            0x0D => self.active_screen_mut().carriage_return(),
            0x0E => self.active_screen_mut().shift_out(),
            0x0F => self.active_screen_mut().shift_in(),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, final_byte: u8, _intermediates: &[u8], params: &[u32], marker: Option<u8>) {
        let count = |i: usize| params.get(i).copied().filter(|&v| v != 0).unwrap_or(1) as usize;
        let raw = |i: usize| params.get(i).copied().unwrap_or(0);

        match (marker, final_byte) {
            (Some(b'?'), b'h') => self.apply_mode(true, raw(0), true),
            (Some(b'?'), b'l') => self.apply_mode(true, raw(0), false),
            (None, b'h') => self.apply_mode(false, raw(0), true),
            (None, b'l') => self.apply_mode(false, raw(0), false),
            (_, b'@') => self.active_screen_mut().insert_chars(count(0)),
            (_, b'A') => self.active_screen_mut().cursor_up(count(0)),
            (_, b'B') => self.active_screen_mut().cursor_down(count(0)),
            (_, b'C') => self.active_screen_mut().cursor_right(count(0)),
            (_, b'D') => self.active_screen_mut().cursor_left(count(0)),
            (_, b'E') => {
                for _ in 0..count(0) {
                    self.active_screen_mut().next_line();
                }
            }
            (_, b'F') => {
                for _ in 0..count(0) {
                    self.active_screen_mut().cursor_up(1);
                    self.active_screen_mut().carriage_return();
                }
            }
            (_, b'G') => self.active_screen_mut().set_cursor_x(raw(0).saturating_sub(1) as usize),
            (_, b'H') | (_, b'f') => {
                let row = raw(0).saturating_sub(1) as usize;
                let col = raw(1).saturating_sub(1) as usize;
                self.active_screen_mut().set_cursor_xy(col, row);
            }
            (_, b'I') => {
                for _ in 0..count(0) {
                    self.active_screen_mut().tabulate();
                }
            }
            (_, b'J') => {
                let screen = self.active_screen_mut();
                match raw(0) {
                    1 => screen.clear_to_begin_of_screen(),
                    2 | 3 => screen.clear_entire_screen(),
                    _ => screen.clear_to_end_of_screen(),
                }
            }
            (_, b'K') => {
                let screen = self.active_screen_mut();
                match raw(0) {
                    1 => screen.clear_to_begin_of_line(),
                    2 => screen.clear_entire_line(),
                    _ => screen.clear_to_end_of_line(),
                }
            }
            (_, b'L') => self.active_screen_mut().insert_lines(count(0)),
            (_, b'M') => self.active_screen_mut().delete_lines(count(0)),
            (_, b'P') => self.active_screen_mut().delete_chars(count(0)),
            (_, b'S') => self.active_screen_mut().scroll_up(count(0)),
            (_, b'T') => self.active_screen_mut().scroll_down(count(0)),
            (_, b'X') => self.active_screen_mut().erase_chars(count(0)),
            (_, b'Z') => {
                for _ in 0..count(0) {
                    self.active_screen_mut().back_tabulate();
                }
            }
            (_, b'd') => self.active_screen_mut().set_cursor_y(raw(0).saturating_sub(1) as usize),
            (Some(b'>'), b'c') => self.pending_replies.extend_from_slice(SECONDARY_DA),
            (_, b'c') => self.pending_replies.extend_from_slice(PRIMARY_DA),
            (_, b'g') => {
                let screen = self.active_screen_mut();
                if raw(0) == 3 {
                    screen.clear_tab_stops();
                } else {
                    screen.change_tab_stop(false);
                }
            }
            (_, b'm') => self.apply_sgr(params),
            (_, b'n') => self.device_status_report(raw(0)),
            (Some(b'?'), b's') => {
                if let Some(mode) = Self::private_screen_mode(raw(0)) {
                    self.active_screen_mut().save_mode(mode);
                }
            }
            (Some(b'?'), b'r') => {
                if let Some(mode) = Self::private_screen_mode(raw(0)) {
                    self.active_screen_mut().restore_mode(mode);
                }
            }
            (_, b'r') => {
                let rows = self.active_screen().rows();
                let top = raw(0).saturating_sub(1) as usize;
                let bottom = if raw(1) == 0 { rows - 1 } else { (raw(1) as usize).saturating_sub(1) };
                self.active_screen_mut().set_margins(top, bottom);
            }
            (_, b's') => self.active_screen_mut().save_cursor(),
            (_, b'u') => self.active_screen_mut().restore_cursor(),
            _ => tracing::warn!(final_byte, ?marker, "unhandled CSI sequence"),
        }
    }

    fn esc_dispatch(&mut self, final_byte: u8, intermediates: &[u8]) {
        match (intermediates, final_byte) {
            (b"%", b'G') => self.set_encoding(Encoding::Utf8),
            (b"%", b'@') => self.set_encoding(Encoding::Latin1),
            ([], b'D') => self.active_screen_mut().index(),
            ([], b'M') => self.active_screen_mut().reverse_index(),
            ([], b'E') => self.active_screen_mut().next_line(),
            ([], b'7') => self.active_screen_mut().save_cursor(),
            ([], b'8') => self.active_screen_mut().restore_cursor(),
            ([], b'c') => self.reset(),
            _ => tracing::warn!(final_byte, ?intermediates, "unhandled ESC sequence"),
        }
    }

    fn osc_dispatch(&mut self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        let mut parts = text.splitn(2, ';');
        let (Some(kind_str), Some(title)) = (parts.next(), parts.next()) else { return };
        let kind = match kind_str {
            "0" => TitleKind::IconAndWindow,
            "1" => TitleKind::Icon,
            "2" => TitleKind::Window,
            _ => return,
        };
        self.pending_titles.push((kind, title.to_string()));
    }

    fn designate_charset(&mut self, slot: usize, designator: u8) {
        let charset = match designator {
            b'0' => Charset::DecGraphic,
            b'A' => Charset::UkPound,
            _ => Charset::UsAscii,
        };
        self.active_screen_mut().designate_charset(slot, charset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(emu: &Emulation, row: usize, col: usize) -> Cell {
        emu.cooked_image()[row * emu.cols() + col]
    }

    #[test]
    fn auto_wrap_moves_to_next_row() {
        let mut emu = Emulation::new(2, 80, None);
        let input = vec![b'A'; 80];
        emu.on_receive_block(&input);
        emu.on_receive_block(b"B");
        assert_eq!(emu.cursor(), (1, 1));
        assert_eq!(cell(&emu, 0, 79).character, 'A');
        assert_eq!(cell(&emu, 1, 0).character, 'B');
    }

    #[test]
    fn delayed_wrap_keeps_cursor_at_last_column() {
        let mut emu = Emulation::new(2, 80, None);
        emu.on_receive_block(&vec![b'A'; 80]);
        assert_eq!(emu.cursor(), (79, 0));
    }

    #[test]
    fn clear_to_end_of_line_via_csi() {
        let mut emu = Emulation::new(3, 10, None);
        emu.on_receive_block(b"0123456789");
        emu.on_receive_block(b"\x1b[2;5H\x1b[0K");
        for col in 0..10 {
            assert_eq!(cell(&emu, 0, col).character, "0123456789".as_bytes()[col] as char);
        }
        for col in 4..10 {
            assert_eq!(cell(&emu, 1, col).character, ' ');
        }
    }

    #[test]
    fn scrolling_region_confines_scroll() {
        let mut emu = Emulation::new(5, 10, None);
        emu.on_receive_block(b"\x1b[1;1Htop");
        emu.on_receive_block(b"\x1b[5;1Hbot");
        emu.on_receive_block(b"\x1b[2;4r");
        emu.on_receive_block(b"\x1b[4;1Hrow3");
        emu.on_receive_block(b"\n");
        // Rows outside the 2..4 scrolling region are untouched by the scroll.
        assert_eq!(cell(&emu, 0, 0).character, 't');
        assert_eq!(cell(&emu, 4, 0).character, 'b');
        // "row3" shifted up one row within the region; its old row is blank.
        assert_eq!(cell(&emu, 2, 0).character, 'r');
        assert_eq!(cell(&emu, 3, 0).character, ' ');
    }

    #[test]
    fn sgr_256_color_roundtrip() {
        let mut emu = Emulation::new(1, 10, None);
        emu.on_receive_block(b"\x1b[38;5;201mX\x1b[0mY");
        assert_eq!(cell(&emu, 0, 0).foreground, Color::Indexed(201));
        assert_eq!(cell(&emu, 0, 1).foreground, Color::Default);
    }

    #[test]
    fn history_eviction_after_100_lines() {
        let mut emu = Emulation::new(24, 80, None);
        for i in 0..100 {
            emu.on_receive_block(format!("{}\r\n", i % 10).as_bytes());
        }
        assert_eq!(emu.primary.history().unwrap().len(), 76);
    }

    #[test]
    fn primary_device_attributes_reply() {
        let mut emu = Emulation::new(24, 80, None);
        let reply = emu.on_receive_block(b"\x1b[c");
        assert_eq!(reply, PRIMARY_DA);
    }

    #[test]
    fn secondary_device_attributes_reply() {
        let mut emu = Emulation::new(24, 80, None);
        let reply = emu.on_receive_block(b"\x1b[>c");
        assert_eq!(reply, SECONDARY_DA);
    }

    #[test]
    fn cursor_position_report() {
        let mut emu = Emulation::new(24, 80, None);
        emu.on_receive_block(b"\x1b[5;9H");
        let reply = emu.on_receive_block(b"\x1b[6n");
        assert_eq!(reply, b"\x1b[5;9R");
    }

    #[test]
    fn osc_sets_window_title() {
        let mut emu = Emulation::new(24, 80, None);
        emu.on_receive_block(b"\x1b]2;my title\x07");
        let changes = emu.take_title_changes();
        assert_eq!(changes, vec![(TitleKind::Window, "my title".to_string())]);
    }

    #[test]
    fn alternate_screen_does_not_write_history() {
        let mut emu = Emulation::new(5, 10, None);
        emu.on_receive_block(b"\x1b[?1049h");
        for _ in 0..20 {
            emu.on_receive_block(b"x\r\n");
        }
        assert!(emu.alternate.history().is_none());
        emu.on_receive_block(b"\x1b[?1049l");
        assert_eq!(emu.primary.history().unwrap().len(), 0);
    }

    #[test]
    fn send_key_consults_keymap() {
        let mut emu = Emulation::new(24, 80, None);
        let bytes = emu.send_key(KeyCode::Up, Modifiers::EMPTY);
        assert_eq!(bytes, b"\x1b[1A");
    }

    #[test]
    fn scroll_command_moves_hist_cursor_without_bytes() {
        let mut emu = Emulation::new(24, 80, None);
        for _ in 0..50 {
            emu.on_receive_block(b"x\r\n");
        }
        let bytes = emu.send_key(KeyCode::PageUp, Modifiers::EMPTY);
        assert!(bytes.is_empty());
        assert!(emu.active_screen().hist_cursor() > 0);
    }

    #[test]
    fn mouse_report_requires_mouse1000() {
        let mut emu = Emulation::new(24, 80, None);
        assert!(emu.send_mouse(MouseAction::Press(MouseButton::Left), 5, 5).is_none());
        emu.on_receive_block(b"\x1b[?1000h");
        let report = emu.send_mouse(MouseAction::Press(MouseButton::Left), 5, 5).unwrap();
        assert_eq!(report, vec![0x1b, b'[', b'M', 32, 38, 38]);
    }

    #[test]
    fn bell_is_latched_until_taken() {
        let mut emu = Emulation::new(24, 80, None);
        emu.on_receive_block(b"\x07");
        assert!(emu.take_bell());
        assert!(!emu.take_bell());
    }

    #[test]
    fn dec_private_mode_save_restore_round_trips() {
        let mut emu = Emulation::new(24, 80, None);
        emu.on_receive_block(b"\x1b[?7l"); // disable autowrap
        emu.on_receive_block(b"\x1b[?7s"); // save (disabled)
        emu.on_receive_block(b"\x1b[?7h"); // enable autowrap
        assert!(emu.active_screen().get_mode(ScreenMode::AutoWrap));
        emu.on_receive_block(b"\x1b[?7r"); // restore (disabled)
        assert!(!emu.active_screen().get_mode(ScreenMode::AutoWrap));
    }

    #[test]
    fn esc_percent_switches_to_latin1_and_back() {
        let mut emu = Emulation::new(1, 10, None);
        emu.on_receive_block(b"\x1b%@");
        emu.on_receive_block(&[0xE9]);
        assert_eq!(cell(&emu, 0, 0).character, '\u{e9}');
        emu.on_receive_block(b"\x1b%G");
        emu.on_receive_block("é".as_bytes());
        assert_eq!(cell(&emu, 0, 1).character, 'é');
    }

    #[test]
    fn reset_restores_defaults() {
        let mut emu = Emulation::new(24, 80, None);
        emu.on_receive_block(b"\x1b[?1049h\x1b[31mX");
        emu.reset();
        assert_eq!(emu.cursor(), (0, 0));
        assert_eq!(cell(&emu, 0, 0).foreground, Color::Default);
    }
}
