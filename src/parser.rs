//! Byte-level control-sequence state machine.
//!
//! Implemented from scratch as its own byte-level state machine rather than
//! delegating to the `vt100`, `alacritty_terminal`, or `vte` crates. Its
//! dispatch surface (`Perform`) is shaped the way
//! `examples/other_examples/925e333a_r3bl-org-r3bl-open-core__tui-src-core-pty_mux-ansi_parser-perform.rs.rs`
//! shapes its `vte::Perform` impl — separate `print`/`execute`/
//! `csi_dispatch`/`esc_dispatch`/`osc_dispatch` callbacks — without
//! depending on that crate's tokenizer.

/// Upper bound on collected CSI parameters.
const MAX_PARAMS: usize = 16;
/// Clamp ceiling for a single parameter's accumulated value, so a
/// pathologically long digit run saturates instead of overflowing.
const MAX_PARAM_VALUE: u32 = 16_384;
/// Sanity limit on an OSC string's byte length before it is truncated.
const MAX_OSC_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    /// ESC seen while inside an OSC string: `\` terminates it (ST),
    /// anything else aborts the OSC and is reprocessed as a fresh escape.
    OscEscape,
    CharsetIntro { slot: usize },
}

/// Everything the parser can hand the emulation layer for one complete
/// token. Implemented by `Emulation` (see `emulation.rs`).
pub trait Perform {
    /// A single already-decoded Unicode scalar to place at the cursor.
    fn print(&mut self, ch: char);
    /// A C0 control character (BEL, BS, HT, LF, VT, FF, CR, SO, SI, ESC-as-
    /// standalone-is never passed here).
    fn execute_c0(&mut self, byte: u8);
    /// A complete CSI sequence: final byte, any intermediates (0x20-0x2F),
    /// the collected parameters, and the leading marker byte (`?`, `<`, `=`,
    /// or `>`) if one introduced it — `?` is DEC private mode, `>` marks a
    /// secondary-device-attributes request.
    fn csi_dispatch(&mut self, final_byte: u8, intermediates: &[u8], params: &[u32], marker: Option<u8>);
    /// A complete two-byte (or intermediate-qualified) escape sequence
    /// that wasn't CSI/OSC/charset-designation.
    fn esc_dispatch(&mut self, final_byte: u8, intermediates: &[u8]);
    /// A complete `OSC ... (BEL|ST)` sequence, raw bytes (lossily decoded
    /// by the caller if needed).
    fn osc_dispatch(&mut self, data: &[u8]);
    /// `ESC ( / ) / * / +` followed by a designator byte: install a
    /// charset into slot 0..3.
    fn designate_charset(&mut self, slot: usize, designator: u8);
}

/// Which byte-to-char codec the parser is decoding `print` bytes with.
/// Mirrors a locale/UTF-8 toggle: UTF-8 is the default, `Latin1` stands in
/// for "whatever the system's 8-bit locale codec is" since a full locale
/// codec table lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

#[derive(Default)]
struct Utf8Decoder {
    remaining: u8,
    accum: u32,
}

impl Utf8Decoder {
    /// Feed one byte; returns `Some(char)` once a full scalar has been
    /// assembled. Malformed sequences resync silently to U+FFFD.
    fn feed(&mut self, byte: u8) -> Option<char> {
        if self.remaining == 0 {
            match byte {
                0x00..=0x7F => Some(byte as char),
                0xC0..=0xDF => {
                    self.accum = (byte & 0x1F) as u32;
                    self.remaining = 1;
                    None
                }
                0xE0..=0xEF => {
                    self.accum = (byte & 0x0F) as u32;
                    self.remaining = 2;
                    None
                }
                0xF0..=0xF7 => {
                    self.accum = (byte & 0x07) as u32;
                    self.remaining = 3;
                    None
                }
                _ => Some('\u{FFFD}'),
            }
        } else if byte & 0xC0 == 0x80 {
            self.accum = (self.accum << 6) | (byte & 0x3F) as u32;
            self.remaining -= 1;
            if self.remaining == 0 {
                let ch = char::from_u32(self.accum).unwrap_or('\u{FFFD}');
                self.accum = 0;
                Some(ch)
            } else {
                None
            }
        } else {
            // Malformed continuation: the dropped lead byte is lost (never
            // surfaced as its own FFFD), but reprocessing the offending byte
            // fresh means it can correctly start a new sequence instead of
            // always being forced to U+FFFD.
            self.remaining = 0;
            self.accum = 0;
            self.feed(byte)
        }
    }
}

/// The byte-level parser. Carries buffers across `feed` calls so a
/// sequence split across two reads still parses correctly.
pub struct VtParser {
    state: State,
    params: Vec<u32>,
    current_param: Option<u32>,
    intermediates: Vec<u8>,
    private_marker: Option<u8>,
    osc_buf: Vec<u8>,
    encoding: Encoding,
    utf8: Utf8Decoder,
}

impl Default for VtParser {
    fn default() -> Self {
        VtParser {
            state: State::Ground,
            params: Vec::new(),
            current_param: None,
            intermediates: Vec::new(),
            private_marker: None,
            osc_buf: Vec::new(),
            encoding: Encoding::Utf8,
            utf8: Utf8Decoder::default(),
        }
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the byte decoder `print` bytes run through. Takes effect on
    /// the next byte fed; a multibyte UTF-8 sequence in flight when
    /// switching away from `Utf8` is abandoned rather than completed.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
        self.utf8 = Utf8Decoder::default();
    }

    pub fn feed(&mut self, bytes: &[u8], sink: &mut impl Perform) {
        for &byte in bytes {
            self.feed_byte(byte, sink);
        }
    }

    fn reset_sequence(&mut self) {
        self.params.clear();
        self.current_param = None;
        self.intermediates.clear();
        self.private_marker = None;
    }

    fn push_current_param(&mut self) {
        let value = self.current_param.take().unwrap_or(0);
        if self.params.len() < MAX_PARAMS {
            self.params.push(value);
        }
    }

    fn feed_byte(&mut self, byte: u8, sink: &mut impl Perform) {
        // CAN/SUB abort any in-progress sequence back to Ground, matching
        // xterm's handling.
        if matches!(byte, 0x18 | 0x1A) && self.state != State::Ground {
            self.reset_sequence();
            self.osc_buf.clear();
            self.state = State::Ground;
            return;
        }

        if self.state == State::OscEscape {
            if byte == b'\\' {
                sink.osc_dispatch(&self.osc_buf);
                self.osc_buf.clear();
                self.state = State::Ground;
            } else {
                // Not a String Terminator: abort the OSC and reprocess
                // this byte as the start of a fresh escape sequence.
                self.osc_buf.clear();
                self.reset_sequence();
                self.state = State::Escape;
                self.feed_byte(byte, sink);
            }
            return;
        }

        if byte == 0x1B && self.state != State::OscString {
            self.reset_sequence();
            self.state = State::Escape;
            return;
        }

        match self.state {
            State::Ground => self.feed_ground(byte, sink),
            State::Escape => self.feed_escape(byte, sink),
            State::CsiEntry | State::CsiParam => self.feed_csi(byte, sink),
            State::CsiIntermediate => self.feed_csi_intermediate(byte, sink),
            State::OscString => self.feed_osc(byte, sink),
            State::OscEscape => unreachable!("handled above"),
            State::CharsetIntro { slot } => {
                sink.designate_charset(slot, byte);
                self.state = State::Ground;
            }
        }
    }

    fn feed_ground(&mut self, byte: u8, sink: &mut impl Perform) {
        match byte {
            0x00..=0x1F if byte != 0x1B => sink.execute_c0(byte),
            0x7F => {} // DEL: traditionally ignored
            _ => match self.encoding {
                Encoding::Utf8 => {
                    if let Some(ch) = self.utf8.feed(byte) {
                        sink.print(ch);
                    }
                }
                Encoding::Latin1 => sink.print(byte as char),
            },
        }
    }

    fn feed_escape(&mut self, byte: u8, sink: &mut impl Perform) {
        match byte {
            b'[' => self.state = State::CsiEntry,
            b']' => {
                self.osc_buf.clear();
                self.state = State::OscString;
            }
            b'(' => self.state = State::CharsetIntro { slot: 0 },
            b')' => self.state = State::CharsetIntro { slot: 1 },
            b'*' => self.state = State::CharsetIntro { slot: 2 },
            b'+' => self.state = State::CharsetIntro { slot: 3 },
            0x20..=0x2F => {
                self.intermediates.push(byte);
            }
            _ => {
                sink.esc_dispatch(byte, &self.intermediates);
                self.reset_sequence();
                self.state = State::Ground;
            }
        }
    }

    fn feed_csi(&mut self, byte: u8, sink: &mut impl Perform) {
        match byte {
            b'?' | b'<' | b'=' | b'>' if self.private_marker.is_none() && self.params.is_empty() && self.current_param.is_none() => {
                self.private_marker = Some(byte);
                self.state = State::CsiParam;
            }
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u32;
                let acc = self.current_param.unwrap_or(0).saturating_mul(10).saturating_add(digit);
                self.current_param = Some(acc.min(MAX_PARAM_VALUE));
                self.state = State::CsiParam;
            }
            b';' => {
                self.push_current_param();
                self.state = State::CsiParam;
            }
            0x20..=0x2F => {
                self.push_current_param();
                self.intermediates.push(byte);
                self.state = State::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.push_current_param();
                self.dispatch_csi(byte, sink);
            }
            _ => {
                // Unrecognised byte inside a CSI sequence: log and resume
                // at ground rather than getting stuck or panicking.
                tracing::warn!(byte, "malformed byte in CSI sequence");
                self.reset_sequence();
                self.state = State::Ground;
            }
        }
    }

    fn feed_csi_intermediate(&mut self, byte: u8, sink: &mut impl Perform) {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x40..=0x7E => self.dispatch_csi(byte, sink),
            _ => {
                tracing::warn!(byte, "malformed byte in CSI intermediate");
                self.reset_sequence();
                self.state = State::Ground;
            }
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, sink: &mut impl Perform) {
        sink.csi_dispatch(final_byte, &self.intermediates, &self.params, self.private_marker);
        self.reset_sequence();
        self.state = State::Ground;
    }

    fn feed_osc(&mut self, byte: u8, sink: &mut impl Perform) {
        match byte {
            0x07 => {
                sink.osc_dispatch(&self.osc_buf);
                self.osc_buf.clear();
                self.state = State::Ground;
            }
            0x1B => {
                // Possible ST (ESC \); the next byte decides in feed_byte.
                self.state = State::OscEscape;
            }
            _ => {
                if self.osc_buf.len() < MAX_OSC_LEN {
                    self.osc_buf.push(byte);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        printed: String,
        c0: Vec<u8>,
        csi: Vec<(u8, Vec<u8>, Vec<u32>, Option<u8>)>,
        esc: Vec<(u8, Vec<u8>)>,
        osc: Vec<Vec<u8>>,
        charset: Vec<(usize, u8)>,
    }

    impl Perform for Recorder {
        fn print(&mut self, ch: char) {
            self.printed.push(ch);
        }
        fn execute_c0(&mut self, byte: u8) {
            self.c0.push(byte);
        }
        fn csi_dispatch(&mut self, final_byte: u8, intermediates: &[u8], params: &[u32], marker: Option<u8>) {
            self.csi.push((final_byte, intermediates.to_vec(), params.to_vec(), marker));
        }
        fn esc_dispatch(&mut self, final_byte: u8, intermediates: &[u8]) {
            self.esc.push((final_byte, intermediates.to_vec()));
        }
        fn osc_dispatch(&mut self, data: &[u8]) {
            self.osc.push(data.to_vec());
        }
        fn designate_charset(&mut self, slot: usize, designator: u8) {
            self.charset.push((slot, designator));
        }
    }

    #[test]
    fn prints_plain_ascii() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"hello", &mut r);
        assert_eq!(r.printed, "hello");
    }

    #[test]
    fn decodes_utf8_multibyte() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed("héllo".as_bytes(), &mut r);
        assert_eq!(r.printed, "héllo");
    }

    #[test]
    fn c0_controls_are_executed_not_printed() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"a\rb\n", &mut r);
        assert_eq!(r.printed, "ab");
        assert_eq!(r.c0, vec![b'\r', b'\n']);
    }

    #[test]
    fn csi_sequence_with_params_dispatches() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"\x1b[1;2H", &mut r);
        assert_eq!(r.csi, vec![(b'H', vec![], vec![1, 2], None)]);
    }

    #[test]
    fn csi_private_marker_is_flagged() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"\x1b[?2004h", &mut r);
        assert_eq!(r.csi, vec![(b'h', vec![], vec![2004], Some(b'?'))]);
    }

    #[test]
    fn sgr_256_color_params_collected() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"\x1b[38;5;201m", &mut r);
        assert_eq!(r.csi, vec![(b'm', vec![], vec![38, 5, 201], None)]);
    }

    #[test]
    fn parameter_overflow_clamps_without_panicking() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        let mut seq = b"\x1b[".to_vec();
        seq.extend(std::iter::repeat(b'9').take(40));
        seq.push(b'm');
        p.feed(&seq, &mut r);
        assert_eq!(r.csi.len(), 1);
        assert!(r.csi[0].2[0] <= MAX_PARAM_VALUE);
    }

    #[test]
    fn too_many_params_are_capped_not_panicking() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        let mut seq = b"\x1b[".to_vec();
        for i in 0..40 {
            if i > 0 {
                seq.push(b';');
            }
            seq.push(b'1');
        }
        seq.push(b'm');
        p.feed(&seq, &mut r);
        assert!(r.csi[0].2.len() <= MAX_PARAMS);
    }

    #[test]
    fn osc_terminated_by_bel() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"\x1b]0;title\x07", &mut r);
        assert_eq!(r.osc, vec![b"0;title".to_vec()]);
    }

    #[test]
    fn charset_designation() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        p.feed(b"\x1b(B\x1b)0", &mut r);
        assert_eq!(r.charset, vec![(0, b'B'), (1, b'0')]);
    }

    #[test]
    fn latin1_encoding_maps_bytes_directly() {
        let mut p = VtParser::new();
        p.set_encoding(Encoding::Latin1);
        let mut r = Recorder::default();
        p.feed(&[0xE9], &mut r); // 0xE9 is 'é' in Latin-1, 2-byte lead in UTF-8
        assert_eq!(r.printed, "\u{e9}");
    }

    #[test]
    fn switching_back_to_utf8_resets_decoder_state() {
        let mut p = VtParser::new();
        p.set_encoding(Encoding::Latin1);
        p.set_encoding(Encoding::Utf8);
        let mut r = Recorder::default();
        p.feed("é".as_bytes(), &mut r);
        assert_eq!(r.printed, "é");
    }

    #[test]
    fn never_panics_on_arbitrary_bytes() {
        let mut p = VtParser::new();
        let mut r = Recorder::default();
        // a grab-bag including raw high bytes, lone ESC, bad CSI bytes
        p.feed(b"\x1b\x1b[\x01\xff\x1b]\x1b[1;;9999999999999999m\x07", &mut r);
    }
}
