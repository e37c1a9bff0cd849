//! Table-driven mapping of (key, modifiers, mode-flags) to a byte sequence
//! or a semantic scrollback command.
//!
//! Grounded in `Konsole::KeyboardTranslator`/`KeyboardTranslatorReader`
//! (`examples/original_source/src/keyboardtranslator/KeyboardTranslator.h`,
//! `KeyboardTranslatorReader.cpp`): the `Entry::matches` mask comparison,
//! the `+`/`-` "wanted" toggle while scanning a key condition, and the
//! wildcard modifier-value arithmetic (`1 + shift + 2*alt + 4*ctrl`) are
//! carried over verbatim; the original's `QKeySequence`/`Qt::Key` types are
//! replaced with a small crate-local `KeyCode`/`Modifiers`/`StateFlags` so
//! the translator has no dependency on any particular input-event crate.

use std::collections::HashMap;

/// A logical key identity, independent of any input-handling crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    Tab,
    Enter,
    Escape,
    Function(u8),
    Char(char),
}

/// Minimal bitflags-shaped type, hand-rolled to avoid pulling in the
/// `bitflags` crate for two small sets; mirrors the pattern already used
/// for `Rendition` in `cell.rs`.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($repr);

        impl $name {
            pub const EMPTY: $name = $name(0);
            $(pub const $flag: $name = $name($value);)*

            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: $name) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: $name, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_like! {
    /// Keyboard modifiers.
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
        const META = 1 << 3;
        const KEYPAD = 1 << 4;
    }
}

bitflags_like! {
    /// Terminal mode flags.
    pub struct StateFlags: u8 {
        const APP_CURSOR_KEYS = 1 << 0;
        const ANSI = 1 << 1;
        const NEW_LINE = 1 << 2;
        const APP_SCREEN = 1 << 3;
        const ANY_MODIFIER = 1 << 4;
        const APP_KEYPAD = 1 << 5;
    }
}

/// The semantic commands a rule can resolve to, instead of literal bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    ScrollPageUp,
    ScrollPageDown,
    ScrollLineUp,
    ScrollLineDown,
    ScrollToTop,
    ScrollToBottom,
    Erase,
}

/// What a successful lookup resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Raw bytes to send to the pty, with any `*` wildcard already
    /// substituted for the numeric modifier combination.
    Bytes(Vec<u8>),
    Command(Command),
    /// No rule matched.
    None,
}

/// One rule: `(key_code, modifier_value, modifier_mask, state_value,
/// state_mask, command_or_text)`.
#[derive(Debug, Clone)]
struct KeyEntry {
    key_code: KeyCode,
    modifier_value: Modifiers,
    modifier_mask: Modifiers,
    state_value: StateFlags,
    state_mask: StateFlags,
    command: Command,
    /// Raw template bytes when `command == Command::None` and this entry
    /// produces text; `*` bytes are substituted at lookup time.
    text: Vec<u8>,
}

impl KeyEntry {
    fn matches(&self, key: KeyCode, modifiers: Modifiers, state: StateFlags) -> bool {
        if self.key_code != key {
            return false;
        }
        if (modifiers.0 & self.modifier_mask.0) != (self.modifier_value.0 & self.modifier_mask.0) {
            return false;
        }
        if self.state_mask.contains(StateFlags::ANY_MODIFIER) {
            let non_keypad = Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL | Modifiers::META;
            let any_non_keypad = modifiers.intersects(non_keypad);
            if self.state_value.contains(StateFlags::ANY_MODIFIER) && !any_non_keypad {
                return false;
            }
        }
        let other_state_mask = StateFlags(self.state_mask.0 & !StateFlags::ANY_MODIFIER.0);
        (state.0 & other_state_mask.0) == (self.state_value.0 & other_state_mask.0)
    }
}

/// Wildcard modifier value: base 1, +1 Shift, +2 Alt, +4 Ctrl
/// (`KeyboardTranslator.h`'s `modifierValue` computation).
fn wildcard_modifier_value(modifiers: Modifiers) -> u8 {
    1 + modifiers.intersects(Modifiers::SHIFT) as u8
        + 2 * modifiers.intersects(Modifiers::ALT) as u8
        + 4 * modifiers.intersects(Modifiers::CTRL) as u8
}

fn substitute_wildcards(template: &[u8], modifiers: Modifiers) -> Vec<u8> {
    let digit = b'0' + wildcard_modifier_value(modifiers);
    template
        .iter()
        .map(|&b| if b == b'*' { digit } else { b })
        .collect()
}

/// A parsed keybinding table.
pub struct KeyTranslator {
    description: String,
    /// Rules bucketed by key code, preserving table order within a bucket
    /// (first match wins).
    entries: HashMap<KeyCode, Vec<KeyEntry>>,
}

impl KeyTranslator {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn lookup(&self, key: KeyCode, modifiers: Modifiers, state: StateFlags) -> Output {
        let Some(bucket) = self.entries.get(&key) else { return Output::None };
        for entry in bucket {
            if entry.matches(key, modifiers, state) {
                return match entry.command {
                    Command::None => Output::Bytes(substitute_wildcards(&entry.text, modifiers)),
                    cmd => Output::Command(cmd),
                };
            }
        }
        Output::None
    }

    /// Parse the text keybinding format.
    pub fn parse(source: &str) -> Self {
        let mut description = String::new();
        let mut entries: HashMap<KeyCode, Vec<KeyEntry>> = HashMap::new();

        for (lineno, raw_line) in source.lines().enumerate() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(title) = parse_title_line(line) {
                description = title.to_string();
                continue;
            }
            match parse_key_line(line) {
                Some(entry) => entries.entry(entry.key_code).or_default().push(entry),
                None => {
                    tracing::warn!(line = lineno + 1, text = line, "unparseable keybinding line, skipping");
                }
            }
        }

        KeyTranslator { description, entries }
    }

    /// A handful of sensible defaults, standing in for a shipped table.
    pub fn builtin_minimal() -> Self {
        Self::parse(
            "keyboard \"builtin\"\n\
             key Up+Shift : \"\\E[1;2A\"\n\
             key Up : \"\\E[*A\"\n\
             key Down : \"\\E[*B\"\n\
             key Right : \"\\E[*C\"\n\
             key Left : \"\\E[*D\"\n\
             key Home : \"\\E[*H\"\n\
             key End : \"\\E[*F\"\n\
             key PageUp : scrollpageup\n\
             key PageDown : scrollpagedown\n",
        )
    }
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_title_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("keyboard")?.trim();
    let rest = rest.strip_prefix('"')?;
    rest.strip_suffix('"')
}

fn parse_key_line(line: &str) -> Option<KeyEntry> {
    let rest = line.strip_prefix("key")?;
    let colon = find_top_level_colon(rest)?;
    let (condition, result) = rest.split_at(colon);
    let result = &result[1..];
    let condition = condition.trim();
    let result = result.trim();

    let (key_code, modifier_value, modifier_mask, state_value, state_mask) =
        decode_sequence(&condition.to_lowercase())?;

    let (command, text) = if let Some(quoted) = result.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        (Command::None, parse_output_text(quoted))
    } else {
        (parse_command(result)?, Vec::new())
    };

    Some(KeyEntry {
        key_code,
        modifier_value,
        modifier_mask,
        state_value,
        state_mask,
        command,
        text,
    })
}

fn find_top_level_colon(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_command(text: &str) -> Option<Command> {
    Some(match text.to_lowercase().as_str() {
        "erase" => Command::Erase,
        "scrollpageup" => Command::ScrollPageUp,
        "scrollpagedown" => Command::ScrollPageDown,
        "scrolllineup" => Command::ScrollLineUp,
        "scrolllinedown" => Command::ScrollLineDown,
        "scrolluptotop" => Command::ScrollToTop,
        "scrolldowntobottom" => Command::ScrollToBottom,
        _ => return None,
    })
}

/// Mirrors `KeyboardTranslatorReader::decodeSequence`: scan letter/number
/// runs, classify each as a modifier, a state flag, or the key name itself,
/// tracking a "wanted" flag toggled by a preceding `+`/`-`.
fn decode_sequence(text: &str) -> Option<(KeyCode, Modifiers, Modifiers, StateFlags, StateFlags)> {
    let mut wanted = true;
    let mut buffer = String::new();
    let mut modifier_value = Modifiers::EMPTY;
    let mut modifier_mask = Modifiers::EMPTY;
    let mut state_value = StateFlags::EMPTY;
    let mut state_mask = StateFlags::EMPTY;
    let mut key_code: Option<KeyCode> = None;

    let chars: Vec<char> = text.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        let is_last = i == chars.len() - 1;
        if ch.is_alphanumeric() {
            buffer.push(ch);
        }
        let end_of_item = !ch.is_alphanumeric();
        if (end_of_item || is_last) && !buffer.is_empty() {
            if let Some(m) = parse_modifier(&buffer) {
                modifier_mask |= m;
                if wanted {
                    modifier_value |= m;
                }
            } else if let Some(s) = parse_state_flag(&buffer) {
                state_mask |= s;
                if wanted {
                    state_value |= s;
                }
            } else if let Some(k) = parse_key_code(&buffer) {
                key_code = Some(k);
            }
            buffer.clear();
        }
        if ch == '+' {
            wanted = true;
        } else if ch == '-' {
            wanted = false;
        }
    }

    Some((key_code?, modifier_value, modifier_mask, state_value, state_mask))
}

fn parse_modifier(item: &str) -> Option<Modifiers> {
    Some(match item {
        "shift" => Modifiers::SHIFT,
        "ctrl" | "control" => Modifiers::CTRL,
        "alt" => Modifiers::ALT,
        "meta" => Modifiers::META,
        "keypad" => Modifiers::KEYPAD,
        _ => return None,
    })
}

fn parse_state_flag(item: &str) -> Option<StateFlags> {
    Some(match item {
        "appcukeys" | "appcursorkeys" => StateFlags::APP_CURSOR_KEYS,
        "ansi" => StateFlags::ANSI,
        "newline" => StateFlags::NEW_LINE,
        "appscreen" => StateFlags::APP_SCREEN,
        "anymod" | "anymodifier" => StateFlags::ANY_MODIFIER,
        "appkeypad" => StateFlags::APP_KEYPAD,
        _ => return None,
    })
}

fn parse_key_code(item: &str) -> Option<KeyCode> {
    Some(match item {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pgup" | "prior" => KeyCode::PageUp,
        "pgdown" | "next" => KeyCode::PageDown,
        "insert" => KeyCode::Insert,
        "delete" => KeyCode::Delete,
        "backspace" => KeyCode::Backspace,
        "tab" => KeyCode::Tab,
        "return" | "enter" => KeyCode::Enter,
        "escape" | "esc" => KeyCode::Escape,
        "space" => KeyCode::Char(' '),
        _ => {
            if let Some(n) = item.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                KeyCode::Function(n)
            } else if item.chars().count() == 1 {
                KeyCode::Char(item.chars().next().unwrap())
            } else {
                return None;
            }
        }
    })
}

/// Decode `\E`, `\t`, `\r`, `\n`, `\b`, `\f`, `\xHH` escapes inside a
/// quoted output string, plus literal bytes (including `*` wildcards,
/// left untouched for `substitute_wildcards`).
fn parse_output_text(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('E') => out.push(0x1b),
            Some('t') => out.push(b'\t'),
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('b') => out.push(0x08),
            Some('f') => out.push(0x0c),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    let hex: String = [hi, lo].iter().collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        out.push(byte);
                    }
                }
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_up_matches_exact_rule() {
        let kt = KeyTranslator::builtin_minimal();
        let out = kt.lookup(KeyCode::Up, Modifiers::SHIFT, StateFlags::EMPTY);
        assert_eq!(out, Output::Bytes(b"\x1b[1;2A".to_vec()));
    }

    #[test]
    fn plain_up_uses_wildcard_rule() {
        let kt = KeyTranslator::builtin_minimal();
        let out = kt.lookup(KeyCode::Up, Modifiers::EMPTY, StateFlags::EMPTY);
        assert_eq!(out, Output::Bytes(b"\x1b[1A".to_vec()));
    }

    #[test]
    fn wildcard_with_shift_expands_to_two() {
        let kt = KeyTranslator::parse("key Up : \"\\E[*A\"\n");
        let out = kt.lookup(KeyCode::Up, Modifiers::SHIFT, StateFlags::EMPTY);
        assert_eq!(out, Output::Bytes(b"\x1b[2A".to_vec()));
    }

    #[test]
    fn no_match_when_required_modifier_absent() {
        let kt = KeyTranslator::parse("key Up+Shift : \"\\E[1;2A\"\n");
        assert_eq!(
            kt.lookup(KeyCode::Up, Modifiers::EMPTY, StateFlags::EMPTY),
            Output::None
        );
    }

    #[test]
    fn negative_modifier_requires_absence() {
        let kt = KeyTranslator::parse("key Up-Shift : \"plain\"\n");
        assert_eq!(
            kt.lookup(KeyCode::Up, Modifiers::SHIFT, StateFlags::EMPTY),
            Output::None
        );
        assert_eq!(
            kt.lookup(KeyCode::Up, Modifiers::EMPTY, StateFlags::EMPTY),
            Output::Bytes(b"plain".to_vec())
        );
    }

    #[test]
    fn command_rules_resolve_to_command() {
        let kt = KeyTranslator::builtin_minimal();
        assert_eq!(
            kt.lookup(KeyCode::PageUp, Modifiers::EMPTY, StateFlags::EMPTY),
            Output::Command(Command::ScrollPageUp)
        );
    }

    #[test]
    fn any_modifier_state_requires_a_non_keypad_modifier() {
        let kt = KeyTranslator::parse("key Escape+AnyModifier : \"\\E\\E\"\n");
        assert_eq!(
            kt.lookup(KeyCode::Escape, Modifiers::EMPTY, StateFlags::EMPTY),
            Output::None
        );
        assert_eq!(
            kt.lookup(KeyCode::Escape, Modifiers::ALT, StateFlags::EMPTY),
            Output::Bytes(b"\x1b\x1b".to_vec())
        );
    }

    #[test]
    fn determinism_same_inputs_same_output() {
        let kt = KeyTranslator::builtin_minimal();
        let a = kt.lookup(KeyCode::Up, Modifiers::SHIFT, StateFlags::EMPTY);
        let b = kt.lookup(KeyCode::Up, Modifiers::SHIFT, StateFlags::EMPTY);
        assert_eq!(a, b);
    }

    #[test]
    fn comments_and_title_are_ignored() {
        let kt = KeyTranslator::parse(
            "keyboard \"demo\"\n# a comment\nkey Up : \"\\E[*A\" # trailing\n",
        );
        assert_eq!(kt.description(), "demo");
        assert_eq!(
            kt.lookup(KeyCode::Up, Modifiers::EMPTY, StateFlags::EMPTY),
            Output::Bytes(b"\x1b[1A".to_vec())
        );
    }
}
