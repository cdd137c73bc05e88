//! Character-level repair state machine.
//!
//! The scanner walks the decoded text once, copying it to an output buffer
//! and patching the corruption patterns listed in [`FixKind`]. It tracks:
//!
//! - whether it is inside a string literal (nothing inside a string is ever
//!   treated as structure),
//! - a stack of open objects/arrays,
//! - whether the last string closed in object-key position and still waits
//!   for its `:`.
//!
//! Escape handling looks at the character after a backslash directly, so no
//! escape-pending state survives between iterations.

use super::{FixKind, RepairAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

impl Frame {
    const fn closer(self) -> char {
        match self {
            Self::Object => '}',
            Self::Array => ']',
        }
    }

    const fn for_closer(c: char) -> Self {
        if c == '}' {
            Self::Object
        } else {
            Self::Array
        }
    }
}

/// Result of a scan.
#[derive(Debug)]
pub(crate) struct ScanOutput {
    pub text: String,
    pub actions: Vec<RepairAction>,
    /// False if no `{` or `[` was ever found.
    pub found_structure: bool,
}

pub(crate) struct Scanner<'a> {
    chars: &'a [char],
    pos: usize,
    out: String,
    stack: Vec<Frame>,
    actions: Vec<RepairAction>,
    started: bool,
    finished: bool,
    in_string: bool,
    string_is_key: bool,
    pending_key: bool,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(chars: &'a [char]) -> Self {
        Self {
            chars,
            pos: 0,
            out: String::with_capacity(chars.len() + 16),
            stack: Vec::new(),
            actions: Vec::new(),
            started: false,
            finished: false,
            in_string: false,
            string_is_key: false,
            pending_key: false,
        }
    }

    pub(crate) fn run(mut self) -> ScanOutput {
        let mut skipped_leading = false;

        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];

            if !self.started {
                if c == '{' || c == '[' {
                    self.started = true;
                    if skipped_leading {
                        self.record(FixKind::LeadingGarbage, 0);
                    }
                } else {
                    skipped_leading |= !c.is_whitespace();
                    self.pos += 1;
                    continue;
                }
            }

            if self.finished {
                if !c.is_whitespace() {
                    self.record(FixKind::TrailingContent, self.pos);
                    break;
                }
                self.out.push(c);
                self.pos += 1;
                continue;
            }

            if self.in_string {
                self.string_char(c);
            } else {
                self.structural_char(c);
                self.pos += 1;
            }
        }

        if self.started {
            self.finish_input();
        }

        ScanOutput {
            text: self.out,
            actions: self.actions,
            found_structure: self.started,
        }
    }

    fn record(&mut self, kind: FixKind, position: usize) {
        self.actions.push(RepairAction { kind, position });
    }

    /// Last non-whitespace character written outside the current string.
    fn last_significant(&self) -> Option<char> {
        self.out.trim_end().chars().last()
    }

    fn peek_significant(&self, from: usize) -> Option<char> {
        self.chars[from.min(self.chars.len())..]
            .iter()
            .copied()
            .find(|c| !c.is_whitespace())
    }

    fn string_char(&mut self, c: char) {
        match c {
            '\\' => self.escape_sequence(),
            '"' => {
                let next = self.peek_significant(self.pos + 1);
                if matches!(next, None | Some(',' | ':' | '}' | ']')) {
                    self.out.push('"');
                    self.in_string = false;
                    self.pending_key = self.string_is_key;
                } else {
                    self.record(FixKind::UnescapedQuote, self.pos);
                    self.out.push_str("\\\"");
                }
                self.pos += 1;
            }
            c if (c as u32) < 0x20 => {
                self.record(FixKind::ControlCharacter, self.pos);
                push_escaped_control(&mut self.out, c);
                self.pos += 1;
            }
            c => {
                self.out.push(c);
                self.pos += 1;
            }
        }
    }

    fn escape_sequence(&mut self) {
        let Some(&next) = self.chars.get(self.pos + 1) else {
            // Input ends mid-escape; the string is closed at end of input.
            self.pos += 1;
            return;
        };

        match next {
            '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' => {
                self.out.push('\\');
                self.out.push(next);
                self.pos += 2;
            }
            'u' if self.hex_digits_follow(self.pos + 2) => self.unicode_escape(),
            _ => {
                // Keep the backslash as a literal character; the following
                // character is processed on its own.
                self.record(FixKind::InvalidEscape, self.pos);
                self.out.push_str("\\\\");
                self.pos += 1;
            }
        }
    }

    /// `\uXXXX` at `self.pos`. A surrogate half without its partner cannot
    /// be decoded and becomes U+FFFD.
    fn unicode_escape(&mut self) {
        let unit = self.code_unit_at(self.pos);
        let width = match unit {
            Some(0xD800..=0xDBFF) => {
                let low = self.chars.get(self.pos + 6..self.pos + 8) == Some(&['\\', 'u'][..]);
                if low && matches!(self.code_unit_at(self.pos + 6), Some(0xDC00..=0xDFFF)) {
                    12
                } else {
                    0
                }
            }
            Some(0xDC00..=0xDFFF) => 0,
            _ => 6,
        };

        if width == 0 {
            self.record(FixKind::InvalidEscape, self.pos);
            self.out.push_str("\\ufffd");
            self.pos += 6;
            return;
        }

        self.out.extend(&self.chars[self.pos..self.pos + width]);
        self.pos += width;
    }

    /// Value of a complete `\uXXXX` escape starting at `at`.
    fn code_unit_at(&self, at: usize) -> Option<u32> {
        if !self.hex_digits_follow(at + 2) {
            return None;
        }
        let digits: String = self.chars[at + 2..at + 6].iter().collect();
        u32::from_str_radix(&digits, 16).ok()
    }

    fn hex_digits_follow(&self, from: usize) -> bool {
        self.chars
            .get(from..from + 4)
            .is_some_and(|digits| digits.iter().all(char::is_ascii_hexdigit))
    }

    fn structural_char(&mut self, c: char) {
        match c {
            '"' => {
                self.insert_missing_comma();
                self.string_is_key = self.stack.last() == Some(&Frame::Object)
                    && matches!(self.last_significant(), Some('{' | ','));
                self.in_string = true;
                self.out.push('"');
            }
            '{' | '[' => {
                self.insert_missing_comma();
                self.stack.push(if c == '{' { Frame::Object } else { Frame::Array });
                self.out.push(c);
            }
            '}' | ']' => self.close(c),
            ',' => match self.last_significant() {
                Some(',' | '[' | '{') => self.record(FixKind::ExtraComma, self.pos),
                _ => {
                    self.complete_missing_value();
                    self.out.push(',');
                }
            },
            ':' => {
                self.pending_key = false;
                self.out.push(':');
            }
            c => self.out.push(c),
        }
    }

    /// `}{`, `][`, `}"` between elements: add the comma the export dropped.
    fn insert_missing_comma(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        if matches!(self.last_significant(), Some('}' | ']')) {
            self.record(FixKind::MissingComma, self.pos);
            let trimmed = self.out.trim_end().len();
            self.out.insert(trimmed, ',');
        }
    }

    /// A key that never got its value, or a `:` with nothing after it.
    fn complete_missing_value(&mut self) {
        if self.pending_key {
            self.record(FixKind::MissingValue, self.pos);
            self.out.push_str(": null");
            self.pending_key = false;
        } else if self.last_significant() == Some(':') {
            self.record(FixKind::MissingValue, self.pos);
            self.out.push_str("null");
        }
    }

    fn strip_trailing_comma(&mut self) {
        let trimmed = self.out.trim_end().len();
        if self.out[..trimmed].ends_with(',') {
            self.record(FixKind::TrailingComma, self.pos);
            let whitespace = self.out[trimmed..].to_string();
            self.out.truncate(trimmed - 1);
            self.out.push_str(&whitespace);
        }
    }

    fn close(&mut self, c: char) {
        let wanted = Frame::for_closer(c);
        if !self.stack.contains(&wanted) {
            self.record(FixKind::StrayCloser, self.pos);
            return;
        }

        self.strip_trailing_comma();
        self.complete_missing_value();

        while let Some(&top) = self.stack.last() {
            if top == wanted {
                break;
            }
            self.record(FixKind::MismatchedCloser, self.pos);
            self.stack.pop();
            self.out.push(top.closer());
        }

        self.stack.pop();
        self.out.push(c);
        if self.stack.is_empty() {
            self.finished = true;
        }
    }

    fn finish_input(&mut self) {
        let end = self.chars.len();

        if self.in_string {
            self.record(FixKind::UnterminatedString, end);
            self.out.push('"');
            self.in_string = false;
            self.pending_key = self.string_is_key;
        }

        if self.finished {
            return;
        }

        self.complete_truncated_literal(end);
        self.complete_missing_value();
        self.strip_trailing_comma();

        while let Some(frame) = self.stack.pop() {
            self.record(FixKind::UnclosedStructure, end);
            self.out.push(frame.closer());
        }
    }

    /// `tru` → `true`, `nul` → `null`, `12.` → `12.0`, `-` → `-0`.
    fn complete_truncated_literal(&mut self, end: usize) {
        let trimmed_len = self.out.trim_end().len();
        let token_start = self.out[..trimmed_len]
            .rfind(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '+' | '-')))
            .map_or(0, |i| i + 1);
        let token = &self.out[token_start..trimmed_len];
        if token.is_empty() {
            return;
        }

        let completion = ["true", "false", "null"]
            .iter()
            .find(|literal| literal.len() > token.len() && literal.starts_with(token))
            .map(|literal| literal[token.len()..].to_string())
            .or_else(|| {
                let numeric = token.starts_with(|ch: char| ch == '-' || ch.is_ascii_digit());
                let incomplete = token.ends_with(['.', 'e', 'E', '+', '-']);
                (numeric && incomplete).then(|| "0".to_string())
            });

        if let Some(rest) = completion {
            self.record(FixKind::TruncatedLiteral, end);
            self.out.truncate(trimmed_len);
            self.out.push_str(&rest);
        }
    }
}

fn push_escaped_control(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{08}' => out.push_str("\\b"),
        '\u{0C}' => out.push_str("\\f"),
        other => out.push_str(&format!("\\u{:04x}", other as u32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> ScanOutput {
        let chars: Vec<char> = input.chars().collect();
        Scanner::new(&chars).run()
    }

    fn kinds(output: &ScanOutput) -> Vec<FixKind> {
        output.actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_valid_input_unchanged() {
        let input = r#"{"a": [1, 2, {"b": "c\n\"d\""}], "e": null}"#;
        let out = scan(input);
        assert_eq!(out.text, input);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn test_trailing_comma_before_closer() {
        let out = scan("[1, 2, ]");
        assert_eq!(out.text, "[1, 2 ]");
        assert_eq!(kinds(&out), [FixKind::TrailingComma]);
    }

    #[test]
    fn test_extra_commas() {
        let out = scan("[,1,,2]");
        assert_eq!(out.text, "[1,2]");
        assert_eq!(kinds(&out), [FixKind::ExtraComma, FixKind::ExtraComma]);
    }

    #[test]
    fn test_comma_inside_string_untouched() {
        let out = scan(r#"["a,]", "}"]"#);
        assert_eq!(out.text, r#"["a,]", "}"]"#);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn test_control_characters_escaped() {
        let out = scan("[\"line1\nline2\ttab\u{1}\"]");
        assert_eq!(out.text, r#"["line1\nline2\ttab\u0001"]"#);
        assert_eq!(
            kinds(&out),
            [FixKind::ControlCharacter, FixKind::ControlCharacter, FixKind::ControlCharacter]
        );
    }

    #[test]
    fn test_invalid_escape_keeps_backslash() {
        let out = scan(r#"["C:\dir\u12"]"#);
        assert_eq!(out.text, r#"["C:\\dir\\u12"]"#);
        assert_eq!(kinds(&out), [FixKind::InvalidEscape, FixKind::InvalidEscape]);
    }

    #[test]
    fn test_unicode_escape_preserved() {
        let out = scan(r#"["\u00e9"]"#);
        assert_eq!(out.text, r#"["\u00e9"]"#);
    }

    #[test]
    fn test_surrogate_pair_preserved() {
        let out = scan(r#"["smile \ud83d\ude00"]"#);
        assert_eq!(out.text, r#"["smile \ud83d\ude00"]"#);
        assert!(out.actions.is_empty());
    }

    #[test]
    fn test_lone_surrogates_replaced() {
        let out = scan(r#"["smile \ud83d"#);
        assert_eq!(out.text, r#"["smile \ufffd"]"#);
        assert_eq!(
            kinds(&out),
            [FixKind::InvalidEscape, FixKind::UnterminatedString, FixKind::UnclosedStructure]
        );

        assert_eq!(scan(r#"["\ud83d\u0041"]"#).text, r#"["\ufffd\u0041"]"#);
        assert_eq!(scan(r#"["\ude00 x"]"#).text, r#"["\ufffd x"]"#);
        assert_eq!(scan(r#"["\ud83d\"#).text, r#"["\ufffd"]"#);
    }

    #[test]
    fn test_unescaped_inner_quote() {
        let out = scan(r#"{"content": "he said "hi" ok"}"#);
        assert_eq!(out.text, r#"{"content": "he said \"hi\" ok"}"#);
        assert_eq!(kinds(&out), [FixKind::UnescapedQuote, FixKind::UnescapedQuote]);
    }

    #[test]
    fn test_truncated_array_closed() {
        let out = scan(r#"{"sessions": [{"id": "1"}, {"id": "2"}"#);
        assert_eq!(out.text, r#"{"sessions": [{"id": "1"}, {"id": "2"}]}"#);
        assert_eq!(
            kinds(&out),
            [FixKind::UnclosedStructure, FixKind::UnclosedStructure]
        );
    }

    #[test]
    fn test_truncated_inside_string() {
        let out = scan(r#"{"content": "hel"#);
        assert_eq!(out.text, r#"{"content": "hel"}"#);
        assert_eq!(
            kinds(&out),
            [FixKind::UnterminatedString, FixKind::UnclosedStructure]
        );
    }

    #[test]
    fn test_truncated_after_backslash() {
        let out = scan("[\"abc\\");
        assert_eq!(out.text, r#"["abc"]"#);
    }

    #[test]
    fn test_truncated_key_gets_null_value() {
        assert_eq!(scan(r#"{"a": 1, "b"#).text, r#"{"a": 1, "b": null}"#);
        assert_eq!(scan(r#"{"a": "#).text, r#"{"a": null}"#);
        assert_eq!(scan(r#"{"a": 1,"#).text, r#"{"a": 1}"#);
    }

    #[test]
    fn test_truncated_literals_completed() {
        assert_eq!(scan("[tr").text, "[true]");
        assert_eq!(scan("[1, nu").text, "[1, null]");
        assert_eq!(scan("[12.").text, "[12.0]");
        assert_eq!(scan("[-").text, "[-0]");
        assert_eq!(scan("[1e").text, "[1e0]");
        assert_eq!(scan("[12").text, "[12]");
    }

    #[test]
    fn test_mismatched_closer_closes_inner_frames() {
        let out = scan(r#"[{"a": 1]"#);
        assert_eq!(out.text, r#"[{"a": 1}]"#);
        assert_eq!(kinds(&out), [FixKind::MismatchedCloser]);
    }

    #[test]
    fn test_stray_closer_dropped() {
        let out = scan(r#"{"a": [1]]}"#);
        assert_eq!(out.text, r#"{"a": [1]}"#);
        assert_eq!(kinds(&out), [FixKind::StrayCloser]);
    }

    #[test]
    fn test_missing_comma_between_objects() {
        let out = scan(r#"[{"id": 1} {"id": 2}]"#);
        assert_eq!(out.text, r#"[{"id": 1}, {"id": 2}]"#);
        assert_eq!(kinds(&out), [FixKind::MissingComma]);
    }

    #[test]
    fn test_leading_and_trailing_garbage() {
        let out = scan("garbage {\"a\": 1} more");
        assert_eq!(out.text, "{\"a\": 1} ");
        assert_eq!(kinds(&out), [FixKind::LeadingGarbage, FixKind::TrailingContent]);
    }

    #[test]
    fn test_no_structure() {
        let out = scan("just some text");
        assert!(!out.found_structure);
        assert!(out.text.is_empty());
    }
}
