//! Streaming tokenizer for Go source.
//!
//! # Invariants
//! - Single pass over the byte buffer; at most one byte of lookahead outside
//!   string and comment bodies.
//! - Token `line` numbers are 1-based and non-decreasing within one buffer.
//! - Token text is a borrowed slice of the source buffer; no copies.
//!
//! # Design Notes
//! - Recovery, not rejection: a byte that begins no legal token comes back as
//!   a single [`TokenKind::Character`] token and scanning resumes after it.
//!   An unterminated string or rune literal yields `Character` for its
//!   opening quote and rescans from the next byte.
//! - Identifier-shaped words are classified against the closed tables in
//!   [`tables`] (keywords, predeclared types, predeclared non-types).

pub mod tables;

use memchr::{memchr, memrchr};

/// Comment flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// String literal flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrKind {
    Quoted,
    Raw,
}

/// Identifier alphabet: pure ASCII or carrying multi-byte code points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentKind {
    Ascii,
    Unicode,
}

/// Numeric literal form.
///
/// `LegacyOctal` is a leading-zero literal with at least two digits and no
/// `o`/`O` marker. Hex floats (`0x1.fp3`) classify as `Float`; the base
/// subkinds describe integer forms only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    Binary,
    PrefixedOctal,
    Decimal,
    Hexadecimal,
    LegacyOctal,
    Float,
}

/// Token classification emitted by the lexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Space,
    Comment(CommentKind),
    Str(StrKind),
    Rune,
    Operator,
    Ident(IdentKind),
    Number(NumberKind),
    Keyword,
    Type,
    Other,
    Character,
    Eof,
}

/// One lexeme: kind, borrowed text, and the 1-based line of its first byte.
#[derive(Clone, Copy, Debug)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
    pub line: u32,
}

/// Streaming lexer over a source buffer.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    tok_start: usize,
    tok_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            tok_start: 0,
            tok_line: 1,
        }
    }

    /// Full text of the physical line containing the current token's first
    /// byte, without the trailing newline.
    pub fn get_line(&self) -> &'a [u8] {
        let start = memrchr(b'\n', &self.src[..self.tok_start]).map_or(0, |i| i + 1);
        let end = memchr(b'\n', &self.src[self.tok_start..])
            .map_or(self.src.len(), |i| self.tok_start + i);
        &self.src[start..end]
    }

    /// Scan and return the next token. Returns `TokenKind::Eof` (with empty
    /// text) at end of input, repeatedly if called again.
    pub fn next_token(&mut self) -> Token<'a> {
        self.tok_start = self.pos;
        self.tok_line = self.line;

        let Some(&b) = self.src.get(self.pos) else {
            return self.token(TokenKind::Eof);
        };

        match b {
            b' ' | b'\t' | b'\r' | b'\n' => self.scan_space(),
            b'/' => match self.peek(1) {
                Some(b'/') => self.scan_line_comment(),
                Some(b'*') => self.scan_block_comment(),
                _ => self.scan_operator(),
            },
            b'"' => self.scan_quoted_string(),
            b'`' => self.scan_raw_string(),
            b'\'' => self.scan_rune(),
            b'0'..=b'9' => self.scan_number(),
            b'.' => {
                if matches!(self.peek(1), Some(b'0'..=b'9')) {
                    self.scan_number()
                } else {
                    self.scan_operator()
                }
            }
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.scan_identifier(),
            _ if b < 0x80 => self.scan_operator(),
            _ => match decode_char(&self.src[self.pos..]) {
                Some((c, _)) if c.is_alphabetic() => self.scan_identifier(),
                _ => self.bump_character(),
            },
        }
    }

    #[inline]
    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    #[inline]
    fn token(&self, kind: TokenKind) -> Token<'a> {
        Token {
            kind,
            text: &self.src[self.tok_start..self.pos],
            line: self.tok_line,
        }
    }

    /// Emit a single `Character` token for the byte at `tok_start` and
    /// position the scan immediately after it.
    fn bump_character(&mut self) -> Token<'a> {
        self.pos = self.tok_start + 1;
        self.line = self.tok_line;
        self.token(TokenKind::Character)
    }

    fn scan_space(&mut self) -> Token<'a> {
        while let Some(&b) = self.src.get(self.pos) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
        self.token(TokenKind::Space)
    }

    fn scan_line_comment(&mut self) -> Token<'a> {
        self.pos += 2;
        self.pos = memchr(b'\n', &self.src[self.pos..])
            .map_or(self.src.len(), |i| self.pos + i);
        self.token(TokenKind::Comment(CommentKind::Line))
    }

    /// `/*` to the matching `*/`, possibly spanning lines; not nested. An
    /// unterminated comment runs to end of input.
    fn scan_block_comment(&mut self) -> Token<'a> {
        self.pos += 2;
        while self.pos < self.src.len() {
            match memchr(b'*', &self.src[self.pos..]) {
                Some(i) => {
                    let star = self.pos + i;
                    self.count_newlines(self.pos, star);
                    if self.src.get(star + 1) == Some(&b'/') {
                        self.pos = star + 2;
                        return self.token(TokenKind::Comment(CommentKind::Block));
                    }
                    self.pos = star + 1;
                }
                None => {
                    self.count_newlines(self.pos, self.src.len());
                    self.pos = self.src.len();
                    break;
                }
            }
        }
        self.token(TokenKind::Comment(CommentKind::Block))
    }

    #[inline]
    fn count_newlines(&mut self, from: usize, to: usize) {
        self.line += memchr::memchr_iter(b'\n', &self.src[from..to]).count() as u32;
    }

    /// `"`-delimited with backslash escapes. Termination at end of line or
    /// end of input recovers via a `Character` token.
    fn scan_quoted_string(&mut self) -> Token<'a> {
        let mut i = self.pos + 1;
        while let Some(&b) = self.src.get(i) {
            match b {
                b'"' => {
                    self.pos = i + 1;
                    return self.token(TokenKind::Str(StrKind::Quoted));
                }
                b'\\' => i += 2,
                b'\n' => break,
                _ => i += 1,
            }
        }
        self.bump_character()
    }

    /// Backtick-delimited, no escape processing, may span lines.
    fn scan_raw_string(&mut self) -> Token<'a> {
        match memchr(b'`', &self.src[self.pos + 1..]) {
            Some(i) => {
                let end = self.pos + 1 + i + 1;
                self.count_newlines(self.pos, end);
                self.pos = end;
                self.token(TokenKind::Str(StrKind::Raw))
            }
            None => self.bump_character(),
        }
    }

    /// Single-quoted code point or escape, closed on the same line.
    fn scan_rune(&mut self) -> Token<'a> {
        let mut i = self.pos + 1;
        while let Some(&b) = self.src.get(i) {
            match b {
                b'\'' if i > self.pos + 1 => {
                    self.pos = i + 1;
                    return self.token(TokenKind::Rune);
                }
                b'\\' => i += 2,
                b'\n' => break,
                _ => i += 1,
            }
        }
        self.bump_character()
    }

    fn scan_identifier(&mut self) -> Token<'a> {
        let mut ascii = true;
        while let Some(&b) = self.src.get(self.pos) {
            match b {
                b'_' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' => self.pos += 1,
                _ if b < 0x80 => break,
                _ => match decode_char(&self.src[self.pos..]) {
                    Some((c, n)) if c.is_alphanumeric() => {
                        ascii = false;
                        self.pos += n;
                    }
                    _ => break,
                },
            }
        }

        let word = &self.src[self.tok_start..self.pos];
        let kind = if tables::is_keyword(word) {
            TokenKind::Keyword
        } else if tables::is_type(word) {
            TokenKind::Type
        } else if tables::is_other(word) {
            TokenKind::Other
        } else if ascii {
            TokenKind::Ident(IdentKind::Ascii)
        } else {
            TokenKind::Ident(IdentKind::Unicode)
        };
        self.token(kind)
    }

    fn scan_number(&mut self) -> Token<'a> {
        let mut kind = NumberKind::Decimal;

        if self.src[self.pos] == b'0' && matches!(self.peek(1), Some(b'b' | b'B')) {
            self.pos += 2;
            self.eat_digits(|b| matches!(b, b'0' | b'1'));
            kind = NumberKind::Binary;
        } else if self.src[self.pos] == b'0' && matches!(self.peek(1), Some(b'o' | b'O')) {
            self.pos += 2;
            self.eat_digits(|b| matches!(b, b'0'..=b'7'));
            kind = NumberKind::PrefixedOctal;
        } else if self.src[self.pos] == b'0' && matches!(self.peek(1), Some(b'x' | b'X')) {
            self.pos += 2;
            self.eat_digits(|b| b.is_ascii_hexdigit());
            let mut float = false;
            if self.peek(0) == Some(b'.') {
                float = true;
                self.pos += 1;
                self.eat_digits(|b| b.is_ascii_hexdigit());
            }
            if matches!(self.peek(0), Some(b'p' | b'P')) {
                float = true;
                self.eat_exponent();
            }
            kind = if float {
                NumberKind::Float
            } else {
                NumberKind::Hexadecimal
            };
        } else {
            // Decimal mantissa, possibly starting at the '.'.
            let mut float = false;
            self.eat_digits(|b| b.is_ascii_digit());
            if self.peek(0) == Some(b'.')
                && (matches!(self.peek(1), Some(b'0'..=b'9')) || self.pos > self.tok_start)
            {
                float = true;
                self.pos += 1;
                self.eat_digits(|b| b.is_ascii_digit());
            }
            if matches!(self.peek(0), Some(b'e' | b'E')) && self.exponent_follows() {
                float = true;
                self.eat_exponent();
            }
            if float {
                kind = NumberKind::Float;
            } else {
                let text = &self.src[self.tok_start..self.pos];
                if text.len() >= 2
                    && text[0] == b'0'
                    && text[1..].iter().all(|&b| matches!(b, b'0'..=b'7' | b'_'))
                {
                    kind = NumberKind::LegacyOctal;
                }
            }
        }

        // Imaginary suffix attaches to any numeric form.
        if self.peek(0) == Some(b'i') {
            self.pos += 1;
        }
        self.token(TokenKind::Number(kind))
    }

    #[inline]
    fn eat_digits(&mut self, good: impl Fn(u8) -> bool) {
        while let Some(&b) = self.src.get(self.pos) {
            if good(b) || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// True when the byte after `e`/`E`/`p`/`P` (and an optional sign)
    /// is a digit, so the exponent marker belongs to this literal.
    #[inline]
    fn exponent_follows(&self) -> bool {
        let mut i = 1;
        if matches!(self.peek(i), Some(b'+' | b'-')) {
            i += 1;
        }
        matches!(self.peek(i), Some(b'0'..=b'9'))
    }

    fn eat_exponent(&mut self) {
        self.pos += 1;
        if matches!(self.peek(0), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        self.eat_digits(|b| b.is_ascii_digit());
    }

    /// Longest-match punctuation scan.
    fn scan_operator(&mut self) -> Token<'a> {
        let rest = &self.src[self.pos..];
        let len = operator_len(rest);
        if len == 0 {
            return self.bump_character();
        }
        self.pos += len;
        self.token(TokenKind::Operator)
    }
}

/// Length of the longest operator at the head of `rest`, or 0.
fn operator_len(rest: &[u8]) -> usize {
    let at = |i: usize| rest.get(i).copied();
    match rest[0] {
        b'+' | b'-' | b'|' => match at(1) {
            Some(b) if b == rest[0] || b == b'=' => 2,
            _ => 1,
        },
        b'&' => match (at(1), at(2)) {
            (Some(b'^'), Some(b'=')) => 3,
            (Some(b'^'), _) | (Some(b'&'), _) | (Some(b'='), _) => 2,
            _ => 1,
        },
        b'<' => match (at(1), at(2)) {
            (Some(b'<'), Some(b'=')) => 3,
            (Some(b'<'), _) | (Some(b'='), _) | (Some(b'-'), _) => 2,
            _ => 1,
        },
        b'>' => match (at(1), at(2)) {
            (Some(b'>'), Some(b'=')) => 3,
            (Some(b'>'), _) | (Some(b'='), _) => 2,
            _ => 1,
        },
        b'*' | b'/' | b'%' | b'^' | b'=' | b'!' | b':' => match at(1) {
            Some(b'=') => 2,
            _ => 1,
        },
        b'.' => {
            if at(1) == Some(b'.') && at(2) == Some(b'.') {
                3
            } else {
                1
            }
        }
        b',' | b';' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'~' | b'?' => 1,
        _ => 0,
    }
}

/// Decode one UTF-8 code point from the head of `bytes`.
fn decode_char(bytes: &[u8]) -> Option<(char, usize)> {
    let take = bytes.len().min(4);
    let head = match std::str::from_utf8(&bytes[..take]) {
        Ok(s) => s,
        Err(e) if e.valid_up_to() > 0 => std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    head.chars().next().map(|c| (c, c.len_utf8()))
}
