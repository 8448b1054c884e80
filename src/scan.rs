//! Per-file scanning: lex, filter by category, match, format records.
//!
//! # Invariants
//! - At most one record per source line; the first matching token wins.
//!   The `last_printed` latch enforces this across categories, the package
//!   test, and the value test.
//! - Records are preformatted into one contiguous buffer so the reporter
//!   only ever copies bytes.
//! - Every failure inside a work item is contained here: the file is
//!   logged, counted, and produces an empty report.

use crate::config::{CategorySet, Config};
use crate::decompress::decompress;
use crate::lex::{CommentKind, Lexer, StrKind, TokenKind};
use crate::matcher::Matcher;
use memchr::{memchr, memchr_iter};
use tracing::debug;

/// One source unit for a worker: a file (worker opens it) or an archive
/// member / decompressed buffer (bytes provided).
#[derive(Debug)]
pub struct WorkItem {
    pub name: String,
    pub source: Option<Vec<u8>>,
}

/// What one work item produced.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub name: String,
    /// Preformatted `path:line:text\n` records.
    pub report: Vec<u8>,
    pub files: u64,
    pub bytes: u64,
    pub tokens: u64,
    pub lines: u64,
    pub matches: u64,
    pub errors: u64,
    /// Worker-exit sentinel, not a file result.
    pub complete: bool,
}

impl ScanResult {
    pub fn sentinel() -> Self {
        ScanResult {
            complete: true,
            ..ScanResult::default()
        }
    }
}

/// Sample size and budget for the binary-content heuristic.
const BINARY_SAMPLE: usize = 2048;
const BINARY_BUDGET: u32 = 8;

/// Scan one work item to completion.
pub fn scan_work(cfg: &Config, matcher: &Matcher, item: WorkItem) -> ScanResult {
    let mut result = ScanResult {
        name: item.name.clone(),
        files: 1,
        ..ScanResult::default()
    };

    let (name, source) = match decompress(&item.name, item.source) {
        Ok(pair) => pair,
        Err(err) => {
            debug!("{}: {}", item.name, err);
            result.errors = 1;
            return result;
        }
    };
    result.name = name;
    result.bytes = source.len() as u64;

    // Without the subject-extension filter anything can arrive here; skip
    // buffers that look binary rather than spraying NUL-laden lines.
    if !cfg.subject_only && looks_binary(&source) {
        debug!("skipping binary file {}", result.name);
        return result;
    }

    if cfg.grep {
        grep_buffer(cfg, matcher, &source, &mut result);
    } else {
        lex_buffer(cfg, matcher, &source, &mut result);
    }
    result
}

/// More than [`BINARY_BUDGET`] control bytes (tab and newline excepted)
/// in the leading sample.
fn looks_binary(source: &[u8]) -> bool {
    let sample = &source[..source.len().min(BINARY_SAMPLE)];
    let mut control = 0u32;
    for &b in sample {
        if (b < 0x20 || b == 0x7f) && b != b'\t' && b != b'\n' {
            control += 1;
            if control > BINARY_BUDGET {
                return true;
            }
        }
    }
    false
}

/// Grep mode: raw line matching, no lexing.
fn grep_buffer(cfg: &Config, matcher: &Matcher, source: &[u8], result: &mut ScanResult) {
    for (idx, line) in ByteLines::new(source).enumerate() {
        result.lines += 1;
        if matcher.is_match(line) {
            append_record(cfg, result, idx as u32 + 1, line);
        }
    }
}

/// Token mode: lex the buffer and match category-selected tokens.
fn lex_buffer(cfg: &Config, matcher: &Matcher, source: &[u8], result: &mut ScanResult) {
    result.lines = memchr_iter(b'\n', source).count() as u64;

    let cats = matcher.cats;
    let mut lexer = Lexer::new(source);
    let mut expect_package_name = false;
    let mut last_printed = 0u32;
    let mut anomalies = 0u64;

    loop {
        let tok = lexer.next_token();
        if tok.kind == TokenKind::Eof {
            break;
        }
        result.tokens += 1;
        if tok.kind == TokenKind::Space {
            continue;
        }

        // One-token lookahead: the identifier after the `package` keyword is
        // a package-name occurrence.
        if expect_package_name {
            if let TokenKind::Ident(_) = tok.kind {
                if cats.has(CategorySet::P)
                    && tok.line > last_printed
                    && matcher.is_match(tok.text)
                {
                    append_record(cfg, result, tok.line, lexer.get_line());
                    last_printed = tok.line;
                }
                expect_package_name = false;
            }
        } else if tok.kind == TokenKind::Keyword && tok.text == b"package" {
            expect_package_name = true;
        }

        let active = match tok.kind {
            TokenKind::Comment(_) => CategorySet::C,
            TokenKind::Str(_) => CategorySet::S,
            TokenKind::Operator => CategorySet::O,
            TokenKind::Rune => CategorySet::R,
            TokenKind::Ident(_) => CategorySet::I,
            TokenKind::Number(_) => CategorySet::N,
            TokenKind::Keyword => CategorySet::K,
            TokenKind::Type => CategorySet::T,
            TokenKind::Other => CategorySet::D,
            TokenKind::Character => {
                anomalies += 1;
                continue;
            }
            TokenKind::Space | TokenKind::Eof => continue,
        };

        if cats.has(active) && tok.line > last_printed {
            let multiline = matches!(
                tok.kind,
                TokenKind::Str(StrKind::Raw) | TokenKind::Comment(CommentKind::Block)
            ) && memchr(b'\n', tok.text).is_some();

            if multiline {
                // Match each body line on its own, at its own line number.
                for (idx, sub) in ByteLines::new(tok.text).enumerate() {
                    let line = tok.line + idx as u32;
                    if line > last_printed && matcher.is_match(sub) {
                        append_record(cfg, result, line, sub);
                        last_printed = line;
                    }
                }
            } else if matcher.is_match(tok.text) {
                // The token matched; print the whole line that holds it.
                append_record(cfg, result, tok.line, lexer.get_line());
                last_printed = tok.line;
            }
        }

        // The value test is independent of the textual N test.
        if let TokenKind::Number(_) = tok.kind {
            if cats.has(CategorySet::V) && tok.line > last_printed {
                if let Some(query) = &matcher.value {
                    if query.matches(tok.text) {
                        append_record(cfg, result, tok.line, lexer.get_line());
                        last_printed = tok.line;
                    }
                }
            }
        }
    }

    if anomalies > 0 {
        debug!("{}: {} byte(s) outside the lexical grammar", result.name, anomalies);
    }
}

/// Append one `[path:][line:]content\n` record and tally it.
fn append_record(cfg: &Config, result: &mut ScanResult, line: u32, content: &[u8]) {
    if cfg.header {
        result.report.extend_from_slice(result.name.as_bytes());
        result.report.push(b':');
    }
    if cfg.line_numbers {
        result.report.extend_from_slice(line.to_string().as_bytes());
        result.report.push(b':');
    }
    result.report.extend_from_slice(content);
    result.report.push(b'\n');
    result.matches += 1;
}

/// Split on `\n`, yielding lines without their newline. A trailing newline
/// does not produce a final empty line.
struct ByteLines<'a> {
    rest: &'a [u8],
}

impl<'a> ByteLines<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { rest: buf }
    }
}

impl<'a> Iterator for ByteLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }
        match memchr(b'\n', self.rest) {
            Some(i) => {
                let line = &self.rest[..i];
                self.rest = &self.rest[i + 1..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = &[];
                Some(line)
            }
        }
    }
}
