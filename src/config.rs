//! Immutable run configuration.
//!
//! All user choices are resolved into one [`Config`] before the pool starts;
//! nothing in it is mutated afterwards. Workers receive it behind an `Arc`.

use std::fmt;

/// Packed set of token-class selector bits.
///
/// One bit per symbolic class; `G` selects grep mode and is not included in
/// the `a` aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CategorySet(u16);

impl CategorySet {
    pub const C: u16 = 1 << 0; // comments
    pub const D: u16 = 1 << 1; // predeclared non-types
    pub const I: u16 = 1 << 2; // identifiers
    pub const K: u16 = 1 << 3; // keywords
    pub const N: u16 = 1 << 4; // numbers as text
    pub const O: u16 = 1 << 5; // operators
    pub const P: u16 = 1 << 6; // package names
    pub const R: u16 = 1 << 7; // rune literals
    pub const S: u16 = 1 << 8; // strings
    pub const T: u16 = 1 << 9; // predeclared types
    pub const V: u16 = 1 << 10; // numeric values
    pub const G: u16 = 1 << 11; // grep mode

    const ALL_CONTENT: u16 = Self::C
        | Self::D
        | Self::I
        | Self::K
        | Self::N
        | Self::O
        | Self::P
        | Self::R
        | Self::S
        | Self::T
        | Self::V;

    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn has(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u16) {
        self.0 |= bit;
    }

    #[inline]
    pub fn clear(&mut self, bit: u16) {
        self.0 &= !bit;
    }

    /// Parse a selector string.
    ///
    /// `a` presets every content bit (not `G`) before the left-to-right pass;
    /// lowercase letters set their bit, uppercase letters clear it. Letters
    /// outside the alphabet are returned for the caller to warn about.
    pub fn parse(selector: &str) -> (Self, Vec<char>) {
        let mut set = Self::empty();
        if selector.contains('a') {
            set.0 = Self::ALL_CONTENT;
        }
        let mut unknown = Vec::new();
        for ch in selector.chars() {
            let (bit, on) = match ch {
                'a' => continue,
                'c' => (Self::C, true),
                'C' => (Self::C, false),
                'd' => (Self::D, true),
                'D' => (Self::D, false),
                'g' => (Self::G, true),
                'G' => (Self::G, false),
                'i' => (Self::I, true),
                'I' => (Self::I, false),
                'k' => (Self::K, true),
                'K' => (Self::K, false),
                'n' => (Self::N, true),
                'N' => (Self::N, false),
                'o' => (Self::O, true),
                'O' => (Self::O, false),
                'p' => (Self::P, true),
                'P' => (Self::P, false),
                'r' => (Self::R, true),
                'R' => (Self::R, false),
                's' => (Self::S, true),
                'S' => (Self::S, false),
                't' => (Self::T, true),
                'T' => (Self::T, false),
                'v' => (Self::V, true),
                'V' => (Self::V, false),
                other => {
                    unknown.push(other);
                    continue;
                }
            };
            if on {
                set.set(bit);
            } else {
                set.clear(bit);
            }
        }
        (set, unknown)
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: &[(u16, char)] = &[
            (CategorySet::C, 'c'),
            (CategorySet::D, 'd'),
            (CategorySet::G, 'g'),
            (CategorySet::I, 'i'),
            (CategorySet::K, 'k'),
            (CategorySet::N, 'n'),
            (CategorySet::O, 'o'),
            (CategorySet::P, 'p'),
            (CategorySet::R, 'r'),
            (CategorySet::S, 's'),
            (CategorySet::T, 't'),
            (CategorySet::V, 'v'),
        ];
        for &(bit, ch) in LETTERS {
            if self.has(bit) {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// One immutable configuration object for the whole run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Active token categories.
    pub cats: CategorySet,
    /// The search pattern (also the value query text when `V` is active).
    pub pattern: String,
    /// Paths named on the command line, in order.
    pub paths: Vec<String>,
    /// Worker count, already resolved and clamped (>= 2).
    pub workers: usize,
    /// Restrict ingestion to subject-extension files.
    pub subject_only: bool,
    /// Recurse into directories.
    pub recursive: bool,
    /// Skip `.`-prefixed names.
    pub visible_only: bool,
    /// Prefix each match with `path:`.
    pub header: bool,
    /// Prefix each match with the 1-based line number.
    pub line_numbers: bool,
    /// File of paths to scan, one per line; empty for none.
    pub list: String,
    /// Log destination; empty for none, `[stdout]`/`[stderr]` special.
    pub log: String,
    /// Output destination; empty for stdout, special names as for `log`.
    pub output: String,
    /// Grep mode: match raw lines, no lexing.
    pub grep: bool,
    /// Give up submission-order output for throughput.
    pub unordered: bool,
    /// Print the performance summary to stdout after the run.
    pub summary: bool,
}

/// Resolve the `-cpu` flag into a worker count.
///
/// Zero means all logical CPUs, negative means all-but-N. The result is
/// clamped to 2 so the pipeline stays concurrent on small machines.
pub fn resolve_workers(cpu_flag: i32) -> usize {
    let all = num_cpus::get() as i32;
    let n = match cpu_flag {
        0 => all,
        n if n > 0 => n,
        n => all + n,
    };
    n.max(2) as usize
}
