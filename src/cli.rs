//! Hand-rolled command-line parser.
//!
//! No argument-parsing dependency: the flag surface is small, the grammar is
//! `-flag`, `-flag=value`, or `-flag value`, and flag scanning stops at the
//! first positional argument. Unknown flags are fatal (exit 2); unknown
//! selector letters and unparseable value queries only warn.

use crate::config::{self, CategorySet, Config};
use crate::matcher::ValueQuery;
use std::fmt;

/// Fatal argument problems, reported on stderr with usage; exit code 2.
#[derive(Debug)]
pub enum UsageError {
    MissingSelector,
    MissingPattern,
    UnknownFlag(String),
    BadFlagValue { flag: String, value: String },
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::MissingSelector => write!(f, "missing token-class selector"),
            UsageError::MissingPattern => write!(f, "missing search pattern"),
            UsageError::UnknownFlag(flag) => write!(f, "unknown flag {flag:?}"),
            UsageError::BadFlagValue { flag, value } => {
                write!(f, "bad value {value:?} for flag -{flag}")
            }
        }
    }
}

impl std::error::Error for UsageError {}

pub const USAGE: &str = "\
usage: lexgrep [flags] SELECTOR PATTERN [path ...]
       lexgrep -g [flags] PATTERN [path ...]

Search Go source for PATTERN inside selected token classes. SELECTOR is a
string of class letters, lowercase to enable, uppercase to disable:

   a   All of the classes below
   c   Comments (//... or /*...*/)
   d   Defined non-types (iota, nil, new, true, ...)
   i   Identifiers
   k   Keywords (if, for, func, go, ...)
   n   Numbers as text (\"255\" matches 255, 0.255, 1e255)
   o   Operators (, + - * / [ ] { } ( ) >> ...)
   p   Package names
   r   Rune literals ('a', '\\U00101234')
   s   Strings (quoted or raw)
   t   Types (bool, int, float64, map, ...)
   v   Values (255 matches 0b1111_1111, 0377, 0o377, 0xff)
   g   act like grep: match whole lines, no lexing

Files are Go sources, optionally compressed (.bz2 .gz .zst); archives
(.cpio .tar .zip, optionally compressed) are searched member by member.
With no paths and no -list, file names are read from standard input.

flags:
  -cpu=N         workers; 0 = all CPUs, negative = all but N (min 2)
  -go=BOOL       only search .go files (default true)
  -r             recurse into directories
  -visible=BOOL  skip .-prefixed files and directories (default true)
  -h             print file name before each match (forced on for
                 multiple files, lists, or -r)
  -n             print 1-based line number before each match
  -list=FILE     read paths from FILE, one per line
  -log=FILE      write diagnostics to FILE, or [stdout] / [stderr]
  -output=FILE   write matches to FILE instead of stdout
  -g             grep mode: no selector argument, match raw lines
  -unordered     do not preserve submission order in the output
  -summary       print a performance summary after the run

exit status: 0 if matches were found, 1 if none, 2 on error.
";

/// Parse command-line arguments (without the program name) into a [`Config`].
///
/// Prints warnings for ignorable problems (unknown selector letters, a value
/// query that is not a number) directly to stderr, as the run continues
/// without them.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Config, UsageError> {
    let mut cpu = 0i32;
    let mut subject_only = true;
    let mut recursive = false;
    let mut visible_only = true;
    let mut header: Option<bool> = None;
    let mut line_numbers = false;
    let mut list = String::new();
    let mut log = String::new();
    let mut output = String::new();
    let mut grep_flag = false;
    let mut unordered = false;
    let mut summary = false;

    let mut args = args.into_iter();
    let mut positionals: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        if !positionals.is_empty() || !arg.starts_with('-') || arg == "-" {
            positionals.push(arg);
            continue;
        }
        if arg == "--" {
            positionals.extend(args);
            break;
        }

        let body = arg.trim_start_matches('-');
        let (name, inline_value) = match body.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string())),
            None => (body, None),
        };

        match name {
            // Flags taking a value: inline `=value` or the next argument.
            "cpu" | "list" | "log" | "output" => {
                let value = match inline_value {
                    Some(v) => v,
                    None => args.next().ok_or_else(|| UsageError::BadFlagValue {
                        flag: name.to_string(),
                        value: String::new(),
                    })?,
                };
                match name {
                    "cpu" => {
                        cpu = value.parse().map_err(|_| UsageError::BadFlagValue {
                            flag: "cpu".into(),
                            value: value.clone(),
                        })?;
                    }
                    "list" => list = value,
                    "log" => log = value,
                    _ => output = value,
                }
            }
            "go" => subject_only = parse_bool(name, inline_value)?,
            "r" => recursive = parse_bool(name, inline_value)?,
            "visible" => visible_only = parse_bool(name, inline_value)?,
            "h" => header = Some(parse_bool(name, inline_value)?),
            "n" => line_numbers = parse_bool(name, inline_value)?,
            "g" => grep_flag = parse_bool(name, inline_value)?,
            "unordered" => unordered = parse_bool(name, inline_value)?,
            "summary" => summary = parse_bool(name, inline_value)?,
            "help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            _ => return Err(UsageError::UnknownFlag(arg)),
        }
    }

    let mut positionals = positionals.into_iter();
    let (cats, pattern) = if grep_flag {
        let pattern = positionals.next().ok_or(UsageError::MissingPattern)?;
        (CategorySet::empty(), pattern)
    } else {
        let selector = positionals.next().ok_or(UsageError::MissingSelector)?;
        let pattern = positionals.next().ok_or(UsageError::MissingPattern)?;
        let (cats, unknown) = CategorySet::parse(&selector);
        for ch in unknown {
            eprintln!("lexgrep: unknown token class '{ch}' ignored");
        }
        (cats, pattern)
    };
    let paths: Vec<String> = positionals.collect();

    let grep = grep_flag || cats.has(CategorySet::G);

    // Header display is forced whenever more than one file can match:
    // recursive runs, list files, several paths, or names from stdin.
    let multi = recursive || !list.is_empty() || paths.len() > 1 || paths.is_empty();
    let header = header.unwrap_or(false) || multi;

    Ok(Config {
        cats,
        pattern,
        paths,
        workers: config::resolve_workers(cpu),
        subject_only,
        recursive,
        visible_only,
        header,
        line_numbers,
        list,
        log,
        output,
        grep,
        unordered,
        summary,
    })
}

/// Resolve the value query once the selector is known. Returns `None` (and
/// warns) when `V` is active but the pattern is not a number; the caller
/// must then clear the `V` bit.
pub fn resolve_value_query(cats: CategorySet, pattern: &str) -> Option<ValueQuery> {
    if !cats.has(CategorySet::V) {
        return None;
    }
    match ValueQuery::parse(pattern) {
        Ok(q) => Some(q),
        Err(err) => {
            eprintln!("lexgrep: {err}; value matching disabled");
            None
        }
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool, UsageError> {
    match value.as_deref() {
        None => Ok(true),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => Ok(true),
            "0" | "f" | "false" => Ok(false),
            _ => Err(UsageError::BadFlagValue {
                flag: name.to_string(),
                value: v.to_string(),
            }),
        },
    }
}
