//! Output destination resolution.
//!
//! The reporter is the only writer of the returned sink; it wraps it in a
//! `BufWriter` and flushes once at the end of the run.

use std::fs::File;
use std::io::{self, Write};

/// Open the match output destination.
///
/// Empty or `[stdout]` selects stdout, `[stderr]` selects stderr (names are
/// case-insensitive), anything else is created as a file.
pub fn open_output(dest: &str) -> io::Result<Box<dyn Write + Send>> {
    match dest.to_ascii_lowercase().as_str() {
        "" | "[stdout]" => Ok(Box::new(io::stdout())),
        "[stderr]" => Ok(Box::new(io::stderr())),
        _ => Ok(Box::new(File::create(dest)?)),
    }
}
