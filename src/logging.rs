//! Diagnostic log setup.
//!
//! Diagnostics go through `tracing`; the `-log` flag picks the destination.
//! With an empty destination no subscriber is installed and every event is
//! disabled at the callsite, so the scan hot path pays nothing.

use std::fs::File;
use std::io;
use std::sync::Mutex;

/// Install the global subscriber for the given destination.
///
/// `[stdout]` and `[stderr]` (case-insensitive) select the standard streams;
/// any other non-empty name is created as a file. Must be called at most
/// once, before the pool starts.
pub fn init(dest: &str) -> io::Result<()> {
    if dest.is_empty() {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_max_level(tracing::Level::DEBUG);

    match dest.to_ascii_lowercase().as_str() {
        "[stdout]" => builder.with_writer(io::stdout).init(),
        "[stderr]" => builder.with_writer(io::stderr).init(),
        _ => {
            let file = File::create(dest)?;
            builder.with_writer(Mutex::new(file)).init();
        }
    }
    Ok(())
}
