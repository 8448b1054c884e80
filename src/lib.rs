//! Token-aware grep for Go source code.
//!
//! Classic grep matches lines; this crate matches lexical categories. The
//! pattern `if` can be restricted to keyword tokens so it skips the `if`
//! inside a comment or string, and the numeric value `255` can be matched
//! against every literal spelling (`0b1111_1111`, `0377`, `0o377`, `0xff`).
//!
//! Pipeline flow (files):
//! Path -> Walker -> WorkItem -> worker (decompress + lex + match) ->
//! ScanResult -> Reporter -> output sink.
//!
//! The walker runs on the submitting thread; scan workers are OS threads fed
//! by bounded queues; the reporter is the sole writer of the output sink and
//! re-serializes per-file reports in submission order unless the unordered
//! layout is selected.

pub mod archive;
pub mod classify;
pub mod cli;
pub mod config;
pub mod decompress;
pub mod lex;
pub mod logging;
pub mod matcher;
pub mod pool;
pub mod scan;
pub mod sink;
pub mod walk;

pub use config::{CategorySet, Config};
pub use matcher::{Matcher, ValueQuery};
pub use pool::{Pool, Summary};
pub use scan::{ScanResult, WorkItem};
pub use walk::Walker;
