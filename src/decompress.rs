//! Whole-buffer decompression keyed by file-name suffix.
//!
//! # Invariants
//! - Exactly one compression suffix is unwrapped per call; the returned name
//!   has it stripped (`sample.go.zst` comes back as `sample.go`).
//! - A corrupt stream surfaces as `io::Error`; callers log it and skip the
//!   file, never abort the run.

use crate::classify::{compression_kind, strip_compression, CompressionKind};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, Cursor, Read};
use tracing::debug;

/// Resolve a work item's bytes: read the named file if `data` is absent and
/// decompress when the name carries a compression suffix.
pub fn decompress(name: &str, data: Option<Vec<u8>>) -> io::Result<(String, Vec<u8>)> {
    let Some(kind) = compression_kind(name) else {
        let bytes = match data {
            Some(bytes) => bytes,
            None => std::fs::read(name)?,
        };
        return Ok((name.to_string(), bytes));
    };

    let (encoded, old_size): (Box<dyn Read>, u64) = match data {
        Some(bytes) => {
            let n = bytes.len() as u64;
            (Box::new(Cursor::new(bytes)), n)
        }
        None => {
            let file = File::open(name)?;
            let n = file.metadata()?.len();
            (Box::new(file), n)
        }
    };

    let mut decoded = Vec::new();
    match kind {
        CompressionKind::Bzip2 => {
            MultiBzDecoder::new(encoded).read_to_end(&mut decoded)?;
        }
        CompressionKind::Gzip => {
            MultiGzDecoder::new(encoded).read_to_end(&mut decoded)?;
        }
        CompressionKind::Zstd => {
            zstd::stream::read::Decoder::new(encoded)?.read_to_end(&mut decoded)?;
        }
    }

    let ratio = decoded.len() as f64 / old_size.max(1) as f64;
    debug!(
        "{:>8} -> {:>8} bytes ({:6.3}x)  decompress {}",
        old_size,
        decoded.len(),
        ratio,
        name
    );
    Ok((strip_compression(name).to_string(), decoded))
}
