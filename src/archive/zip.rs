//! zip member iteration over an in-memory buffer.
//!
//! # Invariants
//! - The member count is known up front from the central directory; member
//!   data is located and decompressed on demand.
//! - Offsets come from the central directory and are re-validated against
//!   the local header before use.
//!
//! # Algorithm
//! - Find the end-of-central-directory record by scanning backwards over at
//!   most 64 KiB of trailing comment.
//! - Walk the central directory once, collecting entry metadata.
//! - `next_member` opens entries in directory order: stored entries are
//!   copied, deflated entries are inflated; encrypted or otherwise
//!   unsupported entries are skipped with a log note.
//!
//! # Design Notes
//! - zip64 archives are rejected as malformed rather than mis-read.

use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use tracing::debug;

const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;
const EOCD_LEN: usize = 22;
const CENTRAL_LEN: usize = 46;
const LOCAL_LEN: usize = 30;
const MAX_COMMENT: usize = 64 * 1024;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const FLAG_ENCRYPTED: u16 = 0x1;

struct Entry {
    name: String,
    flags: u16,
    method: u16,
    comp_size: u32,
    uncomp_size: u32,
    local_offset: u32,
}

pub struct ZipReader {
    data: Vec<u8>,
    entries: Vec<Entry>,
    next: usize,
}

impl ZipReader {
    /// Parse the central directory of a complete zip image.
    pub fn new(data: Vec<u8>) -> io::Result<Self> {
        let eocd = find_eocd(&data)?;
        let total = u16_le(&data, eocd + 10) as usize;
        let dir_offset = u32_le(&data, eocd + 16) as usize;
        if total == 0xFFFF || dir_offset == 0xFFFF_FFFF {
            return Err(bad("zip64 archives are not supported"));
        }

        let mut entries = Vec::with_capacity(total);
        let mut at = dir_offset;
        for _ in 0..total {
            if at + CENTRAL_LEN > data.len() || u32_le(&data, at) != CENTRAL_SIG {
                return Err(bad("corrupt central directory"));
            }
            let flags = u16_le(&data, at + 8);
            let method = u16_le(&data, at + 10);
            let comp_size = u32_le(&data, at + 20);
            let uncomp_size = u32_le(&data, at + 24);
            let name_len = u16_le(&data, at + 28) as usize;
            let extra_len = u16_le(&data, at + 30) as usize;
            let comment_len = u16_le(&data, at + 32) as usize;
            let local_offset = u32_le(&data, at + 42);
            if at + CENTRAL_LEN + name_len > data.len() {
                return Err(bad("corrupt central directory"));
            }
            let name = String::from_utf8_lossy(&data[at + CENTRAL_LEN..at + CENTRAL_LEN + name_len])
                .into_owned();
            entries.push(Entry {
                name,
                flags,
                method,
                comp_size,
                uncomp_size,
                local_offset,
            });
            at += CENTRAL_LEN + name_len + extra_len + comment_len;
        }

        Ok(Self {
            data,
            entries,
            next: 0,
        })
    }

    /// Number of members listed in the central directory.
    pub fn member_count(&self) -> usize {
        self.entries.len()
    }

    /// Next readable member as `(name, bytes)`, or `None` at the end.
    ///
    /// Directory entries (trailing `/`, zero size) and members this reader
    /// cannot decode are skipped, with a log note for the latter.
    pub fn next_member(&mut self) -> io::Result<Option<(String, Vec<u8>)>> {
        while self.next < self.entries.len() {
            let entry = &self.entries[self.next];
            self.next += 1;

            if entry.name.ends_with('/') {
                continue;
            }
            if entry.flags & FLAG_ENCRYPTED != 0 {
                debug!("skipping encrypted zip member {}", entry.name);
                continue;
            }
            if entry.method != METHOD_STORED && entry.method != METHOD_DEFLATE {
                debug!(
                    "skipping zip member {} with unsupported method {}",
                    entry.name, entry.method
                );
                continue;
            }

            let data = self.open_entry(self.next - 1)?;
            let name = self.entries[self.next - 1].name.clone();
            return Ok(Some((name, data)));
        }
        Ok(None)
    }

    fn open_entry(&self, index: usize) -> io::Result<Vec<u8>> {
        let entry = &self.entries[index];
        let at = entry.local_offset as usize;
        if at + LOCAL_LEN > self.data.len() || u32_le(&self.data, at) != LOCAL_SIG {
            return Err(bad("corrupt local header"));
        }
        let name_len = u16_le(&self.data, at + 26) as usize;
        let extra_len = u16_le(&self.data, at + 28) as usize;
        let start = at + LOCAL_LEN + name_len + extra_len;
        let end = start + entry.comp_size as usize;
        if end > self.data.len() {
            return Err(bad("zip member data out of range"));
        }
        let raw = &self.data[start..end];

        match entry.method {
            METHOD_STORED => Ok(raw.to_vec()),
            _ => {
                let mut out = Vec::with_capacity(entry.uncomp_size as usize);
                DeflateDecoder::new(raw).read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}

/// Locate the end-of-central-directory record near the end of the image.
fn find_eocd(data: &[u8]) -> io::Result<usize> {
    if data.len() < EOCD_LEN {
        return Err(bad("too short for a zip archive"));
    }
    let floor = data.len().saturating_sub(EOCD_LEN + MAX_COMMENT);
    let mut at = data.len() - EOCD_LEN;
    loop {
        if u32_le(data, at) == EOCD_SIG {
            return Ok(at);
        }
        if at == floor {
            return Err(bad("end-of-central-directory record not found"));
        }
        at -= 1;
    }
}

#[inline]
fn u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn u32_le(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn bad(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, what)
}
