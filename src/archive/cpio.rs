//! cpio member iteration, newc variant.
//!
//! # Invariants
//! - Sequential read only. Header fields are 8 ASCII hex digits; anything
//!   else is malformed.
//! - Header+name and file data are each aligned to 4 bytes.
//! - Iteration stops at the `TRAILER!!!` sentinel entry.

use std::io::{self, Read};

const MAGIC_NEWC: &[u8; 6] = b"070701";
const MAGIC_CRC: &[u8; 6] = b"070702";
const HEADER_LEN: usize = 110;
const TRAILER: &str = "TRAILER!!!";

const MODE_MASK: u64 = 0o170000;
const MODE_FILE: u64 = 0o100000;

pub struct CpioReader<R: Read> {
    inner: R,
    done: bool,
}

impl<R: Read> CpioReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    /// Next regular-file member as `(name, bytes)`, or `None` at the end.
    pub fn next_member(&mut self) -> io::Result<Option<(String, Vec<u8>)>> {
        while !self.done {
            let mut header = [0u8; HEADER_LEN];
            match self.inner.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    // Archives normally end at the trailer; a clean EOF here
                    // is tolerated.
                    self.done = true;
                    break;
                }
                Err(e) => return Err(e),
            }

            if &header[..6] != MAGIC_NEWC && &header[..6] != MAGIC_CRC {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "not a newc cpio header",
                ));
            }

            let mode = hex_field(&header, 2)?;
            let filesize = hex_field(&header, 7)?;
            let namesize = hex_field(&header, 12)? as usize;

            let mut name_buf = vec![0u8; namesize];
            self.inner.read_exact(&mut name_buf)?;
            // Name is NUL-terminated; header+name pads to 4.
            self.skip_padding((HEADER_LEN + namesize) % 4)?;
            let end = name_buf
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(name_buf.len());
            let name = String::from_utf8_lossy(&name_buf[..end]).into_owned();

            if name == TRAILER {
                self.done = true;
                break;
            }

            let size = usize::try_from(filesize).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "cpio member too large")
            })?;
            if mode & MODE_MASK != MODE_FILE {
                // Directories, links, specials: consume data, move on.
                io::copy(
                    &mut (&mut self.inner).take((size + (4 - size % 4) % 4) as u64),
                    &mut io::sink(),
                )?;
                continue;
            }

            let mut data = vec![0u8; size];
            self.inner.read_exact(&mut data)?;
            self.skip_padding(size % 4)?;
            return Ok(Some((name, data)));
        }
        Ok(None)
    }

    fn skip_padding(&mut self, rem: usize) -> io::Result<()> {
        if rem != 0 {
            let mut scratch = [0u8; 4];
            self.inner.read_exact(&mut scratch[..4 - rem])?;
        }
        Ok(())
    }
}

/// The `n`-th 8-hex-digit header field, counting from 1 after the magic
/// (1 = inode, 2 = mode, 7 = filesize, 12 = namesize).
fn hex_field(header: &[u8; HEADER_LEN], n: usize) -> io::Result<u64> {
    let start = 6 + (n - 1) * 8;
    let text = std::str::from_utf8(&header[start..start + 8])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad cpio hex field"))?;
    u64::from_str_radix(text, 16)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad cpio hex field"))
}

/// Append one member to a newc cpio byte stream. Test fixture builder.
#[cfg(test)]
pub fn push_member(out: &mut Vec<u8>, name: &str, mode: u64, data: &[u8]) {
    let namesize = name.len() + 1;
    out.extend_from_slice(MAGIC_NEWC);
    for field in [
        1,             // ino
        mode,          // mode
        0,             // uid
        0,             // gid
        1,             // nlink
        0,             // mtime
        data.len() as u64,
        0,             // devmajor
        0,             // devminor
        0,             // rdevmajor
        0,             // rdevminor
        namesize as u64,
        0,             // check
    ] {
        out.extend_from_slice(format!("{field:08X}").as_bytes());
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    // Members always start 4-aligned, so aligning the buffer aligns the
    // header+name region.
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

#[cfg(test)]
pub fn finish(out: &mut Vec<u8>) {
    push_member(out, TRAILER, 0, b"");
}
