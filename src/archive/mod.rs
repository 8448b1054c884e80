//! Archive member iteration.
//!
//! One uniform sequential interface over the three container formats. The
//! readers are scanner-oriented: members are buffered whole and ownership of
//! the bytes passes to the caller; nothing is ever written back.

pub mod cpio;
pub mod tar;
pub mod zip;

use crate::classify::ArchiveKind;
use std::fs::File;
use std::io::{self, Cursor, Read};

pub use cpio::CpioReader;
pub use tar::TarReader;
pub use zip::ZipReader;

/// Uniform member iterator over an archive.
pub enum ArchiveReader {
    Cpio(CpioReader<Box<dyn Read>>),
    Tar(TarReader<Box<dyn Read>>),
    Zip(ZipReader),
}

impl ArchiveReader {
    /// Open an archive either from decompressed bytes or from the named
    /// file. zip needs the whole image for its central directory; tar and
    /// cpio stream.
    pub fn open(kind: ArchiveKind, name: &str, data: Option<Vec<u8>>) -> io::Result<Self> {
        match kind {
            ArchiveKind::Zip => {
                let image = match data {
                    Some(bytes) => bytes,
                    None => std::fs::read(name)?,
                };
                Ok(ArchiveReader::Zip(ZipReader::new(image)?))
            }
            ArchiveKind::Cpio => Ok(ArchiveReader::Cpio(CpioReader::new(reader_for(
                name, data,
            )?))),
            ArchiveKind::Tar => Ok(ArchiveReader::Tar(TarReader::new(reader_for(name, data)?))),
        }
    }

    /// Next member as `(name, bytes)`, or `None` at the end of the archive.
    pub fn next_member(&mut self) -> io::Result<Option<(String, Vec<u8>)>> {
        match self {
            ArchiveReader::Cpio(r) => r.next_member(),
            ArchiveReader::Tar(r) => r.next_member(),
            ArchiveReader::Zip(r) => r.next_member(),
        }
    }
}

fn reader_for(name: &str, data: Option<Vec<u8>>) -> io::Result<Box<dyn Read>> {
    Ok(match data {
        Some(bytes) => Box::new(Cursor::new(bytes)),
        None => Box::new(File::open(name)?),
    })
}
