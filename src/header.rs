//! Archive header — the 38 bytes at offset 0.
//!
//! # On-disk layout (all fields big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      2   version             = 1
//!    2      8   creation_time       seconds since the Unix epoch
//!   10      4   file_number         member count
//!   14      8   file_size           total encoded archive length
//!   22      8   original_file_size  headers + pre-transform payload sizes
//!   30      4   checksum            XOR-rotate code over the other fields
//!   34      4   crc_32              CRC-32 of all member CRCs concatenated
//! ```
//!
//! `checksum` covers `version, creation_time, file_number, file_size,
//! original_file_size, crc_32` as separate ranges (the rotation index
//! restarts per field) and is computed on write and verified on read — it
//! is never stored in the struct, so callers cannot set it wrong.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::checksum::header_checksum;

pub const ARCHIVE_HEADER_SIZE: usize = 38;
pub const FORMAT_VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("archive header checksum mismatch — file is corrupted")]
    Corrupted,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ArchiveHeader {
    pub version: u16,
    pub creation_time: u64,
    pub file_number: u32,
    pub file_size: u64,
    pub original_file_size: u64,
    pub crc_32: u32,
}

impl ArchiveHeader {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            creation_time: 0,
            file_number: 0,
            file_size: 0,
            original_file_size: 0,
            crc_32: 0,
        }
    }

    fn checksum(&self) -> u32 {
        header_checksum(&[
            &self.version.to_be_bytes(),
            &self.creation_time.to_be_bytes(),
            &self.file_number.to_be_bytes(),
            &self.file_size.to_be_bytes(),
            &self.original_file_size.to_be_bytes(),
            &self.crc_32.to_be_bytes(),
        ])
    }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.version)?;
        w.write_u64::<BigEndian>(self.creation_time)?;
        w.write_u32::<BigEndian>(self.file_number)?;
        w.write_u64::<BigEndian>(self.file_size)?;
        w.write_u64::<BigEndian>(self.original_file_size)?;
        w.write_u32::<BigEndian>(self.checksum())?;
        w.write_u32::<BigEndian>(self.crc_32)?;
        Ok(())
    }

    /// Read and verify.  The caller MUST NOT touch member data if this
    /// fails.
    pub fn read<R: Read>(mut r: R) -> Result<Self, HeaderError> {
        let version = r.read_u16::<BigEndian>()?;
        let creation_time = r.read_u64::<BigEndian>()?;
        let file_number = r.read_u32::<BigEndian>()?;
        let file_size = r.read_u64::<BigEndian>()?;
        let original_file_size = r.read_u64::<BigEndian>()?;
        let stored_checksum = r.read_u32::<BigEndian>()?;
        let crc_32 = r.read_u32::<BigEndian>()?;

        let header = Self {
            version,
            creation_time,
            file_number,
            file_size,
            original_file_size,
            crc_32,
        };
        if header.checksum() != stored_checksum {
            return Err(HeaderError::Corrupted);
        }
        Ok(header)
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveHeader {
        ArchiveHeader {
            version: FORMAT_VERSION,
            creation_time: 1_700_000_000,
            file_number: 7,
            file_size: 4096,
            original_file_size: 9000,
            crc_32: 0xDEAD_BEEF,
        }
    }

    #[test]
    fn wire_size_is_fixed() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        assert_eq!(buf.len(), ARCHIVE_HEADER_SIZE);
    }

    #[test]
    fn round_trip() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        let parsed = ArchiveHeader::read(&buf[..]).unwrap();
        assert_eq!(parsed.version, FORMAT_VERSION);
        assert_eq!(parsed.creation_time, 1_700_000_000);
        assert_eq!(parsed.file_number, 7);
        assert_eq!(parsed.file_size, 4096);
        assert_eq!(parsed.original_file_size, 9000);
        assert_eq!(parsed.crc_32, 0xDEAD_BEEF);
    }

    #[test]
    fn corruption_is_detected() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        for i in 0..buf.len() {
            let mut bad = buf.clone();
            bad[i] ^= 0x01;
            assert!(
                matches!(ArchiveHeader::read(&bad[..]), Err(HeaderError::Corrupted)),
                "flip at byte {i} went unnoticed"
            );
        }
    }

    #[test]
    fn truncated_header_is_io_error() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        assert!(matches!(
            ArchiveHeader::read(&buf[..20]),
            Err(HeaderError::Io(_))
        ));
    }
}
