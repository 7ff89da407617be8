//! The [`Archive`] container and the string-status entry points.
//!
//! An archive is the 38-byte archive header followed by every member
//! (header + payload) in walker order.  Library callers use
//! [`Archive`] and the `try_*` functions in [`crate::packer`] /
//! [`crate::unpacker`] and get typed errors; the [`back_up`], [`info`]
//! and [`restore`] wrappers return `"OK"` or the error's display text,
//! which is the contract the outer shells consume.

use std::io::{self, Read, Seek, Write};
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::bytes::dword_to_bytes;
use crate::checksum::{crc32, payload_crc};
use crate::codec::CodecError;
use crate::header::{ArchiveHeader, HeaderError, ARCHIVE_HEADER_SIZE};
use crate::member::{Member, MemberError};
use crate::{packer, unpacker};

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("compression method was not recognised.")]
    UnknownCompression,
    #[error("encryption method was not recognised.")]
    UnknownEncryption,
    #[error("source directory does not exist.")]
    SourceMissing,
    #[error("Could not open output file {0}")]
    Open(String),
    #[error("Fail to decrypt the file {0}. Wrong password")]
    WrongPassword(String),
    #[error("payload CRC-32 mismatch for {0} — archive is corrupted")]
    CorruptedPayload(String),
    #[error("{0}: file type not supported")]
    UnsupportedFileType(String),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Member(#[from] MemberError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Archive ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Archive {
    pub header: ArchiveHeader,
    pub members: Vec<Member>,
}

impl Archive {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            header: ArchiveHeader::new(),
            members,
        }
    }

    /// Re-derive every archive-level field from the members, in the fixed
    /// order: count, sizes, creation time, CRC.  The header checksum is
    /// computed at write time and therefore always refreshed last.
    pub fn refresh(&mut self) {
        self.header.file_number = self.members.len() as u32;
        self.header.original_file_size = ARCHIVE_HEADER_SIZE as u64
            + self
                .members
                .iter()
                .map(|m| m.header_size() + m.original_file_size)
                .sum::<u64>();
        self.header.file_size = ARCHIVE_HEADER_SIZE as u64
            + self
                .members
                .iter()
                .map(|m| m.header_size() + m.file_size)
                .sum::<u64>();
        self.header.creation_time = unix_now();

        let mut member_crcs = Vec::with_capacity(self.members.len() * 4);
        for member in &self.members {
            member_crcs.extend_from_slice(&dword_to_bytes(member.crc_32));
        }
        self.header.crc_32 = crc32(&member_crcs);
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        self.header.write(&mut w)?;
        for member in &self.members {
            member.write(&mut w)?;
        }
        Ok(())
    }

    /// Full parse: archive header, every member header and payload, all
    /// checksums and payload CRCs verified.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self, BackupError> {
        let header = ArchiveHeader::read(&mut r)?;
        let mut members = Vec::with_capacity(header.file_number as usize);
        for _ in 0..header.file_number {
            let member = Member::read(&mut r)?;
            if payload_crc(&member.data) != member.crc_32 {
                return Err(BackupError::CorruptedPayload(member.file_name));
            }
            members.push(member);
        }
        debug!(members = members.len(), "archive parsed");
        Ok(Self { header, members })
    }

    /// Header-only parse for `info`: member payloads are seeked past, so
    /// their bytes never load.
    pub fn read_headers<R: Read + Seek>(mut r: R) -> Result<Self, BackupError> {
        let header = ArchiveHeader::read(&mut r)?;
        let mut members = Vec::with_capacity(header.file_number as usize);
        for _ in 0..header.file_number {
            members.push(Member::read_skipping_payload(&mut r)?);
        }
        Ok(Self { header, members })
    }
}

pub(crate) fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Pack `source` into the archive file `destination`.
///
/// `compression_method` ∈ {`NONE`, `LZ77`, `HUFFMAN`};
/// `encryption_method` ∈ {`NONE`, `AES_256_CBC`};
/// `excluded_files` is a newline-delimited set of paths relative to
/// `source`.  Returns `"OK"` or a human-readable error message.
pub fn back_up(
    source: &Path,
    destination: &Path,
    compression_method: &str,
    encryption_method: &str,
    password: &str,
    excluded_files: &str,
) -> String {
    match packer::try_back_up(
        source,
        destination,
        compression_method,
        encryption_method,
        password,
        excluded_files,
    ) {
        Ok(()) => "OK".into(),
        Err(e) => e.to_string(),
    }
}

/// Describe an archive: header fields, methods, and the member list.
pub fn info(archive: &Path) -> String {
    match unpacker::try_info(archive) {
        Ok(report) => report,
        Err(e) => e.to_string(),
    }
}

/// Restore an archive into `destination`.  Returns `"OK"` or a
/// human-readable error message.
pub fn restore(archive: &Path, destination: &Path, password: &str) -> String {
    match unpacker::try_restore(archive, destination, password) {
        Ok(()) => "OK".into(),
        Err(e) => e.to_string(),
    }
}
