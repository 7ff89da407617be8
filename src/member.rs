//! Member header and payload — one filesystem entity in the archive.
//!
//! # On-disk layout (143 fixed bytes + names + payload, big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   uid
//!    4      4   gid
//!    8     32   uname                   NUL-padded, truncated
//!   40     32   gname                   NUL-padded, truncated
//!   72      8   creation_time           seconds since the Unix epoch
//!   80      8   last_modification_time
//!   88      8   last_access_time
//!   96      2   file_type_and_permissions
//!   98      4   crc_32                  of the stored payload
//!  102      4   checksum                XOR-rotate code, see below
//!  106      1   compression_and_encryption
//!  107     16   salt                    reserved, written as zero
//!  123      8   original_file_size      pre-transform payload length
//!  131      8   file_size               stored payload length
//!  139      2   link_name_length
//!  141      2   file_name_length
//!  143    ...   link_name | file_name | payload
//! ```
//!
//! `file_type_and_permissions` packs the 9 POSIX mode bits in the low
//! bits; the 7 bits above them carry the file type (byte 0 is
//! `type << 1 | mode bit 8`).  `checksum` covers every field except
//! itself, each as its own range, the two variable-length names last.
//! Like the archive header's, it is computed on write and verified on
//! read rather than stored.
//!
//! # Payload conventions
//!
//! Directories, FIFOs and symlinks store nothing (a symlink's target
//! rides in `link_name`).  Device nodes store `major:u32 | minor:u32`.
//! A hard-link duplicate stores the 11-byte sentinel `b"\nhard_link\n"`
//! with the primary's path in `link_name` — which makes the restore-side
//! classification `link_name_length > 0 && file_size > 0`, while a
//! symlink is `link_name_length > 0 && file_size == 0`.

use std::io::{self, Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::bytes::{dword_to_bytes, make_dword};
use crate::checksum::header_checksum;
use crate::codec::{methods_from_byte, methods_to_byte, Compression, Encryption};

/// Fixed header size before the variable-length names.
pub const MEMBER_FIXED_SIZE: usize = 143;

/// Width of the `uname` / `gname` fields.
pub const NAME_FIELD_SIZE: usize = 32;

/// Payload marking a hard-link duplicate of the member named in
/// `link_name`.
pub const HARD_LINK_SENTINEL: &[u8; 11] = b"\nhard_link\n";

/// Device-node payload size: `major:u32 | minor:u32`.
pub const DEVICE_PAYLOAD_SIZE: usize = 8;

const PERMISSION_MASK: u16 = 0x01FF;

#[derive(Error, Debug)]
pub enum MemberError {
    #[error("member header checksum mismatch — archive is corrupted")]
    Corrupted,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── File kind ────────────────────────────────────────────────────────────────

/// File type stored in the high bits of `file_type_and_permissions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    None,
    Regular,
    Directory,
    Symlink,
    Block,
    Character,
    Fifo,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn type_bits(self) -> u8 {
        match self {
            FileKind::None => 0,
            FileKind::Regular => 1,
            FileKind::Directory => 2,
            FileKind::Symlink => 3,
            FileKind::Block => 4,
            FileKind::Character => 5,
            FileKind::Fifo => 6,
            FileKind::Socket => 7,
            FileKind::Unknown => 0x7F,
        }
    }

    pub fn from_type_bits(bits: u8) -> Self {
        match bits {
            0 => FileKind::None,
            1 => FileKind::Regular,
            2 => FileKind::Directory,
            3 => FileKind::Symlink,
            4 => FileKind::Block,
            5 => FileKind::Character,
            6 => FileKind::Fifo,
            7 => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Tagged view of a member for materialization; restore phases are a pure
/// match on this.
#[derive(Debug, PartialEq, Eq)]
pub enum MemberClass<'a> {
    Directory,
    Regular(&'a [u8]),
    Symlink { target: &'a str },
    Device { major: u32, minor: u32, character: bool },
    Fifo,
    HardLink { primary: &'a str },
    Unsupported(FileKind),
}

// ── Member ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Member {
    pub uid: u32,
    pub gid: u32,
    pub uname: String,
    pub gname: String,
    pub creation_time: u64,
    pub last_modification_time: u64,
    pub last_access_time: u64,
    pub kind: FileKind,
    /// Low 9 POSIX permission bits.
    pub mode: u16,
    /// CRC-32 of the stored (post-transform) payload; `0xFFFF_FFFF` when
    /// the payload is empty.
    pub crc_32: u32,
    pub compression: Compression,
    pub encryption: Encryption,
    /// Reserved for future key derivation; written as zero.
    pub salt: [u8; 16],
    pub original_file_size: u64,
    pub file_size: u64,
    pub link_name: String,
    pub file_name: String,
    /// Stored payload, exactly `file_size` bytes.
    pub data: Vec<u8>,
}

impl Member {
    pub fn new(file_name: String, kind: FileKind) -> Self {
        Self {
            uid: 0,
            gid: 0,
            uname: String::new(),
            gname: String::new(),
            creation_time: 0,
            last_modification_time: 0,
            last_access_time: 0,
            kind,
            mode: 0,
            crc_32: 0,
            compression: Compression::None,
            encryption: Encryption::None,
            salt: [0; 16],
            original_file_size: 0,
            file_size: 0,
            link_name: String::new(),
            file_name,
            data: Vec::new(),
        }
    }

    /// Header length on disk, including both variable-length names.
    pub fn header_size(&self) -> u64 {
        MEMBER_FIXED_SIZE as u64 + self.link_name.len() as u64 + self.file_name.len() as u64
    }

    fn type_and_permissions(&self) -> u16 {
        (u16::from(self.kind.type_bits()) << 9) | (self.mode & PERMISSION_MASK)
    }

    fn method_byte(&self) -> u8 {
        methods_to_byte(self.compression, self.encryption)
    }

    fn checksum(&self) -> u32 {
        header_checksum(&[
            &self.uid.to_be_bytes(),
            &self.gid.to_be_bytes(),
            &padded_name(&self.uname),
            &padded_name(&self.gname),
            &self.creation_time.to_be_bytes(),
            &self.last_modification_time.to_be_bytes(),
            &self.last_access_time.to_be_bytes(),
            &self.type_and_permissions().to_be_bytes(),
            &self.crc_32.to_be_bytes(),
            &[self.method_byte()],
            &self.salt,
            &self.original_file_size.to_be_bytes(),
            &self.file_size.to_be_bytes(),
            &(self.link_name.len() as u16).to_be_bytes(),
            &(self.file_name.len() as u16).to_be_bytes(),
            self.link_name.as_bytes(),
            self.file_name.as_bytes(),
        ])
    }

    // ── Serialization ────────────────────────────────────────────────────────

    /// Write header, names, and payload.
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u32::<BigEndian>(self.uid)?;
        w.write_u32::<BigEndian>(self.gid)?;
        w.write_all(&padded_name(&self.uname))?;
        w.write_all(&padded_name(&self.gname))?;
        w.write_u64::<BigEndian>(self.creation_time)?;
        w.write_u64::<BigEndian>(self.last_modification_time)?;
        w.write_u64::<BigEndian>(self.last_access_time)?;
        w.write_u16::<BigEndian>(self.type_and_permissions())?;
        w.write_u32::<BigEndian>(self.crc_32)?;
        w.write_u32::<BigEndian>(self.checksum())?;
        w.write_u8(self.method_byte())?;
        w.write_all(&self.salt)?;
        w.write_u64::<BigEndian>(self.original_file_size)?;
        w.write_u64::<BigEndian>(self.file_size)?;
        w.write_u16::<BigEndian>(self.link_name.len() as u16)?;
        w.write_u16::<BigEndian>(self.file_name.len() as u16)?;
        w.write_all(self.link_name.as_bytes())?;
        w.write_all(self.file_name.as_bytes())?;
        w.write_all(&self.data)?;
        Ok(())
    }

    /// Read header and names, verify the checksum, leave the payload
    /// unread.
    pub fn read_header<R: Read>(mut r: R) -> Result<Self, MemberError> {
        let uid = r.read_u32::<BigEndian>()?;
        let gid = r.read_u32::<BigEndian>()?;
        let mut uname_raw = [0u8; NAME_FIELD_SIZE];
        r.read_exact(&mut uname_raw)?;
        let mut gname_raw = [0u8; NAME_FIELD_SIZE];
        r.read_exact(&mut gname_raw)?;
        let creation_time = r.read_u64::<BigEndian>()?;
        let last_modification_time = r.read_u64::<BigEndian>()?;
        let last_access_time = r.read_u64::<BigEndian>()?;
        let type_and_permissions = r.read_u16::<BigEndian>()?;
        let crc_32 = r.read_u32::<BigEndian>()?;
        let stored_checksum = r.read_u32::<BigEndian>()?;
        let method_byte = r.read_u8()?;
        let mut salt = [0u8; 16];
        r.read_exact(&mut salt)?;
        let original_file_size = r.read_u64::<BigEndian>()?;
        let file_size = r.read_u64::<BigEndian>()?;
        let link_name_length = r.read_u16::<BigEndian>()?;
        let file_name_length = r.read_u16::<BigEndian>()?;

        let mut link_name_raw = vec![0u8; usize::from(link_name_length)];
        r.read_exact(&mut link_name_raw)?;
        let mut file_name_raw = vec![0u8; usize::from(file_name_length)];
        r.read_exact(&mut file_name_raw)?;

        let (compression, encryption) = methods_from_byte(method_byte);
        let member = Self {
            uid,
            gid,
            uname: unpadded_name(&uname_raw),
            gname: unpadded_name(&gname_raw),
            creation_time,
            last_modification_time,
            last_access_time,
            kind: FileKind::from_type_bits((type_and_permissions >> 9) as u8),
            mode: type_and_permissions & PERMISSION_MASK,
            crc_32,
            compression,
            encryption,
            salt,
            original_file_size,
            file_size,
            link_name: String::from_utf8_lossy(&link_name_raw).into_owned(),
            file_name: String::from_utf8_lossy(&file_name_raw).into_owned(),
            data: Vec::new(),
        };
        if member.checksum() != stored_checksum {
            return Err(MemberError::Corrupted);
        }
        Ok(member)
    }

    /// Read header, names, and the `file_size`-byte payload.
    pub fn read<R: Read>(mut r: R) -> Result<Self, MemberError> {
        let mut member = Self::read_header(&mut r)?;
        let mut data = vec![0u8; member.file_size as usize];
        r.read_exact(&mut data)?;
        member.data = data;
        Ok(member)
    }

    /// Read header and names, then seek past the payload.  The `info`
    /// path, which never needs member contents.
    pub fn read_skipping_payload<R: Read + Seek>(mut r: R) -> Result<Self, MemberError> {
        let member = Self::read_header(&mut r)?;
        r.seek(io::SeekFrom::Current(member.file_size as i64))?;
        Ok(member)
    }

    // ── Classification ───────────────────────────────────────────────────────

    /// Classify for materialization.  Hard-link duplicates are recognised
    /// by a populated `link_name` alongside a non-empty payload, so this
    /// is only meaningful after inverse transforms restored the true
    /// sizes.
    pub fn classify(&self) -> MemberClass<'_> {
        if !self.link_name.is_empty() && self.file_size > 0 {
            return MemberClass::HardLink {
                primary: &self.link_name,
            };
        }
        match self.kind {
            FileKind::Directory => MemberClass::Directory,
            FileKind::Regular => MemberClass::Regular(&self.data),
            FileKind::Symlink => MemberClass::Symlink {
                target: &self.link_name,
            },
            FileKind::Block | FileKind::Character if self.data.len() == DEVICE_PAYLOAD_SIZE => {
                MemberClass::Device {
                    major: make_dword(self.data[0..4].try_into().expect("4-byte slice")),
                    minor: make_dword(self.data[4..8].try_into().expect("4-byte slice")),
                    character: self.kind == FileKind::Character,
                }
            }
            FileKind::Fifo => MemberClass::Fifo,
            kind => MemberClass::Unsupported(kind),
        }
    }

    /// Compose the 8-byte device-node payload.
    pub fn device_payload(major: u32, minor: u32) -> Vec<u8> {
        let mut payload = Vec::with_capacity(DEVICE_PAYLOAD_SIZE);
        payload.extend_from_slice(&dword_to_bytes(major));
        payload.extend_from_slice(&dword_to_bytes(minor));
        payload
    }
}

fn padded_name(name: &str) -> [u8; NAME_FIELD_SIZE] {
    let mut out = [0u8; NAME_FIELD_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_FIELD_SIZE);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn unpadded_name(raw: &[u8; NAME_FIELD_SIZE]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_SIZE);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::payload_crc;

    fn sample() -> Member {
        let mut member = Member::new("docs/readme.txt".into(), FileKind::Regular);
        member.uid = 1000;
        member.gid = 1000;
        member.uname = "alice".into();
        member.gname = "staff".into();
        member.creation_time = 1_700_000_000;
        member.last_modification_time = 1_699_999_000;
        member.last_access_time = 1_699_999_500;
        member.mode = 0o644;
        member.data = b"hello".to_vec();
        member.original_file_size = 5;
        member.file_size = 5;
        member.crc_32 = payload_crc(&member.data);
        member
    }

    #[test]
    fn fixed_size_matches_layout() {
        let member = Member::new(String::new(), FileKind::Directory);
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        assert_eq!(buf.len(), MEMBER_FIXED_SIZE);
    }

    #[test]
    fn round_trip() {
        let member = sample();
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, member.header_size() + member.file_size);

        let parsed = Member::read(&buf[..]).unwrap();
        assert_eq!(parsed.uid, 1000);
        assert_eq!(parsed.uname, "alice");
        assert_eq!(parsed.gname, "staff");
        assert_eq!(parsed.kind, FileKind::Regular);
        assert_eq!(parsed.mode, 0o644);
        assert_eq!(parsed.file_name, "docs/readme.txt");
        assert_eq!(parsed.data, b"hello");
        assert_eq!(parsed.crc_32, member.crc_32);
    }

    #[test]
    fn header_corruption_is_detected() {
        let member = sample();
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        // Flip a byte inside the mtime field.
        buf[82] ^= 0x40;
        assert!(matches!(
            Member::read(&buf[..]),
            Err(MemberError::Corrupted)
        ));
    }

    #[test]
    fn file_type_bits_round_trip() {
        for kind in [
            FileKind::None,
            FileKind::Regular,
            FileKind::Directory,
            FileKind::Symlink,
            FileKind::Block,
            FileKind::Character,
            FileKind::Fifo,
            FileKind::Socket,
        ] {
            assert_eq!(FileKind::from_type_bits(kind.type_bits()), kind);
        }
        assert_eq!(FileKind::from_type_bits(0x42), FileKind::Unknown);
    }

    #[test]
    fn permissions_survive_full_nine_bits() {
        let mut member = sample();
        member.mode = 0o755;
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        assert_eq!(Member::read(&buf[..]).unwrap().mode, 0o755);

        // Bit 8 of the mode shares a byte with the type bits.
        member.mode = 0o644 | 0o400;
        member.kind = FileKind::Directory;
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        let parsed = Member::read(&buf[..]).unwrap();
        assert_eq!(parsed.mode, 0o644 | 0o400);
        assert_eq!(parsed.kind, FileKind::Directory);
    }

    #[test]
    fn long_owner_names_are_truncated() {
        let mut member = sample();
        member.uname = "u".repeat(64);
        let mut buf = Vec::new();
        member.write(&mut buf).unwrap();
        assert_eq!(Member::read(&buf[..]).unwrap().uname, "u".repeat(32));
    }

    #[test]
    fn hard_link_classification() {
        let mut member = Member::new("b.txt".into(), FileKind::Regular);
        member.link_name = "a.txt".into();
        member.data = HARD_LINK_SENTINEL.to_vec();
        member.file_size = 11;
        member.original_file_size = 11;
        assert_eq!(
            member.classify(),
            MemberClass::HardLink { primary: "a.txt" }
        );
    }

    #[test]
    fn symlink_classification_needs_empty_payload() {
        let mut member = Member::new("ln".into(), FileKind::Symlink);
        member.link_name = "target/path".into();
        assert_eq!(
            member.classify(),
            MemberClass::Symlink {
                target: "target/path"
            }
        );
    }

    #[test]
    fn device_classification_parses_numbers() {
        let mut member = Member::new("dev/null".into(), FileKind::Character);
        member.data = Member::device_payload(1, 3);
        member.file_size = 8;
        member.original_file_size = 8;
        assert_eq!(
            member.classify(),
            MemberClass::Device {
                major: 1,
                minor: 3,
                character: true
            }
        );
    }

    #[test]
    fn socket_is_unsupported() {
        let member = Member::new("sock".into(), FileKind::Socket);
        assert_eq!(member.classify(), MemberClass::Unsupported(FileKind::Socket));
    }

    #[test]
    fn skipping_payload_lands_on_next_member() {
        let first = sample();
        let mut second = Member::new("second".into(), FileKind::Regular);
        second.data = b"abc".to_vec();
        second.file_size = 3;
        second.original_file_size = 3;
        second.crc_32 = payload_crc(&second.data);

        let mut buf = Vec::new();
        first.write(&mut buf).unwrap();
        second.write(&mut buf).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let skipped = Member::read_skipping_payload(&mut cursor).unwrap();
        assert_eq!(skipped.file_name, "docs/readme.txt");
        assert!(skipped.data.is_empty());
        let next = Member::read(&mut cursor).unwrap();
        assert_eq!(next.file_name, "second");
        assert_eq!(next.data, b"abc");
    }
}
