//! Packer: walk a source tree, build members, apply transforms, emit.
//!
//! Hard-link topology is captured while walking: the first member seen
//! for an inode is the primary and stores real content; every later
//! member with the same inode stores the 11-byte sentinel and names the
//! primary in `link_name`.  The inode table lives only for the duration
//! of one pack call.
//!
//! Transforms run per member, compress then encrypt, and the whole
//! payload of every member goes through them — including empty payloads,
//! whose stored form is then no longer empty (a Huffman table, or an
//! IV + pad block).  The inverse pipeline restores the true sizes before
//! any classification happens.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::sys::stat;
use nix::unistd::{Gid, Group, Uid, User};
use tracing::debug;

use crate::archive::{unix_now, Archive, BackupError};
use crate::checksum::payload_crc;
use crate::codec::{Compression, Encryption};
use crate::crypto;
use crate::member::{FileKind, Member, DEVICE_PAYLOAD_SIZE, HARD_LINK_SENTINEL};
use crate::walker;

/// `back_up` behind typed errors: validate methods, walk, build, filter,
/// transform, finalize, write.
pub fn try_back_up(
    source: &Path,
    destination: &Path,
    compression_method: &str,
    encryption_method: &str,
    password: &str,
    excluded_files: &str,
) -> Result<(), BackupError> {
    let compression =
        Compression::from_name(compression_method).ok_or(BackupError::UnknownCompression)?;
    let encryption =
        Encryption::from_name(encryption_method).ok_or(BackupError::UnknownEncryption)?;
    if !source.exists() {
        return Err(BackupError::SourceMissing);
    }

    let mut archive = build_archive(source)?;
    remove_excluded(&mut archive, excluded_files);
    apply_transforms(&mut archive, compression, encryption, password)?;
    archive.refresh();

    let file = File::create(destination)
        .map_err(|_| BackupError::Open(destination.display().to_string()))?;
    let mut writer = BufWriter::new(file);
    archive.write_to(&mut writer)?;
    writer.flush()?;
    debug!(
        members = archive.header.file_number,
        bytes = archive.header.file_size,
        "archive written"
    );
    Ok(())
}

/// Walk `source` and build an untransformed archive.
pub fn build_archive(source: &Path) -> Result<Archive, BackupError> {
    let paths = walker::entries(source)?;
    let mut members = Vec::with_capacity(paths.len());
    // inode of the first sighting → its member's file_name
    let mut primaries: HashMap<u64, String> = HashMap::new();

    for path in paths {
        let metadata = fs::symlink_metadata(&path)?;
        let kind = kind_of(&metadata.file_type());
        if matches!(kind, FileKind::Socket | FileKind::Unknown) {
            debug!(path = %path.display(), "skipping unsupported entry");
            continue;
        }

        let mut member = new_member(&path, source, &metadata, kind);
        if let Some(primary) = primaries.get(&metadata.ino()) {
            member.link_name = primary.clone();
            member.data = HARD_LINK_SENTINEL.to_vec();
            member.original_file_size = HARD_LINK_SENTINEL.len() as u64;
            member.file_size = HARD_LINK_SENTINEL.len() as u64;
        } else {
            primaries.insert(metadata.ino(), member.file_name.clone());
            fill_payload(&mut member, &path, &metadata)?;
        }
        member.crc_32 = payload_crc(&member.data);
        members.push(member);
    }

    let mut archive = Archive::new(members);
    archive.refresh();
    Ok(archive)
}

fn kind_of(file_type: &fs::FileType) -> FileKind {
    use std::os::unix::fs::FileTypeExt;
    if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::Regular
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_block_device() {
        FileKind::Block
    } else if file_type.is_char_device() {
        FileKind::Character
    } else if file_type.is_fifo() {
        FileKind::Fifo
    } else if file_type.is_socket() {
        FileKind::Socket
    } else {
        FileKind::Unknown
    }
}

fn new_member(path: &Path, root: &Path, metadata: &fs::Metadata, kind: FileKind) -> Member {
    let file_name = path
        .strip_prefix(root)
        .expect("walker yields paths under the root")
        .to_string_lossy()
        .into_owned();

    let mut member = Member::new(file_name, kind);
    member.uid = metadata.uid();
    member.gid = metadata.gid();
    member.uname = User::from_uid(Uid::from_raw(metadata.uid()))
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_default();
    member.gname = Group::from_gid(Gid::from_raw(metadata.gid()))
        .ok()
        .flatten()
        .map(|group| group.name)
        .unwrap_or_default();
    member.creation_time = unix_now();
    member.last_modification_time = metadata.mtime().max(0) as u64;
    member.last_access_time = metadata.atime().max(0) as u64;
    member.mode = (metadata.mode() & 0o777) as u16;
    member
}

fn fill_payload(
    member: &mut Member,
    path: &Path,
    metadata: &fs::Metadata,
) -> Result<(), BackupError> {
    match member.kind {
        FileKind::Regular => {
            member.data = fs::read(path)?;
            member.original_file_size = member.data.len() as u64;
            member.file_size = member.original_file_size;
        }
        FileKind::Directory | FileKind::Fifo => {}
        FileKind::Symlink => {
            member.link_name = fs::read_link(path)?.to_string_lossy().into_owned();
        }
        FileKind::Block | FileKind::Character => {
            let rdev = metadata.rdev();
            member.data =
                Member::device_payload(stat::major(rdev) as u32, stat::minor(rdev) as u32);
            member.original_file_size = DEVICE_PAYLOAD_SIZE as u64;
            member.file_size = DEVICE_PAYLOAD_SIZE as u64;
        }
        // Sockets and unknown kinds were dropped before member creation.
        FileKind::None | FileKind::Socket | FileKind::Unknown => {}
    }
    Ok(())
}

/// Drop members named in the newline-delimited exclusion set (paths
/// relative to the source root).  Unmatched entries are ignored.
pub fn remove_excluded(archive: &mut Archive, excluded_files: &str) {
    let set: HashSet<&str> = excluded_files.lines().filter(|l| !l.is_empty()).collect();
    if set.is_empty() {
        return;
    }
    archive.members.retain(|member| {
        let keep = !set.contains(member.file_name.as_str());
        if !keep {
            debug!(file = %member.file_name, "excluded from archive");
        }
        keep
    });
}

/// Apply the requested methods to every member: compress, encrypt, then
/// re-derive CRC and creation time.
pub fn apply_transforms(
    archive: &mut Archive,
    compression: Compression,
    encryption: Encryption,
    password: &str,
) -> Result<(), BackupError> {
    for member in &mut archive.members {
        member.compression = compression;
        member.encryption = encryption;
        if compression != Compression::None {
            member.data = compression.compress(&member.data)?;
            member.file_size = member.data.len() as u64;
        }
        if encryption == Encryption::Aes256Cbc {
            member.data = crypto::encrypt(password, &member.data);
            member.file_size = member.data.len() as u64;
        }
        member.crc_32 = payload_crc(&member.data);
        member.creation_time = unix_now();
    }
    Ok(())
}
