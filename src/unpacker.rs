//! Unpacker: parse, verify, invert transforms, materialize.
//!
//! Materialization is strictly phased.  Directories first, so every later
//! path has a parent; then concrete content (files, device nodes, FIFOs);
//! then hard links, whose primaries now exist; then symlinks, so a link
//! can never be resolved before the hard-link target it might point at.
//! Within a phase, member order is irrelevant.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufReader;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use nix::unistd::mkfifo;
use tracing::debug;

use crate::archive::{Archive, BackupError};
use crate::codec::{Compression, Encryption};
use crate::crypto;
use crate::member::MemberClass;

/// `restore` behind typed errors: parse and verify, invert transforms,
/// materialize the tree under `destination`.
pub fn try_restore(
    archive_path: &Path,
    destination: &Path,
    password: &str,
) -> Result<(), BackupError> {
    let file = File::open(archive_path)
        .map_err(|_| BackupError::Open(archive_path.display().to_string()))?;
    let mut archive = Archive::read_from(BufReader::new(file))?;
    invert_transforms(&mut archive, destination, password)?;
    materialize(destination, &archive)
}

/// `info` behind typed errors: headers only, payloads are never loaded.
pub fn try_info(archive_path: &Path) -> Result<String, BackupError> {
    let file = File::open(archive_path)
        .map_err(|_| BackupError::Open(archive_path.display().to_string()))?;
    let archive = Archive::read_headers(BufReader::new(file))?;

    // All members share one method pair in this design; read it off the
    // first member, defaulting when the archive is empty.
    let (compression, encryption) = archive
        .members
        .first()
        .map(|m| (m.compression, m.encryption))
        .unwrap_or((Compression::None, Encryption::None));

    let header = &archive.header;
    let mut report = String::new();
    let _ = writeln!(report, "version: {}", header.version);
    let _ = writeln!(report, "file size: {}", header.file_size);
    let _ = writeln!(report, "original file size: {}", header.original_file_size);
    let _ = writeln!(report, "creation time: {}", header.creation_time);
    let _ = writeln!(report, "file number: {}", header.file_number);
    let _ = writeln!(report, "compression method: {}", compression.name());
    let _ = writeln!(report, "encryption method: {}", encryption.name());
    report.push_str("all file names:\n");
    for member in &archive.members {
        report.push_str(&member.file_name);
        report.push('\n');
    }
    Ok(report)
}

/// Decrypt then decompress every member, restoring the true payloads and
/// sizes.  Decryption failure is reported as a wrong password for the
/// destination.
pub fn invert_transforms(
    archive: &mut Archive,
    destination: &Path,
    password: &str,
) -> Result<(), BackupError> {
    for member in &mut archive.members {
        if member.encryption == Encryption::Aes256Cbc {
            member.data = crypto::decrypt(password, &member.data)
                .map_err(|_| BackupError::WrongPassword(destination.display().to_string()))?;
            member.file_size = member.data.len() as u64;
        }
        if member.compression != Compression::None {
            member.data = member.compression.decompress(&member.data)?;
            member.file_size = member.data.len() as u64;
        }
    }
    Ok(())
}

/// Phases A–D.  Assumes inverse transforms already ran.
pub fn materialize(destination: &Path, archive: &Archive) -> Result<(), BackupError> {
    fs::create_dir_all(destination)?;

    // Phase A — directories.
    for member in &archive.members {
        if member.classify() == MemberClass::Directory {
            let path = destination.join(&member.file_name);
            fs::create_dir_all(&path)?;
            set_mode(&path, member.mode)?;
        }
    }

    // Phase B — concrete content.
    for member in &archive.members {
        let path = destination.join(&member.file_name);
        match member.classify() {
            MemberClass::Directory
            | MemberClass::HardLink { .. }
            | MemberClass::Symlink { .. } => continue,
            MemberClass::Regular(data) => {
                fs::write(&path, data)?;
                set_mode(&path, member.mode)?;
            }
            MemberClass::Device {
                major,
                minor,
                character,
            } => {
                let kind = if character {
                    SFlag::S_IFCHR
                } else {
                    SFlag::S_IFBLK
                };
                mknod(
                    &path,
                    kind,
                    Mode::empty(),
                    makedev(u64::from(major), u64::from(minor)),
                )
                .map_err(std::io::Error::from)?;
                set_mode(&path, member.mode)?;
            }
            MemberClass::Fifo => {
                mkfifo(&path, Mode::empty()).map_err(std::io::Error::from)?;
                set_mode(&path, member.mode)?;
            }
            MemberClass::Unsupported(_) => {
                return Err(BackupError::UnsupportedFileType(member.file_name.clone()));
            }
        }
        debug!(file = %member.file_name, "restored");
    }

    // Phase C — hard links, primaries exist by now.
    for member in &archive.members {
        if let MemberClass::HardLink { primary } = member.classify() {
            let link = destination.join(&member.file_name);
            fs::hard_link(destination.join(primary), &link)?;
            set_mode(&link, member.mode)?;
        }
    }

    // Phase D — symlinks, target stored verbatim.  No chmod here: Linux
    // pins symlink modes, and chmod on the link path would follow it.
    for member in &archive.members {
        if let MemberClass::Symlink { target } = member.classify() {
            symlink(target, destination.join(&member.file_name))?;
        }
    }

    Ok(())
}

fn set_mode(path: &Path, mode: u16) -> std::io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(u32::from(mode)))
}
