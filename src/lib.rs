//! # treepack — POSIX directory-tree backup container
//!
//! Format guarantees (frozen in v1):
//! - All numeric fields are big-endian; never negotiated
//! - The archive header and every member header carry a mandatory
//!   XOR-rotate checksum; a mismatch aborts the read
//! - Every member carries a CRC-32 of its stored payload; the archive
//!   CRC-32 chains all member CRCs
//! - Member payloads are transformed compress-then-encrypt; readers
//!   invert in the opposite order before anything touches the filesystem
//! - Hard-link duplicates store an 11-byte sentinel and name their
//!   primary; restore materializes directories, then content, then hard
//!   links, then symlinks — in that order, always
//! - The `salt` header field is reserved and written as zero
//!
//! The whole archive is produced and consumed as a file; members are
//! held in memory (streaming is a non-goal).  The engine is synchronous
//! and single-threaded; callers may run entry points in parallel on
//! disjoint archives.

pub mod archive;
pub mod bytes;
pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod header;
pub mod member;
pub mod packer;
pub mod unpacker;
pub mod walker;

// Flat re-exports for the most common types.
pub use archive::{back_up, info, restore, Archive, BackupError};
pub use codec::{CodecError, Compression, Encryption};
pub use crypto::CryptoError;
pub use header::{ArchiveHeader, HeaderError, ARCHIVE_HEADER_SIZE, FORMAT_VERSION};
pub use member::{FileKind, Member, MemberClass, MemberError, HARD_LINK_SENTINEL};
