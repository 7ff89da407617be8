//! Integrity primitives: CRC-32 and the header checksum.
//!
//! Two distinct codes protect an archive:
//! - **CRC-32** (IEEE 802.3, via `crc32fast`) covers payloads, and the
//!   archive-level CRC covers the concatenation of all member CRCs.
//! - The **header checksum** is a lightweight XOR-rotate code over the
//!   header's field byte ranges.  It is a tamper indicator, not a MAC, and
//!   archives depend on its exact bit pattern: the rotation index restarts
//!   at zero for every contributing range, so a u64 field folds as shifts
//!   0/8/16/24/0/8/16/24 regardless of where the field sits in the header.

/// Stored member CRC for an empty payload.
pub const EMPTY_PAYLOAD_CRC: u32 = 0xFFFF_FFFF;

/// CRC-32 (IEEE polynomial) of a flat byte range.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Member payload CRC: CRC-32 of the stored bytes, or
/// [`EMPTY_PAYLOAD_CRC`] when there are none.
pub fn payload_crc(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        EMPTY_PAYLOAD_CRC
    } else {
        crc32(payload)
    }
}

/// XOR-rotate checksum over a sequence of field byte ranges.
///
/// `acc` starts at `0xFFFF_FFFF`; each byte is XORed in at bit offset
/// `8 * (i % 4)` where `i` is the byte's index *within its own range*.
pub fn header_checksum(ranges: &[&[u8]]) -> u32 {
    let mut acc = 0xFFFF_FFFFu32;
    for range in ranges {
        for (i, &byte) in range.iter().enumerate() {
            acc ^= u32::from(byte) << (8 * (i % 4));
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        assert_eq!(crc32(b"This is a test"), 0xC07A_9F32);
    }

    #[test]
    fn payload_crc_empty_is_all_ones() {
        assert_eq!(payload_crc(&[]), 0xFFFF_FFFF);
        assert_ne!(payload_crc(b"x"), 0xFFFF_FFFF);
    }

    #[test]
    fn checksum_known_value() {
        assert_eq!(header_checksum(&[&[0x01, 0x02, 0x03, 0x04]]), 0xFBFC_FDFE);
    }

    #[test]
    fn checksum_index_restarts_per_range() {
        // Splitting a range re-anchors the rotation, so the result differs.
        let joined = header_checksum(&[&[0x01, 0x02, 0x03, 0x04]]);
        let split = header_checksum(&[&[0x01, 0x02], &[0x03, 0x04]]);
        assert_ne!(joined, split);
    }

    #[test]
    fn checksum_of_nothing_is_initial_value() {
        assert_eq!(header_checksum(&[]), 0xFFFF_FFFF);
        assert_eq!(header_checksum(&[&[]]), 0xFFFF_FFFF);
    }
}
