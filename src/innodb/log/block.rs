//! Physical redo log block framing (section 4.2): the 512-byte block header,
//! trailer checksum, and the small set of validity predicates the scan
//! driver consults before trusting a block's contents.

use byteorder::{BigEndian, ByteOrder};

pub const LOG_BLOCK_SIZE: usize = 512;
pub const LOG_BLOCK_HDR_SIZE: usize = 12;
pub const LOG_BLOCK_TRL_SIZE: usize = 4;
pub const LOG_BLOCK_CHECKSUM_OFFSET: usize = LOG_BLOCK_SIZE - LOG_BLOCK_TRL_SIZE;
const LOG_BLOCK_FLUSH_BIT_MASK: u32 = 0x8000_0000;
const LOG_BLOCK_MAX_DATA_LEN: u16 = LOG_BLOCK_CHECKSUM_OFFSET as u16;

/// CRC algorithm used to validate a block's trailing checksum. The scanner
/// is parameterized on this rather than hardcoding one algorithm so a log
/// written with checksums disabled (`ChecksumKind::None`) can still be
/// scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Crc32,
    None,
}

impl ChecksumKind {
    pub fn validate(&self, block: &[u8]) -> bool {
        match self {
            ChecksumKind::None => true,
            ChecksumKind::Crc32 => {
                if block.len() < LOG_BLOCK_SIZE {
                    return false;
                }
                let expected = BigEndian::read_u32(&block[LOG_BLOCK_CHECKSUM_OFFSET..]);
                crc32fast::hash(&block[..LOG_BLOCK_CHECKSUM_OFFSET]) == expected
            }
        }
    }
}

/// The 12-byte block header plus the bits of the trailer the driver needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub hdr_no: u32,
    pub flush_flag: bool,
    pub data_len: u16,
    pub first_rec_group: u16,
    pub epoch_no: u32,
}

impl BlockHeader {
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < LOG_BLOCK_SIZE {
            return None;
        }
        let raw_hdr_no = BigEndian::read_u32(&block[0..4]);
        Some(Self {
            hdr_no: raw_hdr_no & !LOG_BLOCK_FLUSH_BIT_MASK,
            flush_flag: raw_hdr_no & LOG_BLOCK_FLUSH_BIT_MASK != 0,
            data_len: BigEndian::read_u16(&block[4..6]),
            first_rec_group: BigEndian::read_u16(&block[6..8]),
            epoch_no: BigEndian::read_u32(&block[8..12]),
        })
    }

    pub fn has_valid_data_len(&self) -> bool {
        (LOG_BLOCK_HDR_SIZE as u16..=LOG_BLOCK_MAX_DATA_LEN).contains(&self.data_len)
    }

    pub fn has_valid_first_rec_group(&self) -> bool {
        self.first_rec_group == 0
            || (LOG_BLOCK_HDR_SIZE as u16..=self.data_len).contains(&self.first_rec_group)
    }

    pub fn is_last_of_burst(&self) -> bool {
        self.data_len < LOG_BLOCK_MAX_DATA_LEN
    }

    /// The payload slice for a block whose relevant data begins exactly at
    /// the header boundary (every block after the one that establishes
    /// `parse_start_lsn`).
    pub fn payload<'a>(&self, block: &'a [u8]) -> &'a [u8] {
        let end = (self.data_len as usize).min(LOG_BLOCK_CHECKSUM_OFFSET);
        if end <= LOG_BLOCK_HDR_SIZE {
            &block[0..0]
        } else {
            &block[LOG_BLOCK_HDR_SIZE..end]
        }
    }

    /// The payload slice for the block that establishes `parse_start_lsn`:
    /// bytes before `first_rec_group` belong to a straddling record from an
    /// earlier, untracked mini-transaction and must not be appended.
    pub fn payload_from_first_rec_group<'a>(&self, block: &'a [u8]) -> &'a [u8] {
        let start = self.first_rec_group as usize;
        let end = (self.data_len as usize).min(LOG_BLOCK_CHECKSUM_OFFSET);
        if end <= start {
            &block[0..0]
        } else {
            &block[start..end]
        }
    }
}

/// Expected `hdr_no` for a block whose first byte is at `lsn` (section 4.2).
pub fn expected_hdr_no(lsn: u64) -> u32 {
    ((lsn / LOG_BLOCK_SIZE as u64) + 1) as u32
}

/// A block's `epoch_no` must equal or immediately follow the previous
/// block's, accounting for the 32-bit wraparound.
pub fn epoch_is_valid(epoch_no: u32, previous: u32) -> bool {
    epoch_no == previous || epoch_no == previous.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block(hdr_no: u32, flush: bool, data_len: u16, first_rec_group: u16, epoch_no: u32) -> [u8; LOG_BLOCK_SIZE] {
        let mut block = [0u8; LOG_BLOCK_SIZE];
        let raw_hdr_no = hdr_no | if flush { LOG_BLOCK_FLUSH_BIT_MASK } else { 0 };
        BigEndian::write_u32(&mut block[0..4], raw_hdr_no);
        BigEndian::write_u16(&mut block[4..6], data_len);
        BigEndian::write_u16(&mut block[6..8], first_rec_group);
        BigEndian::write_u32(&mut block[8..12], epoch_no);
        let checksum = crc32fast::hash(&block[..LOG_BLOCK_CHECKSUM_OFFSET]);
        BigEndian::write_u32(&mut block[LOG_BLOCK_CHECKSUM_OFFSET..], checksum);
        block
    }

    #[test]
    fn parses_header_fields() {
        let block = make_block(7, true, 200, 12, 3);
        let hdr = BlockHeader::parse(&block).unwrap();
        assert_eq!(hdr.hdr_no, 7);
        assert!(hdr.flush_flag);
        assert_eq!(hdr.data_len, 200);
        assert_eq!(hdr.first_rec_group, 12);
        assert_eq!(hdr.epoch_no, 3);
    }

    #[test]
    fn checksum_roundtrips() {
        let block = make_block(1, false, 508, 12, 0);
        assert!(ChecksumKind::Crc32.validate(&block));
    }

    #[test]
    fn checksum_detects_corruption() {
        let mut block = make_block(1, false, 508, 12, 0);
        block[20] ^= 0xff;
        assert!(!ChecksumKind::Crc32.validate(&block));
    }

    #[test]
    fn data_len_bounds() {
        let mut hdr = BlockHeader::parse(&make_block(1, false, 508, 12, 0)).unwrap();
        assert!(hdr.has_valid_data_len());
        hdr.data_len = 5;
        assert!(!hdr.has_valid_data_len());
        hdr.data_len = 509;
        assert!(!hdr.has_valid_data_len());
    }

    #[test]
    fn last_of_burst_detection() {
        let full = BlockHeader::parse(&make_block(1, false, 508, 12, 0)).unwrap();
        assert!(!full.is_last_of_burst());
        let partial = BlockHeader::parse(&make_block(1, false, 100, 12, 0)).unwrap();
        assert!(partial.is_last_of_burst());
    }

    #[test]
    fn expected_hdr_no_matches_lsn() {
        assert_eq!(expected_hdr_no(0), 1);
        assert_eq!(expected_hdr_no(512), 2);
        assert_eq!(expected_hdr_no(1023), 2);
    }

    #[test]
    fn epoch_accepts_same_or_next() {
        assert!(epoch_is_valid(5, 5));
        assert!(epoch_is_valid(6, 5));
        assert!(!epoch_is_valid(7, 5));
        assert!(epoch_is_valid(0, u32::MAX));
    }
}
