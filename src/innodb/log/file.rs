//! Redo log file header and checkpoint block parsing, plus whole-file
//! loading. File acquisition is a thin wrapper: the scan driver itself (see
//! [`super::scan`]) operates purely on an in-memory byte buffer and a
//! starting offset, as its contract specifies.

use byteorder::{BigEndian, ByteOrder};
use std::path::Path;

use crate::RedoError;

use super::block::LOG_BLOCK_SIZE;

pub const LOG_FILE_HDR_BLOCKS: usize = 4;

const LOG_HEADER_FORMAT: usize = 0;
const LOG_HEADER_LOG_UUID: usize = 4;
const LOG_HEADER_START_LSN: usize = 8;
const LOG_HEADER_CREATED_BY: usize = 16;
const LOG_HEADER_CREATED_BY_LEN: usize = 32;

const LOG_CHECKPOINT_LSN: usize = 8;

#[derive(Debug, Clone)]
pub struct LogFileHeader {
    pub format_version: u32,
    pub log_uuid: u32,
    pub start_lsn: u64,
    pub created_by: String,
}

impl LogFileHeader {
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < LOG_BLOCK_SIZE {
            return None;
        }
        let created_by = block[LOG_HEADER_CREATED_BY..LOG_HEADER_CREATED_BY + LOG_HEADER_CREATED_BY_LEN]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Some(Self {
            format_version: BigEndian::read_u32(&block[LOG_HEADER_FORMAT..]),
            log_uuid: BigEndian::read_u32(&block[LOG_HEADER_LOG_UUID..]),
            start_lsn: BigEndian::read_u64(&block[LOG_HEADER_START_LSN..]),
            created_by,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogCheckpoint {
    pub lsn: u64,
}

impl LogCheckpoint {
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < LOG_BLOCK_SIZE {
            return None;
        }
        Some(Self { lsn: BigEndian::read_u64(&block[LOG_CHECKPOINT_LSN..]) })
    }
}

/// A fully loaded redo log file: the raw bytes plus convenience accessors
/// for the fixed four-block header region (file header, checkpoint 1,
/// unused, checkpoint 2).
pub struct LogFile {
    buf: Vec<u8>,
}

impl LogFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RedoError> {
        let path = path.as_ref();
        let buf = std::fs::read(path).map_err(|e| RedoError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_bytes(buf)
    }

    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, RedoError> {
        if buf.len() < LOG_FILE_HDR_BLOCKS * LOG_BLOCK_SIZE {
            return Err(RedoError::Parse(format!(
                "file too small to contain a header ({} bytes)",
                buf.len()
            )));
        }
        Ok(Self { buf })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn file_size(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn header(&self) -> Result<LogFileHeader, RedoError> {
        LogFileHeader::parse(&self.buf[0..LOG_BLOCK_SIZE]).ok_or_else(|| RedoError::Parse("malformed log file header".into()))
    }

    /// `slot` 0 is the checkpoint stored at block 1, `slot` 1 at block 3.
    pub fn checkpoint(&self, slot: u8) -> Result<LogCheckpoint, RedoError> {
        let block_no = if slot == 0 { 1 } else { 3 };
        let start = block_no * LOG_BLOCK_SIZE;
        LogCheckpoint::parse(&self.buf[start..start + LOG_BLOCK_SIZE])
            .ok_or_else(|| RedoError::Parse(format!("malformed checkpoint block {slot}")))
    }

    /// The greater of the two checkpoint LSNs (section 6): the scan's
    /// default starting point when `--start-lsn` is not given.
    pub fn max_checkpoint_lsn(&self) -> Result<u64, RedoError> {
        let cp1 = self.checkpoint(0)?;
        let cp2 = self.checkpoint(1)?;
        Ok(cp1.lsn.max(cp2.lsn))
    }
}

/// LSN-to-file-offset conversion (section 6): accounts for the header and
/// trailer overhead on every full block between `file_start_lsn` and `lsn`.
pub fn lsn_to_offset(lsn: u64, file_start_lsn: u64) -> u64 {
    use super::block::{LOG_BLOCK_HDR_SIZE, LOG_BLOCK_TRL_SIZE};
    let payload_per_block = (LOG_BLOCK_SIZE - LOG_BLOCK_HDR_SIZE - LOG_BLOCK_TRL_SIZE) as u64;
    let delta = lsn.saturating_sub(file_start_lsn);
    2048 + delta + (delta / payload_per_block) * (LOG_BLOCK_HDR_SIZE + LOG_BLOCK_TRL_SIZE) as u64
}

/// Rounds a file offset down to the nearest block boundary.
pub fn align_to_block(offset: u64) -> u64 {
    offset - (offset % LOG_BLOCK_SIZE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_block(format_version: u32, start_lsn: u64, created_by: &str) -> [u8; LOG_BLOCK_SIZE] {
        let mut block = [0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u32(&mut block[LOG_HEADER_FORMAT..], format_version);
        BigEndian::write_u64(&mut block[LOG_HEADER_START_LSN..], start_lsn);
        let bytes = created_by.as_bytes();
        block[LOG_HEADER_CREATED_BY..LOG_HEADER_CREATED_BY + bytes.len()].copy_from_slice(bytes);
        block
    }

    fn checkpoint_block(lsn: u64) -> [u8; LOG_BLOCK_SIZE] {
        let mut block = [0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u64(&mut block[LOG_CHECKPOINT_LSN..], lsn);
        block
    }

    fn sample_file(cp1: u64, cp2: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(LOG_FILE_HDR_BLOCKS * LOG_BLOCK_SIZE);
        buf.extend_from_slice(&header_block(1, 8192, "mysqld-8.0.34"));
        buf.extend_from_slice(&checkpoint_block(cp1));
        buf.extend_from_slice(&[0u8; LOG_BLOCK_SIZE]);
        buf.extend_from_slice(&checkpoint_block(cp2));
        buf
    }

    #[test]
    fn rejects_too_short_file() {
        assert!(LogFile::from_bytes(vec![0u8; 100]).is_err());
    }

    #[test]
    fn parses_header_and_checkpoints() {
        let file = LogFile::from_bytes(sample_file(9000, 9500)).unwrap();
        let hdr = file.header().unwrap();
        assert_eq!(hdr.start_lsn, 8192);
        assert_eq!(hdr.created_by, "mysqld-8.0.34");
        assert_eq!(file.max_checkpoint_lsn().unwrap(), 9500);
    }

    #[test]
    fn lsn_to_offset_accounts_for_overhead() {
        // within the first block past the header, offset grows 1:1 with lsn
        assert_eq!(lsn_to_offset(8192, 8192), 2048);
        assert_eq!(lsn_to_offset(8192 + 10, 8192), 2058);
        // past one full block's payload (496 bytes), header+trailer overhead kicks in
        let past_one_block = 8192 + 496;
        assert_eq!(lsn_to_offset(past_one_block, 8192), 2048 + 496 + 16);
    }

    #[test]
    fn align_to_block_rounds_down() {
        assert_eq!(align_to_block(2050), 2048);
        assert_eq!(align_to_block(2048), 2048);
    }
}
