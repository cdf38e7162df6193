//! Scan driver (section 4.6): walks physical blocks from a starting file
//! offset, feeds their stripped payload into the parse buffer, and invokes
//! the mini-transaction assembler as soon as enough bytes are available.
//! Owns all scan state (section 3) so every decoder is reachable through a
//! single value rather than scattered globals.

use super::block::{epoch_is_valid, expected_hdr_no, BlockHeader, ChecksumKind, LOG_BLOCK_SIZE};
use super::buffer::{AppendOutcome, ParseBuffer};
use super::mtr::{self, MtrOutcome};
use super::sink::EventSink;

const INITIAL_BUFFER_CAPACITY: usize = 1024 * 1024;
const MAX_BUFFER_CAPACITY: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub finished: bool,
    pub found_corrupt_log: bool,
    pub recovered_lsn: u64,
    pub scanned_lsn: u64,
    pub parse_start_lsn: u64,
    pub bytes_to_ignore_before_checkpoint: u64,
}

/// All state the scan needs to carry across blocks (section 3).
pub struct Scanner {
    checkpoint_lsn: u64,
    stop_lsn: u64,
    parse_start_lsn: u64,
    scanned_lsn: u64,
    recovered_lsn: u64,
    previous_recovered_lsn: u64,
    last_block_first_rec_group: u16,
    scanned_epoch_no: u32,
    previous_hdr_no: u32,
    bytes_to_ignore_before_checkpoint: u64,
    found_corrupt_log: bool,
    checksum_kind: ChecksumKind,
    buf: ParseBuffer,
}

impl Scanner {
    pub fn new(checkpoint_lsn: u64, stop_lsn: u64, checksum_kind: ChecksumKind) -> Self {
        let scan_start_lsn = checkpoint_lsn - (checkpoint_lsn % LOG_BLOCK_SIZE as u64);
        Self {
            checkpoint_lsn,
            stop_lsn,
            parse_start_lsn: 0,
            scanned_lsn: scan_start_lsn,
            recovered_lsn: checkpoint_lsn,
            previous_recovered_lsn: checkpoint_lsn,
            last_block_first_rec_group: 0,
            scanned_epoch_no: 0,
            previous_hdr_no: 0,
            bytes_to_ignore_before_checkpoint: 0,
            found_corrupt_log: false,
            checksum_kind,
            buf: ParseBuffer::new(INITIAL_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY),
        }
    }

    /// Scans physical blocks from `file[start_offset..]`, feeding recognized
    /// mini-transactions to `sink`. Returns once the file is exhausted, a
    /// framing or checksum mismatch is hit, `stop_lsn` is passed, or the log
    /// is judged corrupt.
    pub fn scan(&mut self, file: &[u8], start_offset: usize, sink: &mut dyn EventSink) -> ScanReport {
        let mut offset = start_offset;
        let mut first_block = true;
        let mut finished = false;

        while offset + LOG_BLOCK_SIZE <= file.len() {
            let block = &file[offset..offset + LOG_BLOCK_SIZE];
            let Some(hdr) = BlockHeader::parse(block) else {
                finished = true;
                break;
            };

            let mut block_lsn = self.scanned_lsn;

            // The opening block's position is checked against the checkpoint-derived
            // LSN; every later block only needs to follow the previous one in sequence,
            // since hdr_no and the payload-only LSN advance at different rates.
            let hdr_no_ok = if first_block {
                hdr.hdr_no == expected_hdr_no(block_lsn)
            } else {
                hdr.hdr_no == self.previous_hdr_no.wrapping_add(1)
            };
            if !hdr_no_ok || !self.checksum_kind.validate(block) {
                finished = true;
                break;
            }
            if !hdr.has_valid_data_len() || !hdr.has_valid_first_rec_group() {
                finished = true;
                break;
            }
            if !first_block && !epoch_is_valid(hdr.epoch_no, self.scanned_epoch_no) {
                finished = true;
                break;
            }

            // `first_rec_group`/`data_len` are raw byte offsets within the 512-byte
            // block and include the 12-byte header; the LSN space used everywhere
            // else (checkpoint_lsn, buf's base_lsn) counts payload bytes only, so
            // every conversion below subtracts the header out.
            let hdr_size = super::block::LOG_BLOCK_HDR_SIZE as u64;
            let block_payload_len = (hdr.data_len as u64)
                .min(super::block::LOG_BLOCK_CHECKSUM_OFFSET as u64)
                .saturating_sub(hdr_size);

            let just_discovered = self.parse_start_lsn == 0 && hdr.first_rec_group > 0;
            if just_discovered {
                self.parse_start_lsn = block_lsn + (hdr.first_rec_group as u64 - hdr_size);
                let recovered_start = if self.parse_start_lsn < self.checkpoint_lsn {
                    let max_skip = (LOG_BLOCK_SIZE - super::block::LOG_BLOCK_HDR_SIZE) as u64;
                    self.bytes_to_ignore_before_checkpoint =
                        (self.checkpoint_lsn - self.parse_start_lsn).min(max_skip);
                    self.checkpoint_lsn
                } else {
                    self.parse_start_lsn
                };
                self.buf.set_base_lsn(self.parse_start_lsn);
                block_lsn = self.parse_start_lsn;
                self.recovered_lsn = recovered_start;
                self.previous_recovered_lsn = recovered_start;
            }

            let scanned_payload_len = if just_discovered {
                block_payload_len.saturating_sub(hdr.first_rec_group as u64 - hdr_size)
            } else {
                block_payload_len
            };
            self.scanned_lsn = block_lsn + scanned_payload_len;

            if self.parse_start_lsn != 0 {
                let payload = if just_discovered {
                    hdr.payload_from_first_rec_group(block)
                } else {
                    hdr.payload(block)
                };
                if self.buf.append(payload) == AppendOutcome::AtCapacity {
                    self.found_corrupt_log = true;
                    finished = true;
                    break;
                }
                if just_discovered && self.bytes_to_ignore_before_checkpoint > 0 {
                    self.buf.consume(self.bytes_to_ignore_before_checkpoint as usize);
                }
            }

            self.previous_hdr_no = hdr.hdr_no;
            self.scanned_epoch_no = hdr.epoch_no;
            let last_of_burst = hdr.is_last_of_burst();

            if self.run_assembler(sink) {
                finished = true;
                break;
            }

            if last_of_burst {
                finished = true;
                break;
            }

            offset += LOG_BLOCK_SIZE;
            first_block = false;
        }

        if self.found_corrupt_log {
            finished = true;
        }

        ScanReport {
            finished,
            found_corrupt_log: self.found_corrupt_log,
            recovered_lsn: self.recovered_lsn,
            scanned_lsn: self.scanned_lsn,
            parse_start_lsn: self.parse_start_lsn,
            bytes_to_ignore_before_checkpoint: self.bytes_to_ignore_before_checkpoint,
        }
    }

    /// Runs the mini-transaction assembler until it needs more bytes than
    /// are currently buffered, or `stop_lsn` has been passed. Returns `true`
    /// if the scan should stop after this call (corruption or stop_lsn hit).
    fn run_assembler(&mut self, sink: &mut dyn EventSink) -> bool {
        loop {
            if self.recovered_lsn > self.stop_lsn {
                return true;
            }
            let cursor = self.buf.recovered_offset();
            if cursor >= self.buf.len() {
                return false;
            }
            match mtr::step(self.buf.bytes(), cursor, self.buf_base_lsn(), self.scanned_lsn) {
                MtrOutcome::Emitted { records, single, consumed } => {
                    sink.mtr_boundary(single);
                    for record in &records {
                        sink.emit(record);
                    }
                    self.buf.consume(consumed);
                    self.recovered_lsn += consumed as u64;
                    self.track_recovered_lsn_change();
                }
                MtrOutcome::NeedMore => return false,
                MtrOutcome::Corrupt => {
                    self.found_corrupt_log = true;
                    return true;
                }
            }
        }
    }

    fn buf_base_lsn(&self) -> u64 {
        self.buf.lsn_at(0)
    }

    fn track_recovered_lsn_change(&mut self) {
        let old_block = self.previous_recovered_lsn / LOG_BLOCK_SIZE as u64;
        let new_block = self.recovered_lsn / LOG_BLOCK_SIZE as u64;
        if old_block != new_block {
            self.last_block_first_rec_group = (self.recovered_lsn % LOG_BLOCK_SIZE as u64) as u16;
        }
        self.previous_recovered_lsn = self.recovered_lsn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::log::record::{Record, RecordTag};
    use byteorder::{BigEndian, ByteOrder};

    struct CollectingSink {
        records: Vec<Record>,
        boundaries: Vec<bool>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self { records: Vec::new(), boundaries: Vec::new() }
        }
    }

    impl EventSink for CollectingSink {
        fn emit(&mut self, record: &Record) {
            self.records.push(record.clone());
        }
        fn mtr_boundary(&mut self, single: bool) {
            self.boundaries.push(single);
        }
    }

    fn build_block(hdr_no: u32, data_len: u16, first_rec_group: u16, epoch_no: u32, payload: &[u8]) -> [u8; LOG_BLOCK_SIZE] {
        let mut block = [0u8; LOG_BLOCK_SIZE];
        BigEndian::write_u32(&mut block[0..4], hdr_no);
        BigEndian::write_u16(&mut block[4..6], data_len);
        BigEndian::write_u16(&mut block[6..8], first_rec_group);
        BigEndian::write_u32(&mut block[8..12], epoch_no);
        let hdr_size = super::super::block::LOG_BLOCK_HDR_SIZE;
        block[hdr_size..hdr_size + payload.len()].copy_from_slice(payload);
        let checksum = crc32fast::hash(&block[..super::super::block::LOG_BLOCK_CHECKSUM_OFFSET]);
        BigEndian::write_u32(&mut block[super::super::block::LOG_BLOCK_CHECKSUM_OFFSET..], checksum);
        block
    }

    #[test]
    fn empty_run_after_checkpoint_reports_no_records() {
        // A block whose first_rec_group points past any data: nothing to recover.
        let hdr_size = super::super::block::LOG_BLOCK_HDR_SIZE as u16;
        let block = build_block(1, hdr_size, hdr_size, 0, &[]);
        let mut scanner = Scanner::new(0, u64::MAX, ChecksumKind::Crc32);
        let mut sink = CollectingSink::new();
        let report = scanner.scan(&block, 0, &mut sink);
        assert!(sink.records.is_empty());
        assert!(report.finished);
    }

    #[test]
    fn single_record_mtr_is_recovered() {
        let mut payload = vec![4u8 | super::super::record::SINGLE_REC_FLAG];
        payload.push(1); // space_id
        payload.push(2); // page_no
        payload.extend(10u16.to_be_bytes());
        payload.push(42); // value
        let data_len = super::super::block::LOG_BLOCK_HDR_SIZE as u16 + payload.len() as u16;
        let block = build_block(1, data_len, super::super::block::LOG_BLOCK_HDR_SIZE as u16, 0, &payload);

        let mut scanner = Scanner::new(0, u64::MAX, ChecksumKind::Crc32);
        let mut sink = CollectingSink::new();
        scanner.scan(&block, 0, &mut sink);

        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.records[0].tag, RecordTag::Write4Bytes);
    }

    #[test]
    fn torn_tail_stops_without_corruption() {
        let hdr_size = super::super::block::LOG_BLOCK_HDR_SIZE as u16;
        let mut block = build_block(1, hdr_size, hdr_size, 0, &[]);
        // corrupt the checksum to simulate a torn write.
        let off = super::super::block::LOG_BLOCK_CHECKSUM_OFFSET;
        block[off] ^= 0xff;

        let mut scanner = Scanner::new(0, u64::MAX, ChecksumKind::Crc32);
        let mut sink = CollectingSink::new();
        let report = scanner.scan(&block, 0, &mut sink);
        assert!(report.finished);
        assert!(!report.found_corrupt_log);
    }

    #[test]
    fn unknown_record_type_marks_corrupt_log() {
        let payload = vec![250u8]; // Unknown tag, single_rec bit unset
        let data_len = super::super::block::LOG_BLOCK_HDR_SIZE as u16 + payload.len() as u16;
        let block = build_block(1, data_len, super::super::block::LOG_BLOCK_HDR_SIZE as u16, 0, &payload);

        let mut scanner = Scanner::new(0, u64::MAX, ChecksumKind::Crc32);
        let mut sink = CollectingSink::new();
        let report = scanner.scan(&block, 0, &mut sink);
        assert!(report.found_corrupt_log);
    }

    #[test]
    fn stale_epoch_on_second_block_stops_without_corruption() {
        let max_data_len = super::super::block::LOG_BLOCK_CHECKSUM_OFFSET as u16;
        let hdr_size = super::super::block::LOG_BLOCK_HDR_SIZE as u16;
        let dummy_payload = vec![32u8; (max_data_len - hdr_size) as usize];
        let block0 = build_block(1, max_data_len, hdr_size, 0, &dummy_payload);
        // hdr_no follows on correctly, but the epoch jumps by more than one: a
        // tail block left over from a previous, already-overwritten log reuse.
        let block1 = build_block(2, hdr_size, 0, 5, &[]);

        let mut file = Vec::new();
        file.extend_from_slice(&block0);
        file.extend_from_slice(&block1);

        let mut scanner = Scanner::new(0, u64::MAX, ChecksumKind::Crc32);
        let mut sink = CollectingSink::new();
        let report = scanner.scan(&file, 0, &mut sink);

        assert!(report.finished);
        assert!(!report.found_corrupt_log);
        assert_eq!(sink.records.len(), dummy_payload.len());
        assert_eq!(report.recovered_lsn, dummy_payload.len() as u64);
    }
}
