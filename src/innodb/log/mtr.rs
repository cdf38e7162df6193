//! Mini-transaction assembler (section 4.5): groups decoded records into an
//! atomic unit and decides when the group may be emitted.
//!
//! A single record with `SINGLE_REC_FLAG` set emits immediately. Otherwise
//! records accumulate until an `MLOG_MULTI_REC_END` marker is seen; if the
//! buffer runs out before that marker, or if any component record turns out
//! to carry `SINGLE_REC_FLAG` itself (a malformed combination), the whole
//! group rolls back rather than being emitted partially -- atomicity is
//! implemented by never emitting until the terminator is in hand.

use super::record::{decode, DecodeOutcome, DecodedRecord, Record, RecordTag};

pub enum MtrOutcome {
    Emitted { records: Vec<Record>, single: bool, consumed: usize },
    NeedMore,
    Corrupt,
}

/// Attempts to assemble and emit one mini-transaction starting at `cursor`
/// within `data`. `base_lsn` is the LSN of `data[0]`; `scanned_lsn` bounds
/// how far the physical scan has actually progressed; a multi-record MTR
/// whose span would reach past it has not been fully written yet and must
/// roll back to be retried after more blocks are ingested.
pub fn step(data: &[u8], cursor: usize, base_lsn: u64, scanned_lsn: u64) -> MtrOutcome {
    if cursor >= data.len() {
        return MtrOutcome::NeedMore;
    }
    let first_byte = data[cursor] & !super::record::SINGLE_REC_FLAG;
    let is_single_flagged = data[cursor] & super::record::SINGLE_REC_FLAG != 0;
    let is_dummy = RecordTag::from_u8(first_byte) == RecordTag::Dummy;

    if is_single_flagged || is_dummy {
        step_single(data, cursor, base_lsn)
    } else {
        step_multi(data, cursor, base_lsn, scanned_lsn)
    }
}

fn step_single(data: &[u8], cursor: usize, base_lsn: u64) -> MtrOutcome {
    match decode(data, cursor) {
        DecodeOutcome::Record { record, consumed } => MtrOutcome::Emitted {
            records: vec![finish(record, base_lsn + cursor as u64, consumed)],
            single: true,
            consumed,
        },
        DecodeOutcome::NeedMore => MtrOutcome::NeedMore,
        DecodeOutcome::Corrupt => MtrOutcome::Corrupt,
    }
}

fn step_multi(data: &[u8], cursor: usize, base_lsn: u64, scanned_lsn: u64) -> MtrOutcome {
    let mut pos = cursor;
    let mut components: Vec<(DecodedRecord, usize, usize)> = Vec::new();

    loop {
        match decode(data, pos) {
            DecodeOutcome::NeedMore => return MtrOutcome::NeedMore,
            DecodeOutcome::Corrupt => return MtrOutcome::Corrupt,
            DecodeOutcome::Record { record, consumed } => {
                if record.single_rec {
                    return MtrOutcome::Corrupt;
                }
                let start = pos;
                let tag = record.tag;
                pos += consumed;
                components.push((record, start, pos));
                if tag == RecordTag::MultiRecEnd {
                    break;
                }
            }
        }
    }

    let span = pos - cursor;
    if base_lsn + cursor as u64 + span as u64 > scanned_lsn {
        // The terminator is present in the buffer but beyond what the
        // physical scan has actually confirmed; treat it as not-yet-written.
        return MtrOutcome::NeedMore;
    }

    let records = components
        .into_iter()
        .map(|(record, start, end)| finish(record, base_lsn + start as u64, end - start))
        .collect();

    MtrOutcome::Emitted { records, single: false, consumed: span }
}

fn finish(decoded: DecodedRecord, start_lsn: u64, consumed: usize) -> Record {
    Record {
        tag: decoded.tag,
        space_id: decoded.space_id,
        page_no: decoded.page_no,
        body: decoded.body,
        fields: decoded.fields,
        start_lsn,
        end_lsn: start_lsn + consumed as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressed(v: u32) -> Vec<u8> {
        vec![v as u8] // values used in these tests all fit in one byte
    }

    fn single_4bytes(space_id: u32, page_no: u32, offset: u16, value: u32) -> Vec<u8> {
        let mut data = vec![4u8 | super::super::record::SINGLE_REC_FLAG];
        data.extend(compressed(space_id));
        data.extend(compressed(page_no));
        data.extend(offset.to_be_bytes());
        data.extend(compressed(value));
        data
    }

    #[test]
    fn single_record_emits_immediately() {
        let data = single_4bytes(1, 2, 10, 99);
        match step(&data, 0, 1000, 1000 + data.len() as u64) {
            MtrOutcome::Emitted { records, single, consumed } => {
                assert!(single);
                assert_eq!(consumed, data.len());
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].start_lsn, 1000);
            }
            _ => panic!("expected emission"),
        }
    }

    #[test]
    fn multi_record_waits_for_end_marker() {
        let mut data = vec![4u8]; // not single, no END yet
        data.extend(compressed(1));
        data.extend(compressed(2));
        data.extend(10u16.to_be_bytes());
        data.extend(compressed(5));
        assert!(matches!(step(&data, 0, 0, data.len() as u64), MtrOutcome::NeedMore));
    }

    #[test]
    fn multi_record_emits_all_components_after_end() {
        let mut data = vec![4u8];
        data.extend(compressed(1));
        data.extend(compressed(2));
        data.extend(10u16.to_be_bytes());
        data.extend(compressed(5));
        data.push(31); // MLOG_MULTI_REC_END
        match step(&data, 0, 0, data.len() as u64) {
            MtrOutcome::Emitted { records, single, consumed } => {
                assert!(!single);
                assert_eq!(consumed, data.len());
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].tag, RecordTag::MultiRecEnd);
            }
            _ => panic!("expected emission"),
        }
    }

    #[test]
    fn multi_record_rolls_back_past_scanned_lsn() {
        let mut data = vec![4u8];
        data.extend(compressed(1));
        data.extend(compressed(2));
        data.extend(10u16.to_be_bytes());
        data.extend(compressed(5));
        data.push(31);
        // scanned_lsn says only the first few bytes have actually landed.
        assert!(matches!(step(&data, 0, 0, 3), MtrOutcome::NeedMore));
    }

    #[test]
    fn single_rec_flag_inside_multi_is_corrupt() {
        let mut data = vec![4u8];
        data.extend(compressed(1));
        data.extend(compressed(2));
        data.extend(10u16.to_be_bytes());
        data.extend(compressed(5));
        data.push(4 | super::super::record::SINGLE_REC_FLAG); // malformed component
        data.extend(compressed(1));
        data.extend(compressed(2));
        data.extend(10u16.to_be_bytes());
        data.extend(compressed(6));
        assert!(matches!(step(&data, 0, 0, data.len() as u64), MtrOutcome::Corrupt));
    }

    #[test]
    fn dummy_record_treated_as_single() {
        let data = vec![32u8];
        match step(&data, 0, 5, 6) {
            MtrOutcome::Emitted { single, .. } => assert!(single),
            _ => panic!("expected emission"),
        }
    }
}
