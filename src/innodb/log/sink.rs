//! Event sink (section 4.7): the narrow interface the scan driver uses to
//! report recognized records, kept separate from assembly so alternate
//! sinks (JSON, counting, filtering) can be layered on without touching the
//! parser.

use std::io::Write;

use crate::innodb::log::record::{Record, RecordFields};
use crate::RedoError;

pub trait EventSink {
    fn emit(&mut self, record: &Record);

    /// Called once per mini-transaction, before its records (if any) are
    /// emitted. `single` distinguishes a single-record MTR from a
    /// multi-record one. Default no-op; `TextSink` uses it under `-vv`.
    fn mtr_boundary(&mut self, single: bool) {
        let _ = single;
    }
}

/// Reference sink: formats records as a human-readable trace, one line per
/// record, written through an arbitrary `Write` (stdout or `--output`).
pub struct TextSink<'w> {
    writer: &'w mut dyn Write,
    verbosity: u8,
    error: Option<RedoError>,
}

impl<'w> TextSink<'w> {
    pub fn new(writer: &'w mut dyn Write, verbosity: u8) -> Self {
        Self { writer, verbosity, error: None }
    }

    pub fn into_result(self) -> Result<(), RedoError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{line}") {
            self.error = Some(RedoError::Io(e.to_string()));
        }
    }
}

impl<'w> EventSink for TextSink<'w> {
    fn emit(&mut self, record: &Record) {
        let mut line = format!("lsn={}..{} {}", record.start_lsn, record.end_lsn, record.tag.name());
        if let Some(space_id) = record.space_id {
            line.push_str(&format!(" space_id={space_id}"));
        }
        if let Some(page_no) = record.page_no {
            line.push_str(&format!(" page_no={page_no}"));
        }
        match &record.fields {
            RecordFields::NBytes { offset, value } => {
                line.push_str(&format!(" offset={offset} value={value}"));
            }
            RecordFields::WriteString { offset, length, encryption_meta } => {
                line.push_str(&format!(" offset={offset} length={length}"));
                if *encryption_meta {
                    line.push_str(" encryption_meta=true");
                }
            }
            RecordFields::DynamicMeta { table_id, version } => {
                line.push_str(&format!(" table_id={table_id} version={version}"));
            }
            RecordFields::IndexOp(desc) => {
                line.push_str(&format!(" n_fields={} n_uniq={}", desc.n_fields, desc.n_uniq));
            }
            RecordFields::Opaque | RecordFields::None => {}
        }
        if self.verbosity > 0 && !record.body.is_empty() {
            line.push_str(&format!(" body_len={}", record.body.len()));
            if self.verbosity > 1 {
                line.push_str(&format!(" body={}", crate::util::hex::format_bytes(&record.body)));
            }
        }
        self.write_line(&line);
    }

    fn mtr_boundary(&mut self, single: bool) {
        if self.verbosity > 1 {
            self.write_line(if single { "-- mtr (single) --" } else { "-- mtr (multi) --" });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::innodb::log::record::RecordTag;

    fn sample_record() -> Record {
        Record {
            tag: RecordTag::Write4Bytes,
            space_id: Some(1),
            page_no: Some(2),
            body: vec![],
            fields: RecordFields::NBytes { offset: 4, value: 9 },
            start_lsn: 100,
            end_lsn: 110,
        }
    }

    #[test]
    fn emits_one_line_per_record() {
        let mut out = Vec::new();
        {
            let mut sink = TextSink::new(&mut out, 0);
            sink.emit(&sample_record());
            sink.into_result().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("MLOG_4BYTES"));
        assert!(text.contains("lsn=100..110"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn verbose_boundary_lines_only_above_level_one() {
        let mut out = Vec::new();
        {
            let mut sink = TextSink::new(&mut out, 0);
            sink.mtr_boundary(true);
            sink.into_result().unwrap();
        }
        assert!(out.is_empty());

        let mut out = Vec::new();
        {
            let mut sink = TextSink::new(&mut out, 2);
            sink.mtr_boundary(true);
            sink.into_result().unwrap();
        }
        assert!(!out.is_empty());
    }
}
