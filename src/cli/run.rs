//! Drives a single scan: open the file, optionally print the header and
//! checkpoint summary, then run the scanner and stream its trace through a
//! [`TextSink`]. Mirrors the flow of `mysqlredo.cc`'s `main()`: resolve the
//! starting LSN from the checkpoint (or an override), convert it to a file
//! offset, and scan until the file, a stop bound, or corruption ends it.

use std::io::Write;

use crate::cli::app::Cli;
use crate::cli::{wprint, wprintln};
use crate::innodb::log::{align_to_block, lsn_to_offset, ChecksumKind, LogFile, Scanner, TextSink};
use crate::RedoError;

pub fn execute(cli: &Cli, writer: &mut dyn Write) -> Result<(), RedoError> {
    if cli.verbose > 1 {
        wprintln!(writer, "opening {}", cli.file)?;
    }

    let file = LogFile::open(&cli.file)?;
    let header = file.header()?;
    let checkpoint_lsn = file.max_checkpoint_lsn()?;

    if cli.header || cli.header_only {
        print_header_summary(writer, &file, &header, checkpoint_lsn)?;
        if cli.header_only {
            return Ok(());
        }
    }

    let start_lsn = cli.start_lsn.unwrap_or(checkpoint_lsn);
    let stop_lsn = cli.stop_lsn.unwrap_or(u64::MAX);
    let first_block_offset = align_to_block(lsn_to_offset(start_lsn, header.start_lsn));

    let mut scanner = Scanner::new(start_lsn, stop_lsn, ChecksumKind::Crc32);
    let report = {
        let mut sink = TextSink::new(writer, cli.verbose);
        let report = scanner.scan(file.bytes(), first_block_offset as usize, &mut sink);
        sink.into_result()?;
        report
    };

    let stopped_early = cli.stop_lsn.is_some() && report.recovered_lsn < stop_lsn;
    if !report.found_corrupt_log && stopped_early {
        wprintln!(writer, "Parse finished in the middle of file.")?;
    }

    if report.found_corrupt_log {
        return Err(RedoError::Parse(format!(
            "corrupt redo log detected at recovered_lsn={}",
            report.recovered_lsn
        )));
    }

    Ok(())
}

fn print_header_summary(
    writer: &mut dyn Write,
    file: &LogFile,
    header: &crate::innodb::log::LogFileHeader,
    checkpoint_lsn: u64,
) -> Result<(), RedoError> {
    wprintln!(writer, "file size:     {} bytes", file.file_size())?;
    wprintln!(writer, "format:        {}", header.format_version)?;
    wprintln!(writer, "start lsn:     {}", header.start_lsn)?;
    wprintln!(writer, "created by:    {}", header.created_by)?;
    let cp1 = file.checkpoint(0)?;
    let cp2 = file.checkpoint(1)?;
    wprint!(writer, "checkpoint 1:  lsn={}", cp1.lsn)?;
    if cp1.lsn == checkpoint_lsn {
        wprintln!(writer, " (selected)")?;
    } else {
        wprintln!(writer)?;
    }
    wprint!(writer, "checkpoint 2:  lsn={}", cp2.lsn)?;
    if cp2.lsn == checkpoint_lsn {
        wprintln!(writer, " (selected)")?;
    } else {
        wprintln!(writer)?;
    }
    Ok(())
}
