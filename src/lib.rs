//! Offline InnoDB redo log scanner.
//!
//! `redolog` (binary: `redo-scan`) reads an `ib_logfile*` without a running
//! server, walks its 512-byte blocks starting at the selected checkpoint,
//! reassembles mini-transactions, and prints one line per recovered record.
//! It answers the same question `innobase::recv_sys` answers during crash
//! recovery — "what was durably written, and where does the tail of valid
//! log end" — without attaching to a `mysqld` process.
//!
//! # Library API
//!
//! ```no_run
//! use redolog::innodb::log::{align_to_block, lsn_to_offset, ChecksumKind, LogFile, Scanner, TextSink};
//!
//! let file = LogFile::open("ib_logfile0").unwrap();
//! let header = file.header().unwrap();
//! let checkpoint_lsn = file.max_checkpoint_lsn().unwrap();
//! let offset = align_to_block(lsn_to_offset(checkpoint_lsn, header.start_lsn));
//!
//! let mut scanner = Scanner::new(checkpoint_lsn, u64::MAX, ChecksumKind::Crc32);
//! let mut out = std::io::stdout();
//! let mut sink = TextSink::new(&mut out, 0);
//! let report = scanner.scan(file.bytes(), offset as usize, &mut sink);
//! println!("recovered up to lsn {}", report.recovered_lsn);
//! ```
//!
//! # Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`innodb::log::block`] | 512-byte block header/trailer parsing and checksums |
//! | [`innodb::log::buffer`] | Compacting parse buffer with LSN-stable offsets |
//! | [`innodb::log::varint`] | `mach_parse_compressed`-style integer decoding |
//! | [`innodb::log::record`] | Single-record decoding and the record type enum |
//! | [`innodb::log::mtr`] | Mini-transaction assembly and rollback |
//! | [`innodb::log::file`] | Log file header, checkpoints, LSN/offset conversion |
//! | [`innodb::log::scan`] | The scan driver and its state machine |
//! | [`innodb::log::sink`] | Trace output |
//!
//! # Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `redo-scan` binary (`clap`, `colored`). |

pub mod cli;
pub mod innodb;
pub mod util;

use thiserror::Error;

/// Errors returned by `redolog` operations.
#[derive(Error, Debug)]
pub enum RedoError {
    /// An I/O error occurred (file open, read, or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A parse error occurred (malformed binary data or unexpected values).
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid argument was supplied (bad LSN range, missing file, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),
}
