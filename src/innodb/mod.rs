//! InnoDB binary format parsing.
//!
//! Scoped to the redo log: physical block framing, mini-transaction
//! assembly, and the scan driver. See [`log`] for the entry points.

pub mod log;
