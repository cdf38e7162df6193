//! CLI surface for the `redo-scan` binary.
//!
//! A single non-subcommand [`app::Cli`] struct (shared with `build.rs` for
//! man page and completion generation via `include!()`) drives [`run::execute`].
//! The `wprintln!`/`wprint!` macros wrap `writeln!`/`write!` to convert
//! `io::Error` into [`crate::RedoError`], matching the teacher convention of
//! never letting a write failure surface as a raw `io::Error`.

pub mod app;
pub mod run;

/// Write a line to the given writer, converting io::Error to RedoError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::RedoError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::RedoError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to RedoError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::RedoError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;
