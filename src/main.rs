#[cfg(not(feature = "cli"))]
compile_error!("The `redo-scan` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use redolog::cli;
use redolog::cli::app::{Cli, ColorMode};
use redolog::RedoError;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let writer_result: Result<Box<dyn Write>, RedoError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| RedoError::Io(format!("cannot create {path}: {e}"))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run::execute(&cli, &mut writer) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
