use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "redo-scan")]
#[command(about = "Offline scanner for InnoDB redo log files")]
#[command(version)]
pub struct Cli {
    /// Path to the redo log file
    pub file: String,

    /// Print the file header and checkpoint summary, then continue scanning
    #[arg(long)]
    pub header: bool,

    /// Print the file header and checkpoint summary, then exit
    #[arg(short = 'H', long)]
    pub header_only: bool,

    /// Override the computed start LSN
    #[arg(short = 'b', long = "start-lsn")]
    pub start_lsn: Option<u64>,

    /// Upper LSN bound for the scan
    #[arg(short = 'e', long = "stop-lsn")]
    pub stop_lsn: Option<u64>,

    /// Increase per-record output detail; repeatable (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write the trace to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}
