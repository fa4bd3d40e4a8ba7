// src/cli.rs

use clap::Parser;
use std::path::PathBuf;
use vidqa::pipeline::{RunOptions, DEFAULT_SAMPLE_RATE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Video file to validate
    #[arg(required = true)]
    pub video: PathBuf,

    /// Analyze every Nth frame
    #[arg(
        long,
        default_value_t = DEFAULT_SAMPLE_RATE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub sample_rate: u32,

    /// First frame to consider
    #[arg(long, default_value_t = 0)]
    pub start_frame: u64,

    /// Stop before this frame (default: end of video)
    #[arg(long)]
    pub end_frame: Option<u64>,

    /// Include the long statistical summary in the result
    #[arg(long)]
    pub summary: bool,

    /// Write the JSON result to this file instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub pretty: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable logging to file (e.g., vidqa_YYYYMMDD_HHMMSS.log)
    #[arg(long)]
    pub log: bool,

    /// Directory for the log file (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Debug-level logging for this crate
    #[arg(long, short)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            sample_rate: self.sample_rate,
            start_frame: self.start_frame,
            end_frame: self.end_frame,
            include_summary: self.summary,
        }
    }
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
