mod cli;

use crate::cli::CliArgs;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, LevelFilter};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use vidqa::pipeline::{self, PipelineOutput};

fn main() -> ExitCode {
    // Record start time early
    let start_time = Instant::now();

    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting vidqa validation...");
    info!("Arguments: {:?}", args);

    let output = validate_with_progress(&args);

    match write_output(&args, &output) {
        Ok(()) => {
            info!(
                "Validation finished in {:.2?}: {}",
                start_time.elapsed(),
                output.status.as_str()
            );
            if output.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Failed to write result after {:.2?}: {}", start_time.elapsed(), e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up logging to stderr and optionally to a file.
fn setup_logging(args: &CliArgs) -> Result<(), fern::InitError> {
    let crate_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("vidqa", crate_level);

    // stdout carries the JSON result, so console logs go to stderr.
    let console_config = fern::Dispatch::new().chain(std::io::stderr());

    let mut logger = base_config.chain(console_config);

    let mut log_path = None;
    if args.log {
        let log_dir = args.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir)?;
        }
        let path = log_dir.join(format!("vidqa_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&path)?));
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

fn validate_with_progress(args: &CliArgs) -> PipelineOutput {
    let options = args.run_options();
    if args.no_progress {
        return pipeline::run(&args.video, &options, None::<fn(usize, usize)>);
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                 {pos}/{len} frames ({percent}%)",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>- "),
    );

    let output = pipeline::run(
        &args.video,
        &options,
        Some(|done: usize, total: usize| {
            // The estimate can undershoot when the container lies about its length.
            bar.set_length(total.max(done) as u64);
            bar.set_position(done as u64);
        }),
    );
    bar.finish_and_clear();
    output
}

fn write_output(args: &CliArgs, output: &PipelineOutput) -> Result<(), Box<dyn std::error::Error>> {
    let json = if args.pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };

    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Result written to {}", path.display());
            eprintln!("Result saved: {}", path.display()); // User-facing confirmation
        }
        None => println!("{}", json),
    }

    if !output.summary.is_empty() {
        eprintln!("{}", output.summary);
    }
    Ok(())
}
