use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};

use chesscal::{run_calibration, ExecutionStrategy, RunConfig};
use chesscal_core::{init_with_level, PatternSize};
use chesscal_detect::ChessboardDetector;
use chesscal_solve::{PlanarSolver, SolveOptions};

/// Calibrate a camera from chessboard images.
///
/// Scans a directory for `<prefix>*.png` images, finds the chessboard in
/// each one, solves for the camera model and writes a text report plus a
/// JSON record.
#[derive(Parser, Debug)]
#[command(name = "chesscal", version)]
struct Cli {
    /// Directory containing the calibration images
    #[arg(long, default_value = ".")]
    images: PathBuf,

    /// Image file name prefix
    #[arg(long, default_value = chesscal::DEFAULT_FILE_PREFIX)]
    prefix: String,

    /// Inner corners per column of the chessboard
    #[arg(long, default_value_t = 6)]
    rows: u32,

    /// Inner corners per row of the chessboard
    #[arg(long, default_value_t = 9)]
    cols: u32,

    /// Report output path (defaults to calibration.log in the image dir)
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON record output path (defaults to calibration.json in the image dir)
    #[arg(long)]
    record: Option<PathBuf>,

    /// Process images one at a time instead of on a worker pool
    #[arg(long)]
    sequential: bool,

    /// Disable the rational distortion model
    #[arg(long)]
    no_rational: bool,

    /// Hold the tangential distortion coefficients at zero
    #[arg(long)]
    zero_tangential: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = init_with_level(level);

    let mut config = RunConfig::new(cli.images, PatternSize::new(cli.rows, cli.cols));
    config.file_prefix = cli.prefix;
    config.options = SolveOptions {
        rational_model: !cli.no_rational,
        zero_tangential: cli.zero_tangential,
        ..SolveOptions::default()
    };
    if cli.sequential {
        config.strategy = ExecutionStrategy::Sequential;
    }
    if let Some(report) = cli.report {
        config.report_path = report;
    }
    if let Some(record) = cli.record {
        config.record_path = record;
    }

    let detector = ChessboardDetector::default();
    let solver = PlanarSolver::new(config.options);
    match run_calibration(&config, &detector, &solver) {
        Ok(record) => {
            print!("{}", record.report_text());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
