//! agriedge: command-line front end for the image-processing workbench.
//!
//! Loads an image, then runs a scripted sequence of workbench actions in
//! order, printing a status line for each. Failures never stop the
//! script: expected outcomes (already applied, nothing to undo) are
//! printed as notices, real failures as errors.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin agriedge -- [OPTIONS] <IMAGE_PATH> \
//!     --step grayscale --step sobel=100 --step threshold=150 \
//!     --step undo --step redo --step save=out.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod step;

use std::path::PathBuf;
use std::process::ExitCode;

use agriedge_ops::Threshold;
use agriedge_session::{
    Completed, PendingApply, Severity, Workbench, WorkbenchConfig, WorkbenchError,
};
use clap::Parser;
use log::{Level, info};

use crate::step::Step;

/// Image-processing workbench with replayable undo/redo.
///
/// Steps: OP, OP=N (edge detectors), threshold=N|none, undo, redo,
/// clear-output, clear-source, save[=PATH], export-source=PATH,
/// export-output=PATH, load=PATH.
#[derive(Parser)]
#[command(name = "agriedge", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Action to run; repeat for a script.
    #[arg(long = "step", short = 's')]
    steps: Vec<Step>,

    /// Initial threshold control value (0-255).
    #[arg(long, conflicts_with = "no_threshold")]
    threshold: Option<u8>,

    /// Run edge detectors without binarization unless a step gives one.
    #[arg(long)]
    no_threshold: bool,

    /// Quick-save destination for a bare `save` step.
    #[arg(long, default_value = WorkbenchConfig::DEFAULT_SAVE_PATH)]
    save_path: PathBuf,

    /// Destination for --save-on-exit.
    #[arg(long, default_value = WorkbenchConfig::DEFAULT_EXIT_SAVE_PATH)]
    exit_save_path: PathBuf,

    /// Write the displayed result to the exit path when the script ends.
    #[arg(long)]
    save_on_exit: bool,

    /// Print the final history ledger as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Full workbench config as a JSON string.
    ///
    /// When provided, the threshold and path flags are ignored.
    /// The JSON must be a valid `WorkbenchConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,

    /// Log at trace level.
    #[arg(long)]
    trace: bool,

    /// Log at warn level (the default).
    #[arg(long)]
    warn: bool,

    /// Log at info level.
    #[arg(long)]
    info: bool,
}

/// Set up logging from the verbosity flags.
fn setup_logger(cli: &Cli) {
    let log_level = if cli.debug {
        Level::Debug
    } else if cli.trace {
        Level::Trace
    } else if cli.warn {
        Level::Warn
    } else if cli.info {
        Level::Info
    } else {
        Level::Warn
    };

    if let Err(e) = simple_logger::init_with_level(log_level) {
        eprintln!("Could not initialize logger: {e}");
        return;
    }

    info!("Initialized logger");
    info!("Log level: {log_level}");
}

/// Build a [`WorkbenchConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<WorkbenchConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let default_threshold = if cli.no_threshold {
        None
    } else {
        Some(cli.threshold.map_or(Threshold::DEFAULT, Threshold::new))
    };

    Ok(WorkbenchConfig {
        default_threshold,
        default_save_path: cli.save_path.clone(),
        exit_save_path: cli.exit_save_path.clone(),
    })
}

/// Print a failure the way the interactive shell would surface it.
fn report(error: &WorkbenchError) {
    match error.severity() {
        Severity::Notice => eprintln!("Notice: {error}"),
        Severity::Alert => eprintln!("Error: {error}"),
    }
}

fn applied(completed: &Completed) {
    let parameter = completed
        .parameter
        .map_or_else(String::new, |t| format!(" (threshold {t})"));
    eprintln!(
        "{}{parameter} applied in {} ms",
        completed.operation.as_str().to_uppercase(),
        completed.elapsed.as_millis(),
    );
}

/// Wait for a background apply, echoing progress, then commit it.
fn finish(bench: &mut Workbench, pending: PendingApply) -> Result<(), WorkbenchError> {
    let finished = pending.wait(|p| eprintln!("  progress {p}%"));
    if let Some(completed) = bench.complete(finished)? {
        applied(completed);
    }
    Ok(())
}

fn run_step(bench: &mut Workbench, step: &Step) -> Result<(), WorkbenchError> {
    match step {
        Step::Load(path) => {
            let info = bench.load(path)?;
            eprintln!("Loaded {info}");
        }
        Step::Apply {
            operation,
            threshold,
        } => {
            let parameter = threshold.or_else(|| bench.threshold());
            let pending = bench.apply(*operation, parameter)?;
            finish(bench, pending)?;
        }
        Step::Threshold(threshold) => {
            let label = threshold.map_or_else(|| "none".to_owned(), |t| t.to_string());
            eprintln!("Threshold: {label}");
            if let Some(pending) = bench.set_threshold(*threshold)? {
                finish(bench, pending)?;
            }
        }
        Step::Undo => {
            let completed = bench.undo()?;
            eprint!("Undo: ");
            applied(completed);
        }
        Step::Redo => {
            let completed = bench.redo()?;
            eprint!("Redo: ");
            applied(completed);
        }
        Step::ClearOutput => {
            bench.clear_output();
            eprintln!("Output cleared");
        }
        Step::ClearSource => {
            bench.clear_source();
            eprintln!("Source cleared");
        }
        Step::Save(path) => {
            let written = bench.save(path.as_deref())?;
            eprintln!("Saved {}", written.display());
        }
        Step::Export(slot, path) => {
            let message = bench.export(*slot, path, Step::export_title(*slot))?;
            eprintln!("{message}");
        }
    }
    Ok(())
}

/// Run every step, reporting failures without stopping.
///
/// Returns how many failures were alerts; notices do not count.
fn run_script(bench: &mut Workbench, steps: &[Step]) -> usize {
    let mut alerts = 0;
    for step in steps {
        if let Err(e) = run_step(bench, step) {
            report(&e);
            if e.severity() == Severity::Alert {
                alerts += 1;
            }
        }
    }
    alerts
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(&cli);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut bench = Workbench::new(config);
    match bench.load(&cli.image_path) {
        Ok(info) => eprintln!("Loaded {info}"),
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    }

    let mut alerts = run_script(&mut bench, &cli.steps);

    if cli.save_on_exit {
        match bench.save_on_exit() {
            Ok(Some(path)) => eprintln!("Saved {} on exit", path.display()),
            Ok(None) => {}
            Err(e) => {
                report(&e);
                alerts += 1;
            }
        }
    }

    eprintln!(
        "Stage: {:?}, history {} entries, undo {}, redo {}",
        bench.stage(),
        bench.history().len(),
        if bench.can_undo() { "available" } else { "unavailable" },
        if bench.can_redo() { "available" } else { "unavailable" },
    );

    if cli.json {
        match serde_json::to_string_pretty(bench.history()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing history: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if alerts > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
