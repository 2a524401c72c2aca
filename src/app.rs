//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - builds the dataset and solver configuration
//! - runs the fit(s) and prints reports
//! - writes the optional JSON export

use std::io::Write;

use clap::Parser;

use crate::cli::{BatchArgs, Command, FitArgs, SolverArgs, SyntheticArgs};
use crate::data::SampleConfig;
use crate::domain::{DifferenceScheme, FitConfig, FitStatus};
use crate::error::AppError;
use crate::io::{FitFile, write_fit_json};
use crate::report::{ModelLabel, format_batch_line, format_fit_summary, format_point_table, format_status_counts};

pub mod pipeline;

use pipeline::DatasetSource;

/// Entry point for the `lmfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
    }
}

/// Route `log` records to stderr; `-v` flags raise the level, `RUST_LOG` refines it.
pub fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::builder();
    builder
        .format(|buf, record| {
            let top_level_module = record
                .module_path()
                .and_then(|m| m.split("::").next())
                .unwrap_or("lmfit");
            writeln!(buf, "{:5} [{}]: {}", record.level(), top_level_module, record.args())
        })
        .filter_level(log_filter_from_level(verbosity))
        .parse_default_env();
    // A second initialisation (e.g. from tests) is harmless.
    let _ = builder.try_init();
}

/// Converts a `-v` count into a log filter.
pub fn log_filter_from_level(level: u8) -> log::LevelFilter {
    match level {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let kind = args.solver.model;
    let guess = args.solver.guess.clone().unwrap_or_else(|| kind.default_guess());
    let config = fit_config_from_args(&args.solver);
    let source = if args.synthetic {
        DatasetSource::Synthetic {
            truth: args.sample.truth.clone(),
            sample: sample_config_from_args(&args.sample),
        }
    } else {
        DatasetSource::Lab
    };

    let run = pipeline::run_fit(kind, &guess, &source, &config)?;
    let label = ModelLabel {
        name: kind.display_name(),
        formula: kind.formula(),
        parameter_names: kind.parameter_names(),
    };

    println!("{}", format_fit_summary(&label, run.stats.as_ref(), &run.result));
    if !args.no_table && !run.points.is_empty() {
        println!("{}", format_point_table(&run.points));
    }

    if let Some(path) = &args.export {
        let file = FitFile::new(label.name, label.formula, label.parameter_names, &run.result, &run.points);
        write_fit_json(path, &file)?;
    }

    match run.result.status {
        FitStatus::Converged => Ok(()),
        _ => Err(AppError::new(
            4,
            format!("Fit did not converge: {}", run.result.termination),
        )),
    }
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let kind = args.solver.model;
    let guess = args.solver.guess.clone().unwrap_or_else(|| kind.default_guess());
    let config = fit_config_from_args(&args.solver);
    let sample = sample_config_from_args(&args.sample);

    let run = pipeline::run_batch(
        kind,
        &guess,
        args.sample.truth.as_deref(),
        &sample,
        args.datasets,
        &config,
    )?;

    println!("Model: {} ({})", kind.display_name(), kind.formula());
    for (i, (seed, result)) in run.seeds.iter().zip(&run.results).enumerate() {
        println!("{}", format_batch_line(i, *seed, result));
    }
    println!("{}", format_status_counts(&run.counts));
    Ok(())
}

pub fn fit_config_from_args(args: &SolverArgs) -> FitConfig {
    let scheme = if args.central {
        DifferenceScheme::Central
    } else {
        DifferenceScheme::Forward
    };
    FitConfig::default()
        .with_max_iterations(args.max_iterations)
        .with_relative_tolerance(args.tolerance)
        .with_initial_damping(args.damping)
        .with_difference(scheme)
}

pub fn sample_config_from_args(args: &SyntheticArgs) -> SampleConfig {
    SampleConfig {
        count: args.count,
        x_min: args.x_min,
        x_max: args.x_max,
        noise_sd: args.noise,
        seed: args.seed,
    }
}
