//! Command-line parsing for the `lmfit` curve fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! solver; `app` maps these structs into a `FitConfig` and dataset options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::ModelKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lmfit", version, about = "Nonlinear least-squares curve fitting (Levenberg-Marquardt)")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one dataset and print parameters, uncertainties and R².
    Fit(FitArgs),
    /// Fit many seeded synthetic datasets in parallel and summarize statuses.
    Batch(BatchArgs),
}

/// Model and solver options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Model to fit.
    #[arg(short, long, value_enum, default_value_t = ModelKind::ExpOffset)]
    pub model: ModelKind,

    /// Initial guess, comma separated (defaults to the model's built-in guess).
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub guess: Option<Vec<f64>>,

    /// Maximum number of iterations.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Relative SSR reduction below which the fit counts as converged.
    #[arg(long, default_value_t = 1e-8)]
    pub tolerance: f64,

    /// Initial damping λ.
    #[arg(long, default_value_t = 1e-3)]
    pub damping: f64,

    /// Use central differences for the Jacobian (forward by default).
    #[arg(long)]
    pub central: bool,
}

/// Synthetic dataset options.
#[derive(Debug, Args, Clone)]
pub struct SyntheticArgs {
    /// True parameters used to generate y-values, comma separated
    /// (defaults to a per-model reference set).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub truth: Option<Vec<f64>>,

    /// Number of generated points.
    #[arg(short = 'n', long, default_value_t = 30)]
    pub count: usize,

    /// Smallest x-value.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub x_min: f64,

    /// Largest x-value.
    #[arg(long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub x_max: f64,

    /// Standard deviation of Gaussian noise added to y.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed (the batch command uses seed, seed+1, ...).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for `lmfit fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub solver: SolverArgs,

    /// Fit a synthetic dataset instead of the bundled lab data.
    #[arg(long)]
    pub synthetic: bool,

    #[command(flatten)]
    pub sample: SyntheticArgs,

    /// Do not print the observed/fitted point table.
    #[arg(long)]
    pub no_table: bool,

    /// Export the fit (result + fitted points) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

/// Options for `lmfit batch`.
#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub sample: SyntheticArgs,

    /// Number of datasets to generate and fit.
    #[arg(long, default_value_t = 16)]
    pub datasets: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_defaults() {
        let cli = Cli::try_parse_from(["lmfit", "fit"]).unwrap();
        assert_eq!(cli.verbose, 0);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.solver.model, ModelKind::ExpOffset);
        assert!(args.solver.guess.is_none());
        assert!(!args.synthetic);
        assert_eq!(args.solver.max_iterations, 200);
    }

    #[test]
    fn guess_accepts_negative_components() {
        let cli = Cli::try_parse_from(["lmfit", "-vv", "fit", "--guess", "-1,2,-0.5", "--central"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.solver.guess, Some(vec![-1.0, 2.0, -0.5]));
        assert!(args.solver.central);
    }

    #[test]
    fn batch_options() {
        let cli = Cli::try_parse_from([
            "lmfit", "batch", "--model", "linear", "--truth", "1,2", "--datasets", "4", "--seed", "7",
        ])
        .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.solver.model, ModelKind::Linear);
        assert_eq!(args.sample.truth, Some(vec![1.0, 2.0]));
        assert_eq!(args.datasets, 4);
        assert_eq!(args.sample.seed, 7);
    }
}
