//! Terminal formatting for fit results.
//!
//! Everything here returns a `String`; printing is left to the caller.

use crate::data::DatasetStats;
use crate::domain::{FitResult, FitStatus};
use crate::fit::StatusCounts;
use crate::report::FittedPoint;

/// What the summary should call the model and its parameters.
#[derive(Debug, Clone, Copy)]
pub struct ModelLabel<'a> {
    pub name: &'a str,
    pub formula: &'a str,
    /// Parameter names; missing names fall back to `p0`, `p1`, ...
    pub parameter_names: &'a [&'a str],
}

/// Format the full fit summary (dataset, status, parameters or failure reason).
pub fn format_fit_summary(label: &ModelLabel<'_>, stats: Option<&DatasetStats>, result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== lmfit - Levenberg-Marquardt fit ===\n");
    out.push_str(&format!("Model: {} ({})\n", label.name, label.formula));
    if let Some(s) = stats {
        out.push_str(&format!(
            "Points: n={} | x=[{:.3}, {:.3}] | y=[{:.3}, {:.3}]\n",
            s.n_points, s.x_min, s.x_max, s.y_min, s.y_max
        ));
    }
    out.push_str(&format!("Status: {}\n", result.status));

    match result.status {
        FitStatus::Converged => {
            out.push_str(&format!("Converged: {}\n", result.termination));
            out.push_str(&format!("Iterations: {}\n", result.iterations));
            out.push_str("\nParameters:\n");

            let errors = result.standard_errors();
            for (i, value) in result.parameters.iter().enumerate() {
                let name = parameter_name(label, i);
                match errors.as_ref().map(|e| e[i]) {
                    Some(se) if se.is_finite() => {
                        out.push_str(&format!("  {name:<6} = {value:>14.6} ± {se:.6}\n"));
                    }
                    Some(_) => out.push_str(&format!("  {name:<6} = {value:>14.6} ± inf\n")),
                    None => out.push_str(&format!("  {name:<6} = {value:>14.6}\n")),
                }
            }
            out.push('\n');

            match result.r_squared {
                Some(r2) => out.push_str(&format!("R^2: {r2:.4}\n")),
                None => out.push_str("R^2: undefined (observations are constant)\n"),
            }
            if let (Some(ssr), Some(rmse)) = (result.ssr, result.rmse()) {
                out.push_str(&format!("SSR: {ssr:.6e} | RMSE: {rmse:.6e}\n"));
            }
        }
        FitStatus::MaxIterationsExceeded | FitStatus::Diverged => {
            out.push_str(&format!("Reason: {}\n", result.termination));
            out.push_str(&format!("Iterations: {}\n", result.iterations));
            out.push_str(&format!("Best estimate: {}\n", fmt_vec(&result.parameters)));
            if let Some(ssr) = result.ssr {
                out.push_str(&format!("SSR at best estimate: {ssr:.6e}\n"));
            }
            out.push_str("Hint: try a different initial guess (--guess).\n");
        }
        FitStatus::InvalidConfiguration => {
            out.push_str(&format!("Reason: {}\n", result.termination));
        }
    }

    out
}

/// Format observed vs fitted values.
pub fn format_point_table(points: &[FittedPoint]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>12} {:>12} {:>12} {:>12}", "x", "y_obs", "y_fit", "residual").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<12}", "", "", "", "").trim_end());
    out.push('\n');

    for p in points {
        out.push_str(&format!(
            "{:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
            p.x, p.y_obs, p.y_fit, p.residual
        ));
    }

    out
}

/// One line per batch member.
pub fn format_batch_line(index: usize, seed: u64, result: &FitResult) -> String {
    let r2 = result
        .r_squared
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{index:<4} seed={seed:<6} {:<24} iter={:<4} R^2={r2:<7} params={}",
        result.status.label(),
        result.iterations,
        fmt_vec(&result.parameters)
    )
}

/// Aggregate status counts for a batch.
pub fn format_status_counts(counts: &StatusCounts) -> String {
    format!(
        "Total: {} | converged={} | max_iterations_exceeded={} | diverged={} | invalid_configuration={}",
        counts.total(),
        counts.converged,
        counts.max_iterations_exceeded,
        counts.diverged,
        counts.invalid_configuration
    )
}

fn parameter_name(label: &ModelLabel<'_>, i: usize) -> String {
    label
        .parameter_names
        .get(i)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("p{i}"))
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}
