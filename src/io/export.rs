//! Export a fit to JSON.
//!
//! The document carries everything an external plotter needs: the model
//! formula, the fit result (parameters, covariance, status, history) and the
//! observed/fitted values at each x. Non-finite numbers (e.g. an unbounded
//! covariance) are written as `null`.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::FitResult;
use crate::error::AppError;
use crate::report::FittedPoint;

/// Schema of an exported fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitFile<'a> {
    pub tool: &'static str,
    pub generated: DateTime<Utc>,
    pub model: &'a str,
    pub formula: &'a str,
    pub parameter_names: &'a [&'a str],
    pub result: &'a FitResult,
    pub points: &'a [FittedPoint],
}

impl<'a> FitFile<'a> {
    pub fn new(
        model: &'a str,
        formula: &'a str,
        parameter_names: &'a [&'a str],
        result: &'a FitResult,
        points: &'a [FittedPoint],
    ) -> Self {
        Self {
            tool: "lmfit",
            generated: Utc::now(),
            model,
            formula,
            parameter_names,
            result,
            points,
        }
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile<'_>) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;

    log::info!("wrote fit to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::lab_observations;
    use crate::domain::FitConfig;
    use crate::fit::fit;
    use crate::models::ModelKind;
    use crate::report::fitted_points;

    #[test]
    fn export_writes_result_and_points() {
        let kind = ModelKind::ExpOffset;
        let obs = lab_observations();
        let result = fit(&kind, &kind.default_guess(), &obs, &FitConfig::default());
        let points = fitted_points(&kind, &obs, &result.parameters).unwrap();
        let file = FitFile::new(
            kind.display_name(),
            kind.formula(),
            kind.parameter_names(),
            &result,
            &points,
        );

        let path = std::env::temp_dir().join(format!("lmfit-export-{}.json", std::process::id()));
        write_fit_json(&path, &file).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["tool"], "lmfit");
        assert_eq!(json["model"], "exp-offset");
        assert_eq!(json["result"]["status"], "CONVERGED");
        assert_eq!(json["result"]["parameters"].as_array().unwrap().len(), 3);
        assert_eq!(json["points"].as_array().unwrap().len(), obs.len());
        assert!(json["generated"].is_string());
    }

    #[test]
    fn export_to_missing_directory_is_an_io_error() {
        let kind = ModelKind::Linear;
        let obs = lab_observations();
        let result = fit(&kind, &kind.default_guess(), &obs, &FitConfig::default());
        let file = FitFile::new(kind.display_name(), kind.formula(), &[], &result, &[]);

        let path = std::env::temp_dir().join("lmfit-no-such-dir").join("out.json");
        let err = write_fit_json(&path, &file).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
