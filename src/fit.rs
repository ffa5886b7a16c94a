//! Closed-form fit functions referenced by pre-fitted tables, and the
//! residual / chi-square evaluation of data against them.

use std::str::FromStr;

use crate::data::model::{ResultTable, Value};
use crate::error::{FitError, ShapeError};

/// Residuals at or beyond this magnitude are excluded from chi-square and display.
pub const RESIDUAL_LIMIT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFunction {
    /// `a + b·x`
    Linear,
    /// `a + b·x + c·x²`
    Quadratic,
    /// `A·exp(-(x-μ)²/(2σ²))`
    Gaussian,
    /// `A·exp(b·x)`
    Exponential,
    /// `A·x^b`
    Power,
    /// `sqrt(a²/x + b² + c²/x²)`, the calorimetric energy resolution
    Resolution,
}

impl FitFunction {
    pub fn parameters(self) -> usize {
        match self {
            FitFunction::Linear | FitFunction::Exponential | FitFunction::Power => 2,
            FitFunction::Quadratic | FitFunction::Gaussian | FitFunction::Resolution => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FitFunction::Linear => "linear",
            FitFunction::Quadratic => "quadratic",
            FitFunction::Gaussian => "gaussian",
            FitFunction::Exponential => "exponential",
            FitFunction::Power => "power",
            FitFunction::Resolution => "resolution",
        }
    }

    /// Evaluate at `x`.  `p` must hold [`parameters`](Self::parameters) values.
    pub fn eval(self, x: f64, p: &[f64]) -> f64 {
        match self {
            FitFunction::Linear => p[0] + p[1] * x,
            FitFunction::Quadratic => p[0] + p[1] * x + p[2] * x * x,
            FitFunction::Gaussian => p[0] * (-(x - p[1]).powi(2) / (2.0 * p[2].powi(2))).exp(),
            FitFunction::Exponential => p[0] * (p[1] * x).exp(),
            FitFunction::Power => p[0] * x.powf(p[1]),
            FitFunction::Resolution => {
                (p[0].powi(2) / x + p[1].powi(2) + p[2].powi(2) / (x * x)).sqrt()
            }
        }
    }

    pub fn check(self, params: &[f64]) -> Result<(), FitError> {
        if params.len() != self.parameters() {
            return Err(FitError::ParameterCount {
                name: self.name().to_string(),
                expected: self.parameters(),
                found: params.len(),
            });
        }
        Ok(())
    }
}

impl FromStr for FitFunction {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "line" => Ok(FitFunction::Linear),
            "quadratic" | "poly2" => Ok(FitFunction::Quadratic),
            "gaussian" | "gauss" => Ok(FitFunction::Gaussian),
            "exponential" | "exp" => Ok(FitFunction::Exponential),
            "power" => Ok(FitFunction::Power),
            "resolution" => Ok(FitFunction::Resolution),
            _ => Err(FitError::UnknownFunction(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Fit metadata carried by a pre-fitted row
// ---------------------------------------------------------------------------

/// The `Params*` / `FitFunction*` cells of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct FitMetadata {
    pub function: FitFunction,
    pub label: Option<String>,
    pub params: Vec<f64>,
    pub errors: Vec<f64>,
    pub labels: Vec<String>,
    pub formats: Vec<String>,
}

impl FitMetadata {
    /// Read the fit columns of `row`.  Returns `Ok(None)` when the row has no
    /// `FitFunction`.
    pub fn from_row(table: &ResultTable, row: usize) -> Result<Option<Self>, FitError> {
        let Some(name) = table.value(row, "FitFunction").and_then(Value::as_str) else {
            return Ok(None);
        };
        let function: FitFunction = name.parse()?;
        let floats = |column: &str| {
            table
                .value(row, column)
                .and_then(Value::to_f64_vec)
                .unwrap_or_default()
        };
        let strings = |column: &str| -> Vec<String> {
            table
                .value(row, column)
                .and_then(Value::as_list)
                .map(|items| items.iter().map(|v| v.to_string()).collect())
                .unwrap_or_default()
        };
        let params = floats("Params");
        function.check(&params)?;
        Ok(Some(Self {
            function,
            label: table
                .value(row, "FitFunctionLabel")
                .and_then(Value::as_str)
                .map(str::to_string),
            errors: floats("ParamsError"),
            labels: strings("ParamsLabels"),
            formats: strings("ParamsFormat"),
            params,
        }))
    }

    /// One `label = value ± error` line per parameter.
    pub fn parameter_lines(&self) -> Vec<String> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let label = self.labels.get(i).cloned().unwrap_or_else(|| format!("p{i}"));
                let spec = self.formats.get(i).map(String::as_str).unwrap_or(".3g");
                let value = format_spec(p, spec);
                match self.errors.get(i) {
                    Some(&e) => format!("{label} = {value} ± {}", format_spec(e, spec)),
                    None => format!("{label} = {value}"),
                }
            })
            .collect()
    }
}

/// Format with a printf-like spec such as `.2f` or `.1e`.  Anything else
/// falls back to the shortest representation.
pub fn format_spec(value: f64, spec: &str) -> String {
    let spec = spec.trim_start_matches(':');
    let Some(rest) = spec.strip_prefix('.') else {
        return value.to_string();
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let Ok(precision) = digits.parse::<usize>() else {
        return value.to_string();
    };
    match &rest[digits.len()..] {
        "e" | "E" => format!("{value:.precision$e}"),
        "f" | "F" | "" => format!("{value:.precision$}"),
        _ => value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Residuals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Residuals {
    pub fit: Vec<f64>,
    /// `(y - fit) / fit`
    pub residual: Vec<f64>,
    /// `y_err / fit`, when errors were given.
    pub residual_error: Option<Vec<f64>>,
    /// Points with a finite residual below [`RESIDUAL_LIMIT`].
    pub used: Vec<bool>,
    /// `Σ (y - fit)² / fit` over used points.
    pub chi2: f64,
    pub ndof: usize,
}

/// Compare data against a fit.  Degenerate points (zero fit, non-finite or
/// huge residuals) are masked out rather than reported as errors.
pub fn residuals(
    function: FitFunction,
    params: &[f64],
    x: &[f64],
    y: &[f64],
    y_err: Option<&[f64]>,
) -> Result<Residuals, FitError> {
    function.check(params)?;
    if x.len() != y.len() {
        return Err(ShapeError {
            x: x.len(),
            y: y.len(),
        }
        .into());
    }
    if let Some(e) = y_err {
        if e.len() != y.len() {
            return Err(ShapeError {
                x: y.len(),
                y: e.len(),
            }
            .into());
        }
    }

    let fit: Vec<f64> = x.iter().map(|&xi| function.eval(xi, params)).collect();
    let residual: Vec<f64> = y.iter().zip(&fit).map(|(yi, fi)| (yi - fi) / fi).collect();
    let residual_error =
        y_err.map(|e| e.iter().zip(&fit).map(|(ei, fi)| ei / fi).collect::<Vec<_>>());
    let used: Vec<bool> = residual
        .iter()
        .map(|r| r.is_finite() && r.abs() < RESIDUAL_LIMIT)
        .collect();
    let chi2 = y
        .iter()
        .zip(&fit)
        .zip(&used)
        .filter(|(_, used)| **used)
        .map(|((yi, fi), _)| (yi - fi).powi(2) / fi)
        .sum();

    Ok(Residuals {
        fit,
        residual,
        residual_error,
        used,
        chi2,
        ndof: params.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_names() {
        assert_eq!("Gaussian".parse::<FitFunction>(), Ok(FitFunction::Gaussian));
        assert_eq!(
            "spline".parse::<FitFunction>(),
            Err(FitError::UnknownFunction("spline".into()))
        );
    }

    #[test]
    fn perfect_data_has_zero_chi2() {
        let x = [1.0, 2.0, 3.0];
        let y = [3.0, 5.0, 7.0];
        let r = residuals(FitFunction::Linear, &[1.0, 2.0], &x, &y, None).unwrap();
        assert_eq!(r.chi2, 0.0);
        assert!(r.used.iter().all(|&u| u));
        assert_eq!(r.ndof, 2);
    }

    #[test]
    fn zero_fit_points_are_masked() {
        // fit is zero at x = 0
        let x = [0.0, 1.0, 2.0];
        let y = [1.0, 2.0, 4.0];
        let r = residuals(FitFunction::Linear, &[0.0, 2.0], &x, &y, Some(&[0.1, 0.1, 0.1][..])).unwrap();
        assert_eq!(r.used, [false, true, true]);
        assert!(r.chi2.is_finite());
        assert!((r.chi2 - 0.0).abs() < 1e-12);
        assert!(r.residual_error.unwrap()[0].is_infinite());
    }

    #[test]
    fn wrong_parameter_count_is_reported() {
        let err = residuals(FitFunction::Gaussian, &[1.0], &[1.0], &[1.0], None).unwrap_err();
        assert_eq!(
            err,
            FitError::ParameterCount {
                name: "gaussian".into(),
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn parameter_lines_use_row_formats() {
        let table = ResultTable::from_rows(
            vec![
                "FitFunction".into(),
                "Params".into(),
                "ParamsError".into(),
                "ParamsLabels".into(),
                "ParamsFormat".into(),
            ],
            vec![vec![
                "linear".into(),
                vec![1.0, 0.25].into(),
                vec![0.1, 0.01].into(),
                Value::List(vec!["a".into(), "b".into()]),
                Value::List(vec![".1f".into(), ".1e".into()]),
            ]],
        )
        .unwrap();
        let meta = FitMetadata::from_row(&table, 0).unwrap().unwrap();
        assert_eq!(
            meta.parameter_lines(),
            ["a = 1.0 ± 0.1", "b = 2.5e-1 ± 1.0e-2"]
        );
    }
}
