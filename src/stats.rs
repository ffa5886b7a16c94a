//! Numerical helpers shared by the commands: percentiles, 1D and 2D histograms,
//! element-wise operations and mean ± error aggregation.

use std::fmt;
use std::str::FromStr;

use crate::error::ShapeError;

/// Percentile of `data` with linear interpolation between closest ranks
/// (numpy's default).  Non-finite values are ignored.
pub fn percentile(data: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// `(percentile(lo), percentile(hi))` of `data`.
pub fn percentile_range(data: &[f64], (lo, hi): (f64, f64)) -> Option<(f64, f64)> {
    Some((percentile(data, lo)?, percentile(data, hi)?))
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    pub values: Vec<f64>,
}

/// Equal-width bins over a closed range.  A degenerate range is widened by
/// half a unit on each side.
#[derive(Debug, Clone, Copy)]
struct Binning {
    lo: f64,
    hi: f64,
    width: f64,
    bins: usize,
}

impl Binning {
    fn new(bins: usize, (mut lo, mut hi): (f64, f64)) -> Self {
        let bins = bins.max(1);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        Self {
            lo,
            hi,
            width: (hi - lo) / bins as f64,
            bins,
        }
    }

    fn edges(&self) -> Vec<f64> {
        (0..=self.bins).map(|i| self.lo + self.width * i as f64).collect()
    }

    /// Bin of `v`; the last bin includes its upper edge.
    fn index(&self, v: f64) -> Option<usize> {
        if !(self.lo..=self.hi).contains(&v) {
            return None;
        }
        Some((((v - self.lo) / self.width) as usize).min(self.bins - 1))
    }
}

impl Histogram {
    /// Fill equal-width bins over `range`.  The last bin includes its upper
    /// edge; values outside the range are dropped.  With `density` the
    /// histogram integrates to one.
    pub fn fill(data: &[f64], bins: usize, range: (f64, f64), density: bool) -> Self {
        let binning = Binning::new(bins, range);
        let mut values = vec![0.0; binning.bins];
        for bin in data.iter().filter_map(|&v| binning.index(v)) {
            values[bin] += 1.0;
        }

        if density {
            let total: f64 = values.iter().sum();
            if total > 0.0 {
                for value in &mut values {
                    *value /= total * binning.width;
                }
            }
        }
        Self {
            edges: binning.edges(),
            values,
        }
    }

    /// `(low edge, high edge, value)` per bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.values)
            .map(|(e, &v)| (e[0], e[1], v))
    }
}

/// Joint histogram of paired x and y values.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2d {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// `values[ix][iy]`
    pub values: Vec<Vec<f64>>,
}

impl Histogram2d {
    /// Fill `bins.0 × bins.1` equal-area cells.  A pair is counted only when
    /// both coordinates fall inside their range.  With `density` the
    /// histogram integrates to one over the plane.
    pub fn fill(
        x: &[f64],
        y: &[f64],
        bins: (usize, usize),
        xrange: (f64, f64),
        yrange: (f64, f64),
        density: bool,
    ) -> Result<Self, ShapeError> {
        if x.len() != y.len() {
            return Err(ShapeError {
                x: x.len(),
                y: y.len(),
            });
        }
        let bx = Binning::new(bins.0, xrange);
        let by = Binning::new(bins.1, yrange);
        let mut values = vec![vec![0.0; by.bins]; bx.bins];
        for (&xv, &yv) in x.iter().zip(y) {
            if let (Some(ix), Some(iy)) = (bx.index(xv), by.index(yv)) {
                values[ix][iy] += 1.0;
            }
        }

        if density {
            let total: f64 = values.iter().flatten().sum();
            if total > 0.0 {
                let area = bx.width * by.width;
                for value in values.iter_mut().flatten() {
                    *value /= total * area;
                }
            }
        }
        Ok(Self {
            x_edges: bx.edges(),
            y_edges: by.edges(),
            values,
        })
    }

    /// `(x low, x high, y low, y high, value)` per cell, x-major.
    pub fn cells(&self) -> impl Iterator<Item = (f64, f64, f64, f64, f64)> + '_ {
        self.x_edges
            .windows(2)
            .zip(&self.values)
            .flat_map(move |(xe, column)| {
                self.y_edges
                    .windows(2)
                    .zip(column)
                    .map(move |(ye, &v)| (xe[0], xe[1], ye[0], ye[1], v))
            })
    }
}

// ---------------------------------------------------------------------------
// Element-wise operations on an x and optional y sequence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// Use x alone.
    X,
    #[default]
    Subtract,
    Sum,
    Mean,
    Rms,
}

impl Operation {
    pub fn apply(self, x: &[f64], y: Option<&[f64]>) -> Result<Vec<f64>, ShapeError> {
        let Some(y) = y else {
            return Ok(x.to_vec());
        };
        if x.len() != y.len() {
            return Err(ShapeError {
                x: x.len(),
                y: y.len(),
            });
        }
        let pairs = x.iter().zip(y);
        Ok(match self {
            Operation::X => x.to_vec(),
            Operation::Subtract => pairs.map(|(a, b)| a - b).collect(),
            Operation::Sum => pairs.map(|(a, b)| a + b).collect(),
            Operation::Mean => pairs.map(|(a, b)| (a + b) / 2.0).collect(),
            Operation::Rms => pairs.map(|(a, b)| ((a * a + b * b) / 2.0).sqrt()).collect(),
        })
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" | "none" => Ok(Operation::X),
            "subtract" => Ok(Operation::Subtract),
            "sum" => Ok(Operation::Sum),
            "mean" => Ok(Operation::Mean),
            "rms" => Ok(Operation::Rms),
            _ => Err(format!("unknown operation '{s}'")),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::X => "x",
            Operation::Subtract => "subtract",
            Operation::Sum => "sum",
            Operation::Mean => "mean",
            Operation::Rms => "rms",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Mean ± error
// ---------------------------------------------------------------------------

/// Mean of `values` and the propagated error `sqrt(Σe²) / n`.
pub fn mean_with_error(values: &[f64], errors: Option<&[f64]>) -> Option<(f64, Option<f64>)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let error = errors
        .filter(|e| !e.is_empty())
        .map(|e| e.iter().map(|v| v * v).sum::<f64>().sqrt() / e.len() as f64);
    Some((mean, error))
}

/// Format a mean with its error, choosing the precision from the error's
/// leading digit: `0.953 (0.021)`.  Without a usable error two decimals.
pub fn format_with_error(mean: f64, error: Option<f64>) -> String {
    match error {
        Some(e) if e != 0.0 && e.is_finite() => {
            let magnitude = -(e.abs().log10().floor() as i32) + 1;
            let decimals = magnitude.max(1) as usize;
            format!("{mean:.decimals$} ({e:.decimals$})")
        }
        _ => format!("{mean:.2}"),
    }
}
