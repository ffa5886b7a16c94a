use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use super::PlotMeta;
use crate::data::model::{ColumnKind, Value};
use crate::fit::{FitMetadata, Residuals};
use crate::selection::Subset;
use crate::stats::{Histogram, Histogram2d};

/// Create `path` (and its parent directories) and write the metadata header.
fn create_with_header(path: &Path, meta: &PlotMeta) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for line in meta.header_lines() {
        writeln!(out, "{line}")?;
    }
    Ok(out)
}

fn cell_text(value: &Value) -> String {
    if value.is_null() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Write the scalar columns of every non-empty subset, stacked, with a
/// leading `series` column naming the subset.  List columns are left out.
pub fn write_subsets(path: &Path, meta: &PlotMeta, subsets: &[Subset]) -> Result<usize> {
    let Some(first) = subsets.iter().find(|s| !s.is_empty()) else {
        return Ok(0);
    };
    let columns: Vec<(usize, String)> = first
        .table
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind != ColumnKind::List)
        .map(|(i, f)| (i, f.name.clone()))
        .collect();

    let out = create_with_header(path, meta)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(
        std::iter::once("series").chain(columns.iter().map(|(_, name)| name.as_str())),
    )?;

    let mut written = 0;
    for subset in subsets.iter().filter(|s| !s.is_empty()) {
        let label = subset.label().unwrap_or_default();
        for row in subset.table.rows() {
            let mut record = vec![label.clone()];
            record.extend(columns.iter().map(|&(i, _)| cell_text(&row[i])));
            writer.write_record(&record)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}

/// Write `series,bin_low,bin_high,value` rows for each labelled histogram.
pub fn write_histograms(path: &Path, meta: &PlotMeta, series: &[(String, Histogram)]) -> Result<()> {
    let out = create_with_header(path, meta)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["series", "bin_low", "bin_high", "value"])?;
    for (label, hist) in series {
        for (lo, hi, value) in hist.bins() {
            writer.write_record([label.clone(), lo.to_string(), hi.to_string(), value.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write `series,x_low,x_high,y_low,y_high,value` rows for each labelled
/// 2D histogram.
pub fn write_histograms2d(
    path: &Path,
    meta: &PlotMeta,
    series: &[(String, Histogram2d)],
) -> Result<()> {
    let out = create_with_header(path, meta)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["series", "x_low", "x_high", "y_low", "y_high", "value"])?;
    for (label, hist) in series {
        for (x0, x1, y0, y1, value) in hist.cells() {
            writer.write_record([
                label.clone(),
                x0.to_string(),
                x1.to_string(),
                y0.to_string(),
                y1.to_string(),
                value.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write data, fit and residuals point by point.  Fit parameters and
/// chi-square go to the header.
pub fn write_fit(
    path: &Path,
    meta: &PlotMeta,
    fit: &FitMetadata,
    x: &[f64],
    y: &[f64],
    residuals: &Residuals,
    show_chi2: bool,
) -> Result<()> {
    let mut out = create_with_header(path, meta)?;
    writeln!(
        out,
        "# fit: {}",
        fit.label.as_deref().unwrap_or(fit.function.name())
    )?;
    for line in fit.parameter_lines() {
        writeln!(out, "# {line}")?;
    }
    if show_chi2 {
        writeln!(out, "# chi2/ndof: {:.2}/{}", residuals.chi2, residuals.ndof)?;
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["x", "y", "fit", "residual", "residual_error", "used"])?;
    for i in 0..x.len() {
        let residual_error = residuals
            .residual_error
            .as_ref()
            .map(|e| e[i].to_string())
            .unwrap_or_default();
        writer.write_record([
            x[i].to_string(),
            y[i].to_string(),
            residuals.fit[i].to_string(),
            residuals.residual[i].to_string(),
            residual_error,
            residuals.used[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
