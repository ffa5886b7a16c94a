use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::selection::{SelectionRequest, DEFAULT_REDUCE_THRESHOLD, VARIABLE_COLUMN};
use crate::stats::Operation;

#[derive(Debug, Clone, Parser)]
#[command(name = "rusty-select", version, about, long_about = None)]
#[command(args_override_self = true)]
pub struct Opt {
    /// Directory holding the `<config>_<name>_<datafile>` result tables
    #[arg(long, default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Output directory (default: `plots` for series, `tables` for LaTeX)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Opt {
    pub fn loglevel(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write one series per iterable value of the selected columns
    Scan(ScanArgs),
    /// Histogram an exploded column, or an operation on two of them
    Hist(HistArgs),
    /// Joint histogram of two exploded columns
    Hist2d(Hist2dArgs),
    /// Pivot mean (error) per configuration and variable into a LaTeX table
    Table(TableArgs),
    /// Evaluate stored fits against their data and write residuals
    Fit(FitArgs),
    /// Run every job of a JSON job file, continuing past failures
    Batch(BatchArgs),
}

/// Which result tables to read.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Configurations, e.g. `hd_1x2x6`
    #[arg(long, num_args = 1..)]
    pub configs: Vec<String>,

    /// Simulation names, e.g. `marley`
    #[arg(short = 'n', long = "names", alias = "name", num_args = 1..)]
    pub names: Vec<String>,

    /// Data file tag, the last part of the file stem
    #[arg(long)]
    pub datafile: String,
}

/// Row selection shared by every command.
#[derive(Debug, Clone, Args)]
pub struct SelectArgs {
    /// Values of the variable column to plot, one figure (or table column) each
    #[arg(short = 'v', long, num_args = 1..)]
    pub variables: Vec<String>,

    /// Name of the variable column
    #[arg(long, default_value = VARIABLE_COLUMN)]
    pub variable_column: String,

    /// Column whose distinct values become separate series
    #[arg(short = 'i', long)]
    pub iterable: Option<String>,

    /// Column whose values become the series of each figure; the iterable
    /// then splits figures instead of series
    #[arg(short = 'c', long)]
    pub comparable: Option<String>,

    /// Columns to filter on, paired with `--save_values`
    #[arg(long, num_args = 1..)]
    pub select: Vec<String>,

    /// Values for `--select`; without `--select`, iterable values to keep
    #[arg(short = 's', long = "save_values", alias = "save-values", num_args = 1..)]
    pub save_values: Vec<String>,

    /// Derive the x range from these percentiles
    #[arg(short = 'p', long, num_args = 2, value_names = ["LO", "HI"])]
    pub percentile: Option<Vec<f64>>,

    /// Drop exploded rows whose x lies outside this range
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    pub rangex: Option<Vec<f64>>,

    #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
    pub rangey: Option<Vec<f64>>,

    /// Skip every other iterable value when there are many
    #[arg(long)]
    pub reduce: bool,

    #[arg(long, default_value_t = DEFAULT_REDUCE_THRESHOLD)]
    pub reduce_threshold: usize,
}

fn pair(values: &Option<Vec<f64>>) -> Option<(f64, f64)> {
    match values.as_deref() {
        Some(&[lo, hi]) => Some((lo, hi)),
        _ => None,
    }
}

impl SelectArgs {
    pub fn percentile_range(&self) -> Option<(f64, f64)> {
        pair(&self.percentile)
    }

    pub fn rangex(&self) -> Option<(f64, f64)> {
        pair(&self.rangex)
    }

    pub fn rangey(&self) -> Option<(f64, f64)> {
        pair(&self.rangey)
    }

    /// Whether `--save_values` lists iterable values rather than filter values.
    pub fn saves_iterable_values(&self) -> bool {
        self.select.is_empty() && !self.save_values.is_empty()
    }

    /// Request for one figure over `configs`, restricted to `variable`.
    pub fn request(
        &self,
        configs: Vec<String>,
        names: &[String],
        variable: Option<&str>,
        payload: Vec<String>,
    ) -> SelectionRequest {
        let (select_keys, select_values) = if self.saves_iterable_values() {
            (Vec::new(), Vec::new())
        } else {
            (self.select.clone(), self.save_values.clone())
        };
        SelectionRequest {
            configs,
            names: names.to_vec(),
            variable: variable.map(str::to_string),
            variable_column: self.variable_column.clone(),
            iterable_column: self.iterable.clone(),
            comparable_column: self.comparable.clone(),
            select_keys,
            select_values,
            payload_columns: payload,
            percentile_range: self.percentile_range(),
            numeric_range: self.rangex(),
            reduce: self.reduce,
            reduce_threshold: self.reduce_threshold,
        }
    }

    /// `key value` tokens of the select filters, for artifact names.
    pub fn select_tokens(&self) -> Vec<String> {
        if self.saves_iterable_values() {
            return Vec::new();
        }
        self.select
            .iter()
            .zip(&self.save_values)
            .map(|(k, v)| format!("{k}{v}"))
            .collect()
    }
}

/// Axis columns, labels and scales.
#[derive(Debug, Clone, Args)]
pub struct AxisArgs {
    #[arg(short = 'x', long = "x")]
    pub x: Option<String>,

    #[arg(short = 'y', long = "y")]
    pub y: Option<String>,

    #[arg(long)]
    pub labelx: Option<String>,

    #[arg(long)]
    pub labely: Option<String>,

    #[arg(long)]
    pub logx: bool,

    #[arg(long)]
    pub logy: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub axis: AxisArgs,
}

#[derive(Debug, Clone, Args)]
pub struct HistArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub axis: AxisArgs,

    /// How x and y are combined before histogramming
    #[arg(long, default_value_t = Operation::default())]
    pub operation: Operation,

    #[arg(short = 'b', long, default_value_t = 50)]
    pub bins: usize,

    /// Normalise each histogram to unit area
    #[arg(long)]
    pub density: bool,
}

#[derive(Debug, Clone, Args)]
pub struct Hist2dArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub axis: AxisArgs,

    /// Bins along x and y
    #[arg(short = 'b', long, num_args = 1..=2, default_values_t = [50])]
    pub bins: Vec<usize>,

    /// Plain counts instead of a unit-volume density
    #[arg(long)]
    pub counts: bool,
}

impl Hist2dArgs {
    /// `(x bins, y bins)`; a single value applies to both axes.
    pub fn bins(&self) -> (usize, usize) {
        match self.bins.as_slice() {
            [x, y, ..] => (*x, *y),
            [n] => (*n, *n),
            [] => (50, 50),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub axis: AxisArgs,

    /// Spanning title over the variable columns
    #[arg(short = 't', long)]
    pub variable_title: Option<String>,

    /// Column index to typeset with `\emph`
    #[arg(long)]
    pub emph: Option<usize>,

    /// Column index to typeset with `\textit`
    #[arg(long = "it")]
    pub italic: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct FitArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub select: SelectArgs,
    #[command(flatten)]
    pub axis: AxisArgs,

    /// Report chi-square per degree of freedom
    #[arg(long)]
    pub chi2: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BatchArgs {
    /// JSON array of jobs, each an argument list or a command line
    pub jobs: PathBuf,
}
