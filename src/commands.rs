//! Command runners: load the requested tables, run the selection pipeline
//! once per figure and hand the subsets to the output layer.
//!
//! A failing figure is logged and the remaining figures still run; the
//! command reports the failure count at the end.  "No data" is not a failure.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::cli::{
    AxisArgs, Command, FitArgs, Hist2dArgs, HistArgs, Opt, ScanArgs, SelectArgs, TableArgs,
};
use crate::data::explode::ERROR_SUFFIX;
use crate::data::filter::coerce;
use crate::data::loader::load_sources;
use crate::data::model::{ColumnKind, ResultTable, Value};
use crate::fit::{residuals, FitMetadata};
use crate::output::latex::mean_table;
use crate::output::series::{write_fit, write_histograms, write_histograms2d, write_subsets};
use crate::output::{artifact_name, iterable_token, PlotMeta};
use crate::selection::{select, Subset};
use crate::stats::{percentile_range, Histogram, Histogram2d, Operation};

pub const PLOTS_DIR: &str = "plots";
pub const TABLES_DIR: &str = "tables";

pub fn run(opt: &Opt) -> Result<()> {
    match &opt.command {
        Command::Scan(args) => scan(opt, args),
        Command::Hist(args) => hist(opt, args),
        Command::Hist2d(args) => hist2d(opt, args),
        Command::Table(args) => table(opt, args),
        Command::Fit(args) => fit(opt, args),
        Command::Batch(args) => batch(opt, &args.jobs),
    }
}

// ---------------------------------------------------------------------------
// Figure bookkeeping
// ---------------------------------------------------------------------------

/// One output artifact: a configuration (or all of them) and a variable.
#[derive(Debug, Clone)]
struct Figure {
    config: Option<String>,
    variable: Option<String>,
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [self.config.as_deref(), self.variable.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            f.write_str("all rows")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

impl Figure {
    fn configs(&self) -> Vec<String> {
        self.config.iter().cloned().collect()
    }
}

/// One figure per configuration and variable.  Without configurations the
/// whole table is one figure; without variables the variable is left open.
fn figures(configs: &[String], variables: &[String]) -> Vec<Figure> {
    let configs: Vec<Option<String>> = if configs.is_empty() {
        vec![None]
    } else {
        configs.iter().cloned().map(Some).collect()
    };
    let variables: Vec<Option<String>> = if variables.is_empty() {
        vec![None]
    } else {
        variables.iter().cloned().map(Some).collect()
    };
    configs
        .iter()
        .flat_map(|config| {
            variables.iter().map(move |variable| Figure {
                config: config.clone(),
                variable: variable.clone(),
            })
        })
        .collect()
}

/// Run `job` for every figure, logging failures instead of stopping.
fn for_each_figure(
    figures: &[Figure],
    mut job: impl FnMut(&Figure) -> Result<()>,
) -> Result<()> {
    let mut failed = 0;
    for figure in figures {
        if let Err(err) = job(figure) {
            error!("{figure}: {err:#}");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} figures failed", figures.len());
    }
    Ok(())
}

fn output_dir(opt: &Opt, default: &str) -> PathBuf {
    opt.output.clone().unwrap_or_else(|| PathBuf::from(default))
}

/// Load the requested sources.  `None` means there was nothing to load.
fn load(opt: &Opt, configs: &[String], names: &[String], datafile: &str) -> Result<Option<ResultTable>> {
    let table = load_sources(&opt.data_dir, configs, names, datafile)?;
    if table.is_empty() {
        println!("No data to plot. Exiting.");
        return Ok(None);
    }
    Ok(Some(table))
}

/// Without `--select`, `--save_values` lists the iterable values to keep.
/// Each value is read in the iterable column's type, so `10.0` and `10`
/// both keep a floating `10`.
fn keep_saved(subsets: Vec<Subset>, select: &SelectArgs) -> Vec<Subset> {
    if !select.saves_iterable_values() {
        return subsets;
    }
    subsets
        .into_iter()
        .filter(|s| match &s.iterable {
            Some((column, value)) => {
                let kind = s.table.kind(column).unwrap_or(ColumnKind::Mixed);
                select
                    .save_values
                    .iter()
                    .filter_map(|raw| coerce(kind, raw))
                    .any(|predicate| predicate.matches(value))
            }
            None => true,
        })
        .collect()
}

/// Subsets written to one artifact.
struct Panel {
    iterable: Option<(String, Value)>,
    subsets: Vec<Subset>,
}

impl Panel {
    fn is_empty(&self) -> bool {
        self.subsets.iter().all(Subset::is_empty)
    }

    /// Title with the panel's iterable value appended, if it has one.
    fn title(&self, base: String) -> String {
        match &self.iterable {
            Some((column, value)) => format!("{base} ({column}={value})"),
            None => base,
        }
    }

    fn token(&self) -> Option<String> {
        self.iterable
            .as_ref()
            .map(|(column, value)| iterable_token(column, value))
    }
}

/// With a comparable column every iterable value gets its own artifact and
/// the comparable values are its series.  Otherwise the iterable values are
/// the series of a single artifact.
fn panels(subsets: Vec<Subset>, split: bool) -> Vec<Panel> {
    if !split {
        return vec![Panel {
            iterable: None,
            subsets,
        }];
    }
    let mut panels: Vec<Panel> = Vec::new();
    for subset in subsets {
        match panels.iter().position(|p| p.iterable == subset.iterable) {
            Some(i) => panels[i].subsets.push(subset),
            None => panels.push(Panel {
                iterable: subset.iterable.clone(),
                subsets: vec![subset],
            }),
        }
    }
    panels
}

fn numeric_column(table: &ResultTable, column: &str) -> Result<Vec<f64>> {
    table
        .column_f64(column)
        .with_context(|| format!("column {column} missing"))
}

fn title(datafile: &str, config: Option<&str>) -> String {
    let datafile = datafile.replace('_', " ");
    match config {
        Some(config) => format!("{datafile} - {config}"),
        None => datafile,
    }
}

fn plot_meta(axis: &AxisArgs, title: String, rangex: Option<(f64, f64)>, rangey: Option<(f64, f64)>) -> PlotMeta {
    PlotMeta {
        title,
        labelx: axis.labelx.clone().or_else(|| axis.x.clone()),
        labely: axis.labely.clone().or_else(|| axis.y.clone()),
        logx: axis.logx,
        logy: axis.logy,
        rangex,
        rangey,
    }
}

/// Name tokens shared by every artifact of a figure.
fn figure_tokens(figure: &Figure, names: &[String], datafile: &str, select: &SelectArgs) -> Vec<String> {
    let mut tokens: Vec<String> = figure.config.iter().cloned().collect();
    tokens.extend(names.iter().cloned());
    tokens.push(datafile.to_string());
    tokens.extend(figure.variable.iter().cloned());
    tokens.extend(select.iterable.iter().cloned());
    tokens.extend(select.comparable.iter().cloned());
    tokens.extend(select.select_tokens());
    tokens
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn scan(opt: &Opt, args: &ScanArgs) -> Result<()> {
    let source = &args.source;
    let Some(table) = load(opt, &source.configs, &source.names, &source.datafile)? else {
        return Ok(());
    };
    let payload: Vec<String> = [&args.axis.x, &args.axis.y]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let dir = output_dir(opt, PLOTS_DIR);

    for_each_figure(&figures(&source.configs, &args.select.variables), |figure| {
        let request = args.select.request(
            figure.configs(),
            &source.names,
            figure.variable.as_deref(),
            payload.clone(),
        );
        let subsets = keep_saved(select(&table, &request)?, &args.select);
        let mut written = 0;
        for panel in panels(subsets, args.select.comparable.is_some()) {
            if panel.is_empty() {
                continue;
            }
            let rangex = args
                .select
                .rangex()
                .or_else(|| panel.subsets.iter().find_map(|s| s.range));
            let meta = plot_meta(
                &args.axis,
                panel.title(title(&source.datafile, figure.config.as_deref())),
                rangex,
                args.select.rangey(),
            );
            let mut tokens = figure_tokens(figure, &source.names, &source.datafile, &args.select);
            tokens.extend(panel.token());
            let path = dir.join(format!("{}.csv", artifact_name(tokens, "scan")));
            let rows = write_subsets(&path, &meta, &panel.subsets)?;
            info!("Saved {rows} rows to {}", path.display());
            written += 1;
        }
        if written == 0 {
            println!("No data for {figure}, skipping.");
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// hist
// ---------------------------------------------------------------------------

fn hist(opt: &Opt, args: &HistArgs) -> Result<()> {
    let Some(x) = args.axis.x.clone() else {
        bail!("hist needs an x column (-x)");
    };
    let y = args.axis.y.clone();
    let combined = y.is_some() && args.operation != Operation::X;
    let source = &args.source;
    let Some(table) = load(opt, &source.configs, &source.names, &source.datafile)? else {
        return Ok(());
    };
    let payload: Vec<String> = std::iter::once(x.clone()).chain(y.clone()).collect();
    let dir = output_dir(opt, PLOTS_DIR);

    for_each_figure(&figures(&source.configs, &args.select.variables), |figure| {
        let request = args.select.request(
            figure.configs(),
            &source.names,
            figure.variable.as_deref(),
            payload.clone(),
        );
        let subsets = keep_saved(select(&table, &request)?, &args.select);
        let mut written = 0;
        for panel in panels(subsets, args.select.comparable.is_some()) {
            let mut series: Vec<(String, Vec<f64>, Option<(f64, f64)>)> = Vec::new();
            for subset in panel.subsets.iter().filter(|s| !s.is_empty()) {
                let xs = numeric_column(&subset.table, &x)?;
                let ys = match &y {
                    Some(y) => Some(numeric_column(&subset.table, y)?),
                    None => None,
                };
                let data = args.operation.apply(&xs, ys.as_deref())?;
                let label = subset
                    .label()
                    .unwrap_or_else(|| source.datafile.replace('_', " "));
                series.push((label, data, subset.range));
            }
            if series.is_empty() {
                continue;
            }

            // One range for every series of the panel, taken from the first.
            let (_, first, first_range) = &series[0];
            let range = args
                .select
                .rangex()
                .or(if combined { None } else { *first_range })
                .or_else(|| {
                    args.select
                        .percentile_range()
                        .and_then(|p| percentile_range(first, p))
                })
                .or_else(|| percentile_range(first, (0.0, 100.0)))
                .context("no finite values to histogram")?;
            debug!("{figure}: histogram range {range:?}");

            let histograms: Vec<(String, Histogram)> = series
                .into_iter()
                .map(|(label, data, _)| {
                    let hist = Histogram::fill(&data, args.bins, range, args.density);
                    (label, hist)
                })
                .collect();

            let mut meta = plot_meta(
                &args.axis,
                panel.title(title(&source.datafile, figure.config.as_deref())),
                Some(range),
                args.select.rangey(),
            );
            if combined {
                meta.labelx = args
                    .axis
                    .labelx
                    .clone()
                    .or_else(|| y.as_ref().map(|y| format!("{} {x} {y}", args.operation)));
            }
            meta.labely = args
                .axis
                .labely
                .clone()
                .or_else(|| Some(if args.density { "Density" } else { "Counts" }.to_string()));

            let mut tokens = figure_tokens(figure, &source.names, &source.datafile, &args.select);
            tokens.push(x.clone());
            if combined {
                tokens.push(args.operation.to_string());
                tokens.extend(y.clone());
            }
            tokens.extend(panel.token());
            let path = dir.join(format!("{}.csv", artifact_name(tokens, "hist")));
            write_histograms(&path, &meta, &histograms)?;
            info!("Saved {} histograms to {}", histograms.len(), path.display());
            written += 1;
        }
        if written == 0 {
            println!("No data for {figure}, skipping.");
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// hist2d
// ---------------------------------------------------------------------------

fn hist2d(opt: &Opt, args: &Hist2dArgs) -> Result<()> {
    let (Some(x), Some(y)) = (args.axis.x.clone(), args.axis.y.clone()) else {
        bail!("hist2d needs both x and y columns (-x, -y)");
    };
    let source = &args.source;
    let Some(table) = load(opt, &source.configs, &source.names, &source.datafile)? else {
        return Ok(());
    };
    let payload = vec![x.clone(), y.clone()];
    let percentiles = args.select.percentile_range().unwrap_or((0.0, 100.0));
    let dir = output_dir(opt, PLOTS_DIR);

    for_each_figure(&figures(&source.configs, &args.select.variables), |figure| {
        let request = args.select.request(
            figure.configs(),
            &source.names,
            figure.variable.as_deref(),
            payload.clone(),
        );
        let subsets = keep_saved(select(&table, &request)?, &args.select);
        let mut written = 0;
        for panel in panels(subsets, args.select.comparable.is_some()) {
            let mut histograms: Vec<(String, Histogram2d)> = Vec::new();
            for subset in panel.subsets.iter().filter(|s| !s.is_empty()) {
                let xs = numeric_column(&subset.table, &x)?;
                let ys = numeric_column(&subset.table, &y)?;
                let label = subset
                    .label()
                    .unwrap_or_else(|| source.datafile.replace('_', " "));
                // Each series is binned over its own range.
                let xrange = subset.range.or_else(|| percentile_range(&xs, percentiles));
                let yrange = args
                    .select
                    .rangey()
                    .or_else(|| percentile_range(&ys, percentiles));
                let (Some(xrange), Some(yrange)) = (xrange, yrange) else {
                    warn!("{figure}: {label} has no finite {x}/{y} values, skipping");
                    continue;
                };
                debug!("{figure}: {label} binned over {xrange:?} x {yrange:?}");
                let hist = Histogram2d::fill(&xs, &ys, args.bins(), xrange, yrange, !args.counts)?;
                histograms.push((label, hist));
            }
            if histograms.is_empty() {
                continue;
            }

            let meta = plot_meta(
                &args.axis,
                panel.title(title(&source.datafile, figure.config.as_deref())),
                args.select.rangex(),
                args.select.rangey(),
            );
            let mut tokens = figure_tokens(figure, &source.names, &source.datafile, &args.select);
            tokens.push(x.clone());
            tokens.push(y.clone());
            tokens.extend(panel.token());
            let path = dir.join(format!("{}.csv", artifact_name(tokens, "hist2d")));
            write_histograms2d(&path, &meta, &histograms)?;
            info!("Saved {} 2D histograms to {}", histograms.len(), path.display());
            written += 1;
        }
        if written == 0 {
            println!("No data for {figure}, skipping.");
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// table
// ---------------------------------------------------------------------------

fn table(opt: &Opt, args: &TableArgs) -> Result<()> {
    let Some(y) = args.axis.y.clone() else {
        bail!("table needs a y column (-y)");
    };
    let source = &args.source;
    let Some(loaded) = load(opt, &source.configs, &source.names, &source.datafile)? else {
        return Ok(());
    };
    let payload: Vec<String> = args.axis.x.iter().cloned().chain([y.clone()]).collect();
    let variables: Vec<Option<&str>> = if args.select.variables.is_empty() {
        vec![None]
    } else {
        args.select.variables.iter().map(|v| Some(v.as_str())).collect()
    };

    // One table per iterable value, each collecting every variable's rows.
    let mut groups: Vec<(Option<(String, Value)>, Vec<ResultTable>)> = Vec::new();
    for variable in variables {
        let request = args.select.request(
            source.configs.clone(),
            &source.names,
            variable,
            payload.clone(),
        );
        for subset in keep_saved(select(&loaded, &request)?, &args.select) {
            match groups.iter().position(|(key, _)| *key == subset.iterable) {
                Some(i) => groups[i].1.push(subset.table),
                None => groups.push((subset.iterable, vec![subset.table])),
            }
        }
    }

    let dir = output_dir(opt, TABLES_DIR);
    let mut written = 0;
    for (iterable, tables) in groups {
        let merged = ResultTable::concat(tables);
        let mean = mean_table(
            &merged,
            &y,
            &args.select.variable_column,
            &args.select.variables,
            args.variable_title.as_deref(),
        );
        let label = iterable
            .as_ref()
            .map(|(c, v)| format!(" ({c}={v})"))
            .unwrap_or_default();
        if mean.rows.is_empty() {
            println!("No data for {y}{label}, skipping.");
            continue;
        }

        let mut tokens: Vec<String> = Vec::new();
        if let [config] = source.configs.as_slice() {
            tokens.push(config.clone());
        }
        tokens.extend(source.names.iter().cloned());
        tokens.push(source.datafile.clone());
        tokens.push(y.clone());
        if let Some((column, value)) = &iterable {
            tokens.push(iterable_token(column, value));
        }
        tokens.extend(args.select.select_tokens());
        let path = dir.join(format!("{}.tex", artifact_name(tokens, "table")));

        println!("{y}{label}\n{}", mean.to_text());
        mean.write(&path, args.emph, args.italic)?;
        info!("Saved table to {}", path.display());
        written += 1;
    }
    if written == 0 {
        println!("No data to tabulate.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// fit
// ---------------------------------------------------------------------------

fn fit(opt: &Opt, args: &FitArgs) -> Result<()> {
    let (Some(x), Some(y)) = (args.axis.x.clone(), args.axis.y.clone()) else {
        bail!("fit needs both x and y columns (-x, -y)");
    };
    let source = &args.source;
    let Some(table) = load(opt, &source.configs, &source.names, &source.datafile)? else {
        return Ok(());
    };
    let error_column = format!("{y}{ERROR_SUFFIX}");
    let dir = output_dir(opt, PLOTS_DIR);

    for_each_figure(&figures(&source.configs, &args.select.variables), |figure| {
        // Rows stay unexploded: every row carries its own fit.
        let request = args.select.request(
            figure.configs(),
            &source.names,
            figure.variable.as_deref(),
            Vec::new(),
        );
        let subsets = keep_saved(select(&table, &request)?, &args.select);

        let mut written = 0;
        for subset in subsets.iter().filter(|s| !s.is_empty()) {
            let rows = &subset.table;
            for row in 0..rows.len() {
                let Some(meta) = FitMetadata::from_row(rows, row)? else {
                    debug!("{figure}: row {row} has no fit");
                    continue;
                };
                let numbers = |column: &str| rows.value(row, column).and_then(Value::to_f64_vec);
                let (Some(xs), Some(ys)) = (numbers(&x), numbers(&y)) else {
                    warn!("{figure}: row {row} has no {x}/{y} sequences, skipping");
                    continue;
                };
                if ys.iter().sum::<f64>() < 1.0 {
                    info!("{figure}: row {row} has {y} summing below 1, skipping");
                    continue;
                }
                let y_err = numbers(&error_column);
                let result = residuals(meta.function, &meta.params, &xs, &ys, y_err.as_deref())?;

                let name_cell = rows
                    .value(row, "Name")
                    .filter(|v| !v.is_null())
                    .map(Value::to_string);
                let mut plot_title = title(&source.datafile, figure.config.as_deref());
                if let Some(label) = subset.label() {
                    plot_title.push_str(&format!(" ({label})"));
                }
                let meta_plot = plot_meta(
                    &args.axis,
                    plot_title,
                    args.select.rangex(),
                    args.select.rangey(),
                );

                let mut tokens: Vec<String> = figure.config.iter().cloned().collect();
                tokens.extend(name_cell);
                tokens.push(source.datafile.clone());
                tokens.extend(figure.variable.iter().cloned());
                for (column, value) in subset.iterable.iter().chain(&subset.comparable) {
                    tokens.push(iterable_token(column, value));
                }
                tokens.extend(args.select.select_tokens());
                if rows.len() > 1 {
                    tokens.push(format!("row{row}"));
                }
                let path = dir.join(format!("{}.csv", artifact_name(tokens, "fit")));
                write_fit(&path, &meta_plot, &meta, &xs, &ys, &result, args.chi2)?;
                if args.chi2 {
                    info!(
                        "{figure}: chi2/ndof = {:.2}/{} for {}",
                        result.chi2,
                        result.ndof,
                        meta.function.name()
                    );
                }
                info!("Saved fit to {}", path.display());
                written += 1;
            }
        }
        if written == 0 {
            println!("No fits for {figure}, skipping.");
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// batch
// ---------------------------------------------------------------------------

/// One job of a batch file: an argument list, or a command line split on
/// whitespace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Job {
    Args(Vec<String>),
    Line(String),
}

impl Job {
    pub fn args(&self) -> Vec<String> {
        match self {
            Job::Args(args) => args.clone(),
            Job::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

pub fn read_jobs(path: &Path) -> Result<Vec<Job>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Run every job in order.  Jobs inherit `--data-dir` and `--output` unless
/// they set their own; a failing job is logged and the next one runs.
fn batch(opt: &Opt, path: &Path) -> Result<()> {
    let jobs = read_jobs(path)?;
    let total = jobs.len();
    let mut failed = Vec::new();
    for (idx, job) in jobs.iter().enumerate() {
        let number = idx + 1;
        info!("[{number}/{total}] {job}");
        let mut argv = vec![
            "rusty-select".to_string(),
            "--data-dir".to_string(),
            opt.data_dir.display().to_string(),
        ];
        if let Some(output) = &opt.output {
            argv.push("--output".to_string());
            argv.push(output.display().to_string());
        }
        argv.extend(job.args());

        let job_opt = match Opt::try_parse_from(argv) {
            Ok(job_opt) => job_opt,
            Err(err) => {
                error!("job {number}: {err}");
                failed.push(number);
                continue;
            }
        };
        if matches!(job_opt.command, Command::Batch(_)) {
            error!("job {number}: nested batch files are not run");
            failed.push(number);
            continue;
        }
        if let Err(err) = run(&job_opt) {
            error!("job {number}: {err:#}");
            failed.push(number);
        }
    }

    if failed.is_empty() {
        info!("All {total} jobs succeeded");
        Ok(())
    } else {
        bail!("{} of {total} jobs failed: {failed:?}", failed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figures_cover_every_config_and_variable() {
        let figures = figures(&["a".into(), "b".into()], &["X".into(), "Y".into()]);
        let labels: Vec<String> = figures.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["a X", "a Y", "b X", "b Y"]);
        let whole = super::figures(&[], &[]);
        assert_eq!(whole.len(), 1);
        assert_eq!(whole[0].to_string(), "all rows");
    }

    #[test]
    fn jobs_accept_lists_and_lines() {
        let jobs: Vec<Job> =
            serde_json::from_str(r#"[["scan", "--datafile", "Cal"], "hist --datafile Cal -x Values"]"#)
                .unwrap();
        assert_eq!(jobs[0].args(), ["scan", "--datafile", "Cal"]);
        assert_eq!(jobs[1].to_string(), "hist --datafile Cal -x Values");
    }

    #[test]
    fn saved_values_are_read_in_the_column_type() {
        let table = ResultTable::from_rows(
            vec!["Energy".into()],
            vec![vec![10.0.into()], vec![20i64.into()], vec![30.0.into()]],
        )
        .unwrap();
        let opt = Opt::try_parse_from([
            "rusty-select", "scan", "--datafile", "Cal", "-i", "Energy", "-s", "10.0", "20",
        ])
        .unwrap();
        let Command::Scan(args) = opt.command else {
            panic!("expected scan");
        };
        let request = args.select.request(Vec::new(), &[], None, Vec::new());
        let kept = keep_saved(select(&table, &request).unwrap(), &args.select);
        let labels: Vec<String> = kept.iter().filter_map(Subset::label).collect();
        assert_eq!(labels, ["Energy=10", "Energy=20"]);
    }

    #[test]
    fn comparable_subsets_are_grouped_per_iterable_value() {
        let table = ResultTable::from_rows(
            vec!["Config".into(), "Hits".into()],
            vec![
                vec!["a".into(), 3i64.into()],
                vec!["b".into(), 3i64.into()],
                vec!["a".into(), 5i64.into()],
            ],
        )
        .unwrap();
        let request = crate::selection::SelectionRequest {
            iterable_column: Some("Hits".into()),
            comparable_column: Some("Config".into()),
            ..Default::default()
        };
        let grouped = panels(select(&table, &request).unwrap(), true);
        let tokens: Vec<Option<String>> = grouped.iter().map(Panel::token).collect();
        assert_eq!(tokens, [Some("Hits3".to_string()), Some("Hits5".to_string())]);
        assert_eq!(grouped[0].subsets.len(), 2);
        assert!(!grouped[1].is_empty());
        assert_eq!(grouped[1].title("Reco".into()), "Reco (Hits=5)");
        assert_eq!(panels(Vec::new(), false).len(), 1);
    }

    #[test]
    fn titles_replace_underscores() {
        assert_eq!(title("Light_Map", Some("hd_1x2x6")), "Light Map - hd_1x2x6");
        assert_eq!(title("Light_Map", None), "Light Map");
    }
}
