use std::path::Path;

use anyhow::{Context, Result};

use crate::data::explode::ERROR_SUFFIX;
use crate::data::model::{ResultTable, Value};
use crate::stats::{format_with_error, mean_with_error};

/// A configuration × variable table of `mean (error)` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanTable {
    /// Optional spanning title over the variable columns.
    pub title: Option<String>,
    /// `Configuration` followed by one header per variable.
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Aggregate an exploded table per `(Geometry, Config, <variable_column>)`.
///
/// Each group yields `mean(y)` and `sqrt(Σe²)/n`, where `e` is the
/// `<y>Error` column or, when the table has none, `y` itself.  Rows are configurations in first-appearance order, labelled
/// `GEOMETRY Config`; columns follow `variables`, or the variables' order of
/// appearance when `variables` is empty.  Configurations with no cell are
/// dropped.
pub fn mean_table(
    table: &ResultTable,
    y: &str,
    variable_column: &str,
    variables: &[String],
    title: Option<&str>,
) -> MeanTable {
    let error_column = format!("{y}{ERROR_SUFFIX}");
    let error_column = if table.has_column(&error_column) {
        error_column
    } else {
        y.to_string()
    };
    let text = |row: usize, column: &str| -> String {
        match table.value(row, column) {
            Some(v) if !v.is_null() => v.to_string(),
            _ => String::new(),
        }
    };

    let mut configs: Vec<(String, String)> = Vec::new();
    let mut seen_variables: Vec<String> = Vec::new();
    // (config index, variable) -> (values, errors)
    let mut groups: Vec<((usize, String), (Vec<f64>, Vec<f64>))> = Vec::new();

    for row in 0..table.len() {
        let Some(value) = table.value(row, y).and_then(Value::as_f64) else {
            continue;
        };
        let config = (text(row, "Geometry"), text(row, "Config"));
        let config_idx = match configs.iter().position(|c| *c == config) {
            Some(i) => i,
            None => {
                configs.push(config);
                configs.len() - 1
            }
        };
        let variable = text(row, variable_column);
        if !seen_variables.contains(&variable) {
            seen_variables.push(variable.clone());
        }
        let key = (config_idx, variable);
        let slot = match groups.iter().position(|(k, _)| *k == key) {
            Some(i) => i,
            None => {
                groups.push((key, (Vec::new(), Vec::new())));
                groups.len() - 1
            }
        };
        let (values, errors) = &mut groups[slot].1;
        values.push(value);
        if let Some(e) = table.value(row, &error_column).and_then(Value::as_f64) {
            errors.push(e);
        }
    }

    let columns: Vec<String> = if variables.is_empty() {
        seen_variables
    } else {
        variables.to_vec()
    };

    let mut rows = Vec::new();
    for (config_idx, (geometry, config)) in configs.iter().enumerate() {
        let cells: Vec<String> = columns
            .iter()
            .map(|variable| {
                groups
                    .iter()
                    .find(|((c, v), _)| *c == config_idx && v == variable)
                    .and_then(|(_, (values, errors))| {
                        let errors = (errors.len() == values.len()).then_some(errors.as_slice());
                        mean_with_error(values, errors)
                    })
                    .map(|(mean, error)| format_with_error(mean, error))
                    .unwrap_or_default()
            })
            .collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        let label = format!("{} {config}", geometry.to_uppercase());
        let mut row = vec![label.trim().to_string()];
        row.extend(cells);
        rows.push(row);
    }

    let mut header = vec!["Configuration".to_string()];
    header.extend(columns);
    MeanTable {
        title: title.map(str::to_string),
        header,
        rows,
    }
}

/// Characters LaTeX treats specially in configuration labels.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '_' | '#' | '%' | '&' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

impl MeanTable {
    /// Render a booktabs `tabular`: `l` for the label column, `c` for the rest.
    /// `emph` / `italic` wrap every body cell of that column index.
    pub fn to_latex(&self, emph: Option<usize>, italic: Option<usize>) -> String {
        let ncols = self.header.len();
        let mut out = String::new();
        out.push_str(&format!(
            "\\begin{{tabular}}{{l{}}}\n\\toprule\n",
            "c".repeat(ncols.saturating_sub(1))
        ));
        if let Some(title) = &self.title {
            out.push_str(&format!(
                " & \\multicolumn{{{}}}{{c}}{{{title}}} \\\\\n",
                ncols.saturating_sub(1)
            ));
        }
        out.push_str(&self.header.join(" & "));
        out.push_str(" \\\\\n\\midrule\n");
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let mut cell = if i == 0 { escape(cell) } else { cell.clone() };
                    if italic == Some(i) {
                        cell = format!("\\textit{{{cell}}}");
                    }
                    if emph == Some(i) {
                        cell = format!("\\emph{{{cell}}}");
                    }
                    cell
                })
                .collect();
            out.push_str(&cells.join(" & "));
            out.push_str(" \\\\\n");
        }
        out.push_str("\\bottomrule\n\\end{tabular}\n");
        out
    }

    /// Plain aligned text for the terminal.
    pub fn to_text(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, &w)| format!("{c:>w$}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut out = line(self.header.as_slice());
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row.as_slice()));
        }
        out
    }

    pub fn write(&self, path: &Path, emph: Option<usize>, italic: Option<usize>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, self.to_latex(emph, italic))
            .with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exploded() -> ResultTable {
        let row = |geo: &str, config: &str, var: &str, v: f64, e: f64| -> Vec<Value> {
            vec![geo.into(), config.into(), var.into(), v.into(), e.into()]
        };
        ResultTable::from_rows(
            vec![
                "Geometry".into(),
                "Config".into(),
                "Variable".into(),
                "Efficiency".into(),
                "EfficiencyError".into(),
            ],
            vec![
                row("hd", "hd_1x2x6", "X", 90.0, 3.0),
                row("hd", "hd_1x2x6", "X", 100.0, 4.0),
                row("hd", "hd_1x2x6", "Y", 80.0, 0.0),
                row("vd", "vd_1x8x14", "Y", 70.0, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn values_stand_in_for_a_missing_error_column() {
        let table = exploded();
        let rows = table.rows().iter().map(|r| r[..4].to_vec()).collect();
        let names = table.column_names().take(4).map(str::to_string).collect();
        let without_errors = ResultTable::from_rows(names, rows).unwrap();

        let mean = mean_table(&without_errors, "Efficiency", "Variable", &[], None);
        assert_eq!(
            mean.rows,
            [
                vec!["HD hd_1x2x6".to_string(), "95.0 (67.3)".into(), "80.0 (80.0)".into()],
                vec!["VD vd_1x8x14".to_string(), String::new(), "70.0 (70.0)".into()],
            ]
        );
    }

    #[test]
    fn groups_are_pivoted_by_configuration() {
        let table = mean_table(
            &exploded(),
            "Efficiency",
            "Variable",
            &["X".into(), "Y".into()],
            Some("Coordinate"),
        );
        assert_eq!(table.header, ["Configuration", "X", "Y"]);
        assert_eq!(
            table.rows,
            [
                vec!["HD hd_1x2x6".to_string(), "95.0 (2.5)".into(), "80.00".into()],
                vec!["VD vd_1x8x14".to_string(), String::new(), "70.00".into()],
            ]
        );
    }

    #[test]
    fn configurations_without_requested_variables_are_dropped() {
        let table = mean_table(&exploded(), "Efficiency", "Variable", &["X".into()], None);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn latex_has_spanning_title_and_emphasis() {
        let table = mean_table(
            &exploded(),
            "Efficiency",
            "Variable",
            &["X".into(), "Y".into()],
            Some("Coordinate"),
        );
        let latex = table.to_latex(Some(0), None);
        assert!(latex.starts_with("\\begin{tabular}{lcc}\n"));
        assert!(latex.contains(" & \\multicolumn{2}{c}{Coordinate} \\\\\n"));
        assert!(latex.contains("\\emph{HD hd\\_1x2x6} & 95.0 (2.5) & 80.00 \\\\\n"));
        assert!(latex.ends_with("\\end{tabular}\n"));
    }
}
