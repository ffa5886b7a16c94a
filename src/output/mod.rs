/// Output layer: artifact naming, plot-ready CSV series and LaTeX tables.
///
/// Rendering (figures, typesetting) happens downstream; everything written
/// here is the data a plotting front-end consumes plus the axis metadata it
/// needs, carried as `#`-prefixed header lines.
pub mod latex;
pub mod series;

use std::fmt::Display;

/// Join the non-empty tokens into a lowercase file stem ending in `suffix`.
/// `#` (as in `#Hits`) becomes `n`.
pub fn artifact_name<I, S>(tokens: I, suffix: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parts: Vec<String> = tokens
        .into_iter()
        .filter(|t| !t.as_ref().is_empty())
        .map(|t| t.as_ref().to_lowercase())
        .collect();
    if !suffix.is_empty() {
        parts.push(suffix.to_lowercase());
    }
    parts.join("_").replace('#', "n")
}

/// Token for one iterable restriction, e.g. `hits3`.
pub fn iterable_token(column: &str, value: impl Display) -> String {
    format!("{column}{value}")
}

/// Axis and title metadata for one figure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotMeta {
    pub title: String,
    pub labelx: Option<String>,
    pub labely: Option<String>,
    pub logx: bool,
    pub logy: bool,
    pub rangex: Option<(f64, f64)>,
    pub rangey: Option<(f64, f64)>,
}

impl PlotMeta {
    /// `# key: value` lines written above the CSV body.
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("# title: {}", self.title)];
        if let Some(label) = &self.labelx {
            lines.push(format!("# labelx: {label}"));
        }
        if let Some(label) = &self.labely {
            lines.push(format!("# labely: {label}"));
        }
        if self.logx {
            lines.push("# logx: true".to_string());
        }
        if self.logy {
            lines.push("# logy: true".to_string());
        }
        if let Some((lo, hi)) = self.rangex {
            lines.push(format!("# rangex: {lo} {hi}"));
        }
        if let Some((lo, hi)) = self.rangey {
            lines.push(format!("# rangey: {lo} {hi}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_lowercase_and_hash_free() {
        let name = artifact_name(
            ["hd_1x2x6", "", "Marley", iterable_token("#Hits", 3).as_str()],
            "scan",
        );
        assert_eq!(name, "hd_1x2x6_marley_nhits3_scan");
    }

    #[test]
    fn header_lists_only_set_fields() {
        let meta = PlotMeta {
            title: "Efficiency".into(),
            logy: true,
            rangex: Some((0.0, 30.0)),
            ..Default::default()
        };
        assert_eq!(
            meta.header_lines(),
            ["# title: Efficiency", "# logy: true", "# rangex: 0 30"]
        );
    }
}
