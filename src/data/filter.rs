use std::collections::BTreeSet;

use log::{debug, warn};

use super::model::{ColumnKind, ResultTable, Row, Value};
use crate::error::SelectionError;

/// Select value that requests the null path instead of an equality test.
pub const NAN_SENTINEL: &str = "nan";

// ---------------------------------------------------------------------------
// Predicates: how one column constrains a row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Cell is null (including a stored floating NaN).
    IsNull,
    /// Cell equals a value already coerced to the column's kind.
    Equals(Value),
    /// Cell's display form equals the string (heterogeneous columns).
    DisplayEquals(String),
    /// Cell is one of the listed values; an empty set matches nothing.
    OneOf(BTreeSet<Value>),
}

impl Predicate {
    pub fn matches(&self, cell: &Value) -> bool {
        match self {
            Predicate::IsNull => cell.is_null(),
            Predicate::Equals(target) => !cell.is_null() && values_equal(cell, target),
            Predicate::DisplayEquals(s) => !cell.is_null() && cell.to_string() == *s,
            Predicate::OneOf(set) => !cell.is_null() && set.contains(cell),
        }
    }
}

/// Numeric equality across integer and floating cells.  NaN never compares
/// equal, which is why null matching has its own predicate.
fn values_equal(cell: &Value, target: &Value) -> bool {
    match (cell, target) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            cell.as_f64() == target.as_f64()
        }
        (a, b) => a == b,
    }
}

/// A predicate bound to a named column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: String,
    pub predicate: Predicate,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            column: column.into(),
            predicate,
        }
    }

    /// Membership filter over string values, e.g. `Config ∈ {..}`.
    pub fn one_of<S: AsRef<str>>(column: impl Into<String>, values: &[S]) -> Self {
        let set = values.iter().map(|v| Value::from(v.as_ref())).collect();
        Self::new(column, Predicate::OneOf(set))
    }
}

// ---------------------------------------------------------------------------
// Select value coercion
// ---------------------------------------------------------------------------

/// Turn a raw select value into a predicate for a column of `kind`.
///
/// Returns `None` when the value cannot be expressed in the column's type;
/// the caller skips that filter.
pub fn coerce(kind: ColumnKind, raw: &str) -> Option<Predicate> {
    if raw.eq_ignore_ascii_case(NAN_SENTINEL) {
        return Some(Predicate::IsNull);
    }
    let trimmed = raw.trim();
    match kind {
        ColumnKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Predicate::Equals(Value::Bool(true))),
            "false" | "0" => Some(Predicate::Equals(Value::Bool(false))),
            _ => None,
        },
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .ok()
            .map(|i| Predicate::Equals(Value::Integer(i))),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .map(|v| Predicate::Equals(Value::Float(v))),
        ColumnKind::String | ColumnKind::Null => {
            Some(Predicate::Equals(Value::String(raw.to_string())))
        }
        ColumnKind::Mixed => Some(Predicate::DisplayEquals(raw.to_string())),
        ColumnKind::List => None,
    }
}

/// Build the exact-match filters of a request against a table's schema.
///
/// Mismatched key/value counts and unknown columns are request errors;
/// values that fail coercion are dropped with a warning.
pub fn select_filters(
    table: &ResultTable,
    keys: &[String],
    values: &[String],
) -> Result<Vec<ColumnFilter>, SelectionError> {
    if keys.len() != values.len() {
        return Err(SelectionError::MismatchedSelect {
            keys: keys.len(),
            values: values.len(),
        });
    }
    let mut filters = Vec::with_capacity(keys.len());
    for (key, raw) in keys.iter().zip(values) {
        let kind = table
            .kind(key)
            .ok_or_else(|| SelectionError::UnknownColumn(key.clone()))?;
        match coerce(kind, raw) {
            Some(predicate) => {
                debug!("select filter {key} -> {predicate:?}");
                filters.push(ColumnFilter::new(key.clone(), predicate));
            }
            None => warn!("Could not convert '{raw}' to the {kind:?} column '{key}'. Skipping filter."),
        }
    }
    Ok(filters)
}

// ---------------------------------------------------------------------------
// Applying filters
// ---------------------------------------------------------------------------

/// Return indices of rows that pass all filters, in table order.
///
/// A filter on a column the table lacks rejects every row.
pub fn filtered_indices(table: &ResultTable, filters: &[ColumnFilter]) -> Vec<usize> {
    let bound: Vec<(Option<usize>, &Predicate)> = filters
        .iter()
        .map(|f| (table.column_index(&f.column), &f.predicate))
        .collect();
    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| row_passes(row, &bound))
        .map(|(i, _)| i)
        .collect()
}

fn row_passes(row: &Row, bound: &[(Option<usize>, &Predicate)]) -> bool {
    bound.iter().all(|(col, predicate)| match col {
        Some(col) => predicate.matches(&row[*col]),
        None => false,
    })
}

/// Stable filter of a table by a set of column filters.
pub fn apply(table: &ResultTable, filters: &[ColumnFilter]) -> ResultTable {
    table.take(&filtered_indices(table, filters))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> ResultTable {
        ResultTable::from_rows(
            vec!["Flag".into(), "Energy".into(), "Label".into()],
            vec![
                vec![true.into(), 10.0.into(), "a".into()],
                vec![false.into(), f64::NAN.into(), "b".into()],
                vec![true.into(), Value::Null, "c".into()],
                vec![false.into(), 3.0.into(), "d".into()],
            ],
        )
        .unwrap()
    }

    fn labels(table: &ResultTable) -> Vec<String> {
        table.column("Label").unwrap().map(|v| v.to_string()).collect()
    }

    #[test]
    fn boolean_coercion_accepts_words_and_digits() {
        for raw in ["True", "true", "1"] {
            assert_eq!(coerce(ColumnKind::Bool, raw), Some(Predicate::Equals(true.into())));
        }
        for raw in ["False", "false", "0"] {
            assert_eq!(coerce(ColumnKind::Bool, raw), Some(Predicate::Equals(false.into())));
        }
        assert_eq!(coerce(ColumnKind::Bool, "maybe"), None);
    }

    #[test]
    fn unconvertible_value_leaves_table_unfiltered() {
        let table = flags();
        let filters = select_filters(&table, &["Flag".into()], &["maybe".into()]).unwrap();
        assert!(filters.is_empty());
        assert_eq!(apply(&table, &filters).len(), table.len());
    }

    #[test]
    fn nan_sentinel_selects_null_and_stored_nan() {
        let table = flags();
        let filters = select_filters(&table, &["Energy".into()], &["nan".into()]).unwrap();
        assert_eq!(labels(&apply(&table, &filters)), ["b", "c"]);
    }

    #[test]
    fn float_equality_never_matches_nan() {
        let table = flags();
        let filters = vec![ColumnFilter::new("Energy", Predicate::Equals(f64::NAN.into()))];
        assert!(apply(&table, &filters).is_empty());
    }

    #[test]
    fn numeric_coercion_failure_is_skipped() {
        assert_eq!(coerce(ColumnKind::Integer, "3.5"), None);
        assert_eq!(coerce(ColumnKind::Integer, " 3 "), Some(Predicate::Equals(3i64.into())));
        assert_eq!(coerce(ColumnKind::Float, "ten"), None);
        assert_eq!(coerce(ColumnKind::List, "1"), None);
    }

    #[test]
    fn integer_cells_match_in_float_columns() {
        let table = ResultTable::from_rows(
            vec!["Distance".into()],
            vec![vec![20i64.into()], vec![20.5.into()]],
        )
        .unwrap();
        assert_eq!(table.kind("Distance"), Some(ColumnKind::Float));
        let filters = select_filters(&table, &["Distance".into()], &["20".into()]).unwrap();
        assert_eq!(apply(&table, &filters).len(), 1);
    }

    #[test]
    fn mismatched_counts_and_unknown_columns_are_errors() {
        let table = flags();
        assert_eq!(
            select_filters(&table, &["Flag".into()], &[]),
            Err(SelectionError::MismatchedSelect { keys: 1, values: 0 })
        );
        assert_eq!(
            select_filters(&table, &["Nope".into()], &["1".into()]),
            Err(SelectionError::UnknownColumn("Nope".into()))
        );
    }

    #[test]
    fn one_of_filter_keeps_source_order() {
        let table = flags();
        let filters = vec![ColumnFilter::one_of("Label", &["d", "a"])];
        assert_eq!(labels(&apply(&table, &filters)), ["a", "d"]);
    }
}
