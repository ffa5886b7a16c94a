use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::data::explode::{drop_null_rows, explode, with_error_siblings};
use crate::data::filter::{self, select_filters, ColumnFilter, Predicate};
use crate::data::model::{ColumnKind, ResultTable, Value};
use crate::error::SelectionError;
use crate::stats::percentile_range;

/// Number of distinct iterable values above which `reduce` thins the series.
pub const DEFAULT_REDUCE_THRESHOLD: usize = 8;

/// Default name of the categorical row discriminator.
pub const VARIABLE_COLUMN: &str = "Variable";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything one plot panel (or table) needs selected from a results table.
/// Built once per invocation and passed explicitly to [`select`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    /// Configurations to keep.  Empty means the whole table.
    pub configs: Vec<String>,
    /// Simulation names to keep.  Empty means every name.
    pub names: Vec<String>,
    /// Keep only rows whose `variable_column` equals this.
    pub variable: Option<String>,
    /// Column holding the variable discriminator, `Variable` unless renamed.
    pub variable_column: String,
    /// Produce one subset per distinct value of this column.
    pub iterable_column: Option<String>,
    /// Second series dimension: each iterable subset is split once more per
    /// distinct value of this column.
    pub comparable_column: Option<String>,
    /// Exact-match filters; `select_values[i]` applies to `select_keys[i]`.
    pub select_keys: Vec<String>,
    pub select_values: Vec<String>,
    /// Sequence columns exploded to one row per element.  The first one is
    /// the primary column used for ranges.
    pub payload_columns: Vec<String>,
    /// Derive the display range from these percentiles of the primary column.
    pub percentile_range: Option<(f64, f64)>,
    /// Explicit range; exploded rows outside it are dropped.
    pub numeric_range: Option<(f64, f64)>,
    /// Skip every other iterable value when there are many of them.
    pub reduce: bool,
    pub reduce_threshold: usize,
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self {
            configs: Vec::new(),
            names: Vec::new(),
            variable: None,
            variable_column: VARIABLE_COLUMN.to_string(),
            iterable_column: None,
            comparable_column: None,
            select_keys: Vec::new(),
            select_values: Vec::new(),
            payload_columns: Vec::new(),
            percentile_range: None,
            numeric_range: None,
            reduce: false,
            reduce_threshold: DEFAULT_REDUCE_THRESHOLD,
        }
    }
}

impl SelectionRequest {
    /// Reject requests that reference unknown columns or carry invalid ranges.
    pub fn validate(&self, table: &ResultTable) -> Result<(), SelectionError> {
        if self.select_keys.len() != self.select_values.len() {
            return Err(SelectionError::MismatchedSelect {
                keys: self.select_keys.len(),
                values: self.select_values.len(),
            });
        }
        let required = self
            .iterable_column
            .iter()
            .chain(&self.comparable_column)
            .chain(&self.payload_columns)
            .chain(&self.select_keys)
            .map(String::as_str)
            .chain(self.variable.as_ref().map(|_| self.variable_column.as_str()))
            .chain((!self.configs.is_empty()).then_some("Config"))
            .chain((!self.names.is_empty()).then_some("Name"));
        for column in required {
            if !table.has_column(column) {
                return Err(SelectionError::UnknownColumn(column.to_string()));
            }
        }
        if let Some((lo, hi)) = self.numeric_range {
            if !(lo <= hi) {
                return Err(SelectionError::InvalidRange { lo, hi });
            }
        }
        if let Some((lo, hi)) = self.percentile_range {
            for q in [lo, hi] {
                if !(0.0..=100.0).contains(&q) {
                    return Err(SelectionError::InvalidPercentile(q));
                }
            }
            if lo > hi {
                return Err(SelectionError::InvalidRange { lo, hi });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The rows selected for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub table: ResultTable,
    /// Iterable column and the value this subset was restricted to.
    pub iterable: Option<(String, Value)>,
    /// Comparable column and value, when the request has one.
    pub comparable: Option<(String, Value)>,
    /// Display range of the primary payload column, explicit or derived.
    pub range: Option<(f64, f64)>,
}

impl Subset {
    /// An empty subset means "skip, do not plot".
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Legend label, e.g. `Hits=3`.  With a comparable column the series
    /// are told apart by it instead, e.g. `Config=hd_1x2x6`.
    pub fn label(&self) -> Option<String> {
        self.comparable
            .as_ref()
            .or(self.iterable.as_ref())
            .map(|(column, value)| format!("{column}={value}"))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the selection pipeline.
///
/// Without an iterable column exactly one subset is returned; otherwise one
/// per distinct value of that column (first-appearance order) in the
/// config/name-restricted table.  A comparable column splits each of those
/// again, iterable-major.  Empty subsets are returned as such.
pub fn select(
    table: &ResultTable,
    request: &SelectionRequest,
) -> Result<Vec<Subset>, SelectionError> {
    request.validate(table)?;

    let scoped = restrict_sources(table, request);

    let mut narrowing = Vec::new();
    if let Some(variable) = &request.variable {
        narrowing.push(ColumnFilter::new(
            request.variable_column.clone(),
            Predicate::Equals(Value::from(variable.as_str())),
        ));
    }
    narrowing.extend(select_filters(
        &scoped,
        &request.select_keys,
        &request.select_values,
    )?);

    let iterables = match &request.iterable_column {
        None => vec![None],
        Some(column) => {
            let values = scoped.distinct_values(column).unwrap_or_default();
            let thin = request.reduce && values.len() > request.reduce_threshold;
            values
                .into_iter()
                .enumerate()
                .filter_map(|(idx, value)| {
                    if thin && idx % 2 == 1 {
                        info!("Skipping {column}={value} to avoid overcrowding");
                        return None;
                    }
                    Some(Some((column.clone(), value)))
                })
                .collect()
        }
    };
    let comparables = match &request.comparable_column {
        None => vec![None],
        Some(column) => scoped
            .distinct_values(column)
            .unwrap_or_default()
            .into_iter()
            .map(|value| Some((column.clone(), value)))
            .collect(),
    };

    let mut subsets = Vec::with_capacity(iterables.len() * comparables.len());
    for iterable in &iterables {
        for comparable in &comparables {
            let mut filters = narrowing.clone();
            for (column, value) in iterable.iter().chain(comparable) {
                filters.push(ColumnFilter::new(column.clone(), matching(value)));
            }
            subsets.push(build_subset(
                &scoped,
                &filters,
                iterable.clone(),
                comparable.clone(),
                request,
            )?);
        }
    }
    Ok(subsets)
}

fn matching(value: &Value) -> Predicate {
    if value.is_null() {
        Predicate::IsNull
    } else {
        Predicate::Equals(value.clone())
    }
}

/// Keep the requested configurations and names, warning about absent ones.
fn restrict_sources(table: &ResultTable, request: &SelectionRequest) -> ResultTable {
    let mut filters = Vec::new();
    for (column, wanted) in [("Config", &request.configs), ("Name", &request.names)] {
        if wanted.is_empty() {
            continue;
        }
        let present: BTreeSet<Value> = table
            .distinct_values(column)
            .unwrap_or_default()
            .into_iter()
            .collect();
        for value in wanted {
            if !present.contains(&Value::from(value.as_str())) {
                warn!("No rows for {column}={value}, skipping");
            }
        }
        filters.push(ColumnFilter::one_of(column, wanted));
    }
    filter::apply(table, &filters)
}

fn build_subset(
    scoped: &ResultTable,
    filters: &[ColumnFilter],
    iterable: Option<(String, Value)>,
    comparable: Option<(String, Value)>,
    request: &SelectionRequest,
) -> Result<Subset, SelectionError> {
    let mut table = filter::apply(scoped, filters);
    let key = identity_columns(&table, request, comparable.is_some());
    table = keep_first_per_key(&table, &key);

    let primary = request.payload_columns.first();
    if !request.payload_columns.is_empty() {
        let columns = with_error_siblings(&table, &request.payload_columns);
        table = drop_null_rows(&explode(&table, &columns)?, &columns);
    }

    let mut range = None;
    if let Some(primary) = primary {
        if let Some((lo, hi)) = request.numeric_range {
            let col = table
                .column_index(primary)
                .ok_or_else(|| SelectionError::UnknownColumn(primary.clone()))?;
            table = table.filter(|row| {
                row[col]
                    .as_f64()
                    .is_some_and(|v| (lo..=hi).contains(&v))
            });
            range = Some((lo, hi));
        } else if let Some(percentiles) = request.percentile_range {
            range = table
                .column_f64(primary)
                .and_then(|data| percentile_range(&data, percentiles));
        }
    } else {
        range = request.numeric_range;
    }

    let subset = Subset {
        table,
        iterable,
        comparable,
        range,
    };
    debug!(
        "subset {:?}: {} rows, range {:?}",
        subset.label(),
        subset.len(),
        subset.range
    );
    Ok(subset)
}

/// Columns that tell two rows of a subset apart.
///
/// Split by a comparable column, each (iterable, comparable) cell holds one
/// entry per configuration, name and variable.  Otherwise rows are
/// duplicates only when every scalar column outside the payload matches.
fn identity_columns(
    table: &ResultTable,
    request: &SelectionRequest,
    per_entry: bool,
) -> Vec<usize> {
    if per_entry {
        return ["Config", "Name", request.variable_column.as_str()]
            .into_iter()
            .filter_map(|c| table.column_index(c))
            .collect();
    }
    let payload = with_error_siblings(table, &request.payload_columns);
    table
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind != ColumnKind::List && !payload.contains(&f.name))
        .map(|(i, _)| i)
        .collect()
}

/// Keep the first row of every key combination and warn about the rest.
/// With no key columns nothing is dropped.
fn keep_first_per_key(table: &ResultTable, key: &[usize]) -> ResultTable {
    if key.is_empty() {
        return table.clone();
    }
    let mut seen: BTreeSet<Vec<Value>> = BTreeSet::new();
    table.filter(|row| {
        let values: Vec<Value> = key.iter().map(|&i| row[i].normalized()).collect();
        if seen.contains(&values) {
            let described: Vec<String> = key
                .iter()
                .zip(&values)
                .take(4)
                .map(|(&i, v)| format!("{}={v}", table.fields()[i].name))
                .collect();
            warn!(
                "Multiple entries found for {}; using the first",
                described.join(", ")
            );
            false
        } else {
            seen.insert(values);
            true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> ResultTable {
        ResultTable::from_rows(
            vec![
                "Config".into(),
                "Variable".into(),
                "Hits".into(),
                "Values".into(),
                "Counts".into(),
            ],
            vec![
                vec![
                    "cfgA".into(),
                    "E".into(),
                    3i64.into(),
                    vec![1.0, 2.0, 3.0].into(),
                    vec![10.0, 20.0, 30.0].into(),
                ],
                vec![
                    "cfgA".into(),
                    "E".into(),
                    5i64.into(),
                    vec![1.0, 2.0, 3.0].into(),
                    vec![5.0, 15.0, 25.0].into(),
                ],
            ],
        )
        .unwrap()
    }

    fn scenario_request() -> SelectionRequest {
        SelectionRequest {
            configs: vec!["cfgA".into()],
            variable: Some("E".into()),
            iterable_column: Some("Hits".into()),
            payload_columns: vec!["Values".into(), "Counts".into()],
            ..Default::default()
        }
    }

    #[test]
    fn one_subset_per_iterable_value_exploded() {
        let subsets = select(&scenario(), &scenario_request()).unwrap();
        assert_eq!(subsets.len(), 2);

        let expected = [(3i64, [10.0, 20.0, 30.0]), (5, [5.0, 15.0, 25.0])];
        for (subset, (hits, counts)) in subsets.iter().zip(expected) {
            assert_eq!(subset.iterable, Some(("Hits".into(), Value::Integer(hits))));
            assert_eq!(subset.len(), 3);
            assert_eq!(subset.table.column_f64("Values").unwrap(), [1.0, 2.0, 3.0]);
            assert_eq!(subset.table.column_f64("Counts").unwrap(), counts);
        }
        assert_eq!(subsets[0].label().as_deref(), Some("Hits=3"));
    }

    #[test]
    fn selecting_twice_gives_identical_subsets() {
        let table = scenario();
        let before = table.clone();
        let request = scenario_request();
        assert_eq!(select(&table, &request), select(&table, &request));
        assert_eq!(table, before);
    }

    #[test]
    fn empty_configs_select_whole_table() {
        let request = SelectionRequest::default();
        let subsets = select(&scenario(), &request).unwrap();
        assert_eq!(subsets.len(), 1);
        assert_eq!(subsets[0].len(), 2);
        assert_eq!(subsets[0].table.value(1, "Hits"), Some(&Value::Integer(5)));
    }

    #[test]
    fn rows_differing_outside_the_key_columns_are_kept() {
        let row = |label: &str, efficiency: f64| -> Vec<Value> {
            vec!["cfgA".into(), "marley".into(), "E".into(), label.into(), efficiency.into()]
        };
        let table = ResultTable::from_rows(
            vec![
                "Config".into(),
                "Name".into(),
                "Variable".into(),
                "Label".into(),
                "Efficiency".into(),
            ],
            vec![row("A", 90.0), row("B", 80.0), row("B", 80.0)],
        )
        .unwrap();
        let subsets = select(&table, &SelectionRequest::default()).unwrap();
        assert_eq!(subsets[0].table.column_f64("Efficiency").unwrap(), [90.0, 80.0]);
    }

    #[test]
    fn equal_numbers_form_one_iterable_value() {
        let table = ResultTable::from_rows(
            vec!["Distance".into(), "Efficiency".into()],
            vec![
                vec![20i64.into(), 90.0.into()],
                vec![20.0.into(), 80.0.into()],
                vec![20.5.into(), 70.0.into()],
            ],
        )
        .unwrap();
        let request = SelectionRequest {
            iterable_column: Some("Distance".into()),
            ..Default::default()
        };
        let subsets = select(&table, &request).unwrap();
        let shape: Vec<(String, usize)> = subsets
            .iter()
            .map(|s| (s.label().unwrap_or_default(), s.len()))
            .collect();
        assert_eq!(shape, [("Distance=20".into(), 2), ("Distance=20.5".into(), 1)]);
    }

    #[test]
    fn comparable_splits_each_iterable_value() {
        let rows = [("cfgA", 3i64, 1.0), ("cfgB", 3, 2.0), ("cfgA", 5, 3.0), ("cfgA", 3, 4.0)]
            .into_iter()
            .map(|(config, hits, v)| vec![config.into(), hits.into(), vec![v].into()])
            .collect();
        let table =
            ResultTable::from_rows(vec!["Config".into(), "Hits".into(), "Values".into()], rows)
                .unwrap();
        let request = SelectionRequest {
            iterable_column: Some("Hits".into()),
            comparable_column: Some("Config".into()),
            payload_columns: vec!["Values".into()],
            ..Default::default()
        };
        let subsets = select(&table, &request).unwrap();
        let shape: Vec<(Option<String>, Vec<f64>)> = subsets
            .iter()
            .map(|s| (s.label(), s.table.column_f64("Values").unwrap()))
            .collect();
        // the second cfgA/Hits=3 entry is dropped in favour of the first
        assert_eq!(
            shape,
            [
                (Some("Config=cfgA".into()), vec![1.0]),
                (Some("Config=cfgB".into()), vec![2.0]),
                (Some("Config=cfgA".into()), vec![3.0]),
                (Some("Config=cfgB".into()), vec![]),
            ]
        );
        assert_eq!(subsets[2].iterable, Some(("Hits".into(), Value::Integer(5))));
    }

    #[test]
    fn missing_config_yields_empty_subset() {
        let request = SelectionRequest {
            configs: vec!["cfgZ".into()],
            ..Default::default()
        };
        let subsets = select(&scenario(), &request).unwrap();
        assert!(subsets[0].is_empty());
    }

    #[test]
    fn mismatched_select_is_rejected() {
        let request = SelectionRequest {
            select_keys: vec!["Hits".into()],
            ..Default::default()
        };
        assert_eq!(
            select(&scenario(), &request),
            Err(SelectionError::MismatchedSelect { keys: 1, values: 0 })
        );
    }

    #[test]
    fn unknown_iterable_is_rejected() {
        let request = SelectionRequest {
            iterable_column: Some("Drift".into()),
            ..Default::default()
        };
        assert_eq!(
            select(&scenario(), &request),
            Err(SelectionError::UnknownColumn("Drift".into()))
        );
    }

    #[test]
    fn select_filter_narrows_each_subset() {
        let request = SelectionRequest {
            select_keys: vec!["Hits".into()],
            select_values: vec!["5".into()],
            ..scenario_request()
        };
        let subsets = select(&scenario(), &request).unwrap();
        assert!(subsets[0].is_empty());
        assert_eq!(subsets[1].len(), 3);
    }

    #[test]
    fn numeric_range_drops_exploded_rows() {
        let request = SelectionRequest {
            numeric_range: Some((1.5, 3.0)),
            ..scenario_request()
        };
        let subsets = select(&scenario(), &request).unwrap();
        assert_eq!(subsets[0].table.column_f64("Values").unwrap(), [2.0, 3.0]);
        assert_eq!(subsets[0].range, Some((1.5, 3.0)));
    }

    #[test]
    fn percentile_range_is_derived_from_primary_column() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let table = ResultTable::from_rows(
            vec!["Config".into(), "Values".into()],
            vec![vec!["cfgA".into(), values.into()]],
        )
        .unwrap();
        let request = SelectionRequest {
            payload_columns: vec!["Values".into()],
            percentile_range: Some((1.0, 99.0)),
            ..Default::default()
        };
        let (lo, hi) = select(&table, &request).unwrap()[0].range.unwrap();
        assert!((lo - 1.99).abs() < 1e-9);
        assert!((hi - 99.01).abs() < 1e-9);
    }

    #[test]
    fn reduce_skips_every_other_value_past_threshold() {
        let rows = (0..10i64)
            .map(|i| vec!["cfgA".into(), i.into()])
            .collect();
        let table = ResultTable::from_rows(vec!["Config".into(), "Distance".into()], rows).unwrap();
        let request = SelectionRequest {
            iterable_column: Some("Distance".into()),
            reduce: true,
            ..Default::default()
        };
        let subsets = select(&table, &request).unwrap();
        let kept: Vec<String> = subsets.iter().filter_map(Subset::label).collect();
        assert_eq!(kept, ["Distance=0", "Distance=2", "Distance=4", "Distance=6", "Distance=8"]);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let request = SelectionRequest {
            percentile_range: Some((1.0, 120.0)),
            ..Default::default()
        };
        assert_eq!(
            select(&scenario(), &request),
            Err(SelectionError::InvalidPercentile(120.0))
        );
        let request = SelectionRequest {
            numeric_range: Some((2.0, 1.0)),
            ..Default::default()
        };
        assert_eq!(
            select(&scenario(), &request),
            Err(SelectionError::InvalidRange { lo: 2.0, hi: 1.0 })
        );
    }
}
