use super::model::{ResultTable, Row, Value};
use crate::error::SelectionError;

/// Suffix naming the per-element uncertainty column of a payload column.
pub const ERROR_SUFFIX: &str = "Error";

/// The payload columns plus every `<payload>Error` sibling present in the table.
pub fn with_error_siblings(table: &ResultTable, payload: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for column in payload {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    for column in payload {
        let sibling = format!("{column}{ERROR_SUFFIX}");
        if table.has_column(&sibling) && !columns.contains(&sibling) {
            columns.push(sibling);
        }
    }
    columns
}

/// Replace each sequence-valued cell of `columns` by one row per element.
///
/// All listed columns are exploded in lock-step, so the i-th output row of a
/// source row holds the i-th element of every listed column.  Scalar cells are
/// repeated, and an empty sequence yields a single row with a null cell.
pub fn explode(table: &ResultTable, columns: &[String]) -> Result<ResultTable, SelectionError> {
    let indices = columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| SelectionError::UnknownColumn(c.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows: Vec<Row> = Vec::new();
    for (row_no, row) in table.rows().iter().enumerate() {
        let mut length: Option<(usize, usize)> = None;
        for (pos, &col) in indices.iter().enumerate() {
            let Some(items) = row[col].as_list() else {
                continue;
            };
            match length {
                None => length = Some((pos, items.len())),
                Some((first, expected)) if items.len() != expected => {
                    return Err(SelectionError::RaggedPayload {
                        row: row_no,
                        column: columns[pos].clone(),
                        found: items.len(),
                        reference: columns[first].clone(),
                        expected,
                    });
                }
                Some(_) => {}
            }
        }

        match length {
            None => rows.push(row.clone()),
            Some((_, 0)) => {
                let mut out = row.clone();
                for &col in &indices {
                    if out[col].as_list().is_some() {
                        out[col] = Value::Null;
                    }
                }
                rows.push(out);
            }
            Some((_, n)) => {
                for i in 0..n {
                    let mut out = row.clone();
                    for &col in &indices {
                        if let Some(items) = row[col].as_list() {
                            out[col] = items[i].clone();
                        }
                    }
                    rows.push(out);
                }
            }
        }
    }
    let mut exploded = table.with_rows(rows);
    exploded.reinfer(&indices);
    Ok(exploded)
}

/// Drop rows with a null (or NaN) cell in any of `columns`.
pub fn drop_null_rows(table: &ResultTable, columns: &[String]) -> ResultTable {
    let indices: Vec<usize> = columns
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    table.filter(|row| indices.iter().all(|&col| !row[col].is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> ResultTable {
        ResultTable::from_rows(
            vec!["Hits".into(), "Values".into(), "Counts".into(), "CountsError".into()],
            vec![
                vec![
                    3i64.into(),
                    vec![1.0, 2.0, 3.0].into(),
                    vec![10.0, 20.0, 30.0].into(),
                    vec![1.0, 2.0, 3.0].into(),
                ],
                vec![
                    5i64.into(),
                    vec![4.0, 5.0].into(),
                    vec![5.0, f64::NAN].into(),
                    vec![0.5, 0.5].into(),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn error_siblings_follow_payload() {
        let table = scan();
        let cols = with_error_siblings(&table, &["Values".into(), "Counts".into()]);
        assert_eq!(cols, ["Values", "Counts", "CountsError"]);
    }

    #[test]
    fn explode_then_regroup_restores_sequences() {
        let table = scan();
        let cols = with_error_siblings(&table, &["Values".into(), "Counts".into()]);
        let exploded = explode(&table, &cols).unwrap();
        assert_eq!(exploded.len(), 5);

        for (source_row, hits) in [(0usize, 3i64), (1, 5)] {
            let group = exploded.filter(|r| r[0] == Value::Integer(hits));
            for name in ["Values", "Counts", "CountsError"] {
                let original = table.value(source_row, name).unwrap().to_f64_vec().unwrap();
                let regrouped = group.column_f64(name).unwrap();
                assert_eq!(original.len(), regrouped.len());
                for (a, b) in original.iter().zip(&regrouped) {
                    assert!(a == b || (a.is_nan() && b.is_nan()));
                }
            }
        }
    }

    #[test]
    fn null_elements_are_dropped_after_explode() {
        let table = scan();
        let cols = with_error_siblings(&table, &["Values".into(), "Counts".into()]);
        let exploded = drop_null_rows(&explode(&table, &cols).unwrap(), &cols);
        assert_eq!(exploded.len(), 4);
        assert_eq!(exploded.column_f64("Values").unwrap(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn ragged_sequences_are_reported() {
        let table = ResultTable::from_rows(
            vec!["x".into(), "xError".into()],
            vec![vec![vec![1.0, 2.0].into(), vec![0.1].into()]],
        )
        .unwrap();
        let err = explode(&table, &["x".into(), "xError".into()]).unwrap_err();
        assert_eq!(
            err,
            SelectionError::RaggedPayload {
                row: 0,
                column: "xError".into(),
                found: 1,
                reference: "x".into(),
                expected: 2,
            }
        );
    }

    #[test]
    fn empty_sequence_becomes_null_row() {
        let table = ResultTable::from_rows(
            vec!["x".into()],
            vec![vec![Value::List(vec![])], vec![vec![7.0].into()]],
        )
        .unwrap();
        let exploded = explode(&table, &["x".into()]).unwrap();
        assert_eq!(exploded.len(), 2);
        assert!(exploded.value(0, "x").unwrap().is_null());
        assert_eq!(drop_null_rows(&exploded, &["x".into()]).len(), 1);
    }
}
