use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{ResultTable, Value};

/// Extensions tried, in order, when resolving a source file.
pub const EXTENSIONS: [&str; 4] = ["parquet", "pq", "json", "csv"];

// ---------------------------------------------------------------------------
// Multi-source loader
// ---------------------------------------------------------------------------

/// Load and concatenate one table per `(config, name)` pair.
///
/// Files are named `<config>_<name>_<datafile>.<ext>`; the name part is left
/// out when `names` is empty and the config part when `configs` is empty.
/// Missing files are skipped with a warning.  `Config` and `Name` columns are
/// added when a file does not carry them, and `Geometry` is derived from
/// `Config` when absent.
pub fn load_sources(
    data_dir: &Path,
    configs: &[String],
    names: &[String],
    datafile: &str,
) -> Result<ResultTable> {
    let config_opts: Vec<Option<&str>> = if configs.is_empty() {
        vec![None]
    } else {
        configs.iter().map(|c| Some(c.as_str())).collect()
    };
    let name_opts: Vec<Option<&str>> = if names.is_empty() {
        vec![None]
    } else {
        names.iter().map(|n| Some(n.as_str())).collect()
    };

    let mut tables = Vec::new();
    for &config in &config_opts {
        for &name in &name_opts {
            let stem = source_stem(config, name, datafile);
            let Some(path) = resolve_source(data_dir, &stem) else {
                warn!("Data file not found: {}", data_dir.join(&stem).display());
                continue;
            };
            let mut table =
                load_file(&path).with_context(|| format!("loading {}", path.display()))?;
            info!("Loaded {} rows from {}", table.len(), path.display());
            if let Some(config) = config {
                table.ensure_column("Config", |_| Value::from(config));
            }
            if let Some(name) = name {
                table.ensure_column("Name", |_| Value::from(name));
            }
            tables.push(table);
        }
    }

    let mut table = ResultTable::concat(tables);
    if let Some(config_col) = table.column_index("Config") {
        table.ensure_column("Geometry", |row| match row[config_col].as_str() {
            Some(config) => Value::from(geometry_of(config)),
            None => Value::Null,
        });
    }
    Ok(table)
}

/// File stem `<config>_<name>_<datafile>` with absent parts left out.
pub fn source_stem(config: Option<&str>, name: Option<&str>, datafile: &str) -> String {
    config
        .into_iter()
        .chain(name)
        .chain(std::iter::once(datafile))
        .collect::<Vec<_>>()
        .join("_")
}

/// First existing `<stem>.<ext>` under `data_dir`.
pub fn resolve_source(data_dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| data_dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
}

/// Geometry token of a configuration: the part before the first underscore.
pub fn geometry_of(config: &str) -> &str {
    config.split('_').next().unwrap_or(config)
}

// ---------------------------------------------------------------------------
// Single-file entry-point
// ---------------------------------------------------------------------------

/// Load a result table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Parquet file; list columns hold payload sequences (recommended)
/// * `.json`    – `[{ "Config": "...", "Values": [...], ... }, ...]`
/// * `.csv`     – header row; list cells written as `[1;2;3]` or `1;2;3`
pub fn load_file(path: &Path) -> Result<ResultTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`:
///
/// ```json
/// [
///   { "Config": "hd_1x2x6", "Variable": "X", "Hits": 3, "Values": [1.0, 2.0] },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<ResultTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let row: BTreeMap<String, Value> = obj
            .iter()
            .map(|(key, val)| (key.clone(), json_to_value(val)))
            .collect();
        rows.push(row);
    }

    Ok(ResultTable::from_records(rows))
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        JsonValue::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names.  Sequence cells are written
/// `"[4000.0;3999.0;3998.0]"` (brackets optional when `;` is present).
/// Every other cell is type-guessed.
fn load_csv(path: &Path) -> Result<ResultTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: {} cells for {} columns",
                record.len(),
                headers.len()
            );
        }
        rows.push(record.iter().map(parse_cell).collect());
    }

    ResultTable::from_rows(headers, rows).context("building table from CSV")
}

fn parse_cell(s: &str) -> Value {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let inner = inner.trim();
        if inner.is_empty() {
            return Value::List(Vec::new());
        }
        let sep = if inner.contains(';') { ';' } else { ',' };
        return Value::List(inner.split(sep).map(|t| guess_scalar(t.trim())).collect());
    }
    if s.contains(';') {
        return Value::List(s.split(';').map(|t| guess_scalar(t.trim())).collect());
    }
    guess_scalar(s)
}

fn guess_scalar(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    match s {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file written by **Pandas** (`df.to_parquet()`) or
/// **Polars** (`df.write_parquet()`).
///
/// Scalar columns become scalar cells, List/LargeList columns become list
/// cells.  The pandas index column (`__index_level_*`) is dropped.
fn load_parquet(path: &Path) -> Result<ResultTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut names: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let cols: Vec<(String, ArrayRef)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .filter(|(f, _)| !f.name().starts_with("__index_level_"))
            .map(|(f, col)| -> Result<(String, ArrayRef)> {
                Ok((f.name().clone(), decode_dictionary(col)?))
            })
            .collect::<Result<_>>()?;

        if names.is_none() {
            names = Some(cols.iter().map(|(n, _)| n.clone()).collect());
        }

        for row in 0..batch.num_rows() {
            let cells = cols
                .iter()
                .map(|(name, col)| {
                    value_at(col.as_ref(), row)
                        .with_context(|| format!("Row {row}: failed to read '{name}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(cells);
        }
    }

    debug!("parquet {}: {} rows", path.display(), rows.len());
    ResultTable::from_rows(names.unwrap_or_default(), rows).context("building table from parquet")
}

// -- Parquet / Arrow helpers --

/// Categorical columns arrive dictionary-encoded; flatten them to their values.
fn decode_dictionary(col: &ArrayRef) -> Result<ArrayRef> {
    match col.data_type() {
        DataType::Dictionary(_, value_type) => arrow::compute::cast(col, value_type)
            .context("decoding dictionary column"),
        _ => Ok(col.clone()),
    }
}

/// Extract one cell from an Arrow column.  Lists recurse into their values.
fn value_at(col: &dyn Array, row: usize) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => Value::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        DataType::Int8 => Value::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => Value::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::Integer(col.as_primitive::<UInt8Type>().value(row) as i64),
        DataType::UInt16 => Value::Integer(col.as_primitive::<UInt16Type>().value(row) as i64),
        DataType::UInt32 => Value::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer)
        }
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::List(_) => list_value(col.as_list::<i32>().value(row).as_ref())?,
        DataType::LargeList(_) => list_value(col.as_list::<i64>().value(row).as_ref())?,
        DataType::Dictionary(_, _) => {
            let flat = arrow::compute::cast(&col.slice(row, 1), &DataType::Utf8)
                .context("decoding nested dictionary")?;
            value_at(flat.as_ref(), 0)?
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

fn list_value(values: &dyn Array) -> Result<Value> {
    (0..values.len())
        .map(|i| value_at(values, i))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Float64Builder, Int64Array, ListBuilder, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;
    use crate::data::model::ColumnKind;

    #[test]
    fn stem_leaves_out_absent_parts() {
        assert_eq!(source_stem(Some("hd"), Some("marley"), "Eff"), "hd_marley_Eff");
        assert_eq!(source_stem(Some("hd"), None, "Eff"), "hd_Eff");
        assert_eq!(source_stem(None, None, "Eff"), "Eff");
    }

    #[test]
    fn geometry_is_prefix_before_underscore() {
        assert_eq!(geometry_of("hd_1x2x6_centralAPA"), "hd");
        assert_eq!(geometry_of("vd"), "vd");
    }

    #[test]
    fn csv_cells_are_typed_and_lists_split() {
        assert_eq!(parse_cell("[1;2.5]"), Value::List(vec![1i64.into(), 2.5.into()]));
        assert_eq!(parse_cell("[1, 2]"), Value::List(vec![1i64.into(), 2i64.into()]));
        assert_eq!(parse_cell("0.5;nan").as_list().map(|l| l.len()), Some(2));
        assert_eq!(parse_cell("True"), Value::Bool(true));
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("#Hits"), Value::from("#Hits"));
    }

    #[test]
    fn json_records_load_with_lists() {
        let dir = tempfile::TempDir::new().expect("tempdir should be created");
        let path = dir.path().join("t.json");
        std::fs::write(
            &path,
            r#"[{"Config":"hd","Hits":3,"Values":[1,2.5]},{"Config":"vd","Flag":true}]"#,
        )
        .unwrap();
        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.kind("Values"), Some(ColumnKind::List));
        assert_eq!(table.value(1, "Hits"), Some(&Value::Null));
        assert_eq!(table.value(1, "Flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn parquet_scalars_and_lists_load() {
        let dir = tempfile::TempDir::new().expect("tempdir should be created");
        let path = dir.path().join("t.parquet");

        let mut values = ListBuilder::new(Float64Builder::new());
        values.values().append_slice(&[1.0, 2.0]);
        values.append(true);
        values.values().append_slice(&[3.0]);
        values.append(true);
        let schema = Arc::new(Schema::new(vec![
            Field::new("Config", DataType::Utf8, false),
            Field::new("Hits", DataType::Int64, true),
            Field::new("Flag", DataType::Boolean, false),
            Field::new(
                "Values",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                false,
            ),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["hd", "vd"])),
                Arc::new(Int64Array::from(vec![Some(3), None])),
                Arc::new(BooleanArray::from(vec![true, false])),
                Arc::new(values.finish()),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.kind("Hits"), Some(ColumnKind::Integer));
        assert_eq!(table.value(1, "Hits"), Some(&Value::Null));
        assert_eq!(table.value(1, "Values"), Some(&Value::from(vec![3.0])));
        assert_eq!(table.value(0, "Flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        assert!(load_file(Path::new("table.pkl")).is_err());
    }
}
