use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::TableError;

// ---------------------------------------------------------------------------
// Value – a single cell of a result table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes found in pickled result frames.
/// Payload cells are `List`s; everything else is a scalar.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

// -- Manual Eq/Ord so Value can live in BTreeSet --

/// Key equality: agrees with [`Ord`], so a floating NaN equals itself.  Row
/// filters never rely on it for nulls; see [`Value::is_null`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                List(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::List(items) => items.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) if v.is_nan() => write!(f, "nan"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Null => write!(f, "None"),
        }
    }
}

impl Value {
    /// Null or a floating NaN: both take the null path in comparisons.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of a list cell; non-numeric elements become NaN.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        self.as_list().map(|items| {
            items
                .iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect()
        })
    }

    /// Collapse every null-like value onto [`Value::Null`] so NaN cells group together.
    pub fn normalized(&self) -> Value {
        if self.is_null() {
            Value::Null
        } else {
            self.clone()
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Self {
        Value::List(items.into_iter().map(Value::Float).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – schema inferred once at load time
// ---------------------------------------------------------------------------

/// The native type of a column, inferred from its non-null cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every cell is null.
    Null,
    Bool,
    Integer,
    Float,
    String,
    List,
    /// Heterogeneous scalars; compared through their display form.
    Mixed,
}

impl ColumnKind {
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut kind = ColumnKind::Null;
        for cell in cells {
            let cell_kind = match cell {
                Value::Null => continue,
                Value::Float(v) if v.is_nan() => ColumnKind::Float,
                Value::Bool(_) => ColumnKind::Bool,
                Value::Integer(_) => ColumnKind::Integer,
                Value::Float(_) => ColumnKind::Float,
                Value::String(_) => ColumnKind::String,
                Value::List(_) => ColumnKind::List,
            };
            kind = match (kind, cell_kind) {
                (ColumnKind::Null, k) => k,
                (a, b) if a == b => a,
                (ColumnKind::Integer, ColumnKind::Float)
                | (ColumnKind::Float, ColumnKind::Integer) => ColumnKind::Float,
                _ => return ColumnKind::Mixed,
            };
        }
        kind
    }
}

// ---------------------------------------------------------------------------
// ResultTable – rows of cells under a named schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: ColumnKind,
}

/// One row: cells in schema order.
pub type Row = Vec<Value>;

/// An in-memory results table.  Never mutated in place by the pipeline; every
/// selection step produces a new table with the same schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    fields: Vec<Field>,
    rows: Vec<Row>,
}

impl ResultTable {
    /// Build a table and infer the kind of every column.
    pub fn from_rows(names: Vec<String>, rows: Vec<Row>) -> Result<Self, TableError> {
        let mut seen = BTreeSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(TableError::RowWidth {
                    row: i,
                    found: row.len(),
                    expected: names.len(),
                });
            }
        }
        let fields = names
            .into_iter()
            .enumerate()
            .map(|(col, name)| Field {
                kind: ColumnKind::infer(rows.iter().map(|r| &r[col])),
                name,
            })
            .collect();
        let mut table = Self { fields, rows };
        let width = table.fields.len();
        table.promote_integers(0..width);
        Ok(table)
    }

    /// Build a table from named records; columns appear in first-seen order and
    /// cells missing from a record are null.
    pub fn from_records(records: Vec<BTreeMap<String, Value>>) -> Self {
        Self::from_keyed_rows(records.into_iter().map(|r| r.into_iter().collect()))
    }

    fn from_keyed_rows(records: impl Iterator<Item = Vec<(String, Value)>>) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        let mut keyed: Vec<Vec<(usize, Value)>> = Vec::new();
        for record in records {
            let cells = record
                .into_iter()
                .map(|(name, value)| {
                    let col = *index.entry(name.clone()).or_insert_with(|| {
                        names.push(name);
                        names.len() - 1
                    });
                    (col, value)
                })
                .collect();
            keyed.push(cells);
        }
        let rows = keyed
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Null; names.len()];
                for (col, value) in cells {
                    row[col] = value;
                }
                row
            })
            .collect::<Vec<_>>();
        let fields = names
            .into_iter()
            .enumerate()
            .map(|(col, name)| Field {
                kind: ColumnKind::infer(rows.iter().map(|r| &r[col])),
                name,
            })
            .collect();
        let mut table = Self { fields, rows };
        let width = table.fields.len();
        table.promote_integers(0..width);
        table
    }

    /// Concatenate tables row-wise.  Output columns are the union of all input
    /// columns in first-appearance order; absent cells are null.
    pub fn concat(tables: Vec<ResultTable>) -> Self {
        Self::from_keyed_rows(tables.into_iter().flat_map(|table| {
            let names: Vec<String> = table.fields.iter().map(|f| f.name.clone()).collect();
            table
                .rows
                .into_iter()
                .map(move |row| names.iter().cloned().zip(row).collect::<Vec<_>>())
        }))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    /// Numeric view of a scalar column; non-numeric cells become NaN.
    pub fn column_f64(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)
            .map(|cells| cells.map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
    }

    /// Distinct values of a column in first-appearance order.  All null-like
    /// cells collapse onto a single [`Value::Null`].
    pub fn distinct_values(&self, name: &str) -> Option<Vec<Value>> {
        let mut seen = BTreeSet::new();
        let mut distinct = Vec::new();
        for value in self.column(name)? {
            let value = value.normalized();
            if seen.insert(value.clone()) {
                distinct.push(value);
            }
        }
        Some(distinct)
    }

    /// Copy the rows at `indices` (in the given order) under the same schema.
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            fields: self.fields.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Stable filter: keep rows for which `keep` returns true.
    pub fn filter(&self, mut keep: impl FnMut(&Row) -> bool) -> Self {
        Self {
            fields: self.fields.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Same schema, replacement rows.  Kinds are kept as inferred at load time.
    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == self.fields.len()));
        Self {
            fields: self.fields.clone(),
            rows,
        }
    }

    /// Re-infer the kind of columns whose cells were replaced wholesale.
    pub(crate) fn reinfer(&mut self, columns: &[usize]) {
        for &col in columns {
            self.fields[col].kind = ColumnKind::infer(self.rows.iter().map(|r| &r[col]));
        }
        self.promote_integers(columns.iter().copied());
    }

    /// Store the integer cells of floating columns as floats, so `20` and
    /// `20.0` are one iterable value.
    fn promote_integers(&mut self, columns: impl IntoIterator<Item = usize>) {
        for col in columns {
            if self.fields[col].kind != ColumnKind::Float {
                continue;
            }
            for row in &mut self.rows {
                if let Value::Integer(i) = row[col] {
                    row[col] = Value::Float(i as f64);
                }
            }
        }
    }

    /// Append a column computed from each row, or leave the table untouched if
    /// the column already exists.
    pub fn ensure_column(&mut self, name: &str, mut compute: impl FnMut(&Row) -> Value) {
        if self.has_column(name) {
            return;
        }
        let values: Vec<Value> = self.rows.iter().map(|r| compute(r)).collect();
        let kind = ColumnKind::infer(values.iter());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.fields.push(Field {
            name: name.to_string(),
            kind,
        });
        self.promote_integers([self.fields.len() - 1]);
    }
}
