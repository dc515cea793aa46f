//! Row and batch containers for records flowing through a run.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

/// One record as returned by the dataset API: field name to untyped value.
pub type RawRecord = serde_json::Map<String, Value>;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Null, absent, or unparseable.
    Missing,
    Text(String),
    Int(i64),
    Float(f64),
    /// Value exactly as the API returned it.
    Raw(Value),
}

impl Cell {
    /// Wrap an API value, mapping JSON `null` to [`Cell::Missing`].
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            other => Self::Raw(other),
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing | Self::Raw(Value::Null))
    }

    /// Textual rendering used for sorting and for binding into text columns.
    ///
    /// Returns `None` for missing values.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Missing | Self::Raw(Value::Null) => None,
            Self::Text(s) | Self::Raw(Value::String(s)) => Some(Cow::Borrowed(s.as_str())),
            Self::Int(v) => Some(Cow::Owned(v.to_string())),
            Self::Float(v) => Some(Cow::Owned(v.to_string())),
            Self::Raw(other) => Some(Cow::Owned(other.to_string())),
        }
    }
}

/// A column-ordered table of cells.
///
/// Columns are a list rather than a map so that two source fields which
/// collide after renaming can coexist until they are disambiguated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Batch {
    /// Build a batch from explicit columns and rows.
    ///
    /// Rows shorter than `columns` are padded with [`Cell::Missing`]; longer
    /// rows are truncated.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Build a batch from API records, preserving record order.
    ///
    /// The column set is the union of record keys in first-seen order; keys a
    /// record lacks become [`Cell::Missing`].
    #[must_use]
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for key in record.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = vec![Cell::Missing; columns.len()];
                for (key, value) in record {
                    if let Some(&idx) = positions.get(&key) {
                        row[idx] = Cell::from_json(value);
                    }
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column with this name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, in row order.
    pub fn column_cells(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Replace every column name. `names` must have one entry per column.
    pub fn rename_columns(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.columns.len());
        self.columns = names;
    }

    /// Replace the cells of one column. `cells` must have one entry per row.
    pub fn replace_column(&mut self, idx: usize, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row[idx] = cell;
        }
    }

    /// Consume the batch, returning its columns and rows.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn from_records_unions_columns_in_first_seen_order() {
        let batch = Batch::from_records(vec![
            record(json!({"a": 1, "b": "x"})),
            record(json!({"c": true, "a": 2})),
        ]);
        assert_eq!(batch.columns(), &["a", "b", "c"]);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.rows()[0][2], Cell::Missing);
        assert_eq!(batch.rows()[1][1], Cell::Missing);
        assert_eq!(batch.rows()[1][0], Cell::Raw(json!(2)));
    }

    #[test]
    fn json_null_is_missing() {
        let batch = Batch::from_records(vec![record(json!({"a": null}))]);
        assert!(batch.rows()[0][0].is_missing());
    }

    #[test]
    fn as_text_renders_scalars() {
        assert_eq!(Cell::Int(7).as_text().unwrap(), "7");
        assert_eq!(Cell::Text("abc".into()).as_text().unwrap(), "abc");
        assert_eq!(Cell::Raw(json!("raw")).as_text().unwrap(), "raw");
        assert_eq!(Cell::Raw(json!({"k": 1})).as_text().unwrap(), r#"{"k":1}"#);
        assert!(Cell::Missing.as_text().is_none());
    }

    #[test]
    fn new_pads_short_rows() {
        let batch = Batch::new(vec!["a".into(), "b".into()], vec![vec![Cell::Int(1)]]);
        assert_eq!(batch.rows()[0], vec![Cell::Int(1), Cell::Missing]);
    }
}
