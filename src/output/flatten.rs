//! Flattening nested JSON records into string tables
//!
//! Nested objects become `parent_child` columns down to a depth limit;
//! anything deeper, and every array, is JSON-encoded into a single cell.

use crate::error::{Error, Result};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Nesting levels expanded into separate columns
pub const MAX_FLATTEN_DEPTH: usize = 3;

/// Column used for records that are not objects
const SCALAR_COLUMN: &str = "value";

/// Flatten one record to `(column, cell)` pairs in field order
pub fn flatten_record(record: &Value) -> Vec<(String, String)> {
    flatten_with_depth(record, MAX_FLATTEN_DEPTH)
}

pub fn flatten_with_depth(record: &Value, max_depth: usize) -> Vec<(String, String)> {
    let mut cells = Vec::new();
    match record {
        Value::Object(map) => flatten_object(map, "", 0, max_depth, &mut cells),
        other => cells.push((SCALAR_COLUMN.to_string(), cell_text(other))),
    }
    cells
}

fn flatten_object(
    map: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    cells: &mut Vec<(String, String)>,
) {
    if depth >= max_depth {
        let column = prefix.strip_suffix('_').unwrap_or(prefix).to_string();
        cells.push((column, Value::Object(map.clone()).to_string()));
        return;
    }

    for (key, value) in map {
        let column = format!("{prefix}{key}");
        match value {
            Value::Object(nested) => {
                flatten_object(nested, &format!("{column}_"), depth + 1, max_depth, cells);
            }
            other => cells.push((column, cell_text(other))),
        }
    }
}

/// Cell text for a non-object value; null is empty
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

// ============================================================================
// Flat Table
// ============================================================================

/// Flattened records over the union of their columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    /// Column names in first-seen order
    pub columns: Vec<String>,
    /// One map per record; missing columns are absent
    pub rows: Vec<HashMap<String, String>>,
}

impl FlatTable {
    pub fn from_records(records: &[Value]) -> Self {
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            let mut row = HashMap::new();
            for (column, cell) in flatten_record(record) {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
                row.insert(column, cell);
            }
            rows.push(row);
        }

        Self { columns, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `row`, `column`
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// All-Utf8 schema, every column nullable
    pub fn schema(&self) -> Schema {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        Schema::new(fields)
    }

    /// Arrow batch; cells missing from a record are null
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(self.schema());
        let columns: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|column| {
                let values: StringArray = self
                    .rows
                    .iter()
                    .map(|row| row.get(column).map(String::as_str))
                    .collect();
                Arc::new(values) as ArrayRef
            })
            .collect();

        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        RecordBatch::try_new_with_options(schema, columns, &options)
            .map_err(|e| Error::output(format!("Failed to create RecordBatch: {e}")))
    }
}
