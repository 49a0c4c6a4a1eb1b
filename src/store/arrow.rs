//! Table → Arrow RecordBatch conversion for the Parquet-based writers.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;

use crate::error::{Result, ScrapeError};
use crate::table::Table;

/// Build a RecordBatch from a table.
///
/// Column types are inferred from the cells: Float64 when every non-null cell
/// is a number or a numeric string, Boolean when every non-null cell is a
/// bool, Utf8 otherwise. Nested values land in Utf8 columns as JSON text.
/// Every column is nullable.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    if table.columns().is_empty() {
        return Err(ScrapeError::Persistence {
            target: "arrow".to_string(),
            reason: "table has no columns".to_string(),
        });
    }

    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len());

    for (idx, name) in table.columns().iter().enumerate() {
        let dtype = infer_column_type(table, idx);
        let array: ArrayRef = match dtype {
            DataType::Float64 => {
                let mut b = Float64Builder::new();
                for row in table.rows() {
                    b.append_option(row.get(idx).and_then(value_as_f64));
                }
                Arc::new(b.finish())
            }
            DataType::Boolean => {
                let mut b = BooleanBuilder::new();
                for row in table.rows() {
                    b.append_option(row.get(idx).and_then(Value::as_bool));
                }
                Arc::new(b.finish())
            }
            _ => {
                let mut b = StringBuilder::new();
                for row in table.rows() {
                    b.append_option(row.get(idx).and_then(value_as_text));
                }
                Arc::new(b.finish())
            }
        };
        fields.push(Field::new(name, dtype, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| ScrapeError::persistence("arrow", e))
}

fn infer_column_type(table: &Table, col: usize) -> DataType {
    let mut saw_value = false;
    let mut all_numeric = true;
    let mut all_bool = true;

    for row in table.rows() {
        match row.get(col) {
            None | Some(Value::Null) => continue,
            Some(cell) => {
                saw_value = true;
                if value_as_f64(cell).is_none() {
                    all_numeric = false;
                }
                if !cell.is_boolean() {
                    all_bool = false;
                }
            }
        }
    }

    if saw_value && all_numeric {
        DataType::Float64
    } else if saw_value && all_bool {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
