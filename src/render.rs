use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde_json::{Map, Value as JsonValue};

use crate::data::model::{Table, Value};

// ---------------------------------------------------------------------------
// Arrow conversion
// ---------------------------------------------------------------------------

/// Narrowest Arrow type that holds every non-missing cell of a column.
fn column_type(table: &Table, idx: usize) -> DataType {
    let present: Vec<&Value> = table.column_values(idx).filter(|v| !v.is_missing()).collect();
    if present.is_empty() {
        DataType::Utf8
    } else if present.iter().all(|v| matches!(v, Value::Integer(_))) {
        DataType::Int64
    } else if present.iter().all(|v| matches!(v, Value::Integer(_) | Value::Float(_))) {
        DataType::Float64
    } else if present.iter().all(|v| matches!(v, Value::Bool(_))) {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

/// Convert a table into one Arrow record batch; missing cells become nulls.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch, ArrowError> {
    let mut fields = Vec::with_capacity(table.width());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.width());

    for (idx, column) in table.columns.iter().enumerate() {
        let ty = column_type(table, idx);
        let cells = table.column_values(idx);
        let array: ArrayRef = match ty {
            DataType::Int64 => Arc::new(
                cells
                    .map(|v| match v {
                        Value::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect::<Int64Array>(),
            ),
            DataType::Float64 => Arc::new(cells.map(Value::as_f64).collect::<Float64Array>()),
            DataType::Boolean => Arc::new(
                cells
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect::<BooleanArray>(),
            ),
            _ => Arc::new(
                cells
                    .map(|v| (!v.is_missing()).then(|| v.to_string()))
                    .collect::<StringArray>(),
            ),
        };
        fields.push(Field::new(column.name.clone(), ty, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    if arrays.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    RecordBatch::try_new(schema, arrays)
}

/// Render a table as an ASCII grid.
pub fn pretty(table: &Table) -> Result<String, ArrowError> {
    let batch = to_record_batch(table)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

// ---------------------------------------------------------------------------
// JSON records
// ---------------------------------------------------------------------------

/// `[{column: value, ...}, ...]`, columns in table order.
pub fn to_json(table: &Table) -> JsonValue {
    JsonValue::Array(
        table
            .rows
            .iter()
            .map(|row| {
                let record: Map<String, JsonValue> = table
                    .columns
                    .iter()
                    .zip(&row.fields)
                    .map(|(c, v)| (c.name.clone(), serde_json::to_value(v).unwrap_or(JsonValue::Null)))
                    .collect();
                JsonValue::Object(record)
            })
            .collect(),
    )
}
