use std::fmt;
use std::io::Read;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use bytes::Bytes;
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::error::{PipelineError, Result};
use super::fits;
use super::model::{canonical_name, Table, Value};

// ---------------------------------------------------------------------------
// Formats and options
// ---------------------------------------------------------------------------

/// Input encodings the loader understands, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    /// Whitespace- or tab-delimited text.
    Text,
    Json,
    Parquet,
    Fits,
}

impl Format {
    /// Pick a parser from the file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Format> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(Format::Csv),
            "txt" | "tsv" | "dat" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "parquet" | "pq" => Ok(Format::Parquet),
            "fits" | "fit" | "fts" => Ok(Format::Fits),
            _ => Err(PipelineError::UnsupportedFormat { extension: ext }),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Csv => "CSV",
            Format::Text => "TXT",
            Format::Json => "JSON",
            Format::Parquet => "Parquet",
            Format::Fits => "FITS",
        };
        write!(f, "{name}")
    }
}

/// Whether the first record of a text file names the columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Header iff no field of the first record parses as a number.
    #[default]
    Auto,
    Present,
    Absent,
}

/// What the loader found, for display by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub format: Format,
    pub rows: usize,
    pub columns: usize,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file loaded successfully: {} rows, {} columns",
            self.format, self.rows, self.columns
        )
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a catalog from disk. Dispatch by extension.
pub fn load_file(path: &Path, header: HeaderMode) -> Result<(Table, LoadReport)> {
    let file_name = path.to_string_lossy();
    // Reject unknown extensions before touching the file.
    Format::from_file_name(&file_name)?;
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(file_name.to_string(), e))?;
    load(file, &file_name, header)
}

/// Load a catalog from a byte stream; `file_name` is only used to pick the
/// parser and to label errors.
///
/// Supported formats:
/// * `.csv`                 – comma-separated, optional header row
/// * `.txt` / `.tsv` / `.dat` – whitespace or tab separated
/// * `.json`                – array of records or array of arrays
/// * `.parquet` / `.pq`     – columns in schema order
/// * `.fits` / `.fit` / `.fts` – first extension HDU (binary or ASCII table)
pub fn load<R: Read>(mut reader: R, file_name: &str, header: HeaderMode) -> Result<(Table, LoadReport)> {
    let format = Format::from_file_name(file_name)?;

    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| PipelineError::io(file_name, e))?;

    let table = match format {
        Format::Csv => load_csv(&data, file_name, header)?,
        Format::Text => load_text(&data, file_name, header)?,
        Format::Json => load_json(&data, file_name)?,
        Format::Parquet => load_parquet(data, file_name)?,
        Format::Fits => fits::read_table(&data).map_err(|e| PipelineError::io(file_name, e))?,
    };

    let report = LoadReport {
        format,
        rows: table.len(),
        columns: table.width(),
    };
    info!("{file_name}: {report}");
    Ok((table, report))
}

// ---------------------------------------------------------------------------
// Shared record → table assembly
// ---------------------------------------------------------------------------

fn looks_like_header(record: &[String]) -> bool {
    !record.is_empty() && record.iter().all(|f| f.trim().parse::<f64>().is_err())
}

/// Turn raw string records into a typed table, taking column names from the
/// first record when it is a header and positional names otherwise.
fn records_to_table(records: Vec<Vec<String>>, header: HeaderMode) -> Table {
    let mut records = records.into_iter().peekable();
    let has_header = match header {
        HeaderMode::Present => true,
        HeaderMode::Absent => false,
        HeaderMode::Auto => records.peek().is_some_and(|r| looks_like_header(r)),
    };
    let names = if has_header { records.next() } else { None };
    let body: Vec<Vec<String>> = records.collect();

    let mut table = match names {
        Some(names) => Table::new(names.iter().enumerate().map(|(i, n)| {
            let n = n.trim();
            if n.is_empty() {
                canonical_name(i)
            } else {
                n.to_string()
            }
        })),
        None => Table::with_canonical_columns(body.iter().map(Vec::len).max().unwrap_or(0)),
    };

    for record in body {
        table.push_row(record.iter().map(|f| Value::guess(f)).collect());
    }
    table
}

fn data_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|l| {
            let t = l.trim_start();
            !t.is_empty() && !t.starts_with('#')
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Comma-separated catalog export. Lines starting with `#` (the archive's
/// preamble) are skipped; short rows are padded, long rows are an error.
fn load_csv(data: &[u8], file_name: &str, header: HeaderMode) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| PipelineError::io(file_name, format!("CSV row {row_no}: {e}")))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if let Some(first) = records.first() {
        let expected = first.len();
        if let Some((line, rec)) = records.iter().enumerate().find(|(_, r)| r.len() > expected) {
            return Err(PipelineError::io(
                file_name,
                format!("expected {expected} fields in record {}, saw {}", line + 1, rec.len()),
            ));
        }
    }

    Ok(records_to_table(records, header))
}

// ---------------------------------------------------------------------------
// Whitespace / tab delimited text loader
// ---------------------------------------------------------------------------

/// Whitespace-delimited table. A strict delimited parse is tried first; if
/// rows disagree on width (or quotes do not balance) each line is split on
/// whitespace instead and short rows are padded.
fn load_text(data: &[u8], file_name: &str, header: HeaderMode) -> Result<Table> {
    let text = std::str::from_utf8(data).map_err(|e| PipelineError::io(file_name, e))?;
    let lines = data_lines(text);

    let records = match parse_delimited(&lines) {
        Ok(records) => records,
        Err(reason) => {
            warn!("{file_name}: delimited parse failed ({reason}), falling back to whitespace tokens");
            let records: Vec<Vec<String>> = lines
                .iter()
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .collect();
            let width = records.first().map(Vec::len).unwrap_or(0);
            for line in overlong_lines(&records) {
                warn!("{file_name}: line {line} has more than {width} tokens, the extra ones are dropped");
            }
            records
        }
    };
    debug!("{file_name}: {} text records", records.len());

    Ok(records_to_table(records, header))
}

/// 1-based positions of records wider than the first one.
fn overlong_lines(records: &[Vec<String>]) -> Vec<usize> {
    let width = records.first().map(Vec::len).unwrap_or(0);
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.len() > width)
        .map(|(i, _)| i + 1)
        .collect()
}

fn parse_delimited(lines: &[&str]) -> std::result::Result<Vec<Vec<String>>, String> {
    let Some(first) = lines.first() else {
        return Ok(Vec::new());
    };

    let records: Vec<Vec<String>> = if first.contains('\t') {
        let joined = lines.join("\n");
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(joined.as_bytes());
        reader
            .records()
            .map(|r| {
                r.map(|rec| rec.iter().map(str::to_string).collect())
                    .map_err(|e| e.to_string())
            })
            .collect::<std::result::Result<_, _>>()?
    } else {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| split_quoted(l).ok_or_else(|| format!("unbalanced quote on line {}", i + 1)))
            .collect::<std::result::Result<_, _>>()?
    };

    let width = records.first().map(Vec::len).unwrap_or(0);
    if let Some(i) = records.iter().position(|r| r.len() != width) {
        return Err(format!(
            "line {} has {} fields, expected {width}",
            i + 1,
            records[i].len()
        ));
    }
    Ok(records)
}

/// Split on runs of whitespace, keeping quoted fields (`"Kepler-22 b"`)
/// together. `None` if a quote is left open.
fn split_quoted(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_field = false;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if !in_field && (ch == '"' || ch == '\'') => {
                quote = Some(ch);
                in_field = true;
            }
            None if ch.is_whitespace() => {
                if in_field {
                    fields.push(std::mem::take(&mut current));
                    in_field = false;
                }
            }
            None => {
                current.push(ch);
                in_field = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_field {
        fields.push(current);
    }
    Some(fields)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON shapes (what archive APIs and `df.to_json(orient='records')`
/// produce):
///
/// ```json
/// [ { "pl_name": "Kepler-22 b", "hostname": "Kepler-22", ... }, ... ]
/// [ ["Kepler-22 b", "Kepler-22", 0.849, 2.1, 0.98, "G5 V", 5518], ... ]
/// ```
///
/// Object keys keep file order; keys first seen in later records are
/// appended as extra columns.
fn load_json(data: &[u8], file_name: &str) -> Result<Table> {
    let root: JsonValue =
        serde_json::from_slice(data).map_err(|e| PipelineError::io(file_name, format!("parsing JSON: {e}")))?;

    let records = root
        .as_array()
        .ok_or_else(|| PipelineError::io(file_name, "expected a top-level JSON array"))?;

    if records.iter().all(JsonValue::is_array) {
        let width = records
            .iter()
            .filter_map(JsonValue::as_array)
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let mut table = Table::with_canonical_columns(width);
        for rec in records.iter().filter_map(JsonValue::as_array) {
            table.push_row(rec.iter().map(json_to_value).collect());
        }
        return Ok(table);
    }

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| PipelineError::io(file_name, format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut table = Table::new(names.clone());
    for rec in records.iter().filter_map(JsonValue::as_object) {
        table.push_row(
            names
                .iter()
                .map(|n| rec.get(n).map(json_to_value).unwrap_or(Value::Missing))
                .collect(),
        );
    }
    Ok(table)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Missing,
        other => Value::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file. Columns keep schema order; strings, integers,
/// floats and booleans map directly, anything else is cast to text.
fn load_parquet(data: Vec<u8>, file_name: &str) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
        .map_err(|e| PipelineError::io(file_name, format!("reading parquet metadata: {e}")))?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| PipelineError::io(file_name, format!("building parquet reader: {e}")))?;

    let mut table = Table::new(names);

    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| PipelineError::io(file_name, format!("reading parquet record batch: {e}")))?;

        let columns = batch
            .columns()
            .iter()
            .map(array_values)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::io(file_name, e))?;

        for row in 0..batch.num_rows() {
            table.push_row(columns.iter().map(|c| c[row].clone()).collect());
        }
    }

    Ok(table)
}

// -- Arrow helpers --

fn primitive_values<T: ArrowPrimitiveType>(col: &ArrayRef, to_value: impl Fn(T::Native) -> Value) -> Vec<Value> {
    col.as_primitive::<T>()
        .iter()
        .map(|v| v.map(&to_value).unwrap_or(Value::Missing))
        .collect()
}

/// Convert one Arrow column into cells, nulls becoming `Missing`.
fn array_values(col: &ArrayRef) -> std::result::Result<Vec<Value>, arrow::error::ArrowError> {
    let values = match col.data_type() {
        DataType::Utf8 => string_values(col.as_string::<i32>().iter()),
        DataType::LargeUtf8 => string_values(col.as_string::<i64>().iter()),
        DataType::Boolean => col
            .as_boolean()
            .iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Missing))
            .collect(),
        DataType::Int8 => primitive_values::<Int8Type>(col, |v| Value::Integer(v.into())),
        DataType::Int16 => primitive_values::<Int16Type>(col, |v| Value::Integer(v.into())),
        DataType::Int32 => primitive_values::<Int32Type>(col, |v| Value::Integer(v.into())),
        DataType::Int64 => primitive_values::<Int64Type>(col, Value::Integer),
        DataType::UInt8 => primitive_values::<UInt8Type>(col, |v| Value::Integer(v.into())),
        DataType::UInt16 => primitive_values::<UInt16Type>(col, |v| Value::Integer(v.into())),
        DataType::UInt32 => primitive_values::<UInt32Type>(col, |v| Value::Integer(v.into())),
        DataType::UInt64 => primitive_values::<UInt64Type>(col, |v| match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Float(v as f64),
        }),
        DataType::Float32 => primitive_values::<Float32Type>(col, |v| Value::Float(v.into())),
        DataType::Float64 => primitive_values::<Float64Type>(col, Value::Float),
        _ => {
            let cast = arrow::compute::cast(col, &DataType::Utf8)?;
            string_values(cast.as_string::<i32>().iter())
        }
    };
    debug_assert_eq!(values.len(), col.len());
    Ok(values)
}

fn string_values<'a>(iter: impl Iterator<Item = Option<&'a str>>) -> Vec<Value> {
    iter.map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Missing))
        .collect()
}
