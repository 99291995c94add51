//! Minimal FITS table reader.
//!
//! Only what a catalog download needs: the primary HDU is skipped and the
//! first extension must be a binary (`BINTABLE`) or ASCII (`TABLE`) table.
//! FITS stores every binary field big-endian; each field is converted to
//! host order with `from_be_bytes` before it becomes a [`Value`].

use std::collections::HashMap;

use log::{debug, warn};
use thiserror::Error;

use super::model::{canonical_name, Table, Value};

pub const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("not a FITS file (missing SIMPLE card)")]
    NotFits,

    #[error("truncated FITS file: needed {needed} bytes, found {available}")]
    Truncated { needed: usize, available: usize },

    #[error("header has no END card")]
    MissingEnd,

    #[error("missing or invalid header keyword {0}")]
    MissingKeyword(String),

    #[error("no extension HDU after the primary header")]
    NoExtension,

    #[error("first extension is {0}, expected BINTABLE or TABLE")]
    NotATable(String),

    #[error("column {column}: unsupported TFORM '{tform}'")]
    BadFormat { column: usize, tform: String },
}

type Result<T> = std::result::Result<T, FitsError>;

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

/// Keyword → raw value text (strings already unquoted).
#[derive(Debug, Default)]
struct Header {
    cards: HashMap<String, String>,
}

impl Header {
    fn get(&self, key: &str) -> Option<&str> {
        self.cards.get(key).map(String::as_str)
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.replace('D', "E").parse().ok())
    }

    fn require_usize(&self, key: &str) -> Result<usize> {
        self.int(key)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| FitsError::MissingKeyword(key.to_string()))
    }
}

/// Parse header cards starting at `offset`. Returns the header and the
/// offset of the first data byte (header padded to a whole block).
fn read_header(data: &[u8], offset: usize) -> Result<(Header, usize)> {
    let mut header = Header::default();
    let mut pos = offset;

    loop {
        let Some(card) = data.get(pos..pos + CARD_SIZE) else {
            return Err(if pos == offset {
                FitsError::Truncated {
                    needed: pos + CARD_SIZE,
                    available: data.len(),
                }
            } else {
                FitsError::MissingEnd
            });
        };
        pos += CARD_SIZE;

        let card = String::from_utf8_lossy(card);
        let keyword = card.get(..8).unwrap_or(&card).trim_end().to_string();
        if keyword == "END" {
            break;
        }
        if card.get(8..10) != Some("= ") {
            continue; // COMMENT, HISTORY, blank
        }
        let value = parse_card_value(card.get(10..).unwrap_or(""));
        header.cards.entry(keyword).or_insert(value);
    }

    Ok((header, padded(pos - offset) + offset))
}

fn parse_card_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote, trailing blanks are not significant.
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(ch);
            }
        }
        return out.trim_end().to_string();
    }
    raw.split('/').next().unwrap_or("").trim().to_string()
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Size in bytes of the data unit described by `header`.
fn data_size(header: &Header) -> Result<usize> {
    let bitpix = header
        .int("BITPIX")
        .ok_or_else(|| FitsError::MissingKeyword("BITPIX".into()))?;
    let naxis = header.require_usize("NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }
    let random_groups = header.get("GROUPS") == Some("T") && header.int("NAXIS1") == Some(0);
    let mut elements: usize = 1;
    for n in 1..=naxis {
        if random_groups && n == 1 {
            continue;
        }
        elements = elements.saturating_mul(header.require_usize(&format!("NAXIS{n}"))?);
    }
    let pcount = header.int("PCOUNT").unwrap_or(0).max(0) as usize;
    let gcount = header.int("GCOUNT").unwrap_or(1).max(0) as usize;
    let bytes_per = bitpix.unsigned_abs() as usize / 8;
    Ok(bytes_per.saturating_mul(gcount).saturating_mul(pcount.saturating_add(elements)))
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read the first extension table of a FITS file into a [`Table`].
pub fn read_table(data: &[u8]) -> Result<Table> {
    let (primary, data_start) = read_header(data, 0)?;
    if primary.get("SIMPLE") != Some("T") {
        return Err(FitsError::NotFits);
    }

    let primary_len = data_size(&primary)?;
    let ext_start = primary_len
        .checked_next_multiple_of(BLOCK_SIZE)
        .and_then(|len| data_start.checked_add(len))
        .ok_or(FitsError::Truncated {
            needed: usize::MAX,
            available: data.len(),
        })?;
    if ext_start >= data.len() {
        return Err(FitsError::NoExtension);
    }

    let (ext, table_start) = read_header(data, ext_start)?;
    let xtension = ext.get("XTENSION").unwrap_or("").to_string();
    let row_bytes = ext.require_usize("NAXIS1")?;
    let n_rows = ext.require_usize("NAXIS2")?;
    let n_fields = ext.require_usize("TFIELDS")?;

    let needed = table_start.saturating_add(row_bytes.saturating_mul(n_rows));
    if needed > data.len() {
        return Err(FitsError::Truncated {
            needed,
            available: data.len(),
        });
    }
    let rows = &data[table_start..needed];
    debug!("FITS {xtension}: {n_rows} rows x {n_fields} fields, {row_bytes} bytes/row");

    match xtension.as_str() {
        "BINTABLE" => read_bintable(&ext, rows, row_bytes, n_fields),
        "TABLE" => read_ascii_table(&ext, rows, row_bytes, n_fields),
        other => Err(FitsError::NotATable(other.to_string())),
    }
}

fn column_names(header: &Header, n_fields: usize) -> Vec<String> {
    (1..=n_fields)
        .map(|n| match header.get(&format!("TTYPE{n}")) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => canonical_name(n - 1),
        })
        .collect()
}

/// `TSCALn` / `TZEROn` for column `n`, `None` when both are identity.
fn scaling(header: &Header, n: usize) -> Option<(f64, f64)> {
    let scale = header.float(&format!("TSCAL{n}")).unwrap_or(1.0);
    let zero = header.float(&format!("TZERO{n}")).unwrap_or(0.0);
    (scale != 1.0 || zero != 0.0).then_some((scale, zero))
}

// ---------------------------------------------------------------------------
// Binary tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Logical,
    Bit,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
    Complex,
    DoubleComplex,
    /// Variable-length array descriptor (`P` 32-bit, `Q` 64-bit).
    Descriptor(usize),
}

#[derive(Debug, Clone)]
struct BinColumn {
    repeat: usize,
    ty: FieldType,
    offset: usize,
    width: usize,
    scaling: Option<(f64, f64)>,
    null: Option<i64>,
}

/// Bytes one cell of the column occupies; `None` if it does not fit a `usize`.
fn field_width(repeat: usize, ty: FieldType) -> Option<usize> {
    match ty {
        FieldType::Bit => Some(repeat.div_ceil(8)),
        ty => repeat.checked_mul(element_size(ty)),
    }
}

fn element_size(ty: FieldType) -> usize {
    match ty {
        FieldType::Logical | FieldType::Byte | FieldType::Char | FieldType::Bit => 1,
        FieldType::Short => 2,
        FieldType::Int | FieldType::Float => 4,
        FieldType::Long | FieldType::Double | FieldType::Complex => 8,
        FieldType::DoubleComplex => 16,
        FieldType::Descriptor(size) => size,
    }
}

/// Parse a binary `TFORMn` such as `1D`, `20A`, `J`, `1PE(12)`.
fn parse_tform(tform: &str, column: usize) -> Result<(usize, FieldType)> {
    let bad = || FitsError::BadFormat {
        column,
        tform: tform.to_string(),
    };
    let t = tform.trim();
    let digits = t.chars().take_while(char::is_ascii_digit).count();
    let repeat = if digits == 0 {
        1
    } else {
        t[..digits].parse().map_err(|_| bad())?
    };
    let code = t[digits..].chars().next().ok_or_else(bad)?;
    let ty = match code {
        'L' => FieldType::Logical,
        'X' => FieldType::Bit,
        'B' => FieldType::Byte,
        'I' => FieldType::Short,
        'J' => FieldType::Int,
        'K' => FieldType::Long,
        'A' => FieldType::Char,
        'E' => FieldType::Float,
        'D' => FieldType::Double,
        'C' => FieldType::Complex,
        'M' => FieldType::DoubleComplex,
        'P' => FieldType::Descriptor(8),
        'Q' => FieldType::Descriptor(16),
        _ => return Err(bad()),
    };
    Ok((repeat, ty))
}

fn read_bintable(header: &Header, rows: &[u8], row_bytes: usize, n_fields: usize) -> Result<Table> {
    let mut columns = Vec::with_capacity(n_fields);
    let mut offset: usize = 0;
    for n in 1..=n_fields {
        let tform = header
            .get(&format!("TFORM{n}"))
            .ok_or_else(|| FitsError::MissingKeyword(format!("TFORM{n}")))?;
        let (repeat, ty) = parse_tform(tform, n)?;
        let bad = || FitsError::BadFormat {
            column: n,
            tform: tform.to_string(),
        };
        let width = field_width(repeat, ty).ok_or_else(bad)?;
        let end = offset.checked_add(width).ok_or_else(bad)?;
        if let FieldType::Descriptor(_) = ty {
            warn!("FITS column {n}: variable-length arrays are not supported, loading as missing");
        }
        let column = BinColumn {
            repeat,
            ty,
            offset,
            width,
            scaling: scaling(header, n),
            null: header.int(&format!("TNULL{n}")),
        };
        offset = end;
        columns.push(column);
    }
    if offset > row_bytes {
        return Err(FitsError::Truncated {
            needed: offset,
            available: row_bytes,
        });
    }

    let mut table = Table::new(column_names(header, n_fields));
    if row_bytes == 0 {
        return Ok(table);
    }
    for row in rows.chunks_exact(row_bytes) {
        table.push_row(
            columns
                .iter()
                .map(|c| decode_field(c, &row[c.offset..c.offset + c.width]))
                .collect(),
        );
    }
    Ok(table)
}

/// Copy `N` big-endian bytes out of `raw`; callers index within the
/// column width so the slice is always long enough.
fn be<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

fn decode_field(col: &BinColumn, raw: &[u8]) -> Value {
    if col.repeat == 0 {
        return Value::Missing;
    }
    match col.ty {
        FieldType::Char => {
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            Value::Text(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
        }
        FieldType::Bit => Value::Text(
            (0..col.repeat)
                .map(|i| if raw[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
                .collect(),
        ),
        FieldType::Descriptor(_) => Value::Missing,
        _ if col.repeat == 1 => decode_element(col, raw),
        ty => {
            let size = element_size(ty);
            let parts: Vec<String> = raw
                .chunks_exact(size)
                .map(|chunk| decode_element(col, chunk).to_string())
                .collect();
            Value::Text(parts.join(" "))
        }
    }
}

fn decode_element(col: &BinColumn, raw: &[u8]) -> Value {
    match col.ty {
        FieldType::Logical => match raw[0] {
            b'T' => Value::Bool(true),
            b'F' => Value::Bool(false),
            _ => Value::Missing,
        },
        FieldType::Byte => scaled_integer(col, i64::from(raw[0])),
        FieldType::Short => scaled_integer(col, i64::from(i16::from_be_bytes(be(raw)))),
        FieldType::Int => scaled_integer(col, i64::from(i32::from_be_bytes(be(raw)))),
        FieldType::Long => scaled_integer(col, i64::from_be_bytes(be(raw))),
        FieldType::Float => scaled_float(col, f64::from(f32::from_be_bytes(be(raw)))),
        FieldType::Double => scaled_float(col, f64::from_be_bytes(be(raw))),
        FieldType::Complex => Value::Text(format!(
            "{}{:+}j",
            f32::from_be_bytes(be(raw)),
            f32::from_be_bytes(be(&raw[4..]))
        )),
        FieldType::DoubleComplex => Value::Text(format!(
            "{}{:+}j",
            f64::from_be_bytes(be(raw)),
            f64::from_be_bytes(be(&raw[8..]))
        )),
        FieldType::Char | FieldType::Bit | FieldType::Descriptor(_) => Value::Missing,
    }
}

fn scaled_integer(col: &BinColumn, raw: i64) -> Value {
    if col.null == Some(raw) {
        return Value::Missing;
    }
    match col.scaling {
        None => Value::Integer(raw),
        // Unsigned-integer convention: an integral offset keeps the value integral.
        Some((scale, zero)) if scale == 1.0 && zero.fract() == 0.0 => {
            Value::Integer(raw.wrapping_add(zero as i64))
        }
        Some((scale, zero)) => Value::Float(raw as f64 * scale + zero),
    }
}

fn scaled_float(col: &BinColumn, raw: f64) -> Value {
    if raw.is_nan() {
        return Value::Missing;
    }
    match col.scaling {
        None => Value::Float(raw),
        Some((scale, zero)) => Value::Float(raw * scale + zero),
    }
}

// ---------------------------------------------------------------------------
// ASCII tables
// ---------------------------------------------------------------------------

fn read_ascii_table(header: &Header, rows: &[u8], row_bytes: usize, n_fields: usize) -> Result<Table> {
    struct AsciiColumn {
        start: usize,
        width: usize,
        code: char,
        scaling: Option<(f64, f64)>,
        null: Option<String>,
    }

    let mut columns = Vec::with_capacity(n_fields);
    for n in 1..=n_fields {
        let tform = header
            .get(&format!("TFORM{n}"))
            .ok_or_else(|| FitsError::MissingKeyword(format!("TFORM{n}")))?;
        let bad = || FitsError::BadFormat {
            column: n,
            tform: tform.to_string(),
        };
        let code = tform.chars().next().ok_or_else(bad)?;
        let width: usize = tform[code.len_utf8()..]
            .split('.')
            .next()
            .and_then(|w| w.parse().ok())
            .ok_or_else(bad)?;
        let start = header
            .require_usize(&format!("TBCOL{n}"))?
            .checked_sub(1)
            .ok_or_else(|| FitsError::MissingKeyword(format!("TBCOL{n}")))?;
        if !matches!(start.checked_add(width), Some(end) if end <= row_bytes) {
            return Err(bad());
        }
        columns.push(AsciiColumn {
            start,
            width,
            code,
            scaling: scaling(header, n),
            null: header.get(&format!("TNULL{n}")).map(str::to_string),
        });
    }

    let mut table = Table::new(column_names(header, n_fields));
    if row_bytes == 0 {
        return Ok(table);
    }
    for row in rows.chunks_exact(row_bytes) {
        table.push_row(
            columns
                .iter()
                .map(|c| {
                    let text = String::from_utf8_lossy(&row[c.start..c.start + c.width]);
                    let text = text.trim();
                    if c.code == 'A' {
                        return Value::Text(text.to_string());
                    }
                    if text.is_empty() || c.null.as_deref() == Some(text) {
                        return Value::Missing;
                    }
                    let parsed = match c.code {
                        'I' => text.parse::<i64>().map(Value::Integer).ok(),
                        _ => text.replace('D', "E").parse::<f64>().map(Value::Float).ok(),
                    };
                    match (parsed, c.scaling) {
                        (None, _) => Value::Missing,
                        (Some(v), None) => v,
                        (Some(v), Some((scale, zero))) => {
                            Value::Float(v.as_f64().unwrap_or(0.0) * scale + zero)
                        }
                    }
                })
                .collect(),
        );
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Accumulates 80-column header cards.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    cards: Vec<String>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical, integer or float value (written right-justified).
    pub fn raw(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.cards.push(format!("{key:<8}= {value:>20}"));
        self
    }

    pub fn string(mut self, key: &str, value: &str) -> Self {
        let quoted = format!("'{:<8}'", value.replace('\'', "''"));
        self.cards.push(format!("{key:<8}= {quoted:<20}"));
        self
    }

    /// Header bytes terminated by `END` and padded with blanks to a block.
    pub fn finish(mut self) -> Vec<u8> {
        self.cards.push("END".to_string());
        let mut out: Vec<u8> = self
            .cards
            .iter()
            .flat_map(|c| format!("{c:<80}").into_bytes().into_iter().take(CARD_SIZE))
            .collect();
        out.resize(padded(out.len()), b' ');
        out
    }
}

enum OutColumn {
    Long,
    Double,
    Logical,
    Chars(usize),
}

/// Encode `table` as a FITS file: an empty primary HDU followed by one
/// `BINTABLE`. Integer columns become `K` (missing = `TNULL`), other
/// numeric columns `D` (missing = NaN), booleans `L`, everything else `A`.
pub fn encode_bintable(table: &Table) -> Vec<u8> {
    let kinds: Vec<OutColumn> = (0..table.width())
        .map(|idx| {
            let present: Vec<&Value> = table.column_values(idx).filter(|v| !v.is_missing()).collect();
            if !present.is_empty() && present.iter().all(|v| matches!(v, Value::Integer(_))) {
                OutColumn::Long
            } else if !present.is_empty()
                && present.iter().all(|v| matches!(v, Value::Integer(_) | Value::Float(_)))
            {
                OutColumn::Double
            } else if !present.is_empty() && present.iter().all(|v| matches!(v, Value::Bool(_))) {
                OutColumn::Logical
            } else {
                let width = present.iter().map(|v| v.to_string().len()).max().unwrap_or(0);
                OutColumn::Chars(width.max(1))
            }
        })
        .collect();

    let row_bytes: usize = kinds
        .iter()
        .map(|k| match k {
            OutColumn::Long | OutColumn::Double => 8,
            OutColumn::Logical => 1,
            OutColumn::Chars(w) => *w,
        })
        .sum();

    let mut out = HeaderBuilder::new()
        .raw("SIMPLE", "T")
        .raw("BITPIX", 8)
        .raw("NAXIS", 0)
        .raw("EXTEND", "T")
        .finish();

    let mut ext = HeaderBuilder::new()
        .string("XTENSION", "BINTABLE")
        .raw("BITPIX", 8)
        .raw("NAXIS", 2)
        .raw("NAXIS1", row_bytes)
        .raw("NAXIS2", table.len())
        .raw("PCOUNT", 0)
        .raw("GCOUNT", 1)
        .raw("TFIELDS", table.width());
    for (i, (column, kind)) in table.columns.iter().zip(&kinds).enumerate() {
        let n = i + 1;
        ext = ext.string(&format!("TTYPE{n}"), &column.name);
        ext = match kind {
            OutColumn::Long => ext
                .string(&format!("TFORM{n}"), "K")
                .raw(&format!("TNULL{n}"), i64::MIN),
            OutColumn::Double => ext.string(&format!("TFORM{n}"), "D"),
            OutColumn::Logical => ext.string(&format!("TFORM{n}"), "L"),
            OutColumn::Chars(w) => ext.string(&format!("TFORM{n}"), &format!("{w}A")),
        };
    }
    out.extend(ext.finish());

    let start = out.len();
    for row in &table.rows {
        for (value, kind) in row.fields.iter().zip(&kinds) {
            match kind {
                OutColumn::Long => {
                    let v = match value {
                        Value::Integer(i) => *i,
                        _ => i64::MIN,
                    };
                    out.extend_from_slice(&v.to_be_bytes());
                }
                OutColumn::Double => {
                    let v = value.as_f64().unwrap_or(f64::NAN);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                OutColumn::Logical => out.push(match value {
                    Value::Bool(true) => b'T',
                    Value::Bool(false) => b'F',
                    _ => 0,
                }),
                OutColumn::Chars(w) => {
                    let text = if value.is_missing() { String::new() } else { value.to_string() };
                    let mut bytes = text.into_bytes();
                    bytes.resize(*w, b' ');
                    out.extend_from_slice(&bytes);
                }
            }
        }
    }
    let data_len = out.len() - start;
    out.resize(start + padded(data_len), 0);
    out
}
