//! Fixed-width key encoding for the index.
//!
//! A [`KeySchema`] describes a tuple of columns with a *fixed* encoded
//! width each; [`KeySchema::encode`] packs a `&[Value]` into a flat byte
//! buffer such that plain byte-wise comparison of two encoded keys agrees
//! with the column-wise comparison of the original values. This lets every
//! B+Tree comparison site use a single `Ord` call on `&[u8]` instead of
//! decoding back to `Value` on every key touch, matching the generic-key
//! convention real embedded engines use for fixed-schema indexes.

use std::cmp::Ordering;
use std::sync::Arc;

use common::{DbError, DbResult};
use types::{SqlType, Value};

/// One column of a key schema, with the fixed width it occupies once
/// encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyColumn {
    Int,
    Bool,
    /// Fixed-width text: values longer than the width are rejected rather
    /// than silently truncated, since truncation could make two distinct
    /// keys compare equal.
    Text(usize),
}

impl KeyColumn {
    pub fn width(&self) -> usize {
        match self {
            KeyColumn::Int => 8,
            KeyColumn::Bool => 1,
            KeyColumn::Text(width) => *width,
        }
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            KeyColumn::Int => SqlType::Int,
            KeyColumn::Bool => SqlType::Bool,
            KeyColumn::Text(_) => SqlType::Text,
        }
    }
}

/// Describes the columns that make up an index key and their fixed,
/// injected encoding.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeySchema {
    columns: Vec<KeyColumn>,
}

impl KeySchema {
    pub fn new(columns: Vec<KeyColumn>) -> DbResult<Self> {
        if columns.is_empty() {
            return Err(DbError::InvalidArgument(
                "key schema must have at least one column".into(),
            ));
        }
        Ok(Self { columns })
    }

    /// Convenience constructor for the common single `Int` key used by
    /// every concurrency test scenario in this crate.
    pub fn single_int() -> Self {
        Self {
            columns: vec![KeyColumn::Int],
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.columns.iter().map(KeyColumn::width).sum()
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    /// Packs `values` into the schema's fixed-width wire format.
    pub fn encode(&self, values: &[Value]) -> DbResult<Vec<u8>> {
        if values.len() != self.columns.len() {
            return Err(DbError::InvalidArgument(format!(
                "key has {} columns, schema expects {}",
                values.len(),
                self.columns.len()
            )));
        }

        let mut out = Vec::with_capacity(self.encoded_len());
        for (value, column) in values.iter().zip(&self.columns) {
            match (value, column) {
                (Value::Int(i), KeyColumn::Int) => {
                    // Flip the sign bit so two's-complement i64s compare
                    // correctly under plain unsigned byte-wise ordering.
                    let biased = (*i as u64) ^ 0x8000_0000_0000_0000;
                    out.extend_from_slice(&biased.to_be_bytes());
                }
                (Value::Bool(b), KeyColumn::Bool) => {
                    out.push(if *b { 1 } else { 0 });
                }
                (Value::Text(s), KeyColumn::Text(width)) => {
                    let bytes = s.as_bytes();
                    if bytes.len() > *width {
                        return Err(DbError::InvalidArgument(format!(
                            "text key {s:?} exceeds fixed width {width}"
                        )));
                    }
                    out.extend_from_slice(bytes);
                    out.resize(out.len() + (*width - bytes.len()), 0u8);
                }
                _ => {
                    return Err(DbError::InvalidArgument(format!(
                        "value {value:?} does not match column type {:?}",
                        column.sql_type()
                    )));
                }
            }
        }
        Ok(out)
    }

    /// Unpacks an encoded key back into `Value`s. Used for diagnostics and
    /// tests; the hot comparison path never needs to decode.
    pub fn decode(&self, bytes: &[u8]) -> DbResult<Vec<Value>> {
        if bytes.len() != self.encoded_len() {
            return Err(DbError::InvalidArgument(
                "encoded key length does not match schema".into(),
            ));
        }
        let mut values = Vec::with_capacity(self.columns.len());
        let mut offset = 0;
        for column in &self.columns {
            let width = column.width();
            let chunk = &bytes[offset..offset + width];
            let value = match column {
                KeyColumn::Int => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(chunk);
                    let biased = u64::from_be_bytes(buf);
                    Value::Int((biased ^ 0x8000_0000_0000_0000) as i64)
                }
                KeyColumn::Bool => Value::Bool(chunk[0] != 0),
                KeyColumn::Text(_) => {
                    let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                    Value::Text(String::from_utf8_lossy(&chunk[..end]).into_owned())
                }
            };
            values.push(value);
            offset += width;
        }
        Ok(values)
    }
}

/// Injected comparator for encoded keys. Since [`KeySchema::encode`]
/// produces an order-preserving fixed-width encoding, comparison is a
/// plain byte-wise compare.
#[derive(Clone, Debug)]
pub struct KeyComparator {
    schema: Arc<KeySchema>,
}

impl KeyComparator {
    pub fn new(schema: Arc<KeySchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<KeySchema> {
        &self.schema
    }

    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
