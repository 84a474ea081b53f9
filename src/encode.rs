//! Row encoding: one row of a columnar batch becomes one flat record.
//!
//! Two encodings are supported:
//!
//! - **Features**: a structured `key{N}` -> feature mapping serialized as
//!   JSON. Integer-family columns widen to `i64`, floats map to `f32`,
//!   character columns copy raw bytes.
//! - **Raw**: a self-describing binary layout, little-endian:
//!   `[column_count: u64]` then `[type_tag: u32][length: u64][bytes]` per
//!   column. A tag of `0xFFFF_FFFF` marks a null or unencodable column with
//!   a declared length of 1 and a single zero payload byte, so the layout
//!   can always be walked by declared lengths alone.
//!
//! Unsupported column types are skipped (features) or emitted as the null
//! marker (raw) with a diagnostic; the rest of the row is still produced.

use arrow::array::{
    Array, BinaryArray, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeBinaryArray, LargeStringArray,
    StringArray, Time32MillisecondArray, Time32SecondArray, Time64MicrosecondArray,
    Time64NanosecondArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RecordError;

/// Tag marking a null or unencodable column in the raw layout.
pub const NULL_TAG: u32 = u32::MAX;

/// Type tag of an encoded column in the raw layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ColumnTag {
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    Float32 = 6,
    Float64 = 7,
    Bytes = 8,
}

impl ColumnTag {
    fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(ColumnTag::Bool),
            2 => Some(ColumnTag::Int8),
            3 => Some(ColumnTag::Int16),
            4 => Some(ColumnTag::Int32),
            5 => Some(ColumnTag::Int64),
            6 => Some(ColumnTag::Float32),
            7 => Some(ColumnTag::Float64),
            8 => Some(ColumnTag::Bytes),
            _ => None,
        }
    }

    /// Payload width in bytes, or `None` for variable-length columns.
    fn fixed_width(&self) -> Option<u64> {
        match self {
            ColumnTag::Bool | ColumnTag::Int8 => Some(1),
            ColumnTag::Int16 => Some(2),
            ColumnTag::Int32 | ColumnTag::Float32 => Some(4),
            ColumnTag::Int64 | ColumnTag::Float64 => Some(8),
            ColumnTag::Bytes => None,
        }
    }
}

/// A decoded column value from the raw layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    /// The column was null or could not be encoded.
    Null,
}

/// One feature of a structured row record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Int64List(Vec<i64>),
    FloatList(Vec<f32>),
    BytesList(Vec<Vec<u8>>),
}

/// A structured row record keyed by positional synthetic names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub features: IndexMap<String, Feature>,
}

/// A typed scalar pulled out of one column at one row.
enum ColumnScalar<'a> {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(&'a [u8]),
}

impl ColumnScalar<'_> {
    fn tag(&self) -> ColumnTag {
        match self {
            ColumnScalar::Bool(_) => ColumnTag::Bool,
            ColumnScalar::Int8(_) => ColumnTag::Int8,
            ColumnScalar::Int16(_) => ColumnTag::Int16,
            ColumnScalar::Int32(_) => ColumnTag::Int32,
            ColumnScalar::Int64(_) => ColumnTag::Int64,
            ColumnScalar::Float32(_) => ColumnTag::Float32,
            ColumnScalar::Float64(_) => ColumnTag::Float64,
            ColumnScalar::Bytes(_) => ColumnTag::Bytes,
        }
    }

    fn put_payload(&self, buf: &mut BytesMut) {
        match self {
            ColumnScalar::Bool(v) => {
                buf.put_u64_le(1);
                buf.put_u8(*v as u8);
            }
            ColumnScalar::Int8(v) => {
                buf.put_u64_le(1);
                buf.put_i8(*v);
            }
            ColumnScalar::Int16(v) => {
                buf.put_u64_le(2);
                buf.put_i16_le(*v);
            }
            ColumnScalar::Int32(v) => {
                buf.put_u64_le(4);
                buf.put_i32_le(*v);
            }
            ColumnScalar::Int64(v) => {
                buf.put_u64_le(8);
                buf.put_i64_le(*v);
            }
            ColumnScalar::Float32(v) => {
                buf.put_u64_le(4);
                buf.put_f32_le(*v);
            }
            ColumnScalar::Float64(v) => {
                buf.put_u64_le(8);
                buf.put_f64_le(*v);
            }
            ColumnScalar::Bytes(v) => {
                buf.put_u64_le(v.len() as u64);
                buf.put_slice(v);
            }
        }
    }

    /// Widen into a feature: integers to i64, floats to f32, bytes as-is.
    fn to_feature(&self) -> Feature {
        match self {
            ColumnScalar::Bool(v) => Feature::Int64List(vec![*v as i64]),
            ColumnScalar::Int8(v) => Feature::Int64List(vec![*v as i64]),
            ColumnScalar::Int16(v) => Feature::Int64List(vec![*v as i64]),
            ColumnScalar::Int32(v) => Feature::Int64List(vec![*v as i64]),
            ColumnScalar::Int64(v) => Feature::Int64List(vec![*v]),
            ColumnScalar::Float32(v) => Feature::FloatList(vec![*v]),
            ColumnScalar::Float64(v) => Feature::FloatList(vec![*v as f32]),
            ColumnScalar::Bytes(v) => Feature::BytesList(vec![v.to_vec()]),
        }
    }
}

/// Read a typed scalar from `array` at `row`.
///
/// Returns `None` for column types the encoder does not support. The caller
/// is responsible for checking nullity first.
fn read_column(array: &dyn Array, row: usize) -> Option<ColumnScalar<'_>> {
    let any = array.as_any();
    match array.data_type() {
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| ColumnScalar::Bool(a.value(row))),
        DataType::Int8 => any
            .downcast_ref::<Int8Array>()
            .map(|a| ColumnScalar::Int8(a.value(row))),
        DataType::Int16 => any
            .downcast_ref::<Int16Array>()
            .map(|a| ColumnScalar::Int16(a.value(row))),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| ColumnScalar::Int32(a.value(row))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .map(|a| ColumnScalar::Int32(a.value(row))),
        DataType::Date64 => any
            .downcast_ref::<Date64Array>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Time32(TimeUnit::Second) => any
            .downcast_ref::<Time32SecondArray>()
            .map(|a| ColumnScalar::Int32(a.value(row))),
        DataType::Time32(TimeUnit::Millisecond) => any
            .downcast_ref::<Time32MillisecondArray>()
            .map(|a| ColumnScalar::Int32(a.value(row))),
        DataType::Time64(TimeUnit::Microsecond) => any
            .downcast_ref::<Time64MicrosecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Time64(TimeUnit::Nanosecond) => any
            .downcast_ref::<Time64NanosecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Timestamp(TimeUnit::Second, _) => any
            .downcast_ref::<TimestampSecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Timestamp(TimeUnit::Millisecond, _) => any
            .downcast_ref::<TimestampMillisecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Timestamp(TimeUnit::Microsecond, _) => any
            .downcast_ref::<TimestampMicrosecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => any
            .downcast_ref::<TimestampNanosecondArray>()
            .map(|a| ColumnScalar::Int64(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| ColumnScalar::Float32(a.value(row))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| ColumnScalar::Float64(a.value(row))),
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| ColumnScalar::Bytes(a.value(row).as_bytes())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| ColumnScalar::Bytes(a.value(row).as_bytes())),
        DataType::Binary => any
            .downcast_ref::<BinaryArray>()
            .map(|a| ColumnScalar::Bytes(a.value(row))),
        DataType::LargeBinary => any
            .downcast_ref::<LargeBinaryArray>()
            .map(|a| ColumnScalar::Bytes(a.value(row))),
        _ => None,
    }
}

fn put_null_column(buf: &mut BytesMut) {
    buf.put_u32_le(NULL_TAG);
    buf.put_u64_le(1);
    buf.put_u8(0);
}

/// Encode one row of `batch` in the raw tagged layout.
pub fn encode_row_raw(batch: &RecordBatch, row: usize) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u64_le(batch.num_columns() as u64);

    for (index, column) in batch.columns().iter().enumerate() {
        if column.is_null(row) {
            put_null_column(&mut buf);
            continue;
        }
        match read_column(column.as_ref(), row) {
            Some(scalar) => {
                buf.put_u32_le(scalar.tag() as u32);
                scalar.put_payload(&mut buf);
            }
            None => {
                warn!(
                    column = index,
                    data_type = %column.data_type(),
                    "Cannot encode column type, emitting null marker"
                );
                put_null_column(&mut buf);
            }
        }
    }

    buf.freeze()
}

/// Encode one row of `batch` as a JSON feature record.
pub fn encode_row_features(batch: &RecordBatch, row: usize) -> Result<Bytes, RecordError> {
    let mut record = FeatureRecord::default();

    for (index, column) in batch.columns().iter().enumerate() {
        if column.is_null(row) {
            continue;
        }
        match read_column(column.as_ref(), row) {
            Some(scalar) => {
                record
                    .features
                    .insert(format!("key{index}"), scalar.to_feature());
            }
            None => {
                warn!(
                    column = index,
                    data_type = %column.data_type(),
                    "Cannot encode column type, skipping"
                );
            }
        }
    }

    let json =
        serde_json::to_vec(&record).map_err(|source| RecordError::Serialize { source })?;
    Ok(Bytes::from(json))
}

/// Decode a record produced by [`encode_row_raw`].
///
/// The walk relies exclusively on the declared lengths; column widths are
/// verified against their tags but never assumed.
pub fn decode_row_raw(record: &[u8]) -> Result<Vec<ColumnValue>, RecordError> {
    let mut buf = record;
    let total = record.len();
    let offset = |remaining: usize| total - remaining;

    let need = |buf: &&[u8], n: usize| -> Result<(), RecordError> {
        if buf.remaining() < n {
            Err(RecordError::Truncated {
                offset: offset(buf.remaining()),
                needed: n - buf.remaining(),
            })
        } else {
            Ok(())
        }
    };

    need(&buf, 8)?;
    let column_count = buf.get_u64_le();
    let mut columns = Vec::with_capacity(column_count as usize);

    for _ in 0..column_count {
        need(&buf, 4)?;
        let tag_offset = offset(buf.remaining());
        let raw_tag = buf.get_u32_le();

        need(&buf, 8)?;
        let len = buf.get_u64_le();
        need(&buf, len as usize)?;

        if raw_tag == NULL_TAG {
            buf.advance(len as usize);
            columns.push(ColumnValue::Null);
            continue;
        }

        let tag = ColumnTag::from_u32(raw_tag).ok_or(RecordError::UnknownTag {
            tag: raw_tag,
            offset: tag_offset,
        })?;
        if let Some(expected) = tag.fixed_width() {
            if len != expected {
                return Err(RecordError::PayloadWidth { tag, len, expected });
            }
        }

        let value = match tag {
            ColumnTag::Bool => ColumnValue::Bool(buf.get_u8() != 0),
            ColumnTag::Int8 => ColumnValue::Int8(buf.get_i8()),
            ColumnTag::Int16 => ColumnValue::Int16(buf.get_i16_le()),
            ColumnTag::Int32 => ColumnValue::Int32(buf.get_i32_le()),
            ColumnTag::Int64 => ColumnValue::Int64(buf.get_i64_le()),
            ColumnTag::Float32 => ColumnValue::Float32(buf.get_f32_le()),
            ColumnTag::Float64 => ColumnValue::Float64(buf.get_f64_le()),
            ColumnTag::Bytes => {
                let mut bytes = vec![0u8; len as usize];
                buf.copy_to_slice(&mut bytes);
                ColumnValue::Bytes(bytes)
            }
        };
        columns.push(value);
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Decimal128Array;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("count", DataType::Int64, false),
            Field::new("score", DataType::Float64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("maybe", DataType::Int32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![7])),
                Arc::new(Float64Array::from(vec![2.5])),
                Arc::new(StringArray::from(vec!["carrot"])),
                Arc::new(Int32Array::from(vec![None::<i32>])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_raw_roundtrip_with_null() {
        let batch = sample_batch();
        let record = encode_row_raw(&batch, 0);
        let columns = decode_row_raw(&record).unwrap();

        assert_eq!(
            columns,
            vec![
                ColumnValue::Int64(7),
                ColumnValue::Float64(2.5),
                ColumnValue::Bytes(b"carrot".to_vec()),
                ColumnValue::Null,
            ]
        );
    }

    #[test]
    fn test_raw_unsupported_type_becomes_null_marker() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("amount", DataType::Decimal128(38, 10), false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(Decimal128Array::from(vec![123i128])),
            ],
        )
        .unwrap();

        let record = encode_row_raw(&batch, 0);
        let columns = decode_row_raw(&record).unwrap();
        assert_eq!(columns, vec![ColumnValue::Int64(1), ColumnValue::Null]);
    }

    #[test]
    fn test_raw_integer_family_widths() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("flag", DataType::Boolean, false),
            Field::new("tiny", DataType::Int8, false),
            Field::new("small", DataType::Int16, false),
            Field::new("day", DataType::Date32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(BooleanArray::from(vec![true])),
                Arc::new(Int8Array::from(vec![-3i8])),
                Arc::new(Int16Array::from(vec![-900i16])),
                Arc::new(Date32Array::from(vec![19_000])),
            ],
        )
        .unwrap();

        let columns = decode_row_raw(&encode_row_raw(&batch, 0)).unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnValue::Bool(true),
                ColumnValue::Int8(-3),
                ColumnValue::Int16(-900),
                ColumnValue::Int32(19_000),
            ]
        );
    }

    #[test]
    fn test_decode_truncated_record() {
        let batch = sample_batch();
        let record = encode_row_raw(&batch, 0);
        let err = decode_row_raw(&record[..record.len() - 3]).unwrap_err();
        assert!(matches!(err, RecordError::Truncated { .. }));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut buf = BytesMut::new();
        buf.put_u64_le(1);
        buf.put_u32_le(999);
        buf.put_u64_le(0);
        let err = decode_row_raw(&buf).unwrap_err();
        assert!(matches!(err, RecordError::UnknownTag { tag: 999, .. }));
    }

    #[test]
    fn test_feature_encoding_widens_and_skips_nulls() {
        let batch = sample_batch();
        let json = encode_row_features(&batch, 0).unwrap();
        let record: FeatureRecord = serde_json::from_slice(&json).unwrap();

        assert_eq!(
            record.features.get("key0"),
            Some(&Feature::Int64List(vec![7]))
        );
        assert_eq!(
            record.features.get("key1"),
            Some(&Feature::FloatList(vec![2.5]))
        );
        assert_eq!(
            record.features.get("key2"),
            Some(&Feature::BytesList(vec![b"carrot".to_vec()]))
        );
        // Null column produces no feature.
        assert!(!record.features.contains_key("key3"));
    }

    #[test]
    fn test_feature_keys_are_positional() {
        let batch = sample_batch();
        let json = encode_row_features(&batch, 0).unwrap();
        let record: FeatureRecord = serde_json::from_slice(&json).unwrap();
        let keys: Vec<&str> = record.features.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["key0", "key1", "key2"]);
    }
}
