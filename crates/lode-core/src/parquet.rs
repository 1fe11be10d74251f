//! Parquet encoding and decoding for table batches.
//!
//! The on-disk layout is schema-driven rather than per-record-type:
//! timestamps are stored as microsecond `Int64` columns and JSON documents
//! as serialized UTF-8, which keeps the file readable by any Parquet tool
//! without carrying logical-type baggage.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema};
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;

use crate::batch::{Batch, Row};
use crate::error::{Error, Result};
use crate::table::{Column, TableSchema};
use crate::value::{DataType, Value};

fn ser_err(message: impl Into<String>) -> Error {
    Error::Serialization {
        message: message.into(),
    }
}

fn arrow_type(data_type: DataType) -> ArrowDataType {
    match data_type {
        DataType::String | DataType::Json => ArrowDataType::Utf8,
        DataType::Int64 | DataType::Timestamp => ArrowDataType::Int64,
        DataType::Float64 => ArrowDataType::Float64,
        DataType::Boolean => ArrowDataType::Boolean,
    }
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_created_by(format!("lode {}", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Encodes a batch into Parquet bytes laid out by the table schema.
pub(crate) fn encode_table(schema: &TableSchema, batch: &Batch) -> Result<Bytes> {
    let fields: Vec<Field> = schema
        .columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.data_type), true))
        .collect();
    let arrow_schema = Arc::new(ArrowSchema::new(fields));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        arrays.push(encode_column(column, batch)?);
    }
    let record_batch = RecordBatch::try_new(Arc::clone(&arrow_schema), arrays)
        .map_err(|e| ser_err(format!("building record batch: {e}")))?;

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, arrow_schema, Some(writer_properties()))
        .map_err(|e| ser_err(format!("opening parquet writer: {e}")))?;
    writer
        .write(&record_batch)
        .map_err(|e| ser_err(format!("writing parquet data: {e}")))?;
    writer
        .close()
        .map_err(|e| ser_err(format!("closing parquet writer: {e}")))?;
    Ok(Bytes::from(buf))
}

fn type_mismatch(column: &Column, value: &Value) -> Error {
    ser_err(format!(
        "column {} expects {:?}, found {}",
        column.name,
        column.data_type,
        value.type_name()
    ))
}

fn encode_column(column: &Column, batch: &Batch) -> Result<ArrayRef> {
    let name = column.name.as_str();
    match column.data_type {
        DataType::String => {
            let mut values: Vec<Option<String>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(StringArray::from_iter(values)))
        }
        DataType::Json => {
            let mut values: Vec<Option<String>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::Json(doc)) => Some(
                        serde_json::to_string(doc)
                            .map_err(|e| ser_err(format!("column {name}: {e}")))?,
                    ),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(StringArray::from_iter(values)))
        }
        DataType::Int64 => {
            let mut values: Vec<Option<i64>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::Int64(n)) => Some(*n),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(Int64Array::from_iter(values)))
        }
        DataType::Timestamp => {
            let mut values: Vec<Option<i64>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::Timestamp(ts)) => Some(ts.timestamp_micros()),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(Int64Array::from_iter(values)))
        }
        DataType::Float64 => {
            let mut values: Vec<Option<f64>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::Float64(f)) => Some(*f),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(Float64Array::from_iter(values)))
        }
        DataType::Boolean => {
            let mut values: Vec<Option<bool>> = Vec::with_capacity(batch.len());
            for row in batch.rows() {
                values.push(match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(Value::Boolean(b)) => Some(*b),
                    Some(other) => return Err(type_mismatch(column, other)),
                });
            }
            Ok(Arc::new(BooleanArray::from_iter(values)))
        }
    }
}

/// Decodes Parquet bytes back into rows shaped by the table schema.
pub(crate) fn decode_table(schema: &TableSchema, bytes: Bytes) -> Result<Batch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| ser_err(format!("opening parquet reader: {e}")))?;
    let reader = builder
        .build()
        .map_err(|e| ser_err(format!("building parquet reader: {e}")))?;

    let mut batch = Batch::new();
    for record in reader {
        let record = record.map_err(|e| ser_err(format!("reading parquet data: {e}")))?;
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            columns.push(decode_column(column, &record)?);
        }
        for i in 0..record.num_rows() {
            let mut row = Row::new();
            for (position, column) in schema.columns.iter().enumerate() {
                row.set(column.name.as_str(), columns[position][i].clone());
            }
            batch.push(row);
        }
    }
    Ok(batch)
}

/// Reads the row count from Parquet metadata without decoding row data.
pub(crate) fn count_rows(bytes: Bytes) -> Result<u64> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| ser_err(format!("opening parquet reader: {e}")))?;
    let rows = builder.metadata().file_metadata().num_rows();
    u64::try_from(rows).map_err(|_| ser_err(format!("negative row count {rows} in metadata")))
}

fn decode_column(column: &Column, record: &RecordBatch) -> Result<Vec<Value>> {
    let name = column.name.as_str();
    let array = record
        .column_by_name(name)
        .ok_or_else(|| ser_err(format!("column {name} missing from parquet data")))?;

    let mut values = Vec::with_capacity(record.num_rows());
    match column.data_type {
        DataType::String => {
            let array = downcast::<StringArray>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    Value::String(array.value(i).to_string())
                });
            }
        }
        DataType::Json => {
            let array = downcast::<StringArray>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    let doc = serde_json::from_str(array.value(i))
                        .map_err(|e| ser_err(format!("column {name}: {e}")))?;
                    Value::Json(doc)
                });
            }
        }
        DataType::Int64 => {
            let array = downcast::<Int64Array>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    Value::Int64(array.value(i))
                });
            }
        }
        DataType::Timestamp => {
            let array = downcast::<Int64Array>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    let micros = array.value(i);
                    let ts = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                        ser_err(format!("column {name}: timestamp {micros} out of range"))
                    })?;
                    Value::Timestamp(ts)
                });
            }
        }
        DataType::Float64 => {
            let array = downcast::<Float64Array>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    Value::Float64(array.value(i))
                });
            }
        }
        DataType::Boolean => {
            let array = downcast::<BooleanArray>(name, array)?;
            for i in 0..array.len() {
                values.push(if array.is_null(i) {
                    Value::Null
                } else {
                    Value::Boolean(array.value(i))
                });
            }
        }
    }
    Ok(values)
}

fn downcast<'a, T: Array + 'static>(name: &str, array: &'a ArrayRef) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ser_err(format!("column {name} has unexpected physical type")))
}
