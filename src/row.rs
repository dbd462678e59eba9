//! Mapping between `Value`s and PostgreSQL rows/parameters

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::descriptor::ColumnDescriptor;
use crate::entity::{Entity, Record};
use crate::error::{RepositoryError, Result};
use crate::types::ColumnType;
use crate::value::Value;

/// Decode one column by name according to its column type
fn decode_column(
    row: &PgRow,
    column: &str,
    column_type: ColumnType,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match column_type {
        ColumnType::Text => row.try_get::<Option<String>, _>(column)?.map(Value::Text),
        ColumnType::Integer => row
            .try_get::<Option<i32>, _>(column)?
            .map(|v| Value::Integer(v.into())),
        ColumnType::Real => row
            .try_get::<Option<f32>, _>(column)?
            .map(|v| Value::Real(v.into())),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(column)?.map(Value::Boolean),
        ColumnType::TimestampTz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(column)?
            .map(Value::Timestamp),
        ColumnType::Jsonb => row
            .try_get::<Option<serde_json::Value>, _>(column)?
            .map(Value::Json),
        ColumnType::TextArray => row
            .try_get::<Option<Vec<String>>, _>(column)?
            .map(Value::TextArray),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Read every descriptor column of `row` into a record keyed by field name
pub fn row_to_record(
    row: &PgRow,
    descriptors: &[ColumnDescriptor],
    table: &str,
) -> Result<Record> {
    let mut record = Record::new();
    for descriptor in descriptors {
        let value = decode_column(row, &descriptor.name, descriptor.column_type()?)
            .map_err(|e| RepositoryError::row_scan(table, &descriptor.name, e))?;
        record.insert(descriptor.field.clone(), value);
    }
    Ok(record)
}

/// Build an entity from one result row
pub fn row_to_entity<E: Entity>(
    row: &PgRow,
    descriptors: &[ColumnDescriptor],
    table: &str,
) -> Result<E> {
    let mut record = row_to_record(row, descriptors, table)?;
    E::read_fields(&mut record).map_err(|e| e.with_table(table))
}

/// Bind a value; NULL is bound with the given column type, or as TEXT
pub fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
    column_type: Option<ColumnType>,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => bind_null(query, column_type.unwrap_or(ColumnType::Text)),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Integer(n) => query.bind(*n),
        Value::Real(n) => query.bind(*n),
        Value::Boolean(b) => query.bind(*b),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Json(json) => query.bind(json),
        Value::TextArray(items) => query.bind(items.as_slice()),
    }
}

fn bind_null<'q>(
    query: Query<'q, Postgres, PgArguments>,
    column_type: ColumnType,
) -> Query<'q, Postgres, PgArguments> {
    match column_type {
        ColumnType::Text => query.bind(None::<String>),
        ColumnType::Integer => query.bind(None::<i64>),
        ColumnType::Real => query.bind(None::<f64>),
        ColumnType::Boolean => query.bind(None::<bool>),
        ColumnType::TimestampTz => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        ColumnType::Jsonb => query.bind(None::<serde_json::Value>),
        ColumnType::TextArray => query.bind(None::<Vec<String>>),
    }
}
