//! DML statement compilation
//!
//! Turns descriptors and query requests into parameterized SQL plus the
//! values to bind, in placeholder order.

use crate::descriptor::ColumnDescriptor;
use crate::entity::Record;
use crate::error::{RepositoryError, Result};
use crate::query::QueryRequest;
use crate::sql::condition::{build_order_by_clause, build_where_clause};
use crate::sql::sanitize::quote_identifier;
use crate::types::ColumnType;
use crate::value::Value;

/// SQL text with its bind parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A bind parameter together with the column type it targets, so NULLs can be
/// bound with the right type
#[derive(Debug, Clone, PartialEq)]
pub struct TypedParam {
    pub column_type: ColumnType,
    pub value: Value,
}

/// INSERT statement with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledInsert {
    pub sql: String,
    pub params: Vec<TypedParam>,
}

fn column_list(descriptors: &[ColumnDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| quote_identifier(&d.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compile a SELECT over the descriptor columns
///
/// The column list is explicit so rows are decoded by name regardless of the
/// physical column order. LIMIT and OFFSET are emitted only when positive.
pub fn compile_select(
    table: &str,
    descriptors: &[ColumnDescriptor],
    request: &QueryRequest,
) -> Result<CompiledQuery> {
    let mut sql = format!("SELECT {} FROM {}", column_list(descriptors), table);
    let mut params = Vec::new();

    let mut param_offset = 1;
    if let Some((clause, values)) = build_where_clause(&request.filters, &mut param_offset)? {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
        params = values;
    }

    if let Some(order_by) = build_order_by_clause(request.sort_by.as_deref(), request.descending)
    {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by);
    }

    if request.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", request.limit));
    }
    if request.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", request.offset));
    }

    Ok(CompiledQuery { sql, params })
}

/// Compile an INSERT that skips rows conflicting with any primary key or
/// UNIQUE constraint
///
/// Every descriptor must have a value in `record`.
pub fn compile_insert(
    table: &str,
    descriptors: &[ColumnDescriptor],
    mut record: Record,
) -> Result<CompiledInsert> {
    let mut params = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let value = record
            .remove(&descriptor.field)
            .ok_or_else(|| RepositoryError::MissingFieldValue {
                field: descriptor.field.clone(),
            })?;
        params.push(TypedParam {
            column_type: descriptor.column_type()?,
            value,
        });
    }

    let placeholders = (1..=descriptors.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        table,
        column_list(descriptors),
        placeholders
    );

    Ok(CompiledInsert { sql, params })
}

/// Compile a DELETE by primary key column
pub fn compile_delete(table: &str, key_column: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        table,
        quote_identifier(key_column)
    )
}

/// Column holding the primary key, falling back to `id`
pub fn primary_key_column(descriptors: &[ColumnDescriptor]) -> &str {
    descriptors
        .iter()
        .find(|d| d.constraints.primary_key)
        .map(|d| d.name.as_str())
        .unwrap_or("id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::extract_layout;
    use crate::entity::{BaseModel, Describe, FieldLayout};

    fn descriptors() -> Vec<ColumnDescriptor> {
        extract_layout(&[
            FieldLayout::embedded("base", BaseModel::layout()),
            FieldLayout::field::<String>("status").column("status"),
            FieldLayout::field::<i32>("priority").column("priority"),
        ])
        .unwrap()
    }

    const COLUMNS: &str = "\"id\", \"created_at\", \"metadata\", \"tags\", \"status\", \"priority\"";

    #[test]
    fn test_select_all() {
        let compiled = compile_select("\"tickets\"", &descriptors(), &QueryRequest::new()).unwrap();
        assert_eq!(compiled.sql, format!("SELECT {} FROM \"tickets\"", COLUMNS));
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_select_full_request() {
        let request = QueryRequest::new()
            .eq("status", "open")
            .gt("priority", 2)
            .sort_by("created_at")
            .descending()
            .paginate(20, 10);

        let compiled = compile_select("\"tickets\"", &descriptors(), &request).unwrap();
        assert_eq!(
            compiled.sql,
            format!(
                "SELECT {} FROM \"tickets\" WHERE \"status\" = $1 AND \"priority\" > $2 \
                 ORDER BY \"created_at\" DESC LIMIT 10 OFFSET 20",
                COLUMNS
            )
        );
        assert_eq!(
            compiled.params,
            vec![Value::Text("open".to_string()), Value::Integer(2)]
        );
    }

    #[test]
    fn test_select_zero_limit_and_offset_are_omitted() {
        let request = QueryRequest::new().sort_by("priority").paginate(0, 0);
        let compiled = compile_select("\"tickets\"", &descriptors(), &request).unwrap();
        assert!(compiled.sql.ends_with("ORDER BY \"priority\" ASC"));
        assert!(!compiled.sql.contains("LIMIT"));
        assert!(!compiled.sql.contains("OFFSET"));
    }

    #[test]
    fn test_select_negative_pagination_is_ignored() {
        let request = QueryRequest::new().paginate(-1, -5);
        let compiled = compile_select("\"tickets\"", &descriptors(), &request).unwrap();
        assert!(!compiled.sql.contains("LIMIT"));
        assert!(!compiled.sql.contains("OFFSET"));
    }

    #[test]
    fn test_select_offset_only() {
        let request = QueryRequest::new().with_offset(3);
        let compiled = compile_select("\"tickets\"", &descriptors(), &request).unwrap();
        assert!(compiled.sql.ends_with(" OFFSET 3"));
        assert!(!compiled.sql.contains("LIMIT"));
    }

    #[test]
    fn test_insert() {
        let base = BaseModel::new("t-1").with_tags(["a"]);
        let mut record = Record::new();
        base.write_fields(&mut record);
        record.put("status", "open");
        record.put("priority", Value::Null);

        let compiled = compile_insert("\"tickets\"", &descriptors(), record).unwrap();
        assert_eq!(
            compiled.sql,
            format!(
                "INSERT INTO \"tickets\" ({}) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
                COLUMNS
            )
        );
        assert_eq!(compiled.params.len(), 6);
        assert_eq!(compiled.params[0].value, Value::Text("t-1".to_string()));
        assert_eq!(compiled.params[3].column_type, ColumnType::TextArray);
        assert_eq!(compiled.params[5].column_type, ColumnType::Integer);
        assert!(compiled.params[5].value.is_null());
    }

    #[test]
    fn test_insert_missing_value() {
        let mut record = Record::new();
        BaseModel::new("t-1").write_fields(&mut record);
        record.put("status", "open");

        let err = compile_insert("\"tickets\"", &descriptors(), record).unwrap_err();
        assert!(matches!(err, RepositoryError::MissingFieldValue { field } if field == "priority"));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            compile_delete("\"tickets\"", "id"),
            "DELETE FROM \"tickets\" WHERE \"id\" = $1"
        );
    }

    #[test]
    fn test_primary_key_column() {
        assert_eq!(primary_key_column(&descriptors()), "id");

        let no_pk = extract_layout(&[FieldLayout::field::<String>("code").column("code")]).unwrap();
        assert_eq!(primary_key_column(&no_pk), "id");

        let custom = extract_layout(&[
            FieldLayout::field::<String>("code").column("code").primary_key(),
        ])
        .unwrap();
        assert_eq!(primary_key_column(&custom), "code");
    }
}
