//! Condition building for SQL WHERE and ORDER BY clauses

use crate::error::{RepositoryError, Result};
use crate::query::{Filter, Operator};
use crate::sql::sanitize::quote_identifier;
use crate::value::Value;

/// Build a WHERE condition from filter clauses
///
/// Returns `None` for an empty filter list. Otherwise the clauses are joined
/// with AND, each value bound to its own `$n` placeholder starting at
/// `*param_offset`, which is advanced past the last placeholder used.
///
/// A NULL value compiles to `IS NULL` / `IS NOT NULL` for `=` / `!=` and is
/// rejected for ordering operators. Column names are quoted, not validated.
pub fn build_where_clause(
    filters: &[Filter],
    param_offset: &mut usize,
) -> Result<Option<(String, Vec<Value>)>> {
    if filters.is_empty() {
        return Ok(None);
    }

    let mut clauses = Vec::with_capacity(filters.len());
    let mut params = Vec::with_capacity(filters.len());

    for filter in filters {
        let column = quote_identifier(&filter.field);

        if filter.value.is_null() {
            let clause = match filter.operator {
                Operator::Eq => format!("{} IS NULL", column),
                Operator::Ne => format!("{} IS NOT NULL", column),
                op => {
                    return Err(RepositoryError::invalid_filter(
                        &filter.field,
                        format!("operator {} cannot compare against NULL", op),
                    ));
                }
            };
            clauses.push(clause);
            continue;
        }

        clauses.push(format!(
            "{} {} ${}",
            column,
            filter.operator.as_sql(),
            param_offset
        ));
        params.push(filter.value.clone());
        *param_offset += 1;
    }

    Ok(Some((clauses.join(" AND "), params)))
}

/// Build an ORDER BY clause (without the keyword), `None` when unsorted
pub fn build_order_by_clause(sort_by: Option<&str>, descending: bool) -> Option<String> {
    let field = sort_by.filter(|f| !f.is_empty())?;
    let order = if descending { "DESC" } else { "ASC" };
    Some(format!("{} {}", quote_identifier(field), order))
}
