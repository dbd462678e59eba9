//! Error types for repository operations

use thiserror::Error;

/// Errors that can occur while reconciling a table or running repository calls
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to check whether table '{table}' exists: {source}")]
    TableCheckFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to create table '{table}': {source}")]
    TableCreateFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to check column '{column}' on table '{table}': {source}")]
    ColumnCheckFailed {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to add column '{column}' to table '{table}': {source}")]
    ColumnAddFailed {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unsupported type for field '{field}': {type_name}")]
    UnsupportedFieldType { field: String, type_name: String },

    #[error("Field '{field}' has no column tag")]
    MissingColumnTag { field: String },

    #[error("Column '{column}' is declared by more than one field")]
    DuplicateColumn { column: String },

    #[error("Field '{field}' was not written by the entity")]
    MissingFieldValue { field: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Column '{column}' on table '{table}' cannot be NULL")]
    NullViolation { table: String, column: String },

    #[error("Failed to insert entity into table '{table}': {source}")]
    InsertFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to delete entity '{id}' from table '{table}': {source}")]
    DeleteFailed {
        table: String,
        id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to execute query on table '{table}' ({sql}): {source}")]
    QueryExecFailed {
        table: String,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to scan column '{column}' from table '{table}': {reason}")]
    RowScanFailed {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Schema migration of table '{table}' failed: {source}")]
    Migration {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} on table '{table}' timed out")]
    Timeout { operation: String, table: String },
}

impl RepositoryError {
    pub fn unsupported_field_type(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedFieldType {
            field: field.into(),
            type_name: type_name.into(),
        }
    }

    pub fn invalid_filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn row_scan(
        table: impl Into<String>,
        column: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::RowScanFailed {
            table: table.into(),
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            table: table.into(),
        }
    }

    /// Attach a table name to errors raised without one
    pub fn with_table(self, table_name: &str) -> Self {
        match self {
            Self::RowScanFailed {
                table,
                column,
                reason,
            } if table.is_empty() => Self::RowScanFailed {
                table: table_name.to_string(),
                column,
                reason,
            },
            other => other,
        }
    }

    /// Whether the failure came from the backing store rather than from the
    /// entity description or request
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::TableCheckFailed { .. }
                | Self::TableCreateFailed { .. }
                | Self::ColumnCheckFailed { .. }
                | Self::ColumnAddFailed { .. }
                | Self::InsertFailed { .. }
                | Self::DeleteFailed { .. }
                | Self::QueryExecFailed { .. }
                | Self::Migration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
