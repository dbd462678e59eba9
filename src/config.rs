//! Configuration for repositories
//!
//! Provides a builder pattern for binding a repository to a table.

use std::time::Duration;

use crate::error::{RepositoryError, Result};
use crate::sql::sanitize::{quote_identifier, validate_identifier};

/// Configuration for a repository bound to one table
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Table backing the repository
    pub table_name: String,
    /// PostgreSQL schema holding the table (default: `current_schema()`)
    pub schema_name: Option<String>,
    /// Deadline applied to every backing-store call (default: none)
    pub statement_timeout: Option<Duration>,
    /// Serialize reconciliation per table with a transaction-scoped advisory lock
    pub advisory_lock: bool,
}

impl RepositoryConfig {
    /// Create a new configuration builder
    pub fn builder(table_name: impl Into<String>) -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::new(table_name)
    }

    /// Check the table and schema names before any SQL is generated from them
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table_name, &[]).map_err(RepositoryError::InvalidIdentifier)?;
        if let Some(schema) = &self.schema_name {
            validate_identifier(schema, &[]).map_err(RepositoryError::InvalidIdentifier)?;
        }
        Ok(())
    }

    /// Table reference for DML/DDL, schema-qualified when a schema is configured
    pub fn qualified_table(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(&self.table_name)
            ),
            None => quote_identifier(&self.table_name),
        }
    }
}

/// Builder for RepositoryConfig
#[derive(Debug)]
pub struct RepositoryConfigBuilder {
    table_name: String,
    schema_name: Option<String>,
    statement_timeout: Option<Duration>,
    advisory_lock: bool,
}

impl RepositoryConfigBuilder {
    /// Create a new builder for the given table
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            schema_name: None,
            statement_timeout: None,
            advisory_lock: true,
        }
    }

    /// Place the table in a specific PostgreSQL schema
    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Abort any single backing-store call that runs longer than `timeout`
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Enable or disable the reconciliation advisory lock (default: true)
    pub fn advisory_lock(mut self, enabled: bool) -> Self {
        self.advisory_lock = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RepositoryConfig {
        RepositoryConfig {
            table_name: self.table_name,
            schema_name: self.schema_name,
            statement_timeout: self.statement_timeout,
            advisory_lock: self.advisory_lock,
        }
    }
}

impl From<&str> for RepositoryConfig {
    fn from(table_name: &str) -> Self {
        RepositoryConfig::builder(table_name).build()
    }
}

impl From<String> for RepositoryConfig {
    fn from(table_name: String) -> Self {
        RepositoryConfig::builder(table_name).build()
    }
}
