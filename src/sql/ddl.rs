//! DDL generation for schema reconciliation
//!
//! Generates the catalog lookups and the additive statements the reconciler
//! runs. Nothing here alters or drops existing structure.

use crate::config::RepositoryConfig;
use crate::descriptor::ColumnDescriptor;
use crate::sql::sanitize::quote_identifier;
use crate::types::ColumnType;

/// DDL generator for one repository table
pub struct DdlGenerator<'a> {
    config: &'a RepositoryConfig,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator with the given configuration
    pub fn new(config: &'a RepositoryConfig) -> Self {
        Self { config }
    }

    /// Catalog lookup for the table
    ///
    /// Binds: `$1` table name, `$2` schema name (NULL means `current_schema()`).
    pub fn table_exists_query(&self) -> &'static str {
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = COALESCE($2, current_schema()) AND table_name = $1)"
    }

    /// Catalog lookup returning the `udt_name` of a column, no row if absent
    ///
    /// Binds: `$1` table name, `$2` schema name, `$3` column name.
    pub fn column_type_query(&self) -> &'static str {
        "SELECT udt_name::text FROM information_schema.columns \
         WHERE table_schema = COALESCE($2, current_schema()) AND table_name = $1 AND column_name = $3"
    }

    /// Transaction-scoped advisory lock keyed on the qualified table name
    pub fn advisory_lock(&self) -> &'static str {
        "SELECT pg_advisory_xact_lock(hashtext($1))"
    }

    /// Generate CREATE TABLE for a table with no columns
    ///
    /// Columns are always added one by one afterwards, so a fresh table and a
    /// partially migrated one go through the same path.
    pub fn generate_create_empty_table(&self) -> String {
        format!("CREATE TABLE {} ()", self.config.qualified_table())
    }

    /// Generate ALTER TABLE ... ADD COLUMN for a descriptor
    pub fn generate_add_column(
        &self,
        descriptor: &ColumnDescriptor,
        column_type: ColumnType,
    ) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.config.qualified_table(),
            Self::format_column_definition(descriptor, column_type)
        )
    }

    /// Format a column definition: quoted name, type, constraints
    pub fn format_column_definition(
        descriptor: &ColumnDescriptor,
        column_type: ColumnType,
    ) -> String {
        format!(
            "{} {}{}",
            quote_identifier(&descriptor.name),
            column_type.to_sql_type(),
            descriptor.constraints.to_sql()
        )
    }
}
