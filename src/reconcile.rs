//! Additive schema reconciliation
//!
//! Brings a table up to date with an entity's descriptors: creates the table
//! if it is missing and adds missing columns. Existing columns are never
//! altered or dropped; a column whose stored type differs from the declared
//! one is reported in [`ReconcileReport::drifted_columns`] and left alone.
//!
//! The whole run happens in one transaction, optionally behind a
//! transaction-scoped advisory lock keyed on the table, so a failure leaves the
//! table as it was and concurrent runs for the same table serialize.

use serde::Serialize;
use sqlx::PgPool;

use crate::config::RepositoryConfig;
use crate::descriptor::ColumnDescriptor;
use crate::error::{RepositoryError, Result};
use crate::sql::ddl::DdlGenerator;
use crate::timeout::with_deadline;
use crate::types::ColumnType;

/// Column whose stored type differs from the declared one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDrift {
    pub column: String,
    pub expected: ColumnType,
    /// `udt_name` reported by `information_schema.columns`
    pub actual: String,
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub table_created: bool,
    pub added_columns: Vec<String>,
    pub drifted_columns: Vec<ColumnDrift>,
    /// DDL statements executed, in order
    pub ddl: Vec<String>,
}

impl ReconcileReport {
    /// True when the run executed no DDL
    pub fn is_noop(&self) -> bool {
        self.ddl.is_empty()
    }
}

/// Reconciles one table against a descriptor list
pub struct SchemaReconciler<'a> {
    pool: &'a PgPool,
    config: &'a RepositoryConfig,
    descriptors: &'a [ColumnDescriptor],
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(
        pool: &'a PgPool,
        config: &'a RepositoryConfig,
        descriptors: &'a [ColumnDescriptor],
    ) -> Self {
        Self {
            pool,
            config,
            descriptors,
        }
    }

    /// Run reconciliation, committing only if every step succeeds
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let table = self.config.table_name.as_str();
        let schema = self.config.schema_name.as_deref();
        let deadline = self.config.statement_timeout;
        let ddl = DdlGenerator::new(self.config);
        let mut report = ReconcileReport::default();

        let migration_err = |source| RepositoryError::Migration {
            table: table.to_string(),
            source,
        };

        let mut tx = with_deadline(deadline, "begin reconciliation", table, async {
            self.pool.begin().await.map_err(migration_err)
        })
        .await?;

        if self.config.advisory_lock {
            let key = self.config.qualified_table();
            with_deadline(deadline, "advisory lock", table, async {
                sqlx::query(ddl.advisory_lock())
                    .bind(&key)
                    .execute(&mut *tx)
                    .await
                    .map_err(migration_err)
            })
            .await?;
        }

        let exists: bool = with_deadline(deadline, "table check", table, async {
            sqlx::query_scalar(ddl.table_exists_query())
                .bind(table)
                .bind(schema)
                .fetch_one(&mut *tx)
                .await
                .map_err(|source| RepositoryError::TableCheckFailed {
                    table: table.to_string(),
                    source,
                })
        })
        .await?;

        if !exists {
            let create_sql = ddl.generate_create_empty_table();
            with_deadline(deadline, "create table", table, async {
                sqlx::query(&create_sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(|source| RepositoryError::TableCreateFailed {
                        table: table.to_string(),
                        source,
                    })
            })
            .await?;
            tracing::info!(table, "Created table");
            report.table_created = true;
            report.ddl.push(create_sql);
        }

        for descriptor in self.descriptors {
            let column = descriptor.name.as_str();
            let column_type = descriptor.column_type()?;

            let existing: Option<String> = with_deadline(deadline, "column check", table, async {
                sqlx::query_scalar(ddl.column_type_query())
                    .bind(table)
                    .bind(schema)
                    .bind(column)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|source| RepositoryError::ColumnCheckFailed {
                        table: table.to_string(),
                        column: column.to_string(),
                        source,
                    })
            })
            .await?;

            match existing {
                Some(actual) if actual != column_type.udt_name() => {
                    tracing::warn!(
                        table,
                        column,
                        expected = column_type.udt_name(),
                        actual = actual.as_str(),
                        "Column type differs from declaration; leaving column unchanged"
                    );
                    report.drifted_columns.push(ColumnDrift {
                        column: column.to_string(),
                        expected: column_type,
                        actual,
                    });
                }
                Some(_) => {}
                None => {
                    let add_sql = ddl.generate_add_column(descriptor, column_type);
                    with_deadline(deadline, "add column", table, async {
                        sqlx::query(&add_sql)
                            .execute(&mut *tx)
                            .await
                            .map_err(|source| RepositoryError::ColumnAddFailed {
                                table: table.to_string(),
                                column: column.to_string(),
                                source,
                            })
                    })
                    .await?;
                    tracing::info!(table, column, column_type = %column_type, "Added column");
                    report.added_columns.push(column.to_string());
                    report.ddl.push(add_sql);
                }
            }
        }

        with_deadline(deadline, "commit reconciliation", table, async {
            tx.commit().await.map_err(migration_err)
        })
        .await?;

        Ok(report)
    }
}
