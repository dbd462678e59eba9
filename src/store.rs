//! PostgresRepository - entity repository backed by a PostgreSQL table
//!
//! Construction reconciles the table with the entity's descriptors; after
//! that every call borrows one pooled connection for one statement.

use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::RepositoryConfig;
use crate::descriptor::{ColumnDescriptor, extract_descriptors, summarize};
use crate::entity::{Entity, Record};
use crate::error::{RepositoryError, Result};
use crate::query::QueryRequest;
use crate::reconcile::{ReconcileReport, SchemaReconciler};
use crate::repository::BaseRepository;
use crate::row::{bind_value, row_to_entity};
use crate::sql::statement::{compile_delete, compile_insert, compile_select, primary_key_column};
use crate::timeout::with_deadline;

/// Repository for entity type `E` stored in one PostgreSQL table
///
/// Holds only the pool handle, its configuration and the descriptors derived
/// at construction, so it can be shared freely across tasks.
pub struct PostgresRepository<E> {
    /// Database connection pool
    pool: PgPool,
    /// Repository configuration
    config: RepositoryConfig,
    /// Quoted, possibly schema-qualified table reference
    table_ref: String,
    descriptors: Arc<[ColumnDescriptor]>,
    report: Arc<ReconcileReport>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PostgresRepository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: self.config.clone(),
            table_ref: self.table_ref.clone(),
            descriptors: Arc::clone(&self.descriptors),
            report: Arc::clone(&self.report),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> PostgresRepository<E> {
    /// Create a repository, reconciling the table first
    ///
    /// This will:
    /// 1. Validate the table name and derive the entity's column descriptors
    /// 2. Create the table if it doesn't exist
    /// 3. Add any missing columns
    ///
    /// Any failure aborts construction with the table unchanged.
    pub async fn new(pool: PgPool, config: impl Into<RepositoryConfig>) -> Result<Self> {
        let config = config.into();
        let table = config.table_name.clone();

        let result = Self::prepare(&pool, &config).await;
        let (descriptors, report) = result.inspect_err(|e| {
            tracing::warn!(table = table.as_str(), error = %e, "Repository construction failed");
        })?;

        tracing::debug!(
            table = table.as_str(),
            columns = descriptors.len(),
            created = report.table_created,
            added = report.added_columns.len(),
            "Repository ready"
        );

        Ok(Self {
            pool,
            table_ref: config.qualified_table(),
            config,
            descriptors: descriptors.into(),
            report: Arc::new(report),
            _entity: PhantomData,
        })
    }

    /// Create a repository for `table_name` with default configuration
    pub async fn open(pool: PgPool, table_name: &str) -> Result<Self> {
        Self::new(pool, RepositoryConfig::from(table_name)).await
    }

    async fn prepare(
        pool: &PgPool,
        config: &RepositoryConfig,
    ) -> Result<(Vec<ColumnDescriptor>, ReconcileReport)> {
        config.validate()?;
        let descriptors = extract_descriptors::<E>()?;
        // reject unsupported field types before touching the database
        summarize(&descriptors)?;

        let report = SchemaReconciler::new(pool, config, &descriptors)
            .reconcile()
            .await?;
        Ok((descriptors, report))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    /// Column descriptors in declaration order
    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    /// What reconciliation did when this repository was constructed
    pub fn reconcile_report(&self) -> &ReconcileReport {
        &self.report
    }

    /// Run reconciliation again, e.g. to pick up drift reports
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        SchemaReconciler::new(&self.pool, &self.config, &self.descriptors)
            .reconcile()
            .await
    }

    async fn insert(&self, entity: &E) -> Result<u64> {
        let table = self.table_name();
        let mut record = Record::new();
        entity.write_fields(&mut record);
        let compiled = compile_insert(&self.table_ref, &self.descriptors, record)?;

        let mut query = sqlx::query(&compiled.sql);
        for param in &compiled.params {
            query = bind_value(query, &param.value, Some(param.column_type));
        }

        let result = with_deadline(self.config.statement_timeout, "insert", table, async {
            query
                .execute(&self.pool)
                .await
                .map_err(|source| RepositoryError::InsertFailed {
                    table: table.to_string(),
                    source,
                })
        })
        .await
        .inspect_err(|e| tracing::error!(table, error = %e, "Failed to insert entity"))?;

        let inserted = result.rows_affected();
        if inserted == 0 {
            tracing::debug!(table, id = entity.id(), "Insert skipped, conflicting value exists");
        }
        Ok(inserted)
    }

    async fn remove(&self, id: &str) -> Result<u64> {
        let table = self.table_name();
        let sql = compile_delete(&self.table_ref, primary_key_column(&self.descriptors));

        let result = with_deadline(self.config.statement_timeout, "delete", table, async {
            sqlx::query(&sql)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|source| RepositoryError::DeleteFailed {
                    table: table.to_string(),
                    id: id.to_string(),
                    source,
                })
        })
        .await
        .inspect_err(|e| tracing::error!(table, id, error = %e, "Failed to delete entity"))?;

        Ok(result.rows_affected())
    }

    async fn select(&self, request: &QueryRequest) -> Result<Vec<E>> {
        let table = self.table_name();
        let compiled = compile_select(&self.table_ref, &self.descriptors, request)?;
        tracing::debug!(
            table,
            sql = compiled.sql.as_str(),
            params = compiled.params.len(),
            "Executing query"
        );

        let mut query = sqlx::query(&compiled.sql);
        for param in &compiled.params {
            query = bind_value(query, param, None);
        }

        let rows = with_deadline(self.config.statement_timeout, "query", table, async {
            query
                .fetch_all(&self.pool)
                .await
                .map_err(|source| RepositoryError::QueryExecFailed {
                    table: table.to_string(),
                    sql: compiled.sql.clone(),
                    source,
                })
        })
        .await
        .inspect_err(|e| tracing::error!(table, error = %e, "Query failed"))?;

        rows.iter()
            .map(|row| row_to_entity::<E>(row, &self.descriptors, table))
            .collect()
    }
}

impl<E: Entity> BaseRepository<E> for PostgresRepository<E> {
    async fn set(&self, entity: &E) -> Result<u64> {
        self.insert(entity).await
    }

    async fn delete(&self, id: &str) -> Result<u64> {
        self.remove(id).await
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<E>> {
        self.select(request).await
    }
}
