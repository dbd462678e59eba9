//! # entity-repository
//!
//! A generic, schema-reconciling PostgreSQL repository for typed entities.
//!
//! Each entity type describes its persisted fields once. From that
//! description the crate derives the table layout, keeps the table in step
//! with it (create if missing, add missing columns, never alter or drop), and
//! provides create, delete and filtered query operations that map rows back
//! into entity values.
//!
//! ## Features
//!
//! - **Declarative Fields**: Column names, types and constraints come from [`Describe::layout`]
//! - **Additive Reconciliation**: Missing tables and columns are created; drift is reported, not fixed
//! - **Insert-or-Skip**: `set` never overwrites an existing id
//! - **Simple Queries**: AND-combined `=`, `!=`, `>`, `<` filters with sorting and pagination
//! - **SQL Injection Prevention**: Identifiers are validated and quoted, values are always bound
//! - **In-Memory Backend**: [`InMemoryRepository`] with the same observable behavior
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entity_repository::{
//!     BaseModel, BaseRepository, Describe, Entity, FieldLayout, PostgresRepository,
//!     QueryRequest, Record,
//! };
//!
//! #[derive(Debug, Clone)]
//! struct Ticket {
//!     base: BaseModel,
//!     status: String,
//!     priority: i32,
//! }
//!
//! impl Describe for Ticket {
//!     fn layout() -> Vec<FieldLayout> {
//!         vec![
//!             FieldLayout::embedded("base", BaseModel::layout()),
//!             FieldLayout::field::<String>("status").column("status").not_null(),
//!             FieldLayout::field::<i32>("priority").column("priority"),
//!         ]
//!     }
//! }
//!
//! impl Entity for Ticket {
//!     fn base(&self) -> &BaseModel {
//!         &self.base
//!     }
//!
//!     fn write_fields(&self, record: &mut Record) {
//!         self.base.write_fields(record);
//!         record.put("status", &self.status);
//!         record.put("priority", self.priority);
//!     }
//!
//!     fn read_fields(record: &mut Record) -> entity_repository::Result<Self> {
//!         Ok(Self {
//!             base: BaseModel::read_fields(record)?,
//!             status: record.take("status")?,
//!             priority: record.take("priority")?,
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/mydb").await?;
//!
//!     // Creates or extends the "tickets" table
//!     let tickets = PostgresRepository::<Ticket>::new(pool, "tickets").await?;
//!
//!     let ticket = Ticket {
//!         base: BaseModel::new("t-1").with_tags(["billing"]),
//!         status: "open".to_string(),
//!         priority: 3,
//!     };
//!     tickets.set(&ticket).await?;
//!
//!     let urgent = tickets
//!         .query(
//!             &QueryRequest::new()
//!                 .eq("status", "open")
//!                 .gt("priority", 2)
//!                 .sort_by("created_at")
//!                 .descending()
//!                 .with_limit(10),
//!         )
//!         .await?;
//!     println!("{} urgent tickets", urgent.len());
//!
//!     tickets.delete("t-1").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use std::time::Duration;
//! use entity_repository::RepositoryConfig;
//!
//! let config = RepositoryConfig::builder("tickets")
//!     .schema("support")                              // Default: current_schema()
//!     .statement_timeout(Duration::from_secs(5))      // Default: no deadline
//!     .advisory_lock(true)                            // Serialize reconciliation (default)
//!     .build();
//! ```

pub mod config;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod memory;
pub mod query;
pub mod reconcile;
pub mod repository;
pub mod row;
pub mod sql;
pub mod store;
mod timeout;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use config::{RepositoryConfig, RepositoryConfigBuilder};
pub use descriptor::{ColumnDescriptor, ColumnSummary, extract_descriptors};
pub use entity::{BaseModel, Describe, Entity, FieldLayout, FieldSpec, MetaValue, Metadata, Record};
pub use error::{RepositoryError, Result};
pub use memory::InMemoryRepository;
pub use query::{Filter, Operator, QueryRequest};
pub use reconcile::{ColumnDrift, ReconcileReport};
pub use repository::BaseRepository;
pub use store::PostgresRepository;
pub use types::{ColumnType, Constraint, Constraints, FieldType, SemanticType};
pub use value::{FromValue, Value};

// Re-export SQL utilities for advanced users
pub use sql::ddl::DdlGenerator;
pub use sql::sanitize::{quote_identifier, validate_identifier};
