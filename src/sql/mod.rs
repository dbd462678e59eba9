//! SQL utilities for repositories
//!
//! Provides SQL generation, sanitization, and query building utilities.

pub mod condition;
pub mod ddl;
pub mod sanitize;
pub mod statement;

pub use condition::{build_order_by_clause, build_where_clause};
pub use ddl::DdlGenerator;
pub use sanitize::{POSTGRES_RESERVED_WORDS, quote_identifier, validate_identifier};
pub use statement::{CompiledInsert, CompiledQuery, compile_delete, compile_insert, compile_select};
