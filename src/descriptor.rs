//! Column descriptors
//!
//! Flattens an entity layout into the ordered column list that drives
//! reconciliation, inserts, query compilation and row mapping. All of those
//! paths go through [`extract_descriptors`], so a field without a column tag
//! fails the same way everywhere.

use std::collections::HashSet;

use serde::Serialize;

use crate::entity::{Describe, FieldLayout};
use crate::error::{RepositoryError, Result};
use crate::sql::sanitize::validate_identifier;
use crate::types::{ColumnType, Constraints, SemanticType};

/// One persisted column of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Field name used in [`crate::Record`]
    pub field: String,
    /// Column name in the table
    pub name: String,
    pub semantic_type: SemanticType,
    pub constraints: Constraints,
}

impl ColumnDescriptor {
    pub fn column_type(&self) -> Result<ColumnType> {
        ColumnType::for_field(&self.field, &self.semantic_type)
    }
}

/// Descriptor summary for logging and diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    pub constraints: Constraints,
}

/// Flatten `E`'s layout into column descriptors
pub fn extract_descriptors<E: Describe>() -> Result<Vec<ColumnDescriptor>> {
    extract_layout(&E::layout())
}

/// Flatten a layout, embedded groups inlined in declaration order
pub fn extract_layout(layout: &[FieldLayout]) -> Result<Vec<ColumnDescriptor>> {
    let mut descriptors = Vec::new();
    collect(layout, &mut descriptors)?;

    let mut seen = HashSet::new();
    for descriptor in &descriptors {
        if !seen.insert(descriptor.name.as_str()) {
            return Err(RepositoryError::DuplicateColumn {
                column: descriptor.name.clone(),
            });
        }
    }

    Ok(descriptors)
}

fn collect(layout: &[FieldLayout], out: &mut Vec<ColumnDescriptor>) -> Result<()> {
    for entry in layout {
        match entry {
            FieldLayout::Embedded { fields, .. } => collect(fields, out)?,
            FieldLayout::Field(spec) => {
                let column = spec.column.ok_or_else(|| RepositoryError::MissingColumnTag {
                    field: spec.name.to_string(),
                })?;
                validate_identifier(column, &[]).map_err(RepositoryError::InvalidIdentifier)?;

                out.push(ColumnDescriptor {
                    field: spec.name.to_string(),
                    name: column.to_string(),
                    semantic_type: spec.semantic_type.clone(),
                    constraints: spec.constraints,
                });
            }
        }
    }
    Ok(())
}

/// Map every descriptor to its column type, failing on the first unsupported one
pub fn summarize(descriptors: &[ColumnDescriptor]) -> Result<Vec<ColumnSummary>> {
    descriptors
        .iter()
        .map(|d| {
            Ok(ColumnSummary {
                name: d.name.clone(),
                column_type: d.column_type()?,
                constraints: d.constraints,
            })
        })
        .collect()
}
