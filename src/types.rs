//! Field semantic types, column types and constraints
//!
//! `SemanticType` describes what a Rust field holds, `ColumnType` is what the
//! table stores. `ColumnType::for_field` is the total mapping between the two.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};

// ============================================================================
// Semantic Types
// ============================================================================

/// Structural type of an entity field, independent of any backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    String,
    /// Signed integer of the given bit width
    Integer { bits: u8 },
    /// Unsigned integer of the given bit width
    Unsigned { bits: u8 },
    /// Floating point number of the given bit width
    Float { bits: u8 },
    Boolean,
    /// Instant in time with a UTC offset
    Timestamp,
    /// Value whose shape is only known at runtime (metadata values, raw JSON)
    Any,
    Bytes,
    Map {
        key: Box<SemanticType>,
        value: Box<SemanticType>,
    },
    Sequence(Box<SemanticType>),
    /// Nested record that is not flattened into the parent
    Struct(&'static str),
}

impl SemanticType {
    pub fn map(key: SemanticType, value: SemanticType) -> Self {
        SemanticType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn sequence(element: SemanticType) -> Self {
        SemanticType::Sequence(Box::new(element))
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::String => write!(f, "string"),
            SemanticType::Integer { bits } => write!(f, "i{}", bits),
            SemanticType::Unsigned { bits } => write!(f, "u{}", bits),
            SemanticType::Float { bits } => write!(f, "f{}", bits),
            SemanticType::Boolean => write!(f, "bool"),
            SemanticType::Timestamp => write!(f, "timestamp"),
            SemanticType::Any => write!(f, "any"),
            SemanticType::Bytes => write!(f, "bytes"),
            SemanticType::Map { key, value } => write!(f, "map<{}, {}>", key, value),
            SemanticType::Sequence(element) => write!(f, "sequence<{}>", element),
            SemanticType::Struct(name) => write!(f, "struct {}", name),
        }
    }
}

/// Rust types that can appear as entity fields
///
/// `Option<T>` reports the same semantic type as `T`; nullability is a column
/// constraint, not a type.
pub trait FieldType {
    fn semantic_type() -> SemanticType;
}

macro_rules! impl_field_type {
    ($($ty:ty => $semantic:expr),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn semantic_type() -> SemanticType {
                    $semantic
                }
            }
        )*
    };
}

impl_field_type! {
    String => SemanticType::String,
    i8 => SemanticType::Integer { bits: 8 },
    i16 => SemanticType::Integer { bits: 16 },
    i32 => SemanticType::Integer { bits: 32 },
    i64 => SemanticType::Integer { bits: 64 },
    u8 => SemanticType::Unsigned { bits: 8 },
    u16 => SemanticType::Unsigned { bits: 16 },
    u32 => SemanticType::Unsigned { bits: 32 },
    u64 => SemanticType::Unsigned { bits: 64 },
    f32 => SemanticType::Float { bits: 32 },
    f64 => SemanticType::Float { bits: 64 },
    bool => SemanticType::Boolean,
    DateTime<Utc> => SemanticType::Timestamp,
    serde_json::Value => SemanticType::Any,
    Box<[u8]> => SemanticType::Bytes,
}

impl<T: FieldType> FieldType for Option<T> {
    fn semantic_type() -> SemanticType {
        T::semantic_type()
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn semantic_type() -> SemanticType {
        SemanticType::sequence(T::semantic_type())
    }
}

impl<K: FieldType, V: FieldType> FieldType for BTreeMap<K, V> {
    fn semantic_type() -> SemanticType {
        SemanticType::map(K::semantic_type(), V::semantic_type())
    }
}

impl<K: FieldType, V: FieldType> FieldType for HashMap<K, V> {
    fn semantic_type() -> SemanticType {
        SemanticType::map(K::semantic_type(), V::semantic_type())
    }
}

// ============================================================================
// Column Types
// ============================================================================

/// Column types this crate creates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
    TimestampTz,
    Jsonb,
    TextArray,
}

impl ColumnType {
    /// Map a field's semantic type to a column type
    ///
    /// Fails with `UnsupportedFieldType` naming the field for everything outside
    /// the supported set.
    pub fn for_field(field: &str, semantic: &SemanticType) -> Result<Self> {
        let column_type = match semantic {
            SemanticType::String => ColumnType::Text,
            SemanticType::Integer { .. } => ColumnType::Integer,
            SemanticType::Float { .. } => ColumnType::Real,
            SemanticType::Boolean => ColumnType::Boolean,
            SemanticType::Timestamp => ColumnType::TimestampTz,
            SemanticType::Map { key, value }
                if **key == SemanticType::String && **value == SemanticType::Any =>
            {
                ColumnType::Jsonb
            }
            SemanticType::Sequence(element) if **element == SemanticType::String => {
                ColumnType::TextArray
            }
            other => {
                return Err(RepositoryError::unsupported_field_type(
                    field,
                    other.to_string(),
                ));
            }
        };
        Ok(column_type)
    }

    /// Convert column type to PostgreSQL type string
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            ColumnType::Jsonb => "JSONB",
            ColumnType::TextArray => "TEXT[]",
        }
    }

    /// `information_schema.columns.udt_name` of a column created with this type
    pub fn udt_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "int4",
            ColumnType::Real => "float4",
            ColumnType::Boolean => "bool",
            ColumnType::TimestampTz => "timestamptz",
            ColumnType::Jsonb => "jsonb",
            ColumnType::TextArray => "_text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql_type())
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Single column constraint as written in a constraint tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl FromStr for Constraint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primarykey" => Ok(Constraint::PrimaryKey),
            "notnull" => Ok(Constraint::NotNull),
            "unique" => Ok(Constraint::Unique),
            other => Err(format!("Unknown constraint '{}'", other)),
        }
    }
}

/// Constraint set of a column
///
/// A primary key implies NOT NULL and UNIQUE, so the other two flags are not
/// emitted when it is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
}

impl Constraints {
    pub fn insert(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::PrimaryKey => self.primary_key = true,
            Constraint::NotNull => self.not_null = true,
            Constraint::Unique => self.unique = true,
        }
    }

    /// Parse a comma separated tag such as `"unique,notnull"`
    pub fn parse(tag: &str) -> std::result::Result<Self, String> {
        let mut constraints = Constraints::default();
        for part in tag.split(',').filter(|p| !p.trim().is_empty()) {
            constraints.insert(part.parse()?);
        }
        Ok(constraints)
    }

    /// SQL constraint suffix for a column definition
    pub fn to_sql(&self) -> String {
        if self.primary_key {
            return " PRIMARY KEY".to_string();
        }
        let mut sql = String::new();
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }
}
