//! Entity contract
//!
//! An entity describes its fields once through [`Describe::layout`] and moves
//! its data in and out of a [`Record`] keyed by field name. The shared
//! [`BaseModel`] bundle (id, created_at, metadata, tags) is embedded in every
//! layout and reachable through [`Entity::base`].
//!
//! ```rust
//! use entity_repository::{BaseModel, Describe, Entity, FieldLayout, Record, Result};
//!
//! #[derive(Debug, Clone, PartialEq)]
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
//!     fn read_fields(record: &mut Record) -> Result<Self> {
//!         Ok(Self {
//!             base: BaseModel::read_fields(record)?,
//!             status: record.take("status")?,
//!             priority: record.take("priority")?,
//!         })
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::types::{Constraint, Constraints, FieldType, SemanticType};
use crate::value::{FromValue, Value};

// ============================================================================
// Metadata
// ============================================================================

/// Metadata values: a closed set that serializes the same way everywhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, MetaValue>),
}

/// Free-form metadata attached to every entity, stored as JSONB
pub type Metadata = BTreeMap<String, MetaValue>;

impl FieldType for MetaValue {
    fn semantic_type() -> SemanticType {
        SemanticType::Any
    }
}

impl MetaValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetaValue::Null => serde_json::Value::Null,
            MetaValue::Bool(b) => serde_json::Value::Bool(*b),
            // NaN and infinities have no JSON form
            MetaValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            MetaValue::String(s) => serde_json::Value::String(s.clone()),
            MetaValue::Map(map) => Self::map_to_json(map),
        }
    }

    /// Fails on JSON arrays, which have no metadata representation
    pub fn from_json(json: serde_json::Value) -> std::result::Result<Self, String> {
        match json {
            serde_json::Value::Null => Ok(MetaValue::Null),
            serde_json::Value::Bool(b) => Ok(MetaValue::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(MetaValue::Number)
                .ok_or_else(|| format!("number {} is not representable", n)),
            serde_json::Value::String(s) => Ok(MetaValue::String(s)),
            serde_json::Value::Object(_) => Self::map_from_json(json).map(MetaValue::Map),
            serde_json::Value::Array(_) => {
                Err("arrays are not supported in metadata".to_string())
            }
        }
    }

    pub fn map_to_json(map: &Metadata) -> serde_json::Value {
        serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// JSON null is treated as an empty map
    pub fn map_from_json(json: serde_json::Value) -> std::result::Result<Metadata, String> {
        match json {
            serde_json::Value::Object(object) => object
                .into_iter()
                .map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                .collect(),
            serde_json::Value::Null => Ok(Metadata::new()),
            other => Err(format!("expected a JSON object, got {}", other)),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::String(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::String(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Number(v.into())
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

// ============================================================================
// Field Layout
// ============================================================================

/// One leaf field of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name, the key used in [`Record`]
    pub name: &'static str,
    /// Column tag; `None` is rejected by descriptor extraction
    pub column: Option<&'static str>,
    pub semantic_type: SemanticType,
    pub constraints: Constraints,
}

/// Static description of an entity's fields in declaration order
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLayout {
    Field(FieldSpec),
    /// A nested group whose fields are flattened into the parent as if inlined
    Embedded {
        name: &'static str,
        fields: Vec<FieldLayout>,
    },
}

impl FieldLayout {
    /// Declare a leaf field of Rust type `T`
    pub fn field<T: FieldType>(name: &'static str) -> Self {
        FieldLayout::Field(FieldSpec {
            name,
            column: None,
            semantic_type: T::semantic_type(),
            constraints: Constraints::default(),
        })
    }

    /// Declare an embedded group
    pub fn embedded(name: &'static str, fields: Vec<FieldLayout>) -> Self {
        FieldLayout::Embedded { name, fields }
    }

    /// Set the column tag
    pub fn column(mut self, column: &'static str) -> Self {
        if let FieldLayout::Field(spec) = &mut self {
            spec.column = Some(column);
        }
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        if let FieldLayout::Field(spec) = &mut self {
            spec.constraints.insert(constraint);
        }
        self
    }

    pub fn primary_key(self) -> Self {
        self.constraint(Constraint::PrimaryKey)
    }

    pub fn not_null(self) -> Self {
        self.constraint(Constraint::NotNull)
    }

    pub fn unique(self) -> Self {
        self.constraint(Constraint::Unique)
    }
}

/// Types that can describe their persisted fields
pub trait Describe {
    fn layout() -> Vec<FieldLayout>;
}

// ============================================================================
// Record
// ============================================================================

/// Field values of one entity, keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, field: &str, value: impl Into<Value>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    /// Remove a field and convert it to `T`
    pub fn take<T: FromValue>(&mut self, field: &str) -> Result<T> {
        let value = self
            .values
            .remove(field)
            .ok_or_else(|| RepositoryError::MissingFieldValue {
                field: field.to_string(),
            })?;
        // table context is filled in by the repository
        T::from_value(value).map_err(|reason| RepositoryError::row_scan("", field, reason))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A persisted record type
pub trait Entity: Describe + Sized + Send + Sync + Unpin + 'static {
    fn base(&self) -> &BaseModel;

    /// Write every field named in the layout into `record`
    fn write_fields(&self, record: &mut Record);

    /// Rebuild the entity from the fields of one row
    fn read_fields(record: &mut Record) -> Result<Self>;

    fn id(&self) -> &str {
        &self.base().id
    }
}

/// Fields shared by every entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Caller-assigned primary key
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BaseModel {
    /// New base bundle with `created_at` set to now, truncated to the
    /// microsecond precision PostgreSQL stores
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
        Self {
            id: id.into(),
            created_at,
            metadata: Metadata::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn write_fields(&self, record: &mut Record) {
        record.put("id", &self.id);
        record.put("created_at", self.created_at);
        record.put("metadata", &self.metadata);
        record.put("tags", self.tags.clone());
    }

    pub fn read_fields(record: &mut Record) -> Result<Self> {
        Ok(Self {
            id: record.take("id")?,
            created_at: record.take("created_at")?,
            metadata: record.take("metadata")?,
            tags: record.take("tags")?,
        })
    }
}

impl Describe for BaseModel {
    fn layout() -> Vec<FieldLayout> {
        vec![
            FieldLayout::field::<String>("id").column("id").primary_key(),
            FieldLayout::field::<DateTime<Utc>>("created_at").column("created_at"),
            FieldLayout::field::<Metadata>("metadata").column("metadata"),
            FieldLayout::field::<Vec<String>>("tags").column("tags"),
        ]
    }
}
