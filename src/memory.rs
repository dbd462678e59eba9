//! InMemoryRepository - a process-local repository for tests and prototyping
//!
//! Rows are stored keyed by column name, the same shape a table has, so
//! filters and sorting address columns exactly as they do against PostgreSQL.
//! Comparisons follow SQL rules: a NULL operand never matches `=`, `!=`, `>`
//! or `<`; filtering on NULL itself means `IS NULL` / `IS NOT NULL`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::RepositoryConfig;
use crate::descriptor::{ColumnDescriptor, extract_descriptors, summarize};
use crate::entity::{Entity, Record};
use crate::error::{RepositoryError, Result};
use crate::query::{Filter, Operator, QueryRequest};
use crate::repository::BaseRepository;
use crate::sql::statement::primary_key_column;
use crate::value::Value;

type Row = BTreeMap<String, Value>;

/// Repository for entity type `E` kept in memory, in insertion order
pub struct InMemoryRepository<E> {
    table_name: String,
    descriptors: Arc<[ColumnDescriptor]>,
    rows: Arc<RwLock<Vec<Row>>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            descriptors: Arc::clone(&self.descriptors),
            rows: Arc::clone(&self.rows),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> InMemoryRepository<E> {
    /// Create an empty repository
    ///
    /// Validates the table name and the entity description the same way the
    /// PostgreSQL repository does.
    pub fn new(config: impl Into<RepositoryConfig>) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        let descriptors = extract_descriptors::<E>()?;
        summarize(&descriptors)?;

        Ok(Self {
            table_name: config.table_name,
            descriptors: descriptors.into(),
            rows: Arc::new(RwLock::new(Vec::new())),
            _entity: PhantomData,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn descriptors(&self) -> &[ColumnDescriptor] {
        &self.descriptors
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn to_row(&self, entity: &E) -> Result<Row> {
        let mut record = Record::new();
        entity.write_fields(&mut record);

        let mut row = Row::new();
        for descriptor in self.descriptors.iter() {
            let value =
                record
                    .remove(&descriptor.field)
                    .ok_or_else(|| RepositoryError::MissingFieldValue {
                        field: descriptor.field.clone(),
                    })?;
            row.insert(descriptor.name.clone(), value);
        }
        Ok(row)
    }

    fn to_entity(&self, row: &Row) -> Result<E> {
        let mut record = Record::new();
        for descriptor in self.descriptors.iter() {
            let value = row.get(&descriptor.name).cloned().unwrap_or(Value::Null);
            record.insert(descriptor.field.clone(), value);
        }
        E::read_fields(&mut record).map_err(|e| e.with_table(&self.table_name))
    }

    /// Primary key and NOT NULL columns must hold a value
    fn check_not_null(&self, row: &Row) -> Result<()> {
        for descriptor in self.descriptors.iter() {
            let required = descriptor.constraints.primary_key || descriptor.constraints.not_null;
            let missing = row.get(&descriptor.name).is_none_or(Value::is_null);
            if required && missing {
                return Err(RepositoryError::NullViolation {
                    table: self.table_name.clone(),
                    column: descriptor.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// First primary key or unique column whose value is already stored
    ///
    /// NULLs never conflict.
    fn conflicting_column(&self, rows: &[Row], row: &Row) -> Option<&str> {
        self.descriptors
            .iter()
            .filter(|d| d.constraints.primary_key || d.constraints.unique)
            .find(|d| {
                row.get(&d.name)
                    .filter(|value| !value.is_null())
                    .is_some_and(|value| {
                        rows.iter()
                            .any(|existing| existing.get(&d.name) == Some(value))
                    })
            })
            .map(|d| d.name.as_str())
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if self.descriptors.iter().any(|d| d.name == column) {
            Ok(())
        } else {
            Err(RepositoryError::UnknownColumn {
                table: self.table_name.clone(),
                column: column.to_string(),
            })
        }
    }

    fn check_filter(&self, filter: &Filter) -> Result<()> {
        self.check_column(&filter.field)?;
        if filter.value.is_null() && matches!(filter.operator, Operator::Gt | Operator::Lt) {
            return Err(RepositoryError::invalid_filter(
                &filter.field,
                format!("operator {} cannot compare against NULL", filter.operator),
            ));
        }
        Ok(())
    }
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    let actual = row.get(&filter.field).unwrap_or(&Value::Null);

    if filter.value.is_null() {
        return match filter.operator {
            Operator::Eq => actual.is_null(),
            Operator::Ne => !actual.is_null(),
            Operator::Gt | Operator::Lt => false,
        };
    }

    match filter.operator {
        Operator::Eq => sql_equals(actual, &filter.value) == Some(true),
        Operator::Ne => sql_equals(actual, &filter.value) == Some(false),
        Operator::Gt => actual.compare(&filter.value) == Some(Ordering::Greater),
        Operator::Lt => actual.compare(&filter.value) == Some(Ordering::Less),
    }
}

/// Equality with SQL NULL semantics; values of the same kind compare
/// structurally, so JSON documents support `=` and `!=`
fn sql_equals(a: &Value, b: &Value) -> Option<bool> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if std::mem::discriminant(a) == std::mem::discriminant(b) {
        return Some(a == b);
    }
    a.compare(b).map(|ordering| ordering == Ordering::Equal)
}

/// PostgreSQL ordering: NULLs sort as larger than any value
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn window_len(n: i64) -> Option<usize> {
    (n > 0).then(|| usize::try_from(n).unwrap_or(usize::MAX))
}

impl<E: Entity> BaseRepository<E> for InMemoryRepository<E> {
    async fn set(&self, entity: &E) -> Result<u64> {
        let row = self.to_row(entity)?;
        self.check_not_null(&row)?;

        let mut rows = self.rows.write().await;
        // any key or unique conflict skips the row, like ON CONFLICT DO NOTHING
        if let Some(column) = self.conflicting_column(&rows, &row) {
            tracing::debug!(
                table = self.table_name.as_str(),
                id = entity.id(),
                column,
                "Insert skipped, conflicting value exists"
            );
            return Ok(0);
        }

        rows.push(row);
        Ok(1)
    }

    async fn delete(&self, id: &str) -> Result<u64> {
        let key = primary_key_column(&self.descriptors);
        let target = Value::from(id);

        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.get(key) != Some(&target));
        Ok((before - rows.len()) as u64)
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<E>> {
        for filter in &request.filters {
            self.check_filter(filter)?;
        }
        let sort_by = request.sort_by.as_deref().filter(|s| !s.is_empty());
        if let Some(column) = sort_by {
            self.check_column(column)?;
        }

        let rows = self.rows.read().await;
        let mut selected: Vec<&Row> = rows
            .iter()
            .filter(|row| request.filters.iter().all(|f| matches_filter(row, f)))
            .collect();

        if let Some(column) = sort_by {
            selected.sort_by(|a, b| {
                let a = a.get(column).unwrap_or(&Value::Null);
                let b = b.get(column).unwrap_or(&Value::Null);
                let ordering = compare_for_sort(a, b);
                if request.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let skip = window_len(request.offset).unwrap_or(0);
        let take = window_len(request.limit).unwrap_or(usize::MAX);

        selected
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| self.to_entity(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BaseModel, Describe, FieldLayout};
    use chrono::{TimeZone, Utc};

    #[derive(Debug, Clone, PartialEq)]
    struct Ticket {
        base: BaseModel,
        status: String,
        priority: i32,
        assignee: Option<String>,
    }

    impl Describe for Ticket {
        fn layout() -> Vec<FieldLayout> {
            vec![
                FieldLayout::embedded("base", BaseModel::layout()),
                FieldLayout::field::<String>("status").column("status"),
                FieldLayout::field::<i32>("priority").column("priority"),
                FieldLayout::field::<Option<String>>("assignee").column("assignee"),
            ]
        }
    }

    impl Entity for Ticket {
        fn base(&self) -> &BaseModel {
            &self.base
        }

        fn write_fields(&self, record: &mut Record) {
            self.base.write_fields(record);
            record.put("status", &self.status);
            record.put("priority", self.priority);
            record.put("assignee", self.assignee.clone());
        }

        fn read_fields(record: &mut Record) -> Result<Self> {
            Ok(Self {
                base: BaseModel::read_fields(record)?,
                status: record.take("status")?,
                priority: record.take("priority")?,
                assignee: record.take("assignee")?,
            })
        }
    }

    fn ticket(id: &str, status: &str, priority: i32, assignee: Option<&str>) -> Ticket {
        Ticket {
            base: BaseModel::new(id),
            status: status.to_string(),
            priority,
            assignee: assignee.map(str::to_string),
        }
    }

    async fn seeded() -> InMemoryRepository<Ticket> {
        let repo = InMemoryRepository::<Ticket>::new("tickets").unwrap();
        for t in [
            ticket("t1", "open", 1, Some("ana")),
            ticket("t2", "open", 3, None),
            ticket("t3", "closed", 5, Some("bo")),
            ticket("t4", "open", 4, Some("cy")),
        ] {
            assert_eq!(repo.set(&t).await.unwrap(), 1);
        }
        repo
    }

    fn ids(tickets: &[Ticket]) -> Vec<&str> {
        tickets.iter().map(|t| t.id()).collect()
    }

    // ========================================================================
    // set / delete
    // ========================================================================

    #[tokio::test]
    async fn test_set_then_query_round_trips() {
        let repo = InMemoryRepository::<Ticket>::new("tickets").unwrap();
        let mut original = ticket("t1", "open", 2, Some("ana"));
        original.base = original
            .base
            .with_metadata("source", "email")
            .with_tags(["billing"]);

        repo.set(&original).await.unwrap();
        let found = repo.query(&QueryRequest::new().eq("id", "t1")).await.unwrap();
        assert_eq!(found, vec![original]);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_skipped() {
        let repo = seeded().await;
        let replacement = ticket("t1", "closed", 9, None);

        assert_eq!(repo.set(&replacement).await.unwrap(), 0);
        assert_eq!(repo.len().await, 4);

        let found = repo.query(&QueryRequest::new().eq("id", "t1")).await.unwrap();
        assert_eq!(found[0].status, "open");
        assert_eq!(found[0].priority, 1);
    }

    #[tokio::test]
    async fn test_delete_counts_rows() {
        let repo = seeded().await;
        assert_eq!(repo.delete("t2").await.unwrap(), 1);
        assert_eq!(repo.delete("t2").await.unwrap(), 0);
        assert_eq!(repo.delete("missing").await.unwrap(), 0);

        let found = repo.query(&QueryRequest::new().eq("id", "t2")).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(repo.len().await, 3);
    }

    // ========================================================================
    // Filters
    // ========================================================================

    #[tokio::test]
    async fn test_filters_are_anded() {
        let repo = seeded().await;
        let request = QueryRequest::new().eq("status", "open").gt("priority", 2);
        let found = repo.query(&request).await.unwrap();
        assert_eq!(ids(&found), ["t2", "t4"]);
    }

    #[tokio::test]
    async fn test_not_equal_and_less_than() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().ne("status", "open"))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t3"]);

        let found = repo
            .query(&QueryRequest::new().lt("priority", 4))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_null_column_never_matches_comparison() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().ne("assignee", "ana"))
            .await
            .unwrap();
        // t2 has no assignee and is excluded, as in SQL
        assert_eq!(ids(&found), ["t3", "t4"]);
    }

    #[tokio::test]
    async fn test_null_filter_means_is_null() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().eq("assignee", Value::Null))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t2"]);

        let found = repo
            .query(&QueryRequest::new().ne("assignee", Value::Null))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t1", "t3", "t4"]);
    }

    #[tokio::test]
    async fn test_null_filter_with_ordering_operator_is_rejected() {
        let repo = seeded().await;
        let err = repo
            .query(&QueryRequest::new().gt("assignee", Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidFilter { .. }));
    }

    #[tokio::test]
    async fn test_unknown_filter_column() {
        let repo = seeded().await;
        let err = repo
            .query(&QueryRequest::new().eq("nonexistent", 1))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RepositoryError::UnknownColumn { column, .. } if column == "nonexistent")
        );
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().eq("status", "archived"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    // ========================================================================
    // Sorting and pagination
    // ========================================================================

    #[tokio::test]
    async fn test_sort_ascending_nulls_last() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().sort_by("assignee"))
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t1", "t3", "t4", "t2"]);
    }

    #[tokio::test]
    async fn test_sort_descending_nulls_first() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().sort_by("assignee").descending())
            .await
            .unwrap();
        assert_eq!(ids(&found), ["t2", "t4", "t3", "t1"]);
    }

    #[tokio::test]
    async fn test_sort_by_unknown_column() {
        let repo = seeded().await;
        let err = repo
            .query(&QueryRequest::new().sort_by("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn test_limit_and_offset() {
        let repo = seeded().await;
        let request = QueryRequest::new().sort_by("priority").paginate(1, 2);
        let found = repo.query(&request).await.unwrap();
        assert_eq!(ids(&found), ["t2", "t4"]);
    }

    #[tokio::test]
    async fn test_zero_limit_means_unlimited() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().with_limit(0))
            .await
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[tokio::test]
    async fn test_offset_past_end_is_empty() {
        let repo = seeded().await;
        let found = repo
            .query(&QueryRequest::new().with_offset(10))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_sort_by_created_at_descending() {
        let repo = InMemoryRepository::<Ticket>::new("tickets").unwrap();
        for (id, day) in [("a", 1), ("b", 3), ("c", 2)] {
            let mut t = ticket(id, "open", 1, None);
            let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
            t.base = t.base.with_created_at(at);
            repo.set(&t).await.unwrap();
        }

        let found = repo
            .query(&QueryRequest::new().sort_by("created_at").descending())
            .await
            .unwrap();
        assert_eq!(ids(&found), ["b", "c", "a"]);
        assert!(found
            .windows(2)
            .all(|w| w[0].base.created_at >= w[1].base.created_at));
    }

    // ========================================================================
    // JSON columns
    // ========================================================================

    #[tokio::test]
    async fn test_metadata_equality_filters() {
        let repo = InMemoryRepository::<Ticket>::new("tickets").unwrap();
        let mut t = ticket("t1", "open", 1, None);
        t.base = t.base.with_metadata("k", "a");
        repo.set(&t).await.unwrap();

        let different = repo
            .query(&QueryRequest::new().ne("metadata", serde_json::json!({"k": "b"})))
            .await
            .unwrap();
        assert_eq!(ids(&different), ["t1"]);

        let same = repo
            .query(&QueryRequest::new().eq("metadata", serde_json::json!({"k": "a"})))
            .await
            .unwrap();
        assert_eq!(ids(&same), ["t1"]);

        let not_same = repo
            .query(&QueryRequest::new().ne("metadata", serde_json::json!({"k": "a"})))
            .await
            .unwrap();
        assert!(not_same.is_empty());
    }

    // ========================================================================
    // Column constraints
    // ========================================================================

    #[derive(Debug, Clone, PartialEq)]
    struct Account {
        base: BaseModel,
        email: String,
        nickname: Option<String>,
    }

    impl Describe for Account {
        fn layout() -> Vec<FieldLayout> {
            vec![
                FieldLayout::embedded("base", BaseModel::layout()),
                FieldLayout::field::<String>("email").column("email").unique(),
                FieldLayout::field::<Option<String>>("nickname")
                    .column("nickname")
                    .not_null(),
            ]
        }
    }

    impl Entity for Account {
        fn base(&self) -> &BaseModel {
            &self.base
        }

        fn write_fields(&self, record: &mut Record) {
            self.base.write_fields(record);
            record.put("email", &self.email);
            record.put("nickname", self.nickname.clone());
        }

        fn read_fields(record: &mut Record) -> Result<Self> {
            Ok(Self {
                base: BaseModel::read_fields(record)?,
                email: record.take("email")?,
                nickname: record.take("nickname")?,
            })
        }
    }

    fn account(id: &str, email: &str, nickname: Option<&str>) -> Account {
        Account {
            base: BaseModel::new(id),
            email: email.to_string(),
            nickname: nickname.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_unique_column_conflict_is_skipped() {
        let repo = InMemoryRepository::<Account>::new("accounts").unwrap();
        assert_eq!(repo.set(&account("u1", "x@y", Some("x"))).await.unwrap(), 1);
        assert_eq!(repo.set(&account("u2", "x@y", Some("y"))).await.unwrap(), 0);
        assert_eq!(repo.len().await, 1);

        let found = repo.query(&QueryRequest::new()).await.unwrap();
        assert_eq!(found[0].id(), "u1");

        assert_eq!(repo.set(&account("u3", "z@y", Some("z"))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_null_in_not_null_column_is_rejected() {
        let repo = InMemoryRepository::<Account>::new("accounts").unwrap();
        let err = repo.set(&account("u1", "x@y", None)).await.unwrap_err();
        assert!(
            matches!(err, RepositoryError::NullViolation { column, .. } if column == "nickname")
        );
        assert!(repo.is_empty().await);
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn test_rejects_invalid_table_name() {
        let result = InMemoryRepository::<Ticket>::new("bad-name");
        assert!(matches!(result, Err(RepositoryError::InvalidIdentifier(_))));
    }

    struct Untagged {
        base: BaseModel,
    }

    impl Describe for Untagged {
        fn layout() -> Vec<FieldLayout> {
            vec![
                FieldLayout::embedded("base", BaseModel::layout()),
                FieldLayout::field::<String>("note"),
            ]
        }
    }

    impl Entity for Untagged {
        fn base(&self) -> &BaseModel {
            &self.base
        }

        fn write_fields(&self, record: &mut Record) {
            self.base.write_fields(record);
        }

        fn read_fields(record: &mut Record) -> Result<Self> {
            Ok(Self {
                base: BaseModel::read_fields(record)?,
            })
        }
    }

    #[test]
    fn test_rejects_untagged_field() {
        let result = InMemoryRepository::<Untagged>::new("notes");
        assert!(matches!(
            result,
            Err(RepositoryError::MissingColumnTag { field }) if field == "note"
        ));
    }
}
