//! 인메모리 저장소
//!
//! 테스트와 예제용 [`Store`] 구현입니다. 쿼리는 Row 필터 closure 목록이며,
//! 빈 결과 쿼리의 집계는 `None`을 돌려줍니다 (일부 ORM의 동작과 같음).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::backend::{QueryBackend, Store};
use crate::constraint::values_equal;
use crate::error::Result;
use crate::record::Row;
use crate::schema::Table;

pub type RowFilter = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// 인메모리 쿼리 기술
#[derive(Clone)]
pub struct MemoryQuery {
    table: String,
    filters: Vec<RowFilter>,
    limit: Option<usize>,
    empty: bool,
}

impl MemoryQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            limit: None,
            empty: false,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter(mut self, f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        self.filter(move |row| row.get(&field).is_some_and(|v| values_equal(v, &value)))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(self.limit.map_or(limit, |current| current.min(limit)));
        self
    }

    /// 어떤 Row도 반환하지 않는 쿼리인지
    pub fn is_none(&self) -> bool {
        self.empty
    }

    pub fn matches(&self, row: &Row) -> bool {
        !self.empty && self.filters.iter().all(|filter| filter(row))
    }
}

impl fmt::Debug for MemoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("table", &self.table)
            .field("filters", &self.filters.len())
            .field("limit", &self.limit)
            .field("empty", &self.empty)
            .finish()
    }
}

/// 인메모리 저장소
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row 저장 (저장된 상태로 기록)
    pub fn insert(&self, table: &str, mut row: Row) {
        row.mark_persisted();
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// JSON 객체를 Row로 저장. 객체가 아니면 무시.
    pub fn insert_json(&self, table: &str, value: Value) {
        if value.is_object() {
            self.insert(table, Row::from_json(value));
        }
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    fn select(&self, query: &MemoryQuery) -> Vec<Row> {
        if query.is_none() {
            return Vec::new();
        }

        let tables = self.tables.read();
        let rows = tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| query.matches(row))
            .cloned();

        match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

impl QueryBackend for MemoryStore {
    type Query = MemoryQuery;

    fn base(&self, table: &Table) -> Self::Query {
        MemoryQuery::new(&table.name)
    }

    fn none(&self, mut query: Self::Query) -> Self::Query {
        query.empty = true;
        query
    }

    fn merge(&self, mut query: Self::Query, other: &Self::Query) -> Self::Query {
        query.filters.extend(other.filters.iter().cloned());
        query.empty |= other.empty;
        if let Some(limit) = other.limit {
            query = query.limit(limit);
        }
        query
    }

    fn filter_eq(&self, query: Self::Query, field: &str, value: &Value) -> Self::Query {
        query.where_eq(field, value.clone())
    }

    fn filter_in(&self, query: Self::Query, field: &str, values: &[Value]) -> Self::Query {
        let field = field.to_string();
        let values = values.to_vec();
        query.filter(move |row| {
            row.get(&field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate)))
        })
    }
}

impl Store for MemoryStore {
    type Row = Row;

    fn count(&self, query: &Self::Query) -> Result<Option<u64>> {
        if query.is_none() {
            return Ok(None);
        }
        Ok(Some(self.select(query).len() as u64))
    }

    fn fetch(&self, query: &Self::Query) -> Result<Vec<Self::Row>> {
        let rows = self.select(query);
        tracing::trace!(table = %query.table, rows = rows.len(), "memory fetch");
        Ok(rows)
    }
}
