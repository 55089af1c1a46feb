//! 권한을 거친 SQL 빌더
//!
//! 바인딩된 [`Relation`] / [`Guarded`]에서 SQL을 만듭니다.
//!
//! - SELECT: 읽을 수 있는 컬럼만 조회하고 scope 조건을 붙임
//! - INSERT / UPDATE: 변경 필드가 거부되면 [`Error::ValidationDenied`]
//! - UPDATE / DELETE: 기본키 조건에 scope 조건을 더함
//! - DELETE: 삭제가 거부되면 `None`

use sea_query::{Alias, Expr, PostgresQueryBuilder, Query, SimpleExpr};

use stk_guard_core::{Entity, Error, Guarded, Relation, Restrictable, Result};

use crate::params::ListParams;
use crate::query::{column_ref, value_to_expr, SqlBackend};

/// SELECT 쿼리 빌더
pub struct SelectBuilder<'a, S, E> {
    relation: &'a Relation<S, E, SqlBackend>,
}

impl<'a, S, E> SelectBuilder<'a, S, E> {
    pub fn new(relation: &'a Relation<S, E, SqlBackend>) -> Self {
        Self { relation }
    }

    /// 조회할 컬럼 (바인딩되지 않았으면 전체, 기본키는 항상 포함)
    pub fn readable_columns(&self) -> Result<Vec<String>> {
        let table = self.relation.model().table();
        if !self.relation.is_bound() {
            return Ok(table.field_names());
        }

        let meta = self.relation.meta()?;
        Ok(table
            .field_names()
            .into_iter()
            .filter(|field| table.is_primary_key(field) || meta.is_readable(field))
            .collect())
    }

    /// SQL 생성
    ///
    /// WHERE / ORDER BY에는 읽을 수 있는 컬럼만 쓸 수 있습니다.
    pub fn build(&self, params: &ListParams) -> Result<String> {
        let columns = self.readable_columns()?;
        let query = self
            .relation
            .restricted_query()
            .with_columns(columns.clone())
            .apply_params(params)?;

        if let Some(order_by) = &params.order_by {
            if let Some(column) = order_by.keys().find(|c| !columns.contains(c)) {
                return Err(Error::Storage {
                    message: format!("unknown column: {column}"),
                });
            }
        }

        tracing::trace!(table = %query.table(), columns = columns.len(), "select built");
        Ok(query.to_select().to_string(PostgresQueryBuilder))
    }

    /// 같은 조건의 COUNT SQL
    pub fn build_count(&self, params: &ListParams) -> Result<String> {
        let columns = self.readable_columns()?;
        let query = self
            .relation
            .restricted_query()
            .with_columns(columns)
            .apply_params(params)?;
        Ok(query.to_count_sql())
    }
}

/// INSERT 쿼리 빌더
pub struct InsertBuilder<'a, S, E> {
    entity: &'a Guarded<S, E, SqlBackend>,
}

impl<'a, S, E: Entity> InsertBuilder<'a, S, E> {
    pub fn new(entity: &'a Guarded<S, E, SqlBackend>) -> Self {
        Self { entity }
    }

    /// SQL 생성 (`RETURNING` 기본키)
    pub fn build(&self) -> Result<String> {
        self.entity.validate()?;

        let table = self.entity.model().table();
        let data = self.entity.entity().changes();
        if data.is_empty() {
            return Err(Error::Storage {
                message: format!("nothing to insert into '{}'", table.name),
            });
        }

        let mut query = Query::insert();
        query.into_table(Alias::new(&table.name));
        query.columns(data.keys().map(Alias::new));
        query
            .values(data.values().map(value_to_expr))
            .map_err(|e| Error::Storage {
                message: e.to_string(),
            })?;
        query.returning_col(Alias::new(table.primary_key()));

        Ok(query.to_string(PostgresQueryBuilder))
    }
}

/// UPDATE 쿼리 빌더
pub struct UpdateBuilder<'a, S, E> {
    entity: &'a Guarded<S, E, SqlBackend>,
}

impl<'a, S, E: Entity> UpdateBuilder<'a, S, E> {
    pub fn new(entity: &'a Guarded<S, E, SqlBackend>) -> Self {
        Self { entity }
    }

    /// SQL 생성 (변경 필드만 SET)
    pub fn build(&self) -> Result<String> {
        self.entity.validate()?;

        let table = self.entity.model().table();
        let data = self.entity.entity().changes();
        if data.is_empty() {
            return Err(Error::Storage {
                message: format!("nothing to update on '{}'", table.name),
            });
        }

        let mut query = Query::update();
        query.table(Alias::new(&table.name));
        for (column, value) in &data {
            query.value(Alias::new(column), value_to_expr(value));
        }

        for condition in target_conditions(self.entity)? {
            query.and_where(condition);
        }
        query.returning_col(Alias::new(table.primary_key()));

        Ok(query.to_string(PostgresQueryBuilder))
    }
}

/// DELETE 쿼리 빌더
pub struct DeleteBuilder<'a, S, E> {
    entity: &'a Guarded<S, E, SqlBackend>,
}

impl<'a, S, E: Entity> DeleteBuilder<'a, S, E> {
    pub fn new(entity: &'a Guarded<S, E, SqlBackend>) -> Self {
        Self { entity }
    }

    /// SQL 생성 (삭제가 거부되면 `None`)
    pub fn build(&self) -> Result<Option<String>> {
        if !self.entity.allows_destroy() {
            return Ok(None);
        }

        let table = self.entity.model().table();
        let mut query = Query::delete();
        query.from_table(Alias::new(&table.name));

        for condition in target_conditions(self.entity)? {
            query.and_where(condition);
        }
        query.returning_col(Alias::new(table.primary_key()));

        Ok(Some(query.to_string(PostgresQueryBuilder)))
    }
}

/// 기본키 조건 + (바인딩된 경우) scope 조건
fn target_conditions<S, E: Entity>(
    entity: &Guarded<S, E, SqlBackend>,
) -> Result<Vec<SimpleExpr>> {
    let table = entity.model().table();
    let pk = table.primary_key();
    let id = entity.primary_key_value().ok_or_else(|| Error::Storage {
        message: format!("missing primary key '{}' on '{}'", pk, table.name),
    })?;

    let mut conditions = vec![Expr::col(column_ref(&table.name, pk)).eq(value_to_expr(id))];

    if entity.is_bound() {
        if let Some(relation) = entity.meta()?.relation() {
            conditions.extend(relation.conditions().iter().cloned());
        }
    }

    Ok(conditions)
}
