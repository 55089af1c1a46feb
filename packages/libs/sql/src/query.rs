//! SQL 쿼리 기술
//!
//! [`SqlQuery`]는 실행 전의 SELECT를 값으로 들고 다닙니다. scope 함수는 이 값을
//! 받아 조건을 더한 새 값을 돌려주고, 마지막에 SeaQuery로 SQL을 만듭니다.
//! "Row가 없음"은 항상 거짓인 `1 = 0` 조건으로 표현합니다.

use sea_query::{
    Alias, Asterisk, Expr, Func, Order, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};
use serde_json::Value;

use stk_guard_core::schema::Table;
use stk_guard_core::QueryBackend;

use crate::params::{ListParams, SortOrder, WhereClause, WhereOperator, WhereValidationError};

/// 어떤 Row와도 맞지 않는 조건
pub const NONE_CONDITION: &str = "1 = 0";

/// SELECT 기술
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    table: String,
    columns: Vec<String>,
    conditions: Vec<SimpleExpr>,
    order_by: Vec<(String, SortOrder)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SqlQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 조회 컬럼 (비어 있으면 `*`)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// AND로 묶일 WHERE 조건들
    pub fn conditions(&self) -> &[SimpleExpr] {
        &self.conditions
    }

    pub fn and_where(mut self, condition: SimpleExpr) -> Self {
        if !self.conditions.contains(&condition) {
            self.conditions.push(condition);
        }
        self
    }

    /// `column = value` (`null`이면 `IS NULL`)
    pub fn where_eq(self, column: &str, value: &Value) -> Self {
        let condition = eq_condition(&self.table, column, value);
        self.and_where(condition)
    }

    /// JSON WHERE 절 적용
    ///
    /// 컬럼 목록이 있으면 그 안의 컬럼만 허용합니다.
    pub fn filter(mut self, clause: &WhereClause) -> Result<Self, WhereValidationError> {
        if !self.columns.is_empty() {
            let allowed: Vec<&str> = self.columns.iter().map(String::as_str).collect();
            clause.validate(&allowed)?;
        }

        for condition in clause_conditions(&self.table, clause)? {
            self = self.and_where(condition);
        }
        Ok(self)
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// 제한 (이미 있으면 더 작은 값)
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(self.limit.map_or(limit, |current| current.min(limit)));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 목록 조회 파라미터 적용
    pub fn apply_params(self, params: &ListParams) -> Result<Self, WhereValidationError> {
        let mut query = match &params.r#where {
            Some(clause) => self.filter(clause)?,
            None => self,
        };

        if let Some(order_by) = &params.order_by {
            for (column, order) in order_by {
                query = query.order_by(column.clone(), *order);
            }
        }
        if let Some(limit) = params.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = params.offset {
            query = query.offset(offset);
        }
        Ok(query)
    }

    /// "Row 없음" 조건이 걸려 있는지
    pub fn is_none(&self) -> bool {
        self.conditions.contains(&none_condition())
    }

    /// 지정한 컬럼으로 SELECT 문 생성
    pub fn select_statement(&self, columns: &[String]) -> SelectStatement {
        let mut query = Query::select();
        query.from(Alias::new(&self.table));

        if columns.is_empty() {
            query.column(Asterisk);
        }
        for column in columns {
            query.column(column_ref(&self.table, column));
        }

        for condition in &self.conditions {
            query.and_where(condition.clone());
        }

        for (column, order) in &self.order_by {
            let order = match order {
                SortOrder::Asc => Order::Asc,
                SortOrder::Desc => Order::Desc,
            };
            query.order_by(column_ref(&self.table, column), order);
        }

        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query.offset(offset);
        }

        query
    }

    pub fn to_select(&self) -> SelectStatement {
        self.select_statement(&self.columns)
    }

    pub fn to_sql(&self) -> String {
        self.to_select().to_string(PostgresQueryBuilder)
    }

    /// COUNT 쿼리 (limit/offset이 있으면 subquery로 감쌈)
    pub fn to_count_sql(&self) -> String {
        let mut query = Query::select();
        query.expr(Func::count(Expr::col(Asterisk)));

        if self.limit.is_some() || self.offset.is_some() {
            query.from_subquery(self.to_select(), Alias::new("scoped"));
        } else {
            query.from(Alias::new(&self.table));
            for condition in &self.conditions {
                query.and_where(condition.clone());
            }
        }

        query.to_string(PostgresQueryBuilder)
    }
}

/// [`SqlQuery`]를 만드는 쿼리 계층
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlBackend;

impl QueryBackend for SqlBackend {
    type Query = SqlQuery;

    fn base(&self, table: &Table) -> Self::Query {
        SqlQuery::new(&table.name).with_columns(table.field_names())
    }

    fn none(&self, query: Self::Query) -> Self::Query {
        query.and_where(none_condition())
    }

    fn merge(&self, mut query: Self::Query, other: &Self::Query) -> Self::Query {
        for condition in &other.conditions {
            query = query.and_where(condition.clone());
        }
        if let Some(limit) = other.limit {
            query = query.limit(limit);
        }
        if query.offset.is_none() {
            query.offset = other.offset;
        }
        query
    }

    fn filter_eq(&self, query: Self::Query, field: &str, value: &Value) -> Self::Query {
        query.where_eq(field, value)
    }

    fn filter_in(&self, query: Self::Query, field: &str, values: &[Value]) -> Self::Query {
        if values.is_empty() {
            return self.none(query);
        }

        let condition =
            Expr::col(column_ref(&query.table, field)).is_in(values.iter().map(value_to_expr));
        query.and_where(condition)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// 조건 생성
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn none_condition() -> SimpleExpr {
    Expr::cust(NONE_CONDITION)
}

pub(crate) fn column_ref(table: &str, column: &str) -> (Alias, Alias) {
    (Alias::new(table), Alias::new(column))
}

fn eq_condition(table: &str, column: &str, value: &Value) -> SimpleExpr {
    let col = Expr::col(column_ref(table, column));
    match value {
        Value::Null => col.is_null(),
        value => col.eq(value_to_expr(value)),
    }
}

fn clause_conditions(
    table: &str,
    clause: &WhereClause,
) -> Result<Vec<SimpleExpr>, WhereValidationError> {
    let mut conditions = Vec::new();

    for (key, value) in &clause.0 {
        if key.starts_with('$') {
            let groups = WhereClause::nested(key, value)?
                .iter()
                .map(|nested| clause_conditions(table, nested).map(conjunction))
                .collect::<Result<Vec<_>, _>>()?;

            conditions.push(if key == "$or" {
                disjunction(groups)
            } else {
                conjunction(groups)
            });
            continue;
        }

        match value {
            Value::Object(operators) => {
                for (operator, operand) in operators {
                    let op = WhereOperator::from_str(operator)
                        .ok_or_else(|| WhereValidationError::InvalidOperator(operator.clone()))?;
                    conditions.push(operator_condition(table, key, op, operand)?);
                }
            }
            Value::Array(_) => {
                return Err(WhereValidationError::TypeMismatch {
                    column: key.clone(),
                    expected: "scalar or operator object".to_string(),
                })
            }
            value => conditions.push(eq_condition(table, key, value)),
        }
    }

    Ok(conditions)
}

fn operator_condition(
    table: &str,
    column: &str,
    op: WhereOperator,
    operand: &Value,
) -> Result<SimpleExpr, WhereValidationError> {
    let col = Expr::col(column_ref(table, column));
    let mismatch = |expected: &str| WhereValidationError::TypeMismatch {
        column: column.to_string(),
        expected: expected.to_string(),
    };

    let condition = match (op, operand) {
        (WhereOperator::Eq, value) => eq_condition(table, column, value),
        (WhereOperator::Ne, Value::Null) => col.is_not_null(),
        (WhereOperator::Ne, value) => col.ne(value_to_expr(value)),

        (WhereOperator::Gt | WhereOperator::Gte | WhereOperator::Lt | WhereOperator::Lte, value)
            if value.is_number() || value.is_string() =>
        {
            let value = value_to_expr(value);
            match op {
                WhereOperator::Gt => col.gt(value),
                WhereOperator::Gte => col.gte(value),
                WhereOperator::Lt => col.lt(value),
                _ => col.lte(value),
            }
        }
        (WhereOperator::Gt | WhereOperator::Gte | WhereOperator::Lt | WhereOperator::Lte, _) => {
            return Err(mismatch("number or string"))
        }

        (WhereOperator::In, Value::Array(items)) if items.is_empty() => none_condition(),
        (WhereOperator::In, Value::Array(items)) => col.is_in(items.iter().map(value_to_expr)),
        (WhereOperator::NotIn, Value::Array(items)) if items.is_empty() => conjunction(Vec::new()),
        (WhereOperator::NotIn, Value::Array(items)) => {
            col.is_not_in(items.iter().map(value_to_expr))
        }
        (WhereOperator::In | WhereOperator::NotIn, _) => return Err(mismatch("array")),

        (WhereOperator::Like, Value::String(pattern)) => col.like(pattern.as_str()),
        (WhereOperator::Like, _) => return Err(mismatch("string")),

        (WhereOperator::IsNull, flag) if flag.as_bool() == Some(false) => col.is_not_null(),
        (WhereOperator::IsNull, _) => col.is_null(),
        (WhereOperator::IsNotNull, flag) if flag.as_bool() == Some(false) => col.is_null(),
        (WhereOperator::IsNotNull, _) => col.is_not_null(),
    };

    Ok(condition)
}

fn conjunction(conditions: Vec<SimpleExpr>) -> SimpleExpr {
    conditions
        .into_iter()
        .reduce(|acc, condition| acc.and(condition))
        .unwrap_or_else(|| Expr::cust("1 = 1"))
}

fn disjunction(conditions: Vec<SimpleExpr>) -> SimpleExpr {
    conditions
        .into_iter()
        .reduce(|acc, condition| acc.or(condition))
        .unwrap_or_else(none_condition)
}

/// serde_json::Value를 SeaQuery Expr로 변환
pub(crate) fn value_to_expr(value: &Value) -> SimpleExpr {
    match value {
        Value::Null => Expr::val(Option::<String>::None).into(),
        Value::Bool(b) => Expr::val(*b).into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Expr::val(i).into()
            } else if let Some(f) = n.as_f64() {
                Expr::val(f).into()
            } else {
                Expr::val(n.to_string()).into()
            }
        }
        Value::String(s) => Expr::val(s.as_str()).into(),
        // JSON 타입으로 직렬화
        Value::Array(_) | Value::Object(_) => Expr::val(value.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Table {
        Table::with_fields("users", ["email", "status", "age"])
    }

    #[test]
    fn test_base_and_sql() {
        let query = SqlBackend.base(&users()).limit(10);
        let sql = query.to_sql();

        assert!(sql.starts_with("SELECT \"users\".\"id\", \"users\".\"email\""));
        assert!(sql.contains("FROM \"users\""));
        assert!(sql.contains("LIMIT 10"));
    }

    #[test]
    fn test_none_strategy() {
        let query = SqlBackend.none(SqlBackend.base(&users()));
        assert!(query.is_none());
        assert!(query.to_sql().contains("WHERE 1 = 0"));

        let query = SqlBackend.filter_in(SqlBackend.base(&users()), "id", &[]);
        assert!(query.is_none());
    }

    #[test]
    fn test_filter_eq_and_in() {
        let query = SqlBackend.filter_eq(SqlBackend.base(&users()), "status", &json!("active"));
        let query = SqlBackend.filter_in(query, "age", &[json!(20), json!(30)]);
        let sql = query.to_sql();

        assert!(sql.contains("\"users\".\"status\" = 'active'"));
        assert!(sql.contains("\"users\".\"age\" IN (20, 30)"));

        let sql = SqlBackend
            .filter_eq(SqlBackend.base(&users()), "email", &Value::Null)
            .to_sql();
        assert!(sql.contains("\"users\".\"email\" IS NULL"));
    }

    #[test]
    fn test_merge_is_and_and_dedups() {
        let backend = SqlBackend;
        let base = backend.base(&users());
        let scope = backend.filter_eq(base.clone(), "status", &json!("active")).limit(5);

        let merged = backend.merge(backend.filter_eq(base, "age", &json!(1)), &scope);
        assert_eq!(merged.conditions().len(), 2);

        let merged = backend.merge(merged.clone(), &scope);
        assert_eq!(merged.conditions().len(), 2);
        assert!(merged.to_sql().contains("LIMIT 5"));
    }

    #[test]
    fn test_where_clause_operators() {
        let clause: WhereClause = serde_json::from_value(json!({
            "age": { "$gte": 18, "$lt": 65 },
            "email": { "$like": "%@example.com" },
            "$or": [{ "status": "active" }, { "status": { "$null": true } }]
        }))
        .unwrap();

        let sql = SqlBackend.base(&users()).filter(&clause).unwrap().to_sql();
        assert!(sql.contains("\"users\".\"age\" >= 18"));
        assert!(sql.contains("\"users\".\"age\" < 65"));
        assert!(sql.contains("LIKE '%@example.com'"));
        assert!(sql.contains("\"users\".\"status\" = 'active' OR \"users\".\"status\" IS NULL"));
    }

    #[test]
    fn test_where_clause_errors() {
        let base = SqlBackend.base(&users());

        let clause = WhereClause::empty().eq("password", json!("x"));
        assert!(matches!(
            base.clone().filter(&clause),
            Err(WhereValidationError::UnknownColumn(_))
        ));

        let clause = WhereClause::empty().eq("age", json!({ "$between": [1, 2] }));
        assert!(matches!(
            base.clone().filter(&clause),
            Err(WhereValidationError::InvalidOperator(_))
        ));

        let clause = WhereClause::empty().eq("age", json!({ "$in": 3 }));
        assert!(matches!(
            base.filter(&clause),
            Err(WhereValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_params_and_count() {
        let params: ListParams = serde_json::from_value(json!({
            "where": { "status": "active" },
            "order_by": { "age": "desc" },
            "limit": 3,
            "offset": 6
        }))
        .unwrap();

        let query = SqlBackend.base(&users()).apply_params(&params).unwrap();
        let sql = query.to_sql();
        assert!(sql.contains("ORDER BY \"users\".\"age\" DESC"));
        assert!(sql.contains("LIMIT 3"));
        assert!(sql.contains("OFFSET 6"));

        let count = query.to_count_sql();
        assert!(count.starts_with("SELECT COUNT(*) FROM (SELECT"));
        assert!(count.ends_with("AS \"scoped\""));

        let count = SqlBackend.base(&users()).to_count_sql();
        assert_eq!(count, "SELECT COUNT(*) FROM \"users\"");
    }
}
