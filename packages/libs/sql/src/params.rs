//! 조회 파라미터
//!
//! 목록 조회 요청의 `where` / `order_by` / `limit` / `offset`을 파싱하고 검증합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 목록 조회 파라미터
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// WHERE 조건
    #[serde(default)]
    pub r#where: Option<WhereClause>,

    /// 정렬 (컬럼 이름 순)
    #[serde(default)]
    pub order_by: Option<BTreeMap<String, SortOrder>>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default)]
    pub offset: Option<u64>,
}

/// 정렬 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// WHERE 조건
///
/// JSON 객체로 표현되며, 다양한 연산자를 지원합니다.
///
/// # 예시
///
/// ```json
/// { "status": "active" }                    // status = 'active'
/// { "age": { "$gt": 18 } }                  // age > 18
/// { "tags": { "$in": ["a", "b"] } }         // tags IN ('a', 'b')
/// { "$or": [{ "a": 1 }, { "b": 2 }] }       // a = 1 OR b = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereClause(pub BTreeMap<String, Value>);

impl WhereClause {
    /// 빈 WHERE 절
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 단순 equality 조건 추가
    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.0.insert(column.into(), value);
        self
    }

    /// 컬럼 이름 검증
    ///
    /// `$and` / `$or` 안의 조건까지 재귀적으로 확인합니다.
    pub fn validate(&self, allowed_columns: &[&str]) -> Result<(), WhereValidationError> {
        for (key, value) in &self.0 {
            if key.starts_with('$') {
                for nested in Self::nested(key, value)? {
                    nested.validate(allowed_columns)?;
                }
                continue;
            }

            if !allowed_columns.contains(&key.as_str()) {
                return Err(WhereValidationError::UnknownColumn(key.clone()));
            }
        }

        Ok(())
    }

    /// `$and` / `$or` 피연산자 목록
    pub(crate) fn nested(key: &str, value: &Value) -> Result<Vec<WhereClause>, WhereValidationError> {
        if key != "$and" && key != "$or" {
            return Err(WhereValidationError::InvalidOperator(key.to_string()));
        }

        let Value::Array(items) = value else {
            return Err(WhereValidationError::TypeMismatch {
                column: key.to_string(),
                expected: "array of objects".to_string(),
            });
        };

        items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(WhereClause(
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                )),
                _ => Err(WhereValidationError::TypeMismatch {
                    column: key.to_string(),
                    expected: "object".to_string(),
                }),
            })
            .collect()
    }
}

/// WHERE 검증 에러
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WhereValidationError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("type mismatch for column {column}: expected {expected}")]
    TypeMismatch { column: String, expected: String },
}

impl From<WhereValidationError> for stk_guard_core::Error {
    fn from(err: WhereValidationError) -> Self {
        stk_guard_core::Error::Storage {
            message: err.to_string(),
        }
    }
}

/// WHERE 조건 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOperator {
    /// 같음 (기본)
    Eq,
    /// 같지 않음
    Ne,
    /// 보다 큼
    Gt,
    /// 보다 크거나 같음
    Gte,
    /// 보다 작음
    Lt,
    /// 보다 작거나 같음
    Lte,
    /// 포함 (IN)
    In,
    /// 미포함 (NOT IN)
    NotIn,
    /// LIKE 패턴
    Like,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
}

impl WhereOperator {
    /// 문자열에서 파싱 ($gt, $in 등)
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "$eq" => Some(WhereOperator::Eq),
            "$ne" => Some(WhereOperator::Ne),
            "$gt" => Some(WhereOperator::Gt),
            "$gte" => Some(WhereOperator::Gte),
            "$lt" => Some(WhereOperator::Lt),
            "$lte" => Some(WhereOperator::Lte),
            "$in" => Some(WhereOperator::In),
            "$nin" | "$notIn" => Some(WhereOperator::NotIn),
            "$like" => Some(WhereOperator::Like),
            "$null" | "$isNull" => Some(WhereOperator::IsNull),
            "$notNull" | "$isNotNull" => Some(WhereOperator::IsNotNull),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_clause_validation() {
        let where_clause = WhereClause::empty()
            .eq("status", json!("active"))
            .eq("age", json!(25));

        let allowed = vec!["status", "age", "name"];
        assert!(where_clause.validate(&allowed).is_ok());

        let where_clause = WhereClause::empty().eq("unknown_col", json!("value"));
        assert_eq!(
            where_clause.validate(&allowed),
            Err(WhereValidationError::UnknownColumn("unknown_col".to_string()))
        );
    }

    #[test]
    fn test_nested_validation() {
        let allowed = ["status", "age"];

        let clause = WhereClause::empty().eq("$or", json!([{ "status": "a" }, { "age": 1 }]));
        assert!(clause.validate(&allowed).is_ok());

        let clause = WhereClause::empty().eq("$or", json!([{ "secret": 1 }]));
        assert!(matches!(
            clause.validate(&allowed),
            Err(WhereValidationError::UnknownColumn(c)) if c == "secret"
        ));

        let clause = WhereClause::empty().eq("$xor", json!([]));
        assert!(matches!(
            clause.validate(&allowed),
            Err(WhereValidationError::InvalidOperator(_))
        ));
    }

    #[test]
    fn test_where_operator_parsing() {
        assert_eq!(WhereOperator::from_str("$gt"), Some(WhereOperator::Gt));
        assert_eq!(WhereOperator::from_str("$in"), Some(WhereOperator::In));
        assert_eq!(WhereOperator::from_str("$unknown"), None);
    }

    #[test]
    fn test_params_deserialization() {
        let json = r#"{
            "where": { "status": "active" },
            "order_by": { "created_at": "desc" },
            "limit": 10
        }"#;

        let params: ListParams = serde_json::from_str(json).unwrap();
        assert!(params.r#where.is_some());
        assert_eq!(params.order_by.unwrap()["created_at"], SortOrder::Desc);
        assert_eq!(params.limit, Some(10));
    }
}
