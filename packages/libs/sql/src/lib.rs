//! stk-guard-sql: 권한을 거친 SQL 생성
//!
//! stk-guard-core의 저장소 협력자입니다. scope는 [`SqlQuery`] 값을 변환하고,
//! 빌더는 바인딩된 엔티티/쿼리의 권한에 맞춰 SQL을 만듭니다.
//! SeaQuery를 사용하여 SQL Injection을 원천 차단합니다.
//!
//! # 모듈 구조
//!
//! - `query`: 쿼리 기술과 [`SqlBackend`]
//! - `builder`: SELECT/INSERT/UPDATE/DELETE 빌더
//! - `params`: 요청 파라미터 파싱/검증

pub mod builder;
pub mod params;
pub mod query;

pub use builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use params::{ListParams, SortOrder, WhereClause, WhereOperator, WhereValidationError};
pub use query::{SqlBackend, SqlQuery, NONE_CONDITION};
