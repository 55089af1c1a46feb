//! 저장소 협력자 인터페이스
//!
//! 엔진은 실제 저장소를 알지 못합니다. 쿼리 *기술(description)*을 만들고 합치는
//! [`QueryBackend`]와, 그것을 실행하는 [`Store`]를 통해서만 저장소에 닿습니다.
//! 저장소마다 다른 유일한 지식은 "Row가 없음"을 표현하는 방법([`QueryBackend::none`])입니다.

use serde_json::Value;

use crate::error::Result;
use crate::record::Entity;
use crate::schema::Table;

/// 쿼리 기술 조립
///
/// 모든 메서드는 입력을 바꾸지 않고 새 쿼리를 반환해야 합니다.
/// scope 합성이 결합법칙을 만족하려면 이 조건이 필요합니다.
pub trait QueryBackend: Send + Sync + 'static {
    type Query: Clone;

    /// 필터 없는 기본 쿼리
    fn base(&self, table: &Table) -> Self::Query;

    /// 어떤 Row도 반환하지 않도록 좁힌 쿼리
    fn none(&self, query: Self::Query) -> Self::Query;

    /// 두 쿼리의 조건을 AND로 합침
    fn merge(&self, query: Self::Query, other: &Self::Query) -> Self::Query;

    /// `field = value` 필터
    fn filter_eq(&self, query: Self::Query, field: &str, value: &Value) -> Self::Query;

    /// `field IN (values)` 필터
    fn filter_in(&self, query: Self::Query, field: &str, values: &[Value]) -> Self::Query;
}

/// 쿼리 실행
pub trait Store: QueryBackend {
    type Row: Entity;

    /// 집계 결과. 일부 저장소는 빈 결과에 `None`을 돌려주며, 엔진이 0으로 정규화합니다.
    fn count(&self, query: &Self::Query) -> Result<Option<u64>>;

    /// Row 조회
    fn fetch(&self, query: &Self::Query) -> Result<Vec<Self::Row>>;
}

/// 쿼리 계층이 없는 경우 (필드/액션 검사만 사용)
impl QueryBackend for () {
    type Query = ();

    fn base(&self, _table: &Table) -> Self::Query {}

    fn none(&self, _query: Self::Query) -> Self::Query {}

    fn merge(&self, _query: Self::Query, _other: &Self::Query) -> Self::Query {}

    fn filter_eq(&self, _query: Self::Query, _field: &str, _value: &Value) -> Self::Query {}

    fn filter_in(&self, _query: Self::Query, _field: &str, _values: &[Value]) -> Self::Query {}
}
