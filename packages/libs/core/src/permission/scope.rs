//! 읽기 scope
//!
//! 규칙이 등록한 쿼리 변환을 순서대로 합성합니다. paranoid 모드에서 scope가
//! 하나도 없으면 저장소의 "빈 결과" 쿼리 하나로 대체됩니다.

use std::sync::Arc;

use once_cell::unsync::OnceCell;

use super::meta::{PermissionBox, ScopeFn};
use crate::backend::QueryBackend;

impl<B: QueryBackend> PermissionBox<B> {
    /// 읽기 scope 추가
    pub fn scope(&mut self, f: impl Fn(B::Query) -> B::Query + Send + Sync + 'static) {
        self.scopes.push(Arc::new(f));
        self.relation = OnceCell::new();
    }

    /// 적용할 scope 목록
    pub fn scope_callbacks(&self) -> Vec<ScopeFn<B::Query>> {
        if self.scopes.is_empty() && self.context.paranoid {
            let backend = self.context.backend.clone();
            return vec![Arc::new(move |query| backend.none(query))];
        }

        self.scopes.clone()
    }

    /// scope가 걸려 있는지
    pub fn is_scoped(&self) -> bool {
        self.context.paranoid || !self.scopes.is_empty()
    }

    /// 기본 쿼리에 scope를 모두 적용한 결과 (scope가 없으면 `None`)
    pub fn relation(&self) -> Option<&B::Query> {
        if !self.is_scoped() {
            return None;
        }

        Some(self.relation.get_or_init(|| {
            let base = self.context.backend.base(&self.context.table);
            self.apply_to(base)
        }))
    }

    /// 임의 쿼리에 scope 적용
    pub fn apply_to(&self, query: B::Query) -> B::Query {
        self.scope_callbacks()
            .iter()
            .fold(query, |query, scope| scope(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::ScopeContext;
    use crate::schema::Table;

    /// 적용된 scope 이름을 쌓는 테스트용 backend
    struct Trace;

    impl QueryBackend for Trace {
        type Query = Vec<String>;

        fn base(&self, table: &Table) -> Self::Query {
            vec![table.name.clone()]
        }

        fn none(&self, mut query: Self::Query) -> Self::Query {
            query.push("none".to_string());
            query
        }

        fn merge(&self, mut query: Self::Query, other: &Self::Query) -> Self::Query {
            query.extend(other.iter().cloned());
            query
        }

        fn filter_eq(&self, mut query: Self::Query, field: &str, value: &serde_json::Value) -> Self::Query {
            query.push(format!("{field}={value}"));
            query
        }

        fn filter_in(&self, mut query: Self::Query, field: &str, _values: &[serde_json::Value]) -> Self::Query {
            query.push(format!("{field} in"));
            query
        }
    }

    fn meta(paranoid: bool) -> PermissionBox<Trace> {
        let table = Table::with_fields("dummies", ["string"]);
        PermissionBox::new(
            table.field_names(),
            ScopeContext::new(Arc::new(Trace), Arc::new(table), paranoid),
        )
    }

    #[test]
    fn test_unscoped() {
        let meta = meta(false);
        assert!(!meta.is_scoped());
        assert!(meta.relation().is_none());
        assert_eq!(meta.apply_to(vec!["q".to_string()]), vec!["q"]);
    }

    #[test]
    fn test_scopes_compose_in_order() {
        let mut meta = meta(false);
        meta.scope(|mut q| {
            q.push("a".to_string());
            q
        });
        meta.scope(|mut q| {
            q.push("b".to_string());
            q
        });

        assert!(meta.is_scoped());
        assert_eq!(meta.relation().unwrap(), &vec!["dummies", "a", "b"]);
    }

    #[test]
    fn test_paranoid_without_scopes_is_empty() {
        let meta = meta(true);
        assert!(meta.is_scoped());
        assert_eq!(meta.scope_callbacks().len(), 1);
        assert_eq!(meta.relation().unwrap(), &vec!["dummies", "none"]);
    }

    #[test]
    fn test_paranoid_with_scope_uses_scope() {
        let mut meta = meta(true);
        meta.scope(|mut q| {
            q.push("mine".to_string());
            q
        });
        assert_eq!(meta.relation().unwrap(), &vec!["dummies", "mine"]);
    }
}
