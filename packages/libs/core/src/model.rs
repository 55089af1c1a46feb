//! 엔티티 타입 기술자
//!
//! 테이블, 규칙 집합, 저장소 협력자를 묶습니다. 보호 대상 래퍼([`Guarded`], [`Relation`])는
//! 모두 `Arc<Model>`을 공유합니다.

use std::fmt;
use std::sync::Arc;

use crate::backend::QueryBackend;
use crate::config;
use crate::guarded::Guarded;
use crate::permission::{PermissionBox, ScopeContext};
use crate::relation::Relation;
use crate::rules::RuleSet;
use crate::schema::Table;
use crate::subject::Restrictable;

pub struct Model<S, E, B: QueryBackend> {
    table: Arc<Table>,
    rules: Arc<RuleSet<S, E, B>>,
    backend: Arc<B>,
    paranoid: Option<bool>,
}

impl<S, E, B: QueryBackend> Model<S, E, B> {
    pub fn new(table: Table, backend: Arc<B>) -> Self {
        Self {
            table: Arc::new(table),
            rules: Arc::new(RuleSet::new()),
            backend,
            paranoid: None,
        }
    }

    /// 하위 타입 생성
    ///
    /// 같은 테이블과 저장소를 쓰고, 규칙은 부모 규칙 뒤에 이어 붙습니다.
    pub fn inherit(&self) -> Self {
        Self {
            table: self.table.clone(),
            rules: Arc::new(RuleSet::inheriting(self.rules.clone())),
            backend: self.backend.clone(),
            paranoid: self.paranoid,
        }
    }

    /// paranoid 모드 고정 (전역 설정 무시)
    pub fn with_paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = Some(paranoid);
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn rules(&self) -> &Arc<RuleSet<S, E, B>> {
        &self.rules
    }

    /// 전체 필드 이름 (기본키 먼저)
    pub fn fields(&self) -> Vec<String> {
        self.table.field_names()
    }

    pub fn is_paranoid(&self) -> bool {
        self.paranoid.unwrap_or_else(config::paranoid)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 규칙 등록
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn protect(&self, f: impl Fn(&mut PermissionBox<B>) + Send + Sync + 'static) {
        self.rules.protect(f);
    }

    pub fn protect_subject(&self, f: impl Fn(&mut PermissionBox<B>, &S) + Send + Sync + 'static) {
        self.rules.protect_subject(f);
    }

    pub fn protect_entry(
        &self,
        f: impl Fn(&mut PermissionBox<B>, &S, Option<&E>) + Send + Sync + 'static,
    ) {
        self.rules.protect_entry(f);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 평가
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn scope_context(&self) -> ScopeContext<B> {
        ScopeContext::new(self.backend.clone(), self.table.clone(), self.is_paranoid())
    }

    /// 권한 박스 생성 (`entry`가 `None`이면 컬렉션 수준)
    pub fn evaluate(&self, subject: &S, entry: Option<&E>) -> PermissionBox<B> {
        self.rules
            .evaluate(subject, entry, self.fields(), self.scope_context())
    }

    /// 주체에 대해 이 타입의 Row가 scope로 좁혀지는지
    pub fn is_scoped_for(&self, subject: &S) -> bool {
        self.evaluate(subject, None).is_scoped()
    }

    /// 이 타입의 scope를 임의 쿼리에 적용
    ///
    /// 연관/eager-load 대상에 쓰입니다. 호출한 쪽이 아니라 이 타입의 규칙으로 평가합니다.
    pub fn scope_for(&self, subject: &S, query: B::Query) -> B::Query {
        let meta = self.evaluate(subject, None);
        tracing::trace!(table = %self.table.name, scoped = meta.is_scoped(), "applying target scope");
        meta.apply_to(query)
    }
}

impl<S, E, B: QueryBackend> Model<S, E, B> {
    /// 주체가 바인딩되지 않은 전체 쿼리
    pub fn all(self: &Arc<Self>) -> Relation<S, E, B> {
        Relation::new(self.clone())
    }

    /// 주체가 바인딩된 전체 쿼리
    pub fn restrict(self: &Arc<Self>, subject: S) -> Relation<S, E, B> {
        Relation::new(self.clone()).restrict(subject)
    }

    /// 엔티티를 보호 래퍼로 감쌈 (아직 바인딩 안 됨)
    pub fn wrap(self: &Arc<Self>, entity: E) -> Guarded<S, E, B> {
        Guarded::new(self.clone(), entity)
    }
}

impl<S, E, B: QueryBackend> fmt::Debug for Model<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table.name)
            .field("rules", &self.rules.len())
            .field("paranoid", &self.paranoid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::record::Row;

    type Dummy = Model<String, Row, ()>;

    fn model() -> Dummy {
        Model::new(
            Table::with_fields("dummies", ["string", "number", "text"]),
            Arc::new(()),
        )
        .with_paranoid(false)
    }

    #[test]
    fn test_fields_come_from_table() {
        assert_eq!(model().fields(), vec!["id", "string", "number", "text"]);
    }

    #[test]
    fn test_subtype_inherits_rules() {
        let parent = model();
        parent.protect(|meta| meta.can(Action::Read, "string"));

        let child = parent.inherit();
        child.protect(|meta| meta.can(Action::Create, "string"));

        let user = "user".to_string();
        let meta = child.evaluate(&user, None);
        assert!(meta.is_readable("string"));
        assert!(meta.allows(Action::Create, Some("string")));

        let meta = parent.evaluate(&user, None);
        assert!(meta.is_readable("string"));
        assert!(!meta.allows(Action::Create, None));
    }

    #[test]
    fn test_entry_rules_see_entity() {
        let model = model();
        model.protect_entry(|meta, user: &String, row: Option<&Row>| {
            let owned = row
                .and_then(|row| row.get("string"))
                .and_then(|v| v.as_str())
                .is_some_and(|owner| owner == user);
            if owned {
                meta.can(Action::Destroy, ());
            }
        });

        let row = Row::from_json(serde_json::json!({ "string": "alice" }));
        assert!(model.evaluate(&"alice".to_string(), Some(&row)).is_destroyable());
        assert!(!model.evaluate(&"bob".to_string(), Some(&row)).is_destroyable());
        assert!(!model.evaluate(&"alice".to_string(), None).is_destroyable());
    }

    #[test]
    fn test_paranoid_pin() {
        let model = model().with_paranoid(true);
        let user = "user".to_string();
        assert!(model.is_paranoid());
        assert!(model.is_scoped_for(&user));
        assert!(!Dummy::new(Table::new("x"), Arc::new(()))
            .with_paranoid(false)
            .is_scoped_for(&user));
    }
}
