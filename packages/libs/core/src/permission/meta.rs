//! 권한 박스
//!
//! 한 (주체, 엔티티) 쌍에 대해 모든 규칙을 실행한 결과입니다.
//! 규칙 closure는 이 박스를 `&mut`로 받아 [`PermissionBox::can`], [`PermissionBox::cannot`],
//! [`PermissionBox::scope`]로 직접 채웁니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::action::Action;
use crate::backend::QueryBackend;
use crate::constraint::Constraint;
use crate::fields::{FieldValues, IntoFieldSpecs};
use crate::schema::Table;

/// 생성/수정 거부 사유에서 특정 필드를 가리킬 수 없을 때 쓰는 이름
pub const BASE_FIELD: &str = "base";

/// 필드 이름 → 제약
pub type FieldAccess = BTreeMap<String, Constraint>;

/// 쿼리 변환 closure
pub type ScopeFn<Q> = Arc<dyn Fn(Q) -> Q + Send + Sync>;

/// scope 합성에 필요한 저장소 정보
pub struct ScopeContext<B: QueryBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) table: Arc<Table>,
    pub(crate) paranoid: bool,
}

impl<B: QueryBackend> ScopeContext<B> {
    pub fn new(backend: Arc<B>, table: Arc<Table>, paranoid: bool) -> Self {
        Self {
            backend,
            table,
            paranoid,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn is_paranoid(&self) -> bool {
        self.paranoid
    }
}

impl<B: QueryBackend> Clone for ScopeContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            table: self.table.clone(),
            paranoid: self.paranoid,
        }
    }
}

/// 권한 평가 결과
///
/// 주체가 바뀌면 버려야 하며, 여러 스레드가 공유하지 않는 것을 전제로 합니다
/// (scope relation 캐시가 `unsync`입니다). 소유 객체를 스레드 간에 공유하려면
/// 호출자가 동기화를 책임집니다.
pub struct PermissionBox<B: QueryBackend> {
    fields: Vec<String>,
    access: HashMap<Action, FieldAccess>,
    destroyable: bool,
    pub(crate) scopes: Vec<ScopeFn<B::Query>>,
    pub(crate) context: ScopeContext<B>,
    pub(crate) relation: OnceCell<B::Query>,
}

impl<B: QueryBackend> PermissionBox<B> {
    /// 빈 박스 생성
    ///
    /// `fields`는 엔티티 타입의 전체 필드 목록입니다.
    pub fn new(fields: Vec<String>, context: ScopeContext<B>) -> Self {
        Self {
            fields,
            access: HashMap::new(),
            destroyable: false,
            scopes: Vec::new(),
            context,
            relation: OnceCell::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 규칙 DSL
    // ─────────────────────────────────────────────────────────────────────────────

    /// 액션 허용
    ///
    /// 필드 인자가 비어 있으면 모든 필드에 허용합니다. 같은 필드를 다시 허용하면
    /// 나중 제약이 덮어씁니다. `destroy`는 필드와 무관하게 플래그만 켭니다.
    pub fn can(&mut self, action: impl Into<Action>, fields: impl IntoFieldSpecs) {
        let action = action.into();
        if action == Action::Destroy {
            self.destroyable = true;
            return;
        }

        let specs = fields.into_field_specs();
        let granted = self.access.entry(action).or_default();

        if specs.is_empty() {
            for field in &self.fields {
                granted.insert(field.clone(), Constraint::Unconstrained);
            }
            return;
        }

        for (field, constraint) in specs.into_iter().flat_map(|spec| spec.into_entries()) {
            granted.insert(field, constraint);
        }
    }

    /// 모든 필드에 액션 허용
    pub fn can_all(&mut self, action: impl Into<Action>) {
        self.can(action, ());
    }

    /// 액션 거부
    ///
    /// 필드 인자가 비어 있으면 액션 자체를 지웁니다. 필드를 지운 뒤 남은 필드가
    /// 없어도 액션을 지웁니다.
    pub fn cannot(&mut self, action: impl Into<Action>, fields: impl IntoFieldSpecs) {
        let action = action.into();
        if action == Action::Destroy {
            self.destroyable = false;
            return;
        }

        let specs = fields.into_field_specs();
        if specs.is_empty() {
            self.access.remove(&action);
            return;
        }

        let Some(granted) = self.access.get_mut(&action) else {
            return;
        };

        for spec in &specs {
            for field in spec.names() {
                granted.remove(field);
            }
        }

        if granted.is_empty() {
            self.access.remove(&action);
        }
    }

    /// 액션 전체 거부
    pub fn cannot_all(&mut self, action: impl Into<Action>) {
        self.cannot(action, ());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 조회
    // ─────────────────────────────────────────────────────────────────────────────

    /// 전체 접근 테이블
    pub fn access(&self) -> &HashMap<Action, FieldAccess> {
        &self.access
    }

    /// 액션에 허용된 필드
    pub fn granted(&self, action: &Action) -> Option<&FieldAccess> {
        self.access.get(action)
    }

    /// 엔티티 타입의 전체 필드
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// scope 합성에 쓰는 저장소 정보
    pub fn context(&self) -> &ScopeContext<B> {
        &self.context
    }

    /// 필드 읽기 가능 여부
    pub fn is_readable(&self, field: &str) -> bool {
        self.access
            .get(&Action::Read)
            .is_some_and(|granted| granted.contains_key(field))
    }

    /// 주어진 값으로 생성 가능한지 (`None`이면 create 액션 존재 여부만)
    pub fn is_creatable(&self, values: Option<&FieldValues>) -> bool {
        self.is_modifiable(&Action::Create, values)
    }

    /// 주어진 값으로 수정 가능한지 (`None`이면 update 액션 존재 여부만)
    pub fn is_updatable(&self, values: Option<&FieldValues>) -> bool {
        self.is_modifiable(&Action::Update, values)
    }

    /// 삭제 가능 여부
    pub fn is_destroyable(&self) -> bool {
        self.destroyable
    }

    /// 임의 액션 확인
    ///
    /// `field`가 없으면 액션에 필드가 하나라도 있는지, 있으면 그 필드가 허용됐는지 봅니다.
    pub fn allows(&self, action: impl Into<Action>, field: Option<&str>) -> bool {
        let action = action.into();
        if action == Action::Destroy {
            return self.destroyable;
        }

        match (self.access.get(&action), field) {
            (None, _) => false,
            (Some(granted), None) => !granted.is_empty(),
            (Some(granted), Some(field)) => granted.contains_key(field),
        }
    }

    /// 생성을 막는 첫 필드 (없으면 `None`)
    pub fn first_uncreatable_field(&self, values: &FieldValues) -> Option<String> {
        self.first_unmodifiable_field(&Action::Create, values)
    }

    /// 수정을 막는 첫 필드 (없으면 `None`)
    pub fn first_unupdatable_field(&self, values: &FieldValues) -> Option<String> {
        self.first_unmodifiable_field(&Action::Update, values)
    }

    /// 액션에 허용된 필드만 남김 (strong parameters)
    pub fn permitted(&self, action: &Action, values: FieldValues) -> FieldValues {
        let Some(granted) = self.access.get(action) else {
            return FieldValues::new();
        };

        values
            .into_iter()
            .filter(|(field, _)| granted.contains_key(field))
            .collect()
    }

    fn is_modifiable(&self, action: &Action, values: Option<&FieldValues>) -> bool {
        let Some(granted) = self.access.get(action).filter(|g| !g.is_empty()) else {
            return false;
        };

        let Some(values) = values else {
            return true;
        };

        values.iter().all(|(field, value)| {
            granted
                .get(field)
                .is_some_and(|constraint| constraint.check(value))
        })
    }

    fn first_unmodifiable_field(&self, action: &Action, values: &FieldValues) -> Option<String> {
        let Some(granted) = self.access.get(action).filter(|g| !g.is_empty()) else {
            let field = values
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| BASE_FIELD.to_string());
            tracing::debug!(%action, %field, "action not granted");
            return Some(field);
        };

        for (field, value) in values {
            let allowed = granted
                .get(field)
                .is_some_and(|constraint| constraint.check(value));

            if !allowed {
                tracing::debug!(%action, %field, "field value rejected");
                return Some(field.clone());
            }
        }

        None
    }
}

impl<B: QueryBackend> fmt::Debug for PermissionBox<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionBox")
            .field("access", &self.access)
            .field("destroyable", &self.destroyable)
            .field("scopes", &self.scopes.len())
            .field("paranoid", &self.context.paranoid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldSpec;
    use serde_json::json;

    fn empty_box(fields: &[&str]) -> PermissionBox<()> {
        let table = Table::with_fields("dummies", fields.iter().copied());
        PermissionBox::new(
            table.field_names(),
            ScopeContext::new(Arc::new(()), Arc::new(table), false),
        )
    }

    fn values(value: serde_json::Value) -> FieldValues {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_box_denies_everything() {
        let meta = empty_box(&["string", "number"]);

        assert!(!meta.is_creatable(None));
        assert!(!meta.is_updatable(None));
        assert!(!meta.is_destroyable());
        assert!(!meta.is_readable("string"));
        assert!(!meta.allows(Action::Read, None));
    }

    #[test]
    fn test_can_without_fields_grants_all() {
        let mut meta = empty_box(&["string", "number"]);
        meta.can_all(Action::Read);

        let granted = meta.granted(&Action::Read).unwrap();
        assert_eq!(granted.len(), 3);
        assert!(meta.is_readable("id"));
        assert!(meta.is_readable("number"));
    }

    #[test]
    fn test_can_then_cannot_equals_never_declared() {
        let mut meta = empty_box(&["f"]);
        meta.can(Action::Read, "f");
        meta.cannot(Action::Read, "f");

        assert!(!meta.is_readable("f"));
        assert!(!meta.allows(Action::Read, None));
        assert!(meta.granted(&Action::Read).is_none());
    }

    #[test]
    fn test_cannot_some_fields() {
        let mut meta = empty_box(&["field1", "field2", "field3", "field4", "field5"]);
        meta.can_all("view");
        meta.cannot(
            Action::Read,
            vec![FieldSpec::from(vec!["field5"]), FieldSpec::from("field4")],
        );

        let granted: Vec<_> = meta.granted(&Action::Read).unwrap().keys().cloned().collect();
        assert_eq!(granted, vec!["field1", "field2", "field3", "id"]);
    }

    #[test]
    fn test_cannot_without_fields_removes_action() {
        let mut meta = empty_box(&["a"]);
        meta.can(Action::Update, "a");
        meta.cannot_all(Action::Update);

        assert!(!meta.access().contains_key(&Action::Update));
        assert!(!meta.is_updatable(None));
    }

    #[test]
    fn test_cannot_on_undeclared_action_is_noop() {
        let mut meta = empty_box(&["a"]);
        meta.cannot(Action::Create, "a");
        assert!(meta.access().is_empty());
    }

    #[test]
    fn test_merge_is_right_biased() {
        let mut meta = empty_box(&["a"]);
        meta.can(Action::Update, ("a", 1..=5));
        meta.can(Action::Update, ("a", 10));

        let constraint = &meta.granted(&Action::Update).unwrap()["a"];
        assert_eq!(constraint, &Constraint::from(10));
        assert!(meta.is_updatable(Some(&values(json!({ "a": 10 })))));
        assert!(!meta.is_updatable(Some(&values(json!({ "a": 3 })))));
    }

    #[test]
    fn test_creatable_requires_declared_field() {
        let mut meta = empty_box(&["a", "b"]);
        meta.can(Action::Create, "a");

        assert!(meta.is_creatable(Some(&values(json!({ "a": 3 })))));
        assert!(!meta.is_creatable(Some(&values(json!({ "b": 3 })))));
        assert!(!meta.is_creatable(Some(&values(json!({ "a": 3, "b": 1 })))));
    }

    #[test]
    fn test_range_constraint() {
        let mut meta = empty_box(&["number"]);
        meta.can(Action::Create, ("number", 0..=2));

        assert!(meta.is_creatable(Some(&values(json!({ "number": 0 })))));
        assert!(meta.is_creatable(Some(&values(json!({ "number": 2 })))));
        assert!(!meta.is_creatable(Some(&values(json!({ "number": 3 })))));
    }

    #[test]
    fn test_predicate_constraint() {
        let mut meta = empty_box(&["string"]);
        meta.can(
            Action::Create,
            (
                "string",
                Constraint::predicate(|v| v.as_str().is_some_and(|s| s.len() == 5)),
            ),
        );

        assert!(meta.is_creatable(Some(&values(json!({ "string": "abcde" })))));
        assert!(!meta.is_creatable(Some(&values(json!({ "string": "ab" })))));
    }

    #[test]
    fn test_destroy_only() {
        let mut meta = empty_box(&["a"]);
        meta.can(Action::Destroy, ());

        assert!(meta.is_destroyable());
        assert!(meta.allows(Action::Destroy, None));
        assert!(!meta.is_creatable(None));
        assert!(!meta.is_readable("a"));
        assert!(meta.access().is_empty());

        meta.cannot(Action::Destroy, ());
        assert!(!meta.is_destroyable());
    }

    #[test]
    fn test_declared_but_empty_is_not_allowed() {
        let mut meta = empty_box(&[]);
        meta.access.insert(Action::Custom("publish".to_string()), FieldAccess::new());

        assert!(meta.access().contains_key(&Action::Custom("publish".to_string())));
        assert!(!meta.allows("publish", None));
    }

    #[test]
    fn test_custom_action() {
        let mut meta = empty_box(&["title"]);
        meta.can("publish", "title");

        assert!(meta.allows("publish", None));
        assert!(meta.allows("publish", Some("title")));
        assert!(!meta.allows("publish", Some("body")));
        assert!(!meta.allows("archive", None));
    }

    #[test]
    fn test_first_unmodifiable_field() {
        let mut meta = empty_box(&["string", "number"]);

        assert_eq!(
            meta.first_uncreatable_field(&values(json!({ "string": "bam" }))),
            Some("string".to_string())
        );
        assert_eq!(
            meta.first_uncreatable_field(&FieldValues::new()),
            Some(BASE_FIELD.to_string())
        );

        meta.can(Action::Create, "string");
        meta.can(Action::Update, ("number", 0..=2));

        assert_eq!(
            meta.first_uncreatable_field(&values(json!({ "string": "bam" }))),
            None
        );
        assert_eq!(
            meta.first_uncreatable_field(&values(json!({ "number": 1, "string": "bam" }))),
            Some("number".to_string())
        );
        assert_eq!(
            meta.first_unupdatable_field(&values(json!({ "number": 500 }))),
            Some("number".to_string())
        );
    }

    #[test]
    fn test_first_unmodifiable_agrees_with_predicate() {
        let mut meta = empty_box(&["a", "b"]);
        meta.can(Action::Update, [("a", Constraint::from(0..=5)), ("b", Constraint::Unconstrained)]);

        for input in [
            json!({}),
            json!({ "a": 3 }),
            json!({ "a": 9 }),
            json!({ "b": null }),
            json!({ "c": 1 }),
        ] {
            let input = values(input);
            assert_eq!(
                meta.is_updatable(Some(&input)),
                meta.first_unupdatable_field(&input).is_none()
            );
        }
    }

    #[test]
    fn test_permitted() {
        let mut meta = empty_box(&["string", "number"]);
        meta.can(Action::Create, "string");

        let permitted = meta.permitted(
            &Action::Create,
            values(json!({ "string": "test", "number": 1 })),
        );
        assert_eq!(permitted, values(json!({ "string": "test" })));
        assert!(meta
            .permitted(&Action::Update, values(json!({ "string": "x" })))
            .is_empty());
    }
}
