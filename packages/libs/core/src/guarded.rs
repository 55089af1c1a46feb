//! 보호된 단일 엔티티
//!
//! 엔티티 하나와 주체 바인딩, 그리고 처음 필요할 때 계산되는 권한 박스를 묶습니다.
//! 주체가 바인딩되지 않았거나 신뢰 모드에서는 모든 검사를 통과합니다.

use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use serde_json::Value;

use crate::action::Action;
use crate::backend::{QueryBackend, Store};
use crate::config;
use crate::error::Result;
use crate::fields::FieldValues;
use crate::model::Model;
use crate::permission::PermissionBox;
use crate::record::Entity;
use crate::subject::{Restrictable, Restriction};
use crate::validation::{DefaultMessages, MessageLookup, ValidationError};

/// 보호된 엔티티
///
/// 권한 박스는 `unsync` 캐시이므로 스레드 간에 공유하려면 호출자가 동기화해야 합니다.
pub struct Guarded<S, E, B: QueryBackend> {
    model: Arc<Model<S, E, B>>,
    entity: E,
    restriction: Restriction<S>,
    meta: OnceCell<PermissionBox<B>>,
}

impl<S, E, B: QueryBackend> Restrictable<S> for Guarded<S, E, B> {
    fn restriction(&self) -> &Restriction<S> {
        &self.restriction
    }

    fn restriction_mut(&mut self) -> &mut Restriction<S> {
        &mut self.restriction
    }

    fn invalidate(&mut self) {
        self.meta = OnceCell::new();
    }
}

impl<S, E, B: QueryBackend> Guarded<S, E, B> {
    pub fn new(model: Arc<Model<S, E, B>>, entity: E) -> Self {
        Self {
            model,
            entity,
            restriction: Restriction::unbound(),
            meta: OnceCell::new(),
        }
    }

    pub fn model(&self) -> &Arc<Model<S, E, B>> {
        &self.model
    }

    /// 검사 없이 원본 엔티티
    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn into_inner(self) -> E {
        self.entity
    }

    /// 권한 박스가 계산돼 있는지
    pub fn is_evaluated(&self) -> bool {
        self.meta.get().is_some()
    }
}

impl<S, E: Entity, B: QueryBackend> Guarded<S, E, B> {
    /// 권한 박스 (처음 호출 시 평가)
    pub fn meta(&self) -> Result<&PermissionBox<B>> {
        let subject = self.restriction.subject()?;
        Ok(self
            .meta
            .get_or_init(|| self.model.evaluate(subject, Some(&self.entity))))
    }

    fn enforced_meta(&self) -> Option<&PermissionBox<B>> {
        if self.is_bound() {
            self.meta().ok()
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 필드 읽기 (FieldAccessGuard)
    // ─────────────────────────────────────────────────────────────────────────────

    /// 읽기 권한을 거친 필드 값
    ///
    /// 바인딩되지 않았으면 원본 값, 기본키는 항상 읽을 수 있고, 그 외에는 읽기 권한이 없으면 `None`입니다.
    pub fn read(&self, field: &str) -> Option<&Value> {
        let Some(meta) = self.enforced_meta() else {
            return self.entity.value(field);
        };

        if self.model.table().is_primary_key(field) || meta.is_readable(field) {
            self.entity.value(field)
        } else {
            None
        }
    }

    /// 읽을 수 있는 필드만 모은 값
    pub fn readable_values(&self) -> FieldValues {
        self.model
            .fields()
            .into_iter()
            .filter_map(|field| {
                let value = self.read(&field)?.clone();
                Some((field, value))
            })
            .collect()
    }

    pub fn primary_key_value(&self) -> Option<&Value> {
        self.entity.value(self.model.table().primary_key())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 액션 검사
    // ─────────────────────────────────────────────────────────────────────────────

    /// 현재 변경 사항으로 생성 가능한지
    pub fn is_creatable(&self) -> Result<bool> {
        let changes = self.entity.changes();
        Ok(self.meta()?.is_creatable(Some(&changes)))
    }

    /// 현재 변경 사항으로 수정 가능한지
    pub fn is_updatable(&self) -> Result<bool> {
        let changes = self.entity.changes();
        Ok(self.meta()?.is_updatable(Some(&changes)))
    }

    pub fn is_destroyable(&self) -> Result<bool> {
        Ok(self.meta()?.is_destroyable())
    }

    pub fn allows(&self, action: impl Into<Action>, field: Option<&str>) -> Result<bool> {
        Ok(self.meta()?.allows(action, field))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // 저장 계층 훅
    // ─────────────────────────────────────────────────────────────────────────────

    /// 저장 전 검증
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.validate_with(&DefaultMessages)
    }

    /// 메시지 조회 협력자를 지정한 저장 전 검증
    ///
    /// 신규 엔티티는 create, 기존 엔티티는 update 권한으로 변경 필드를 검사합니다.
    pub fn validate_with(
        &self,
        messages: &dyn MessageLookup,
    ) -> std::result::Result<(), ValidationError> {
        let Some(meta) = self.enforced_meta() else {
            return Ok(());
        };

        let changes = self.entity.changes();
        let field = if self.entity.is_new() {
            meta.first_uncreatable_field(&changes)
        } else {
            meta.first_unupdatable_field(&changes)
        };

        match field {
            Some(field) => {
                tracing::debug!(table = %self.model.name(), %field, "save rejected");
                Err(ValidationError::new(field, messages))
            }
            None => Ok(()),
        }
    }

    /// 삭제 허용 여부 (거부는 에러가 아니라 `false`)
    pub fn allows_destroy(&self) -> bool {
        let allowed = self
            .enforced_meta()
            .map_or(true, |meta| meta.is_destroyable());

        if !allowed {
            tracing::debug!(table = %self.model.name(), "destroy refused");
        }
        allowed
    }

    /// 허용된 필드만 대입 (strong parameters)
    ///
    /// 거부된 필드 이름을 돌려줍니다. strong parameters가 꺼져 있으면 모두 대입합니다.
    pub fn assign_permitted(&mut self, values: FieldValues) -> Vec<String> {
        let action = if self.entity.is_new() {
            Action::Create
        } else {
            Action::Update
        };

        let mut rejected = Vec::new();
        let permitted = match self.enforced_meta() {
            Some(meta) if config::strong_parameters() => {
                rejected = values
                    .keys()
                    .filter(|field| !meta.allows(action.clone(), Some(field.as_str())))
                    .cloned()
                    .collect();
                meta.permitted(&action, values)
            }
            _ => values,
        };

        for (field, value) in permitted {
            self.entity.assign(&field, value);
        }
        rejected
    }
}

impl<S, E, B> Guarded<S, E, B>
where
    E: Entity,
    B: Store<Row = E>,
{
    /// 엔티티가 주체의 scope 안에 있는지
    pub fn is_visible(&self) -> Result<bool> {
        if !self.is_bound() {
            return Ok(true);
        }

        let meta = self.meta()?;
        let Some(relation) = meta.relation() else {
            return Ok(true);
        };

        let pk = self.model.table().primary_key();
        let Some(id) = self.entity.value(pk) else {
            return Ok(false);
        };

        let backend = self.model.backend();
        let query = backend.filter_eq(relation.clone(), pk, id);
        Ok(backend.count(&query)?.unwrap_or(0) > 0)
    }
}

impl<S: Clone, E: Clone, B: QueryBackend> Clone for Guarded<S, E, B> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            entity: self.entity.clone(),
            restriction: self.restriction.clone(),
            meta: OnceCell::new(),
        }
    }
}

impl<S: fmt::Debug, E: fmt::Debug, B: QueryBackend> fmt::Debug for Guarded<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("model", &self.model.name())
            .field("entity", &self.entity)
            .field("restriction", &self.restriction)
            .finish()
    }
}
