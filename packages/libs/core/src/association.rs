//! 연관 엔티티
//!
//! 소유자에서 연관 대상으로 넘어갈 때 소유자의 주체가 그대로 전달됩니다.
//! 여러 소유자의 대상을 한 번에 읽는 preload는 소유자가 아닌 *대상 타입*의 scope를
//! 같은 주체로 평가해 적용합니다.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::{QueryBackend, Store};
use crate::constraint::values_equal;
use crate::error::Result;
use crate::guarded::Guarded;
use crate::model::Model;
use crate::record::Entity;
use crate::relation::Relation;
use crate::schema::Table;
use crate::subject::Restrictable;

/// eager-load 대상
pub trait Include<S> {
    fn name(&self) -> &str;

    /// 주체에 대해 대상 타입에 scope가 걸리는지
    fn is_scoped_for(&self, subject: &S) -> bool;
}

/// 연관 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// 대상의 외래키가 소유자의 기본키를 가리킴
    HasMany,
    /// 소유자의 외래키가 대상의 기본키를 가리킴
    BelongsTo,
}

pub struct Association<S, E, B: QueryBackend> {
    name: String,
    kind: AssociationKind,
    target: Arc<Model<S, E, B>>,
    foreign_key: String,
}

impl<S, E, B: QueryBackend> Association<S, E, B> {
    pub fn has_many(
        name: impl Into<String>,
        target: Arc<Model<S, E, B>>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::HasMany,
            target,
            foreign_key: foreign_key.into(),
        }
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: Arc<Model<S, E, B>>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::BelongsTo,
            target,
            foreign_key: foreign_key.into(),
        }
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn target(&self) -> &Arc<Model<S, E, B>> {
        &self.target
    }

    /// 대상 쪽 비교 필드
    fn target_field(&self) -> &str {
        match self.kind {
            AssociationKind::HasMany => &self.foreign_key,
            AssociationKind::BelongsTo => self.target.table().primary_key(),
        }
    }

    /// 소유자 쪽 키 값
    fn owner_key<'a, O: Entity>(&self, owner: &'a O, owner_table: &Table) -> Option<&'a Value> {
        let field = match self.kind {
            AssociationKind::HasMany => owner_table.primary_key(),
            AssociationKind::BelongsTo => &self.foreign_key,
        };
        owner.value(field).filter(|value| !value.is_null())
    }
}

impl<S: Clone, E, B: QueryBackend> Association<S, E, B> {
    /// 소유자 하나의 연관 쿼리 (소유자의 주체를 물려받음)
    pub fn for_owner<O: Entity, OB: QueryBackend>(
        &self,
        owner: &Guarded<S, O, OB>,
    ) -> Relation<S, E, B> {
        let relation = self
            .target
            .all()
            .with_restriction(owner.restriction().clone());

        match self.owner_key(owner.entity(), owner.model().table()) {
            Some(key) => relation.filter_eq(self.target_field(), key),
            None => {
                let backend = self.target.backend().clone();
                relation.map(|query| backend.none(query))
            }
        }
    }
}

impl<S, E, B> Association<S, E, B>
where
    S: Clone,
    E: Entity + Clone,
    B: Store<Row = E>,
{
    /// 여러 소유자의 연관 대상을 한 번에 읽음
    ///
    /// 결과는 `owners`와 같은 순서입니다.
    pub fn preload<O: Entity, OB: QueryBackend>(
        &self,
        owners: &[Guarded<S, O, OB>],
    ) -> Result<Vec<Vec<Guarded<S, E, B>>>> {
        let Some(first) = owners.first() else {
            return Ok(Vec::new());
        };

        let keys: Vec<Value> = owners
            .iter()
            .filter_map(|owner| self.owner_key(owner.entity(), owner.model().table()))
            .fold(Vec::new(), |mut keys, key| {
                if !keys.iter().any(|k| values_equal(k, key)) {
                    keys.push(key.clone());
                }
                keys
            });

        let backend = self.target.backend();
        let mut query = backend.filter_in(
            backend.base(self.target.table()),
            self.target_field(),
            &keys,
        );

        if first.is_bound() {
            let subject = first.subject()?;
            query = self.target.scope_for(subject, query);
        }

        let rows = backend.fetch(&query)?;
        tracing::trace!(association = %self.name, owners = owners.len(), rows = rows.len(), "preloaded");

        Ok(owners
            .iter()
            .map(|owner| {
                let key = self.owner_key(owner.entity(), owner.model().table());
                rows.iter()
                    .filter(|row| {
                        let value = row.value(self.target_field());
                        matches!((key, value), (Some(k), Some(v)) if values_equal(k, v))
                    })
                    .map(|row| {
                        let mut guarded = Guarded::new(self.target.clone(), row.clone());
                        *guarded.restriction_mut() = owner.restriction().clone();
                        guarded
                    })
                    .collect()
            })
            .collect())
    }
}

impl<S, E, B: QueryBackend> Include<S> for Association<S, E, B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_scoped_for(&self, subject: &S) -> bool {
        self.target.is_scoped_for(subject)
    }
}

impl<S, E, B: QueryBackend> fmt::Debug for Association<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target.name())
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}
