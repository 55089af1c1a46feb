//! 보호된 컬렉션 쿼리
//!
//! 주체가 바인딩된 쿼리는 실행 직전에 scope relation과 합쳐집니다. 조회된 Row와
//! 새로 만든 엔티티는 쿼리의 주체를 물려받습니다.

use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use serde_json::Value;

use crate::action::Action;
use crate::association::Include;
use crate::backend::{QueryBackend, Store};
use crate::config;
use crate::error::Result;
use crate::fields::FieldValues;
use crate::guarded::Guarded;
use crate::model::Model;
use crate::permission::PermissionBox;
use crate::record::Entity;
use crate::subject::{Restrictable, Restriction};

/// eager-load 계획
///
/// 대상 타입에 scope가 없으면 JOIN으로 함께 읽고, scope가 있으면 대상 scope를 적용해 따로 읽습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    pub joined: Vec<String>,
    pub preloaded: Vec<String>,
}

pub struct Relation<S, E, B: QueryBackend> {
    model: Arc<Model<S, E, B>>,
    query: B::Query,
    restriction: Restriction<S>,
    includes: Vec<Arc<dyn Include<S>>>,
    meta: OnceCell<PermissionBox<B>>,
}

impl<S, E, B: QueryBackend> Restrictable<S> for Relation<S, E, B> {
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

impl<S, E, B: QueryBackend> Relation<S, E, B> {
    /// 모델의 기본 쿼리에서 시작
    pub fn new(model: Arc<Model<S, E, B>>) -> Self {
        let query = model.backend().base(model.table());
        Self {
            model,
            query,
            restriction: Restriction::unbound(),
            includes: Vec::new(),
            meta: OnceCell::new(),
        }
    }

    pub(crate) fn with_restriction(mut self, restriction: Restriction<S>) -> Self {
        self.restriction = restriction;
        self.meta = OnceCell::new();
        self
    }

    pub fn model(&self) -> &Arc<Model<S, E, B>> {
        &self.model
    }

    /// scope가 합쳐지기 전의 쿼리
    pub fn query(&self) -> &B::Query {
        &self.query
    }

    /// 쿼리 변환
    pub fn map(mut self, f: impl FnOnce(B::Query) -> B::Query) -> Self {
        self.query = f(self.query);
        self
    }

    pub fn filter_eq(self, field: &str, value: &Value) -> Self {
        let backend = self.model.backend().clone();
        self.map(|query| backend.filter_eq(query, field, value))
    }

    pub fn filter_in(self, field: &str, values: &[Value]) -> Self {
        let backend = self.model.backend().clone();
        self.map(|query| backend.filter_in(query, field, values))
    }

    /// 필터를 모두 버린 기본 쿼리 (주체는 유지)
    pub fn unscoped(mut self) -> Self {
        self.query = self.model.backend().base(self.model.table());
        self.includes.clear();
        self
    }

    /// eager-load 대상 추가
    pub fn include(mut self, include: Arc<dyn Include<S>>) -> Self {
        self.includes.push(include);
        self
    }

    pub fn includes(&self) -> &[Arc<dyn Include<S>>] {
        &self.includes
    }

    /// 컬렉션 수준 권한 박스
    pub fn meta(&self) -> Result<&PermissionBox<B>> {
        let subject = self.restriction.subject()?;
        Ok(self.meta.get_or_init(|| self.model.evaluate(subject, None)))
    }

    fn enforced_meta(&self) -> Option<&PermissionBox<B>> {
        if self.is_bound() {
            self.meta().ok()
        } else {
            None
        }
    }

    /// 실행할 쿼리 (바인딩되고 scope가 있으면 scope relation과 합침)
    pub fn restricted_query(&self) -> B::Query {
        let relation = self.enforced_meta().and_then(|meta| meta.relation());

        match relation {
            Some(relation) => {
                tracing::trace!(table = %self.model.name(), "merging scope relation");
                self.model.backend().merge(self.query.clone(), relation)
            }
            None => self.query.clone(),
        }
    }

    /// eager-load 계획
    pub fn load_plan(&self) -> LoadPlan {
        let mut plan = LoadPlan::default();
        let subject = if self.is_bound() {
            self.restriction.subject().ok()
        } else {
            None
        };

        for include in &self.includes {
            let scoped = subject.is_some_and(|subject| include.is_scoped_for(subject));
            let name = include.name().to_string();
            if scoped {
                plan.preloaded.push(name);
            } else {
                plan.joined.push(name);
            }
        }

        plan
    }
}

impl<S: Clone, E: Entity, B: QueryBackend> Relation<S, E, B> {
    /// 새 엔티티 (쿼리의 주체를 물려받음)
    pub fn build(&self, values: FieldValues) -> Guarded<S, E, B> {
        let mut guarded = Guarded::new(self.model.clone(), E::from_values(values));
        *guarded.restriction_mut() = self.restriction.clone();
        guarded
    }

    /// create 권한이 있는 필드만으로 새 엔티티
    ///
    /// strong parameters가 꺼져 있거나 바인딩되지 않았으면 [`Relation::build`]와 같습니다.
    pub fn build_permitted(&self, values: FieldValues) -> Guarded<S, E, B> {
        let values = match self.enforced_meta() {
            Some(meta) if config::strong_parameters() => meta.permitted(&Action::Create, values),
            _ => values,
        };
        self.build(values)
    }
}

impl<S, E, B> Relation<S, E, B>
where
    S: Clone,
    E: Entity,
    B: Store<Row = E>,
{
    /// Row 수 (저장소가 `None`을 돌려주면 0)
    pub fn count(&self) -> Result<u64> {
        let query = self.restricted_query();
        Ok(self.model.backend().count(&query)?.unwrap_or(0))
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Row 조회 (각 Row는 쿼리의 주체를 물려받음)
    pub fn fetch(&self) -> Result<Vec<Guarded<S, E, B>>> {
        let query = self.restricted_query();
        let rows = self.model.backend().fetch(&query)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut guarded = Guarded::new(self.model.clone(), row);
                *guarded.restriction_mut() = self.restriction.clone();
                guarded
            })
            .collect())
    }
}

impl<S: Clone, E, B: QueryBackend> Clone for Relation<S, E, B> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            query: self.query.clone(),
            restriction: self.restriction.clone(),
            includes: self.includes.clone(),
            meta: OnceCell::new(),
        }
    }
}

impl<S: fmt::Debug, E, B: QueryBackend> fmt::Debug for Relation<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("model", &self.model.name())
            .field("restriction", &self.restriction)
            .field("includes", &self.includes.len())
            .finish()
    }
}
