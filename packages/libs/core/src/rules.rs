//! 보호 규칙 등록
//!
//! 규칙은 권한 박스를 채우는 closure입니다. 인자 개수에 따라 세 가지 형태가 있습니다.
//!
//! | 형태 | 인자 |
//! |------|------|
//! | [`Rule::Plain`] | 박스 |
//! | [`Rule::Subject`] | 박스, 주체 |
//! | [`Rule::Entry`] | 박스, 주체, 엔티티 (컬렉션 수준 평가에서는 `None`) |
//!
//! [`RuleSet`]은 부모 규칙 집합을 가리킬 수 있으며, 부모 규칙이 항상 먼저 실행됩니다.
//! 자식에 규칙을 추가해도 부모는 바뀌지 않습니다.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::QueryBackend;
use crate::permission::{self, PermissionBox, ScopeContext};

type PlainFn<B> = dyn Fn(&mut PermissionBox<B>) + Send + Sync;
type SubjectFn<S, B> = dyn Fn(&mut PermissionBox<B>, &S) + Send + Sync;
type EntryFn<S, E, B> = dyn Fn(&mut PermissionBox<B>, &S, Option<&E>) + Send + Sync;

/// 보호 규칙
pub enum Rule<S, E, B: QueryBackend> {
    Plain(Arc<PlainFn<B>>),
    Subject(Arc<SubjectFn<S, B>>),
    Entry(Arc<EntryFn<S, E, B>>),
}

impl<S, E, B: QueryBackend> Rule<S, E, B> {
    pub fn plain(f: impl Fn(&mut PermissionBox<B>) + Send + Sync + 'static) -> Self {
        Rule::Plain(Arc::new(f))
    }

    pub fn subject(f: impl Fn(&mut PermissionBox<B>, &S) + Send + Sync + 'static) -> Self {
        Rule::Subject(Arc::new(f))
    }

    pub fn entry(
        f: impl Fn(&mut PermissionBox<B>, &S, Option<&E>) + Send + Sync + 'static,
    ) -> Self {
        Rule::Entry(Arc::new(f))
    }

    /// 인자 개수에 맞춰 규칙 실행
    pub fn apply(&self, meta: &mut PermissionBox<B>, subject: &S, entry: Option<&E>) {
        match self {
            Rule::Plain(f) => f(meta),
            Rule::Subject(f) => f(meta, subject),
            Rule::Entry(f) => f(meta, subject, entry),
        }
    }
}

impl<S, E, B: QueryBackend> Clone for Rule<S, E, B> {
    fn clone(&self) -> Self {
        match self {
            Rule::Plain(f) => Rule::Plain(f.clone()),
            Rule::Subject(f) => Rule::Subject(f.clone()),
            Rule::Entry(f) => Rule::Entry(f.clone()),
        }
    }
}

impl<S, E, B: QueryBackend> fmt::Debug for Rule<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Rule::Plain(_) => "plain",
            Rule::Subject(_) => "subject",
            Rule::Entry(_) => "entry",
        };
        f.debug_tuple("Rule").field(&kind).finish()
    }
}

/// 엔티티 타입별 규칙 집합
///
/// 등록은 보통 초기화 시점에 끝나지만, 내부 잠금 덕분에 평가와 동시에 일어나도 안전합니다.
/// 평가는 규칙 목록을 복사한 뒤 잠금 없이 실행합니다.
pub struct RuleSet<S, E, B: QueryBackend> {
    parent: Option<Arc<RuleSet<S, E, B>>>,
    own: RwLock<Vec<Rule<S, E, B>>>,
}

impl<S, E, B: QueryBackend> RuleSet<S, E, B> {
    pub fn new() -> Self {
        Self {
            parent: None,
            own: RwLock::new(Vec::new()),
        }
    }

    /// 부모 규칙을 상속하는 빈 집합
    pub fn inheriting(parent: Arc<RuleSet<S, E, B>>) -> Self {
        Self {
            parent: Some(parent),
            own: RwLock::new(Vec::new()),
        }
    }

    pub fn parent(&self) -> Option<&Arc<RuleSet<S, E, B>>> {
        self.parent.as_ref()
    }

    /// 규칙 추가
    pub fn register(&self, rule: Rule<S, E, B>) {
        self.own.write().push(rule);
    }

    pub fn protect(&self, f: impl Fn(&mut PermissionBox<B>) + Send + Sync + 'static) {
        self.register(Rule::plain(f));
    }

    pub fn protect_subject(&self, f: impl Fn(&mut PermissionBox<B>, &S) + Send + Sync + 'static) {
        self.register(Rule::subject(f));
    }

    pub fn protect_entry(
        &self,
        f: impl Fn(&mut PermissionBox<B>, &S, Option<&E>) + Send + Sync + 'static,
    ) {
        self.register(Rule::entry(f));
    }

    /// 실행 순서대로 정렬된 전체 규칙 (부모 먼저)
    pub fn rules(&self) -> Vec<Rule<S, E, B>> {
        let mut rules = self
            .parent
            .as_ref()
            .map(|parent| parent.rules())
            .unwrap_or_default();
        rules.extend(self.own.read().iter().cloned());
        rules
    }

    /// 이 집합에 직접 등록된 규칙 수
    pub fn own_len(&self) -> usize {
        self.own.read().len()
    }

    /// 상속 포함 전체 규칙 수
    pub fn len(&self) -> usize {
        self.own_len() + self.parent.as_ref().map_or(0, |parent| parent.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 규칙 전체를 실행해 권한 박스 생성
    pub fn evaluate(
        &self,
        subject: &S,
        entry: Option<&E>,
        fields: Vec<String>,
        context: ScopeContext<B>,
    ) -> PermissionBox<B> {
        permission::evaluate(&self.rules(), subject, entry, fields, context)
    }
}

impl<S, E, B: QueryBackend> Default for RuleSet<S, E, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E, B: QueryBackend> fmt::Debug for RuleSet<S, E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("own", &self.own_len())
            .field("inherited", &self.parent.is_some())
            .finish()
    }
}
