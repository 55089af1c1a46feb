//! 정책을 모델 규칙으로 설치
//!
//! 테이블 정책의 각 규칙은 주체를 받는 보호 규칙 하나로 컴파일됩니다.
//! role이 맞는 규칙만 선언 순서대로 적용되므로, 여러 규칙이 겹치면 권한이 누적되고
//! 같은 필드는 나중 규칙의 제약이 이깁니다.

use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use cel_interpreter::Program;
use serde_json::Value;

use super::cel;
use super::context::Principal;
use super::policy::{
    ConstraintSpec, FieldList, PermissionPolicy, PolicyRule, RangeSpec, RoleRequirement,
    ScopeKeyword, ScopeSpec,
};
use crate::action::Action;
use crate::backend::QueryBackend;
use crate::constraint::{Constraint, ValueRange};
use crate::error::{Error, Result};
use crate::fields::FieldSpec;
use crate::model::Model;
use crate::permission::PermissionBox;
use crate::schema::Table;

/// 컴파일된 필드 제약 (CEL은 평가 시 주체 정보와 묶임)
#[derive(Clone)]
enum FieldConstraint {
    Unconstrained,
    Literal(Value),
    Range(ValueRange),
    Cel(String, Arc<Program>),
}

impl fmt::Debug for FieldConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldConstraint::Unconstrained => f.write_str("Unconstrained"),
            FieldConstraint::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldConstraint::Range(range) => f.debug_tuple("Range").field(range).finish(),
            FieldConstraint::Cel(expr, _) => f.debug_tuple("Cel").field(expr).finish(),
        }
    }
}

#[derive(Debug, Clone)]
enum Grant {
    All,
    Flag,
    Fields(Vec<(String, FieldConstraint)>),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    roles: Vec<RoleRequirement>,
    can: Vec<(Action, Grant)>,
    cannot: Vec<(Action, Grant)>,
    scope: Option<ScopeSpec>,
}

impl PermissionPolicy {
    /// 모델의 테이블 정책을 규칙으로 등록
    ///
    /// 등록한 규칙 수를 돌려줍니다. 정책에 테이블이 없으면 0입니다.
    /// 알 수 없는 필드, 잘못된 CEL, 경계 없는 범위는 설치 시점에 거부합니다.
    pub fn install<S, E, B>(&self, model: &Model<S, E, B>) -> Result<usize>
    where
        S: Principal,
        B: QueryBackend,
    {
        let Some(table_policy) = self.table(model.name()) else {
            tracing::debug!(table = %model.name(), "no policy for table");
            return Ok(0);
        };

        let compiled = table_policy
            .rules
            .iter()
            .map(|rule| compile_rule(rule, model.table()))
            .collect::<Result<Vec<_>>>()?;

        for rule in &compiled {
            let rule = rule.clone();
            model.protect_subject(move |meta, subject: &S| rule.apply(meta, subject));
        }

        tracing::info!(table = %model.name(), rules = compiled.len(), "installed permission policy");
        Ok(compiled.len())
    }
}

fn compile_rule(rule: &PolicyRule, table: &Table) -> Result<CompiledRule> {
    let compile_grants = |entries: &std::collections::BTreeMap<String, FieldList>| {
        entries
            .iter()
            .map(|(action, fields)| {
                let action = Action::parse(action);
                let grant = compile_grant(&action, fields, table)?;
                Ok((action, grant))
            })
            .collect::<Result<Vec<_>>>()
    };

    if let Some(ScopeSpec::Owner { owner: column }) = &rule.scope {
        check_field(table, column)?;
    }
    if let Some(ScopeSpec::Where { conditions }) = &rule.scope {
        for column in conditions.keys() {
            check_field(table, column)?;
        }
    }

    Ok(CompiledRule {
        roles: rule.roles.clone(),
        can: compile_grants(&rule.can)?,
        cannot: compile_grants(&rule.cannot)?,
        scope: rule.scope.clone(),
    })
}

fn compile_grant(action: &Action, fields: &FieldList, table: &Table) -> Result<Grant> {
    // destroy는 필드가 없는 플래그: `true`/`"*"`만 부여, `false`는 무시
    if *action == Action::Destroy {
        return match fields {
            fields if fields.is_all() => Ok(Grant::Flag),
            FieldList::Flag(false) => Ok(Grant::Fields(Vec::new())),
            _ => Err(Error::PolicyParse {
                message: "destroy takes true, false or \"*\"".to_string(),
            }),
        };
    }

    if fields.is_all() {
        return Ok(Grant::All);
    }

    let entries = match fields {
        FieldList::Flag(_) => Vec::new(),
        FieldList::Name(_) | FieldList::Names(_) => fields
            .names()
            .into_iter()
            .map(|name| (name.to_string(), FieldConstraint::Unconstrained))
            .collect(),
        FieldList::Constrained(map) => map
            .iter()
            .map(|(name, spec)| Ok((name.clone(), compile_constraint(name, spec.as_ref())?)))
            .collect::<Result<Vec<_>>>()?,
    };

    for (name, _) in &entries {
        check_field(table, name)?;
    }

    Ok(Grant::Fields(entries))
}

fn compile_constraint(field: &str, spec: Option<&ConstraintSpec>) -> Result<FieldConstraint> {
    match spec {
        None => Ok(FieldConstraint::Unconstrained),
        Some(ConstraintSpec::Literal(value)) => Ok(FieldConstraint::Literal(value.clone())),
        Some(ConstraintSpec::Cel { cel: expr }) => {
            let program = cel::compile(expr)?;
            Ok(FieldConstraint::Cel(expr.clone(), Arc::new(program)))
        }
        Some(ConstraintSpec::Range(range)) => compile_range(field, range).map(FieldConstraint::Range),
    }
}

fn compile_range(field: &str, spec: &RangeSpec) -> Result<ValueRange> {
    if spec.min.is_none() && spec.max.is_none() {
        return Err(Error::PolicyParse {
            message: format!("range for field '{}' needs min or max", field),
        });
    }

    let start = spec
        .min
        .clone()
        .map_or(Bound::Unbounded, Bound::Included);
    let end = match spec.max.clone() {
        None => Bound::Unbounded,
        Some(max) if spec.exclusive => Bound::Excluded(max),
        Some(max) => Bound::Included(max),
    };

    Ok(ValueRange::new(start, end))
}

fn check_field(table: &Table, field: &str) -> Result<()> {
    if table.has_field(field) {
        Ok(())
    } else {
        Err(Error::UnknownField {
            table: table.name.clone(),
            field: field.to_string(),
        })
    }
}

impl CompiledRule {
    fn apply<S: Principal, B: QueryBackend>(&self, meta: &mut PermissionBox<B>, subject: &S) {
        if !matches_roles(&self.roles, subject) {
            return;
        }

        let auth = subject.to_cel_auth();

        for (action, grant) in &self.can {
            match grant {
                Grant::Flag => meta.can(action.clone(), ()),
                Grant::All => meta.can_all(action.clone()),
                Grant::Fields(entries) if entries.is_empty() => {}
                Grant::Fields(entries) => meta.can(action.clone(), to_field_spec(entries, &auth)),
            }
        }

        for (action, grant) in &self.cannot {
            match grant {
                Grant::Flag => meta.cannot(action.clone(), ()),
                Grant::All => meta.cannot_all(action.clone()),
                Grant::Fields(entries) if entries.is_empty() => {}
                Grant::Fields(entries) => {
                    meta.cannot(action.clone(), to_field_spec(entries, &auth))
                }
            }
        }

        if let Some(scope) = &self.scope {
            apply_scope(meta, scope, subject);
        }
    }
}

fn to_field_spec(entries: &[(String, FieldConstraint)], auth: &Value) -> FieldSpec {
    let entries = entries
        .iter()
        .map(|(name, constraint)| {
            let constraint = match constraint {
                FieldConstraint::Unconstrained => Constraint::Unconstrained,
                FieldConstraint::Literal(value) => Constraint::Literal(value.clone()),
                FieldConstraint::Range(range) => Constraint::Range(range.clone()),
                FieldConstraint::Cel(expr, program) => {
                    Constraint::cel_program(expr.as_str(), Arc::clone(program), auth.clone())
                }
            };
            (name.clone(), constraint)
        })
        .collect();

    FieldSpec::Constrained(entries)
}

fn apply_scope<S: Principal, B: QueryBackend>(meta: &mut PermissionBox<B>, scope: &ScopeSpec, subject: &S) {
    let backend = Arc::clone(meta.context().backend());

    match scope {
        ScopeSpec::Keyword(ScopeKeyword::Nothing) => {
            meta.scope(move |query| backend.none(query));
        }
        ScopeSpec::Owner { owner } => match subject.sub() {
            Some(sub) => {
                let column = owner.clone();
                let sub = Value::String(sub.to_string());
                meta.scope(move |query| backend.filter_eq(query, &column, &sub));
            }
            None => meta.scope(move |query| backend.none(query)),
        },
        ScopeSpec::Where { conditions } => {
            let conditions = conditions.clone();
            meta.scope(move |query| {
                conditions
                    .iter()
                    .fold(query, |query, (column, value)| backend.filter_eq(query, column, value))
            });
        }
    }
}

/// role 요구사항 확인 (비어 있으면 모두 허용)
fn matches_roles<S: Principal>(required: &[RoleRequirement], subject: &S) -> bool {
    if required.is_empty() {
        return true;
    }

    required.iter().any(|req| match req {
        RoleRequirement::Public => true,
        RoleRequirement::Authenticated => subject.is_authenticated(),
        RoleRequirement::Role(role) => subject.has_role(role),
    })
}
