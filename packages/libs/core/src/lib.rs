//! stk-guard-core: 주체 기반 권한 엔진
//!
//! 엔티티 타입마다 등록한 보호 규칙을 (주체, 엔티티) 쌍에 대해 실행해
//! 필드 단위 읽기/생성/수정 권한, 삭제 권한, Row 단위 읽기 scope를 계산합니다.
//!
//! # 모듈 구조
//!
//! - `rules`: 규칙 등록과 상속
//! - `permission`: 권한 박스, 평가, scope 합성
//! - `insecure`: 신뢰 실행 모드
//! - `subject`: 주체 바인딩
//! - `model`, `guarded`, `relation`, `association`: 저장 계층 래퍼
//! - `backend`, `memory`: 저장소 협력자 인터페이스와 인메모리 구현
//! - `policy`: YAML 선언형 정책
//! - `schema`: 테이블 정의
//! - `config`, `error`: 전역 설정과 공통 에러
//!
//! # 예시
//!
//! ```
//! use std::sync::Arc;
//! use stk_guard_core::{Action, Model, Row, Table};
//!
//! let model: Model<String, Row, ()> =
//!     Model::new(Table::with_fields("dummies", ["string", "number"]), Arc::new(()));
//!
//! model.protect_subject(|meta, user: &String| {
//!     meta.can(Action::Read, "string");
//!     meta.can(Action::Create, ("number", 0i64..=2));
//!     if user == "admin" {
//!         meta.can(Action::Destroy, ());
//!     }
//! });
//!
//! let meta = model.evaluate(&"guest".to_string(), None);
//! assert!(meta.is_readable("string"));
//! assert!(!meta.is_destroyable());
//! ```

pub mod action;
pub mod association;
pub mod backend;
pub mod config;
pub mod constraint;
pub mod error;
pub mod fields;
pub mod guarded;
pub mod insecure;
pub mod memory;
pub mod model;
pub mod permission;
pub mod policy;
pub mod record;
pub mod relation;
pub mod rules;
pub mod schema;
pub mod subject;
pub mod validation;

pub use action::Action;
pub use association::{Association, AssociationKind, Include};
pub use backend::{QueryBackend, Store};
pub use config::GuardConfig;
pub use constraint::{Constraint, Predicate, ValueRange};
pub use error::{Error, Result};
pub use fields::{FieldSpec, FieldValues, IntoFieldSpecs};
pub use guarded::Guarded;
pub use insecure::{insecurely, insecurely_async, InsecureGuard};
pub use memory::{MemoryQuery, MemoryStore};
pub use model::Model;
pub use permission::{PermissionBox, ScopeContext, BASE_FIELD};
pub use policy::{AuthContext, PermissionPolicy, Principal, RoleRequirement};
pub use record::{Entity, Row};
pub use relation::{LoadPlan, Relation};
pub use rules::{Rule, RuleSet};
pub use schema::{Column, IdColumn, SchemaParser, Table};
pub use subject::{Restrictable, Restriction};
pub use validation::{DefaultMessages, MessageLookup, ValidationError};
