//! 선언형 권한 정책
//!
//! # 개요
//!
//! `permissions.yaml`을 파싱하여 모델에 보호 규칙으로 설치합니다.
//! 필드 제약에는 CEL(Common Expression Language)을 쓸 수 있습니다.
//!
//! # 모듈 구조
//!
//! - `policy`: 권한 정책 정의
//! - `context`: 정책이 보는 주체 정보
//! - `install`: 정책 → 규칙 컴파일
//! - `cel`: CEL 필드 제약

pub mod cel;
mod context;
mod install;
#[allow(clippy::module_inception)]
mod policy;

pub use context::{AuthContext, Principal, PrincipalType};
pub use policy::{
    ConstraintSpec, FieldList, PermissionPolicy, PolicyRule, RangeSpec, RoleRequirement,
    ScopeKeyword, ScopeSpec, TablePolicy,
};
