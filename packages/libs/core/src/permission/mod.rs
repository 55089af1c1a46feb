//! 권한 박스와 평가
//!
//! - `meta`: 규칙이 채우는 [`PermissionBox`]와 조회 메서드
//! - `scope`: 읽기 scope 합성
//! - `evaluate`: 규칙 목록 실행

mod evaluate;
mod meta;
mod scope;

pub use evaluate::evaluate;
pub use meta::{FieldAccess, PermissionBox, ScopeContext, ScopeFn, BASE_FIELD};
