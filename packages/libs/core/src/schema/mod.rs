//! 엔티티 스키마
//!
//! 권한 평가에 필요한 것은 테이블 이름, 기본키, 전체 필드 목록뿐입니다.
//! 필드 목록은 `can(action)`처럼 필드 인자가 없는 규칙이 "모든 필드"로 펼쳐질 때 사용됩니다.
//!
//! # 모듈 구조
//!
//! - `table`: 테이블 정의
//! - `column`: 컬럼 정의
//! - `parser`: YAML 파싱 로직

mod column;
mod parser;
mod table;

pub use column::Column;
pub use parser::SchemaParser;
pub use table::{IdColumn, Table};
