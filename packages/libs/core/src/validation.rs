//! 생성/수정 거부 보고
//!
//! 거부는 에러가 아니라 값입니다. 저장 계층은 일반적인 검증 실패처럼 저장을 거절하고
//! 객체를 그대로 둘 수 있습니다.

use crate::error::Error;

/// 접근 거부 메시지 키
pub const INVALID_KEY: &str = "guard.invalid";

/// 메시지 조회 협력자
pub trait MessageLookup {
    fn message(&self, key: &str, field: &str) -> String;
}

/// 기본 영문 메시지
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessages;

impl MessageLookup for DefaultMessages {
    fn message(&self, _key: &str, field: &str) -> String {
        format!("access denied for field '{}'", field)
    }
}

/// 첫 번째 거부 필드
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub key: String,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, messages: &dyn MessageLookup) -> Self {
        let field = field.into();
        Self {
            key: INVALID_KEY.to_string(),
            message: messages.message(INVALID_KEY, &field),
            field,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::ValidationDenied {
            field: err.field,
            message: err.message,
        }
    }
}
