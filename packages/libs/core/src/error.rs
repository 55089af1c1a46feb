//! 공통 에러 타입
//!
//! stk-guard 전체에서 사용되는 에러 타입을 정의합니다.
//! 생성/수정 거부는 에러가 아니라 [`crate::ValidationError`] 값으로 보고되며,
//! 호출자가 `?`로 전파하고 싶을 때만 [`Error::ValidationDenied`]로 변환합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// stk-guard 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Restriction Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("unprotected entity detected: use `restrict` to protect it")]
    UnprotectedAccess,

    #[error("access denied for field '{field}': {message}")]
    ValidationDenied { field: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Policy Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("permission parse error: {message}")]
    PolicyParse { message: String },

    #[error("CEL expression error: {message}")]
    CelExpression { message: String },

    #[error("unknown field '{field}' on table '{table}'")]
    UnknownField { table: String, field: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Schema / Config Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("schema parse error: {message}")]
    SchemaParse { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Storage Errors (외부 저장소 협력자가 보고)
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("storage error: {message}")]
    Storage { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::PolicyParse { .. }
            | Error::CelExpression { .. }
            | Error::UnknownField { .. }
            | Error::SchemaParse { .. }
            | Error::Yaml(_)
            | Error::Json(_) => 400,

            // 403 Forbidden
            Error::ValidationDenied { .. } => 403,

            // 500 Internal Server Error
            // UnprotectedAccess는 호출 측 프로그래밍 오류
            _ => 500,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnprotectedAccess => "UNPROTECTED_ACCESS",
            Error::ValidationDenied { .. } => "ACCESS_DENIED",
            Error::PolicyParse { .. } => "PERMISSION_PARSE_ERROR",
            Error::CelExpression { .. } => "CEL_EXPRESSION_ERROR",
            Error::UnknownField { .. } => "UNKNOWN_FIELD",
            Error::SchemaParse { .. } => "SCHEMA_PARSE_ERROR",
            Error::Config { .. } => "CONFIG_ERROR",
            Error::Storage { .. } => "STORAGE_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::UnprotectedAccess.status_code(), 500);
        assert_eq!(
            Error::ValidationDenied {
                field: "number".to_string(),
                message: "denied".to_string(),
            }
            .status_code(),
            403
        );
        assert_eq!(
            Error::CelExpression {
                message: "bad".to_string()
            }
            .status_code(),
            400
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::UnprotectedAccess.code(), "UNPROTECTED_ACCESS");
        assert_eq!(
            Error::Storage {
                message: "down".to_string()
            }
            .code(),
            "STORAGE_ERROR"
        );
    }
}
