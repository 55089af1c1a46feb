//! 정책 평가 주체
//!
//! 선언형 정책은 주체에 대해 `sub`와 role만 알면 됩니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 정책이 요구하는 주체 정보
pub trait Principal {
    /// 사용자 ID (비로그인이면 `None`)
    fn sub(&self) -> Option<&str>;

    fn has_role(&self, role: &str) -> bool;

    fn is_authenticated(&self) -> bool {
        self.sub().is_some()
    }

    /// CEL 표현식의 `auth` 변수
    fn to_cel_auth(&self) -> Value {
        let mut auth = serde_json::Map::new();
        if let Some(sub) = self.sub() {
            auth.insert("sub".to_string(), Value::String(sub.to_string()));
        }
        Value::Object(auth)
    }
}

/// 인증 컨텍스트
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// 사용자 ID (End User sub 또는 API Key ID)
    pub sub: Option<String>,

    /// Role 목록
    #[serde(default)]
    pub roles: Vec<String>,

    /// 인증 주체 타입
    #[serde(default)]
    pub principal_type: PrincipalType,
}

/// 인증 주체 타입
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    #[default]
    EndUser,
    ApiKey,
}

impl AuthContext {
    /// End User 인증 컨텍스트 생성
    pub fn new(sub: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            sub: Some(sub.into()),
            roles,
            principal_type: PrincipalType::EndUser,
        }
    }

    /// API Key 인증 컨텍스트 생성
    pub fn api_key(key_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            sub: Some(key_id.into()),
            roles,
            principal_type: PrincipalType::ApiKey,
        }
    }

    /// 익명 컨텍스트
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl Principal for AuthContext {
    fn sub(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn to_cel_auth(&self) -> Value {
        let mut auth = serde_json::Map::new();
        if let Some(sub) = &self.sub {
            auth.insert("sub".to_string(), Value::String(sub.clone()));
        }
        auth.insert(
            "roles".to_string(),
            Value::Array(self.roles.iter().map(|r| Value::String(r.clone())).collect()),
        );
        auth.insert(
            "principal_type".to_string(),
            serde_json::to_value(self.principal_type).unwrap_or(Value::Null),
        );
        Value::Object(auth)
    }
}

/// 비로그인 주체는 `None`
impl<P: Principal> Principal for Option<P> {
    fn sub(&self) -> Option<&str> {
        self.as_ref().and_then(|p| p.sub())
    }

    fn has_role(&self, role: &str) -> bool {
        self.as_ref().is_some_and(|p| p.has_role(role))
    }

    fn to_cel_auth(&self) -> Value {
        match self {
            Some(p) => p.to_cel_auth(),
            None => Value::Object(serde_json::Map::new()),
        }
    }
}
