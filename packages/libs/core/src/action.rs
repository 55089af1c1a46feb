//! 권한 액션

use std::fmt;

use serde::{Deserialize, Serialize};

/// 규칙이 허용/거부하는 액션
///
/// `read`, `create`, `update`는 필드 단위, `destroy`는 엔티티 단위입니다.
/// 그 밖의 이름은 `Custom`으로 보관되어 [`crate::PermissionBox::allows`]로 확인합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Read,
    Create,
    Update,
    Destroy,
    Custom(String),
}

impl Action {
    /// 문자열에서 파싱 (`view`는 `read`의 옛 이름)
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "read" | "view" => Action::Read,
            "create" => Action::Create,
            "update" => Action::Update,
            "destroy" => Action::Destroy,
            _ => Action::Custom(s.to_string()),
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
            Action::Custom(name) => name.as_str(),
        }
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::parse(s)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::parse(&s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Action::parse(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Action::parse("read"), Action::Read);
        assert_eq!(Action::parse("view"), Action::Read);
        assert_eq!(Action::parse("UPDATE"), Action::Update);
        assert_eq!(Action::parse("destroy"), Action::Destroy);
        assert_eq!(
            Action::parse("publish"),
            Action::Custom("publish".to_string())
        );
    }

    #[test]
    fn test_round_trip_name() {
        assert_eq!(Action::from("publish").as_str(), "publish");
        assert_eq!(Action::Create.to_string(), "create");
    }
}
